//! # Invocation Bridge
//!
//! Calls a resolved guest method with host values. Owns the call convention:
//! integers pass through as one raw `i32`, text and bytes are wrapped into
//! guest memory and pass as `(ptr, len)`.
//!
//! The argument list must match the target's declared parameters. That is a
//! contract between host code and guest code and is not checked at runtime.

use crate::error::Error;
use crate::error::GuestFault;
use crate::error::Result;
use crate::guest::CallError;
use crate::guest::GuestRuntime;
use crate::handles::GuestMethodHandle;
use crate::marshal;
use crate::marshal::GuestMemory;
use crate::marshal::MarshalError;
use crate::marshal::MarshalledBuffer;

/// One host-side argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GuestArg<'a> {
    Int(i32),
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// Arguments lowered into the raw call convention.
pub(crate) struct LoweredArgs {
    pub params: Vec<i32>,
    /// Guest allocations made for the call, released afterwards.
    pub buffers: Vec<MarshalledBuffer>,
}

/// Lowers host arguments, wrapping buffers into guest memory.
///
/// On failure, buffers already allocated are handed back to the guest.
pub(crate) fn lower_args<M: GuestMemory + ?Sized>(
    memory: &mut M,
    args: &[GuestArg<'_>],
) -> marshal::Result<LoweredArgs> {
    let mut lowered = LoweredArgs {
        params: Vec::with_capacity(args.len() * 2),
        buffers: Vec::new(),
    };

    for arg in args {
        let buffer = match arg {
            GuestArg::Int(value) => {
                lowered.params.push(*value);
                continue;
            }
            GuestArg::Text(text) => marshal::encode(memory, text),
            GuestArg::Bytes(bytes) => marshal::wrap(memory, bytes),
        };
        match buffer {
            Ok(buffer) => {
                lowered.params.extend(buffer.to_raw());
                lowered.buffers.push(buffer);
            }
            Err(e) => {
                release_buffers(memory, &lowered.buffers);
                return Err(e);
            }
        }
    }

    Ok(lowered)
}

pub(crate) fn release_buffers<M: GuestMemory + ?Sized>(memory: &mut M, buffers: &[MarshalledBuffer]) {
    for buffer in buffers {
        if let Err(e) = memory.release(buffer.ptr) {
            tracing::warn!(ptr = buffer.ptr, error = %e, "failed to release argument buffer");
        }
    }
}

/// Invokes `handle` with `args`, returning the raw result if the method has one.
///
/// Argument buffers are released before returning, on success and on fault.
pub fn invoke<G: GuestRuntime>(
    guest: &mut G,
    handle: &GuestMethodHandle,
    args: &[GuestArg<'_>],
) -> Result<Option<i32>> {
    let lowered = guest
        .with_memory(|memory| lower_args(memory, args))?
        .map_err(|e| marshal_failure(handle, e))?;
    tracing::trace!(method = %handle.key(), params = ?lowered.params, "invoking guest");

    let outcome = guest.call(handle, &lowered.params);

    if !lowered.buffers.is_empty() {
        guest.with_memory(|memory| release_buffers(memory, &lowered.buffers))?;
    }

    match outcome {
        Ok(value) => Ok(value),
        Err(CallError::Fault(message)) => Err(fault(handle, message)),
        Err(CallError::Marshal(e)) => Err(marshal_failure(handle, e)),
    }
}

fn fault(handle: &GuestMethodHandle, message: String) -> Error {
    let fault = GuestFault {
        method: handle.key().clone(),
        message,
    };
    tracing::warn!(%fault, "guest call faulted");
    Error::GuestFault(fault)
}

/// Non-fatal marshalling errors are faults of the call in progress.
fn marshal_failure(handle: &GuestMethodHandle, e: MarshalError) -> Error {
    if e.is_fatal() {
        Error::Marshal(e)
    } else {
        fault(handle, e.to_string())
    }
}
