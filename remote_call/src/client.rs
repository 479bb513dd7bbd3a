// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The client half: parameter descriptors, the call descriptor built at a
//! call site, the transport capability, and the engine that drives one
//! round trip.

use log::*;

use std::marker::PhantomData;

use wire_format::{Fault, FaultKind, Reader, WireError, WireRead, WireWrite, Writer};

use crate::Error;

/// A caller storage slot that is marshalled out and, after the reply,
/// marshalled back in place. Blanket-implemented for every type that can
/// travel both directions.
pub trait InOutSlot {
    fn serialize(&self, w: &mut Writer);

    fn deserialize(&mut self, r: &mut Reader<'_>) -> Result<(), WireError>;
}

impl<T: WireWrite + WireRead> InOutSlot for T {
    fn serialize(&self, w: &mut Writer) {
        WireWrite::serialize(self, w);
    }

    fn deserialize(&mut self, r: &mut Reader<'_>) -> Result<(), WireError> {
        *self = T::deserialize(r)?;

        Ok(())
    }
}

/// One call-site argument, type-erased.
///
/// An input argument only knows how to write itself. An in-out argument
/// borrows the caller's slot for the duration of the call, so the reply
/// can be read back into the very storage the caller handed over.
pub enum Param<'a> {
    In(Box<dyn Fn(&mut Writer) + 'a>),
    InOut(&'a mut dyn InOutSlot),
}

impl<'a> Param<'a> {
    pub fn input<T: WireWrite + 'a>(value: T) -> Self {
        Self::In(Box::new(move |w| value.serialize(w)))
    }

    pub fn in_out<T: WireWrite + WireRead>(slot: &'a mut T) -> Self {
        Self::InOut(slot)
    }

    fn serialize(&self, w: &mut Writer) {
        match self {
            Self::In(write) => write(w),
            Self::InOut(slot) => slot.serialize(w),
        }
    }

    fn readback(&mut self, r: &mut Reader<'_>) -> Result<(), WireError> {
        match self {
            Self::In(_) => Ok(()),
            Self::InOut(slot) => slot.deserialize(r),
        }
    }
}

enum Target {
    Function(&'static str),
    Method {
        instance: String,
        method: &'static str,
    },
    Destruction {
        instance: String,
    },
}

/// Everything the engine needs for one round trip: the callee, the ordered
/// parameter descriptors, the synchrony class, and whether the declared
/// return type is a remote-object handle (which is what subscribes the
/// call's client identifier to server-side instance ownership tracking).
///
/// Built by the constructors the declaration macros generate, and consumed
/// by [`Transport::call`].
pub struct Call<'a, R> {
    target: Target,
    params: Vec<Param<'a>>,
    one_way: bool,
    returns_handle: bool,
    ret: PhantomData<fn() -> R>,
}

impl<'a, R: WireRead> Call<'a, R> {
    pub fn function(name: &'static str, params: Vec<Param<'a>>, one_way: bool) -> Self {
        Self {
            target: Target::Function(name),
            params,
            one_way,
            returns_handle: R::IS_HANDLE,
            ret: PhantomData,
        }
    }

    pub fn method(
        instance: String,
        method: &'static str,
        params: Vec<Param<'a>>,
        one_way: bool,
    ) -> Self {
        Self {
            target: Target::Method { instance, method },
            params,
            one_way,
            returns_handle: R::IS_HANDLE,
            ret: PhantomData,
        }
    }
}

impl Call<'static, ()> {
    /// The destruction opcode. Always request/reply, so a stale identifier
    /// surfaces as a fault instead of vanishing.
    pub fn destruction(instance: String) -> Self {
        Self {
            target: Target::Destruction { instance },
            params: Vec::new(),
            one_way: false,
            returns_handle: false,
            ret: PhantomData,
        }
    }
}

/// The capability the engine drives. Implementations move opaque frames;
/// they never look inside.
///
/// `send_receive` is the request/reply path and is preferred whenever the
/// transport has it, because a reply carries fault detail a one-way send
/// cannot. A transport that can only fire and forget returns `false` from
/// [`Transport::round_trip`] and overrides [`Transport::send`].
pub trait Transport {
    /// Deliver `frame` and wait for the reply. `None` means delivery
    /// failed; the engine turns that into a transport fault.
    fn send_receive(&mut self, frame: &[u8]) -> Option<Vec<u8>>;

    /// Deliver `frame` without waiting. `false` means delivery failed.
    fn send(&mut self, frame: &[u8]) -> bool {
        self.send_receive(frame).is_some()
    }

    /// Whether `send_receive` is usable on this transport.
    fn round_trip(&self) -> bool {
        true
    }

    /// The opaque identifier the server uses to track which instances this
    /// client owns. The empty string opts out of ownership tracking.
    fn client_id(&self) -> String {
        String::new()
    }

    /// Drive one call to completion.
    fn call<R: WireRead>(&mut self, call: Call<'_, R>) -> Result<R, Error>
    where
        Self: Sized,
    {
        invoke(self, call)
    }
}

fn transport_fault() -> Error {
    Error::Fault(Fault::new(
        FaultKind::Transport,
        "Transport failed to deliver the call.",
    ))
}

/// Assemble the request frame, drive the transport, and reconstruct the
/// reply: fault or return value, then in-out parameters back into the
/// caller's slots.
pub fn invoke<T, R>(transport: &mut T, mut call: Call<'_, R>) -> Result<R, Error>
where
    T: Transport + ?Sized,
    R: WireRead,
{
    let mut w = Writer::new();

    // Only calls that hand back an object handle identify their client;
    // that identifier is the server's cue to track instance ownership.
    let client = if call.returns_handle {
        transport.client_id()
    } else {
        String::new()
    };
    WireWrite::serialize(&client, &mut w);

    match &call.target {
        Target::Function(name) => {
            trace!("calling function {name}");
            name.serialize(&mut w);
        }
        Target::Method { instance, method } => {
            trace!("calling method {method} on instance {instance}");
            WireWrite::serialize(instance, &mut w);
            method.serialize(&mut w);
        }
        Target::Destruction { instance } => {
            trace!("destroying instance {instance}");
            WireWrite::serialize(instance, &mut w);
            w.push(b'~');
        }
    }

    for param in &call.params {
        param.serialize(&mut w);
    }

    let frame = w.into_bytes();

    let reply = if call.one_way && !transport.round_trip() {
        if !transport.send(&frame) {
            return Err(transport_fault());
        }

        Vec::new()
    } else {
        transport.send_receive(&frame).ok_or_else(transport_fault)?
    };

    let mut r = Reader::new(&reply);

    // An empty reply is the one-way case: nothing to decode. Otherwise the
    // first byte discriminates a fault from the empty no-fault marker.
    if let Some(first) = r.peek() {
        if first != 0 {
            let fault = <Fault as WireRead>::deserialize(&mut r)?;

            return Err(Error::Fault(fault));
        }

        let _marker = <String as WireRead>::deserialize(&mut r)?;
    }

    let ret = R::deserialize(&mut r)?;

    // The server lays out in-out parameters after the return value, last
    // declared first, so they are applied in reverse declaration order as
    // the cursor moves forward.
    for param in call.params.iter_mut().rev() {
        param.readback(&mut r)?;
    }

    if r.remaining() != 0 {
        return Err(Error::Wire(WireError::TrailingBytes(r.remaining())));
    }

    Ok(ret)
}
