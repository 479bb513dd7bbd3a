// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The server half: the dispatch entry point a transport feeds with
//! received frames, and the process-wide function table.

pub mod affinity;
pub mod instances;

use log::*;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use wire_format::{Fault, FaultKind, Reader, WireError, WireRead, WireWrite, Writer};

use self::instances::{CallGuard, MethodLookup};

/// Interior mutability around an exported object's state. Method records
/// lock it for the duration of one invocation.
pub type ObjectState<T> = Mutex<T>;

/// The serialized-call entry point stored per callee: decode the declared
/// arguments off the request cursor, invoke, encode the return value and
/// the in-out parameters onto the reply. One shape serves both the
/// function table and every per-instance method table.
pub type EntryPoint =
    Arc<dyn Fn(&str, &mut Writer, &mut Reader<'_>) -> Result<(), WireError> + Send + Sync>;

fn functions() -> &'static Mutex<HashMap<&'static str, EntryPoint>> {
    static FUNCTIONS: OnceLock<Mutex<HashMap<&'static str, EntryPoint>>> = OnceLock::new();

    FUNCTIONS.get_or_init(Default::default)
}

/// Add a function to the process-wide table. Called by the generated
/// `register` functions during process init; a name registered twice keeps
/// the latest entry.
pub fn register_function<F>(name: &'static str, entry: F)
where
    F: Fn(&str, &mut Writer, &mut Reader<'_>) -> Result<(), WireError> + Send + Sync + 'static,
{
    trace!("registering function {name}");

    functions().lock().insert(name, Arc::new(entry));
}

fn lookup_function(name: &str) -> Option<EntryPoint> {
    // Clone out so the table is not held across the invocation.
    functions().lock().get(name).cloned()
}

/// Dispatch one request frame and produce the reply frame.
///
/// Intended to be called by the transport on receipt of a client frame,
/// from as many threads as the transport cares to use. When a liveness
/// predicate is supplied, departed clients' instances are reaped before
/// the frame is served.
pub fn process(request: &[u8], liveness: Option<&dyn Fn(&str) -> bool>) -> Vec<u8> {
    let mut r = Reader::new(request);
    let mut w = Writer::new();

    let client = match String::deserialize(&mut r) {
        Ok(client) => client,
        Err(e) => {
            warn!("request frame with unreadable client identifier: {e}");
            Fault::new(FaultKind::Server, format!("Malformed request frame: {e}."))
                .serialize(&mut w);

            return w.into_bytes();
        }
    };

    if let Some(alive) = liveness {
        affinity::reap(alive);
    }

    // Instance identifiers always start with an ASCII digit; nothing else
    // on the wire does. One peek classifies the frame.
    match r.peek() {
        Some(b) if b.is_ascii_digit() => class_call(&client, &mut r, &mut w),
        Some(_) => function_call(&client, &mut r, &mut w),
        None => {
            Fault::new(FaultKind::Server, "Empty request body.").serialize(&mut w);
        }
    }

    w.into_bytes()
}

fn function_call(client: &str, r: &mut Reader<'_>, w: &mut Writer) {
    let name = match String::deserialize(r) {
        Ok(name) => name,
        Err(e) => {
            Fault::new(FaultKind::Server, format!("Malformed function name: {e}.")).serialize(w);

            return;
        }
    };

    let Some(entry) = lookup_function(&name) else {
        debug!("call to unknown function {name}");
        Fault::new(
            FaultKind::InvalidFunction,
            format!("Function {name} is not implemented."),
        )
        .serialize(w);

        return;
    };

    debug!("dispatching function {name}");

    "".serialize(w);
    invoke(&entry, client, w, r, &name);
}

fn class_call(client: &str, r: &mut Reader<'_>, w: &mut Writer) {
    let id = match String::deserialize(r) {
        Ok(id) => id,
        Err(e) => {
            Fault::new(
                FaultKind::Server,
                format!("Malformed instance identifier: {e}."),
            )
            .serialize(w);

            return;
        }
    };

    if r.peek() == Some(b'~') {
        if instances::remove(&id).is_some() {
            debug!("destroyed instance {id}");
            "".serialize(w);
        } else {
            invalid_instance(&id, w);
        }

        return;
    }

    let method = match String::deserialize(r) {
        Ok(method) => method,
        Err(e) => {
            Fault::new(FaultKind::Server, format!("Malformed method name: {e}.")).serialize(w);

            return;
        }
    };

    match instances::find_method(&id, &method) {
        MethodLookup::UnknownInstance => invalid_instance(&id, w),
        MethodLookup::UnknownMethod { class } => {
            debug!("call to unknown method {class}::{method} on {id}");
            Fault::new(
                FaultKind::InvalidMethod,
                format!("Method {class}::{method} is not implemented."),
            )
            .serialize(w);
        }
        MethodLookup::Found { meta, entry } => {
            // Hold the in-flight guard for the whole invocation so a
            // concurrent reap cannot tear the instance down mid-call.
            let _live = CallGuard::new(meta.clone());

            debug!("dispatching method {}::{method} on {id}", meta.class());

            "".serialize(w);
            invoke(&entry, client, w, r, &format!("{}::{method}", meta.class()));
        }
    }
}

fn invalid_instance(id: &str, w: &mut Writer) {
    debug!("call on unknown instance {id}");
    Fault::new(
        FaultKind::InvalidClassInstance,
        format!("Invalid class instance {id}."),
    )
    .serialize(w);
}

/// Run a callee's entry point. A failing callee must not leak a partial
/// reply, so on any failure the buffer is discarded and replaced with an
/// encoded server fault naming the callee.
fn invoke(entry: &EntryPoint, client: &str, w: &mut Writer, r: &mut Reader<'_>, what: &str) {
    match catch_unwind(AssertUnwindSafe(|| entry(client, w, r))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!("callee {what} could not decode its arguments: {e}");
            w.clear();
            Fault::new(
                FaultKind::Server,
                format!("Call to {what} failed to decode its arguments: {e}."),
            )
            .serialize(w);
        }
        Err(payload) => {
            let what_happened = panic_message(payload);
            warn!("callee {what} panicked: {what_happened}");
            w.clear();
            Fault::new(
                FaultKind::Server,
                format!("Server exception in {what} \"{what_happened}\"."),
            )
            .serialize(w);
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown".to_string()
    }
}
