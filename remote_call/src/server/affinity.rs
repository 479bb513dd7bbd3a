// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Client-affinity tracking: which client owns which reap-when-idle
//! instances, and the reaper that releases them when their client is gone.

use log::*;

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use parking_lot::Mutex;

use wire_format::{WireWrite, Writer};

use super::instances;

fn table() -> &'static Mutex<HashMap<String, HashSet<String>>> {
    static TABLE: OnceLock<Mutex<HashMap<String, HashSet<String>>>> = OnceLock::new();

    TABLE.get_or_init(Default::default)
}

/// Called by every generated entry point on the value it is about to hand
/// back. A no-op unless the value is a non-null object handle, the request
/// carried a client identifier, and the instance asked to be reaped when
/// its client is gone; otherwise the instance joins that client's set.
pub fn note_returned<T: WireWrite>(client: &str, value: &T) {
    if !T::IS_HANDLE || client.is_empty() {
        return;
    }

    // A handle's wire form is its identifier string; the null handle is
    // the empty string.
    let mut w = Writer::new();
    value.serialize(&mut w);
    let bytes = w.into_bytes();

    let id = match bytes.split_last() {
        Some((0, id_bytes)) if !id_bytes.is_empty() => {
            String::from_utf8_lossy(id_bytes).into_owned()
        }
        _ => return,
    };

    let Some(meta) = instances::meta(&id) else {
        return;
    };

    if !meta.reap_when_idle() {
        return;
    }

    debug!("client {client} now owns instance {id}");

    table()
        .lock()
        .entry(client.to_string())
        .or_default()
        .insert(id);
}

/// Release every instance owned by a client the predicate reports dead.
///
/// Removal from the instance registry drops the last owning reference
/// unless a call is mid-flight on another thread, in which case the state
/// is freed the moment that call exits.
pub fn reap(alive: &dyn Fn(&str) -> bool) {
    let known: Vec<String> = table().lock().keys().cloned().collect();

    for client in known {
        if alive(&client) {
            continue;
        }

        let Some(owned) = table().lock().remove(&client) else {
            continue;
        };

        debug!(
            "client {client} is gone, releasing {} owned instance(s)",
            owned.len()
        );

        for id in owned {
            if instances::remove(&id).is_some() {
                debug!("reaped instance {id} of departed client {client}");
            }
        }
    }
}
