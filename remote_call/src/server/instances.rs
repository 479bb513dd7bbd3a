// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The live-instance registry: instance identifier to object metadata and
//! method table, for the lifetime of the server process.

use log::*;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::ReentrantMutex;

use super::EntryPoint;

/// What the registry knows about one live instance. The object's state
/// itself lives inside the method records; the registry only holds what
/// dispatch and the reaper need to see.
pub struct InstanceMeta {
    id: String,
    class: &'static str,
    reap_when_idle: bool,
    live_calls: AtomicU32,
}

impl InstanceMeta {
    /// Mint the metadata for a new instance, identifier included.
    pub fn new(class: &'static str, reap_when_idle: bool) -> Arc<Self> {
        Arc::new(Self {
            id: next_instance_id(),
            class,
            reap_when_idle,
            live_calls: AtomicU32::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> &'static str {
        self.class
    }

    pub fn reap_when_idle(&self) -> bool {
        self.reap_when_idle
    }
}

/// Identifiers combine a per-thread token with a process-global sequence
/// number: digit-first (the dispatch discriminator relies on that), unique
/// across threads, and never reused for the life of the process.
fn next_instance_id() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(0);

    thread_local! {
        static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed) + 1;
    }

    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;

    THREAD_TOKEN.with(|token| format!("{token}:{sequence}"))
}

/// Scoped in-flight marker held by dispatch across a method invocation.
pub(crate) struct CallGuard {
    meta: Arc<InstanceMeta>,
}

impl CallGuard {
    pub(crate) fn new(meta: Arc<InstanceMeta>) -> Self {
        meta.live_calls.fetch_add(1, Ordering::AcqRel);

        Self { meta }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let before = self.meta.live_calls.fetch_sub(1, Ordering::AcqRel);
        trace!(
            "instance {} now has {} calls in flight",
            self.meta.id,
            before - 1
        );
    }
}

struct Entry {
    meta: Arc<InstanceMeta>,
    methods: HashMap<&'static str, EntryPoint>,
}

// One reentrant lock over the whole registry: tearing one instance down
// can run arbitrary drop code that registers or removes other instances
// on the same thread. The RefCell borrow is never held while such drop
// code runs.
fn registry() -> &'static ReentrantMutex<RefCell<HashMap<String, Entry>>> {
    static REGISTRY: OnceLock<ReentrantMutex<RefCell<HashMap<String, Entry>>>> = OnceLock::new();

    REGISTRY.get_or_init(Default::default)
}

/// Register a freshly constructed instance together with its complete
/// method table. Called by the generated `export` constructors.
pub fn add(meta: Arc<InstanceMeta>, methods: HashMap<&'static str, EntryPoint>) {
    debug!("registering instance {} of class {}", meta.id, meta.class);

    let guard = registry().lock();
    guard.borrow_mut().insert(
        meta.id.clone(),
        Entry {
            meta,
            methods,
        },
    );
}

pub(crate) fn meta(id: &str) -> Option<Arc<InstanceMeta>> {
    let guard = registry().lock();
    let meta = guard.borrow().get(id).map(|entry| entry.meta.clone());

    meta
}

pub(crate) enum MethodLookup {
    UnknownInstance,
    UnknownMethod {
        class: &'static str,
    },
    Found {
        meta: Arc<InstanceMeta>,
        entry: EntryPoint,
    },
}

/// Resolve a method record under one lock acquisition. The record is
/// cloned out, so the registry is not held while the method runs and a
/// concurrent removal cannot pull state out from under an in-flight call.
pub(crate) fn find_method(id: &str, method: &str) -> MethodLookup {
    let guard = registry().lock();
    let map = guard.borrow();

    let Some(entry) = map.get(id) else {
        return MethodLookup::UnknownInstance;
    };

    match entry.methods.get(method) {
        Some(record) => MethodLookup::Found {
            meta: entry.meta.clone(),
            entry: record.clone(),
        },
        None => MethodLookup::UnknownMethod {
            class: entry.meta.class,
        },
    }
}

/// Remove an instance by identifier, dropping its method table. The
/// object's state is freed with the table unless an in-flight call still
/// holds it, in which case it is freed when that call exits.
pub fn remove(id: &str) -> Option<Arc<InstanceMeta>> {
    let guard = registry().lock();
    let entry = guard.borrow_mut().remove(id);

    entry.map(|entry| {
        let meta = entry.meta.clone();

        // The table drops here, with the lock held but the RefCell borrow
        // released, so drop code that touches the registry re-enters
        // cleanly.
        drop(entry);

        debug!("removed instance {} of class {}", meta.id, meta.class);

        meta
    })
}
