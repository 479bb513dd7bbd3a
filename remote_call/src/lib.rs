// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A compact remote-call runtime: named functions and named remote-object
//! instances invoked across a process boundary, with typed parameter
//! marshalling, in-out parameter propagation, fault marshalling, and
//! server-side instance lifetime management.
//!
//! Moving bytes is delegated to a [`Transport`] collaborator; this crate
//! owns the codec use, the call protocol, the dispatch tables, and the
//! instance registry. See the `remote_functions!`, `remote_interface!`,
//! and `remote_class!` macros for the declaration surface, and
//! [`server::process`] for the dispatch entry point a transport feeds.

pub mod client;
pub mod loopback;
pub mod server;
pub mod stream;

mod macros;

pub use client::{Call, Param, Transport};
pub use wire_format::{Fault, FaultKind, Reader, WireError, WireRead, WireWrite, Writer};

use std::fmt;

/// The possible errors a call site can observe.
#[derive(Debug)]
pub enum Error {
    /// A fault raised by the runtime or marshalled back from the server.
    /// Transport delivery failures surface here too, as
    /// [`FaultKind::Transport`].
    Fault(Fault),

    /// Decoding a reply failed. With an untagged wire format this is what a
    /// signature disagreement between the two peers looks like.
    Wire(WireError),
}

impl Error {
    /// The fault kind, if this error is a fault.
    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Fault(fault) => Some(fault.kind()),
            Self::Wire(_) => None,
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fault(e) => write!(f, "Call fault: {e}"),
            Self::Wire(e) => write!(f, "Wire error: {e}"),
        }
    }
}

impl From<Fault> for Error {
    fn from(e: Fault) -> Self {
        Self::Fault(e)
    }
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        Self::Wire(e)
    }
}
