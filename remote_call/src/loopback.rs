// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! An in-process transport that hands frames straight to the dispatcher.
//! This is what tests (and single-process demos) use in place of a real
//! connection.

use crate::client::Transport;
use crate::server;

/// Liveness predicate shape shared with [`server::process`].
pub type Liveness = Box<dyn Fn(&str) -> bool>;

#[derive(Default)]
pub struct Loopback {
    client: String,
    liveness: Option<Liveness>,
}

impl Loopback {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loopback that identifies itself to the server, so instances it is
    /// handed can be tracked as owned by it.
    pub fn with_client_id(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            liveness: None,
        }
    }

    /// Attach the liveness predicate the dispatcher consults before every
    /// frame.
    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = Some(liveness);
        self
    }
}

impl Transport for Loopback {
    fn send_receive(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        Some(server::process(frame, self.liveness.as_deref()))
    }

    fn client_id(&self) -> String {
        self.client.clone()
    }
}
