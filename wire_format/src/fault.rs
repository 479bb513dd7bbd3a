// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The closed fault taxonomy and its wire form.

use std::fmt;

use crate::{Reader, WireError, WireRead, WireWrite, Writer};

/// Every failure a call can surface is one of these kinds.
///
/// The tags are part of the wire format: a reply whose first byte is
/// non-zero is an encoded fault, so every kind that travels has a tag
/// whose low byte is non-zero. `NoError` exists to round out the taxonomy
/// and never appears in a reply; the no-fault marker is the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FaultKind {
    NoError = 0,
    Transport = 1,
    Server = 2,
    InvalidFunction = 3,
    InvalidClassInstance = 4,
    InvalidMethod = 5,
    InvalidInterface = 6,
}

impl FaultKind {
    fn from_tag(tag: i32) -> Result<Self, WireError> {
        match tag {
            0 => Ok(Self::NoError),
            1 => Ok(Self::Transport),
            2 => Ok(Self::Server),
            3 => Ok(Self::InvalidFunction),
            4 => Ok(Self::InvalidClassInstance),
            5 => Ok(Self::InvalidMethod),
            6 => Ok(Self::InvalidInterface),
            t => Err(WireError::InvalidFaultTag(t)),
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::NoError => "no error",
                Self::Transport => "transport error",
                Self::Server => "server error",
                Self::InvalidFunction => "invalid function",
                Self::InvalidClassInstance => "invalid class instance",
                Self::InvalidMethod => "invalid method",
                Self::InvalidInterface => "invalid interface",
            }
        )
    }
}

/// A marshalled failure: a kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    kind: FaultKind,
    what: String,
}

impl Fault {
    pub fn new(kind: FaultKind, what: impl Into<String>) -> Self {
        Self {
            kind,
            what: what.into(),
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn what(&self) -> &str {
        &self.what
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.what)
    }
}

impl WireWrite for Fault {
    fn serialize(&self, w: &mut Writer) {
        (self.kind as i32).serialize(w);
        self.what.serialize(w);
    }
}

impl WireRead for Fault {
    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let tag = i32::deserialize(r)?;
        let what = String::deserialize(r)?;

        Ok(Self {
            kind: FaultKind::from_tag(tag)?,
            what,
        })
    }
}
