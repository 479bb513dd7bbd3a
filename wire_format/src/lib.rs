// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Schema-directed binary codec for the remote-call runtime.
//!
//! There are no type tags and no versioning on the wire: both peers decode
//! with the signature they declared, and a disagreement shows up as a
//! decode failure (missing or leftover bytes), not as a diagnostic.

mod fault;

pub use fault::{Fault, FaultKind};

use std::collections::BTreeMap;
use std::fmt;

/// The possible errors that can arise from decoding a value off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended before the value did.
    Truncated,

    /// A string's bytes were not valid UTF-8.
    InvalidUtf8,

    /// A decoded `char` scalar value is not a valid code point.
    InvalidChar(u32),

    /// A fault tag that is not part of the taxonomy.
    InvalidFaultTag(i32),

    /// A reply was decoded completely but bytes were left over. This is the
    /// observable form of a signature disagreement between peers.
    TrailingBytes(usize),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "Buffer ended mid-value"),
            Self::InvalidUtf8 => write!(f, "String is not valid UTF-8"),
            Self::InvalidChar(v) => write!(f, "Invalid char scalar value {v:#x}"),
            Self::InvalidFaultTag(t) => write!(f, "Unknown fault tag {t}"),
            Self::TrailingBytes(n) => write!(f, "{n} bytes left over after decoding"),
        }
    }
}

/// Append-only byte buffer used to assemble a frame.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Discard everything written so far. Dispatch uses this to throw away a
    /// partially written reply once a callee has failed.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received frame.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// The byte at the cursor, without advancing. Dispatch peeks here to
    /// classify a frame before committing to a decode path.
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consume and return the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::Truncated);
        }

        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;

        Ok(bytes)
    }

    /// Consume bytes up to (and including) the next `0x00`, returning the
    /// bytes before it.
    pub fn take_until_nul(&mut self) -> Result<&'a [u8], WireError> {
        let rest = &self.buf[self.pos..];

        let Some(end) = rest.iter().position(|&b| b == 0) else {
            return Err(WireError::Truncated);
        };

        self.pos += end + 1;

        Ok(&rest[..end])
    }
}

/// A value that can be appended to a frame.
pub trait WireWrite {
    /// True for remote-object handles, which are encoded as their instance
    /// identifier string. The runtime keys client tagging and server-side
    /// ownership tracking off this, so it lives with the codec rather than
    /// being rediscovered by runtime type inspection.
    const IS_HANDLE: bool = false;

    fn serialize(&self, w: &mut Writer);
}

/// A value that can be decoded off a frame.
pub trait WireRead: Sized {
    /// See [`WireWrite::IS_HANDLE`].
    const IS_HANDLE: bool = false;

    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError>;
}

// Fixed-width primitives travel as their native byte representation. Both
// peers are assumed to share width and endianness.
macro_rules! wire_primitive {
    ($($t:ty),+) => {
        $(
            impl WireWrite for $t {
                fn serialize(&self, w: &mut Writer) {
                    w.extend_from_slice(&self.to_ne_bytes());
                }
            }

            impl WireRead for $t {
                fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
                    let bytes = r.take(std::mem::size_of::<$t>())?;

                    Ok(<$t>::from_ne_bytes(bytes.try_into().unwrap()))
                }
            }
        )+
    };
}

wire_primitive!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

impl WireWrite for bool {
    fn serialize(&self, w: &mut Writer) {
        w.push(*self as u8);
    }
}

impl WireRead for bool {
    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(r.take(1)?[0] != 0)
    }
}

impl WireWrite for char {
    fn serialize(&self, w: &mut Writer) {
        (*self as u32).serialize(w);
    }
}

impl WireRead for char {
    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let scalar = u32::deserialize(r)?;

        char::from_u32(scalar).ok_or(WireError::InvalidChar(scalar))
    }
}

// Strings are their bytes followed by a single 0x00. There is no length
// prefix, which is why interior NULs are a caller contract violation.
impl WireWrite for str {
    fn serialize(&self, w: &mut Writer) {
        debug_assert!(
            !self.bytes().any(|b| b == 0),
            "strings must not contain interior NULs"
        );

        w.extend_from_slice(self.as_bytes());
        w.push(0);
    }
}

impl WireWrite for &str {
    fn serialize(&self, w: &mut Writer) {
        (**self).serialize(w);
    }
}

impl WireWrite for String {
    fn serialize(&self, w: &mut Writer) {
        self.as_str().serialize(w);
    }
}

impl WireRead for String {
    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let bytes = r.take_until_nul()?;

        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
    }
}

impl<T: WireWrite> WireWrite for Vec<T> {
    fn serialize(&self, w: &mut Writer) {
        self.len().serialize(w);

        for el in self {
            el.serialize(w);
        }
    }
}

impl<T: WireRead> WireRead for Vec<T> {
    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let size = usize::deserialize(r)?;

        // No up-front reservation: a mismatched decode can produce an
        // arbitrary size, and pushing hits Truncated long before it hurts.
        let mut v = Vec::new();
        for _ in 0..size {
            v.push(T::deserialize(r)?);
        }

        Ok(v)
    }
}

impl<K: WireWrite, V: WireWrite> WireWrite for BTreeMap<K, V> {
    fn serialize(&self, w: &mut Writer) {
        self.len().serialize(w);

        for (key, value) in self {
            key.serialize(w);
            value.serialize(w);
        }
    }
}

impl<K: WireRead + Ord, V: WireRead> WireRead for BTreeMap<K, V> {
    fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let size = usize::deserialize(r)?;

        let mut m = BTreeMap::new();
        for _ in 0..size {
            let key = K::deserialize(r)?;
            let value = V::deserialize(r)?;

            m.insert(key, value);
        }

        Ok(m)
    }
}

// Unit occupies no bytes at all. Callees declared without a return value
// decode their "return" from an empty suffix, which keeps the call engine
// uniform.
impl WireWrite for () {
    fn serialize(&self, _w: &mut Writer) {}
}

impl WireRead for () {
    fn deserialize(_r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(())
    }
}

// Tuples are their elements concatenated in declaration order, no count.
macro_rules! wire_tuple {
    ($($t:ident . $idx:tt),+) => {
        impl<$($t: WireWrite),+> WireWrite for ($($t,)+) {
            fn serialize(&self, w: &mut Writer) {
                $( self.$idx.serialize(w); )+
            }
        }

        impl<$($t: WireRead),+> WireRead for ($($t,)+) {
            fn deserialize(r: &mut Reader<'_>) -> Result<Self, WireError> {
                Ok(($( $t::deserialize(r)?, )+))
            }
        }
    };
}

wire_tuple!(A.0);
wire_tuple!(A.0, B.1);
wire_tuple!(A.0, B.1, C.2);
wire_tuple!(A.0, B.1, C.2, D.3);
wire_tuple!(A.0, B.1, C.2, D.3, E.4);
wire_tuple!(A.0, B.1, C.2, D.3, E.4, F.5);
wire_tuple!(A.0, B.1, C.2, D.3, E.4, F.5, G.6);
wire_tuple!(A.0, B.1, C.2, D.3, E.4, F.5, G.6, H.7);
