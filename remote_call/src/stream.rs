// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Frame delimiting for byte-stream connections, and the transport /
//! serve loop built on it.
//!
//! Each frame is preceded by a 4-byte record mark: the frame length with
//! the top bit set. The top bit is reserved for continuation records,
//! which this implementation does not produce or accept.

use log::*;

use std::io::{self, Read, Write};

use crate::client::Transport;
use crate::server;

const FINAL_RECORD: u32 = 1 << 31;

/// Write one length-delimited frame.
pub fn write_frame<S: Write>(stream: &mut S, frame: &[u8]) -> io::Result<()> {
    let mark = u32::try_from(frame.len()).unwrap() | FINAL_RECORD;

    stream.write_all(&mark.to_be_bytes())?;
    stream.write_all(frame)?;
    stream.flush()
}

/// Read one length-delimited frame. `Ok(None)` is a clean end of stream
/// (the peer closed between frames).
pub fn read_frame<S: Read>(stream: &mut S) -> io::Result<Option<Vec<u8>>> {
    let mut mark = [0_u8; 4];

    if let Err(e) = stream.read_exact(&mut mark) {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }

        return Err(e);
    }

    let mark = u32::from_be_bytes(mark);

    if mark & FINAL_RECORD == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "continuation records are not supported",
        ));
    }

    let mut frame = vec![0; (mark & !FINAL_RECORD) as usize];
    stream.read_exact(&mut frame)?;

    Ok(Some(frame))
}

/// A request/reply transport over any byte stream: TCP, a Unix socket, a
/// socketpair.
pub struct StreamTransport<S> {
    stream: S,
    client: String,
}

impl<S: Read + Write> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            client: String::new(),
        }
    }

    /// A transport that identifies its client to the server, opting into
    /// server-side tracking of the instances this client owns.
    pub fn with_client_id(stream: S, client: impl Into<String>) -> Self {
        Self {
            stream,
            client: client.into(),
        }
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn send_receive(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        if let Err(e) = write_frame(&mut self.stream, frame) {
            warn!("error sending call frame: {e}");
            return None;
        }

        match read_frame(&mut self.stream) {
            Ok(Some(reply)) => Some(reply),
            Ok(None) => {
                warn!("connection closed before the reply arrived");
                None
            }
            Err(e) => {
                warn!("error reading reply frame: {e}");
                None
            }
        }
    }

    fn client_id(&self) -> String {
        self.client.clone()
    }
}

/// Serve one connection to completion: read each request frame, dispatch
/// it, write the reply frame back. Returns once the peer closes cleanly.
pub fn serve_connection<S: Read + Write>(
    mut stream: S,
    liveness: Option<&dyn Fn(&str) -> bool>,
) -> io::Result<()> {
    while let Some(request) = read_frame(&mut stream)? {
        trace!("serving a {} byte request frame", request.len());

        let reply = server::process(&request, liveness);
        write_frame(&mut stream, &reply)?;
    }

    Ok(())
}
