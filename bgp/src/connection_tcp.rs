// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::lock;
use crate::log::connection_log;
use crate::messages::{Header, Message, MARKER, MAX_MESSAGE_SIZE};
use crate::IO_TIMEOUT;
use slog::Logger;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Mutex;
use std::time::Duration;

const UNIT_CONNECTION: &str = "connection";

/// How long to wait for the peer to accept a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a single write may stall on a peer that stopped reading before
/// it fails.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Size of the buffer each socket read goes into.
const READ_BUFFER_SIZE: usize = MAX_MESSAGE_SIZE;

/// One TCP connection to the peer. Reads and writes go through separate
/// handles so a reader parked in a timed read never holds up a sender. A
/// third, unlocked handle is kept for shutdown so a sender stuck in a write
/// can always be woken.
pub struct Connection {
    /// Generation number, unique for the lifetime of a speaker.
    pub id: u64,
    pub peer: SocketAddr,
    writer: Mutex<TcpStream>,
    reader: Mutex<(TcpStream, FrameBuffer)>,
    control: TcpStream,
    log: Logger,
}

impl Connection {
    pub fn connect(
        id: u64,
        peer: SocketAddr,
        log: Logger,
    ) -> Result<Connection, Error> {
        let stream = TcpStream::connect_timeout(&peer, CONNECT_TIMEOUT)?;
        Self::with_stream(id, stream, log)
    }

    pub fn with_stream(
        id: u64,
        stream: TcpStream,
        log: Logger,
    ) -> Result<Connection, Error> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        let conn = Connection {
            id,
            peer,
            writer: Mutex::new(stream),
            reader: Mutex::new((reader, FrameBuffer::default())),
            control,
            log,
        };
        connection_log!(conn, info, "connected");
        Ok(conn)
    }

    pub fn send(&self, msg: &Message) -> Result<(), Error> {
        let buf = msg.to_wire()?;
        connection_log!(self, trace, "sending {}", msg.title();
            "message" => format!("{msg:?}")
        );
        lock!(self.writer).write_all(&buf)?;
        Ok(())
    }

    /// Read whatever the socket has and return the complete frames it
    /// finished. An empty vector means the read timed out or only a partial
    /// frame arrived.
    pub fn recv(&self) -> Result<Vec<Vec<u8>>, Error> {
        let mut guard = lock!(self.reader);
        let (stream, frames) = &mut *guard;
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let n = match stream.read(&mut buf) {
            Ok(0) => return Err(Error::PeerClosed),
            Ok(n) => n,
            Err(e)
                if e.kind() == ErrorKind::WouldBlock
                    || e.kind() == ErrorKind::TimedOut
                    || e.kind() == ErrorKind::Interrupted =>
            {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e.into()),
        };
        frames.extend(&buf[..n]);

        let mut out = Vec::new();
        loop {
            match frames.next_frame() {
                Some(Ok(frame)) => out.push(frame),
                Some(Err(e)) => {
                    connection_log!(self, warn, "dropping bytes: {e}")
                }
                None => break,
            }
        }
        Ok(out)
    }

    /// Shut the socket down in both directions. Any thread blocked reading
    /// it wakes up with end of file, any thread blocked writing it fails.
    pub fn close(&self) {
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            if e.kind() != ErrorKind::NotConnected {
                connection_log!(self, warn, "shutdown: {e}");
            }
        }
        connection_log!(self, info, "closed");
    }
}

/// Accumulates raw bytes from the socket and cuts them into frames.
///
/// A frame starts at a marker and runs for the length its header declares.
/// Bytes in front of a marker are garbage and get discarded. A header whose
/// length is out of bounds is skipped by searching for the next marker.
#[derive(Default, Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the next complete frame, if one is buffered. An error reports a
    /// bad header that was skipped; calling again continues the search.
    pub fn next_frame(&mut self) -> Option<Result<Vec<u8>, Error>> {
        match self.buf.windows(MARKER.len()).position(|w| w == MARKER) {
            Some(0) => {}
            Some(pos) => {
                self.buf.drain(..pos);
            }
            None => {
                // Keep a trailing run of ones, it may be the start of a
                // marker split across reads.
                let tail = self
                    .buf
                    .iter()
                    .rev()
                    .take(MARKER.len() - 1)
                    .take_while(|b| **b == 0xff)
                    .count();
                let garbage = self.buf.len() - tail;
                self.buf.drain(..garbage);
                return None;
            }
        }

        if self.buf.len() < Header::WIRE_SIZE {
            return None;
        }
        let length =
            usize::from(u16::from_be_bytes([self.buf[16], self.buf[17]]));
        if !(Header::WIRE_SIZE..=MAX_MESSAGE_SIZE).contains(&length) {
            self.buf.drain(..1);
            return Some(Err(if length < Header::WIRE_SIZE {
                Error::TooSmall(format!("frame length {length}"))
            } else {
                Error::TooLarge(format!("frame length {length}"))
            }));
        }
        if self.buf.len() < length {
            return None;
        }
        Some(Ok(self.buf.drain(..length).collect()))
    }
}
