//! The byte-stream framer.
//!
//! `Framer` owns a read-ahead buffer over the connection: a single `read()`
//! can return more bytes than the current mode needs (a full line plus the
//! start of a following binary block, or the tail of one file plus the next
//! file's header in `SENDVFILE`), and those extra bytes must survive into the
//! next call rather than being dropped. Read-ahead buffering realizes that
//! invariant — the framer never speculatively consumes past a mode boundary —
//! without hand-rolling a byte-at-a-time reader: the *logical* position in
//! the stream never desyncs, even though more bytes than strictly necessary
//! may already sit in our buffer.

use std::collections::VecDeque;
use std::io::{Read, Write};

use crate::error::FramerError;
use crate::message::MAX_LINE_LEN;

const READ_CHUNK: usize = 8192;

#[derive(Debug)]
pub struct Framer<S> {
    stream: S,
    buf: VecDeque<u8>,
}

impl<S: Read + Write> Framer<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, buf: VecDeque::new() }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    fn fill(&mut self) -> Result<(), FramerError> {
        let mut tmp = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut tmp)?;
        if n == 0 {
            return Err(FramerError::Closed);
        }
        self.buf.extend(&tmp[..n]);
        Ok(())
    }

    fn find_crlf(&self) -> Option<usize> {
        let len = self.buf.len();
        if len < 2 {
            return None;
        }
        (0..len - 1).find(|&i| self.buf[i] == b'\r' && self.buf[i + 1] == b'\n')
    }

    /// Reads one line, with its `\r\n` terminator stripped. Bytes may arrive
    /// split across arbitrarily many TCP segments; the only requirement is
    /// that *some* earlier `fill` eventually delivers the `\r\n`.
    pub fn read_line(&mut self) -> Result<Vec<u8>, FramerError> {
        loop {
            if let Some(pos) = self.find_crlf() {
                if pos + 2 > MAX_LINE_LEN {
                    self.buf.drain(..pos + 2);
                    return Err(FramerError::LineTooLong);
                }
                let line: Vec<u8> = self.buf.drain(..pos).collect();
                self.buf.drain(..2); // \r\n
                return Ok(line);
            }
            if self.buf.len() + 2 > MAX_LINE_LEN {
                return Err(FramerError::LineTooLong);
            }
            self.fill()?;
        }
    }

    /// Reads exactly `n` bytes and returns them.
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, FramerError> {
        let mut out = Vec::with_capacity(n);
        self.read_exact_into(n, &mut out)?;
        Ok(out)
    }

    /// Reads exactly `n` bytes, writing each chunk to `sink` as it arrives
    /// rather than accumulating the whole payload in memory — the shape a
    /// multi-gigabyte `xbupdate` upload needs. Never consumes more than `n`
    /// bytes from the stream.
    pub fn read_exact_into(&mut self, mut n: usize, sink: &mut dyn Write) -> Result<(), FramerError> {
        if !self.buf.is_empty() && n > 0 {
            let take = n.min(self.buf.len());
            let chunk: Vec<u8> = self.buf.drain(..take).collect();
            sink.write_all(&chunk)?;
            n -= take;
        }

        let mut tmp = [0u8; READ_CHUNK];
        while n > 0 {
            let want = n.min(tmp.len());
            let got = self.stream.read(&mut tmp[..want])?;
            if got == 0 {
                return Err(FramerError::Closed);
            }
            sink.write_all(&tmp[..got])?;
            n -= got;
        }
        Ok(())
    }

    /// Checks whether the next bytes on the wire are exactly `pattern` (a
    /// handshake artefact that is echoed back verbatim) and consumes them if
    /// so. Bails out as soon as a buffered
    /// byte mismatches rather than blocking for the full pattern length, so
    /// an ordinary short command line is never mistaken for a stalled
    /// handshake attempt.
    pub fn try_take_handshake(&mut self, pattern: &[u8]) -> Result<bool, FramerError> {
        loop {
            let have = self.buf.len().min(pattern.len());
            if !self.buf.iter().take(have).eq(pattern[..have].iter()) {
                return Ok(false);
            }
            if self.buf.len() >= pattern.len() {
                self.buf.drain(..pattern.len());
                return Ok(true);
            }
            self.fill()?;
        }
    }

    /// Writes a line, appending `\r\n` if `bytes` doesn't already end with
    /// it.
    pub fn write_line(&mut self, bytes: &[u8]) -> Result<(), FramerError> {
        if bytes.len() > MAX_LINE_LEN {
            return Err(FramerError::LineTooLong);
        }
        self.stream.write_all(bytes)?;
        if !bytes.ends_with(b"\r\n") {
            self.stream.write_all(b"\r\n")?;
        }
        Ok(())
    }

    pub fn write_binary(&mut self, bytes: &[u8]) -> Result<(), FramerError> {
        self.stream.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), FramerError> {
        self.stream.flush()?;
        Ok(())
    }
}
