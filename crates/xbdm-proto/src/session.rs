//! The per-connection session state machine: reads command lines in
//! `Command` mode, dispatches them, and routes bytes to file sinks while a
//! `SENDFILE`/`SENDVFILE` transfer is in progress.
//!
//! The mode transitions mirror the connect-time handshake and the file
//! receive modes directly: `Command` -> (`ReceivingSingle` |
//! `ReceivingMultiHeader` -> `ReceivingMultiBody`) -> `Command`. Because
//! `Framer` buffers read-ahead bytes internally, a `SENDVFILE` body read
//! that overruns into the next file's header never needs special
//! "re-delivery" handling here: `read_exact_into` simply stops at the byte
//! count it was asked for and leaves the remainder sitting in the framer's
//! buffer for the next call.

use std::io::{self, Read, Write};

use xbdm_codec::crc::XbupdateCrc32;
use xbdm_codec::message::{decode, encode, encode_record};
use xbdm_codec::{Framer, FramerError};
use xbdm_types::fs::{FsError, OpenSink, VirtualPath};
use xbdm_types::Message;

use crate::dispatch::{Dispatcher, Services};
use crate::error::SessionError;
use crate::reply::{ReceiveKind, ReplyPlan};

/// A handshake artefact some XBDM clients probe with before their first real
/// command. Echoed back verbatim; the session's mode is unchanged.
const HANDSHAKE_PROBE: [u8; 12] = [
    0x02, 0x04, 0x05, 0xB4, 0x01, 0x03, 0x03, 0x08, 0x01, 0x01, 0x04, 0x02,
];

enum Mode {
    Command,
    ReceivingSingle {
        sink: Box<dyn OpenSink>,
        remaining: u64,
        kind: ReceiveKind,
        path: VirtualPath,
    },
    ReceivingMultiHeader {
        files_remaining: u32,
        total_files: u32,
    },
    ReceivingMultiBody {
        sink: Box<dyn OpenSink>,
        remaining: u64,
        files_remaining: u32,
        total_files: u32,
    },
}

/// Whether the session loop should keep reading commands or the connection
/// is done.
enum Flow {
    Continue,
    Stop,
}

/// Writes through to an [`OpenSink`] while accumulating a running CRC-32 over
/// every byte written, for `xbupdate` uploads (§7's CRC verification).
struct CrcTee<'a> {
    sink: &'a mut dyn Write,
    crc: &'a mut XbupdateCrc32,
}

impl Write for CrcTee<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.sink.write(buf)?;
        self.crc.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// One XBDM connection: owns the framer and the current receive-mode state.
/// Stateless otherwise — the dispatcher and injected services are borrowed
/// for the duration of a single [`Session::run`] call so one `Dispatcher`
/// and one set of `Services` can be shared across every session a server
/// accepts.
pub struct Session<S> {
    framer: Framer<S>,
    mode: Mode,
}

impl<S> std::fmt::Debug for Session<S> {
    /// `Mode` holds a `Box<dyn OpenSink>` mid-transfer, which isn't `Debug`;
    /// report the mode's name only.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.mode {
            Mode::Command => "Command",
            Mode::ReceivingSingle { .. } => "ReceivingSingle",
            Mode::ReceivingMultiHeader { .. } => "ReceivingMultiHeader",
            Mode::ReceivingMultiBody { .. } => "ReceivingMultiBody",
        };
        f.debug_struct("Session").field("mode", &mode).finish_non_exhaustive()
    }
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Self { framer: Framer::new(stream), mode: Mode::Command }
    }

    pub fn into_inner(self) -> S {
        self.framer.into_inner()
    }

    /// Sends the `201- connected` greeting and services commands until the
    /// peer closes the connection or a handler closes it (`BYE`,
    /// `magicboot`, ...).
    pub fn run(mut self, dispatcher: &Dispatcher, services: &Services<'_>) -> Result<(), SessionError> {
        self.write_message(&Message::response(201).with_flag("connected"))?;

        loop {
            let flow = match self.mode {
                Mode::Command => self.step_command(dispatcher, services)?,
                Mode::ReceivingSingle { .. } => {
                    self.step_receive_single(services)?;
                    Flow::Continue
                }
                Mode::ReceivingMultiHeader { .. } => {
                    self.step_receive_multi_header(services)?;
                    Flow::Continue
                }
                Mode::ReceivingMultiBody { .. } => {
                    self.step_receive_multi_body()?;
                    Flow::Continue
                }
            };
            if let Flow::Stop = flow {
                return Ok(());
            }
        }
    }

    fn write_message(&mut self, msg: &Message) -> Result<(), SessionError> {
        self.framer.write_line(&encode(msg)?)?;
        self.framer.flush()?;
        Ok(())
    }

    fn write_error(&mut self, code: u16, reason: &str) -> Result<(), SessionError> {
        let mut msg = Message::response(code);
        for word in reason.split_ascii_whitespace() {
            msg = msg.with_flag(word);
        }
        self.write_message(&msg)
    }

    /// One iteration of `Command` mode: probes for the handshake artefact,
    /// then reads and dispatches one command line.
    fn step_command(&mut self, dispatcher: &Dispatcher, services: &Services<'_>) -> Result<Flow, SessionError> {
        if self.framer.try_take_handshake(&HANDSHAKE_PROBE)? {
            self.framer.write_binary(&HANDSHAKE_PROBE)?;
            self.framer.flush()?;
            return Ok(Flow::Continue);
        }

        let line = match self.framer.read_line() {
            Ok(line) => line,
            Err(FramerError::Closed) => return Ok(Flow::Stop),
            Err(FramerError::LineTooLong) => {
                self.write_error(405, "line too long")?;
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(e.into()),
        };

        let message = match decode(&line) {
            Ok(m) => m,
            Err(_) => {
                self.write_error(405, "bad line")?;
                return Ok(Flow::Continue);
            }
        };

        let plan = dispatcher.dispatch(&message, services);
        self.apply_plan(plan, services)
    }

    fn apply_plan(&mut self, plan: ReplyPlan, services: &Services<'_>) -> Result<Flow, SessionError> {
        match plan {
            ReplyPlan::Single(msg) => {
                self.write_message(&msg)?;
                Ok(Flow::Continue)
            }
            ReplyPlan::MultiLine(records) => {
                self.write_message(
                    &Message::response(202).with_flag("multiline").with_flag("response").with_flag("follows"),
                )?;
                for record in &records {
                    self.framer.write_line(&encode_record(record)?)?;
                }
                self.framer.write_line(b".\r\n")?;
                self.framer.flush()?;
                Ok(Flow::Continue)
            }
            ReplyPlan::Binary { params, blob } => {
                let mut msg = Message::response(203);
                for (key, value) in params {
                    msg = msg.with_param(key, value);
                }
                msg = msg.with_flag("binary").with_flag("response").with_flag("follows");
                self.write_message(&msg)?;
                self.framer.write_binary(&blob)?;
                self.framer.flush()?;
                Ok(Flow::Continue)
            }
            ReplyPlan::StartReceiveSingle { path, len, kind } => {
                match services.fs.create_write(&path) {
                    Ok(sink) => {
                        self.write_message(
                            &Message::response(204).with_flag("send").with_flag("binary").with_flag("data"),
                        )?;
                        self.mode = Mode::ReceivingSingle { sink, remaining: len, kind, path };
                    }
                    Err(FsError::NotFound(_) | FsError::Traversal(_)) => {
                        self.write_error(430, "path not found")?;
                    }
                    Err(FsError::Io(_)) => {
                        self.write_error(405, "generic error")?;
                    }
                }
                Ok(Flow::Continue)
            }
            ReplyPlan::StartReceiveMulti { count } => {
                self.write_message(
                    &Message::response(204).with_flag("send").with_flag("binary").with_flag("data"),
                )?;
                self.write_binary_ack(count)?;
                self.mode = Mode::ReceivingMultiHeader { files_remaining: count, total_files: count };
                Ok(Flow::Continue)
            }
            ReplyPlan::CloseAfter(msg) => {
                self.write_message(&msg)?;
                Ok(Flow::Stop)
            }
        }
    }

    /// Emits `203- binary response follows` followed by `4 * count` NUL
    /// bytes: both the per-file status-table placeholder sent up front and
    /// the trailing acknowledgement sent once every file has landed share
    /// this exact shape.
    fn write_binary_ack(&mut self, count: u32) -> Result<(), SessionError> {
        self.write_message(&Message::response(203).with_flag("binary").with_flag("response").with_flag("follows"))?;
        self.framer.write_binary(&vec![0u8; count as usize * 4])?;
        self.framer.flush()?;
        Ok(())
    }

    fn step_receive_single(&mut self, services: &Services<'_>) -> Result<(), SessionError> {
        let Mode::ReceivingSingle { mut sink, remaining, kind, path } =
            std::mem::replace(&mut self.mode, Mode::Command)
        else {
            unreachable!("step_receive_single called outside ReceivingSingle");
        };

        let mut crc = XbupdateCrc32::new();
        match kind {
            ReceiveKind::Plain => {
                self.framer.read_exact_into(remaining as usize, &mut *sink)?;
            }
            ReceiveKind::Xbupdate { .. } => {
                let mut tee = CrcTee { sink: &mut *sink, crc: &mut crc };
                self.framer.read_exact_into(remaining as usize, &mut tee)?;
            }
        }
        sink.finish()?;

        match kind {
            ReceiveKind::Plain => {
                // §4.4: plain `SENDFILE` acknowledges with a binary reply
                // carrying a single 4-byte zero word, not the multi-file
                // `count`-sized status table.
                self.write_message(
                    &Message::response(203).with_flag("binary").with_flag("response").with_flag("follows"),
                )?;
                self.framer.write_binary(&[0u8; 4])?;
                self.framer.flush()?;
            }
            ReceiveKind::Xbupdate { expected_crc } => {
                if crc.finalize() == expected_crc {
                    self.write_message(&Message::response(200))?;
                } else {
                    let _ = services.fs.remove(&path);
                    self.write_error(405, "crc mismatch")?;
                }
            }
        }

        self.mode = Mode::Command;
        Ok(())
    }

    fn step_receive_multi_header(&mut self, services: &Services<'_>) -> Result<(), SessionError> {
        let Mode::ReceivingMultiHeader { files_remaining, total_files } = self.mode else {
            unreachable!("step_receive_multi_header called outside ReceivingMultiHeader");
        };

        if files_remaining == 0 {
            self.write_binary_ack(total_files)?;
            self.mode = Mode::Command;
            return Ok(());
        }

        let size_bytes = self.framer.read_exact(4)?;
        let header_size = u32::from_be_bytes(size_bytes.try_into().unwrap());
        let rest_len = (header_size as usize).checked_sub(4).ok_or(SessionError::MalformedMultiHeader)?;
        let rest = self.framer.read_exact(rest_len)?;
        if rest.len() < 28 {
            return Err(SessionError::MalformedMultiHeader);
        }

        let mut fields = [0u32; 7];
        for (i, field) in fields.iter_mut().enumerate() {
            *field = u32::from_be_bytes(rest[i * 4..i * 4 + 4].try_into().unwrap());
        }
        let [_create_hi, _create_lo, _modify_hi, _modify_lo, size_hi, size_lo, _attrs] = fields;
        let file_size = (u64::from(size_hi) << 32) | u64::from(size_lo);

        let path_bytes = &rest[28..];
        let nul_at = path_bytes.iter().position(|&b| b == 0).unwrap_or(path_bytes.len());
        let path_str = std::str::from_utf8(&path_bytes[..nul_at]).map_err(|_| SessionError::MalformedMultiHeader)?;
        let path = VirtualPath::new(path_str.to_string());

        let sink = services.fs.create_write(&path).map_err(|_| SessionError::MalformedMultiHeader)?;
        self.mode = Mode::ReceivingMultiBody { sink, remaining: file_size, files_remaining, total_files };
        Ok(())
    }

    fn step_receive_multi_body(&mut self) -> Result<(), SessionError> {
        let Mode::ReceivingMultiBody { mut sink, remaining, files_remaining, total_files } =
            std::mem::replace(&mut self.mode, Mode::Command)
        else {
            unreachable!("step_receive_multi_body called outside ReceivingMultiBody");
        };

        self.framer.read_exact_into(remaining as usize, &mut *sink)?;
        sink.finish()?;

        let files_remaining = files_remaining - 1;
        if files_remaining == 0 {
            self.write_binary_ack(total_files)?;
            self.mode = Mode::Command;
        } else {
            self.mode = Mode::ReceivingMultiHeader { files_remaining, total_files };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use xbdm_types::config::StaticConfig;
    use xbdm_types::fs::{DirEntry, FileMeta, Filesystem};
    use xbdm_types::{FileTime, SimMemory};

    use super::*;
    use crate::dispatch::Dispatcher;

    /// A `Read + Write` double with separate input/output buffers, so a test
    /// can script what the "client" sends and assert on what the session
    /// wrote back.
    struct DuplexStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for DuplexStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for DuplexStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemFs {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    struct MemSink {
        path: String,
        buf: Vec<u8>,
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Write for MemSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl OpenSink for MemSink {
        fn finish(self: Box<Self>) -> io::Result<()> {
            self.files.lock().unwrap().insert(self.path, self.buf);
            Ok(())
        }
    }

    impl Filesystem for MemFs {
        fn stat(&self, path: &VirtualPath) -> Result<FileMeta, FsError> {
            self.files
                .lock()
                .unwrap()
                .get(path.as_str())
                .map(|data| FileMeta {
                    size: data.len() as u64,
                    created: FileTime(0),
                    modified: FileTime(0),
                    is_directory: false,
                })
                .ok_or_else(|| FsError::NotFound(path.as_str().to_string()))
        }
        fn list_dir(&self, _path: &VirtualPath) -> Result<Vec<DirEntry>, FsError> {
            Ok(Vec::new())
        }
        fn open_read(&self, path: &VirtualPath) -> Result<Box<dyn Read + Send>, FsError> {
            let data = self
                .files
                .lock()
                .unwrap()
                .get(path.as_str())
                .cloned()
                .ok_or_else(|| FsError::NotFound(path.as_str().to_string()))?;
            Ok(Box::new(Cursor::new(data)))
        }
        fn create_write(&self, path: &VirtualPath) -> Result<Box<dyn OpenSink>, FsError> {
            Ok(Box::new(MemSink { path: path.as_str().to_string(), buf: Vec::new(), files: Arc::clone(&self.files) }))
        }
        fn mkdir(&self, _path: &VirtualPath) -> Result<(), FsError> {
            Ok(())
        }
        fn remove(&self, path: &VirtualPath) -> Result<(), FsError> {
            self.files.lock().unwrap().remove(path.as_str());
            Ok(())
        }
        fn remove_tree(&self, _path: &VirtualPath) -> Result<(), FsError> {
            Ok(())
        }
        fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> Result<(), FsError> {
            let mut files = self.files.lock().unwrap();
            if let Some(data) = files.remove(from.as_str()) {
                files.insert(to.as_str().to_string(), data);
            }
            Ok(())
        }
    }

    #[test]
    fn greeting_then_bye_closes() {
        let fs = MemFs::default();
        let config = StaticConfig::default();
        let memory = SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let dispatcher = Dispatcher::with_default_handlers();

        let stream = DuplexStream { input: Cursor::new(b"BYE\r\n".to_vec()), output: Vec::new() };
        let session = Session::new(stream);
        session.run(&dispatcher, &services).unwrap();
        let out = session.into_inner().output;
        assert_eq!(out, b"201- connected\r\n200- bye\r\n");
    }

    #[test]
    fn drivelist_is_multiline() {
        let fs = MemFs::default();
        let config = StaticConfig::default();
        let memory = SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let dispatcher = Dispatcher::with_default_handlers();

        let stream = DuplexStream { input: Cursor::new(b"drivelist\r\nBYE\r\n".to_vec()), output: Vec::new() };
        let session = Session::new(stream);
        session.run(&dispatcher, &services).unwrap();
        let out = String::from_utf8(session.into_inner().output).unwrap();
        assert!(out.contains("202- multiline response follows\r\n"));
        assert!(out.contains("drivename=\"HDD\"\r\n"));
        assert!(out.ends_with(".\r\n200- bye\r\n"));
    }

    #[test]
    fn sendfile_fragmented_across_reads_writes_exact_bytes() {
        let fs = MemFs::default();
        let config = StaticConfig::default();
        let memory = SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let dispatcher = Dispatcher::with_default_handlers();

        let mut input = b"SENDFILE NAME=\"E:\\b.bin\" LENGTH=0x5\r\n".to_vec();
        input.extend_from_slice(b"HELLO");
        input.extend_from_slice(b"BYE\r\n");

        let files = Arc::clone(&fs.files);
        let stream = DuplexStream { input: Cursor::new(input), output: Vec::new() };
        let session = Session::new(stream);
        session.run(&dispatcher, &services).unwrap();

        assert_eq!(files.lock().unwrap().get("E:\\b.bin").unwrap(), b"HELLO");
        let out = session.into_inner().output;
        assert!(out.windows(4).any(|w| w == b"204-"));
        assert!(out.ends_with(b"200- bye\r\n"));
    }

    #[test]
    fn sendvfile_two_files_split_across_header_boundary() {
        let fs = MemFs::default();
        let config = StaticConfig::default();
        let memory = SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let dispatcher = Dispatcher::with_default_handlers();

        fn file_header(path: &str, size: u64) -> Vec<u8> {
            let mut header = Vec::new();
            header.extend_from_slice(&0u32.to_be_bytes()); // createhi
            header.extend_from_slice(&0u32.to_be_bytes()); // createlo
            header.extend_from_slice(&0u32.to_be_bytes()); // modifyhi
            header.extend_from_slice(&0u32.to_be_bytes()); // modifylo
            header.extend_from_slice(&((size >> 32) as u32).to_be_bytes());
            header.extend_from_slice(&(size as u32).to_be_bytes());
            header.extend_from_slice(&0u32.to_be_bytes()); // attrs
            header.extend_from_slice(path.as_bytes());
            header.push(0);
            let total_len = 4 + header.len();
            let mut out = (total_len as u32).to_be_bytes().to_vec();
            out.extend_from_slice(&header);
            out
        }

        let mut body = b"SENDVFILE COUNT=0x2\r\n".to_vec();
        body.extend_from_slice(&file_header("E:\\a.bin", 3));
        body.extend_from_slice(b"ABC");
        body.extend_from_slice(&file_header("E:\\b.bin", 2));
        body.extend_from_slice(b"XY");
        body.extend_from_slice(b"BYE\r\n");

        let files = Arc::clone(&fs.files);
        let stream = DuplexStream { input: Cursor::new(body), output: Vec::new() };
        let session = Session::new(stream);
        session.run(&dispatcher, &services).unwrap();

        assert_eq!(files.lock().unwrap().get("E:\\a.bin").unwrap(), b"ABC");
        assert_eq!(files.lock().unwrap().get("E:\\b.bin").unwrap(), b"XY");
    }

    #[test]
    fn xbupdate_crc_mismatch_is_rejected() {
        let fs = MemFs::default();
        let config = StaticConfig::default();
        let memory = SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let dispatcher = Dispatcher::with_default_handlers();

        let mut input =
            b"xbupdate!sysfileupd name=\"E:\\x.bin\" size=0x3 crc=0xDEADBEEF\r\n".to_vec();
        input.extend_from_slice(b"ABC");
        input.extend_from_slice(b"BYE\r\n");

        let stream = DuplexStream { input: Cursor::new(input), output: Vec::new() };
        let session = Session::new(stream);
        session.run(&dispatcher, &services).unwrap();
        let out = String::from_utf8(session.into_inner().output).unwrap();
        assert!(out.contains("405-"));
    }

    #[test]
    fn xbupdate_crc_match_is_accepted() {
        let fs = MemFs::default();
        let config = StaticConfig::default();
        let memory = SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let dispatcher = Dispatcher::with_default_handlers();

        let crc = xbdm_codec::crc::crc32_xbupdate(b"ABC");
        let mut input =
            format!("xbupdate!sysfileupd name=\"E:\\x.bin\" size=0x3 crc=0x{crc:X}\r\n").into_bytes();
        input.extend_from_slice(b"ABC");
        input.extend_from_slice(b"BYE\r\n");

        let stream = DuplexStream { input: Cursor::new(input), output: Vec::new() };
        let session = Session::new(stream);
        session.run(&dispatcher, &services).unwrap();
        let out = String::from_utf8(session.into_inner().output).unwrap();
        assert!(out.contains("200-"));
        assert!(!out.contains("405-"));
    }

    #[test]
    fn handshake_probe_is_echoed_and_state_unchanged() {
        let fs = MemFs::default();
        let config = StaticConfig::default();
        let memory = SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let dispatcher = Dispatcher::with_default_handlers();

        let mut input = HANDSHAKE_PROBE.to_vec();
        input.extend_from_slice(b"BYE\r\n");
        let stream = DuplexStream { input: Cursor::new(input), output: Vec::new() };
        let session = Session::new(stream);
        session.run(&dispatcher, &services).unwrap();
        let out = session.into_inner().output;
        let mut expected = b"201- connected\r\n".to_vec();
        expected.extend_from_slice(&HANDSHAKE_PROBE);
        expected.extend_from_slice(b"200- bye\r\n");
        assert_eq!(out, expected);
    }
}
