//! The client façade: one TCP connection per operation. Every public method
//! connects, performs the greeting handshake, sends exactly one command,
//! reads its reply (following up with whatever extra binary reads/writes
//! that command's reply shape demands), and closes the connection — with
//! `BYE` first, except after `magicboot`, which the console answers by
//! rebooting and dropping the socket itself.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use xbdm_codec::crc::crc32_xbupdate;
use xbdm_codec::message::{decode, decode_record, encode};
use xbdm_codec::Framer;
use xbdm_types::fs::{DirEntry, FileMeta, VirtualPath};
use xbdm_types::{FileTime, Message, Parameter, Record};

use crate::error::ClientError;

/// A parsed server reply, before any command-specific binary follow-up has
/// been consumed from the wire.
enum Reply {
    Single(Message),
    MultiLine(Vec<Record>),
    /// `203- binary response follows`: the blob itself is read separately,
    /// since its shape (length-prefixed, fixed-size, or count-sized) is a
    /// property of the command, not of the reply code.
    Binary(Message),
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, ClientError> {
    if hex.len() % 2 != 0 {
        return Err(ClientError::UnexpectedReply(202));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ClientError::UnexpectedReply(202)))
        .collect()
}

fn reason_text(msg: &Message) -> String {
    msg.flags.iter().collect::<Vec<_>>().join(" ")
}

fn record_to_entry(record: &Record) -> Result<FileMeta, ClientError> {
    let dword = |key: &str| {
        record
            .params
            .get(key)
            .and_then(Parameter::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(ClientError::MalformedAck)
    };
    let size = (u64::from(dword("sizehi")?) << 32) | u64::from(dword("sizelo")?);
    let created = FileTime::from_halves(dword("createhi")?, dword("createlo")?);
    let modified = FileTime::from_halves(dword("changehi")?, dword("changelo")?);
    Ok(FileMeta { size, created, modified, is_directory: record.flags.contains("directory") })
}

/// A thin, connectionless handle: it remembers the server address only.
/// Every operation below opens its own `TcpStream`.
pub struct Client {
    addr: SocketAddr,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("addr", &self.addr).finish()
    }
}

impl Client {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn resolve(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address resolved"))?;
        Ok(Self::new(addr))
    }

    fn open(&self) -> Result<Framer<TcpStream>, ClientError> {
        let stream = TcpStream::connect(self.addr)?;
        stream.set_nodelay(true).ok();
        let mut framer = Framer::new(stream);
        let greeting = framer.read_line()?;
        let msg = decode(&greeting)?;
        if msg.status() != Some(201) {
            return Err(ClientError::UnexpectedReply(msg.status().unwrap_or(0)));
        }
        Ok(framer)
    }

    fn send(&self, framer: &mut Framer<TcpStream>, message: &Message) -> Result<(), ClientError> {
        framer.write_line(&encode(message)?)?;
        framer.flush()?;
        Ok(())
    }

    fn read_reply(&self, framer: &mut Framer<TcpStream>) -> Result<Reply, ClientError> {
        let line = framer.read_line()?;
        let msg = decode(&line)?;
        match msg.status() {
            Some(202) => {
                let mut records = Vec::new();
                loop {
                    let line = framer.read_line()?;
                    if line.as_slice() == b"." {
                        break;
                    }
                    records.push(decode_record(&line)?);
                }
                Ok(Reply::MultiLine(records))
            }
            Some(203) => Ok(Reply::Binary(msg)),
            Some(code) if (200..300).contains(&code) => Ok(Reply::Single(msg)),
            Some(code) => Err(ClientError::Rejected { code, reason: reason_text(&msg) }),
            None => Err(ClientError::UnexpectedReply(0)),
        }
    }

    /// Sends `BYE` and reads its acknowledgement, ignoring a connection the
    /// peer has already closed.
    fn close(&self, mut framer: Framer<TcpStream>) {
        if self.send(&mut framer, &Message::command("bye")).is_ok() {
            let _ = self.read_reply(&mut framer);
        }
    }

    pub fn drivelist(&self) -> Result<Vec<String>, ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("drivelist"))?;
        let records = match self.read_reply(&mut framer)? {
            Reply::MultiLine(records) => records,
            other => return Err(unexpected(other)),
        };
        self.close(framer);
        Ok(records
            .iter()
            .filter_map(|r| r.params.get("drivename").and_then(Parameter::as_str).map(str::to_string))
            .collect())
    }

    pub fn dirlist(&self, path: &VirtualPath) -> Result<Vec<DirEntry>, ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("dirlist").with_param("name", path.as_str()))?;
        let records = match self.read_reply(&mut framer)? {
            Reply::MultiLine(records) => records,
            other => return Err(unexpected(other)),
        };
        self.close(framer);
        records
            .iter()
            .map(|r| {
                let name = r.params.get("name").and_then(Parameter::as_str).ok_or(ClientError::MalformedAck)?;
                Ok(DirEntry { name: name.to_string(), meta: record_to_entry(r)? })
            })
            .collect()
    }

    pub fn getfileattributes(&self, path: &VirtualPath) -> Result<FileMeta, ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("getfileattributes").with_param("name", path.as_str()))?;
        let records = match self.read_reply(&mut framer)? {
            Reply::MultiLine(records) => records,
            other => return Err(unexpected(other)),
        };
        self.close(framer);
        let record = records.first().ok_or(ClientError::MalformedAck)?;
        record_to_entry(record)
    }

    pub fn getfile(&self, path: &VirtualPath) -> Result<Vec<u8>, ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("getfile").with_param("name", path.as_str()))?;
        match self.read_reply(&mut framer)? {
            Reply::Binary(_) => {}
            other => return Err(unexpected(other)),
        }
        let len_bytes = framer.read_exact(4)?;
        let len = u32::from_le_bytes(len_bytes.try_into().unwrap());
        let data = framer.read_exact(len as usize)?;
        self.close(framer);
        Ok(data)
    }

    pub fn sendfile(&self, path: &VirtualPath, data: &[u8]) -> Result<(), ClientError> {
        let mut framer = self.open()?;
        self.send(
            &mut framer,
            &Message::command("sendfile").with_param("name", path.as_str()).with_param("length", data.len() as u32),
        )?;
        match self.read_reply(&mut framer)? {
            Reply::Single(msg) if msg.status() == Some(204) => {}
            other => return Err(unexpected(other)),
        }
        framer.write_binary(data)?;
        framer.flush()?;
        match self.read_reply(&mut framer)? {
            Reply::Binary(_) => {
                framer.read_exact(4)?;
            }
            other => return Err(unexpected(other)),
        }
        self.close(framer);
        Ok(())
    }

    /// Uploads a whole directory's worth of files in a single `SENDVFILE`
    /// transfer. Each entry is `(virtual path, file bytes)`.
    pub fn sendvfile(&self, files: &[(VirtualPath, Vec<u8>)]) -> Result<(), ClientError> {
        let mut framer = self.open()?;
        let count = files.len() as u32;
        self.send(&mut framer, &Message::command("sendvfile").with_param("count", count))?;

        match self.read_reply(&mut framer)? {
            Reply::Single(msg) if msg.status() == Some(204) => {}
            other => return Err(unexpected(other)),
        }
        match self.read_reply(&mut framer)? {
            Reply::Binary(_) => {
                framer.read_exact(count as usize * 4)?;
            }
            other => return Err(unexpected(other)),
        }

        for (path, data) in files {
            let mut header = Vec::new();
            header.extend_from_slice(&0u32.to_be_bytes()); // createhi
            header.extend_from_slice(&0u32.to_be_bytes()); // createlo
            header.extend_from_slice(&0u32.to_be_bytes()); // modifyhi
            header.extend_from_slice(&0u32.to_be_bytes()); // modifylo
            header.extend_from_slice(&((data.len() as u64 >> 32) as u32).to_be_bytes());
            header.extend_from_slice(&(data.len() as u32).to_be_bytes());
            header.extend_from_slice(&0u32.to_be_bytes()); // attrs
            header.extend_from_slice(path.as_str().as_bytes());
            header.push(0);

            let total_len = 4 + header.len();
            framer.write_binary(&(total_len as u32).to_be_bytes())?;
            framer.write_binary(&header)?;
            framer.write_binary(data)?;
        }
        framer.flush()?;

        match self.read_reply(&mut framer)? {
            Reply::Binary(_) => {
                framer.read_exact(count as usize * 4)?;
            }
            other => return Err(unexpected(other)),
        }
        self.close(framer);
        Ok(())
    }

    /// Uploads `data` to `path` via `xbupdate!sysfileupd`, tagging the
    /// request with the same reflected CRC-32 (no final XOR) the console
    /// verifies server-side.
    pub fn xbupdate_upload(&self, path: &VirtualPath, data: &[u8]) -> Result<(), ClientError> {
        let crc = crc32_xbupdate(data);
        let mut framer = self.open()?;
        self.send(
            &mut framer,
            &Message::command("xbupdate!sysfileupd")
                .with_param("name", path.as_str())
                .with_param("size", data.len() as u32)
                .with_param("crc", crc),
        )?;
        match self.read_reply(&mut framer)? {
            Reply::Single(msg) if msg.status() == Some(204) => {}
            other => return Err(unexpected(other)),
        }
        framer.write_binary(data)?;
        framer.flush()?;
        let result = match self.read_reply(&mut framer) {
            Ok(Reply::Single(msg)) if msg.status() == Some(200) => Ok(()),
            Ok(other) => Err(unexpected(other)),
            Err(ClientError::Rejected { code: 405, .. }) => Err(ClientError::CrcMismatch),
            Err(e) => Err(e),
        };
        self.close(framer);
        result
    }

    pub fn delete(&self, path: &VirtualPath, recursive: bool) -> Result<(), ClientError> {
        let mut framer = self.open()?;
        let mut cmd = Message::command("delete").with_param("name", path.as_str());
        if recursive {
            cmd = cmd.with_flag("dir");
        }
        self.send(&mut framer, &cmd)?;
        self.expect_ok(&mut framer)?;
        self.close(framer);
        Ok(())
    }

    pub fn mkdir(&self, path: &VirtualPath) -> Result<(), ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("mkdir").with_param("name", path.as_str()))?;
        self.expect_ok(&mut framer)?;
        self.close(framer);
        Ok(())
    }

    pub fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> Result<(), ClientError> {
        let mut framer = self.open()?;
        self.send(
            &mut framer,
            &Message::command("rename").with_param("name", from.as_str()).with_param("newname", to.as_str()),
        )?;
        self.expect_ok(&mut framer)?;
        self.close(framer);
        Ok(())
    }

    pub fn getmem(&self, addr: u32, len: u32) -> Result<Vec<u8>, ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("getmem").with_param("addr", addr).with_param("length", len))?;
        let records = match self.read_reply(&mut framer)? {
            Reply::MultiLine(records) => records,
            other => return Err(unexpected(other)),
        };
        self.close(framer);
        let mut bytes = Vec::new();
        for record in &records {
            let hex = record.params.get("data").and_then(Parameter::as_str).ok_or(ClientError::MalformedAck)?;
            bytes.extend(decode_hex(hex)?);
        }
        Ok(bytes)
    }

    pub fn setmem(&self, addr: u32, data: &[u8]) -> Result<(), ClientError> {
        let mut framer = self.open()?;
        self.send(
            &mut framer,
            &Message::command("setmem").with_param("addr", addr).with_param("data", encode_hex(data)),
        )?;
        self.expect_ok(&mut framer)?;
        self.close(framer);
        Ok(())
    }

    pub fn systime(&self) -> Result<FileTime, ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("systime"))?;
        let msg = match self.read_reply(&mut framer)? {
            Reply::Single(msg) => msg,
            other => return Err(unexpected(other)),
        };
        self.close(framer);
        let high = msg.params.get("high").and_then(Parameter::as_u64).ok_or(ClientError::MalformedAck)? as u32;
        let low = msg.params.get("low").and_then(Parameter::as_u64).ok_or(ClientError::MalformedAck)? as u32;
        Ok(FileTime::from_halves(high, low))
    }

    pub fn systeminfo(&self) -> Result<Vec<Record>, ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("systeminfo"))?;
        let records = match self.read_reply(&mut framer)? {
            Reply::MultiLine(records) => records,
            other => return Err(unexpected(other)),
        };
        self.close(framer);
        Ok(records)
    }

    /// Reboots the console. The console answers `200-`, then drops the
    /// connection itself; there is no `BYE` handshake to perform afterward.
    pub fn magicboot(&self) -> Result<(), ClientError> {
        let mut framer = self.open()?;
        self.send(&mut framer, &Message::command("magicboot"))?;
        match self.read_reply(&mut framer)? {
            Reply::Single(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn expect_ok(&self, framer: &mut Framer<TcpStream>) -> Result<(), ClientError> {
        match self.read_reply(framer)? {
            Reply::Single(msg) if msg.status() == Some(200) => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(reply: Reply) -> ClientError {
    let status = match reply {
        Reply::Single(msg) | Reply::Binary(msg) => msg.status().unwrap_or(0),
        Reply::MultiLine(_) => 202,
    };
    ClientError::UnexpectedReply(status)
}
