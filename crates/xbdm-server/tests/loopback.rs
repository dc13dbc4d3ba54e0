//! End-to-end tests that drive a [`Server`] over a real TCP loopback
//! connection, exercising the listener, session, dispatcher and sandbox
//! together rather than any one of them in isolation.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use xbdm_proto::{Dispatcher, Services};
use xbdm_server::{SandboxFs, Server};
use xbdm_types::config::StaticConfig;
use xbdm_types::SimMemory;

fn read_until_bye(stream: &mut TcpStream) -> Vec<u8> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
        if out.ends_with(b"bye\r\n") {
            break;
        }
    }
    out
}

#[test]
fn greeting_drivelist_and_bye_over_real_tcp() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            server.serve_one(&services).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"drivelist\r\nBYE\r\n").unwrap();
        let out = String::from_utf8(read_until_bye(&mut stream)).unwrap();

        assert!(out.starts_with("201- connected\r\n"));
        assert!(out.contains("202- multiline response follows\r\n"));
        assert!(out.contains("drivename=\"HDD\"\r\n"));
        assert!(out.ends_with("200- bye\r\n"));
    });
}

#[test]
fn sendfile_then_getfile_round_trips_through_the_sandbox() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            server.serve_one(&services).unwrap();
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"SENDFILE NAME=\"a.bin\" LENGTH=0x5\r\n").unwrap();
        stream.write_all(b"HELLO").unwrap();
        stream.write_all(b"GETFILE NAME=\"a.bin\"\r\n").unwrap();
        stream.write_all(b"BYE\r\n").unwrap();

        let out = read_until_bye(&mut stream);
        assert!(out.windows(4).any(|w| w == b"204-"));
        assert!(out.windows(4).filter(|w| *w == b"203-").count() >= 2);

        // The GETFILE reply carries a 4-byte little-endian length prefix
        // followed by the raw file bytes, somewhere ahead of the closing
        // `200- bye`.
        let mut needle = 5u32.to_le_bytes().to_vec();
        needle.extend_from_slice(b"HELLO");
        assert!(out.windows(needle.len()).any(|w| w == needle.as_slice()));
        assert!(out.ends_with(b"200- bye\r\n"));
    });
}
