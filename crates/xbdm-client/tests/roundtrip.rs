//! Drives a [`Client`] against a real [`xbdm_server::Server`] over loopback
//! TCP, one test per operation family. Each operation is its own connection,
//! so the server side is told exactly how many connections to expect.

use std::thread;

use xbdm_client::Client;
use xbdm_proto::{Dispatcher, Services};
use xbdm_server::{SandboxFs, Server};
use xbdm_types::config::StaticConfig;
use xbdm_types::fs::VirtualPath;
use xbdm_types::SimMemory;

#[test]
fn drivelist_lists_configured_drives() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| server.serve_n(&services, 1).unwrap());
        let client = Client::new(addr);
        let drives = client.drivelist().unwrap();
        assert_eq!(drives, vec!["HDD", "DVD"]);
    });
}

#[test]
fn sendfile_then_getfile_round_trips_bytes() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| server.serve_n(&services, 2).unwrap());
        let client = Client::new(addr);
        let path = VirtualPath::new("a.bin");
        client.sendfile(&path, b"hello world").unwrap();
        let data = client.getfile(&path).unwrap();
        assert_eq!(data, b"hello world");
    });
}

#[test]
fn mkdir_then_dirlist_sees_uploaded_file() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| server.serve_n(&services, 3).unwrap());
        let client = Client::new(addr);
        client.mkdir(&VirtualPath::new("sub")).unwrap();
        client.sendfile(&VirtualPath::new("sub\\a.bin"), b"xyz").unwrap();
        let entries = client.dirlist(&VirtualPath::new("sub")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.bin");
        assert_eq!(entries[0].meta.size, 3);
    });
}

#[test]
fn setmem_then_getmem_round_trips_through_console_memory() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| server.serve_n(&services, 2).unwrap());
        let client = Client::new(addr);
        client.setmem(4, &[1, 2, 3]).unwrap();
        let data = client.getmem(4, 3).unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    });
}

#[test]
fn xbupdate_upload_with_correct_crc_is_accepted() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| server.serve_n(&services, 1).unwrap());
        let client = Client::new(addr);
        client.xbupdate_upload(&VirtualPath::new("patch.bin"), b"PATCHDATA").unwrap();
    });
}

#[test]
fn sendvfile_uploads_two_files_in_one_connection() {
    let root = tempfile::tempdir().unwrap();
    let fs = SandboxFs::new(root.path());
    let config = StaticConfig::default();
    let memory = SimMemory::new(16);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();
    let server = Server::bind("127.0.0.1:0", &dispatcher).unwrap();
    let addr = server.local_addr().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| server.serve_n(&services, 3).unwrap());
        let client = Client::new(addr);
        let files = vec![
            (VirtualPath::new("a.bin"), b"AAA".to_vec()),
            (VirtualPath::new("b.bin"), b"BB".to_vec()),
        ];
        client.sendvfile(&files).unwrap();

        assert_eq!(client.getfile(&VirtualPath::new("a.bin")).unwrap(), b"AAA");
        assert_eq!(client.getfile(&VirtualPath::new("b.bin")).unwrap(), b"BB");
    });
}
