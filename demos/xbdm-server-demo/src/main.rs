//! A runnable XBDM server: binds a TCP listener over a local directory and
//! serves connections forever, logging each one.
//!
//! ```text
//! xbdm-server-demo 127.0.0.1:730 ./console-root
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};

use xbdm_proto::{Dispatcher, Services};
use xbdm_server::{SandboxFs, Server};
use xbdm_types::config::StaticConfig;
use xbdm_types::SimMemory;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let addr = args.next().context("USAGE: xbdm-server-demo <host>:<port> <root-dir>")?;
    let root: PathBuf = args.next().context("USAGE: xbdm-server-demo <host>:<port> <root-dir>")?.into();

    std::fs::create_dir_all(&root).with_context(|| format!("could not create root dir `{}`", root.display()))?;

    let fs = SandboxFs::new(&root);
    let config = StaticConfig::default();
    let memory = SimMemory::new(1024 * 1024);
    let services = Services { fs: &fs, config: &config, memory: &memory };
    let dispatcher = Dispatcher::with_default_handlers();

    let server = Server::bind(&addr, &dispatcher).with_context(|| format!("could not bind `{addr}`"))?;
    log::info!("listening on {} (root: {})", server.local_addr()?, root.display());

    server.serve(&services).context("server loop exited")?;
    Ok(())
}
