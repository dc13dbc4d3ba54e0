//! A runnable XBDM client: connects once per operation and prints what it
//! finds, the same way a developer poking at a devkit over XBDM would.
//!
//! ```text
//! xbdm-client-demo 127.0.0.1:730
//! ```

use anyhow::{Context, Result};

use xbdm_client::Client;
use xbdm_types::fs::VirtualPath;

fn main() -> Result<()> {
    env_logger::init();

    let addr = std::env::args().nth(1).context("USAGE: xbdm-client-demo <host>:<port>")?;
    let client = Client::resolve(&addr).with_context(|| format!("could not resolve `{addr}`"))?;

    let drives = client.drivelist().context("drivelist failed")?;
    println!("drives: {drives:?}");

    let systime = client.systime().context("systime failed")?;
    println!("system time (FILETIME ticks): {}", systime.0);

    let probe = VirtualPath::new("xbdm-client-demo-probe.bin");
    client.sendfile(&probe, b"hello from xbdm-client-demo").context("sendfile failed")?;
    let roundtrip = client.getfile(&probe).context("getfile failed")?;
    println!("round-tripped {} bytes: {:?}", roundtrip.len(), String::from_utf8_lossy(&roundtrip));
    client.delete(&probe, false).context("delete failed")?;

    Ok(())
}
