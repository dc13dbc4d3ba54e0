//! The connection-accepting half of the server: binds a TCP listener and
//! runs one [`Session`] per accepted connection on its own OS thread.
//!
//! `Services`/`Dispatcher` are borrowed rather than `Arc`'d: `std::thread::scope`
//! lets every connection thread share them by reference while still proving,
//! at compile time, that none outlives the scope that owns them.

use std::io;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use xbdm_proto::{Dispatcher, Services};
use xbdm_proto::Session;

/// Binds `addr` and serves XBDM connections until the process is killed or
/// [`Server::serve`] returns due to a fatal accept error.
pub struct Server<'a> {
    listener: TcpListener,
    dispatcher: &'a Dispatcher,
}

impl std::fmt::Debug for Server<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

impl<'a> Server<'a> {
    pub fn bind(addr: impl ToSocketAddrs, dispatcher: &'a Dispatcher) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, dispatcher })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, spawning one thread per connection. Each
    /// thread runs until its peer disconnects or a handler closes the
    /// session (`BYE`, `magicboot`, ...); a panic or I/O error in one
    /// connection thread never affects the others.
    pub fn serve(&self, services: &Services<'_>) -> io::Result<()> {
        std::thread::scope(|scope| {
            loop {
                let (stream, peer) = match self.listener.accept() {
                    Ok(pair) => pair,
                    Err(e) => {
                        log::warn!("accept failed: {e}");
                        continue;
                    }
                };
                log::info!("accepted connection from {peer}");
                scope.spawn(move || {
                    if let Err(e) = handle_connection(stream, self.dispatcher, services) {
                        log::warn!("session with {peer} ended with error: {e}");
                    } else {
                        log::info!("session with {peer} closed");
                    }
                });
            }
        })
    }

    /// Accepts and fully services exactly one connection, then returns.
    /// Used by loopback tests, which need the accept loop to terminate
    /// rather than run forever on its own thread.
    pub fn serve_one(&self, services: &Services<'_>) -> io::Result<()> {
        let (stream, peer) = self.listener.accept()?;
        log::info!("accepted connection from {peer}");
        handle_connection(stream, self.dispatcher, services).map_err(|e| io::Error::other(e.to_string()))
    }

    /// Accepts and fully services exactly `n` connections, one at a time,
    /// then returns. Used by tests that drive a one-connection-per-operation
    /// client through a known number of round trips.
    pub fn serve_n(&self, services: &Services<'_>, n: usize) -> io::Result<()> {
        for _ in 0..n {
            self.serve_one(services)?;
        }
        Ok(())
    }
}

fn handle_connection(
    stream: TcpStream,
    dispatcher: &Dispatcher,
    services: &Services<'_>,
) -> Result<(), xbdm_proto::SessionError> {
    stream.set_nodelay(true).ok();
    Session::new(stream).run(dispatcher, services)
}
