//! Free TCP port allocation for manager listeners

use std::io;
use std::net::{Ipv4Addr, TcpListener};

use tracing::debug;

/// Ask the OS for an unused TCP port on the loopback interface.
///
/// The listener is dropped before returning, so the port is only free
/// "at construction time"; callers bind it shortly after.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    let port = listener.local_addr()?.port();
    debug!(port, "Allocated free port");
    Ok(port)
}

/// Allocator that always hands out `port`, for deterministic tests
pub fn fixed_port(port: u16) -> impl FnOnce() -> io::Result<u16> {
    move || Ok(port)
}
