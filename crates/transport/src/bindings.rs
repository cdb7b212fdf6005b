//! Helpers for binding local ports in tests and tools
use std::net::TcpListener;

use eyre::Result;

/// Ask the OS for a currently unused TCP port on the loopback interface
pub fn get_random_tcp_port() -> Result<u16> {
    let mut last_error = None;
    for _ in 0..50 {
        match TcpListener::bind("127.0.0.1:0").and_then(|listener| listener.local_addr()) {
            Ok(addr) => return Ok(addr.port()),
            Err(e) => {
                tracing::warn!(%e, "binding ephemeral port");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(eyre::eyre!("could not get free port: {e}")),
        None => eyre::bail!("could not get free port"),
    }
}
