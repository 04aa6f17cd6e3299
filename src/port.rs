//! Free TCP port selection for the mock server.
//!
//! Candidates are drawn at random from the non-privileged range so parallel
//! test runs rarely probe the same port, then checked by binding them on the
//! loopback interface.

use crate::error::{HarnessError, HarnessResult};
use crate::logging::{log_debug, log_trace};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

pub const PORT_RANGE_MIN: u16 = 1024;
pub const PORT_RANGE_MAX: u16 = 65535;

const MAX_ATTEMPTS: usize = 1000;

/// Find a currently unused TCP port in `[PORT_RANGE_MIN, PORT_RANGE_MAX]`.
pub fn find_available_tcp_port() -> HarnessResult<u16> {
    find_available_tcp_port_in_range(PORT_RANGE_MIN, PORT_RANGE_MAX)
}

/// Find a currently unused TCP port in `[min, max]`.
///
/// The port is released before returning, so the caller must bind it promptly.
///
/// # Errors
///
/// Returns [`HarnessError::ServerStartup`] if the range is invalid or no free
/// port is found.
pub fn find_available_tcp_port_in_range(min: u16, max: u16) -> HarnessResult<u16> {
    if min == 0 || min > max {
        return Err(HarnessError::server_startup(format!(
            "Invalid port range [{min}, {max}]"
        )));
    }

    let span = usize::from(max - min) + 1;
    let attempts = span.min(MAX_ATTEMPTS);

    for attempt in 1..=attempts {
        let candidate = fastrand::u16(min..=max);
        if is_port_available(candidate) {
            log_debug!(port = candidate, attempt = attempt, "Allocated TCP port");
            return Ok(candidate);
        }
        log_trace!(port = candidate, "Port in use, trying another");
    }

    Err(HarnessError::server_startup(format!(
        "Could not find an available TCP port in range [{min}, {max}] after {attempts} attempts"
    )))
}

/// Whether `port` can currently be bound on the loopback interface.
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)).is_ok()
}
