// Unit Tests for Port Allocation
//
// UNIT UNDER TEST: find_available_tcp_port, find_available_tcp_port_in_range
//
// BUSINESS RESPONSIBILITY:
//   - Hands the mock server a port nothing else is listening on
//   - Fails with a startup error instead of looping forever
//
// TEST COVERAGE:
//   - Allocated ports are in range and bindable
//   - Occupied ports are never returned
//   - Invalid ranges are rejected

use crate::error::HarnessError;
use crate::port::{
    find_available_tcp_port, find_available_tcp_port_in_range, is_port_available, PORT_RANGE_MIN,
};
use std::net::TcpListener;

#[cfg(test)]
mod port_allocation_tests {
    use super::*;

    #[test]
    fn test_allocated_port_is_bindable() {
        // Arrange & Act
        let port = find_available_tcp_port().unwrap();

        // Assert
        assert!(port >= PORT_RANGE_MIN);
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }

    #[test]
    fn test_occupied_port_is_reported_unavailable() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        // Act
        let available = is_port_available(port);

        // Assert
        assert!(!available);
    }

    #[test]
    fn test_single_occupied_port_range_fails_with_startup_error() {
        // Test verifies exhaustion surfaces as a startup error
        // A harness that cannot bind must abort the test class

        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        // Act
        let result = find_available_tcp_port_in_range(port, port);

        // Assert
        match result {
            Err(error @ HarnessError::ServerStartup { .. }) => assert!(error.is_setup_error()),
            other => panic!("Expected ServerStartup error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        // Arrange & Act & Assert
        assert!(find_available_tcp_port_in_range(0, 10).is_err());
        assert!(find_available_tcp_port_in_range(5000, 4000).is_err());
    }
}
