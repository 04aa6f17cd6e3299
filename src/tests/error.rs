// Unit Tests for Harness Error Handling
//
// UNIT UNDER TEST: HarnessError
//
// BUSINESS RESPONSIBILITY:
//   - Separates setup failures (abort the test class) from per-test failures
//   - Carries the details a test author needs to fix the failure
//   - Keeps the API status reachable through execution wrappers
//
// TEST COVERAGE:
//   - Category assignment for every constructor
//   - Message formatting for the user-facing variants
//   - Source chaining and execution-failure wrapping

use crate::error::{ErrorCategory, HarnessError};
use std::error::Error as _;
use std::path::Path;

#[cfg(test)]
mod error_categorization_tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_setup_errors() {
        // Arrange
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");

        // Act
        let configuration = HarnessError::configuration_error("bad");
        let unreadable = HarnessError::options_unreadable("test-options.properties", io);

        // Assert
        assert_eq!(configuration.category(), ErrorCategory::Configuration);
        assert_eq!(unreadable.category(), ErrorCategory::Configuration);
        assert!(configuration.is_setup_error());
        assert!(unreadable.is_setup_error());
    }

    #[test]
    fn test_startup_errors_are_setup_errors() {
        // Arrange & Act
        let keystore = HarnessError::key_store(Path::new("googleapis.p12"), "no key", None);
        let startup = HarnessError::server_startup("port taken");

        // Assert
        assert_eq!(keystore.category(), ErrorCategory::Startup);
        assert_eq!(startup.category(), ErrorCategory::Startup);
        assert!(keystore.is_setup_error());
        assert!(startup.is_setup_error());
    }

    #[test]
    fn test_execution_errors_only_fail_the_current_test() {
        // Arrange & Act
        let errors = [
            HarnessError::request_failed("connection refused", None),
            HarnessError::api_error(404, "Requested entity was not found."),
            HarnessError::response_parsing("truncated"),
            HarnessError::unknown_component("google-drive"),
            HarnessError::invalid_endpoint("bad://", "missing api name"),
            HarnessError::missing_parameter("google-sheets://data/get", "range"),
        ];

        // Assert
        for error in &errors {
            assert_eq!(error.category(), ErrorCategory::Execution, "{error}");
            assert!(!error.is_setup_error(), "{error}");
        }
    }
}

#[cfg(test)]
mod error_message_tests {
    use super::*;

    #[test]
    fn test_options_unreadable_message_names_file_and_cause() {
        // Arrange
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "permission denied");

        // Act
        let error = HarnessError::options_unreadable("/etc/test-options.properties", io);

        // Assert
        assert_eq!(
            error.to_string(),
            "/etc/test-options.properties could not be loaded: permission denied"
        );
        assert!(error.source().is_some());
    }

    #[test]
    fn test_key_store_message_and_optional_source() {
        // Arrange
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");

        // Act
        let with_source =
            HarnessError::key_store(Path::new("a.p12"), "could not be read", Some(io));
        let without_source = HarnessError::key_store(Path::new("b.p12"), "no key", None);

        // Assert
        assert_eq!(with_source.to_string(), "Key store a.p12 is unusable: could not be read");
        assert!(with_source.source().is_some());
        assert!(without_source.source().is_none());
    }

    #[test]
    fn test_missing_parameter_message() {
        // Arrange & Act
        let error = HarnessError::missing_parameter("google-sheets://data/get", "range");

        // Assert
        assert_eq!(
            error.to_string(),
            "Missing parameter 'range' for endpoint google-sheets://data/get"
        );
    }
}

#[cfg(test)]
mod execution_wrapping_tests {
    use super::*;

    #[test]
    fn test_execution_failed_keeps_api_status() {
        // Arrange
        let api = HarnessError::api_error(400, "Unable to parse range: Nope!A1");

        // Act
        let wrapped = HarnessError::execution_failed("google-sheets://data/get", api);

        // Assert
        assert_eq!(wrapped.api_status(), Some(400));
        assert_eq!(wrapped.category(), ErrorCategory::Execution);
        assert!(wrapped.to_string().contains("Unable to parse range: Nope!A1"));
        assert!(wrapped.source().is_some());
    }

    #[test]
    fn test_execution_failed_is_not_wrapped_twice() {
        // Arrange
        let inner = HarnessError::execution_failed(
            "google-sheets://data/get",
            HarnessError::response_parsing("x"),
        );

        // Act
        let outer = HarnessError::execution_failed("google-sheets://data/update", inner);

        // Assert
        match outer {
            HarnessError::ExecutionFailed { endpoint, source } => {
                assert_eq!(endpoint, "google-sheets://data/get");
                assert!(matches!(*source, HarnessError::ResponseParsing { .. }));
            }
            other => panic!("Expected ExecutionFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_api_status_absent_for_other_errors() {
        // Arrange & Act
        let error = HarnessError::request_failed("timed out", None);

        // Assert
        assert_eq!(error.api_status(), None);
    }
}
