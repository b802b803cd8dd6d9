// Test modules for failguard crate
//
// Test organization follows the template pattern where each source file
// has a corresponding test file that focuses on business logic verification.

// Test helper utilities
pub mod helpers;

// Core unit tests (template compliant)
pub mod breaker;

// NOTE: End-to-end scenarios live in the top-level tests/ directory
// (tests/tracker_integration_tests.rs, tests/resilience_integration_tests.rs).
// They exercise spawned tick tasks and are timing sensitive, so they don't
// belong in unit tests.
