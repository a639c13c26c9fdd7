//! ISO 15118-20 session engine property-based tests
//!
//! Standalone test suite using proptest for protocol invariants that must
//! hold for any input, not just the handful of sessions the unit tests walk.
//!
//! # Usage
//!
//! ```bash
//! cargo test -p iso20-property-tests            # Run all property tests
//! cargo test -p iso20-property-tests rational   # Only RationalNumber properties
//! PROPTEST_CASES=1000 cargo test -p iso20-property-tests
//! ```
//!
//! # Test Modules
//!
//! - `rational`: float encoding precision and normal form
//! - `session`: unknown session ids, unoffered services, BPT limits
//! - `sequence`: out-of-order requests, single-slot exchange

// Re-export for convenience in tests
pub use iso20_core::*;
