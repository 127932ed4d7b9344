//! # Intake Test Suite
//!
//! Cross-crate scenarios that drive the full gateway router over an
//! in-memory store with a controllable clock.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs       # Harness, recording collaborators, request builders
//! │   └── integration/      # End-to-end flows per endpoint
//! │       ├── enrollment_flow.rs
//! │       ├── webhook_flow.rs
//! │       └── rate_limit_flow.rs
//! └── benches/
//!     └── intake_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p intake-tests
//!
//! # One flow
//! cargo test -p intake-tests integration::webhook_flow
//!
//! # Benchmarks
//! cargo bench -p intake-tests
//! ```

pub mod fixtures;
pub mod integration;
