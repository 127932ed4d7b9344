//! End-to-end flows, one module per endpoint concern.

pub mod enrollment_flow;
pub mod rate_limit_flow;
pub mod webhook_flow;
