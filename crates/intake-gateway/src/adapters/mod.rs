//! Outbound adapters owned by the gateway.

pub mod delivery;

pub use delivery::HttpDeliveryClient;
