//! Adapters implementing the outbound ports.

pub mod billing;
pub mod clock;
pub mod delivery;
pub mod memory;
pub mod renderer;

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

pub use billing::LoggingBillingHandler;
pub use clock::ManualTimeSource;
pub use delivery::UnconfiguredDeliveryClient;
pub use memory::InMemoryStore;
pub use renderer::ConfirmationRenderer;

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
