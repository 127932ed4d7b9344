//! Delivery client used when no provider is configured.

use crate::domain::errors::DeliveryError;
use crate::ports::DeliveryClient;
use async_trait::async_trait;

/// Fails every send with [`DeliveryError::NotConfigured`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredDeliveryClient;

#[async_trait]
impl DeliveryClient for UnconfiguredDeliveryClient {
    async fn send(&self, _to: &str, _subject: &str, _content: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }
}
