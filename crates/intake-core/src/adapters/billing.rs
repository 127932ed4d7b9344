//! Default billing handler: records what each event would do and applies
//! nothing beyond that.

use crate::domain::errors::HandlerError;
use crate::domain::events::{CheckoutSession, Invoice, Subscription};
use crate::ports::{BillingHandler, HandlerOutcome};
use async_trait::async_trait;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBillingHandler;

#[async_trait]
impl BillingHandler for LoggingBillingHandler {
    async fn checkout_completed(
        &self,
        event_id: &str,
        session: &CheckoutSession,
    ) -> Result<HandlerOutcome, HandlerError> {
        if !session.is_paid() {
            info!(event_id, session_id = %session.id, "Payment not completed, skipping");
            return Ok(HandlerOutcome::Skipped("payment not completed".into()));
        }
        let Some(user_id) = session.user_id() else {
            warn!(event_id, session_id = %session.id, "Missing userId in checkout metadata");
            return Ok(HandlerOutcome::Skipped("missing userId metadata".into()));
        };
        info!(event_id, user_id, "Payment completed for user");
        Ok(HandlerOutcome::Applied)
    }

    async fn subscription_created(
        &self,
        event_id: &str,
        subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError> {
        info!(event_id, subscription_id = %subscription.id, "Subscription created");
        Ok(HandlerOutcome::Applied)
    }

    async fn subscription_updated(
        &self,
        event_id: &str,
        subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError> {
        info!(
            event_id,
            subscription_id = %subscription.id,
            status = subscription.status.as_deref().unwrap_or("unknown"),
            "Subscription updated"
        );
        Ok(HandlerOutcome::Applied)
    }

    async fn subscription_deleted(
        &self,
        event_id: &str,
        subscription: &Subscription,
    ) -> Result<HandlerOutcome, HandlerError> {
        info!(event_id, subscription_id = %subscription.id, "Subscription cancelled");
        Ok(HandlerOutcome::Applied)
    }

    async fn invoice_paid(
        &self,
        event_id: &str,
        invoice: &Invoice,
    ) -> Result<HandlerOutcome, HandlerError> {
        info!(event_id, invoice_id = %invoice.id, amount_paid = ?invoice.amount_paid, "Invoice paid");
        Ok(HandlerOutcome::Applied)
    }

    async fn invoice_payment_failed(
        &self,
        event_id: &str,
        invoice: &Invoice,
    ) -> Result<HandlerOutcome, HandlerError> {
        warn!(event_id, invoice_id = %invoice.id, "Invoice payment failed");
        Ok(HandlerOutcome::Applied)
    }
}
