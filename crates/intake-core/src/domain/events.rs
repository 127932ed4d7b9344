//! # Payment Events
//!
//! Typed view of authenticated webhook payloads.
//!
//! The envelope is parsed first; `data.object` is then decoded into the shape
//! its `type` names. Types outside [`PaymentEvent`] become
//! [`PaymentEvent::Unrecognized`] and are acknowledged without effect.

use crate::domain::errors::EventParseError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

/// Metadata key carrying the internal user id on checkout sessions.
pub const USER_ID_METADATA_KEY: &str = "userId";

/// A reference that the provider may send either as a bare id or as an
/// expanded object with an `id` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpandableId {
    Id(String),
    Object { id: String },
}

impl ExpandableId {
    pub fn id(&self) -> &str {
        match self {
            ExpandableId::Id(id) | ExpandableId::Object { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer: Option<ExpandableId>,
    #[serde(default)]
    pub subscription: Option<ExpandableId>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// Internal user id attached at checkout creation, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get(USER_ID_METADATA_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<ExpandableId>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub cancel_at_period_end: Option<bool>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub customer: Option<ExpandableId>,
    #[serde(default)]
    pub subscription: Option<ExpandableId>,
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub amount_due: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Closed set of handled event types, plus a default arm for the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted(CheckoutSession),
    SubscriptionCreated(Subscription),
    SubscriptionUpdated(Subscription),
    SubscriptionDeleted(Subscription),
    InvoicePaid(Invoice),
    InvoicePaymentFailed(Invoice),
    /// Any type not listed above. Carries the raw type name for logging.
    Unrecognized { kind: String },
}

impl PaymentEvent {
    /// Wire name of the event type.
    pub fn kind(&self) -> &str {
        match self {
            PaymentEvent::Unrecognized { kind } => kind,
            _ => self.known_kind().unwrap_or_default(),
        }
    }

    /// Wire name for handled types, `None` for [`PaymentEvent::Unrecognized`].
    pub fn known_kind(&self) -> Option<&'static str> {
        match self {
            PaymentEvent::CheckoutCompleted(_) => Some(CHECKOUT_SESSION_COMPLETED),
            PaymentEvent::SubscriptionCreated(_) => Some(SUBSCRIPTION_CREATED),
            PaymentEvent::SubscriptionUpdated(_) => Some(SUBSCRIPTION_UPDATED),
            PaymentEvent::SubscriptionDeleted(_) => Some(SUBSCRIPTION_DELETED),
            PaymentEvent::InvoicePaid(_) => Some(INVOICE_PAYMENT_SUCCEEDED),
            PaymentEvent::InvoicePaymentFailed(_) => Some(INVOICE_PAYMENT_FAILED),
            PaymentEvent::Unrecognized { .. } => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.known_kind().is_some()
    }
}

/// An authenticated, parsed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Provider-assigned identifier, stable across redeliveries.
    pub id: String,
    /// Creation time at the provider (Unix seconds).
    pub created: Option<i64>,
    pub livemode: bool,
    pub event: PaymentEvent,
}

#[derive(Deserialize)]
struct RawEnvelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    livemode: bool,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    object: serde_json::Value,
}

/// Parse a verified payload into an [`InboundEvent`].
pub fn parse_event(body: &[u8]) -> Result<InboundEvent, EventParseError> {
    let raw: RawEnvelope =
        serde_json::from_slice(body).map_err(|e| EventParseError::Envelope(e.to_string()))?;

    if raw.id.is_empty() {
        return Err(EventParseError::Envelope("event id is empty".into()));
    }

    let object = raw.data.object;
    let event = match raw.kind.as_str() {
        CHECKOUT_SESSION_COMPLETED => PaymentEvent::CheckoutCompleted(decode(&raw.kind, object)?),
        SUBSCRIPTION_CREATED => PaymentEvent::SubscriptionCreated(decode(&raw.kind, object)?),
        SUBSCRIPTION_UPDATED => PaymentEvent::SubscriptionUpdated(decode(&raw.kind, object)?),
        SUBSCRIPTION_DELETED => PaymentEvent::SubscriptionDeleted(decode(&raw.kind, object)?),
        INVOICE_PAYMENT_SUCCEEDED => PaymentEvent::InvoicePaid(decode(&raw.kind, object)?),
        INVOICE_PAYMENT_FAILED => PaymentEvent::InvoicePaymentFailed(decode(&raw.kind, object)?),
        _ => PaymentEvent::Unrecognized {
            kind: raw.kind.clone(),
        },
    };

    Ok(InboundEvent {
        id: raw.id,
        created: raw.created,
        livemode: raw.livemode,
        event,
    })
}

fn decode<T: DeserializeOwned>(kind: &str, object: serde_json::Value) -> Result<T, EventParseError> {
    serde_json::from_value(object).map_err(|e| EventParseError::Object {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}
