//! # Domain Entities
//!
//! Enrollment records and the validated input that produces them.

use crate::domain::errors::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

/// Maximum length of the local part of an email address.
pub const MAX_LOCAL_PART_LEN: usize = 64;

/// Minimum display name length, in characters.
pub const MIN_NAME_LEN: usize = 2;

/// Maximum display name length, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// A committed enrollment.
///
/// `position` is assigned exactly once, inside the same atomic unit that
/// inserted the record, and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    /// Identity key, unique across all records.
    pub email: String,
    /// Optional display name.
    pub name: Option<String>,
    /// 1-based position in the sequence.
    pub position: u64,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

/// Raw enrollment input as received from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Enrollment input that passed validation. Only constructible via
/// [`NewEnrollment::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    email: String,
    name: Option<String>,
}

impl NewEnrollment {
    /// Validate raw input, collecting every field error.
    pub fn parse(request: EnrollmentRequest) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let email = match request.email.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push(ValidationError::new("email", "Email is required"));
                None
            }
            Some(candidate) => match validate_email(candidate) {
                Ok(()) => Some(candidate.to_string()),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
        };

        let name = match request.name {
            None => None,
            Some(raw) => {
                let trimmed = raw.trim();
                let len = trimmed.chars().count();
                if len < MIN_NAME_LEN {
                    errors.push(ValidationError::new(
                        "name",
                        format!("Name must be at least {MIN_NAME_LEN} characters"),
                    ));
                    None
                } else if len > MAX_NAME_LEN {
                    errors.push(ValidationError::new(
                        "name",
                        format!("Name must be at most {MAX_NAME_LEN} characters"),
                    ));
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        };

        match email {
            Some(email) if errors.is_empty() => Ok(Self { email, name }),
            _ => Err(errors),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Build the record for a position chosen by the store.
    pub fn into_record(self, position: u64, created_at: DateTime<Utc>) -> EnrollmentRecord {
        EnrollmentRecord {
            email: self.email,
            name: self.name,
            position,
            created_at,
        }
    }
}

/// Syntactic email check: `local@domain.tld`, no whitespace, bounded lengths.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::new("email", "Invalid email address");

    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.rsplit_once('@').ok_or_else(invalid)?;

    if local.is_empty()
        || local.len() > MAX_LOCAL_PART_LEN
        || local.contains('@')
        || local.starts_with('.')
        || local.ends_with('.')
        || local.contains("..")
        || !local.chars().all(is_local_char)
    {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid());
    }
    for label in &labels {
        if label.is_empty()
            || label.starts_with('-')
            || label.ends_with('-')
            || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(invalid());
        }
    }

    // Last label is the TLD: alphabetic, at least two characters.
    let tld = labels[labels.len() - 1];
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    Ok(())
}

fn is_local_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c)
}
