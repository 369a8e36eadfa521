use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to a refund request when it is first persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters of the hyphenated form followed by an ellipsis.
    pub fn short(&self) -> String {
        let full = self.0.to_string();
        format!("{}...", &full[..8])
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Refund amount held in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefundAmount(i64);

impl RefundAmount {
    pub fn from_minor_units(value: i64) -> Self {
        Self(value)
    }

    pub fn minor_units(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RefundAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Replaces every character except the last four with `*`.
///
/// Inputs of four characters or fewer are masked completely so a full value is never shown.
pub fn mask_last_four(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }

    let hidden = chars.len() - 4;
    let mut masked = "*".repeat(hidden);
    masked.extend(&chars[hidden..]);
    masked
}

/// Text that must not leak through `Debug` output or structured logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensitiveString(String);

impl SensitiveString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        mask_last_four(&self.0)
    }
}

impl fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("*** redacted ***")
    }
}

/// Processing state; the timestamp only exists once the request has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processed { at: DateTime<Utc> },
}

impl ProcessingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "Pending",
            ProcessingStatus::Processed { .. } => "Processed",
        }
    }
}

/// Validated values ready to become a [`RefundRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundDraft {
    pub recipient_name: String,
    pub refund_amount: RefundAmount,
    pub bank_name: String,
    pub account_number: SensitiveString,
    pub card_number: SensitiveString,
    pub expiry_date: SensitiveString,
    pub cvv: SensitiveString,
}

/// Metadata captured from the originating HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// One persisted refund request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub request_id: RequestId,
    pub recipient_name: String,
    pub refund_amount: RefundAmount,
    pub bank_name: String,
    pub account_number: SensitiveString,
    pub card_number: SensitiveString,
    pub expiry_date: SensitiveString,
    pub cvv: SensitiveString,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RefundRequest {
    /// Builds a pending record with a freshly generated identifier.
    pub fn create(draft: RefundDraft, metadata: RequestMetadata, now: DateTime<Utc>) -> Self {
        let RefundDraft {
            recipient_name,
            refund_amount,
            bank_name,
            account_number,
            card_number,
            expiry_date,
            cvv,
        } = draft;

        Self {
            request_id: RequestId::generate(),
            recipient_name,
            refund_amount,
            bank_name,
            account_number,
            card_number,
            expiry_date,
            cvv,
            status: ProcessingStatus::Pending,
            created_at: now,
            updated_at: now,
            ip_address: metadata.client_ip,
            user_agent: metadata.user_agent,
        }
    }

    pub fn processed(&self) -> bool {
        matches!(self.status, ProcessingStatus::Processed { .. })
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            ProcessingStatus::Pending => None,
            ProcessingStatus::Processed { at } => Some(at),
        }
    }

    /// Moves a pending record to processed. Returns `false` when it already was.
    pub fn mark_processed(&mut self, at: DateTime<Utc>) -> bool {
        if self.processed() {
            return false;
        }
        self.status = ProcessingStatus::Processed { at };
        self.updated_at = at;
        true
    }

    pub fn masked_card_number(&self) -> String {
        self.card_number.masked()
    }

    pub fn masked_account_number(&self) -> String {
        self.account_number.masked()
    }
}
