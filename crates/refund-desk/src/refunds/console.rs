//! Operator-facing reads and the "mark processed" action.
//!
//! Everything returned from here is display-safe: card and account numbers are masked and the
//! CVV never leaves the repository.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::info;

use super::domain::{RefundRequest, RequestId};
use super::repository::{RefundRepository, RepositoryError};

/// Creation-date buckets offered by the listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedWithin {
    Today,
    PastSevenDays,
    ThisMonth,
    ThisYear,
}

impl CreatedWithin {
    pub fn contains(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            CreatedWithin::Today => created_at.date_naive() == now.date_naive(),
            CreatedWithin::PastSevenDays => {
                created_at <= now && created_at >= now - Duration::days(7)
            }
            CreatedWithin::ThisMonth => {
                created_at.year() == now.year() && created_at.month() == now.month()
            }
            CreatedWithin::ThisYear => created_at.year() == now.year(),
        }
    }
}

impl FromStr for CreatedWithin {
    type Err = UnknownCreatedFilter;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "today" => Ok(Self::Today),
            "past_seven_days" | "week" => Ok(Self::PastSevenDays),
            "this_month" | "month" => Ok(Self::ThisMonth),
            "this_year" | "year" => Ok(Self::ThisYear),
            _ => Err(UnknownCreatedFilter(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCreatedFilter(pub String);

impl fmt::Display for UnknownCreatedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown created filter '{}' (expected today, past-seven-days, this-month, this-year)",
            self.0
        )
    }
}

impl std::error::Error for UnknownCreatedFilter {}

/// Filters and search applied to the operator listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub processed: Option<bool>,
    #[serde(default, deserialize_with = "non_blank")]
    pub bank_name: Option<String>,
    #[serde(default, deserialize_with = "created_filter")]
    pub created: Option<CreatedWithin>,
    /// Case-insensitive substring over request id, recipient, and bank.
    #[serde(default, rename = "q")]
    pub search: Option<String>,
}

/// Empty query parameters such as `bank_name=` mean "no filter".
fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty()))
}

fn created_filter<'de, D>(deserializer: D) -> Result<Option<CreatedWithin>, D::Error>
where
    D: Deserializer<'de>,
{
    non_blank(deserializer)?
        .map(|text| text.parse::<CreatedWithin>().map_err(de::Error::custom))
        .transpose()
}

impl ListQuery {
    pub fn matches(&self, record: &RefundRequest, now: DateTime<Utc>) -> bool {
        if let Some(processed) = self.processed {
            if record.processed() != processed {
                return false;
            }
        }
        if let Some(bank) = self.bank_name.as_deref() {
            if record.bank_name != bank {
                return false;
            }
        }
        if let Some(created) = self.created {
            if !created.contains(record.created_at, now) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [
                    record.request_id.to_string(),
                    record.recipient_name.to_lowercase(),
                    record.bank_name.to_lowercase(),
                ]
                .iter()
                .any(|haystack| haystack.contains(&term))
            }
            _ => true,
        }
    }
}

/// One line of the operator listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    pub request_id: RequestId,
    pub short_id: String,
    pub recipient_name: String,
    pub refund_amount: String,
    pub bank_name: String,
    pub masked_card: String,
    pub status: &'static str,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&RefundRequest> for ListingRow {
    fn from(record: &RefundRequest) -> Self {
        Self {
            request_id: record.request_id,
            short_id: record.request_id.short(),
            recipient_name: record.recipient_name.clone(),
            refund_amount: record.refund_amount.to_string(),
            bank_name: record.bank_name.clone(),
            masked_card: record.masked_card_number(),
            status: record.status.label(),
            processed: record.processed(),
            created_at: record.created_at,
        }
    }
}

/// Read-only detail view of a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordDetail {
    pub request_id: RequestId,
    pub recipient_name: String,
    pub refund_amount: String,
    pub bank_name: String,
    pub masked_account_number: String,
    pub masked_card_number: String,
    pub expiry_date: String,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<&RefundRequest> for RecordDetail {
    fn from(record: &RefundRequest) -> Self {
        Self {
            request_id: record.request_id,
            recipient_name: record.recipient_name.clone(),
            refund_amount: record.refund_amount.to_string(),
            bank_name: record.bank_name.clone(),
            masked_account_number: record.masked_account_number(),
            masked_card_number: record.masked_card_number(),
            expiry_date: record.expiry_date.expose().to_string(),
            processed: record.processed(),
            processed_at: record.processed_at(),
            created_at: record.created_at,
            updated_at: record.updated_at,
            ip_address: record.ip_address.clone(),
            user_agent: record.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkProcessedReport {
    pub updated: usize,
    pub message: String,
}

impl MarkProcessedReport {
    fn new(updated: usize) -> Self {
        Self {
            updated,
            message: format!("{updated} refund requests marked as processed."),
        }
    }
}

pub struct OperatorConsole<R: ?Sized> {
    repository: Arc<R>,
}

impl<R> OperatorConsole<R>
where
    R: RefundRepository + ?Sized,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Matching rows, newest first.
    pub fn rows(
        &self,
        query: &ListQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<ListingRow>, RepositoryError> {
        let mut records = self.repository.all()?;
        records.retain(|record| query.matches(record, now));
        records.reverse();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records.iter().map(ListingRow::from).collect())
    }

    pub fn detail(&self, id: &RequestId) -> Result<Option<RecordDetail>, RepositoryError> {
        Ok(self.repository.fetch(id)?.as_ref().map(RecordDetail::from))
    }

    /// Transitions pending requests to processed; already-processed and unknown ids are skipped.
    pub fn mark_processed(
        &self,
        ids: &[RequestId],
    ) -> Result<MarkProcessedReport, RepositoryError> {
        let updated = self.repository.mark_processed(ids, Utc::now())?;
        info!(requested = ids.len(), updated, "refund requests marked as processed");
        Ok(MarkProcessedReport::new(updated))
    }
}
