//! Submission domain models and payment state rules

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Form category a submission belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Membership,
    Event,
    Fundraiser,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Membership => "membership",
            Category::Event => "event",
            Category::Fundraiser => "fundraiser",
        }
    }

    /// Human-readable line used as the gateway order description
    pub fn order_description(&self) -> &'static str {
        match self {
            Category::Membership => "Membership dues",
            Category::Event => "Event registration",
            Category::Fundraiser => "Fundraiser donation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "membership" => Ok(Category::Membership),
            "event" => Ok(Category::Event),
            "fundraiser" => Ok(Category::Fundraiser),
            _ => Err(AppError::Validation(format!("unknown category: {}", s))),
        }
    }
}

fn submission_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(membership|event|fundraiser)-(\d{4}-\d{2}-\d{2})-([a-z0-9]{3,32})$")
            .expect("submission id pattern is valid")
    })
}

/// Opaque submission identifier: `<category>-<YYYY-MM-DD>-<suffix>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn generate(category: Category, now: DateTime<Utc>) -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        Self(format!("{}-{}-{}", category.as_str(), now.format("%Y-%m-%d"), suffix))
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if submission_id_pattern().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AppError::Validation(format!("malformed submission id: {}", raw)))
        }
    }

    pub fn category(&self) -> Category {
        // the pattern guarantees a known prefix
        let prefix = self.0.split('-').next().unwrap_or_default();
        prefix.parse().unwrap_or(Category::Membership)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubmissionId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubmissionId> for String {
    fn from(id: SubmissionId) -> Self {
        id.0
    }
}

/// Local view of the gateway order state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GatewayStatus {
    None,
    Created,
    Saved,
    Approved,
    PayerActionRequired,
    Completed,
    Refunded,
    PartiallyRefunded,
    Cancelled,
    Expired,
    /// `FAILED_<reason>` marker; clears the order id so a fresh order can be allocated
    Failed(String),
    /// Anything else the gateway reports, kept verbatim
    Other(String),
}

impl GatewayStatus {
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "" | "NONE" => GatewayStatus::None,
            "CREATED" => GatewayStatus::Created,
            "SAVED" => GatewayStatus::Saved,
            "APPROVED" => GatewayStatus::Approved,
            "PAYER_ACTION_REQUIRED" => GatewayStatus::PayerActionRequired,
            "COMPLETED" => GatewayStatus::Completed,
            "REFUNDED" => GatewayStatus::Refunded,
            "PARTIALLY_REFUNDED" => GatewayStatus::PartiallyRefunded,
            "CANCELLED" | "CANCELED" => GatewayStatus::Cancelled,
            "EXPIRED" => GatewayStatus::Expired,
            _ => match upper.strip_prefix("FAILED_") {
                Some(reason) => GatewayStatus::Failed(reason.to_string()),
                None => GatewayStatus::Other(upper),
            },
        }
    }

    /// Failure marker for a gateway status that ended the payment attempt
    pub fn failed_from(status: &GatewayStatus) -> Self {
        GatewayStatus::Failed(status.as_string())
    }

    pub fn as_string(&self) -> String {
        match self {
            GatewayStatus::None => "NONE".into(),
            GatewayStatus::Created => "CREATED".into(),
            GatewayStatus::Saved => "SAVED".into(),
            GatewayStatus::Approved => "APPROVED".into(),
            GatewayStatus::PayerActionRequired => "PAYER_ACTION_REQUIRED".into(),
            GatewayStatus::Completed => "COMPLETED".into(),
            GatewayStatus::Refunded => "REFUNDED".into(),
            GatewayStatus::PartiallyRefunded => "PARTIALLY_REFUNDED".into(),
            GatewayStatus::Cancelled => "CANCELLED".into(),
            GatewayStatus::Expired => "EXPIRED".into(),
            GatewayStatus::Failed(reason) => format!("FAILED_{}", reason),
            GatewayStatus::Other(raw) => raw.clone(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, GatewayStatus::Completed)
    }

    /// Settled states: money moved and the record is closed to the order flow
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GatewayStatus::Completed | GatewayStatus::Refunded | GatewayStatus::PartiallyRefunded
        )
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<String> for GatewayStatus {
    fn from(value: String) -> Self {
        GatewayStatus::parse(&value)
    }
}

impl From<GatewayStatus> for String {
    fn from(status: GatewayStatus) -> Self {
        status.as_string()
    }
}

/// One selected catalog entry on a form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub sku: String,
    pub quantity: u32,
}

/// A user's form record and its payment state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub category: Category,
    pub selections: Vec<LineItem>,
    pub cover_fees: bool,
    pub calculated_amount: Decimal,
    pub gateway_order_id: Option<String>,
    pub gateway_status: GatewayStatus,
    /// Verbatim last-known gateway response
    pub gateway_detail: Option<serde_json::Value>,
    /// Access token value issued for this submission
    pub access_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub order_created_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Outcome of asking a submission to take a new gateway status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Applied,
    /// The record is already at this value
    Unchanged,
    /// Would regress a settled record
    Refused,
}

impl Submission {
    pub fn new(
        id: SubmissionId,
        selections: Vec<LineItem>,
        cover_fees: bool,
        calculated_amount: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            category: id.category(),
            id,
            selections,
            cover_fees,
            calculated_amount,
            gateway_order_id: None,
            gateway_status: GatewayStatus::None,
            gateway_detail: None,
            access_token: None,
            created_at: now,
            order_created_at: None,
            submitted_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.gateway_status.is_completed()
    }

    /// Never submitted and never sent to the gateway
    pub fn is_draft(&self) -> bool {
        self.submitted_at.is_none()
            && self.gateway_order_id.is_none()
            && self.gateway_status == GatewayStatus::None
    }

    /// Check whether `next` may replace the current status.
    ///
    /// COMPLETED only moves forward to a refund status; refunds only move to
    /// another refund status.
    pub fn status_change(&self, next: &GatewayStatus) -> StatusChange {
        if &self.gateway_status == next {
            return StatusChange::Unchanged;
        }
        let allowed = match self.gateway_status {
            GatewayStatus::Completed => {
                matches!(next, GatewayStatus::Refunded | GatewayStatus::PartiallyRefunded)
            }
            GatewayStatus::Refunded | GatewayStatus::PartiallyRefunded => {
                matches!(next, GatewayStatus::Refunded | GatewayStatus::PartiallyRefunded)
            }
            _ => true,
        };
        if allowed {
            StatusChange::Applied
        } else {
            StatusChange::Refused
        }
    }

    /// Record a new order id for a fresh payment attempt.
    ///
    /// An order already attached to the row is never replaced; a failed
    /// attempt clears it first.
    pub fn apply_order(&mut self, order_id: &str, created_at: DateTime<Utc>) -> StatusChange {
        if self.gateway_status.is_terminal() {
            return StatusChange::Refused;
        }
        match self.gateway_order_id.as_deref() {
            Some(existing) if existing == order_id => return StatusChange::Unchanged,
            Some(_) => return StatusChange::Refused,
            None => {}
        }
        self.gateway_order_id = Some(order_id.to_string());
        self.gateway_status = GatewayStatus::Created;
        self.order_created_at = Some(created_at);
        if self.submitted_at.is_none() {
            self.submitted_at = Some(created_at);
        }
        StatusChange::Applied
    }

    /// Overwrite detail and status with the latest gateway view
    pub fn apply_capture(
        &mut self,
        detail: serde_json::Value,
        status: GatewayStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> StatusChange {
        let change = self.status_change(&status);
        match change {
            StatusChange::Refused => return change,
            StatusChange::Unchanged if self.gateway_detail.as_ref() == Some(&detail) => {
                return StatusChange::Unchanged
            }
            _ => {}
        }
        if status.is_completed() {
            self.submitted_at = completed_at.or(self.submitted_at);
        }
        self.gateway_status = status;
        self.gateway_detail = Some(detail);
        StatusChange::Applied
    }

    /// Mark the attempt failed and release the order id
    pub fn apply_failure(&mut self, status: GatewayStatus) -> StatusChange {
        if self.gateway_status.is_terminal() {
            return StatusChange::Refused;
        }
        if self.gateway_status == status && self.gateway_order_id.is_none() {
            return StatusChange::Unchanged;
        }
        self.gateway_status = status;
        self.gateway_order_id = None;
        StatusChange::Applied
    }

    /// Capture id recorded in the gateway detail, if any
    pub fn capture_id(&self) -> Option<String> {
        self.gateway_detail.as_ref().and_then(crate::domain::gateway::capture_id_from_detail)
    }

    /// Gateway processing fee recorded in the gateway detail, if any
    pub fn gateway_fee(&self) -> Option<Decimal> {
        self.gateway_detail.as_ref().and_then(crate::domain::gateway::gateway_fee_from_detail)
    }
}
