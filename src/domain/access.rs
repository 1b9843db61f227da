//! Access token models and the resolved caller identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::submission::{Category, SubmissionId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    User,
    Admin,
}

/// Claims embedded in every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Unique token id
    pub jti: String,
    pub kind: TokenKind,
    /// Subject; only set for admin tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// Server-side binding of a token to one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAssociation {
    pub submission_id: SubmissionId,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub used: bool,
}

/// Caller identity, resolved before any submission is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessContext {
    User { token: String },
    Admin { subject: String },
}

impl AccessContext {
    pub fn is_admin(&self) -> bool {
        matches!(self, AccessContext::Admin { .. })
    }
}
