//! Access token adapter
//!
//! Tokens are HS256 JWTs whose claims carry the issuance time, so age checks
//! need no server lookup. The association table binding a token to one
//! submission lives behind a single mutex; every read-modify-write on it
//! happens while the lock is held.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::domain::access::{AccessClaims, TokenAssociation, TokenKind};
use crate::domain::submission::{Category, Submission, SubmissionId};
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

/// Issues, validates and single-use-marks access tokens
pub struct AccessTokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    max_age: Duration,
    admin_subject: String,
    admin_max_age: Duration,
    admin_referer_prefix: Option<String>,
    associations: Mutex<HashMap<String, TokenAssociation>>,
}

impl AccessTokenManager {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            max_age: Duration::from_secs(config.max_age_seconds),
            admin_subject: config.admin_subject.clone(),
            admin_max_age: Duration::from_secs(config.admin_max_age_seconds),
            admin_referer_prefix: config.admin_referer_prefix.clone(),
            associations: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Issue a user token stamped with the current time
    pub fn generate(&self) -> AppResult<String> {
        self.generate_at(Utc::now())
    }

    pub fn generate_at(&self, issued_at: DateTime<Utc>) -> AppResult<String> {
        self.sign(AccessClaims {
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind: TokenKind::User,
            sub: None,
        })
    }

    /// Issue an admin token bound to the configured admin subject
    pub fn generate_admin_at(&self, issued_at: DateTime<Utc>) -> AppResult<String> {
        self.sign(AccessClaims {
            iat: issued_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
            kind: TokenKind::Admin,
            sub: Some(self.admin_subject.clone()),
        })
    }

    fn sign(&self, claims: AccessClaims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    fn decode_claims(&self, token: &str) -> Option<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // age is checked against `iat`, not a stored `exp`
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        match decode::<AccessClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(token = %LoggingUtils::token_fingerprint(token), error = %e, "Token failed to decode");
                None
            }
        }
    }

    fn within_age(claims: &AccessClaims, max_age: Duration, now: DateTime<Utc>) -> bool {
        let age = now.timestamp() - claims.iat;
        age <= max_age.as_secs() as i64
    }

    /// Stateless check: signature, kind and `now - iat <= max_age`
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, self.max_age, Utc::now())
    }

    pub fn validate_at(&self, token: &str, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.decode_claims(token) {
            Some(claims) if claims.kind == TokenKind::User => Self::within_age(&claims, max_age, now),
            _ => false,
        }
    }

    /// Signed by us and issued to a user, regardless of age
    pub fn is_user_token(&self, token: &str) -> bool {
        matches!(self.decode_claims(token), Some(claims) if claims.kind == TokenKind::User)
    }

    /// Validate an admin bearer token and return its subject
    pub fn validate_admin(&self, token: &str, referer: Option<&str>, now: DateTime<Utc>) -> AppResult<String> {
        let claims = self
            .decode_claims(token)
            .ok_or_else(|| AppError::Authentication("invalid admin token".into()))?;
        if claims.kind != TokenKind::Admin {
            return Err(AppError::Authentication("not an admin token".into()));
        }
        let subject = claims.sub.clone().unwrap_or_default();
        if subject != self.admin_subject {
            LoggingUtils::log_security_event("admin_subject_mismatch", &subject, &LoggingUtils::token_fingerprint(token));
            return Err(AppError::Forbidden("admin subject not recognised".into()));
        }
        if !Self::within_age(&claims, self.admin_max_age, now) {
            return Err(AppError::Authentication("admin token expired".into()));
        }
        if let Some(prefix) = &self.admin_referer_prefix {
            if !referer.is_some_and(|r| r.starts_with(prefix.as_str())) {
                LoggingUtils::log_security_event(
                    "admin_referer_mismatch",
                    referer.unwrap_or("<none>"),
                    &LoggingUtils::token_fingerprint(token),
                );
                return Err(AppError::Forbidden("admin request from unexpected referer".into()));
            }
        }
        Ok(subject)
    }

    /// Bind `token` to a submission
    pub async fn store(&self, token: &str, submission_id: SubmissionId, category: Category) {
        let association = TokenAssociation {
            submission_id,
            category,
            created_at: Utc::now(),
            used: false,
        };
        self.associations.lock().await.insert(token.to_string(), association);
    }

    /// Current association without consuming it
    pub async fn association(&self, token: &str) -> Option<TokenAssociation> {
        self.associations.lock().await.get(token).cloned()
    }

    /// Return the association exactly once; later calls get `None`
    pub async fn use_once(&self, token: &str) -> Option<TokenAssociation> {
        let mut associations = self.associations.lock().await;
        let association = associations.get_mut(token)?;
        if association.used {
            warn!(token = %LoggingUtils::token_fingerprint(token), "Access token replayed");
            return None;
        }
        association.used = true;
        Some(association.clone())
    }

    /// Undo `use_once` after a mutation that did not complete
    pub async fn release(&self, token: &str) {
        if let Some(association) = self.associations.lock().await.get_mut(token) {
            association.used = false;
        }
    }

    /// Whether `token` may read `submission`.
    ///
    /// A live, valid association grants access. Otherwise, including when
    /// the association has aged out but is not yet purged, a COMPLETED
    /// submission still accepts the exact token value persisted on its row.
    pub async fn authorizes_read(&self, token: &str, submission: &Submission) -> bool {
        let associated = match self.association(token).await {
            Some(association) => association.submission_id == submission.id && self.validate(token),
            None => false,
        };
        associated || (submission.is_completed() && submission.access_token.as_deref() == Some(token))
    }

    /// Drop associations older than the token max age; returns how many went
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let max_age = chrono::Duration::seconds(self.max_age.as_secs() as i64);
        let mut associations = self.associations.lock().await;
        let before = associations.len();
        associations.retain(|_, a| now - a.created_at <= max_age);
        before - associations.len()
    }
}
