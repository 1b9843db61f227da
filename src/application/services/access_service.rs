//! Caller identity resolution and per-operation authorization

use std::sync::Arc;

use chrono::Utc;

use crate::domain::access::AccessContext;
use crate::domain::submission::{Submission, SubmissionId};
use crate::infrastructure::adapters::AccessTokenManager;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

/// Credentials lifted off a request
#[derive(Debug, Default, Clone)]
pub struct Credentials<'a> {
    pub access_token: Option<&'a str>,
    pub authorization: Option<&'a str>,
    pub referer: Option<&'a str>,
}

pub struct AccessService {
    tokens: Arc<AccessTokenManager>,
}

impl AccessService {
    pub fn new(tokens: Arc<AccessTokenManager>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &Arc<AccessTokenManager> {
        &self.tokens
    }

    /// Decide who is calling before any submission is loaded
    pub fn resolve_access_context(&self, credentials: &Credentials<'_>) -> AppResult<AccessContext> {
        if let Some(header) = credentials.authorization {
            let token = header
                .strip_prefix("Bearer ")
                .ok_or_else(|| AppError::Authentication("expected a Bearer token".into()))?;
            let subject = self.tokens.validate_admin(token.trim(), credentials.referer, Utc::now())?;
            return Ok(AccessContext::Admin { subject });
        }
        match credentials.access_token {
            Some(token) if self.tokens.is_user_token(token) => Ok(AccessContext::User {
                token: token.to_string(),
            }),
            Some(token) => {
                LoggingUtils::log_security_event("invalid_access_token", "token failed to decode", &LoggingUtils::token_fingerprint(token));
                Err(AppError::Authentication("invalid access token".into()))
            }
            None => Err(AppError::Authentication("missing access token".into())),
        }
    }

    pub async fn authorize_read(&self, context: &AccessContext, submission: &Submission) -> AppResult<()> {
        match context {
            AccessContext::Admin { .. } => Ok(()),
            AccessContext::User { token } => {
                if self.tokens.authorizes_read(token, submission).await {
                    Ok(())
                } else {
                    Err(AppError::Forbidden("token does not grant access to this submission".into()))
                }
            }
        }
    }

    pub fn require_admin(&self, context: &AccessContext) -> AppResult<()> {
        if context.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin access required".into()))
        }
    }

    /// Check a user token is live and bound to `submission_id` without consuming it
    pub async fn authorize_order(&self, context: &AccessContext, submission_id: &SubmissionId) -> AppResult<()> {
        let token = self.user_token(context)?;
        if !self.tokens.validate(token) {
            return Err(AppError::Authentication("access token expired".into()));
        }
        match self.tokens.association(token).await {
            Some(association) if association.submission_id == *submission_id && !association.used => Ok(()),
            _ => Err(AppError::Forbidden("token does not grant access to this submission".into())),
        }
    }

    /// Consume a user token for a capture; returns the token to release if the capture fails
    pub async fn begin_capture(&self, context: &AccessContext, submission_id: &SubmissionId) -> AppResult<String> {
        let token = self.user_token(context)?;
        if !self.tokens.validate(token) {
            return Err(AppError::Authentication("access token expired".into()));
        }
        let association = self
            .tokens
            .use_once(token)
            .await
            .ok_or_else(|| AppError::Forbidden("access token already used".into()))?;
        if association.submission_id != *submission_id {
            self.tokens.release(token).await;
            LoggingUtils::log_security_event(
                "token_submission_mismatch",
                submission_id.as_str(),
                &LoggingUtils::token_fingerprint(token),
            );
            return Err(AppError::Forbidden("token does not grant access to this submission".into()));
        }
        Ok(token.to_string())
    }

    /// Hand the token back when a capture did not complete, so the holder may retry
    pub async fn abort_capture(&self, token: &str) {
        self.tokens.release(token).await;
    }

    fn user_token<'c>(&self, context: &'c AccessContext) -> AppResult<&'c str> {
        match context {
            AccessContext::User { token } => Ok(token.as_str()),
            AccessContext::Admin { .. } => Err(AppError::Forbidden("payment actions require the submitter's token".into())),
        }
    }
}
