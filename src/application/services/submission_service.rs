//! Submission intake: prices the form server-side and issues its access token

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::ports::{PricingOracle, SubmissionStore};
use crate::domain::submission::{Category, LineItem, Submission, SubmissionId};
use crate::infrastructure::adapters::AccessTokenManager;
use crate::shared::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    pub category: Category,
    #[serde(default)]
    pub selections: Vec<LineItem>,
    #[serde(default, rename = "coverFees", alias = "cover_fees")]
    pub cover_fees: bool,
    /// Client-side total; logged when it disagrees, never trusted
    #[serde(default, rename = "clientTotal", alias = "client_total")]
    pub client_total: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub submission_id: SubmissionId,
    pub access_token: String,
    pub calculated_amount: Decimal,
}

pub struct SubmissionService {
    store: Arc<dyn SubmissionStore>,
    pricing: Arc<dyn PricingOracle>,
    tokens: Arc<AccessTokenManager>,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn SubmissionStore>, pricing: Arc<dyn PricingOracle>, tokens: Arc<AccessTokenManager>) -> Self {
        Self { store, pricing, tokens }
    }

    pub async fn create(&self, request: NewSubmission) -> AppResult<SubmissionReceipt> {
        if request.selections.iter().any(|item| item.quantity == 0) {
            return Err(AppError::Validation("selection quantity must be at least 1".into()));
        }
        let amount = self
            .pricing
            .calculate_total(request.category, &request.selections, request.cover_fees)?;
        if let Some(client_total) = request.client_total.filter(|t| *t != amount) {
            info!(client_total = %client_total, calculated = %amount, "Ignoring client-submitted total");
        }

        let now = Utc::now();
        let id = SubmissionId::generate(request.category, now);
        let submission = Submission::new(id.clone(), request.selections, request.cover_fees, amount, now);
        self.store.insert(submission).await?;

        // the row copy backs read access once the in-memory association is gone
        let token = self.tokens.generate_at(now)?;
        self.store.set_access_token(&id, &token).await?;
        self.tokens.store(&token, id.clone(), request.category).await;

        info!(submission_id = %id, amount = %amount, "Submission created");
        Ok(SubmissionReceipt {
            submission_id: id,
            access_token: token,
            calculated_amount: amount,
        })
    }
}
