//! Catalog-backed pricing oracle

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::ports::PricingOracle;
use crate::domain::submission::{Category, LineItem};
use crate::shared::error::{AppError, AppResult};

/// Fee gross-up applied when the payer opts to cover processing fees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    /// Fractional percentage, e.g. 0.029
    pub percent: Decimal,
    pub fixed: Decimal,
}

impl FeeSchedule {
    /// Smallest total that nets `subtotal` after the gateway takes its fee
    pub fn gross_up(&self, subtotal: Decimal) -> AppResult<Decimal> {
        let keep = Decimal::ONE - self.percent;
        if keep <= Decimal::ZERO {
            return Err(AppError::Config("fee percent must be below 1".into()));
        }
        Ok(((subtotal + self.fixed) / keep).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }
}

pub struct CatalogPricing {
    prices: HashMap<(Category, String), Decimal>,
    fees: FeeSchedule,
}

impl CatalogPricing {
    pub fn new(fees: FeeSchedule) -> Self {
        Self { prices: HashMap::new(), fees }
    }

    pub fn with_price(mut self, category: Category, sku: &str, unit_price: Decimal) -> Self {
        self.prices.insert((category, sku.to_string()), unit_price);
        self
    }
}

impl PricingOracle for CatalogPricing {
    fn calculate_total(&self, category: Category, selections: &[LineItem], cover_fees: bool) -> AppResult<Decimal> {
        let mut subtotal = Decimal::ZERO;
        for item in selections {
            let unit = self
                .prices
                .get(&(category, item.sku.clone()))
                .ok_or_else(|| AppError::Validation(format!("unknown item {} for {}", item.sku, category)))?;
            subtotal += *unit * Decimal::from(item.quantity);
        }
        if cover_fees && subtotal > Decimal::ZERO {
            self.fees.gross_up(subtotal)
        } else {
            Ok(subtotal.round_dp(2))
        }
    }
}
