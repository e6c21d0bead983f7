//! Business constants for a portal instance
use rust_decimal::Decimal;

use super::error::PortalError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    payout_rate: Decimal, // share of the service fee credited to staff
    recent_limit: usize,  // tasks shown on a dashboard
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            payout_rate: Decimal::new(70, 2),
            recent_limit: 5,
        }
    }
}

impl PortalConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_payout_rate(mut self, rate: Decimal) -> Self {
        self.payout_rate = rate;
        self
    }
    pub fn set_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }
    pub fn payout_rate(&self) -> Decimal {
        self.payout_rate
    }
    pub fn recent_limit(&self) -> usize {
        self.recent_limit
    }
    pub fn validate(&self) -> Result<(), PortalError> {
        if self.payout_rate < Decimal::ZERO || self.payout_rate > Decimal::ONE {
            return Err(PortalError::Validation(format!(
                "payout rate {} must be between 0 and 1",
                self.payout_rate
            )));
        }
        Ok(())
    }
}
