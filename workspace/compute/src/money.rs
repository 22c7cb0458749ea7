use rust_decimal::Decimal;
use rusty_money::{Money, iso};

/// Formats amounts in one ISO 4217 currency for user-facing text.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyFormat {
    currency: &'static iso::Currency,
}

impl CurrencyFormat {
    /// Looks up an ISO currency code such as `"USD"` or `"INR"`.
    pub fn from_code(code: &str) -> Option<Self> {
        iso::find(&code.trim().to_uppercase()).map(|currency| Self { currency })
    }

    pub fn code(&self) -> &'static str {
        self.currency.iso_alpha_code
    }

    pub fn format(&self, amount: Decimal) -> String {
        Money::from_decimal(amount.round_dp(2), self.currency).to_string()
    }
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            currency: iso::USD,
        }
    }
}
