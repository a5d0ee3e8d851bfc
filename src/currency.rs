use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::WalletSnapshot;

/// Default INR per USD used for display conversion.
pub const DEFAULT_USD_RATE: Decimal = Decimal::from_parts(83, 0, 0, false, 0);

/// Display currency. Amounts from the server are always INR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Inr,
    Usd,
}

impl Currency {
    pub fn toggle(self) -> Self {
        match self {
            Self::Inr => Self::Usd,
            Self::Usd => Self::Inr,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Inr => "₹",
            Self::Usd => "$",
        }
    }

    /// Convert an INR amount for display, rounded to two decimals.
    pub fn convert(self, amount: Decimal, usd_rate: Decimal) -> Decimal {
        match self {
            Self::Inr => amount.round_dp(2),
            Self::Usd if usd_rate.is_zero() => amount.round_dp(2),
            Self::Usd => (amount / usd_rate).round_dp(2),
        }
    }

    pub fn format(self, amount: Decimal, usd_rate: Decimal) -> String {
        self.render(self.convert(amount, usd_rate))
    }

    /// Render an amount already in this currency.
    pub fn render(self, converted: Decimal) -> String {
        if converted.is_sign_negative() && !converted.is_zero() {
            format!("-{}{:.2}", self.symbol(), converted.abs())
        } else {
            format!("{}{:.2}", self.symbol(), converted)
        }
    }
}

/// Balance, exposure and available as displayed. Available is derived from
/// the two rounded figures so the three always add up on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletFigures {
    pub balance: String,
    pub exposure: String,
    pub available: String,
}

pub fn wallet_figures(
    currency: Currency,
    wallet: &WalletSnapshot,
    usd_rate: Decimal,
) -> WalletFigures {
    let balance = currency.convert(wallet.wallet_balance, usd_rate);
    let exposure = currency.convert(wallet.exposure, usd_rate);
    WalletFigures {
        balance: currency.render(balance),
        exposure: currency.render(exposure),
        available: currency.render(balance - exposure),
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::Inr),
            "USD" => Ok(Self::Usd),
            other => Err(format!("unknown currency {other} (expected INR or USD)")),
        }
    }
}
