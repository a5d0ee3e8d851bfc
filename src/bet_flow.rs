use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api;
use crate::client::TossClient;
use crate::error::ClientError;
use crate::types::{BetRequest, Match, PlacedBet};

/// Multiplier used only to preview a payout before submitting.
/// The server computes the real potential win.
pub const PREVIEW_MULTIPLIER: Decimal = Decimal::from_parts(198, 0, 0, false, 2);

/// Fallback shown when a rejection carries no message.
pub const PLACE_BET_FALLBACK: &str = "Error placing bet. Check wallet balance or match status.";

/// Modal bet placement for one side of one match.
pub struct BetSlip {
    client: TossClient,
    match_id: String,
    match_title: String,
    side: String,
    open: bool,
}

impl BetSlip {
    pub fn open(client: TossClient, m: &Match, side: &str) -> Self {
        Self {
            client,
            match_id: m.id.clone(),
            match_title: m.title.clone(),
            side: side.to_string(),
            open: true,
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn match_title(&self) -> &str {
        &self.match_title
    }

    pub fn side(&self) -> &str {
        &self.side
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    /// Payout estimate for the stake typed so far, if it is a valid stake.
    pub fn preview_potential_win(raw_stake: &str) -> Option<Decimal> {
        parse_stake(raw_stake)
            .ok()
            .map(|stake| (stake * PREVIEW_MULTIPLIER).round_dp(2))
    }

    /// Validate and place the bet.
    ///
    /// Invalid stakes fail before any request. Server rejections are passed
    /// through with their message; nothing is retried. On success the slip
    /// closes and wallet and bet invalidations are published.
    pub async fn submit(&mut self, raw_stake: &str) -> Result<PlacedBet, ClientError> {
        if !self.open {
            return Err(ClientError::Validation("bet slip is closed".into()));
        }
        let stake = parse_stake(raw_stake)?;
        if !self.client.session().is_authenticated() {
            return Err(ClientError::Auth(Some(
                "You must be logged in to place a bet.".into(),
            )));
        }

        let req = BetRequest {
            match_id: self.match_id.clone(),
            side: self.side.clone(),
            stake,
        };
        let placed = match api::place_bet(self.client.gateway(), &req).await {
            Ok(placed) => placed,
            Err(e) => {
                let e = classify_rejection(e);
                warn!("Bet on {} ({}) rejected: {e}", self.match_title, self.side);
                return Err(e);
            }
        };

        info!("Placed {stake} on {} ({})", self.side, self.match_title);
        self.close();
        self.client.announce_wallet_change();
        Ok(placed)
    }
}

/// Stake must parse as a number strictly greater than zero.
pub fn parse_stake(raw: &str) -> Result<Decimal, ClientError> {
    let invalid = || ClientError::Validation("Enter a valid amount".into());
    let stake = Decimal::from_str(raw.trim()).map_err(|_| invalid())?;
    if stake <= Decimal::ZERO {
        return Err(invalid());
    }
    Ok(stake)
}

/// Map a 4xx rejection onto the bet-specific variants by its message text.
///
/// The message is kept verbatim; nothing is re-derived from local state.
pub fn classify_rejection(err: ClientError) -> ClientError {
    let rejection = match &err {
        ClientError::Http {
            status,
            message: Some(message),
        } if (400..500).contains(status) => Some(message.clone()),
        _ => None,
    };
    let Some(message) = rejection else {
        return err;
    };

    let lower = message.to_lowercase();
    if lower.contains("insufficient") || lower.contains("balance") {
        ClientError::InsufficientFunds(message)
    } else if ["closed", "tossed", "expired", "not open", "started", "time over"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        ClientError::MatchClosed(message)
    } else {
        err
    }
}
