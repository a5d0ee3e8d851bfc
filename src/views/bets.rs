use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Remote, only_auth, require_session};
use crate::api;
use crate::client::TossClient;
use crate::error::ClientError;
use crate::freshness::Subscription;
use crate::types::{Bet, BetOutcome, BetStatus};

/// One line of the "My Bets" table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetRow {
    pub bet_id: String,
    pub match_title: String,
    pub side: String,
    pub stake: Decimal,
    pub potential_win: Decimal,
    pub status: BetStatus,
    pub outcome: BetOutcome,
    pub created_at: Option<DateTime<Utc>>,
    pub cancellable: bool,
}

impl From<&Bet> for BetRow {
    fn from(bet: &Bet) -> Self {
        Self {
            bet_id: bet.id.clone(),
            match_title: bet.match_title().to_string(),
            side: bet.side().to_string(),
            stake: bet.stake,
            potential_win: bet.potential_win,
            status: bet.status.clone(),
            outcome: bet.outcome(),
            created_at: bet.created_at,
            cancellable: bet.is_pending(),
        }
    }
}

/// The user's bets, kept fresh while mounted.
pub struct BetsView {
    client: TossClient,
    bets: Remote<Vec<Bet>>,
    _sub: Subscription,
}

impl BetsView {
    pub async fn mount(client: &TossClient) -> Result<Self, ClientError> {
        require_session(client.session())?;

        let bets = Remote::new();
        let path = client.my_bets_path().to_string();
        only_auth(bets.load(api::fetch_my_bets(client.gateway(), &path)).await)?;

        let sub = {
            let gw = client.gateway().clone();
            let bets = bets.clone();
            client
                .freshness()
                .subscribe("bets", &client.refresh().bets, move || {
                    let gw = gw.clone();
                    let bets = bets.clone();
                    let path = path.clone();
                    async move { bets.load(api::fetch_my_bets(&gw, &path)).await }
                })
        };

        Ok(Self {
            client: client.clone(),
            bets,
            _sub: sub,
        })
    }

    pub fn bets(&self) -> &Remote<Vec<Bet>> {
        &self.bets
    }

    pub fn rows(&self) -> Vec<BetRow> {
        self.bets
            .data()
            .unwrap_or_default()
            .iter()
            .map(BetRow::from)
            .collect()
    }

    /// Cancel a pending bet. Refund rules are the server's business.
    pub async fn cancel(&self, bet_id: &str) -> Result<Option<String>, ClientError> {
        self.client.cancel_bet(bet_id).await
    }

    pub fn unmount(self) {}
}

impl Drop for BetsView {
    fn drop(&mut self) {
        self.bets.detach();
    }
}
