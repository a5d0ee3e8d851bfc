use rust_decimal::Decimal;
use serde::Serialize;

use super::{Remote, only_auth, require_session};
use crate::api;
use crate::client::TossClient;
use crate::error::ClientError;
use crate::freshness::Subscription;
use crate::types::{Bet, BetOutcome};

/// Totals shown above the toss history table.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HistorySummary {
    /// Sum of potential win over winning bets.
    pub total_won: Decimal,
    /// Sum of stake over losing bets.
    pub total_lost: Decimal,
    pub net: Decimal,
}

/// Won pays out `potential_win`, lost forfeits `stake`; draws and unsettled
/// bets count toward neither.
pub fn summarize(bets: &[Bet]) -> HistorySummary {
    let mut summary = HistorySummary::default();
    for bet in bets {
        match bet.outcome() {
            BetOutcome::Won => summary.total_won += bet.potential_win,
            BetOutcome::Lost => summary.total_lost += bet.stake,
            BetOutcome::Draw | BetOutcome::Waiting => {}
        }
    }
    summary.net = summary.total_won - summary.total_lost;
    summary
}

/// Settled bets (completed tosses).
pub struct TossHistoryView {
    history: Remote<Vec<Bet>>,
    _sub: Subscription,
}

impl TossHistoryView {
    pub async fn mount(client: &TossClient) -> Result<Self, ClientError> {
        require_session(client.session())?;

        let history = Remote::new();
        only_auth(history.load(api::fetch_bet_history(client.gateway())).await)?;

        let sub = {
            let gw = client.gateway().clone();
            let history = history.clone();
            client
                .freshness()
                .subscribe("history", &client.refresh().history, move || {
                    let gw = gw.clone();
                    let history = history.clone();
                    async move { history.load(api::fetch_bet_history(&gw)).await }
                })
        };

        Ok(Self { history, _sub: sub })
    }

    pub fn history(&self) -> &Remote<Vec<Bet>> {
        &self.history
    }

    pub fn summary(&self) -> HistorySummary {
        summarize(&self.history.data().unwrap_or_default())
    }

    pub fn unmount(self) {}
}

impl Drop for TossHistoryView {
    fn drop(&mut self) {
        self.history.detach();
    }
}
