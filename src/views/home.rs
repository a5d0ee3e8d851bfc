use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Remote, only_auth, require_session};
use crate::api;
use crate::bet_flow::BetSlip;
use crate::client::TossClient;
use crate::error::ClientError;
use crate::freshness::Subscription;
use crate::types::{Bet, Match, MatchStatus};

/// Stake the user has riding on one side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideStake {
    pub side: String,
    pub stake: Decimal,
}

/// Which affordance a match card shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CardState {
    /// No pending bet yet: stake entry on each side.
    Open,
    /// Pending bets exist: aggregate stake plus cancel / add-more.
    Placed {
        total_stake: Decimal,
        by_side: Vec<SideStake>,
        bet_ids: Vec<String>,
    },
    /// Past `last_bet_time`: no actions at all.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCard {
    pub match_id: String,
    pub title: String,
    pub sides: (String, String),
    pub status: MatchStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub last_bet_time: Option<DateTime<Utc>>,
    pub state: CardState,
}

/// Build the home screen cards.
///
/// Only UPCOMING and LIVE matches are shown, soonest-closing first, with
/// matches that never close at the end. A card is closed once `now` is past
/// its `last_bet_time`, whatever the status says.
pub fn build_cards(matches: &[Match], bets: &[Bet], now: DateTime<Utc>) -> Vec<MatchCard> {
    let mut active: Vec<&Match> = matches.iter().filter(|m| m.is_active()).collect();
    active.sort_by(|a, b| {
        match (a.last_bet_time, b.last_bet_time) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| a.start_at.cmp(&b.start_at))
    });

    active
        .into_iter()
        .map(|m| MatchCard {
            match_id: m.id.clone(),
            title: m.title.clone(),
            sides: m.sides(),
            status: m.status.clone(),
            start_at: m.start_at,
            last_bet_time: m.last_bet_time,
            state: card_state(m, bets, now),
        })
        .collect()
}

/// Decide the card state for one match against the user's bets.
pub fn card_state(m: &Match, bets: &[Bet], now: DateTime<Utc>) -> CardState {
    if !m.is_betting_open(now) {
        return CardState::Closed;
    }

    let pending: Vec<&Bet> = bets
        .iter()
        .filter(|b| b.is_pending() && b.match_id() == Some(m.id.as_str()))
        .collect();
    if pending.is_empty() {
        return CardState::Open;
    }

    let mut by_side: Vec<SideStake> = Vec::new();
    for bet in &pending {
        match by_side
            .iter_mut()
            .find(|s| s.side.eq_ignore_ascii_case(bet.side()))
        {
            Some(entry) => entry.stake += bet.stake,
            None => by_side.push(SideStake {
                side: bet.side().to_string(),
                stake: bet.stake,
            }),
        }
    }

    CardState::Placed {
        total_stake: pending.iter().map(|b| b.stake).sum(),
        by_side,
        bet_ids: pending.iter().map(|b| b.id.clone()).collect(),
    }
}

/// Match cards cross-referenced with the user's own bets.
pub struct HomeView {
    client: TossClient,
    matches: Remote<Vec<Match>>,
    bets: Remote<Vec<Bet>>,
    _matches_sub: Subscription,
    _bets_sub: Subscription,
}

impl HomeView {
    pub async fn mount(client: &TossClient) -> Result<Self, ClientError> {
        require_session(client.session())?;

        let matches = Remote::new();
        let bets = Remote::new();
        let gw = client.gateway();
        let bets_path = client.my_bets_path().to_string();
        let (m, b) = tokio::join!(
            matches.load(api::fetch_matches(gw)),
            bets.load(api::fetch_my_bets(gw, &bets_path)),
        );
        only_auth(m)?;
        only_auth(b)?;

        let matches_sub = {
            let gw = gw.clone();
            let matches = matches.clone();
            client
                .freshness()
                .subscribe("home.matches", &client.refresh().matches, move || {
                    let gw = gw.clone();
                    let matches = matches.clone();
                    async move { matches.load(api::fetch_matches(&gw)).await }
                })
        };
        let bets_sub = {
            let gw = gw.clone();
            let bets = bets.clone();
            client
                .freshness()
                .subscribe("home.bets", &client.refresh().bets, move || {
                    let gw = gw.clone();
                    let bets = bets.clone();
                    let path = bets_path.clone();
                    async move { bets.load(api::fetch_my_bets(&gw, &path)).await }
                })
        };

        Ok(Self {
            client: client.clone(),
            matches,
            bets,
            _matches_sub: matches_sub,
            _bets_sub: bets_sub,
        })
    }

    pub fn matches(&self) -> &Remote<Vec<Match>> {
        &self.matches
    }

    pub fn bets(&self) -> &Remote<Vec<Bet>> {
        &self.bets
    }

    pub fn cards(&self, now: DateTime<Utc>) -> Vec<MatchCard> {
        build_cards(
            &self.matches.data().unwrap_or_default(),
            &self.bets.data().unwrap_or_default(),
            now,
        )
    }

    /// Open a bet slip, unless the match is unknown or no longer taking bets.
    pub fn bet_slip(&self, match_id: &str, side: &str, now: DateTime<Utc>) -> Option<BetSlip> {
        let matches = self.matches.data()?;
        let m = matches.iter().find(|m| m.id == match_id)?;
        if !m.is_active() || !m.is_betting_open(now) {
            return None;
        }
        Some(self.client.bet_slip(m, side))
    }

    /// Cancel a pending bet; every subscribed view refreshes on success.
    pub async fn cancel(&self, bet_id: &str) -> Result<Option<String>, ClientError> {
        self.client.cancel_bet(bet_id).await
    }

    pub fn unmount(self) {}
}

impl Drop for HomeView {
    fn drop(&mut self) {
        self.matches.detach();
        self.bets.detach();
    }
}
