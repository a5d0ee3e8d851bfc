use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Authenticated user snapshot as returned by `/auth/login` and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(alias = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Profile {
    /// Handle shown under the avatar: `@username`, else `@name`, else `@User`.
    pub fn handle(&self) -> String {
        match (&self.username, &self.name) {
            (Some(username), _) if !username.is_empty() => format!("@{username}"),
            (_, Some(name)) if !name.is_empty() => format!("@{name}"),
            _ => "@User".to_string(),
        }
    }
}

/// Bearer credential plus the last-known profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub credential: String,
    pub profile: Option<Profile>,
}

/// Lifecycle of a match as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchStatus {
    Upcoming,
    Live,
    Completed,
    Other(String),
}

impl From<String> for MatchStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "UPCOMING" => Self::Upcoming,
            "LIVE" => Self::Live,
            "COMPLETED" => Self::Completed,
            _ => Self::Other(raw),
        }
    }
}

impl From<MatchStatus> for String {
    fn from(status: MatchStatus) -> Self {
        match status {
            MatchStatus::Upcoming => "UPCOMING".into(),
            MatchStatus::Live => "LIVE".into(),
            MatchStatus::Completed => "COMPLETED".into(),
            MatchStatus::Other(raw) => raw,
        }
    }
}

/// A match card. Read-only on the client; the server is the sole writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub status: MatchStatus,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_bet_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<String>,
}

impl Match {
    /// The two sides named in a `"TeamA vs TeamB"` title.
    pub fn sides(&self) -> (String, String) {
        split_sides(&self.title)
    }

    /// Betting is open until `last_bet_time`; matches without one never close.
    pub fn is_betting_open(&self, now: DateTime<Utc>) -> bool {
        self.last_bet_time.is_none_or(|deadline| now <= deadline)
    }

    /// Whether the match belongs on the home screen at all.
    pub fn is_active(&self) -> bool {
        matches!(self.status, MatchStatus::Upcoming | MatchStatus::Live)
    }
}

/// Split on the first case-insensitive `vs`, trimming both halves.
pub fn split_sides(title: &str) -> (String, String) {
    let lower = title.to_ascii_lowercase();
    match lower.find("vs") {
        Some(idx) => (
            title[..idx].trim().to_string(),
            title[idx + 2..].trim().to_string(),
        ),
        None => (title.trim().to_string(), String::new()),
    }
}

/// Subset of a match the server embeds inside bet rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    #[serde(alias = "_id", default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub last_bet_time: Option<DateTime<Utc>>,
}

/// A bet's match reference: either a bare id or the populated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchRef {
    Id(String),
    Populated(MatchSummary),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BetStatus {
    #[default]
    Pending,
    Won,
    Lost,
    Refunded,
    Other(String),
}

impl From<String> for BetStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "WON" => Self::Won,
            "LOST" => Self::Lost,
            "REFUNDED" => Self::Refunded,
            _ => Self::Other(raw),
        }
    }
}

impl From<BetStatus> for String {
    fn from(status: BetStatus) -> Self {
        match status {
            BetStatus::Pending => "PENDING".into(),
            BetStatus::Won => "WON".into(),
            BetStatus::Lost => "LOST".into(),
            BetStatus::Refunded => "REFUNDED".into(),
            BetStatus::Other(raw) => raw,
        }
    }
}

/// Result label shown next to a bet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetOutcome {
    Waiting,
    Won,
    Lost,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_info: Option<MatchRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    pub stake: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub potential_win: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: BetStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Bet {
    /// Side the bet backs; older server builds call it `team`.
    pub fn side(&self) -> &str {
        self.team
            .as_deref()
            .or(self.side.as_deref())
            .unwrap_or_default()
    }

    pub fn match_id(&self) -> Option<&str> {
        match &self.match_info {
            Some(MatchRef::Id(id)) => Some(id),
            Some(MatchRef::Populated(summary)) if !summary.id.is_empty() => Some(&summary.id),
            _ => self.match_id.as_deref(),
        }
    }

    pub fn match_title(&self) -> &str {
        match &self.match_info {
            Some(MatchRef::Populated(summary)) => &summary.title,
            _ => "Match Deleted",
        }
    }

    pub fn match_result(&self) -> Option<&str> {
        match &self.match_info {
            Some(MatchRef::Populated(summary)) => summary
                .result
                .as_deref()
                .filter(|r| !r.trim().is_empty()),
            _ => None,
        }
    }

    /// Compare the match result with the backed side, case-insensitively.
    pub fn outcome(&self) -> BetOutcome {
        let Some(result) = self.match_result() else {
            return BetOutcome::Waiting;
        };
        if result.eq_ignore_ascii_case("PENDING") {
            BetOutcome::Waiting
        } else if result.eq_ignore_ascii_case("DRAW") {
            BetOutcome::Draw
        } else if result.eq_ignore_ascii_case(self.side()) {
            BetOutcome::Won
        } else {
            BetOutcome::Lost
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BetStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionKind {
    BetStake,
    BetWin,
    Refund,
    Reversal,
    BetCancel,
    Deposit,
    Withdraw,
    AdminCredit,
    AdminDebit,
    Other(String),
}

impl TransactionKind {
    /// Stake returned to the wallet, whatever the server called it.
    pub fn is_refund(&self) -> bool {
        matches!(self, Self::Refund | Self::Reversal | Self::BetCancel)
    }
}

impl From<String> for TransactionKind {
    fn from(raw: String) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "BET_STAKE" => Self::BetStake,
            "BET_WIN" => Self::BetWin,
            "REFUND" => Self::Refund,
            "REVERSAL" => Self::Reversal,
            "BET_CANCEL" => Self::BetCancel,
            "DEPOSIT" => Self::Deposit,
            "WITHDRAW" => Self::Withdraw,
            "ADMIN_CREDIT" => Self::AdminCredit,
            "ADMIN_DEBIT" => Self::AdminDebit,
            _ => Self::Other(raw),
        }
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::BetStake => "BET_STAKE".into(),
            TransactionKind::BetWin => "BET_WIN".into(),
            TransactionKind::Refund => "REFUND".into(),
            TransactionKind::Reversal => "REVERSAL".into(),
            TransactionKind::BetCancel => "BET_CANCEL".into(),
            TransactionKind::Deposit => "DEPOSIT".into(),
            TransactionKind::Withdraw => "WITHDRAW".into(),
            TransactionKind::AdminCredit => "ADMIN_CREDIT".into(),
            TransactionKind::AdminDebit => "ADMIN_DEBIT".into(),
            TransactionKind::Other(raw) => raw,
        }
    }
}

/// Free-form context attached to a ledger entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub match_name: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Append-only wallet ledger entry. `amount` is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(default)]
    pub balance_after: Option<Decimal>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: TransactionMeta,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Server-derived wallet figures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub wallet_balance: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exposure: Decimal,
}

impl WalletSnapshot {
    /// Balance not committed to unsettled bets. Never clamped.
    pub fn available(&self) -> Decimal {
        self.wallet_balance - self.exposure
    }
}

/// Body of `POST /bets`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    pub match_id: String,
    pub side: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub stake: Decimal,
}

/// Response of `POST /bets`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlacedBet {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub bet: Option<Bet>,
}
