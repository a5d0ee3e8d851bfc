use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::gateway::Gateway;
use crate::types::{
    Bet, BetRequest, Match, PlacedBet, Profile, Transaction, WalletSnapshot, null_as_default,
};

/// Default path listing the caller's own bets. Some deployments use `/bets/me`.
pub const MY_BETS_PATH: &str = "/bets/my";

/// List endpoints answer with either a bare array or an object wrapping it.
///
/// Items are kept as raw JSON so one malformed record can be dropped
/// without losing the rest of the list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Bare(Vec<Value>),
    Wrapped(Wrapped),
}

#[derive(Debug, Deserialize)]
struct Wrapped {
    #[serde(
        alias = "matches",
        alias = "bets",
        alias = "transactions",
        alias = "history",
        alias = "data",
        default,
        deserialize_with = "null_as_default"
    )]
    items: Vec<Value>,
}

impl Listing {
    /// Decode every item on its own, skipping (and logging) the ones that do not fit `T`.
    fn decode<T: DeserializeOwned>(self, kind: &str) -> Vec<T> {
        let items = match self {
            Self::Bare(items) => items,
            Self::Wrapped(wrapped) => wrapped.items,
        };
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!("Skipping malformed {kind} record: {e}");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

/// Successful `/auth/login` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub user: Option<Profile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfileResponse {
    Wrapped { user: Profile },
    Bare(Profile),
}

/// Responses that only carry a human-readable message.
#[derive(Debug, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Exchange identifier and secret for a bearer credential.
pub async fn login(gw: &Gateway, identifier: &str, secret: &str) -> Result<LoginResponse, ClientError> {
    gw.post(
        "/auth/login",
        &Credentials {
            email: identifier,
            password: secret,
        },
    )
    .await
}

pub async fn fetch_profile(gw: &Gateway) -> Result<Profile, ClientError> {
    let resp: ProfileResponse = gw.get("/auth/me").await?;
    Ok(match resp {
        ProfileResponse::Wrapped { user } => user,
        ProfileResponse::Bare(user) => user,
    })
}

pub async fn change_password(
    gw: &Gateway,
    old_password: &str,
    new_password: &str,
) -> Result<MessageResponse, ClientError> {
    gw.put(
        "/auth/change-password",
        &PasswordChange {
            old_password,
            new_password,
        },
    )
    .await
}

pub async fn fetch_matches(gw: &Gateway) -> Result<Vec<Match>, ClientError> {
    let matches = gw.get::<Listing>("/matches").await?.decode("match");
    debug!("Fetched {} matches", matches.len());
    Ok(matches)
}

pub async fn place_bet(gw: &Gateway, req: &BetRequest) -> Result<PlacedBet, ClientError> {
    gw.post("/bets", req).await
}

pub async fn cancel_bet(gw: &Gateway, bet_id: &str) -> Result<MessageResponse, ClientError> {
    gw.delete_segments(&["bets", bet_id]).await
}

/// Fetch the caller's bets from `path` (normally [`MY_BETS_PATH`]).
pub async fn fetch_my_bets(gw: &Gateway, path: &str) -> Result<Vec<Bet>, ClientError> {
    let bets = gw.get::<Listing>(path).await?.decode("bet");
    debug!("Fetched {} bets", bets.len());
    Ok(bets)
}

/// Fetch settled bets (completed tosses).
pub async fn fetch_bet_history(gw: &Gateway) -> Result<Vec<Bet>, ClientError> {
    let bets = gw.get::<Listing>("/bets/history").await?.decode("bet");
    debug!("Fetched {} settled bets", bets.len());
    Ok(bets)
}

pub async fn fetch_wallet(gw: &Gateway) -> Result<WalletSnapshot, ClientError> {
    gw.get("/wallet/balance").await
}

pub async fn fetch_transactions(gw: &Gateway) -> Result<Vec<Transaction>, ClientError> {
    let txs = gw
        .get::<Listing>("/wallet/transactions")
        .await?
        .decode("transaction");
    debug!("Fetched {} transactions", txs.len());
    Ok(txs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches_from(value: serde_json::Value) -> Vec<Match> {
        serde_json::from_value::<Listing>(value)
            .expect("valid listing")
            .decode("match")
    }

    #[test]
    fn listing_accepts_bare_array() {
        let ms = matches_from(json!([
            { "_id": "m1", "title": "A vs B", "status": "LIVE" }
        ]));
        assert_eq!(ms.len(), 1);
        assert_eq!(ms[0].id, "m1");
    }

    #[test]
    fn listing_accepts_wrapped_array() {
        let ms = matches_from(json!({
            "matches": [
                { "_id": "m1", "title": "A vs B", "status": "LIVE" },
                { "_id": "m2", "title": "C vs D", "status": "UPCOMING" }
            ]
        }));
        assert_eq!(ms.len(), 2);

        let bets: Vec<Bet> = serde_json::from_value::<Listing>(json!({
            "bets": [{ "_id": "b1", "side": "A", "stake": 10 }]
        }))
        .unwrap()
        .decode("bet");
        assert_eq!(bets[0].side(), "A");
    }

    #[test]
    fn listing_object_without_items_is_empty() {
        assert!(matches_from(json!({ "ok": true })).is_empty());
        assert!(matches_from(json!({ "matches": null })).is_empty());
    }

    #[test]
    fn malformed_record_drops_only_itself() {
        let ms = matches_from(json!([
            { "_id": "m1", "title": "A vs B", "status": "LIVE" },
            { "_id": "m2", "title": null, "status": "UPCOMING" },
            { "title": "no id", "status": "LIVE" },
            "garbage"
        ]));
        let ids: Vec<&str> = ms.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);

        let txs: Vec<Transaction> = serde_json::from_value::<Listing>(json!({
            "transactions": [
                { "_id": "t1", "type": "DEPOSIT", "amount": 100, "meta": null },
                { "_id": "t2", "type": "DEPOSIT", "amount": "lots" }
            ]
        }))
        .unwrap()
        .decode("transaction");
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].id, "t1");
    }

    #[test]
    fn profile_response_shapes() {
        let wrapped: ProfileResponse =
            serde_json::from_value(json!({ "user": { "_id": "u1", "name": "Ravi" } })).unwrap();
        assert!(matches!(wrapped, ProfileResponse::Wrapped { ref user } if user.id == "u1"));

        let bare: ProfileResponse =
            serde_json::from_value(json!({ "_id": "u2", "username": "ravi" })).unwrap();
        assert!(matches!(bare, ProfileResponse::Bare(ref user) if user.id == "u2"));
    }

    #[test]
    fn password_change_body_is_camel_case() {
        let body = serde_json::to_value(PasswordChange {
            old_password: "a",
            new_password: "b",
        })
        .unwrap();
        assert_eq!(body, json!({ "oldPassword": "a", "newPassword": "b" }));
    }
}
