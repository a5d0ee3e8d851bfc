use anyhow::Result;
use tracing::info;

use crate::api::{self, MessageResponse};
use crate::bet_flow::BetSlip;
use crate::config::{AppConfig, RefreshConfig};
use crate::error::ClientError;
use crate::freshness::{FreshnessController, REFRESH_BETS, UPDATE_WALLET};
use crate::gateway::Gateway;
use crate::session::SessionStore;
use crate::types::{Match, Profile, Session};

/// Everything a view or command needs to talk to the toss service.
///
/// Cheap to clone; clones share the session, HTTP pool, and controller.
#[derive(Clone)]
pub struct TossClient {
    gateway: Gateway,
    freshness: FreshnessController,
    refresh: RefreshConfig,
    my_bets_path: String,
}

impl TossClient {
    pub fn new(gateway: Gateway, freshness: FreshnessController, refresh: RefreshConfig) -> Self {
        Self {
            gateway,
            freshness,
            refresh,
            my_bets_path: api::MY_BETS_PATH.to_string(),
        }
    }

    /// Wire a client from loaded configuration.
    pub fn from_config(
        config: &AppConfig,
        session: SessionStore,
        freshness: FreshnessController,
    ) -> Result<Self> {
        let gateway = Gateway::new(&config.api.base_url, config.api.timeout(), session)?;
        Ok(Self::new(gateway, freshness, config.refresh.clone())
            .with_my_bets_path(&config.api.my_bets_path))
    }

    pub fn with_my_bets_path(mut self, path: &str) -> Self {
        self.my_bets_path = path.to_string();
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn session(&self) -> &SessionStore {
        self.gateway.session()
    }

    pub fn freshness(&self) -> &FreshnessController {
        &self.freshness
    }

    pub fn refresh(&self) -> &RefreshConfig {
        &self.refresh
    }

    pub fn my_bets_path(&self) -> &str {
        &self.my_bets_path
    }

    /// Exchange credentials for a session and store it.
    ///
    /// Rejected credentials come back as [`ClientError::Auth`] carrying the
    /// server's message.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Session, ClientError> {
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(ClientError::Validation(
                "identifier and password are required".into(),
            ));
        }
        let resp = api::login(&self.gateway, identifier.trim(), secret)
            .await
            .map_err(|e| match e {
                ClientError::Http {
                    status: 400 | 403 | 404,
                    message,
                } => ClientError::Auth(message),
                other => other,
            })?;

        let session = Session {
            credential: resp.token,
            profile: resp.user,
        };
        self.session().establish(session.clone());
        info!(
            "Logged in as {}",
            session
                .profile
                .as_ref()
                .map(Profile::handle)
                .unwrap_or_else(|| identifier.to_string())
        );
        Ok(session)
    }

    /// Local logout; no server round trip.
    pub fn logout(&self) {
        self.session().logout();
    }

    /// Fetch `/auth/me` and cache the result in the session.
    pub async fn refresh_profile(&self) -> Result<Profile, ClientError> {
        let profile = api::fetch_profile(&self.gateway).await?;
        self.session().replace_profile(profile.clone());
        Ok(profile)
    }

    /// Rotate the password. Returns the server's confirmation message.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<String, ClientError> {
        if old_password.is_empty() || new_password.is_empty() || confirm_password.is_empty() {
            return Err(ClientError::Validation("Please fill all fields!".into()));
        }
        if new_password != confirm_password {
            return Err(ClientError::Validation("New passwords do not match!".into()));
        }
        let MessageResponse { message } =
            api::change_password(&self.gateway, old_password, new_password).await?;
        Ok(message.unwrap_or_else(|| "Password changed successfully!".to_string()))
    }

    /// Cancel a pending bet, then tell every view to refresh.
    ///
    /// Refund eligibility is decided by the server.
    pub async fn cancel_bet(&self, bet_id: &str) -> Result<Option<String>, ClientError> {
        let MessageResponse { message } = api::cancel_bet(&self.gateway, bet_id).await?;
        info!("Cancelled bet {bet_id}");
        self.announce_wallet_change();
        Ok(message)
    }

    /// Publish both wallet and bet invalidations.
    pub fn announce_wallet_change(&self) {
        self.freshness.notify(UPDATE_WALLET);
        self.freshness.notify(REFRESH_BETS);
    }

    /// Open the bet placement flow for one side of `m`.
    pub fn bet_slip(&self, m: &Match, side: &str) -> BetSlip {
        BetSlip::open(self.clone(), m, side)
    }
}
