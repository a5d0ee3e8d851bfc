use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use super::{Remote, only_auth, require_session};
use crate::api;
use crate::client::TossClient;
use crate::currency::{Currency, wallet_figures};
use crate::error::ClientError;
use crate::freshness::Subscription;
use crate::types::{Profile, WalletSnapshot};

/// What the sidebar renders: profile header plus BAL / EXP / available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidebarSnapshot {
    pub name: String,
    pub handle: String,
    pub balance: String,
    pub exposure: String,
    pub available: String,
    pub stale: bool,
    pub error: Option<String>,
}

/// Profile header and live wallet figures.
pub struct SidebarView {
    profile: Remote<Profile>,
    wallet: Remote<WalletSnapshot>,
    _wallet_sub: Subscription,
}

impl SidebarView {
    pub async fn mount(client: &TossClient) -> Result<Self, ClientError> {
        require_session(client.session())?;

        let profile = Remote::new();
        if let Some(cached) = client.session().profile() {
            profile.apply(Ok(cached));
        }
        let wallet = Remote::new();

        let profile_load = {
            let client = client.clone();
            let profile = profile.clone();
            async move { profile.load(client.refresh_profile()).await }
        };
        let wallet_load = wallet.load(api::fetch_wallet(client.gateway()));
        let (profile_result, wallet_result) = tokio::join!(profile_load, wallet_load);
        if let Err(e) = &profile_result {
            warn!("Error fetching user: {e}");
        }
        only_auth(profile_result)?;
        only_auth(wallet_result)?;

        let wallet_sub = {
            let gw = client.gateway().clone();
            let wallet = wallet.clone();
            client
                .freshness()
                .subscribe("sidebar.wallet", &client.refresh().wallet, move || {
                    let gw = gw.clone();
                    let wallet = wallet.clone();
                    async move { wallet.load(api::fetch_wallet(&gw)).await }
                })
        };

        Ok(Self {
            profile,
            wallet,
            _wallet_sub: wallet_sub,
        })
    }

    pub fn wallet(&self) -> &Remote<WalletSnapshot> {
        &self.wallet
    }

    pub fn profile(&self) -> &Remote<Profile> {
        &self.profile
    }

    /// Available balance from the last good snapshot.
    pub fn available(&self) -> Option<Decimal> {
        self.wallet.data().map(|w| w.available())
    }

    pub fn snapshot(&self, currency: Currency, usd_rate: Decimal) -> SidebarSnapshot {
        let wallet_state = self.wallet.snapshot();
        let wallet = wallet_state.data.unwrap_or_default();
        let profile = self.profile.data().unwrap_or_default();
        let figures = wallet_figures(currency, &wallet, usd_rate);
        SidebarSnapshot {
            name: profile
                .name
                .clone()
                .unwrap_or_else(|| "Friends Toss Book".to_string()),
            handle: profile.handle(),
            balance: figures.balance,
            exposure: figures.exposure,
            available: figures.available,
            stale: wallet_state.error.is_some(),
            error: wallet_state.error,
        }
    }

    pub fn unmount(self) {}
}

impl Drop for SidebarView {
    fn drop(&mut self) {
        self.profile.detach();
        self.wallet.detach();
    }
}
