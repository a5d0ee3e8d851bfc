use serde::Serialize;

use super::{Remote, only_auth, require_session};
use crate::api;
use crate::client::TossClient;
use crate::error::ClientError;
use crate::freshness::Subscription;
use crate::types::{Transaction, WalletSnapshot};

/// One ledger row: the transaction plus whether it returned stake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub refund: bool,
}

/// Ledger rows, newest first. Undated entries sort last.
pub fn ledger_entries(mut txs: Vec<Transaction>) -> Vec<LedgerEntry> {
    txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    txs.into_iter()
        .map(|transaction| LedgerEntry {
            refund: transaction.kind.is_refund(),
            transaction,
        })
        .collect()
}

/// Wallet balance plus the transaction ledger.
pub struct WalletView {
    balance: Remote<WalletSnapshot>,
    transactions: Remote<Vec<Transaction>>,
    _balance_sub: Subscription,
    _ledger_sub: Subscription,
}

impl WalletView {
    pub async fn mount(client: &TossClient) -> Result<Self, ClientError> {
        require_session(client.session())?;

        let balance = Remote::new();
        let transactions = Remote::new();
        let gw = client.gateway();
        let (b, t) = tokio::join!(
            balance.load(api::fetch_wallet(gw)),
            transactions.load(api::fetch_transactions(gw)),
        );
        only_auth(b)?;
        only_auth(t)?;

        let balance_sub = {
            let gw = gw.clone();
            let balance = balance.clone();
            client
                .freshness()
                .subscribe("wallet.balance", &client.refresh().wallet, move || {
                    let gw = gw.clone();
                    let balance = balance.clone();
                    async move { balance.load(api::fetch_wallet(&gw)).await }
                })
        };
        let ledger_sub = {
            let gw = gw.clone();
            let transactions = transactions.clone();
            client.freshness().subscribe(
                "wallet.transactions",
                &client.refresh().transactions,
                move || {
                    let gw = gw.clone();
                    let transactions = transactions.clone();
                    async move { transactions.load(api::fetch_transactions(&gw)).await }
                },
            )
        };

        Ok(Self {
            balance,
            transactions,
            _balance_sub: balance_sub,
            _ledger_sub: ledger_sub,
        })
    }

    pub fn balance(&self) -> &Remote<WalletSnapshot> {
        &self.balance
    }

    pub fn transactions(&self) -> &Remote<Vec<Transaction>> {
        &self.transactions
    }

    pub fn ledger(&self) -> Vec<LedgerEntry> {
        ledger_entries(self.transactions.data().unwrap_or_default())
    }

    pub fn unmount(self) {}
}

impl Drop for WalletView {
    fn drop(&mut self) {
        self.balance.detach();
        self.transactions.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(id: &str, kind: &str, at: Option<&str>) -> Transaction {
        serde_json::from_value(json!({
            "_id": id,
            "type": kind,
            "amount": 100,
            "createdAt": at,
        }))
        .unwrap()
    }

    #[test]
    fn ledger_is_newest_first_with_refunds_flagged() {
        let entries = ledger_entries(vec![
            tx("t1", "BET_STAKE", Some("2025-03-01T10:00:00Z")),
            tx("t2", "BET_CANCEL", Some("2025-03-02T10:00:00Z")),
            tx("t3", "ADMIN_CREDIT", None),
        ]);
        let ids: Vec<&str> = entries.iter().map(|e| e.transaction.id.as_str()).collect();
        assert_eq!(ids, ["t2", "t1", "t3"]);
        assert!(entries[0].refund);
        assert!(!entries[1].refund);

        let row = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(row["id"], "t2");
        assert_eq!(row["refund"], true);
    }
}
