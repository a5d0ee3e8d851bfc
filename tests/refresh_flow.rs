mod common;

use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;

use common::{MockServer, Reply, changed_within, eventually, logged_in};
use tossbook_client::TossClient;
use tossbook_client::config::RefreshConfig;
use tossbook_client::currency::Currency;
use tossbook_client::freshness::{
    FreshnessController, REFRESH_BETS, RefreshPolicy, SignalBus, UPDATE_WALLET, WALLET_CHANNEL,
};
use tossbook_client::gateway::Gateway;
use tossbook_client::views::{BetsView, SidebarView};

fn wallet(balance: u32, exposure: u32) -> Reply {
    Reply::json(200, json!({ "walletBalance": balance, "exposure": exposure }))
}

fn serve_profile(server: &MockServer) {
    server.route(
        "GET",
        "/auth/me",
        Reply::json(200, json!({ "user": { "_id": "u1", "name": "Ravi", "username": "ravi" } })),
    );
}

#[tokio::test]
async fn sidebar_shows_profile_and_available_balance() {
    let server = MockServer::start().await;
    serve_profile(&server);
    server.route("GET", "/wallet/balance", wallet(1500, 400));

    let client = server.client(logged_in("tok"), FreshnessController::new());
    let sidebar = SidebarView::mount(&client).await.unwrap();
    assert_eq!(sidebar.available(), Some(dec!(1100)));

    let snapshot = sidebar.snapshot(Currency::Inr, dec!(83));
    assert_eq!(snapshot.handle, "@ravi");
    assert_eq!(snapshot.balance, "₹1500.00");
    assert_eq!(snapshot.exposure, "₹400.00");
    assert_eq!(snapshot.available, "₹1100.00");
    assert!(!snapshot.stale);
}

#[tokio::test]
async fn failed_refresh_keeps_last_good_balance() {
    let server = MockServer::start().await;
    serve_profile(&server);
    server.route("GET", "/wallet/balance", wallet(1500, 0));

    let refresh = RefreshConfig {
        wallet: RefreshPolicy::every(Duration::from_millis(50)).on(UPDATE_WALLET),
        ..RefreshConfig::default()
    };
    let gw = server.gateway(logged_in("tok"));
    let client = TossClient::new(gw, FreshnessController::new(), refresh);
    let sidebar = SidebarView::mount(&client).await.unwrap();

    server.route(
        "GET",
        "/wallet/balance",
        Reply::json(500, json!({ "message": "db unavailable" })),
    );
    eventually(Duration::from_secs(2), || sidebar.wallet().error().is_some()).await;

    let state = sidebar.wallet().snapshot();
    assert_eq!(state.data.unwrap().wallet_balance, dec!(1500));
    assert!(!state.retryable);
    assert!(state.error.unwrap().contains("db unavailable"));
    assert!(sidebar.snapshot(Currency::Inr, dec!(83)).stale);

    server.route("GET", "/wallet/balance", wallet(1700, 0));
    eventually(Duration::from_secs(2), || sidebar.wallet().error().is_none()).await;
    assert_eq!(sidebar.available(), Some(dec!(1700)));
}

#[tokio::test]
async fn timed_out_refresh_keeps_balance_and_is_retryable() {
    let server = MockServer::start().await;
    serve_profile(&server);
    server.route("GET", "/wallet/balance", wallet(1500, 250));

    let refresh = RefreshConfig {
        wallet: RefreshPolicy::every(Duration::from_millis(50)).on(UPDATE_WALLET),
        ..RefreshConfig::default()
    };
    let gw = Gateway::new(&server.base_url, Duration::from_millis(200), logged_in("tok")).unwrap();
    let client = TossClient::new(gw, FreshnessController::new(), refresh);
    let sidebar = SidebarView::mount(&client).await.unwrap();

    server.route(
        "GET",
        "/wallet/balance",
        wallet(9999, 0).delayed(Duration::from_secs(2)),
    );
    eventually(Duration::from_secs(3), || sidebar.wallet().error().is_some()).await;

    let state = sidebar.wallet().snapshot();
    assert_eq!(state.data.unwrap().available(), dec!(1250));
    assert!(state.retryable);
    assert!(state.error.unwrap().contains("timed out"));
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn cancel_refreshes_sidebar_without_waiting_for_timer() {
    let server = MockServer::start().await;
    serve_profile(&server);
    server.route("GET", "/wallet/balance", wallet(1000, 300));
    server.route(
        "DELETE",
        "/bets/b1",
        Reply::json(200, json!({ "message": "Bet cancelled and refunded" })),
    );

    let client = server.client(logged_in("tok"), FreshnessController::new());
    let sidebar = SidebarView::mount(&client).await.unwrap();
    let mut changes = sidebar.wallet().changes();

    server.route("GET", "/wallet/balance", wallet(1300, 0));
    let message = client.cancel_bet("b1").await.unwrap();
    assert_eq!(message.as_deref(), Some("Bet cancelled and refunded"));

    // The timer period is 15s; the notify path must land well inside that.
    changed_within(&mut changes, Duration::from_secs(2)).await;
    assert_eq!(sidebar.available(), Some(dec!(1300)));
}

#[tokio::test]
async fn signal_reaches_views_in_another_context() {
    let server = MockServer::start().await;
    serve_profile(&server);
    server.route("GET", "/wallet/balance", wallet(800, 200));
    server.route("DELETE", "/bets/b9", Reply::json(200, json!({})));

    let bus = SignalBus::new(WALLET_CHANNEL);
    let tab_a = server.client(logged_in("tok"), FreshnessController::attached(&bus));
    let tab_b = server.client(logged_in("tok"), FreshnessController::attached(&bus));

    let sidebar_b = SidebarView::mount(&tab_b).await.unwrap();
    let mut changes = sidebar_b.wallet().changes();

    server.route("GET", "/wallet/balance", wallet(1000, 0));
    tab_a.cancel_bet("b9").await.unwrap();

    changed_within(&mut changes, Duration::from_secs(2)).await;
    assert_eq!(sidebar_b.available(), Some(dec!(1000)));
}

#[tokio::test]
async fn unmounted_view_stops_fetching() {
    let server = MockServer::start().await;
    server.route("GET", "/bets/my", Reply::json(200, json!([])));

    let client = server.client(logged_in("tok"), FreshnessController::new());
    let bets = BetsView::mount(&client).await.unwrap();
    assert_eq!(server.hits("GET", "/bets/my"), 1);

    let mut changes = bets.bets().changes();
    client.freshness().notify(REFRESH_BETS);
    changed_within(&mut changes, Duration::from_secs(2)).await;
    assert_eq!(server.hits("GET", "/bets/my"), 2);

    bets.unmount();
    assert_eq!(client.freshness().notify(REFRESH_BETS), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.hits("GET", "/bets/my"), 2);
}

#[tokio::test]
async fn configured_bets_path_is_used() {
    let server = MockServer::start().await;
    server.route(
        "GET",
        "/bets/me",
        Reply::json(
            200,
            json!({ "bets": [{ "_id": "b1", "match": "m1", "side": "CSK", "stake": 100, "status": "PENDING" }] }),
        ),
    );

    let client = server
        .client(logged_in("tok"), FreshnessController::new())
        .with_my_bets_path("/bets/me");
    let bets = BetsView::mount(&client).await.unwrap();
    let rows = bets.rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].cancellable);
    assert_eq!(server.hits("GET", "/bets/my"), 0);
}
