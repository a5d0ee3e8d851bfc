use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

use tossbook_client::bet_flow::{BetSlip, PLACE_BET_FALLBACK};
use tossbook_client::config::{AppConfig, CONFIG_PATH};
use tossbook_client::currency::{Currency, wallet_figures};
use tossbook_client::freshness::{FreshnessController, SignalBus, WALLET_CHANNEL};
use tossbook_client::reporter;
use tossbook_client::session::{Gate, SessionStore};
use tossbook_client::views::{
    BetRow, BetsView, HomeView, Remote, SidebarView, TossHistoryView, WalletView,
};
use tossbook_client::{ClientError, TossClient};

#[derive(Parser)]
#[command(name = "tossbook", about = "Friends Toss Book command-line client")]
struct Cli {
    /// Config file (defaults apply when it does not exist)
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Display currency, overriding the config file
    #[arg(long)]
    currency: Option<Currency>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the logged-in profile and wallet figures
    Whoami,
    /// List open and live matches with your stake on each
    Matches,
    /// List your bets
    Bets,
    /// Settled bets with won / lost / net totals
    History,
    /// Wallet balance and transaction ledger
    Wallet,
    /// Place a bet on one side of a match
    Place {
        match_id: String,
        side: String,
        stake: String,
    },
    /// Cancel a pending bet
    Cancel { bet_id: String },
    /// Change the account password (prompts for input)
    ChangePassword,
    /// Forget the stored session
    Logout,
    /// Stay mounted and print every view update until Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)?;
    config.apply_env();
    config.validate()?;
    if let Some(currency) = cli.currency {
        config.display.currency = currency;
    }
    info!("Using API at {}", config.api.base_url);

    let session = SessionStore::persistent(&config.session.path)?;
    let bus = SignalBus::new(WALLET_CHANNEL);
    let freshness = FreshnessController::attached(&bus);
    let client = TossClient::from_config(&config, session, freshness)?;

    if let Command::Logout = cli.command {
        client.logout();
        println!("Logged out.");
        return Ok(());
    }
    if let Gate::RedirectToLogin = client.session().gate() {
        bail!("not logged in, run `login` first");
    }

    let result = run(&client, &config, cli.command).await;
    if let Err(e) = &result
        && let Some(ClientError::Auth(_)) = e.downcast_ref::<ClientError>()
    {
        bail!("session expired, run `login` again");
    }
    result
}

async fn run(client: &TossClient, config: &AppConfig, command: Command) -> Result<()> {
    let currency = config.display.currency;
    let usd_rate = config.display.usd_rate;

    match command {
        Command::Whoami => {
            let sidebar = SidebarView::mount(client).await?;
            reporter::report_pretty(&sidebar.snapshot(currency, usd_rate));
        }
        Command::Matches => {
            let home = HomeView::mount(client).await?;
            warn_stale("matches", home.matches().error());
            reporter::report_pretty(&home.cards(Utc::now()));
        }
        Command::Bets => {
            let bets = BetsView::mount(client).await?;
            warn_stale("bets", bets.bets().error());
            reporter::report_pretty(&bets.rows());
        }
        Command::History => {
            let history = TossHistoryView::mount(client).await?;
            warn_stale("history", history.history().error());
            let rows: Vec<BetRow> = history
                .history()
                .data()
                .unwrap_or_default()
                .iter()
                .map(BetRow::from)
                .collect();
            reporter::report_pretty(&json!({
                "summary": history.summary(),
                "bets": rows,
            }));
        }
        Command::Wallet => {
            let wallet = WalletView::mount(client).await?;
            warn_stale("wallet", wallet.balance().error());
            let balance = wallet.balance().data().unwrap_or_default();
            let figures = wallet_figures(currency, &balance, usd_rate);
            reporter::report_pretty(&json!({
                "balance": figures.balance,
                "exposure": figures.exposure,
                "available": figures.available,
                "transactions": wallet.ledger(),
            }));
        }
        Command::Place {
            match_id,
            side,
            stake,
        } => {
            let home = HomeView::mount(client).await?;
            let Some(mut slip) = home.bet_slip(&match_id, &side, Utc::now()) else {
                bail!("match {match_id} is not open for betting");
            };
            if let Some(preview) = BetSlip::preview_potential_win(&stake) {
                info!("Potential win (estimate): {}", currency.format(preview, usd_rate));
            }
            match slip.submit(&stake).await {
                Ok(placed) => reporter::report_pretty(&placed),
                Err(e) if e.is_auth() => return Err(e.into()),
                Err(e) => bail!(e.user_message(PLACE_BET_FALLBACK)),
            }
        }
        Command::Cancel { bet_id } => {
            let message = client.cancel_bet(&bet_id).await?;
            println!("{}", message.unwrap_or_else(|| "Bet cancelled.".to_string()));
        }
        Command::ChangePassword => {
            let old = rpassword::prompt_password("Current password: ")
                .context("failed to read password")?;
            let new = rpassword::prompt_password("New password: ")
                .context("failed to read password")?;
            let confirm = rpassword::prompt_password("Confirm new password: ")
                .context("failed to read password")?;
            match client.change_password(&old, &new, &confirm).await {
                Ok(message) => println!("{message}"),
                Err(e) if e.is_auth() => return Err(e.into()),
                Err(e) => bail!(e.user_message("Failed to change password")),
            }
        }
        Command::Watch => watch(client, currency, usd_rate).await?,
        Command::Logout => client.logout(),
    }
    Ok(())
}

/// Keep the sidebar, home and bets views mounted, printing each update.
async fn watch(client: &TossClient, currency: Currency, usd_rate: Decimal) -> Result<()> {
    let (sidebar, home, bets) = tokio::try_join!(
        SidebarView::mount(client),
        HomeView::mount(client),
        BetsView::mount(client),
    )?;
    info!("Watching, press Ctrl+C to stop");

    let mut wallet_rx = sidebar.wallet().changes();
    let mut matches_rx = home.matches().changes();
    let mut home_bets_rx = home.bets().changes();
    let mut bets_rx = bets.bets().changes();

    reporter::report("sidebar", &sidebar.snapshot(currency, usd_rate));
    reporter::report("home", &home.cards(Utc::now()));
    reporter::report("bets", &bets.rows());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            changed = wallet_rx.changed() => {
                changed?;
                report_failure("sidebar", sidebar.wallet());
                reporter::report("sidebar", &sidebar.snapshot(currency, usd_rate));
            }
            changed = matches_rx.changed() => {
                changed?;
                report_failure("home", home.matches());
                reporter::report("home", &home.cards(Utc::now()));
            }
            changed = home_bets_rx.changed() => {
                changed?;
                report_failure("home", home.bets());
                reporter::report("home", &home.cards(Utc::now()));
            }
            changed = bets_rx.changed() => {
                changed?;
                report_failure("bets", bets.bets());
                reporter::report("bets", &bets.rows());
            }
        }
        if !client.session().is_authenticated() {
            return Err(ClientError::Auth(None).into());
        }
    }

    sidebar.unmount();
    home.unmount();
    bets.unmount();
    Ok(())
}

/// Emit an error line for `view` when its last refresh failed.
fn report_failure<T: Clone>(view: &str, remote: &Remote<T>) {
    let state = remote.snapshot();
    if let Some(error) = &state.error {
        warn!("{view} may be out of date: {error}");
        reporter::report_error(view, error, state.retryable);
    }
}

fn warn_stale(view: &str, error: Option<String>) {
    if let Some(e) = error {
        warn!("{view} may be out of date: {e}");
    }
}
