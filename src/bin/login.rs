//! login: sign in to the toss service and store the session locally.
//!
//! Reads the password interactively (hidden input) so it never lands in shell
//! history. The credential is written to the session file named in the
//! config, where `tossbook` picks it up.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use tossbook_client::api;
use tossbook_client::config::{AppConfig, CONFIG_PATH};
use tossbook_client::currency::wallet_figures;
use tossbook_client::freshness::FreshnessController;
use tossbook_client::session::SessionStore;
use tossbook_client::{ClientError, TossClient};

#[derive(Parser)]
#[command(name = "login", about = "Sign in and save the session for tossbook")]
struct Cli {
    /// Config file (defaults apply when it does not exist)
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Server API base URL. Written back to the config file after a
    /// successful login so later `tossbook` runs use it.
    #[arg(long)]
    api_url: Option<String>,

    /// Email or username. Prompted for when omitted.
    #[arg(long)]
    identifier: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(&cli.config)?;
    config.apply_env();
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.trim().to_string();
    }
    config.validate()?;

    println!("=== Friends Toss Book: Login ===\n");
    println!("Server: {}", config.api.base_url);

    let identifier = match cli.identifier {
        Some(id) => id,
        None => prompt_line("Email or username: ")?,
    };
    let password = rpassword::prompt_password("Password: ").context("failed to read password")?;

    let session = SessionStore::persistent(&config.session.path)?;
    let client = TossClient::from_config(&config, session, FreshnessController::new())?;

    println!("\nSigning in...");
    let session = match client.login(&identifier, &password).await {
        Ok(session) => session,
        Err(e @ (ClientError::Auth(_) | ClientError::Validation(_))) => {
            bail!("{}", e.user_message("Invalid credentials"))
        }
        Err(e) => return Err(e).context("login request failed"),
    };

    let profile = match session.profile {
        Some(profile) => profile,
        None => client.refresh_profile().await.unwrap_or_default(),
    };
    println!("  Signed in as {}", profile.handle());
    if let Some(name) = &profile.name {
        println!("  Name:      {name}");
    }

    match api::fetch_wallet(client.gateway()).await {
        Ok(wallet) => {
            let figures =
                wallet_figures(config.display.currency, &wallet, config.display.usd_rate);
            println!("  Balance:   {}", figures.balance);
            println!("  Exposure:  {}", figures.exposure);
            println!("  Available: {}", figures.available);
        }
        Err(e) => println!("  Wallet unavailable: {e}"),
    }

    if cli.api_url.is_some() {
        config.save(&cli.config)?;
        println!("\nServer saved to {}", cli.config.display());
    }
    println!("\nSession saved to {}", config.session.path.display());
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    use std::io::Write;

    print!("{prompt}");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read input")?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("identifier cannot be empty");
    }
    Ok(line)
}
