use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fastnet::config::Config;
use fastnet::db::{self, AppState};
use fastnet::{activation, hotspot, payments};

#[derive(Parser)]
#[command(name = "fastnet", version, about = "Hotspot billing: mobile money and vouchers to router access")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Deactivate expired sessions and remove their router accounts
    Sweep,
    /// Issue a batch of vouchers and print the codes
    Vouchers {
        #[arg(long)]
        package_id: i64,
        #[arg(long, default_value_t = 1)]
        quantity: i64,
    },
    /// List paid payments without a session and unprovisioned sessions
    Reconcile,
}

fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let pool = db::create_pool(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))?;
    {
        let conn = pool.get()?;
        db::init_db(&conn)?;
        db::seed_default_packages(&conn)?;
    }

    Ok(AppState {
        db: pool,
        gateway: payments::build_gateway(config)?,
        router: hotspot::build_router(config)?,
        username_prefix: config.username_prefix.clone(),
        currency: config.currency.clone(),
        admin_api_key: config.admin_api_key.clone(),
    })
}

async fn serve(config: Config, state: AppState) -> anyhow::Result<()> {
    tracing::info!(
        "Payment provider: {}, router: {}",
        state.gateway.name(),
        state.router.name()
    );
    if state.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; admin routes are disabled");
    }

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, fastnet::app(state)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fastnet=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let state = build_state(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, state).await?,
        Command::Sweep => {
            let expired = activation::sweep_expired_sessions(&state).await?;
            println!("Expired {} sessions", expired);
        }
        Command::Vouchers { package_id, quantity } => {
            let (package, vouchers) = activation::issue_voucher_batch(&state, package_id, quantity)?;
            for voucher in vouchers {
                println!("{}\t{}", voucher.code, package.name);
            }
        }
        Command::Reconcile => {
            let report = activation::reconciliation_report(&state)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
