//! fpm-report - settlement reports from the command line
//!
//! Prints a JSON report on stdout. Failures print a JSON `ErrorResponse`
//! and exit with status 1.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shared::{Pagination, Role, User, UserStatus};
use uuid::Uuid;

use fertilizer_procurement_backend::services::{
    DeliveryOrderService, LetterService, SettlementService,
};
use fertilizer_procurement_backend::store::{OrderFilter, PgProcurementStore, ProcurementStore};
use fertilizer_procurement_backend::{telemetry, AppError, AppResult, Config};

#[derive(Parser)]
#[command(name = "fpm-report", version, about = "Settlement reports for fertilizer procurement")]
struct Cli {
    /// Run the report with this user's permissions instead of as the local operator
    #[arg(long, global = true)]
    user: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Batch totals and one line per delivery order
    Batch { id: Uuid },
    /// Delivery order totals with per-buyer allocation and distribution lines
    Order { id: Uuid },
    /// Buyers still missing an allocation or distribution
    Readiness { id: Uuid },
    /// Allocated against distributed quantity per buyer
    Chart { id: Uuid },
    /// Facts for the bank allocation letter
    Letter { id: Uuid },
    /// Delivery orders, newest first
    Orders {
        /// Exact LC number of the batch
        #[arg(long)]
        lc: Option<String>,
        /// Prefix of the vessel name or LC number
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(code = err.code(), "Error: {err}");
            match serde_json::to_string_pretty(&err.to_response()) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<String> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;
    telemetry::init(&config.logging)?;

    tracing::info!(environment = %config.environment, "Starting fpm-report");
    let store = PgProcurementStore::connect(&config.database).await?;
    if config.is_development() {
        tracing::info!("Running database migrations...");
        store.migrate().await?;
    }
    let store: Arc<dyn ProcurementStore> = Arc::new(store);

    let actor = match cli.user {
        Some(id) => store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("user", id))?,
        None => operator(),
    };

    let settlement = SettlementService::new(store.clone());
    match cli.command {
        Command::Batch { id } => to_json(&settlement.batch_summary(id, &actor).await?),
        Command::Order { id } => to_json(&settlement.order_summary(id, &actor).await?),
        Command::Readiness { id } => to_json(&settlement.readiness(id, &actor).await?),
        Command::Chart { id } => to_json(&settlement.regional_chart(id, &actor).await?),
        Command::Letter { id } => {
            let letters = LetterService::new(store);
            to_json(&letters.allocation_letter(id, &actor).await?)
        }
        Command::Orders { lc, search, page } => {
            let filter = OrderFilter {
                lc_number: lc,
                search,
                ..Default::default()
            };
            let pagination = Pagination {
                page,
                ..Default::default()
            };
            let orders = DeliveryOrderService::new(store);
            to_json(&orders.list(filter, &pagination, &actor).await?)
        }
    }
}

/// The person running the binary with direct database access
fn operator() -> User {
    let now = Utc::now();
    User {
        id: Uuid::nil(),
        username: "fpm-report".to_string(),
        email: None,
        status: UserStatus::Active,
        role: Some(Role::Admin),
        supplier_id: None,
        is_superuser: true,
        created_at: now,
        updated_at: now,
    }
}

fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Internal(e.into()))
}
