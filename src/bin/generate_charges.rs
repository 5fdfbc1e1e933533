//! Creates this month's charges for every billable subscription.
//!
//! Meant to run from cron once a day; subscriptions already billed for the
//! month are skipped, so repeated runs are harmless.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use academy_billing::{
    config::Settings,
    connect_database,
    payments::AsaasGateway,
    service::ServiceContext,
};

#[derive(Parser, Debug)]
#[command(name = "generate-charges")]
#[command(about = "Generate monthly PIX charges for active subscriptions")]
struct Args {
    /// Reference date (YYYY-MM-DD). Defaults to today in UTC.
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Database URL (overrides configuration)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "academy_billing=info,generate_charges=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::new()?;

    let database_url = args.database_url.unwrap_or_else(|| settings.database.url.clone());
    let db_pool = connect_database(&database_url, settings.database.max_connections).await?;

    let gateway = Arc::new(AsaasGateway::new(&settings.gateway)?);
    let context = ServiceContext::new(db_pool, gateway, settings.billing.clone());

    let today = args.date.unwrap_or_else(|| Utc::now().date_naive());
    tracing::info!("Generating charges for {}", today.format("%Y-%m"));

    let report = context.charge_service.generate_monthly_charges(today).await?;

    tracing::info!(
        created = report.created,
        skipped = report.skipped,
        errors = report.errors,
        "Monthly charge generation finished"
    );

    if report.errors > 0 {
        anyhow::bail!("{} subscriptions could not be charged", report.errors);
    }

    Ok(())
}
