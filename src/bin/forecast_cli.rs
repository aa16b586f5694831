use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use revenue_forecast::{
    commands::forecasting::RunForecastCommand,
    config::{self, AppConfig},
    db::{self, DbPool},
    ml::Sale,
    models::ForecastView,
    repositories::{ProductRepository, SaleRepository},
    services::{analytics::AnalyticsService, forecasting::ForecastingService},
};
use serde::Serialize;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize(matches!(cli.command, Commands::Migrate)).await?;

    match cli.command {
        Commands::Run(args) => handle_run(&context, args, cli.json).await?,
        Commands::Kpis(args) => handle_kpis(&context, args, cli.json).await?,
        Commands::List(args) => handle_list(&context, args, cli.json).await?,
        Commands::AddProduct(args) => handle_add_product(&context, args, cli.json).await?,
        Commands::AddSale(args) => handle_add_sale(&context, args, cli.json).await?,
        Commands::Migrate => println!("Migrations applied"),
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "forecast-cli",
    about = "Revenue KPIs and per-product revenue forecasts",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a fresh forecast and replace the tenant's stored set
    Run(RunArgs),
    /// Revenue KPIs of a tenant
    Kpis(TenantArgs),
    /// Stored forecasts of a tenant
    List(TenantArgs),
    /// Register a product
    AddProduct(AddProductArgs),
    /// Record a single sale
    AddSale(AddSaleArgs),
    /// Apply pending database migrations
    Migrate,
}

#[derive(Args)]
struct TenantArgs {
    #[arg(long, help = "Tenant (account) id")]
    tenant: i32,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, help = "Tenant (account) id")]
    tenant: i32,
    #[arg(long, help = "Reference instant (RFC 3339); defaults to now")]
    now: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct AddProductArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    price: Option<f64>,
}

#[derive(Args)]
struct AddSaleArgs {
    #[arg(long, help = "Tenant (account) id")]
    tenant: i32,
    #[arg(long)]
    product: i32,
    #[arg(long, help = "Sale date (YYYY-MM-DD)")]
    date: NaiveDate,
    #[arg(long, default_value_t = 1)]
    quantity: i32,
    #[arg(long, help = "Total value of the sale")]
    total: f64,
}

struct CliContext {
    config: AppConfig,
    db: Arc<DbPool>,
}

impl CliContext {
    async fn initialize(force_migrations: bool) -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        db::check_connection(&db_pool)
            .await
            .context("database is not reachable")?;

        if config.auto_migrate || force_migrations {
            db::run_migrations(&db_pool)
                .await
                .context("failed to run database migrations")?;
        }
        debug!(environment = %config.environment, "CLI context ready");

        Ok(Self {
            config,
            db: Arc::new(db_pool),
        })
    }

    fn forecasting_service(&self) -> ForecastingService {
        ForecastingService::from_db(self.db.clone(), self.config.forecast.clone())
    }

    fn analytics_service(&self) -> AnalyticsService {
        AnalyticsService::from_db(self.db.clone())
    }
}

async fn handle_run(context: &CliContext, args: RunArgs, json: bool) -> Result<()> {
    let command = RunForecastCommand::new(args.tenant, args.now.unwrap_or_else(Utc::now));
    let outcome = command
        .outcome(Arc::new(context.forecasting_service()))
        .await;

    if json {
        print_json(&outcome)?;
    } else {
        println!("[{}] {}", outcome.status, outcome.message);
        if let Some(run) = &outcome.run {
            println!(
                "Totals ({}): {:.2} / {:.2} / {:.2}",
                run.method, run.forecast_totals[0], run.forecast_totals[1], run.forecast_totals[2]
            );
            for (rank, product) in run.top_products.iter().enumerate() {
                println!(
                    "  {}. {} (weight {:.1}%)",
                    rank + 1,
                    product.name,
                    product.normalized_weight * 100.0
                );
            }
        }
    }

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_kpis(context: &CliContext, args: TenantArgs, json: bool) -> Result<()> {
    let kpis = context
        .analytics_service()
        .revenue_kpis(args.tenant)
        .await
        .context("failed to compute revenue KPIs")?;

    if json {
        return print_json(&kpis);
    }

    println!("Total revenue: {:.2}", kpis.total_revenue);
    println!("Average ticket: {:.2}", kpis.average_ticket);
    println!(
        "Sales: {} across {} products",
        kpis.total_sales, kpis.distinct_products
    );
    if let Some(best) = &kpis.best_seller {
        println!("Best seller: {} ({} units)", best.name, best.quantity);
    }
    println!("Monthly revenue:");
    for month in &kpis.monthly_revenue {
        println!("  {} {:.2}", month.period, month.revenue);
    }
    println!("Top products:");
    for product in &kpis.top_products {
        println!(
            "  - {} • revenue {:.2} • qty {}",
            product.name, product.revenue, product.quantity
        );
    }
    println!("Categories:");
    for category in &kpis.categories {
        println!(
            "  - {} • revenue {:.2} • {} sales",
            category.category, category.revenue, category.sales
        );
    }
    Ok(())
}

async fn handle_list(context: &CliContext, args: TenantArgs, json: bool) -> Result<()> {
    let forecasts = context
        .forecasting_service()
        .forecasts(args.tenant)
        .await
        .context("failed to list stored forecasts")?;

    if json {
        return print_json(&forecasts);
    }

    if forecasts.is_empty() {
        println!("No stored forecasts for tenant {}", args.tenant);
    }
    for forecast in &forecasts {
        render_forecast(forecast);
    }
    Ok(())
}

async fn handle_add_product(context: &CliContext, args: AddProductArgs, json: bool) -> Result<()> {
    let product = ProductRepository::new(context.db.clone())
        .create(&args.name, args.category.as_deref(), args.price)
        .await
        .context("failed to create product")?;

    if json {
        print_json(&product)
    } else {
        println!("Product {} created (id {})", product.name, product.id);
        Ok(())
    }
}

async fn handle_add_sale(context: &CliContext, args: AddSaleArgs, json: bool) -> Result<()> {
    let sale = Sale::new(0, args.date, args.product, args.quantity, args.total);
    let stored = SaleRepository::new(context.db.clone())
        .create(args.tenant, &sale)
        .await
        .context("failed to record sale")?;

    if json {
        print_json(&stored)
    } else {
        println!(
            "Sale {} recorded for tenant {} (product {}, {:.2})",
            stored.id, stored.tenant_id, stored.product_id, stored.total_value
        );
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_forecast(forecast: &ForecastView) {
    println!(
        "- {} • {} • {:.2} {}",
        forecast.forecast_date,
        forecast.product_name,
        forecast.predicted_revenue,
        forecast.confidence_interval
    );
}
