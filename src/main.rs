//! Coursecart CLI

use std::{
    io::{self, Write},
    path::PathBuf,
    time::Duration,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use coursecart::{
    checkout::CheckoutSession,
    config::{PricingConfig, catalog::CourseCatalog},
    currency::CurrencyCode,
    discounts::percent_points,
    exchange::format_money,
    logging::{self, LoggingConfig},
    payments::{PaymentMethod, SimulatedGateway},
    preferences::{FilePreferenceStore, PreferenceStore},
    receipt::write_order_summary,
};
use jiff::Timestamp;

#[derive(Debug, Parser)]
#[command(name = "coursecart", about = "Course marketplace pricing", long_about = None)]
struct Cli {
    /// Pricing tables (rates, coupons, tax, tiers); built-in tables when omitted
    #[arg(long, env = "COURSECART_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Course catalog; built-in courses when omitted
    #[arg(long, env = "COURSECART_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Display currency; the saved preference, or USD, when omitted
    #[arg(long, global = true)]
    currency: Option<CurrencyCode>,

    /// File the selected currency is remembered in
    #[arg(
        long,
        env = "COURSECART_PREFERENCES",
        default_value = ".coursecart.yml",
        global = true
    )]
    preferences: PathBuf,

    /// Price as of this instant instead of now (RFC 3339)
    #[arg(long, global = true)]
    at: Option<Timestamp>,

    #[command(flatten)]
    logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List courses with prices in the display currency
    Catalog,

    /// Price an order
    Quote(OrderArgs),

    /// Check a coupon against an order
    Coupon {
        /// Coupon code
        code: String,

        /// Course ids
        #[arg(required = true)]
        courses: Vec<String>,
    },

    /// Show the bulk tier for a staff count
    Tier {
        /// Number of staff
        staff_count: u32,
    },

    /// Price seats of a course for an organization
    Seats {
        /// Course id
        course: String,

        /// Number of staff
        staff_count: u32,
    },

    /// Price an order and pay for it through the simulated gateway
    Pay(PayArgs),

    /// Remember a display currency for later runs
    Currency {
        /// Currency code, e.g. NGN
        code: CurrencyCode,
    },
}

#[derive(Debug, Args)]
struct OrderArgs {
    /// Course ids
    #[arg(required = true)]
    courses: Vec<String>,

    /// Coupon code to apply
    #[arg(long)]
    coupon: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Card,
    BankTransfer,
    MobileMoney,
}

#[derive(Debug, Args)]
struct PayArgs {
    #[command(flatten)]
    order: OrderArgs,

    /// Merchant order reference
    #[arg(long, default_value = "ORD-0001")]
    reference: String,

    /// Payment method
    #[arg(long, value_enum, default_value_t = MethodArg::Card)]
    method: MethodArg,

    /// Last four card digits; 0002 is always declined
    #[arg(long, default_value = "4242")]
    card: String,

    /// Simulated gateway latency in milliseconds
    #[arg(long, default_value_t = 1_500)]
    latency_ms: u64,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let _env = dotenvy::dotenv();

    let cli = Cli::parse();

    logging::init(&cli.logging)?;

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PricingConfig::load_or_builtin(cli.config.as_deref())
        .context("failed to load pricing config")?;
    let catalog = CourseCatalog::load_or_builtin(cli.catalog.as_deref())
        .context("failed to load course catalog")?;
    let store = FilePreferenceStore::new(&cli.preferences);
    let now = cli.at.unwrap_or_else(Timestamp::now);

    let mut session = CheckoutSession::with_preferences(&config, &store)?;

    if let Some(currency) = cli.currency {
        session.set_currency(currency);
    }

    let mut out = io::stdout().lock();

    match cli.command {
        Commands::Catalog => {
            for course in catalog.iter() {
                let price = course.display_price(config.rates(), session.currency())?;

                writeln!(
                    out,
                    "{:<16} {:<32} {:>10} {:>14}",
                    course.id(),
                    course.title(),
                    course.duration_label(),
                    format_money(&price)
                )?;
            }
        }
        Commands::Quote(order) => {
            fill_order(&mut session, &catalog, &order, now)?;

            let totals = session.totals(now)?;

            write_order_summary(&mut out, session.items(), &totals, config.rates())?;
        }
        Commands::Coupon { code, courses } => {
            for item in catalog.select(&courses)? {
                session.add_item(item)?;
            }

            let applied = session.apply_coupon(&code, now)?;

            writeln!(out, "{}: {}", applied.code, applied.description)?;
            writeln!(out, "discount: {}", format_money(&applied.discount))?;
        }
        Commands::Tier { staff_count } => {
            let tier = config.tiers().resolve(staff_count)?;

            writeln!(
                out,
                "{} ({}-{} seats): {}% off",
                tier.label,
                tier.min_seats,
                tier.max_seats,
                percent_points(&tier.discount).normalize()
            )?;
        }
        Commands::Seats {
            course,
            staff_count,
        } => {
            let item = catalog
                .get(&course)
                .with_context(|| format!("unknown course `{course}`"))?;

            let quote = config.tiers().quote_seats(
                config.rates(),
                item.unit_price(),
                staff_count,
                session.currency(),
            )?;

            writeln!(out, "{} x {} ({})", quote.seats, item.title(), quote.tier.label)?;
            writeln!(out, "seat:     {}", format_money(&quote.seat_price))?;
            writeln!(out, "gross:    {}", format_money(&quote.gross))?;
            writeln!(out, "discount: -{}", format_money(&quote.discount))?;
            writeln!(out, "net:      {}", format_money(&quote.net))?;
        }
        Commands::Pay(pay) => {
            fill_order(&mut session, &catalog, &pay.order, now)?;

            let method = match pay.method {
                MethodArg::Card => PaymentMethod::Card { last4: pay.card },
                MethodArg::BankTransfer => PaymentMethod::BankTransfer,
                MethodArg::MobileMoney => PaymentMethod::MobileMoney,
            };

            let gateway = SimulatedGateway::new(Duration::from_millis(pay.latency_ms));
            let receipt = session.pay(&gateway, pay.reference, method, now).await?;

            writeln!(
                out,
                "{} paid {} for {}{}",
                receipt.reference,
                format_money(&receipt.amount),
                receipt.order_reference,
                if receipt.charged { "" } else { " (no charge)" }
            )?;
        }
        Commands::Currency { code } => {
            store.save_currency(code)?;

            writeln!(out, "display currency set to {code}")?;
        }
    }

    Ok(())
}

fn fill_order(
    session: &mut CheckoutSession<'_>,
    catalog: &CourseCatalog,
    order: &OrderArgs,
    now: Timestamp,
) -> anyhow::Result<()> {
    for item in catalog.select(&order.courses)? {
        session.add_item(item)?;
    }

    if let Some(code) = &order.coupon {
        session.apply_coupon(code, now)?;
    }

    Ok(())
}
