//! BeFit CLI - database migrations, seed data and maintenance jobs.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! befit migrate
//!
//! # Seed loyalty tiers, categories, plans and products
//! befit seed all
//!
//! # Create an admin account, or promote an existing user
//! befit admin create -e admin@befit.mx -f Ana -l Torres
//! befit admin promote -e coach@befit.mx
//!
//! # Scheduled jobs
//! befit loyalty expire
//! befit subscriptions renew
//! ```
//!
//! # Commands
//!
//! - `migrate` - Apply database migrations
//! - `seed` - Insert reference and demo data (idempotent)
//! - `admin` - Manage admin accounts
//! - `loyalty expire` - Expire points past their expiry date
//! - `subscriptions renew` - Charge subscriptions due for renewal

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "befit")]
#[command(author, version, about = "BeFit CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Insert seed data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Loyalty maintenance
    Loyalty {
        #[command(subcommand)]
        action: LoyaltyAction,
    },
    /// Subscription maintenance
    Subscriptions {
        #[command(subcommand)]
        action: SubscriptionAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Loyalty tiers
    Tiers,
    /// Product categories
    Categories,
    /// Subscription plans
    Plans,
    /// Demo products (requires categories)
    Products,
    /// Everything, in dependency order
    All,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Identity provider subject, if the account already exists there
        #[arg(long)]
        cognito_sub: Option<String>,
    },
    /// Grant the admin role to an existing user
    Promote {
        /// Email of the user to promote
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum LoyaltyAction {
    /// Expire points whose expiry date has passed
    Expire,
}

#[derive(Subcommand)]
enum SubscriptionAction {
    /// Charge active subscriptions whose next delivery is due
    Renew,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "befit=info,befit_api=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => {
            let pool = commands::connect().await?;
            match target {
                SeedTarget::Tiers => commands::seed::tiers(&pool).await?,
                SeedTarget::Categories => commands::seed::categories(&pool).await?,
                SeedTarget::Plans => commands::seed::plans(&pool).await?,
                SeedTarget::Products => commands::seed::products(&pool).await?,
                SeedTarget::All => {
                    commands::seed::tiers(&pool).await?;
                    commands::seed::categories(&pool).await?;
                    commands::seed::plans(&pool).await?;
                    commands::seed::products(&pool).await?;
                }
            }
        }
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                first_name,
                last_name,
                cognito_sub,
            } => {
                commands::admin::create_user(&email, &first_name, &last_name, cognito_sub)
                    .await?;
            }
            AdminAction::Promote { email } => commands::admin::promote(&email).await?,
        },
        Commands::Loyalty {
            action: LoyaltyAction::Expire,
        } => commands::jobs::expire_points().await?,
        Commands::Subscriptions {
            action: SubscriptionAction::Renew,
        } => commands::jobs::renew_subscriptions().await?,
    }
    Ok(())
}
