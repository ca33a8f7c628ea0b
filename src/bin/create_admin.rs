use std::process;

use clap::Parser;
use clinic_cms::{PostgresUserRepository, accounts, config::AppConfig};
use sqlx::postgres::PgPoolOptions;

/// Creates an admin-panel account with the configured admin role.
#[derive(Debug, Parser)]
#[command(name = "create_admin", version, about)]
struct Args {
    /// Login name of the new account.
    #[arg(long = "user")]
    username: String,

    #[arg(long)]
    password: String,

    #[arg(long)]
    email: String,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_cms=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            process::exit(1);
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to connect to Postgres: {e}");
            process::exit(1);
        }
    };

    let users = PostgresUserRepository::new(pool);
    match accounts::create_superuser(
        &users,
        config.admin_role,
        &args.username,
        &args.password,
        &args.email,
    )
    .await
    {
        Ok(user) => println!("Created user '{}' with role '{}'", user.username, user.role),
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
