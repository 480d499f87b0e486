use std::io::{self, Write};

use clap::Parser;
use editorial_importer::auth::{AuthConfig, JwtService, Role};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "create_user",
    about = "Create an editorial user and optionally mint an access token for it"
)]
struct Args {
    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Optional display name to associate with the account.
    #[arg(long)]
    display_name: Option<String>,

    /// Role to assign (`admin`, `editor` or `author`).
    #[arg(long, default_value = "author")]
    role: String,

    /// Print a signed access token for the new user.
    #[arg(long)]
    issue_token: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let email = args.email.trim().to_lowercase();

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }

    let Some(role) = Role::parse(&args.role) else {
        writeln!(
            io::stderr(),
            "error: unsupported role '{}'. Use 'admin', 'editor' or 'author'.",
            args.role
        )?;
        std::process::exit(1);
    };

    // Fail before touching the database if tokens cannot be signed.
    let jwt = if args.issue_token {
        Some(JwtService::from_config(&AuthConfig::from_env()?)?)
    } else {
        None
    };

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM app_users WHERE lower(email) = lower($1)",
    )
    .bind(&email)
    .fetch_one(&pool)
    .await?;

    if existing > 0 {
        writeln!(io::stderr(), "error: a user with email '{email}' already exists.")?;
        std::process::exit(1);
    }

    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO app_users (email, display_name, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&email)
    .bind(args.display_name.as_ref())
    .bind(role.as_str())
    .fetch_one(&pool)
    .await?;

    println!("Created {} user '{email}' with id {user_id}", role.as_str());

    if let Some(jwt) = jwt {
        let signed = jwt.issue_access_token(user_id, &email, role)?;
        println!("Access token (expires {}):", signed.expires_at.to_rfc3339());
        println!("{}", signed.token);
    }

    Ok(())
}
