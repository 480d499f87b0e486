use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use editorial_importer::board::{BoardClient, BoardConfig, board_id_from_env};
use editorial_importer::import::{
    ImportEngine, ImportMappings, ImportOptions, ImportResult, PgContentSink, PgLookupSource,
};
use sqlx::postgres::PgPoolOptions;

#[derive(Parser, Debug)]
#[command(
    name = "import_board",
    about = "Import Trello cards into the editorial pipeline"
)]
struct Args {
    /// Map and report every card without writing to the database.
    #[arg(long)]
    dry_run: bool,

    /// Import cards even when an earlier run already imported them.
    #[arg(long)]
    force: bool,

    /// Board to import. Defaults to `BOARD_ID`.
    #[arg(long)]
    board: Option<String>,

    /// Only import cards from this list id. May be repeated.
    #[arg(long = "list", value_name = "LIST_ID")]
    lists: Vec<String>,

    /// Mapping tables file. Defaults to `IMPORT_MAPPINGS_PATH` or the built-in tables.
    #[arg(long, value_name = "PATH")]
    mappings: Option<PathBuf>,

    /// Print the full result as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    editorial_importer::init_logger();

    let args = Args::parse();

    let mappings = ImportMappings::load(args.mappings.as_deref())?;
    let board = BoardClient::new(BoardConfig::from_env())?;

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "DATABASE_URL must be set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let engine = ImportEngine::new(
        Arc::new(board),
        Arc::new(PgLookupSource::new(pool.clone())),
        Arc::new(PgContentSink::new(pool.clone())),
    )
    .with_mappings(Arc::new(mappings));

    let options = ImportOptions {
        board_id: args.board.unwrap_or_else(board_id_from_env),
        dry_run: args.dry_run,
        skip_existing: !args.force,
        list_filter: (!args.lists.is_empty()).then_some(args.lists),
    };

    let result = match engine.run(&options).await {
        Ok(result) => result,
        Err(err) => {
            log::error!("import failed: {}", err);
            writeln!(io::stderr(), "error: {err}")?;
            pool.close().await;
            std::process::exit(1);
        }
    };
    pool.close().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result, options.dry_run);
    }

    if result.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(result: &ImportResult, dry_run: bool) {
    println!();
    println!("Import summary{}", if dry_run { " (dry run)" } else { "" });
    println!("  total cards: {}", result.total_cards);
    println!("  imported:    {}", result.imported);
    println!("  skipped:     {}", result.skipped);
    println!("  errors:      {}", result.errors);

    let failures: Vec<_> = result.results.iter().filter(|r| r.is_error()).collect();
    if !failures.is_empty() {
        println!();
        println!("Failed cards:");
        for failure in failures {
            println!(
                "  {} ({}): {}",
                failure.card_name,
                failure.card_id,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
