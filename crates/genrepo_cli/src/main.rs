//! Demo entry point exercising the repository layer end to end.
//!
//! # Responsibility
//! - Open a catalog database (file or in-memory) through `genrepo_core`.
//! - Run a short insert/query/update/delete scenario and print the results.

mod catalog;

use anyhow::Context;
use catalog::{Album, Artist, CatalogDb, CATALOG_MIGRATIONS};
use clap::Parser;
use genrepo_core::{
    default_log_level, init_logging, ContextOptions, DbContext, Filter, GenericRepository,
    LogOptions, OrderBy, QueryOptions, Repository,
};
use log::info;
use std::path::PathBuf;

/// Generic repository demo over a music catalog.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// SQLite file to use; omit for an in-memory database.
    #[arg(long, env = "GENREPO_DB")]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files; omit to disable logging.
    #[arg(long, env = "GENREPO_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// One of trace|debug|info|warn|error.
    #[arg(long, env = "GENREPO_LOG_LEVEL")]
    log_level: Option<String>,
}

type CatalogRepo = GenericRepository<Artist, CatalogDb>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(&LogOptions::new(level, log_dir)).context("failed to start logging")?;
    }

    let mut repo = match &cli.db {
        Some(path) => {
            let context = DbContext::open(&ContextOptions::file(path), CATALOG_MIGRATIONS)
                .with_context(|| format!("failed to open `{}`", path.display()))?;
            CatalogRepo::with_context(context)?
        }
        None => CatalogRepo::new()?,
    };

    run(&mut repo).await?;
    repo.dispose()?;
    Ok(())
}

async fn run(repo: &mut CatalogRepo) -> anyhow::Result<()> {
    if repo.get_count(None)? == 0 {
        let (artists, albums) = catalog::seed();
        for artist in artists {
            repo.insert(artist)?;
        }
        let mut album_set = repo.context_mut()?.set::<Album>();
        for album in albums {
            album_set.add(album)?;
        }
        let written = repo.save_async().await?;
        info!("event=demo_seed module=cli status=ok rows={written}");
        println!("seeded {written} rows");
    }

    let artists = repo
        .get_async(
            QueryOptions::new()
                .include("albums")
                .order_by(OrderBy::asc("name")),
        )
        .await?;
    for artist in &artists {
        let country = artist.country.as_deref().unwrap_or("??");
        println!("{} [{}] ({country})", artist.name, artist.id);
        for album in &artist.albums {
            println!("  {} {}", album.year, album.title);
        }
    }

    let since_1970 = repo
        .context()?
        .connection()
        .query_row(
            "SELECT COUNT(DISTINCT artist_id) FROM albums WHERE year >= 1970;",
            [],
            |row| row.get::<_, i64>(0),
        )?;
    println!(
        "artists: {} total, {} outside the US, {since_1970} active since 1970",
        repo.get_count(None)?,
        repo.get_count(Some(!Filter::eq("country", "US".to_string())))?
    );

    if let Some(mut artist) = repo.get_by_id_async(2).await? {
        artist.name = artist.name.to_uppercase();
        repo.update(artist)?;
        let written = repo.save()?;
        println!("renamed artist 2 ({written} row)");
    }

    let newest = repo
        .get_queryable(QueryOptions::new().order_by(OrderBy::desc("id")))?
        .first()?;
    if let Some(newest) = newest {
        println!("highest id: {} {}", newest.id, newest.name);
    }

    match repo.delete_by_id(&99) {
        Ok(()) => println!("deleted artist 99"),
        Err(err) => println!("delete skipped: {err}"),
    }
    Ok(())
}
