use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};

mod aggregate;
mod config;
mod db;
mod grouping;
mod load;
mod matching;
mod models;
mod pipeline;
mod ranking;
mod report;
mod summary;
mod url;

use models::AppData;
use ranking::{SortDirection, SortKey};

/// Log directive used when `RUST_LOG` is unset. The target is the binary's
/// crate name, not the package name.
const DEFAULT_LOG_FILTER: &str = "cohort_ranking=info";

#[derive(Parser)]
#[command(name = "cohort-ranking")]
#[command(about = "Reconciles LMS grades with pull requests and ranks the cohort", long_about = None)]
struct Cli {
    /// Path to the cohort TOML config
    #[arg(long, global = true, default_value = "cohort.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match submissions to pull requests and write the site data
    Build {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        debug_report: Option<PathBuf>,
        /// Also write a report limited to attempts mentioning this keyword
        #[arg(long)]
        focus: Option<String>,
    },
    /// Print ranked students from generated site data
    Leaderboard {
        #[arg(long)]
        app_data: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = SortKey::Score)]
        sort: SortKey,
        #[arg(long, value_enum, default_value_t = SortDirection::Desc)]
        direction: SortDirection,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown summary per assignment
    Summary {
        #[arg(long)]
        app_data: Option<PathBuf>,
        #[arg(long, default_value = "assignment-summary.md")]
        out: PathBuf,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Store the current standings as a new run
    Publish {
        #[arg(long)]
        app_data: Option<PathBuf>,
    },
    /// Show past standings for one student
    History {
        #[arg(long)]
        login: String,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Build {
            out,
            debug_report,
            focus,
        } => {
            let inputs = load::load_inputs(&cfg).await?;
            let output = pipeline::run(&inputs, &cfg);

            let out = out.unwrap_or_else(|| cfg.app_data_path());
            write_file(&out, &serde_json::to_string_pretty(&output.app_data)?)?;

            let generated_at = Utc::now();
            let debug_path = debug_report.unwrap_or_else(|| cfg.debug_report_path());
            let markdown =
                report::build_matching_report("PR Matching Report", generated_at, &output.diagnostics);
            write_file(&debug_path, &markdown)?;

            if let Some(focus) = focus {
                let focused: Vec<_> = output
                    .diagnostics
                    .iter()
                    .filter(|d| d.mentions(&focus))
                    .cloned()
                    .collect();
                let focus_path = debug_path.with_file_name(format!("{focus}-debug.md"));
                let markdown = report::build_matching_report(
                    &format!("PR Matching Report: {focus}"),
                    generated_at,
                    &focused,
                );
                write_file(&focus_path, &markdown)?;
                println!(
                    "Focused report for {focus} ({} attempts) written to {}.",
                    focused.len(),
                    focus_path.display()
                );
            }

            let matched = output
                .diagnostics
                .iter()
                .filter(|d| d.status.is_success())
                .count();
            println!(
                "Matched {matched} of {} submissions for {} students ({} needed the handle and keyword search).",
                output.diagnostics.len(),
                output.app_data.users.len(),
                output.fallback_searches
            );
            println!("Site data written to {}.", out.display());
            println!("Matching report written to {}.", debug_path.display());
        }
        Commands::Leaderboard {
            app_data,
            sort,
            direction,
            limit,
        } => {
            let app = read_app_data(&app_data.unwrap_or_else(|| cfg.app_data_path()))?;
            let rows = ranking::leaderboard(&app.users, sort, direction);

            if rows.is_empty() {
                println!("No ranked students found.");
                return Ok(());
            }

            println!("Students by {sort:?} ({direction:?}):");
            for (login, user) in rows.into_iter().take(limit) {
                println!(
                    "- {} ({}) score {} grade {} with {} best practices",
                    user.name,
                    login,
                    user.score,
                    user.grade,
                    ranking::best_practice_count(user)
                );
            }
        }
        Commands::Summary { app_data, out } => {
            let app = read_app_data(&app_data.unwrap_or_else(|| cfg.app_data_path()))?;
            let summaries = summary::summarize(&app);
            let stats = summary::cohort_stats(&summaries);
            write_file(&out, &report::build_summary_report(&summaries, &stats))?;
            println!("Summary written to {}.", out.display());
        }
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Publish { app_data } => {
            let app = read_app_data(&app_data.unwrap_or_else(|| cfg.app_data_path()))?;
            let pool = connect().await?;
            let (run_id, inserted) = db::publish(&pool, &app, cfg.total_assignments()).await?;
            println!("Published {inserted} standings as run {run_id}.");
        }
        Commands::History { login, limit } => {
            let pool = connect().await?;
            let history = db::fetch_history(&pool, &login, limit).await?;

            if history.is_empty() {
                println!("No published standings for {login}.");
                return Ok(());
            }

            println!("Standings for {login}:");
            for record in history {
                println!(
                    "- {} run {}: {} ({}) score {} grade {}, {} completed, {} best practices",
                    record.generated_at.format("%Y-%m-%d %H:%M"),
                    record.run_id,
                    record.display_name,
                    record.login,
                    record.score,
                    record.grade,
                    record.completed,
                    record.best_practices
                );
            }
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn read_app_data(path: &Path) -> anyhow::Result<AppData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read site data {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("malformed site data in {}", path.display()))
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_targets_this_crate() {
        let (target, level) = DEFAULT_LOG_FILTER
            .split_once('=')
            .expect("directive has a target");
        assert!(module_path!().starts_with(target));
        assert_eq!(level, "info");
    }

    #[test]
    fn default_log_filter_enables_crate_info_events() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(tracing::Level::INFO));
            assert!(!tracing::enabled!(tracing::Level::DEBUG));
        });
    }
}
