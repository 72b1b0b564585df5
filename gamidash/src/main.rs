//! gamidash - Admin dashboard statistics for a gamified learning platform
//!
//! Serves the dashboard API, or computes the dashboard once from the command line.

mod seed;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gamidash_core::analytics::{DashboardEngine, DashboardStats, Period};
use gamidash_core::{Config, Database};

#[derive(Parser)]
#[command(name = "gamidash")]
#[command(about = "Admin dashboard statistics for a gamified learning platform")]
#[command(version)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/gamidash/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the dashboard API
    Serve {
        /// Address to listen on, overriding the config
        #[arg(long)]
        bind: Option<String>,
    },
    /// Compute the dashboard once and print it
    Stats {
        /// Period token: "minggu ini", "this month", "semua", "2024-06-01..2024-06-30", ...
        #[arg(short, long, default_value = "")]
        period: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Create or upgrade the database schema
    Migrate,
    /// Load a small demo data set into an empty database
    Seed,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    if cli.verbose {
        config.logging.stderr = true;
    }
    if let Some(path) = cli.database {
        config.database.path = Some(path);
    }

    // Initialize logging
    let _log_guard =
        gamidash_core::logging::init(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let engine = open_engine(&config)?;
            server::serve(Arc::new(engine), &bind).await
        }
        Command::Stats { period, format } => {
            let engine = open_engine(&config)?;
            let now = engine.now().context("invalid utc_offset")?;
            let stats = engine
                .compute(&Period::parse(&period), now)
                .await
                .context("failed to compute dashboard")?;

            match format {
                OutputFormat::Json => {
                    let body = serde_json::json!({ "data": stats });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                OutputFormat::Text => print_text(&stats),
            }
            Ok(())
        }
        Command::Migrate => {
            let path = config.database.resolved_path();
            open_database(&config)?;
            println!("Database ready at {}", path.display());
            Ok(())
        }
        Command::Seed => {
            let db = open_database(&config)?;
            match seed::seed(&db, chrono::Utc::now()).context("failed to seed database")? {
                Some(summary) => println!(
                    "Seeded {} users, {} challenges, {} habits, {} habit logs, {} reflections",
                    summary.users,
                    summary.challenges,
                    summary.habits,
                    summary.habit_logs,
                    summary.reflections
                ),
                None => println!("Database already has users; nothing seeded."),
            }
            Ok(())
        }
    }
}

fn open_database(config: &Config) -> Result<Database> {
    let path = config.database.resolved_path();
    tracing::info!(path = %path.display(), "Opening database");

    let db = Database::open(&path).context("failed to open database")?;
    db.set_busy_timeout(config.database.busy_timeout())
        .context("failed to set busy timeout")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(db)
}

fn open_engine(config: &Config) -> Result<DashboardEngine> {
    let db = open_database(config)?;
    Ok(DashboardEngine::new(Arc::new(db), config.dashboard.clone()))
}

fn print_text(stats: &DashboardStats) {
    match stats.range.bounds() {
        Some((start, end)) => println!(
            "Dashboard ({}): {} to {}",
            stats.period,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ),
        None => println!("Dashboard ({}): all history", stats.period),
    }
    println!();

    println!(
        "Users:        {} students, {} teachers, {} parents, {} active",
        stats.total_students, stats.total_teachers, stats.total_parents, stats.total_active_users
    );
    println!(
        "Challenges:   {} individual, {} group running",
        stats.active_individual_challenges, stats.active_group_challenges
    );
    println!(
        "Habits:       {} done, {} not done",
        stats.done_habits, stats.not_done_habits
    );
    println!("Reflections:  {}", stats.reflections_today);
    let moods = &stats.mood_distribution;
    println!(
        "Moods:        happy {}, neutral {}, sad {}, angry {}, tired {}",
        moods.happy, moods.neutral, moods.sad, moods.angry, moods.tired
    );

    if !stats.top_students.is_empty() {
        println!("\nTop students:");
        for (rank, student) in stats.top_students.iter().enumerate() {
            println!(
                "  {:>2}. {} ({} XP, level {})",
                rank + 1,
                student.name,
                student.xp,
                student.level
            );
        }
    }

    if !stats.habit_trends.is_empty() {
        println!("\nHabit trend:");
        for point in &stats.habit_trends {
            println!(
                "  {:<16} done {:>3}  not done {:>3}",
                point.week, point.done, point.not_done
            );
        }
    }

    if !stats.recent_activities.is_empty() {
        println!("\nRecent activity:");
        for activity in &stats.recent_activities {
            println!(
                "  {}  {}",
                activity.timestamp.format("%Y-%m-%d %H:%M"),
                activity.message
            );
        }
    }

    if !stats.challenge_progress.is_empty() {
        println!("\nChallenge progress:");
        for challenge in &stats.challenge_progress {
            println!(
                "  {} ({}): {}/{} completed, {:.1}%",
                challenge.title,
                challenge.challenge_type.as_str(),
                challenge.completed_participants,
                challenge.total_participants,
                challenge.completion_rate
            );
        }
    }

    if !stats.degraded.is_empty() {
        println!("\nDegraded: {}", stats.degraded.join(", "));
    }
}
