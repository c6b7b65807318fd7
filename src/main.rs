use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

mod completion;
mod config;
mod error;
mod loader;
mod models;
mod snapshot;

use config::EngineConfig;
use models::{
    DenominatorKind, GroupAggregate, GroupKey, PendingPolicy, SearchMode, Snapshot, Table,
};
use snapshot::SnapshotStore;

#[derive(Parser)]
#[command(name = "course-completion")]
#[command(about = "Course completion accounting for employee training sheets", long_about = None)]
struct Cli {
    /// TOML file with column names, office groups and policies
    #[arg(long, env = "COURSE_COMPLETION_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Override the pending-flag policy from the config
    #[arg(long, value_enum, global = true)]
    pending_policy: Option<PendingPolicy>,
    /// Override the group denominator policy from the config
    #[arg(long, value_enum, global = true)]
    denominator: Option<DenominatorKind>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// CSV export of the completion sheet
    #[arg(long)]
    csv: PathBuf,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the recognised course columns
    Columns {
        #[command(flatten)]
        input: Input,
    },
    /// Per-employee completion
    Employees {
        #[command(flatten)]
        input: Input,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Completion per group, plus the overall figure
    Groups {
        #[command(flatten)]
        input: Input,
        /// Group by the raw value of this column instead of the office groups
        #[arg(long)]
        by_column: Option<String>,
    },
    /// Employees with the most pending courses
    Pending {
        #[command(flatten)]
        input: Input,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Find employees by name
    Search {
        #[command(flatten)]
        input: Input,
        #[arg(long)]
        query: String,
        /// Match the whole name instead of a substring
        #[arg(long)]
        exact: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(policy) = cli.pending_policy {
        config.policy.pending = policy;
    }
    if let Some(denominator) = cli.denominator {
        config.policy.denominator = denominator;
    }

    let store = SnapshotStore::new();

    match cli.command {
        Commands::Columns { input } => {
            let snapshot = load(&store, &input.csv, &config)?;
            if input.json {
                return print_json(&snapshot.course_columns);
            }
            println!("{} course columns:", snapshot.course_count());
            for column in &snapshot.course_columns {
                println!("- {column}");
            }
        }
        Commands::Employees { input, limit } => {
            let snapshot = load(&store, &input.csv, &config)?;
            let limit = limit.unwrap_or(snapshot.employees.len());
            let employees = &snapshot.employees[..limit.min(snapshot.employees.len())];
            if input.json {
                return print_json(employees);
            }
            for employee in employees {
                println!(
                    "- {} ({}) {:.2}% complete, {} of {} pending",
                    employee.name,
                    employee.office,
                    employee.completion_pct,
                    employee.pending_count,
                    snapshot.course_count()
                );
            }
        }
        Commands::Groups { input, by_column } => {
            let table = loader::read_table(&input.csv)?;
            let snapshot = load_table(&store, &table, &input.csv, &config)?;
            let groups = match by_column {
                None => snapshot.groups.clone(),
                Some(column) => completion::aggregate(
                    &table,
                    &snapshot.employees,
                    snapshot.course_count(),
                    &GroupKey::Column(column),
                    &config.group_table(),
                    &config.denominator_policy(),
                )?,
            };

            if input.json {
                #[derive(Serialize)]
                struct GroupsOutput<'a> {
                    groups: &'a [GroupAggregate],
                    overall: &'a GroupAggregate,
                }
                return print_json(&GroupsOutput {
                    groups: &groups,
                    overall: &snapshot.overall,
                });
            }

            for group in groups.iter().chain(std::iter::once(&snapshot.overall)) {
                println!(
                    "- {}: {:.2}% complete ({} of {} slots pending, {} members, {} reported)",
                    group.group,
                    group.completion_pct,
                    group.pending_slots,
                    group.total_slots,
                    group.member_count,
                    group.observed_members
                );
            }
        }
        Commands::Pending { input, limit } => {
            let snapshot = load(&store, &input.csv, &config)?;
            let pending = completion::most_pending(&snapshot.employees, limit);
            if input.json {
                return print_json(&pending);
            }
            if pending.is_empty() {
                println!("No pending courses.");
                return Ok(());
            }
            println!("Employees with pending courses:");
            for employee in pending {
                println!(
                    "- {} ({}) {} pending: {}",
                    employee.name,
                    employee.office,
                    employee.pending_count,
                    employee.pending_courses.join(", ")
                );
            }
        }
        Commands::Search {
            input,
            query,
            exact,
        } => {
            let snapshot = load(&store, &input.csv, &config)?;
            let mode = if exact {
                SearchMode::Exact
            } else {
                SearchMode::Contains
            };
            let matches = completion::search_by_name(&snapshot.employees, &query, mode);
            if input.json {
                return print_json(&matches);
            }
            if matches.is_empty() {
                println!("No employees match \"{query}\".");
                return Ok(());
            }
            for employee in matches {
                println!(
                    "- {} ({}) {:.2}% complete",
                    employee.name, employee.office, employee.completion_pct
                );
                for course in &employee.pending_courses {
                    println!("    pending: {course}");
                }
            }
        }
    }

    Ok(())
}

fn load(
    store: &SnapshotStore,
    csv: &Path,
    config: &EngineConfig,
) -> anyhow::Result<Arc<Snapshot>> {
    let table = loader::read_table(csv)?;
    load_table(store, &table, csv, config)
}

fn load_table(
    store: &SnapshotStore,
    table: &Table,
    csv: &Path,
    config: &EngineConfig,
) -> anyhow::Result<Arc<Snapshot>> {
    store
        .load(table, &csv.display().to_string(), config)
        .with_context(|| format!("failed to load {}", csv.display()))?;
    store.current().context("no snapshot loaded")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
