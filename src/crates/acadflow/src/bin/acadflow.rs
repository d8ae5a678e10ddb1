//! acadflow CLI - Deadline-driven workflow tracking
//!
//! Main entry point for the acadflow command-line tool.

use acadflow::cli::{self, activity, deadline, engine, step, CliContext};
use acadflow::config::LoggingConfig;
use acadflow::{version_info, HealthChecker, HealthStatus, ShutdownCoordinator};
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

#[derive(Parser)]
#[command(name = "acadflow")]
#[command(about = "acadflow - Deadline-driven workflow tracking for internships and projects", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Log at the configured level instead of warnings only
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize acadflow configuration and database
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,

    /// Check system health
    Health {
        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Step catalogue commands
    #[command(subcommand)]
    Step(StepCommands),

    /// Deadline commands
    #[command(subcommand)]
    Deadline(DeadlineCommands),

    /// Activity tracking commands
    #[command(subcommand)]
    Activity(ActivityCommands),

    /// Classify a submission instant against a deadline
    Classify {
        /// Deadline ID
        deadline_id: String,
        /// Submission instant (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Run the transition engine once
    Run {
        /// Evaluate as of this instant (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show recent engine runs
    Runs {
        /// Number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },

    /// Run the transition engine on its schedule until interrupted
    Serve,
}

#[derive(Subcommand)]
enum StepCommands {
    /// List the steps of a workflow type
    List {
        /// Workflow type: internship, project1, project2
        workflow_type: String,
    },
    /// Add a step
    Add {
        /// Workflow type: internship, project1, project2
        workflow_type: String,
        /// Unique step key
        key: String,
        /// Position within the workflow type (1-based)
        #[arg(short, long)]
        order: i64,
        /// Step title
        #[arg(short, long)]
        title: String,
        /// Phase key shared with late/overdue siblings (default: the step key)
        #[arg(short, long)]
        phase: Option<String>,
        /// Phase variant: normal (default), late, overdue
        #[arg(long)]
        variant: Option<String>,
        /// Prerequisite step key (repeatable)
        #[arg(short, long = "depends-on")]
        depends_on: Vec<String>,
        /// Description template
        #[arg(long)]
        description: Option<String>,
        /// Mark the step as optional
        #[arg(long)]
        optional: bool,
    },
    /// Remove a step
    Remove {
        /// Workflow type: internship, project1, project2
        workflow_type: String,
        /// Step key
        key: String,
    },
    /// Reorder all steps of a workflow type
    Reorder {
        /// Workflow type: internship, project1, project2
        workflow_type: String,
        /// Every step key of the type, in the new order
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Show how many active activities sit on each step
    Usage {
        /// Workflow type: internship, project1, project2
        workflow_type: String,
    },
}

#[derive(Subcommand)]
enum DeadlineCommands {
    /// List deadlines
    List {
        /// Academic year filter
        #[arg(short, long)]
        year: Option<String>,
        /// Semester filter (requires --year)
        #[arg(short, long)]
        semester: Option<i64>,
    },
    /// Add a deadline
    Add {
        /// Deadline name
        name: String,
        /// Workflow type: internship, project1, project2
        #[arg(short = 't', long = "type")]
        workflow_type: String,
        /// Academic year, e.g. 2025
        #[arg(short, long)]
        year: String,
        /// Semester
        #[arg(short, long)]
        semester: i64,
        /// Formal deadline (RFC 3339, or local date-time in --timezone)
        #[arg(short, long)]
        at: Option<String>,
        /// Timezone for local date-times: UTC or an offset like +07:00
        #[arg(long)]
        timezone: Option<String>,
        /// Grace period in minutes
        #[arg(short, long, default_value_t = 0)]
        grace: i64,
        /// Lock submissions past the effective deadline
        #[arg(long)]
        lock: bool,
        /// Restrict to activities in this phase
        #[arg(short, long)]
        phase: Option<String>,
        /// Publish immediately
        #[arg(long)]
        publish: bool,
    },
    /// Start enforcing a deadline
    Publish {
        /// Deadline ID
        id: String,
    },
    /// Stop enforcing a deadline
    Unpublish {
        /// Deadline ID
        id: String,
    },
    /// Remove a deadline
    Remove {
        /// Deadline ID
        id: String,
    },
}

#[derive(Subcommand)]
enum ActivityCommands {
    /// Start tracking an activity
    Start {
        /// Activity ID
        activity_id: String,
        /// Workflow type: internship, project1, project2
        #[arg(short = 't', long = "type")]
        workflow_type: String,
        /// Academic year, e.g. 2025
        #[arg(short, long)]
        year: String,
        /// Semester
        #[arg(short, long)]
        semester: i64,
        /// Starting step (default: first step of the type)
        #[arg(long)]
        step: Option<String>,
    },
    /// List tracked activities
    List {
        /// Workflow type filter
        #[arg(short = 't', long = "type")]
        workflow_type: Option<String>,
    },
    /// Show an activity with its submissions
    Show {
        /// Activity ID
        activity_id: String,
    },
    /// Record a submission
    Submit {
        /// Activity ID
        activity_id: String,
        /// Deadline ID
        #[arg(short, long)]
        deadline: String,
        /// Kind: document (default), defense_request, test_request
        #[arg(short, long, default_value = "document")]
        kind: String,
        /// Submission instant (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
    },
    /// Move an activity to any step of its workflow type
    Override {
        /// Activity ID
        activity_id: String,
        /// Target step key
        step: String,
        /// Acting staff member (must be a configured administrator)
        #[arg(long, env = "ACADFLOW_ACTOR")]
        actor: String,
    },
    /// Stop tracking an activity
    Close {
        /// Activity ID
        activity_id: String,
        /// Acting staff member (must be a configured administrator)
        #[arg(long, env = "ACADFLOW_ACTOR")]
        actor: String,
    },
}

/// Install the tracing subscriber
///
/// RUST_LOG wins over the configured level.
fn init_logging(config: &LoggingConfig, level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.colored);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match (config.format.as_str(), config.timestamps) {
        ("json", _) => layer.json().boxed(),
        ("pretty", true) => layer.pretty().boxed(),
        ("pretty", false) => layer.pretty().without_time().boxed(),
        (_, true) => layer.compact().boxed(),
        (_, false) => layer.compact().without_time().boxed(),
    };

    tracing_subscriber::registry().with(layer).with(env_filter).init();
}

fn print_health_report(report: &acadflow::HealthReport) {
    println!("System Health Check");
    println!("==================");
    println!();
    println!("Overall Status: {}", match report.status {
        HealthStatus::Healthy => "✓ Healthy",
        HealthStatus::Degraded => "⚠ Degraded",
        HealthStatus::Unhealthy => "✗ Unhealthy",
    });
    println!("Total Response Time: {}ms", report.total_response_time_ms);
    println!();
    println!("Component Checks:");
    println!("{:<20} {:<12} {:<10} {}", "Component", "Status", "Time (ms)", "Message");
    println!("{}", "-".repeat(80));

    for check in &report.checks {
        let status_icon = match check.status {
            HealthStatus::Healthy => "✓",
            HealthStatus::Degraded => "⚠",
            HealthStatus::Unhealthy => "✗",
        };
        let message = check.message.as_deref().unwrap_or("N/A");
        println!("{:<20} {:<12} {:<10} {}",
            check.name,
            format!("{} {}", status_icon, check.status),
            check.response_time_ms,
            message
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("{}", version_info());
        println!("Run 'acadflow --help' for usage.");
        return Ok(());
    };

    match command {
        Commands::Init { force } => {
            println!("Initializing acadflow...");
            match acadflow::init::initialize(force) {
                Ok(config_path) => {
                    let config = acadflow::load_config().await?;
                    let ctx = CliContext::open(config).await?;
                    println!("✓ acadflow initialized successfully");
                    println!("  Configuration: {}", config_path.display());
                    println!("  Database: {}", ctx.config.database_path()?.display());
                    println!("\nDefine steps with 'acadflow step add' and deadlines with 'acadflow deadline add'.");
                    Ok(())
                }
                Err(e) => {
                    eprintln!("✗ Initialization failed: {}", e);
                    Err(e.into())
                }
            }
        }
        Commands::Version => {
            println!("{}", version_info());
            Ok(())
        }
        command => {
            let config = acadflow::load_config().await?;
            let level = if cli.verbose || matches!(command, Commands::Serve) {
                config.logging.level.clone()
            } else {
                "warn".to_string()
            };
            init_logging(&config.logging, &level);

            if !cli::is_initialized() {
                eprintln!("{}", cli::get_init_instructions());
            }
            let ctx = CliContext::open(config).await?;

            run_command(&ctx, command).await
        }
    }
}

async fn run_command(ctx: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { .. } | Commands::Version => {}
        Commands::Health { format } => {
            let report = HealthChecker::check_all(ctx.db.clone(), &ctx.config).await;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_health_report(&report);
            }
        }
        Commands::Step(step_cmd) => match step_cmd {
            StepCommands::List { workflow_type } => {
                step::handle_list(ctx, workflow_type).await?;
            }
            StepCommands::Add {
                workflow_type,
                key,
                order,
                title,
                phase,
                variant,
                depends_on,
                description,
                optional,
            } => {
                step::handle_add(
                    ctx,
                    step::NewStep {
                        workflow_type,
                        key,
                        order,
                        title,
                        phase,
                        variant,
                        depends_on,
                        description,
                        optional,
                    },
                )
                .await?;
            }
            StepCommands::Remove { workflow_type, key } => {
                step::handle_remove(ctx, workflow_type, key).await?;
            }
            StepCommands::Reorder { workflow_type, keys } => {
                step::handle_reorder(ctx, workflow_type, keys).await?;
            }
            StepCommands::Usage { workflow_type } => {
                step::handle_usage(ctx, workflow_type).await?;
            }
        },
        Commands::Deadline(deadline_cmd) => match deadline_cmd {
            DeadlineCommands::List { year, semester } => {
                deadline::handle_list(ctx, year, semester).await?;
            }
            DeadlineCommands::Add {
                name,
                workflow_type,
                year,
                semester,
                at,
                timezone,
                grace,
                lock,
                phase,
                publish,
            } => {
                deadline::handle_add(
                    ctx,
                    deadline::NewDeadline {
                        name,
                        workflow_type,
                        academic_year: year,
                        semester,
                        deadline_at: at,
                        timezone,
                        grace_minutes: grace,
                        lock,
                        phase,
                        publish,
                    },
                )
                .await?;
            }
            DeadlineCommands::Publish { id } => {
                deadline::handle_publish(ctx, id).await?;
            }
            DeadlineCommands::Unpublish { id } => {
                deadline::handle_unpublish(ctx, id).await?;
            }
            DeadlineCommands::Remove { id } => {
                deadline::handle_remove(ctx, id).await?;
            }
        },
        Commands::Activity(activity_cmd) => match activity_cmd {
            ActivityCommands::Start {
                activity_id,
                workflow_type,
                year,
                semester,
                step,
            } => {
                activity::handle_start(ctx, activity_id, workflow_type, year, semester, step).await?;
            }
            ActivityCommands::List { workflow_type } => {
                activity::handle_list(ctx, workflow_type).await?;
            }
            ActivityCommands::Show { activity_id } => {
                activity::handle_show(ctx, activity_id).await?;
            }
            ActivityCommands::Submit {
                activity_id,
                deadline,
                kind,
                at,
            } => {
                activity::handle_submit(ctx, activity_id, deadline, kind, at).await?;
            }
            ActivityCommands::Override {
                activity_id,
                step,
                actor,
            } => {
                activity::handle_override(ctx, activity_id, step, actor).await?;
            }
            ActivityCommands::Close { activity_id, actor } => {
                activity::handle_close(ctx, activity_id, actor).await?;
            }
        },
        Commands::Classify { deadline_id, at } => {
            engine::handle_classify(ctx, deadline_id, at).await?;
        }
        Commands::Run { at, format } => {
            engine::handle_run(ctx, at, format).await?;
        }
        Commands::Runs { limit } => {
            engine::handle_runs(ctx, limit).await?;
        }
        Commands::Serve => {
            let shutdown = ShutdownCoordinator::new();
            let _signal_handler = shutdown.install_signal_handlers();
            engine::handle_serve(ctx, shutdown).await?;
        }
    }
    Ok(())
}
