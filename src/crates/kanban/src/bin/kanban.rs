//! Kanban CLI - task board client
//!
//! Main entry point for the kanban command-line tool.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use kanban::cli::{self, AppContext};
use kanban::models::task::due_date;
use kanban::{
    ConfigLoader, DueFilter, TaskFilter, TaskInput, TaskPatch, TaskPriority, TaskStatus,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kanban")]
#[command(about = "Kanban - task board client", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Task service URL (overrides config and KANBAN_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Config file to use instead of ~/.kanban and ./.kanban
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the board as three status columns
    Board(FilterArgs),

    /// Show the board and keep it up to date until Ctrl-C
    Watch(FilterArgs),

    /// Task management commands
    #[command(subcommand)]
    Task(TaskCommands),

    /// List all boards
    BoardList,

    /// Create a board
    BoardCreate {
        /// Board name (at most 200 characters)
        name: String,
    },

    /// Rename a board
    BoardRename {
        /// Board ID
        id: i64,
        /// New name
        name: String,
    },

    /// Delete a board and all of its tasks
    BoardDelete {
        /// Board ID
        id: i64,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Only show tasks with this priority: low, medium, high
    #[arg(short, long)]
    priority: Option<TaskPriority>,

    /// Due-date bucket: all, today, this-week, overdue
    #[arg(long, default_value = "all")]
    due: DueFilter,

    /// Case-insensitive text search over title and description
    #[arg(short, long)]
    search: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> TaskFilter {
        TaskFilter {
            priority: self.priority,
            due: self.due,
            search: self.search,
        }
    }
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Task description
        #[arg(short, long)]
        description: Option<String>,
        /// Status: todo, in-progress, done (default: todo)
        #[arg(short, long)]
        status: Option<TaskStatus>,
        /// Priority: low, medium, high (default: medium)
        #[arg(short, long)]
        priority: Option<TaskPriority>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_parser = due_date::parse)]
        due: Option<NaiveDate>,
        /// Board ID (default from config)
        #[arg(short, long)]
        board: Option<i64>,
    },
    /// Update fields of a task
    Update {
        /// Task ID
        id: i64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New description
        #[arg(short, long, conflicts_with = "clear_description")]
        description: Option<String>,
        /// Remove the description
        #[arg(long)]
        clear_description: bool,
        /// New status
        #[arg(short, long)]
        status: Option<TaskStatus>,
        /// New priority
        #[arg(short, long)]
        priority: Option<TaskPriority>,
        /// New due date (YYYY-MM-DD)
        #[arg(long, value_parser = due_date::parse, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Move to another board
        #[arg(short, long)]
        board: Option<i64>,
    },
    /// Move a task to a column
    Move {
        /// Task ID
        id: i64,
        /// Target status: todo, in-progress, done
        status: TaskStatus,
    },
    /// Move a task to the next column
    Advance {
        /// Task ID
        id: i64,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: i64,
    },
    /// Show task details
    Show {
        /// Task ID
        id: i64,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kanban={level},utils={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_task_command(ctx: &AppContext, command: TaskCommands) -> anyhow::Result<()> {
    match command {
        TaskCommands::Create {
            title,
            description,
            status,
            priority,
            due,
            board,
        } => {
            let mut input = TaskInput::new(title, board.unwrap_or(ctx.default_board_id()));
            input.description = description;
            input.status = status.unwrap_or_default();
            input.priority = priority.unwrap_or_default();
            input.due_date = due;
            cli::task::handle_create(ctx, input).await
        }
        TaskCommands::Update {
            id,
            title,
            description,
            clear_description,
            status,
            priority,
            due,
            clear_due,
            board,
        } => {
            let patch = TaskPatch {
                title,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                status,
                priority,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
                board_id: board,
            };
            cli::task::handle_update(ctx, id, patch).await
        }
        TaskCommands::Move { id, status } => cli::task::handle_move(ctx, id, status).await,
        TaskCommands::Advance { id } => cli::task::handle_advance(ctx, id).await,
        TaskCommands::Delete { id } => cli::task::handle_delete(ctx, id).await,
        TaskCommands::Show { id } => cli::task::handle_show(ctx, id).await,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_file(path).await?,
        None => ConfigLoader::new().load().await?,
    };
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }
    init_tracing(&config.logging.level);

    let Some(command) = args.command else {
        println!("{}", kanban::version_info());
        println!("\nUse --help to see available commands");
        return Ok(());
    };

    let ctx = AppContext::connect(config)?;
    let result = match command {
        Commands::Board(filter) => cli::board::handle_show(&ctx, filter.into_filter()).await,
        Commands::Watch(filter) => cli::board::handle_watch(&ctx, filter.into_filter()).await,
        Commands::Task(task_cmd) => run_task_command(&ctx, task_cmd).await,
        Commands::BoardList => cli::board::handle_list(&ctx).await,
        Commands::BoardCreate { name } => cli::board::handle_create(&ctx, name).await,
        Commands::BoardRename { id, name } => cli::board::handle_rename(&ctx, id, name).await,
        Commands::BoardDelete { id } => cli::board::handle_delete(&ctx, id).await,
    };
    ctx.cache.shutdown();

    if let Err(e) = &result {
        eprintln!("{}", format!("✗ {}", e).red().bold());
        std::process::exit(1);
    }
    Ok(())
}
