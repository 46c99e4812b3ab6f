use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "worklog", version, about = "Worklog CLI")]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Category management
    Category {
        #[command(subcommand)]
        action: commands::category::CategoryAction,
    },
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Weekly and monthly statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Recorded sessions
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        "warn,worklog::notify=info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("WORKLOG_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // stdout carries JSON output; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Category { action } => commands::category::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Session { action } => commands::session::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
