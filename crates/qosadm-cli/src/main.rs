//! qosadm — Windows Group-Policy QoS rule manager.
//!
//! Thin presentation layer over [`qosadm_core::QosApi`]: every subcommand
//! maps onto one boundary operation and prints its uniform JSON result to
//! stdout. The process exit code mirrors the result's success flag.

use clap::{Parser, Subcommand};
use qosadm_core::QosApi;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

/// qosadm — inspect and edit Group-Policy QoS rules
#[derive(Parser, Debug)]
#[command(name = "qosadm")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List declared rules across both hives and both registry views
    #[command(alias = "ls")]
    List,

    /// Create a rule or set fields on an existing one
    Create(commands::policies::PatchArgs),

    /// Update fields of an existing rule (same semantics as create)
    Update(commands::policies::PatchArgs),

    /// Delete a rule from one location, or everywhere with --everywhere
    Delete(commands::policies::DeleteArgs),

    /// Report whether this session is elevated
    CheckAdmin,

    /// Active NetQos policies (PowerShell management surface)
    #[command(subcommand)]
    Active(commands::active::ActiveCommands),

    /// Launch the Group Policy editor (fire-and-forget)
    Wizard,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    // One probe per process: the selector inside the API is constructed
    // here and reused by every operation.
    let api = QosApi::new();

    let ok = match cli.command {
        Commands::List => commands::policies::list(&api),
        Commands::Create(args) => commands::policies::create(&api, args),
        Commands::Update(args) => commands::policies::update(&api, args),
        Commands::Delete(args) => commands::policies::delete(&api, args),
        Commands::CheckAdmin => commands::admin::check_admin(&api),
        Commands::Active(command) => commands::active::run(&api, command),
        Commands::Wizard => commands::admin::wizard(&api),
    };

    std::process::exit(i32::from(!ok));
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
