mod commands;
mod config;
mod logging;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use custody_core::{BatchStatus, NewBatch};
use custody_ledger::BatchFilter;

use crate::commands::{batch, query, Context};
use crate::config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Pharmaceutical batch custody ledger.
#[derive(Parser)]
#[command(
    name = "custody",
    version,
    about = "Pharmaceutical batch custody ledger"
)]
struct Cli {
    /// Path to a custody.toml configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the ledger store file (overrides config and CUSTODY_STORE)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the custody HTTP API server
    Serve {
        /// Port to listen on (default from config, 8080)
        #[arg(long)]
        port: Option<u16>,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Register a new batch; the caller becomes its first custodian
    Register {
        /// Caller credential
        #[arg(long = "as", value_name = "CREDENTIAL")]
        credential: String,
        /// Batch identifier
        identifier: String,
        /// Product name
        #[arg(long)]
        product: String,
        /// Manufacturer's batch number
        #[arg(long)]
        batch_number: String,
        /// Manufacture date
        #[arg(long, default_value = "")]
        manufacture_date: String,
        /// Expiry date
        #[arg(long, default_value = "")]
        expiry_date: String,
        /// Composition
        #[arg(long, default_value = "")]
        composition: String,
    },

    /// Hand custody of a batch to another party
    Ship {
        /// Caller credential
        #[arg(long = "as", value_name = "CREDENTIAL")]
        credential: String,
        /// Batch identifier
        identifier: String,
        /// Receiving party's role
        #[arg(long)]
        to: String,
    },

    /// Confirm receipt of a batch in transit
    Deliver {
        /// Caller credential
        #[arg(long = "as", value_name = "CREDENTIAL")]
        credential: String,
        /// Batch identifier
        identifier: String,
    },

    /// Recall a batch
    Recall {
        /// Caller credential
        #[arg(long = "as", value_name = "CREDENTIAL")]
        credential: String,
        /// Batch identifier
        identifier: String,
        /// Reason recorded in the inspection notes
        #[arg(long)]
        reason: String,
    },

    /// Show the current record of a batch
    Track {
        /// Batch identifier
        identifier: String,
        /// Print the stored document exactly as persisted
        #[arg(long)]
        raw: bool,
    },

    /// List batches
    List {
        /// Only batches with this status
        #[arg(long)]
        status: Option<BatchStatus>,
        /// Only batches held by this party
        #[arg(long)]
        custodian: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };
    logging::init_logging(config.log.format, &config.log.level);

    let store = cli.store.unwrap_or_else(|| config.store.path.clone());

    match cli.command {
        Commands::Serve {
            port,
            tls_cert,
            tls_key,
        } => {
            let port = port.unwrap_or(config.server.port);
            run_serve(&config, store, port, tls_cert, tls_key, cli.output, cli.quiet);
        }
        command => {
            let ctx = Context::open(&config, &store, cli.output, cli.quiet);
            run_offline(&ctx, command);
        }
    }
}

fn run_serve(
    config: &Config,
    store: PathBuf,
    port: u16,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
    output: OutputFormat,
    quiet: bool,
) {
    // Validate TLS flags: both must be provided or neither
    if tls_cert.is_some() != tls_key.is_some() {
        report_error(
            "error: --tls-cert and --tls-key must both be provided",
            output,
            quiet,
        );
        process::exit(1);
    }
    if tls_cert.is_some() && !cfg!(feature = "tls") {
        report_error(
            "error: --tls-cert/--tls-key require a build with the `tls` feature",
            output,
            quiet,
        );
        process::exit(1);
    }
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(
                &format!("failed to create tokio runtime: {}", e),
                output,
                quiet,
            );
            process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(serve::start_server(config, store, port, tls_cert, tls_key)) {
        report_error(&format!("Server error: {}", e), output, quiet);
        process::exit(1);
    }
}

fn run_offline(ctx: &Context, command: Commands) {
    match command {
        Commands::Serve { .. } => {}
        Commands::Register {
            credential,
            identifier,
            product,
            batch_number,
            manufacture_date,
            expiry_date,
            composition,
        } => {
            let batch = NewBatch {
                identifier,
                product_name: product,
                batch_number,
                manufacture_date,
                expiry_date,
                composition,
            };
            batch::cmd_register(ctx, &credential, batch);
        }
        Commands::Ship {
            credential,
            identifier,
            to,
        } => {
            batch::cmd_ship(ctx, &credential, &identifier, &to);
        }
        Commands::Deliver {
            credential,
            identifier,
        } => {
            batch::cmd_deliver(ctx, &credential, &identifier);
        }
        Commands::Recall {
            credential,
            identifier,
            reason,
        } => {
            batch::cmd_recall(ctx, &credential, &identifier, &reason);
        }
        Commands::Track { identifier, raw } => {
            query::cmd_track(ctx, &identifier, raw);
        }
        Commands::List { status, custodian } => {
            query::cmd_list(ctx, &BatchFilter { status, custodian });
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
