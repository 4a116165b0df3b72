mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "reshape",
    version,
    about = "Convert between tabular and hierarchical data without blocking"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

/// Conversion direction.
#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum Direction {
    /// Hierarchical document in, flat rows out
    ToTabular,
    /// Flat rows in, hierarchical document out
    ToHierarchical,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON file between tabular and hierarchical shapes
    Convert {
        /// Input file path
        input: PathBuf,
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Conversion direction
        #[arg(long, value_enum, default_value = "to-tabular")]
        direction: Direction,
        /// Flatten nested records into dotted paths
        #[arg(long)]
        flatten: bool,
        /// Path separator for flatten/unflatten
        #[arg(long)]
        delimiter: Option<String>,
        /// Stream a bounded row preview instead of the full conversion
        #[arg(long)]
        preview: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Convert {
            input,
            output,
            direction,
            flatten,
            delimiter,
            preview,
        } => {
            commands::convert::execute(
                &input,
                output.as_deref(),
                direction,
                flatten,
                delimiter,
                preview,
            )
            .await
        }
    }
}
