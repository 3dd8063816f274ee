use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use plumber::cli::{self, ReadOptions};

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Plumber: --{plumb}-> composable extract, transform and write pipes for record files
#[derive(Parser)]
#[command(name = "plumb", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source settings from (ignored if missing)
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV, TSV or NDJSON file to NDJSON
    Convert {
        /// File to read; the format is picked by extension
        input: String,

        /// NDJSON file to write
        output: String,

        /// Field to drop from every record (repeatable)
        #[arg(short, long = "drop", value_name = "FIELD")]
        drop: Vec<String>,

        #[command(flatten)]
        read: ReadArgs,
    },

    /// Count the records in a CSV, TSV or NDJSON file
    Count {
        /// File to read; the format is picked by extension
        input: String,

        #[command(flatten)]
        read: ReadArgs,
    },

    /// Pair two NDJSON files line by line, padding the shorter with null
    Zip {
        /// Left-hand NDJSON file
        left: String,

        /// Right-hand NDJSON file
        right: String,

        /// NDJSON file of [left, right] arrays to write
        output: String,
    },
}

#[derive(clap::Args)]
struct ReadArgs {
    /// Field delimiter for delimited input (a single character, or "tab")
    #[arg(long, value_parser = parse_delimiter)]
    delimiter: Option<u8>,

    /// Treat the first row of delimited input as column names
    ///
    /// Rows become JSON objects with keys in alphabetical order; a repeated
    /// column name keeps its last column's value.
    #[arg(long)]
    headers: bool,
}

impl From<ReadArgs> for ReadOptions {
    fn from(args: ReadArgs) -> Self {
        ReadOptions {
            delimiter: args.delimiter,
            headers: args.headers,
        }
    }
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    cli::parse_delimiter(value).map_err(|err| err.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The env file may set LOG_LEVEL, so it is loaded before the logger
    let dotenv = dotenvy::from_filename(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match dotenv {
        Ok(path) => log::debug!("Loaded settings from {}", path.display()),
        Err(err) if err.not_found() => log::debug!("No env file at {}", cli.env),
        Err(err) => return Err(err.into()),
    }

    match cli.command {
        Commands::Convert {
            input,
            output,
            drop,
            read,
        } => {
            let count = cli::convert(&input, &output, &read.into(), &drop)?;
            log::info!(
                "Converted {} record(s) from {} to {}",
                count.cyan(),
                input.bright_black(),
                output.bright_black()
            );
        }
        Commands::Count { input, read } => {
            let count = cli::count(&input, &read.into())?;
            log::info!("{} contains {} record(s)", input.bright_black(), count.cyan());
            println!("{}", count);
        }
        Commands::Zip {
            left,
            right,
            output,
        } => {
            let count = cli::zip(&left, &right, &output)?;
            log::info!(
                "Wrote {} pair(s) to {}",
                count.cyan(),
                output.bright_black()
            );
        }
    }

    Ok(())
}
