use anyhow::Result;
use clap::{Parser, Subcommand};
use strata_format::Codec;

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "strata-cmd")]
#[command(about = "Command-line utility for Strata files")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the footer inventory of a file, with per-page size estimates
    Inspect {
        /// List every page of every column chunk
        #[arg(short, long)]
        pages: bool,

        /// Path of the file to inspect
        path: String,
    },

    /// Read one or more files with the chunked reader
    Read {
        /// JSON file with read limits; explicit limit flags take precedence
        #[arg(long)]
        config: Option<String>,

        /// Output size limit in bytes per chunk (0 = unbounded)
        #[arg(long)]
        output_limit: Option<u64>,

        /// Input (working memory) limit in bytes per pass (0 = unbounded)
        #[arg(long)]
        input_limit: Option<u64>,

        /// Rows to skip over all files
        #[arg(long, default_value_t = 0)]
        skip: u64,

        /// Maximum number of rows to read
        #[arg(long)]
        num_rows: Option<u64>,

        /// Comma-separated list of columns to read
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Print the first N rows of every chunk
        #[arg(long, default_value_t = 0)]
        head: usize,

        /// Files to read, in order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Write a file of generated sample data
    Generate {
        #[arg(long, value_enum, default_value_t = commands::generate::ShapeArg::Flat)]
        shape: commands::generate::ShapeArg,

        #[arg(long, default_value_t = 10_000)]
        rows: usize,

        #[arg(long, default_value_t = Codec::Zstd)]
        codec: Codec,

        /// Rows per row group (0 = a single row group)
        #[arg(long, default_value_t = 0)]
        rows_per_row_group: usize,

        /// Rows per page (0 = one page per column chunk)
        #[arg(long, default_value_t = 0)]
        rows_per_page: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Output file path
        output: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose);

    match cli.command {
        Commands::Inspect { pages, path } => commands::inspect::run(pages, path),
        Commands::Read {
            config,
            output_limit,
            input_limit,
            skip,
            num_rows,
            columns,
            head,
            paths,
        } => commands::read::run(commands::read::ReadArgs {
            config,
            output_limit,
            input_limit,
            skip,
            num_rows,
            columns,
            head,
            paths,
        }),
        Commands::Generate {
            shape,
            rows,
            codec,
            rows_per_row_group,
            rows_per_page,
            seed,
            output,
        } => commands::generate::run(commands::generate::GenerateArgs {
            shape,
            rows,
            codec,
            rows_per_row_group,
            rows_per_page,
            seed,
            output,
        }),
    }
}
