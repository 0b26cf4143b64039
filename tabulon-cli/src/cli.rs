//! Contains the command line arguments of the binary `tbl` and the options derived from them.
use std::path::PathBuf;

use tabulon_physical::{
    buffer::ByteOrder,
    serialization::{ReadOptions, WriteOptions, MAX_CHUNK_BYTES},
};

/// Possible settings for the byte order of rewritten payloads.
#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub(crate) enum OrderSetting {
    /// Keep the byte order of every column
    #[default]
    Keep,
    /// Write all payloads in big endian order
    Big,
    /// Write all payloads in little endian order
    Little,
}

impl From<OrderSetting> for Option<ByteOrder> {
    fn from(value: OrderSetting) -> Self {
        match value {
            OrderSetting::Keep => None,
            OrderSetting::Big => Some(ByteOrder::Big),
            OrderSetting::Little => Some(ByteOrder::Little),
        }
    }
}

/// Cli Arguments related to logging
#[derive(clap::Args, Debug)]
pub(crate) struct LoggingArgs {
    /// Increase log verbosity (multiple uses increase verbosity further)
    #[arg(short, long, action = clap::builder::ArgAction::Count, group = "verbosity")]
    verbose: u8,
    /// Reduce log verbosity to show only errors (equivalent to --log error)
    #[arg(short, long, group = "verbosity")]
    quiet: bool,
    /// Set log verbosity (default is "warn")
    #[arg(long = "log", value_parser=clap::builder::PossibleValuesParser::new(["error", "warn", "info", "debug", "trace"]), group = "verbosity")]
    log_level: Option<String>,
}

impl LoggingArgs {
    /// Initialising Logging
    ///
    /// Sets the logging verbosity to the given log-level in the following order:
    ///  * `Info`, `Debug`, `Trace`; depending on the count of `-v`
    ///  * `Error` when `-q` is used
    ///  * The `TBL_LOG` environment variable value
    ///  * `Warn` otherwise
    pub(crate) fn initialize_logging(&self) {
        let mut builder = env_logger::Builder::new();

        // Default log level
        builder.filter_level(log::LevelFilter::Warn);

        builder.parse_env("TBL_LOG");
        if let Some(ref level) = self.log_level {
            builder.parse_filters(level);
        } else if self.quiet {
            builder.filter_level(log::LevelFilter::Error);
        } else if self.verbose > 0 {
            builder.filter_level(match self.verbose {
                1 => log::LevelFilter::Info,
                2 => log::LevelFilter::Debug,
                _ => log::LevelFilter::Trace,
            });
        }
        builder.init();
    }
}

/// Cli arguments related to reading table files
#[derive(Debug, clap::Args)]
pub(crate) struct InputArgs {
    /// Table file to read
    #[arg(value_parser)]
    pub(crate) file: PathBuf,
    /// Map the file into memory instead of copying it to the heap
    #[arg(long = "mmap")]
    pub(crate) mmap: bool,
}

impl InputArgs {
    /// Options for opening the input file.
    ///
    /// Unless `verify` is set, declared characteristics are not checked while reading.
    pub(crate) fn read_options(&self, verify: bool) -> ReadOptions {
        let options = if self.mmap {
            ReadOptions::mapped()
        } else {
            ReadOptions::heap()
        };
        if verify {
            options
        } else {
            options.trusting()
        }
    }
}

/// Subcommands of the cli
#[derive(Debug, clap::Subcommand)]
pub(crate) enum Command {
    /// Print the header and the columns of a table file
    Inspect {
        /// Input file
        #[command(flatten)]
        input: InputArgs,
        /// Print the summary as json
        #[arg(long = "json")]
        json: bool,
    },
    /// Check that every column satisfies the characteristics it declares
    Verify {
        /// Input file
        #[command(flatten)]
        input: InputArgs,
    },
    /// Print the rows of a table file as tab separated values
    Dump {
        /// Input file
        #[command(flatten)]
        input: InputArgs,
        /// Only print the given columns (can be given multiple times)
        #[arg(short, long = "column")]
        columns: Vec<String>,
        /// Skip this many rows
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Print at most this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Read a table file and write it again in the current format version
    Rewrite {
        /// Input file
        #[command(flatten)]
        input: InputArgs,
        /// Output file
        #[arg(value_parser)]
        output: PathBuf,
        /// Byte order of the written payloads
        #[arg(long = "byte-order", value_enum, default_value_t)]
        byte_order: OrderSetting,
        /// Largest size of one payload chunk in bytes
        #[arg(long = "chunk-size", default_value_t = MAX_CHUNK_BYTES)]
        chunk_size: usize,
        /// Replace the output file if it exists
        #[arg(long = "overwrite")]
        overwrite: bool,
    },
}

impl Command {
    /// Options for writing the output of [Command::Rewrite].
    pub(crate) fn write_options(byte_order: OrderSetting, chunk_size: usize) -> WriteOptions {
        WriteOptions {
            byte_order: byte_order.into(),
            max_chunk_bytes: chunk_size,
        }
    }
}

/// Tabulon CLI
#[derive(clap::Parser, Debug)]
#[command(author, version, about)]
pub struct CliApp {
    /// Operation to perform
    #[command(subcommand)]
    pub(crate) command: Command,
    /// Arguments related to logging
    #[command(flatten)]
    pub(crate) logging: LoggingArgs,
}
