//! CLI tool for reading classic Mac OS resource files.

mod commands;
mod exit_codes;
mod filter;
mod output;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use exit_codes::ExitCode;

const FILTER_HELP: &str = "\
Resource filters use syntax similar to Rez files. Each filter has one of the forms:

  TYPE                  an unquoted type code
  'TYPE'                a quoted type code
  'TYPE' (42)           a type code and an ID
  'TYPE' (24:42)        a type code and an ID range
  'TYPE' (\"name\")       a type code and a resource name

Inside quotes, \\xNN, \\\\, \\' and \\\" are escapes. Filters contain quotes,
parentheses and spaces, so quote each one for the shell.";

/// Classic Mac OS resource file tool
#[derive(Parser)]
#[command(name = "resfork")]
#[command(author, version, about = "Classic Mac OS resource file tool", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for info and list
    #[arg(long, value_enum, default_value = "human", global = true)]
    output: OutputFormat,

    /// Fork to read resources from
    #[arg(long, value_enum, default_value = "auto", global = true)]
    fork: ForkArg,

    /// Show debug output on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header and map information (alias: i)
    #[command(alias = "i")]
    Info {
        /// Resource file, or - for stdin
        file: PathBuf,
    },

    /// List resources (alias: l)
    #[command(alias = "l", after_help = FILTER_HELP)]
    List {
        /// Resource file, or - for stdin
        file: PathBuf,

        /// Filters selecting resources; all resources if none are given
        filters: Vec<String>,

        /// Show offsets, raw lengths and CRC-32 of the data
        #[arg(long)]
        technical: bool,

        /// Report compressed resources by their stored length only
        #[arg(long)]
        no_decompress: bool,

        /// List resources in file order instead of by type and ID
        #[arg(long)]
        no_sort: bool,

        /// How to group the listing
        #[arg(long, value_enum, default_value = "type")]
        group: GroupBy,
    },

    /// Output resource data (alias: r)
    #[command(alias = "r", after_help = FILTER_HELP)]
    Read {
        /// Resource file, or - for stdin
        file: PathBuf,

        /// Filters selecting resources; all resources if none are given
        filters: Vec<String>,

        /// How to output the data; hex and raw need exactly one resource
        #[arg(long, value_enum, default_value = "dump")]
        format: DataFormat,

        /// Output compressed resources as stored
        #[arg(long)]
        no_decompress: bool,

        /// Output resources in file order instead of by type and ID
        #[arg(long)]
        no_sort: bool,
    },

    /// Output the reserved header blocks
    ReadHeader {
        /// Resource file, or - for stdin
        file: PathBuf,

        /// How to output the data
        #[arg(long, value_enum, default_value = "dump")]
        format: DataFormat,

        /// Which block to output
        #[arg(long, value_enum, default_value = "all")]
        part: HeaderPart,
    },

    /// Show the header of a compressed resource stored on its own
    RawCompressInfo {
        /// Compressed resource data, or - for stdin
        input: PathBuf,
    },

    /// Decompress a compressed resource stored on its own
    RawDecompress {
        /// Compressed resource data, or - for stdin
        input: PathBuf,

        /// Where to write the decompressed data, or - for stdout
        output: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ForkArg {
    Auto,
    Rsrc,
    Data,
}

impl From<ForkArg> for resfork::ForkMode {
    fn from(fork: ForkArg) -> Self {
        match fork {
            ForkArg::Auto => resfork::ForkMode::Auto,
            ForkArg::Rsrc => resfork::ForkMode::Primary,
            ForkArg::Data => resfork::ForkMode::Fallback,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    None,
    Type,
    Id,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum DataFormat {
    /// Description and hex dump
    Dump,
    /// Description and text with CR line endings translated
    DumpText,
    /// Data only, as hex
    Hex,
    /// Data only, as raw bytes
    Raw,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum HeaderPart {
    System,
    Application,
    All,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_module("resfork", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let source = commands::Source {
        fork: cli.fork.into(),
    };

    let exit_code = match cli.command {
        Commands::Info { file } => commands::info(&source, &file, cli.output),

        Commands::List {
            file,
            filters,
            technical,
            no_decompress,
            no_sort,
            group,
        } => commands::list(&commands::ListConfig {
            source: &source,
            file: &file,
            filters: &filters,
            technical,
            decompress: !no_decompress,
            sort: !no_sort,
            group,
            format: cli.output,
        }),

        Commands::Read {
            file,
            filters,
            format,
            no_decompress,
            no_sort,
        } => commands::read(&commands::ReadConfig {
            source: &source,
            file: &file,
            filters: &filters,
            format,
            decompress: !no_decompress,
            sort: !no_sort,
        }),

        Commands::ReadHeader { file, format, part } => {
            commands::read_header(&source, &file, format, part)
        }

        Commands::RawCompressInfo { input } => commands::raw_compress_info(&input, cli.output),

        Commands::RawDecompress { input, output } => commands::raw_decompress(&input, &output),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    std::process::exit(exit_code.code());
}
