use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::*;

use std::io::Write;

use crate::{dump::dump, info::info};

mod dump;
mod info;

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the metadata a UF2 container declares
    #[command(arg_required_else_help = true)]
    Info {
        /// Input UF2 file
        input: String,
    },
    /// Write the memory image a UF2 container describes to a flat binary file
    #[command(arg_required_else_help = true)]
    Dump {
        /// Input UF2 file
        input: String,

        /// Output binary file
        output: String,

        /// Byte used for addresses no block wrote (erased-flash 0xff by default)
        #[clap(short, long, value_parser = byte_parser, default_value = "0xff")]
        fill: u8,

        /// Dump from this address instead of the lowest written one
        #[clap(short, long, value_parser = addr_parser)]
        base: Option<u32>,
    },
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    u32::from_str_radix(digits, radix).map_err(|err| format!("invalid number '{s}': {err}"))
}

fn byte_parser(s: &str) -> Result<u8, String> {
    let value = parse_u32(s)?;
    u8::try_from(value).map_err(|_| format!("'{s}' does not fit in a byte"))
}

fn addr_parser(s: &str) -> Result<u32, String> {
    parse_u32(s)
}

#[derive(Parser, Debug, Default)]
#[clap(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Set the logging verbosity
    #[clap(short, long, value_enum, global = true, default_value_t = LogLevel::Info)]
    verbose: LogLevel,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(cli.verbose.into())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level();
            if level == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => return Ok(()),
    };

    match command {
        Command::Info { input } => info(&input),
        Command::Dump {
            input,
            output,
            fill,
            base,
        } => dump(&input, &output, fill, base),
    }
}
