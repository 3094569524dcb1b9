//! qail-adapt: inspect PostgreSQL type adaptation
//!
//! # Usage
//!
//! ```bash
//! # Encode a literal the way it would be sent as a parameter
//! qail-adapt dump --type int4 42
//! qail-adapt dump --type 'int8[]' --format binary '{1,2,NULL}'
//!
//! # Decode wire bytes (hex for binary)
//! qail-adapt load --type numeric --format binary 0002000000000003007b11d0
//!
//! # List the built-in types
//! qail-adapt types
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use qail_adapt::prelude::*;
use qail_adapt::protocol::types::known_oids;
use qail_adapt::protocol::{name_to_oid, oid_to_name};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qail-adapt")]
#[command(version)]
#[command(about = "Encode and decode PostgreSQL wire values", long_about = None)]
#[command(after_help = "EXAMPLES:
    qail-adapt dump --type int4 42
    qail-adapt dump --type 'text[]' --format binary '{a,\"b c\"}'
    qail-adapt load --type int8 --format binary 000000000000002a
    qail-adapt --server-version 90624 dump --type text hello")]
struct Cli {
    /// Configuration file (defaults to <config dir>/qail/adapt.toml)
    #[arg(short, long, global = true, env = "QAIL_ADAPT_CONFIG")]
    config: Option<PathBuf>,

    /// Server version to adapt for, e.g. 90624 or 160002
    #[arg(long, global = true)]
    server_version: Option<i32>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a text literal and encode it as a parameter
    Dump {
        /// Type name (int4, text[], ...) or OID
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Wire format: text or binary
        #[arg(short, long)]
        format: Option<Format>,

        /// Literal in PostgreSQL text syntax
        literal: String,
    },
    /// Decode a value received from the server
    Load {
        /// Type name (int4, text[], ...) or OID
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// Wire format: text or binary
        #[arg(short, long)]
        format: Option<Format>,

        /// Text data, or hex bytes for binary
        data: String,
    },
    /// List known types and the formats they load from
    Types,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("qail_adapt=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut config =
        AdaptConfig::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(version) = cli.server_version {
        config.connection = Some(match config.connection.take() {
            Some(conn) => ConnectionInfo {
                server_version: version,
                ..conn
            },
            None => ConnectionInfo::new(version),
        });
    }
    let session = config.to_session()?;

    match &cli.command {
        Commands::Dump {
            type_name,
            format,
            literal,
        } => dump(&session, type_name, format.unwrap_or(config.default_format), literal),
        Commands::Load {
            type_name,
            format,
            data,
        } => load(&session, type_name, format.unwrap_or(config.default_format), data),
        Commands::Types => {
            show_types(&session);
            Ok(())
        }
    }
}

/// Type name or numeric OID.
fn resolve_type(name: &str) -> Result<Oid> {
    if let Ok(oid) = name.trim().parse::<Oid>() {
        return Ok(oid);
    }
    name_to_oid(name).with_context(|| format!("Unknown type '{}'", name))
}

fn dump(session: &Session, type_name: &str, format: Format, literal: &str) -> Result<()> {
    let oid = resolve_type(type_name)?;
    let mut tx = Transformer::new(Some(session));
    let value = tx
        .get_loader(oid, Format::Text)?
        .load(literal.as_bytes())
        .with_context(|| format!("Cannot parse '{}' as {}", literal, oid_to_name(oid)))?;

    let (buffers, oids) = tx.dump_sequence(std::slice::from_ref(&value), &[format])?;
    println!("{} {}", "Value:".dimmed(), value);
    for (data, oid) in buffers.iter().zip(&oids) {
        println!("{} {} ({})", "OID:".cyan(), oid, oid_to_name(*oid).yellow());
        match data {
            Some(data) => println!("{} {}", format!("{}:", format).cyan(), render(data, format)),
            None => println!("{} {}", format!("{}:", format).cyan(), "NULL".dimmed()),
        }
    }
    Ok(())
}

fn load(session: &Session, type_name: &str, format: Format, data: &str) -> Result<()> {
    let oid = resolve_type(type_name)?;
    let bytes = match format {
        Format::Text => data.as_bytes().to_vec(),
        Format::Binary => decode_hex(data)?,
    };

    let mut tx = Transformer::new(Some(session));
    tx.set_row_types(&[(oid, format)])?;
    for value in tx.load_sequence(&[Some(bytes)])? {
        println!("{} {}", "Type:".dimmed(), value.type_name());
        println!("{} {}", "Value:".cyan(), value.to_string().green());
    }
    Ok(())
}

fn show_types(session: &Session) {
    let adapters = session.adapters();
    let mark = |oid: Oid, format: Format| {
        if adapters.get_loader(oid, format).is_some() {
            format!("{:<7}", "yes").green()
        } else {
            format!("{:<7}", "-").dimmed()
        }
    };

    println!("{}", "Known types:".cyan().bold());
    println!("  {:>6}  {:<12} {:<7} {:<7}", "OID", "NAME", "TEXT", "BINARY");
    for oid in known_oids() {
        println!(
            "  {:>6}  {:<12} {} {}",
            oid,
            oid_to_name(oid),
            mark(oid, Format::Text),
            mark(oid, Format::Binary)
        );
    }

    let extra: Vec<Oid> = adapters
        .loader_oids(Format::Text)
        .into_iter()
        .chain(adapters.loader_oids(Format::Binary))
        .filter(|oid| *oid != 0 && !known_oids().any(|known| known == *oid))
        .collect();
    if !extra.is_empty() {
        println!();
        println!("{}", "Configured aliases:".cyan().bold());
        let mut extra = extra;
        extra.sort_unstable();
        extra.dedup();
        for oid in extra {
            println!(
                "  {:>6}  {:<12} {} {}",
                oid,
                "",
                mark(oid, Format::Text),
                mark(oid, Format::Binary)
            );
        }
    }

    println!();
    for format in Format::ALL {
        if !adapters.has_fallback_loader(format) {
            println!("{} no {} loader for unknown types", "⚠".yellow(), format);
        }
    }
}

fn render(data: &[u8], format: Format) -> String {
    match format {
        Format::Text => String::from_utf8_lossy(data).into_owned(),
        Format::Binary => data.iter().map(|b| format!("{:02x}", b)).collect(),
    }
}

/// Hex digits, optionally prefixed with `\x` and separated by whitespace.
fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = input
        .trim()
        .trim_start_matches("\\x")
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits");
    }

    digits
        .chunks_exact(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).context("Invalid hex input")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("Invalid hex byte '{}'", pair))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("00 2a").unwrap(), vec![0, 42]);
        assert_eq!(decode_hex("\\xDEAD").unwrap(), vec![0xde, 0xad]);
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }

    #[test]
    fn test_resolve_type() {
        assert_eq!(resolve_type("int4").unwrap(), oid::INT4);
        assert_eq!(resolve_type("bigint").unwrap(), oid::INT8);
        assert_eq!(resolve_type("16385").unwrap(), 16385);
        assert!(resolve_type("nope").is_err());
    }

    #[test]
    fn test_render() {
        assert_eq!(render(b"42", Format::Text), "42");
        assert_eq!(render(&[0, 0x2a], Format::Binary), "002a");
    }
}
