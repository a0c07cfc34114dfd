//! kvdump
//!
//! Inspect, rewrite and generate table dump files.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kvhash::codec;
use kvhash::{HashError, MemHash, Result, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// kvdump
#[derive(Parser, Debug)]
#[command(name = "kvdump")]
#[command(about = "Read, rewrite and generate kvhash dump files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print every record of every set in a dump
    Read {
        /// Dump file
        file: PathBuf,

        /// Print every value as hex bytes, not just binary ones
        #[arg(long)]
        hex: bool,
    },

    /// Read the first set of a dump and write it back out canonically
    Write {
        /// Dump file
        file: PathBuf,
    },

    /// Try to dump a table holding a key with no NUL terminator
    Nonterm {
        /// Output file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kvhash=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Read { file, hex } => read(&file, hex),
        Commands::Write { file } => write(&file),
        Commands::Nonterm { file } => nonterm(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn read(path: &Path, hex: bool) -> Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut sets = 0usize;
    loop {
        let mut table = MemHash::new();
        let summary = codec::read_into(&mut table, &mut reader)?;
        if summary.records == 0 && !summary.end_of_set {
            break;
        }

        if sets > 0 {
            writeln!(out, "---")?;
        }
        let mut entries: Vec<_> = table.iter().collect();
        entries.sort_unstable_by(|a, b| a.key.cmp(b.key));
        for entry in entries {
            let key = entry.key.strip_suffix(&[0]).unwrap_or(entry.key);
            write!(out, "{} => ", String::from_utf8_lossy(key))?;
            if hex || codec::is_binary_field(entry.value) {
                for byte in entry.value {
                    write!(out, "{:02x}", byte)?;
                }
                writeln!(out)?;
            } else {
                let value = entry.value.strip_suffix(&[0]).unwrap_or(entry.value);
                writeln!(out, "{}", String::from_utf8_lossy(value).escape_debug())?;
            }
        }
        sets += 1;

        if !summary.end_of_set {
            break;
        }
    }

    out.flush()?;
    tracing::info!(sets, "read {}", path.display());
    Ok(())
}

fn write(path: &Path) -> Result<()> {
    let mut table = codec::from_file(None, path)?
        .ok_or_else(|| HashError::Corrupt(format!("{} holds no records", path.display())))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    codec::to_stream(&mut *table, &mut out)?;
    out.flush()?;
    table.close()
}

fn nonterm(path: &Path) -> Result<()> {
    let mut table = MemHash::new();
    table.store(b"terminated\0", Value::Bytes(b"fine\0"))?;
    table.store(b"nonterm", Value::Bytes(b"this key has no NUL\0"))?;
    codec::to_file(&mut table, path)
}
