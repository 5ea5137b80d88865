//! treefs command-line tool
//!
//! `explode` writes a JSON document out as a directory tree; `implode`
//! reads a tree back and prints it as JSON.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use treefs::{CodecConfig, TreeCodec};

/// treefs - structured data as directory trees
#[derive(Parser, Debug)]
#[command(name = "treefs")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Leaf file extension (overrides the config file)
    #[arg(long, global = true, env = "TREEFS_EXTENSION")]
    pub extension: Option<String>,

    /// JSON file holding codec settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a JSON document into a tree
    Explode {
        /// JSON file to read, or `-` for stdin
        input: String,
        /// Root of the tree to write
        target: PathBuf,
    },
    /// Decode a tree and print it as JSON
    Implode {
        /// Root of the tree to read
        source: PathBuf,
    },
}

/// Build the codec the arguments describe.
pub fn codec(args: &Args) -> Result<TreeCodec, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => CodecConfig::from_json_file(path)?,
        None => CodecConfig::default(),
    };
    if let Some(extension) = &args.extension {
        config.extension = extension.clone();
    }
    Ok(TreeCodec::from_config(&config))
}

/// Run one command, printing any output to `out`.
pub fn run(args: &Args, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let codec = codec(args)?;

    match &args.command {
        Command::Explode { input, target } => {
            let doc: serde_json::Value = if input == "-" {
                serde_json::from_reader(io::stdin().lock())?
            } else {
                let file =
                    File::open(input).map_err(|e| format!("failed to open {}: {}", input, e))?;
                serde_json::from_reader(BufReader::new(file))?
            };
            codec.encode(&doc, target)?;
            tracing::info!(path = %target.display(), "exploded document");
        }
        Command::Implode { source } => {
            let doc: serde_json::Value = codec.decode(source)?;
            serde_json::to_writer_pretty(&mut *out, &doc)?;
            writeln!(out)?;
        }
    }

    Ok(())
}
