use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use reduxfile::{ParseOptions, Result, Schema, logging, render};

#[derive(Parser)]
#[command(name = "reduxfile")]
#[command(about = "Load and validate spectroscopic reduction files", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG still applies).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and print a one-line summary.
    Check {
        file: PathBuf,

        /// Reject settings not covered by the schema.
        #[arg(long)]
        strict: bool,

        /// Schema file (one dotted glob per line); implies --strict.
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Fail when the data block lists no inputs.
        #[arg(long)]
        require_inputs: bool,
    },

    /// Re-emit a file canonically or as JSON.
    Dump {
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Canonical)]
        format: Format,

        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// List manifest filenames, optionally only one frame type.
    Frames {
        file: PathBuf,

        #[arg(long)]
        frametype: Option<String>,
    },

    /// Rewrite the raw-data (and calibration) directories of a file.
    Relocate {
        file: PathBuf,

        #[arg(long)]
        raw_dir: String,

        #[arg(long)]
        calib_dir: Option<String>,

        #[arg(short = 'o', long)]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Canonical,
    Json,
    /// Dotted `key = value` settings only.
    Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.cmd {
        Commands::Check {
            file,
            strict,
            schema,
            require_inputs,
        } => {
            let opts = ParseOptions {
                strict: strict || schema.is_some(),
                require_inputs,
                schema: match schema {
                    Some(path) => Schema::load(&path)?,
                    None => Schema::default(),
                },
            };
            let config = reduxfile::load(&file, &opts)?;
            println!("{}: {}", file.display(), render::summary(&config));
        }
        Commands::Dump { file, format, out } => {
            let config = reduxfile::load(&file, &ParseOptions::default())?;
            let text = match format {
                Format::Canonical => render::render_canonical(&config)?,
                Format::Json => render::render_json(&config)? + "\n",
                Format::Settings => render::canonical::settings_listing(config.settings()),
            };
            write_output(out.as_ref(), &text)?;
        }
        Commands::Frames { file, frametype } => {
            let config = reduxfile::load(&file, &ParseOptions::default())?;
            let Some(manifest) = config.manifest() else {
                bail!("{} has no frame table in its data block", file.display());
            };
            for row in manifest.rows() {
                if frametype.as_deref().is_none_or(|t| row.has_type(t)) {
                    println!("{}", row.filename);
                }
            }
        }
        Commands::Relocate {
            file,
            raw_dir,
            calib_dir,
            out,
        } => {
            let config = reduxfile::load(&file, &ParseOptions::default())?;
            let moved = config.relocated(&raw_dir, calib_dir.as_deref());
            write_output(Some(&out), &render::render_canonical(&moved)?)?;
            println!("Wrote {}", out.display());
        }
    }

    Ok(())
}

fn write_output(out: Option<&PathBuf>, text: &str) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("write {}", path.display()))?,
        None => print!("{}", text),
    }
    Ok(())
}
