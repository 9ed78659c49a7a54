use cdfs::archive::{self, PackOptions, UnpackOptions};
use cdfs::inspect::{self, FrameHealth};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cdfs", version, about = "The .cdfs chunked data frame stream CLI")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file into a .cdfs container
    Pack {
        input: PathBuf,
        /// Output path (default: <input>.cdfs)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Label stored in the HEAD frame (at most 32 bytes are kept)
        #[arg(short, long, default_value = "")]
        label: String,
        /// Leave the HEAD placeholders; readers fall back to the FINF totals
        #[arg(long)]
        no_finalize: bool,
    },
    /// Decode a .cdfs container back into the original bytes
    Unpack {
        input: PathBuf,
        /// Output path (default: <input> without .cdfs)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Fail unless the container passes the integrity check
        #[arg(long)]
        strict: bool,
    },
    /// Validate every frame and report container health
    Inspect {
        input: PathBuf,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    match cli.command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { input, output, label, no_finalize } => {
            let opts = PackOptions { label, finalize_head: !no_finalize };
            let (path, summary) = archive::pack_file(&input, output.as_deref(), &opts)?;
            println!("  packed  {}", input.display());
            println!("  frames  {}  ({} data)", summary.frame_count, summary.data_frames);
            println!("  bytes   {}", summary.data_size);
            if !summary.finalized {
                println!("  HEAD left with placeholders; totals are in FINF");
            }
            println!("Created: {}", path.display());
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output, strict } => {
            let opts = UnpackOptions { strict };
            let (path, summary) = archive::unpack_file(&input, output.as_deref(), &opts)?;
            println!("  label      {:?}", summary.label);
            println!("  frames     {}", summary.frames_read);
            println!("  bytes      {}", summary.bytes_written);
            match summary.integrity {
                Some(true)  => println!("  integrity  ok"),
                Some(false) => println!(
                    "  integrity  FAILED ({} invalid frame(s))",
                    summary.invalid_frames.len()
                ),
                None        => println!("  integrity  unknown (no FINF frame)"),
            }
            if summary.unknown_frames > 0 {
                println!("  skipped    {} frame(s) of unknown type", summary.unknown_frames);
            }
            println!("Unpacked to: {}", path.display());
        }

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input, json } => {
            let mut src = BufReader::new(File::open(&input)?);
            let report = inspect::scan::<_, fn(u64, u64)>(&mut src, None)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("── .cdfs Container ──────────────────────────────────────");
            println!("  Path           {}", input.display());
            if let Some(version) = report.effective.version {
                println!("  Format version {:#010x}", version);
            }
            println!("  Label          {:?}", report.effective.label);
            println!("  Frame count    {}", report.effective.frame_count);
            println!("  Data size      {} B", report.effective.data_size);
            if let Some(hash) = &report.finish_hash {
                println!("  FINF hash      {}", hash);
            }
            println!("{:>8} {:>8}  {:<5} {:>10}  Health", "Index", "Seq", "Type", "CRC-32");
            for f in &report.frames {
                let health = match &f.health {
                    FrameHealth::Healthy => "ok".to_string(),
                    FrameHealth::ChecksumMismatch { computed, .. } => {
                        format!("checksum mismatch (computed {:08x})", computed)
                    }
                    FrameHealth::OutOfSequence { expected, found } => {
                        format!("out of sequence (expected {}, found {})", expected, found)
                    }
                };
                println!("{:>8} {:>8}  {:<5} {:>10}  {}",
                    f.index, f.sequence, f.kind, f.checksum, health);
            }
            println!("{}", report.summary());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn setup_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
