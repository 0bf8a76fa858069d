//! vidpir binary: retrieve one video from a two-share database
//!
//! Run with:
//! ```bash
//! cargo run -p vidpir-client --bin vidpir -- --base-dir ./pir-data --index 1
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use tracing_subscriber::EnvFilter;
use vidpir_client::{parse_index, player, ClientBuilder, PirClient, ReconstructionMode};
use vidpir_core::{PirConfig, Session};

#[derive(Parser, Debug)]
#[command(name = "vidpir")]
#[command(about = "Privately retrieve a video from a two-share database")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding D0/ and D1/ (ignored when --config is given)
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Item index to retrieve; prompts on stdin when omitted
    #[arg(long, allow_hyphen_values = true)]
    index: Option<String>,

    /// Reconstruction mode: canonical or xor_shares
    #[arg(long)]
    mode: Option<ReconstructionMode>,

    /// Bits per codec chunk (multiple of 8)
    #[arg(long)]
    chunk_bits: Option<usize>,

    /// Request id for an isolated mask slot
    #[arg(long)]
    request_id: Option<String>,

    /// Use a fresh random request id for the mask slot
    #[arg(long, conflicts_with = "request_id")]
    fresh_session: bool,

    /// Skip the intermediate bit-text output
    #[arg(long)]
    no_bits: bool,

    /// Do not open the reconstructed media
    #[arg(long)]
    no_play: bool,

    /// Print the catalog and exit
    #[arg(long)]
    list: bool,

    /// Seed for the mask RNG (testing only)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PirConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PirConfig::from_base_dir(&args.base_dir),
    };
    if let Some(mode) = args.mode {
        config = config.with_mode(mode);
    }
    if let Some(chunk_bits) = args.chunk_bits {
        config = config.with_chunk_bits(chunk_bits);
    }
    if let Some(id) = &args.request_id {
        config = config.with_request_id(id.clone());
    }
    if args.no_bits {
        config = config.with_bit_text(false);
    }

    let mut rng = match args.seed {
        Some(seed) => ChaCha12Rng::seed_from_u64(seed),
        None => ChaCha12Rng::from_rng(rand::thread_rng())?,
    };

    let mut builder = ClientBuilder::new(config.clone());
    if args.fresh_session {
        builder = builder.session(Session::fresh(&config.session_dir, &mut rng));
    }
    let client = builder.build().context("Failed to open share database")?;

    let catalog = client.catalog().context("Failed to enumerate share database")?;
    if catalog.is_empty() {
        println!(
            "No items found in {}, nothing to retrieve",
            config.share_a_dir.display()
        );
        return Ok(());
    }

    if args.list {
        print_catalog(&client)?;
        return Ok(());
    }

    let raw = match args.index {
        Some(raw) => raw,
        None => {
            print_catalog(&client)?;
            prompt_index(catalog.len())?
        }
    };
    let index = match parse_index(&raw) {
        Ok(index) => index,
        Err(e) => {
            println!("{}", e);
            return Ok(());
        }
    };

    let outcome = match client.retrieve(index, &mut rng) {
        Ok(outcome) => outcome,
        Err(e) if e.is_graceful() => {
            println!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e).context("Retrieval failed"),
    };

    if outcome.server_fallback {
        println!("[WARN] Server could not persist masks, raw share was used");
    }
    if let Some(bits_path) = &outcome.bits_path {
        println!("Decoded bits saved to {}", bits_path.display());
    }
    println!(
        "[OK] Retrieved {} ({} bits) into {} ({} bytes)",
        outcome.item,
        outcome.bits_len,
        outcome.media_path.display(),
        outcome.media_bytes
    );

    if !args.no_play {
        if let Err(e) = player::open(&outcome.media_path) {
            tracing::warn!(error = %e, "Could not open media player");
            println!("Open {} manually to play it", outcome.media_path.display());
        }
    }

    Ok(())
}

fn print_catalog(client: &PirClient) -> anyhow::Result<()> {
    let catalog = client.catalog()?;
    println!("Items in {}:", client.config().share_a_dir.display());
    for (index, item) in catalog.iter().enumerate() {
        println!("  [{}] {}", index, item);
    }
    Ok(())
}

fn prompt_index(count: usize) -> anyhow::Result<String> {
    print!("Enter item index (0..{}): ", count - 1);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read index from stdin")?;
    Ok(line)
}
