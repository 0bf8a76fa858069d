//! share-builder binary: prepare a two-share video database
//!
//! Run with:
//! ```bash
//! cargo run -p share-builder -- encode --input ./videos --output ./bits
//! cargo run -p share-builder -- split --input ./bits --output ./pir-data
//! cargo run -p share-builder -- decode --input ./bits --output ./restored
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use share_builder::{decode_dir, encode_dir, ShareSplitter, SplitMode};
use tracing_subscriber::EnvFilter;
use vidpir_core::constants::{DEFAULT_CHUNK_BITS, DEFAULT_CHUNK_BYTES};

#[derive(Parser, Debug)]
#[command(name = "share-builder")]
#[command(about = "Build and inspect two-share video databases")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert video files into bit-text items
    Encode {
        /// Directory of video files
        #[arg(long, default_value = ".")]
        input: PathBuf,

        /// Directory for the `.binary.txt` items
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Media bytes read per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_BYTES)]
        chunk_bytes: usize,
    },

    /// Convert bit-text items back into media files
    Decode {
        /// Directory of `.binary.txt` items
        #[arg(long, default_value = ".")]
        input: PathBuf,

        /// Directory for the restored files
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Bits processed per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_BITS)]
        chunk_bits: usize,
    },

    /// Write bit-text items into D0/ and D1/ shares
    Split {
        /// Directory of `.binary.txt` items
        #[arg(long, default_value = ".")]
        input: PathBuf,

        /// Base directory receiving D0/ and D1/
        #[arg(long, default_value = ".")]
        output: PathBuf,

        /// Store the plain item in both shares instead of XOR shares
        #[arg(long)]
        replicate: bool,

        /// Bits processed per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_BITS)]
        chunk_bits: usize,

        /// Seed for the share RNG (testing only)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Encode {
            input,
            output,
            chunk_bytes,
        } => {
            let converted = encode_dir(&input, &output, chunk_bytes)?;
            println!("Encoded {} file(s) into {}", converted.len(), output.display());
        }
        Command::Decode {
            input,
            output,
            chunk_bits,
        } => {
            let converted = decode_dir(&input, &output, chunk_bits)?;
            println!("Decoded {} item(s) into {}", converted.len(), output.display());
        }
        Command::Split {
            input,
            output,
            replicate,
            chunk_bits,
            seed,
        } => {
            let mut rng = match seed {
                Some(seed) => ChaCha12Rng::seed_from_u64(seed),
                None => ChaCha12Rng::from_rng(rand::thread_rng())?,
            };
            let mode = if replicate {
                SplitMode::Replicate
            } else {
                SplitMode::Xor
            };
            let splitter = ShareSplitter::new(&output).mode(mode).chunk_bits(chunk_bits);
            let items = splitter.split_dir(&input, &mut rng)?;

            let (d0, d1) = splitter.share_dirs();
            println!("Split {} item(s) ({:?}):", items.len(), mode);
            println!("  ShareA: {}", d0.display());
            println!("  ShareB: {}", d1.display());
        }
    }

    Ok(())
}
