//! Split bit-text items into the two share directories

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::Rng;
use tempfile::NamedTempFile;
use vidpir_core::codec::{self, BitTextDecoder};
use vidpir_core::constants::{DEFAULT_CHUNK_BITS, SHARE_A_DIR, SHARE_B_DIR};
use vidpir_core::{BitSequence, ItemId};

/// How an item is spread over D0 and D1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitMode {
    /// D0 = random bits, D1 = item XOR D0
    #[default]
    Xor,
    /// The plain item in both shares
    Replicate,
}

/// Writes items into `D0/` and `D1/` under a base directory
pub struct ShareSplitter {
    share_a: PathBuf,
    share_b: PathBuf,
    mode: SplitMode,
    chunk_bits: usize,
}

impl ShareSplitter {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        Self {
            share_a: base.join(SHARE_A_DIR),
            share_b: base.join(SHARE_B_DIR),
            mode: SplitMode::default(),
            chunk_bits: DEFAULT_CHUNK_BITS,
        }
    }

    pub fn mode(mut self, mode: SplitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn chunk_bits(mut self, chunk_bits: usize) -> Self {
        self.chunk_bits = chunk_bits.max(1);
        self
    }

    pub fn share_dirs(&self) -> (&Path, &Path) {
        (&self.share_a, &self.share_b)
    }

    /// Split one `*.binary.txt` item, returning its id and bit length
    ///
    /// Both share files are written through temporary siblings and only
    /// replace existing shares once both are complete.
    pub fn split_file<R: Rng + ?Sized>(&self, src: &Path, rng: &mut R) -> anyhow::Result<(ItemId, u64)> {
        let name = src
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("{} has no usable file name", src.display()))?;
        let item = ItemId::from_file_name(name)
            .with_context(|| format!("{} is not a bit-text item", src.display()))?;

        std::fs::create_dir_all(&self.share_a)?;
        std::fs::create_dir_all(&self.share_b)?;

        let reader = BufReader::new(File::open(src).with_context(|| format!("Failed to open {}", src.display()))?);
        let mut tmp_a = NamedTempFile::new_in(&self.share_a)?;
        let mut tmp_b = NamedTempFile::new_in(&self.share_b)?;

        let mut total = 0u64;
        {
            let mut out_a = BufWriter::new(tmp_a.as_file_mut());
            let mut out_b = BufWriter::new(tmp_b.as_file_mut());

            for chunk in BitTextDecoder::with_chunk_bits(reader, self.chunk_bits) {
                let chunk = BitSequence::from(chunk.with_context(|| format!("Failed to read {}", src.display()))?);
                let (a, b) = match self.mode {
                    SplitMode::Xor => {
                        let pad = BitSequence::random(chunk.len(), rng);
                        let masked = chunk.xor(&pad)?;
                        (pad, masked)
                    }
                    SplitMode::Replicate => (chunk.clone(), chunk),
                };
                codec::write_bit_text(a.as_slice(), &mut out_a, self.chunk_bits)?;
                codec::write_bit_text(b.as_slice(), &mut out_b, self.chunk_bits)?;
                total += a.len() as u64;
            }

            out_a.flush()?;
            out_b.flush()?;
        }

        tmp_a.persist(self.share_a.join(item.file_name()))?;
        tmp_b.persist(self.share_b.join(item.file_name()))?;

        tracing::debug!(item = %item, bits = total, mode = ?self.mode, "Split item into shares");
        Ok((item, total))
    }

    /// Split every bit-text item in `src_dir`
    pub fn split_dir<R: Rng + ?Sized>(&self, src_dir: &Path, rng: &mut R) -> anyhow::Result<Vec<ItemId>> {
        let mut sources = Vec::new();
        for entry in std::fs::read_dir(src_dir).with_context(|| format!("Failed to read {}", src_dir.display()))? {
            let entry = entry?;
            let is_item = entry
                .file_name()
                .to_str()
                .and_then(ItemId::from_file_name)
                .is_some();
            if entry.file_type()?.is_file() && is_item {
                sources.push(entry.path());
            }
        }
        sources.sort();

        let mut items = Vec::with_capacity(sources.len());
        for src in &sources {
            let (item, bits) = self.split_file(src, rng)?;
            tracing::info!(item = %item, bits, "Wrote shares");
            items.push(item);
        }
        Ok(items)
    }
}
