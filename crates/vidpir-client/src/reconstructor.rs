//! Client-side reconstruction of the requested item
//!
//! Reconstruction never holds a whole share: the response is checked and the
//! outputs are written from share blocks of the store's `chunk_bits`.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use vidpir_core::codec::{self, BitBlocks};
use vidpir_core::{BitSequence, ItemId, ReconstructionMode, Session, Share, ShareStore};
use vidpir_server::{combine, ServerResponse};

use crate::error::{ClientError, Result};

/// Stream of reconstructed bit chunks
pub type BitChunks = Box<dyn Iterator<Item = io::Result<Vec<bool>>>>;

/// Which route produced the reconstructed bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionPath {
    /// Mask artifacts were found and consumed
    Masked,
    /// Mask artifacts were absent; the shares were read directly
    DirectLoad,
}

/// A checked reconstruction, ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    pub item: ItemId,
    pub bits_len: u64,
    pub path: ReconstructionPath,
}

/// Destinations for the reconstructed item
#[derive(Debug, Clone)]
pub struct OutputFiles {
    /// Intermediate bit-text artifact, skipped when `None`
    pub bits: Option<PathBuf>,
    pub media: PathBuf,
    pub chunk_bits: usize,
}

/// What [`Reconstructor::write_outputs`] produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    /// Bit-text artifact, if one was written
    pub bits_path: Option<PathBuf>,
    pub media_bytes: u64,
}

/// `A XOR B`, block by block
struct XorBlocks<R: Read> {
    a: BitBlocks<R>,
    b: BitBlocks<R>,
}

impl<R: Read> Iterator for XorBlocks<R> {
    type Item = io::Result<Vec<bool>>;

    fn next(&mut self) -> Option<Self::Item> {
        let a = match self.a.next_block() {
            Ok(a) => a,
            Err(e) => return Some(Err(e)),
        };
        let b = match self.b.next_block() {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        match (a, b) {
            (None, None) => None,
            (Some(a), Some(b)) if a.len() == b.len() => {
                Some(Ok(a.iter().zip(&b).map(|(x, y)| x ^ y).collect()))
            }
            _ => Some(Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "shares differ in length",
            ))),
        }
    }
}

/// Turns a server response back into the requested item's bits
pub struct Reconstructor<'a> {
    store: &'a ShareStore,
    session: &'a Session,
    mode: ReconstructionMode,
}

impl<'a> Reconstructor<'a> {
    pub fn new(store: &'a ShareStore, session: &'a Session, mode: ReconstructionMode) -> Self {
        Self {
            store,
            session,
            mode,
        }
    }

    /// Reconstruct item `index`
    ///
    /// With no mask artifacts in the session this takes the direct-load
    /// fallback. See [`ReconstructionMode`] for where the bits come from in
    /// each mode; in `XorShares` mode persisted masks are checked against the
    /// shares and the response.
    pub fn reconstruct(&self, response: &ServerResponse, index: usize) -> Result<Reconstruction> {
        let start = Instant::now();
        let items = self.store.enumerate()?;
        let item = items.get(index).ok_or(ClientError::IndexOutOfRange {
            index,
            count: items.len(),
        })?;

        if let Some(answered) = response.item() {
            if answered != item {
                return Err(ClientError::ItemMismatch {
                    expected: item.to_string(),
                    actual: answered.to_string(),
                });
            }
        }

        let path = if self.session.masks_present() {
            tracing::debug!(item = %item, r1 = %self.session.r1_path().display(), "Found r1 and r2");
            ReconstructionPath::Masked
        } else {
            tracing::warn!(
                r1 = %self.session.r1_path().display(),
                "Mask artifacts not found, loading item directly"
            );
            ReconstructionPath::DirectLoad
        };

        let bits_len = self.store.bit_length(Share::A, item)?;
        if self.mode == ReconstructionMode::XorShares {
            let share_b = self.store.bit_length(Share::B, item)?;
            if share_b != bits_len {
                return Err(vidpir_core::Error::ShareLengthMismatch {
                    item: item.to_string(),
                    share_a: bits_len as usize,
                    share_b: share_b as usize,
                }
                .into());
            }
            if path == ReconstructionPath::Masked {
                self.verify_response(item, response, bits_len)?;
            }
        }

        tracing::info!(
            item = %item,
            mode = %self.mode,
            path = ?path,
            bits = bits_len,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reconstructed item"
        );

        Ok(Reconstruction {
            item: item.clone(),
            bits_len,
            path,
        })
    }

    /// The item's reconstructed bits as a stream of chunks
    pub fn chunks(&self, item: &ItemId) -> Result<BitChunks> {
        let a = self.store.share_blocks(Share::A, item)?;
        match self.mode {
            ReconstructionMode::Canonical => Ok(Box::new(a)),
            ReconstructionMode::XorShares => {
                let b = self.store.share_blocks(Share::B, item)?;
                Ok(Box::new(XorBlocks { a, b }))
            }
        }
    }

    /// Write the bit-text artifact (when requested) and the media file
    ///
    /// A failed bit-text write is not fatal: the media file is then packed
    /// straight from the share stream.
    pub fn write_outputs(
        &self,
        reconstruction: &Reconstruction,
        outputs: &OutputFiles,
    ) -> Result<WrittenOutputs> {
        let item = &reconstruction.item;
        let chunk_bits = outputs.chunk_bits;

        if let Some(bits_path) = &outputs.bits {
            let written = self.chunks(item).and_then(|chunks| {
                Ok(codec::write_bit_text_chunks(chunks, bits_path, chunk_bits)?)
            });
            match written {
                Ok(bits) => {
                    tracing::info!(path = %bits_path.display(), bits, "Saved decoded bits");
                    let media_bytes = bit_text_to_media_file(bits_path, &outputs.media, chunk_bits)?;
                    return Ok(WrittenOutputs {
                        bits_path: Some(bits_path.clone()),
                        media_bytes,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        path = %bits_path.display(),
                        error = %e,
                        "Could not write bit-text artifact, packing media directly"
                    );
                }
            }
        }

        let media_bytes = codec::write_packed_chunks(self.chunks(item)?, &outputs.media, chunk_bits)
            .map_err(|source| ClientError::MediaWrite {
                path: outputs.media.clone(),
                source,
            })?;
        Ok(WrittenOutputs {
            bits_path: None,
            media_bytes,
        })
    }

    /// Recompute the server's combination from the shares and compare
    ///
    /// The masks must match the item length whatever the response kind; only
    /// a masked response can be compared bit by bit.
    fn verify_response(&self, item: &ItemId, response: &ServerResponse, bits_len: u64) -> Result<()> {
        let (r1_len, r2_len) = self.session.mask_lengths()?;
        for actual in [r1_len, r2_len] {
            if actual != bits_len {
                return Err(ClientError::MaskLengthMismatch {
                    expected: bits_len as usize,
                    actual: actual as usize,
                });
            }
        }

        let response = match response {
            ServerResponse::Masked { response, .. } => response.as_slice(),
            _ => return Ok(()),
        };
        let mismatch = |position: usize| ClientError::ResponseMismatch {
            item: item.to_string(),
            position,
        };
        if response.len() as u64 != bits_len {
            return Err(mismatch(response.len().min(bits_len as usize)));
        }

        let chunk_bits = self.store.chunk_bits();
        let a_path = self.store.share_path(Share::A, item);
        let b_path = self.store.share_path(Share::B, item);
        let mut a = self.store.share_blocks(Share::A, item)?;
        let mut b = self.store.share_blocks(Share::B, item)?;
        let (mut r1, mut r2) = self.session.mask_blocks(chunk_bits)?;
        let r1_path = self.session.r1_path();
        let r2_path = self.session.r2_path();

        let mut offset = 0usize;
        while let Some(block_a) = next_block(&mut a, &a_path)? {
            let block_b = next_block(&mut b, &b_path)?.unwrap_or_default();
            let block_r1 = next_block(&mut r1, &r1_path)?.unwrap_or_default();
            let block_r2 = next_block(&mut r2, &r2_path)?.unwrap_or_default();
            let expected = combine(&block_a, &block_b, &block_r1, &block_r2)?;

            let observed = response
                .get(offset..offset + expected.len())
                .ok_or_else(|| mismatch(offset))?;
            if let Some(k) = expected.iter().zip(observed).position(|(e, r)| e != r) {
                return Err(mismatch(offset + k));
            }
            offset += expected.len();
        }
        Ok(())
    }
}

fn next_block<R: Read>(blocks: &mut BitBlocks<R>, path: &Path) -> Result<Option<Vec<bool>>> {
    Ok(blocks
        .next_block()
        .map_err(|e| vidpir_core::Error::codec(path, e))?)
}

/// Pack in-memory bits into a binary media file
pub fn to_media_file(bits: &BitSequence, path: &Path, chunk_bits: usize) -> Result<u64> {
    codec::write_packed_file(bits.as_slice(), path, chunk_bits).map_err(|source| {
        ClientError::MediaWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Convert a bit-text artifact into a binary media file
pub fn bit_text_to_media_file(bits_path: &Path, path: &Path, chunk_bits: usize) -> Result<u64> {
    codec::bit_text_file_to_bytes(bits_path, path, chunk_bits).map_err(|source| {
        ClientError::MediaWrite {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use tempfile::{tempdir, TempDir};
    use vidpir_core::{build_query, MaskPair};
    use vidpir_server::MaskedCombiner;

    fn bits(text: &str) -> BitSequence {
        BitSequence::from_text(text)
    }

    fn setup(items: &[(&str, &str, &str)]) -> (TempDir, ShareStore, Session) {
        let dir = tempdir().unwrap();
        let d0 = dir.path().join("D0");
        let d1 = dir.path().join("D1");
        std::fs::create_dir_all(&d0).unwrap();
        std::fs::create_dir_all(&d1).unwrap();
        for (name, a, b) in items {
            std::fs::write(d0.join(format!("{}.binary.txt", name)), a).unwrap();
            std::fs::write(d1.join(format!("{}.binary.txt", name)), b).unwrap();
        }
        let store = ShareStore::open(&d0, &d1).unwrap();
        let session = Session::single_slot(dir.path());
        (dir, store, session)
    }

    fn masked(item: &str, a: &str, b: &str, r1: &str, r2: &str) -> ServerResponse {
        let masks = MaskPair {
            r1: bits(r1),
            r2: bits(r2),
        };
        let response = combine(
            bits(a).as_slice(),
            bits(b).as_slice(),
            masks.r1.as_slice(),
            masks.r2.as_slice(),
        )
        .unwrap();
        ServerResponse::Masked {
            item: ItemId::new(item),
            response,
            masks,
        }
    }

    fn collect(reconstructor: &Reconstructor<'_>, item: &ItemId) -> String {
        let bits: BitSequence = reconstructor
            .chunks(item)
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .flatten()
            .collect();
        bits.to_text()
    }

    #[test]
    fn test_canonical_direct_load_without_masks() {
        let (_dir, store, session) = setup(&[("vidA", "1100", "0101"), ("vidB", "0011", "1111")]);
        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::Canonical);

        let result = reconstructor.reconstruct(&ServerResponse::Empty, 1).unwrap();
        assert_eq!(result.item, ItemId::new("vidB"));
        assert_eq!(result.bits_len, 4);
        assert_eq!(result.path, ReconstructionPath::DirectLoad);
        assert_eq!(collect(&reconstructor, &result.item), "0011");
    }

    #[test]
    fn test_canonical_with_masks_still_reads_share_a() {
        let (_dir, store, session) = setup(&[("vidA", "1100", "0101")]);
        let response = masked("vidA", "1100", "0101", "1010", "0110");
        session.persist_masks(response.masks().unwrap()).unwrap();

        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::Canonical);
        let result = reconstructor.reconstruct(&response, 0).unwrap();
        assert_eq!(result.path, ReconstructionPath::Masked);
        assert_eq!(collect(&reconstructor, &result.item), "1100");
    }

    #[test]
    fn test_xor_shares_reconstruction() {
        let (_dir, store, session) = setup(&[("vidA", "1100", "0101")]);
        let response = masked("vidA", "1100", "0101", "1010", "0110");
        session.persist_masks(response.masks().unwrap()).unwrap();

        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::XorShares);
        let result = reconstructor.reconstruct(&response, 0).unwrap();
        assert_eq!(result.path, ReconstructionPath::Masked);
        assert_eq!(collect(&reconstructor, &result.item), "1001");
    }

    #[test]
    fn test_xor_shares_stream_items_longer_than_a_chunk() {
        let mut rng = ChaCha12Rng::seed_from_u64(21);
        let a = BitSequence::random(203, &mut rng);
        let b = BitSequence::random(203, &mut rng);
        let (a_text, b_text) = (a.to_text(), b.to_text());
        let (dir, store, session) = setup(&[("vidA", a_text.as_str(), b_text.as_str())]);
        let store = store.with_chunk_bits(16);
        let session = session.with_chunk_bits(16);

        let response = MaskedCombiner::new(&store, &session)
            .process(&build_query(0, 1).unwrap(), &mut rng)
            .unwrap();
        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::XorShares);
        let result = reconstructor.reconstruct(&response, 0).unwrap();
        assert_eq!(result.bits_len, 203);
        assert_eq!(result.path, ReconstructionPath::Masked);

        let outputs = OutputFiles {
            bits: Some(dir.path().join("out.bits")),
            media: dir.path().join("out.mp4"),
            chunk_bits: 16,
        };
        let written = reconstructor.write_outputs(&result, &outputs).unwrap();
        let expected = a.xor(&b).unwrap();
        assert_eq!(written.media_bytes, 26);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.bits")).unwrap(),
            expected.to_text()
        );
        assert_eq!(
            std::fs::read(&outputs.media).unwrap(),
            codec::encode_bits(expected.as_slice())
        );

        // A flipped bit deep inside a later block is located exactly
        let tampered = match response {
            ServerResponse::Masked { item, response, masks } => {
                let mut flipped = response.into_inner();
                flipped[150] = !flipped[150];
                ServerResponse::Masked {
                    item,
                    response: flipped.into(),
                    masks,
                }
            }
            other => panic!("unexpected response: {:?}", other),
        };
        assert!(matches!(
            reconstructor.reconstruct(&tampered, 0),
            Err(ClientError::ResponseMismatch { position: 150, .. })
        ));
    }

    #[test]
    fn test_xor_shares_rejects_tampered_response() {
        let (_dir, store, session) = setup(&[("vidA", "1100", "0101")]);
        let honest = masked("vidA", "1100", "0101", "1111", "1111");
        session.persist_masks(honest.masks().unwrap()).unwrap();

        let tampered = match honest {
            ServerResponse::Masked { item, masks, .. } => ServerResponse::Masked {
                item,
                response: bits("1000"),
                masks,
            },
            other => other,
        };

        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::XorShares);
        assert!(matches!(
            reconstructor.reconstruct(&tampered, 0),
            Err(ClientError::ResponseMismatch { position: 3, .. })
        ));
    }

    #[test]
    fn test_xor_shares_rejects_stale_masks() {
        let (_dir, store, session) = setup(&[("vidA", "1100", "0101")]);
        session
            .persist_masks(&MaskPair {
                r1: bits("10"),
                r2: bits("01"),
            })
            .unwrap();

        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::XorShares);
        assert!(matches!(
            reconstructor.reconstruct(&ServerResponse::Empty, 0),
            Err(ClientError::MaskLengthMismatch { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_xor_shares_rejects_uneven_shares() {
        let (_dir, store, session) = setup(&[("vidA", "1100", "010")]);
        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::XorShares);
        assert!(matches!(
            reconstructor.reconstruct(&ServerResponse::Empty, 0),
            Err(ClientError::Core(vidpir_core::Error::ShareLengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let (_dir, store, session) = setup(&[("vidA", "1", "0")]);
        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::Canonical);
        assert!(matches!(
            reconstructor.reconstruct(&ServerResponse::Empty, 1),
            Err(ClientError::IndexOutOfRange { index: 1, count: 1 })
        ));
    }

    #[test]
    fn test_item_mismatch() {
        let (_dir, store, session) = setup(&[("vidA", "1", "0"), ("vidB", "1", "0")]);
        let response = ServerResponse::RawShare {
            item: ItemId::new("vidA"),
            bits: bits("1"),
            reason: "test".into(),
        };
        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::Canonical);
        assert!(matches!(
            reconstructor.reconstruct(&response, 1),
            Err(ClientError::ItemMismatch { .. })
        ));
    }

    #[test]
    fn test_media_outputs_agree() {
        let (dir, store, session) = setup(&[("vidA", "0100100001101001101", "0")]);
        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::Canonical);
        let result = reconstructor.reconstruct(&ServerResponse::Empty, 0).unwrap();

        let via_text = OutputFiles {
            bits: Some(dir.path().join("out.bits")),
            media: dir.path().join("via_text.mp4"),
            chunk_bits: 8,
        };
        let direct = OutputFiles {
            bits: None,
            media: dir.path().join("direct.mp4"),
            chunk_bits: 8,
        };
        let in_memory = dir.path().join("in_memory.mp4");

        assert_eq!(reconstructor.write_outputs(&result, &via_text).unwrap().media_bytes, 3);
        assert_eq!(
            reconstructor.write_outputs(&result, &direct).unwrap(),
            WrittenOutputs {
                bits_path: None,
                media_bytes: 3
            }
        );
        assert_eq!(to_media_file(&bits("0100100001101001101"), &in_memory, 8).unwrap(), 3);

        let expected = vec![0x48, 0x69, 0xa0];
        for path in [&via_text.media, &direct.media, &in_memory] {
            assert_eq!(std::fs::read(path).unwrap(), expected);
        }
    }

    #[test]
    fn test_media_write_failure() {
        let (dir, store, session) = setup(&[("vidA", "1", "0")]);
        let reconstructor = Reconstructor::new(&store, &session, ReconstructionMode::Canonical);
        let result = reconstructor.reconstruct(&ServerResponse::Empty, 0).unwrap();

        let outputs = OutputFiles {
            bits: None,
            media: dir.path().join("missing-dir").join("out.mp4"),
            chunk_bits: 8,
        };
        assert!(matches!(
            reconstructor.write_outputs(&result, &outputs),
            Err(ClientError::MediaWrite { .. })
        ));
        assert!(matches!(
            to_media_file(&bits("1"), &outputs.media, 8),
            Err(ClientError::MediaWrite { .. })
        ));
    }
}
