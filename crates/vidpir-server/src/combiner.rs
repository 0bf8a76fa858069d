//! Masked combination of the two shares

use std::time::Instant;

use rand::Rng;
use vidpir_core::{BitSequence, Error, ItemId, MaskPair, QueryVector, Session, Share, ShareStore};

use crate::error::{Result, ServerError};
use crate::response::ServerResponse;

/// Per-bit combination `response[j] = (a[j]*r1[j] + b[j]*r2[j]) mod 2`
///
/// All four inputs must have the same length.
pub fn combine(a: &[bool], b: &[bool], r1: &[bool], r2: &[bool]) -> Result<BitSequence> {
    let expected = a.len();
    for actual in [b.len(), r1.len(), r2.len()] {
        if actual != expected {
            return Err(ServerError::InputLengthMismatch { expected, actual });
        }
    }

    let response = a
        .iter()
        .zip(b)
        .zip(r1.iter().zip(r2))
        .map(|((&a, &b), (&r1, &r2))| {
            let sum = u8::from(a) * u8::from(r1) + u8::from(b) * u8::from(r2);
            sum % 2 == 1
        })
        .collect();
    Ok(response)
}

/// Answers query vectors over a share store
///
/// Each call draws fresh masks and overwrites the session's mask slot.
pub struct MaskedCombiner<'a> {
    store: &'a ShareStore,
    session: &'a Session,
}

impl<'a> MaskedCombiner<'a> {
    pub fn new(store: &'a ShareStore, session: &'a Session) -> Self {
        Self { store, session }
    }

    fn read_error(item: &ItemId, source: vidpir_core::Error) -> ServerError {
        ServerError::ShareRead {
            item: item.to_string(),
            source,
        }
    }

    /// Combine the item's shares block by block, drawing masks as it goes
    ///
    /// Only the masks and the response grow with the item; the shares are
    /// read `chunk_bits` at a time.
    fn combine_streaming<R: Rng + ?Sized>(
        &self,
        item: &ItemId,
        rng: &mut R,
    ) -> Result<(BitSequence, MaskPair)> {
        let share_a = self.store.bit_length(Share::A, item).map_err(|e| Self::read_error(item, e))?;
        let share_b = self.store.bit_length(Share::B, item).map_err(|e| Self::read_error(item, e))?;
        if share_a != share_b {
            return Err(Error::ShareLengthMismatch {
                item: item.to_string(),
                share_a: share_a as usize,
                share_b: share_b as usize,
            }
            .into());
        }

        let mut a = self.store.share_blocks(Share::A, item).map_err(|e| Self::read_error(item, e))?;
        let mut b = self.store.share_blocks(Share::B, item).map_err(|e| Self::read_error(item, e))?;
        let a_path = self.store.share_path(Share::A, item);
        let b_path = self.store.share_path(Share::B, item);

        let len = share_a as usize;
        let mut masks = MaskPair {
            r1: BitSequence::with_capacity(len),
            r2: BitSequence::with_capacity(len),
        };
        let mut response = BitSequence::with_capacity(len);

        loop {
            let block_a = a.next_block().map_err(|e| Self::read_error(item, Error::codec(&a_path, e)))?;
            let block_b = b.next_block().map_err(|e| Self::read_error(item, Error::codec(&b_path, e)))?;
            let (block_a, block_b) = match (block_a, block_b) {
                (Some(x), Some(y)) => (x, y),
                (None, None) => break,
                // The shares changed length since they were counted
                (x, y) => {
                    return Err(ServerError::InputLengthMismatch {
                        expected: x.map_or(0, |x| x.len()),
                        actual: y.map_or(0, |y| y.len()),
                    });
                }
            };

            let r1 = BitSequence::random(block_a.len(), rng);
            let r2 = BitSequence::random(block_a.len(), rng);
            let part = combine(&block_a, &block_b, r1.as_slice(), r2.as_slice())?;
            response.extend_from_slice(part.as_slice());
            masks.r1.extend_from_slice(r1.as_slice());
            masks.r2.extend_from_slice(r2.as_slice());
        }

        Ok((response, masks))
    }

    /// Process a query vector
    ///
    /// The selected item is the first set entry; a vector with no set entry
    /// yields `ServerResponse::Empty`. If the masks cannot be persisted the
    /// raw ShareA bits come back as `ServerResponse::RawShare`.
    pub fn process<R: Rng + ?Sized>(&self, query: &QueryVector, rng: &mut R) -> Result<ServerResponse> {
        let start = Instant::now();
        let items = self.store.enumerate()?;
        if query.len() != items.len() {
            return Err(ServerError::QueryLengthMismatch {
                expected: items.len(),
                actual: query.len(),
            });
        }

        let item = match query.selected() {
            Some(index) => &items[index],
            None => {
                tracing::info!(items = items.len(), "Query selects no item");
                return Ok(ServerResponse::Empty);
            }
        };

        let (response, masks) = self.combine_streaming(item, rng)?;

        if let Err(e) = self.session.persist_masks(&masks) {
            tracing::warn!(
                item = %item,
                error = %e,
                "Mask persistence failed, returning raw share"
            );
            let bits = self
                .store
                .load_share(Share::A, item)
                .map_err(|e| Self::read_error(item, e))?;
            return Ok(ServerResponse::RawShare {
                item: item.clone(),
                bits,
                reason: e.to_string(),
            });
        }

        tracing::info!(
            item = %item,
            bits = response.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Computed D0.r1 + D1.r2"
        );

        Ok(ServerResponse::Masked {
            item: item.clone(),
            response,
            masks,
        })
    }
}
