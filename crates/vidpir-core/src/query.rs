//! One-hot query vectors

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Selection vector over the enumerated items
///
/// Built by the client and handed to the combiner in place of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVector(Vec<u8>);

impl QueryVector {
    /// All-zero vector of `len` entries (selects nothing)
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    /// Wrap raw entries; any non-zero entry counts as selected
    pub fn from_entries(entries: Vec<u8>) -> Self {
        Self(entries.into_iter().map(|e| u8::from(e != 0)).collect())
    }

    /// First selected position, if any
    pub fn selected(&self) -> Option<usize> {
        self.0.iter().position(|&e| e == 1)
    }

    /// True when exactly one entry is set
    pub fn is_one_hot(&self) -> bool {
        self.0.iter().filter(|&&e| e == 1).count() == 1
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// Build a one-hot vector selecting `index` out of `item_count` items
///
/// An index outside `[0, item_count)` is rejected rather than producing an
/// all-zero vector.
pub fn build_query(index: usize, item_count: usize) -> Result<QueryVector> {
    if index >= item_count {
        return Err(Error::InvalidIndex {
            index,
            count: item_count,
        });
    }

    let mut query = QueryVector::zeros(item_count);
    query.0[index] = 1;
    Ok(query)
}
