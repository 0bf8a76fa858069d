//! Server responses

use vidpir_core::{BitSequence, ItemId, MaskPair};

/// Outcome of processing one query vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerResponse {
    /// The query selected no item
    Empty,
    /// The masked combination of the selected item, with its masks
    Masked {
        item: ItemId,
        response: BitSequence,
        masks: MaskPair,
    },
    /// Masks could not be persisted, so the raw ShareA bits are returned
    RawShare {
        item: ItemId,
        bits: BitSequence,
        reason: String,
    },
}

impl ServerResponse {
    /// Response bits (empty for `Empty`)
    pub fn bits(&self) -> &[bool] {
        match self {
            ServerResponse::Empty => &[],
            ServerResponse::Masked { response, .. } => response.as_slice(),
            ServerResponse::RawShare { bits, .. } => bits.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits().len()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ServerResponse::Empty)
    }

    /// True when the mask-persistence fallback was taken
    pub fn is_fallback(&self) -> bool {
        matches!(self, ServerResponse::RawShare { .. })
    }

    /// The item the response was computed for
    pub fn item(&self) -> Option<&ItemId> {
        match self {
            ServerResponse::Empty => None,
            ServerResponse::Masked { item, .. } | ServerResponse::RawShare { item, .. } => Some(item),
        }
    }

    /// Masks used for the response, when it is masked
    pub fn masks(&self) -> Option<&MaskPair> {
        match self {
            ServerResponse::Masked { masks, .. } => Some(masks),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert!(ServerResponse::Empty.is_empty());
        assert_eq!(ServerResponse::Empty.len(), 0);
        assert!(ServerResponse::Empty.item().is_none());

        let fallback = ServerResponse::RawShare {
            item: ItemId::new("vidA"),
            bits: BitSequence::from_text("101"),
            reason: "disk full".into(),
        };
        assert!(fallback.is_fallback());
        assert!(!fallback.is_empty());
        assert_eq!(fallback.len(), 3);
        assert_eq!(fallback.item(), Some(&ItemId::new("vidA")));
        assert!(fallback.masks().is_none());
    }
}
