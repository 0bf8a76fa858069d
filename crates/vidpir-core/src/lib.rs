//! vidpir-core: Shared types for two-share video PIR
//!
//! This crate holds everything both sides of the protocol agree on:
//! - Share Store: two parallel directories (`D0`, `D1`) of bit-text items
//! - Query Vector: one-hot selection over the enumerated items
//! - Session: the slot where the server persists the masks (r1, r2)
//! - Codec: streaming conversion between bit-text and packed bytes
//!
//! # Privacy Model
//!
//! | Information | Server Knowledge |
//! |-------------|------------------|
//! | Item catalog (names, count) | **YES** - the server enumerates it |
//! | Requested index | Only through the query vector |
//! | Masks r1, r2 | YES - the server draws them |
//!
//! The query vector is the only artifact crossing from client to server, so
//! the combiner API never takes a raw index. This keeps the boundary intact if
//! the two halves are later split across a network.
//!
//! This crate does not certify the soundness of the masking scheme; see
//! [`ReconstructionMode`] for how reconstruction is chosen.

mod bits;
pub mod codec;
mod config;
mod error;
mod query;
mod session;
mod store;

pub use bits::BitSequence;
pub use config::{PirConfig, ReconstructionMode, PROTOCOL_VERSION};
pub use error::Error;
pub use query::{build_query, QueryVector};
pub use session::{MaskPair, Session};
pub use store::{ItemId, Share, ShareStore};

pub type Result<T> = std::result::Result<T, Error>;

/// Constants shared by the server, client and tooling
pub mod constants {
    /// Suffix marking a bit-text item file
    pub const ITEM_SUFFIX: &str = ".binary.txt";

    /// Default number of bits processed per codec chunk (~1M bits)
    pub const DEFAULT_CHUNK_BITS: usize = 1_000_000;

    /// Default number of media bytes read per chunk when producing bit-text
    pub const DEFAULT_CHUNK_BYTES: usize = 1024 * 1024;

    /// Default directory holding ShareA
    pub const SHARE_A_DIR: &str = "D0";

    /// Default directory holding ShareB
    pub const SHARE_B_DIR: &str = "D1";

    /// Intermediate bit-text artifact of the reconstructed item
    pub const BITS_OUTPUT: &str = "retrieved_video.bits";

    /// Binary media artifact of the reconstructed item
    pub const MEDIA_OUTPUT: &str = "reconstructed_video.mp4";
}
