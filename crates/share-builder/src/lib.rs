//! share-builder: Offline tooling for two-share video databases
//!
//! Turns media files into bit-text items, bit-text items back into media,
//! and bit-text items into the D0/D1 share layout the server reads.

pub mod convert;
pub mod split;

pub use convert::{decode_dir, decode_file, encode_dir, encode_file, is_video, Converted, VIDEO_EXTENSIONS};
pub use split::{ShareSplitter, SplitMode};
