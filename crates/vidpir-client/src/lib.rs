//! vidpir-client: Client side of two-share video PIR
//!
//! Builds the query vector, hands it to the share server, reconstructs the
//! item from the response and writes it out as bit-text and binary media.

pub mod client;
pub mod error;
pub mod player;
pub mod reconstructor;

pub use client::{parse_index, ClientBuilder, Phase, PirClient, RetrievalOutcome};
pub use error::{ClientError, PhaseError};
pub use reconstructor::{
    BitChunks, OutputFiles, Reconstruction, ReconstructionPath, Reconstructor, WrittenOutputs,
};
pub use vidpir_core::ReconstructionMode;
