//! vidpir-server: Share server for two-share video PIR
//!
//! Holds both share collections and answers one-hot query vectors with the
//! masked combination `(A*r1 + B*r2) mod 2` of the selected item.

pub mod combiner;
pub mod error;
pub mod response;
pub mod server;

pub use combiner::{combine, MaskedCombiner};
pub use error::ServerError;
pub use response::ServerResponse;
pub use server::{ServerBuilder, ShareServer};
