//! vidpir: two-share private retrieval of video items
//!
//! Re-exports the workspace crates so integration tests and downstream users
//! can depend on a single package.

pub use share_builder;
pub use vidpir_client;
pub use vidpir_core;
pub use vidpir_server;
