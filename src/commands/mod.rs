//! CLI commands implementation

pub mod init;
pub mod rerank;
pub mod status;

pub use init::*;
pub use rerank::*;
pub use status::*;
