//! CLI command implementations.

pub mod chips;
pub mod init;
pub mod solve;
