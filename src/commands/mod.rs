//! CLI command handlers

pub mod info;
pub mod init;
pub mod serve;

pub use info::run_info;
pub use init::run_init;
pub use serve::run_serve;
