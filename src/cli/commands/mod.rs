//! CLI command implementations

pub mod index;
pub mod init;
pub mod merge;
pub mod run;
pub mod status;
pub mod validate;
