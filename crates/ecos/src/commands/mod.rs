//! Command handlers: bridge CLI args to the core and listener crates.

pub mod codec;
pub mod config_cmd;
pub mod listen;
pub mod parse;
