#![forbid(unsafe_code)]

pub mod cli;
pub mod cli_def;
pub mod logging;
pub mod shells;
