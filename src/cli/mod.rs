//! Command line interface for s2mosaic.
//!
//! `args` defines the flags, `errors` the CLI error type and `runner` the
//! flow: open the product, then print its structure, export band levels or
//! compute NDI45. Applications embedding the reader should use `s2mosaic::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
