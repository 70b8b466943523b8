#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod assemble;
pub mod cache;
pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod scoring;
pub mod server;
pub mod similarity;

mod render;
mod sources;
mod transform;
mod utils;
