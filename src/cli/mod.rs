//! CLI module for PMP Analytics Gateway
//!
//! Subcommands:
//! - `serve`: run the HTTP gateway
//! - `generate-key`: write a fresh RSA signing key as a JWKS document

pub mod keygen;
pub mod serve;

use clap::{Parser, Subcommand};

/// PMP Analytics Gateway - credential exchange, quotas and query caching for analytics APIs
#[derive(Parser)]
#[command(name = "pmp-analytics-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP gateway
    Serve,

    /// Generate an RSA signing key as a private JWKS document
    GenerateKey(keygen::KeygenArgs),
}
