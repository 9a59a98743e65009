// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! File transfer tool for the jac uploader over a serial link.
//!
//! Usage:
//!   jac-transfer sync --dir ./code
//!   jac-transfer --port /dev/ttyUSB0 push index.js index.js
//!   jac-transfer pull index.js local.js
//!   jac-transfer list --long

mod cli;
mod commands;
mod transport;
mod walk;

use anyhow::Result;
use clap::Parser;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_logging(args.verbose);
    cli::run(args)
}
