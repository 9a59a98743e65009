// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Command-line interface definitions.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use log::debug;

use jac_common::{ChunkPolicy, PUSH_CHUNKS, SYNC_CHUNKS};

use crate::commands::{self, UploadOptions};
use crate::transport::{resolve_port, Transport, DEFAULT_BAUDRATE, DEFAULT_TIMEOUT_MS};
use crate::walk;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "jac-transfer")]
#[command(about = "Transfer files to and from a device running the jac uploader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyUSB0); auto-detected if exactly one exists
    #[arg(short, long, global = true, env = "JAC_PORT")]
    pub port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true, env = "JAC_BAUDRATE", default_value_t = DEFAULT_BAUDRATE)]
    pub baudrate: u32,

    /// Read timeout in milliseconds
    #[arg(short, long, global = true, env = "JAC_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the paced-write policy.
#[derive(Args, Debug, Clone, Copy)]
pub struct ChunkArgs {
    /// Bytes written per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Pause after each chunk in milliseconds
    #[arg(long)]
    pub chunk_delay_ms: Option<u64>,
}

impl ChunkArgs {
    fn policy(&self, default: ChunkPolicy) -> Result<ChunkPolicy> {
        let size = self.chunk_size.unwrap_or(default.size);
        let delay = self
            .chunk_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(default.delay);
        Ok(ChunkPolicy::new(size, delay)?)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replace the device contents with a local directory
    Sync {
        /// Directory to upload
        #[arg(short, long, value_name = "DIR")]
        dir: PathBuf,

        #[command(flatten)]
        chunks: ChunkArgs,

        /// Compare sizes and checksums after uploading
        #[arg(long)]
        verify: bool,
    },

    /// Reserved; does nothing yet
    Read,

    /// Upload a single file
    Push {
        /// Local file
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Name on the device
        #[arg(value_name = "TARGET")]
        target: String,

        #[command(flatten)]
        chunks: ChunkArgs,

        /// Compare size and checksum after uploading
        #[arg(long)]
        verify: bool,
    },

    /// Download a single file
    Pull {
        /// Name on the device
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Local file to write
        #[arg(value_name = "TARGET")]
        target: PathBuf,
    },

    /// List files on the device
    List {
        /// Only list entries below this remote directory
        #[arg(value_name = "PREFIX")]
        prefix: Option<String>,

        /// Also show directories, sizes and checksums
        #[arg(short, long)]
        long: bool,
    },

    /// Delete a file on the device
    Remove {
        /// Name on the device
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Show free and total storage
    Stats,
}

impl Cli {
    fn open(&self) -> Result<Transport> {
        let port = resolve_port(self.port.as_deref())?;
        Transport::open(&port, self.baudrate, self.timeout)
    }
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    debug!("{:?}", cli);

    match &cli.command {
        Commands::Sync {
            dir,
            chunks,
            verify,
        } => {
            let options = UploadOptions {
                chunks: chunks.policy(SYNC_CHUNKS)?,
                verify: *verify,
            };
            // Read everything before touching the device.
            let files = walk::collect_files(dir)?;
            commands::sync(&mut cli.open()?, &files, options)
        }
        Commands::Read => commands::read(),
        Commands::Push {
            source,
            target,
            chunks,
            verify,
        } => {
            let options = UploadOptions {
                chunks: chunks.policy(PUSH_CHUNKS)?,
                verify: *verify,
            };
            commands::push(&mut cli.open()?, source, target, options)
        }
        Commands::Pull { source, target } => commands::pull(&mut cli.open()?, source, target),
        Commands::List { prefix, long } => {
            commands::list(&mut cli.open()?, prefix.as_deref(), *long, &mut io::stdout().lock())
        }
        Commands::Remove { name } => commands::remove(&mut cli.open()?, name),
        Commands::Stats => commands::stats(&mut cli.open()?, &mut io::stdout().lock()),
    }
}
