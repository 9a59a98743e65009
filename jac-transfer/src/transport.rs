// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Serial transport layer for the uploader line protocol.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, trace};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use jac_common::chunk::chunk_count;
use jac_common::protocol::{parse_reply, Command, Reply};
use jac_common::{chunks, ChunkPolicy};

/// Default baud rate of the uploader console.
pub const DEFAULT_BAUDRATE: u32 = 921_600;

/// Default timeout for a single serial read in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Fixed delays used around the transfer-mode handshake.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Time RTS is held low before being raised again.
    pub rts_settle: Duration,
    /// Wait after opening the port, in case the device rebooted.
    pub greeting_wait: Duration,
    /// Read timeout used while discarding the boot banner.
    pub drain_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            // Windows does not apply the line change immediately
            rts_settle: Duration::from_millis(500),
            greeting_wait: Duration::from_secs(1),
            drain_timeout: Duration::from_millis(500),
        }
    }
}

/// The parts of a serial port the transport needs.
pub trait Port: Read + Write {
    fn set_rts(&mut self, level: bool) -> io::Result<()>;
    fn timeout(&self) -> Duration;
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;
    fn name(&self) -> Option<String>;
}

impl Port for Box<dyn SerialPort> {
    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.write_request_to_send(level).map_err(io::Error::from)
    }

    fn timeout(&self) -> Duration {
        SerialPort::timeout(&**self)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        SerialPort::set_timeout(&mut **self, timeout).map_err(io::Error::from)
    }

    fn name(&self) -> Option<String> {
        SerialPort::name(&**self)
    }
}

/// Choose the port to open: the requested one, or the only one available.
pub fn select_port(requested: Option<&str>, available: &[String]) -> Result<String> {
    if let Some(port) = requested {
        return Ok(port.to_string());
    }
    match available {
        [] => bail!("No device connected"),
        [only] => Ok(only.clone()),
        _ => bail!("Multiple devices available, please choose one"),
    }
}

/// Resolve the port name, enumerating the system's serial ports if needed.
pub fn resolve_port(requested: Option<&str>) -> Result<String> {
    if let Some(port) = requested {
        return Ok(port.to_string());
    }
    let available: Vec<String> = serialport::available_ports()
        .context("Failed to enumerate serial ports")?
        .into_iter()
        .map(|p| p.port_name)
        .collect();
    debug!("available serial ports: {:?}", available);
    select_port(None, &available)
}

/// Line-oriented connection to the uploader.
pub struct Transport<P: Port = Box<dyn SerialPort>> {
    port: P,
    rx_buf: Vec<u8>,
    timing: Timing,
}

impl Transport {
    /// Open the serial port at the given baud rate.
    pub fn open(port_name: &str, baudrate: u32, timeout_ms: u64) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(timeout_ms))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;
        debug!("opened {} at {} baud", port_name, baudrate);

        Ok(Self::with_port(port, Timing::default()))
    }
}

impl<P: Port> Transport<P> {
    pub fn with_port(port: P, timing: Timing) -> Self {
        Self {
            port,
            rx_buf: Vec::with_capacity(4096),
            timing,
        }
    }

    /// Get the port name.
    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }

    #[cfg(test)]
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Pulse RTS so the firmware switches into transfer mode.
    pub fn enter_transfer_mode(&mut self) -> Result<()> {
        debug!("entering transfer mode");
        self.port.set_rts(false).context("Failed to clear RTS")?;
        thread::sleep(self.timing.rts_settle);
        self.port.set_rts(true).context("Failed to set RTS")?;
        Ok(())
    }

    /// Wait for a possible reboot and throw away its boot banner.
    pub fn wait_for_greeting(&mut self) -> Result<()> {
        thread::sleep(self.timing.greeting_wait);
        self.drain_rx()
    }

    fn drain_rx(&mut self) -> Result<()> {
        let mut buf = [0u8; 256];
        let old_timeout = self.port.timeout();
        self.port
            .set_timeout(self.timing.drain_timeout)
            .context("Failed to set timeout")?;
        let mut discarded = 0usize;
        loop {
            match self.port.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => discarded += n,
            }
        }
        if discarded > 0 {
            debug!("discarded {} stale bytes", discarded);
        }
        self.port
            .set_timeout(old_timeout)
            .context("Failed to restore timeout")?;
        Ok(())
    }

    /// Send a command in one write.
    pub fn send(&mut self, cmd: &Command) -> Result<()> {
        let line = cmd.encode();
        trace!(">> {:?}", line);
        self.port
            .write_all(line.as_bytes())
            .context("Failed to write to serial port")?;
        self.port.flush()?;
        Ok(())
    }

    /// Send a command in paced chunks, for lines too long for the device buffer.
    pub fn send_chunked(&mut self, cmd: &Command, policy: ChunkPolicy) -> Result<()> {
        let line = cmd.encode();
        let bytes = line.as_bytes();
        debug!(
            ">> {} bytes in {} chunks of {} ({:?} apart)",
            bytes.len(),
            chunk_count(bytes.len(), policy.size),
            policy.size,
            policy.delay
        );

        let pb = ProgressBar::new(bytes.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                )?
                .progress_chars("#>-"),
        );

        for chunk in chunks(bytes, policy.size)? {
            if let Err(e) = self.port.write_all(chunk) {
                pb.abandon();
                return Err(e).context("Failed to write to serial port");
            }
            self.port.flush()?;
            pb.inc(chunk.len() as u64);
            thread::sleep(policy.delay);
        }

        pb.finish_and_clear();
        Ok(())
    }

    /// Read one line, including its terminator.
    pub fn read_line(&mut self) -> Result<String> {
        self.rx_buf.clear();
        let mut byte = [0u8; 1];

        loop {
            match self.port.read(&mut byte) {
                Ok(1) => {
                    self.rx_buf.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
                Ok(0) => bail!("Serial port closed while waiting for response"),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    bail!(
                        "Timeout waiting for response ({} bytes received)",
                        self.rx_buf.len()
                    );
                }
                Err(e) => bail!("Serial read error: {}", e),
            }
        }

        let line = String::from_utf8_lossy(&self.rx_buf).into_owned();
        trace!("<< {:?}", line);
        Ok(line)
    }

    /// Read a single-line acknowledgement.
    pub fn read_reply(&mut self) -> Result<Reply> {
        let line = self.read_line()?;
        Ok(parse_reply(&line))
    }

    /// Read the acknowledgement of a PUSH or REMOVE.
    ///
    /// Failures arrive as one or more `ERROR` lines, normally followed by the
    /// closing `OK`. Some PUSH failures skip the `OK`, so a read failure after
    /// an error line also ends the reply.
    pub fn read_ack(&mut self) -> Result<Reply> {
        let mut errors = Vec::new();
        loop {
            let reply = match self.read_line() {
                Ok(line) => parse_reply(&line),
                Err(e) if !errors.is_empty() => {
                    debug!("no closing OK after device error: {:#}", e);
                    break;
                }
                Err(e) => return Err(e),
            };
            match reply {
                Reply::Error(message) => errors.push(message),
                other if errors.is_empty() => return Ok(other),
                _ => break,
            }
        }
        Ok(Reply::Error(errors.join("; ")))
    }

    /// Leave transfer mode.
    pub fn exit(&mut self) -> Result<Reply> {
        self.send(&Command::Exit)?;
        self.read_reply()
    }
}
