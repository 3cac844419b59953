use anstyle::AnsiColor;
use clap::builder::styling::Styles;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Config, DEF_PORT, DEF_TIMEOUT_MS, DEF_WINDOW_SIZE, MAX_WINDOW_SIZE};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Cyan.on_default())
    .placeholder(AnsiColor::Red.on_default());

#[derive(Parser, Debug)]
#[command(name = "srftp")]
#[command(about = "Reliable file transfer over UDP", long_about = None)]
#[command(styles = STYLES)]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Receive files until interrupted
    Receive {
        /// Listen ip
        #[arg(short, long, default_value = "0.0.0.0")]
        ip: IpAddr,

        /// Listen port
        #[arg(short, long, default_value_t = DEF_PORT)]
        port: u16,

        /// Work directory
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Window size (packets, power of two), must match the sender
        #[arg(short, long, default_value_t = DEF_WINDOW_SIZE, value_parser = window_size)]
        window: usize,
    },
    /// Send files interactively with `put <file>`, leave with `exit`
    Send {
        /// Receiver ip
        ip: IpAddr,

        /// Receiver port
        port: u16,

        /// Retransmission timeout (ms)
        #[arg(short, long, default_value_t = DEF_TIMEOUT_MS)]
        timeout: u64,

        /// Window size (packets, power of two), must match the receiver
        #[arg(short, long, default_value_t = DEF_WINDOW_SIZE, value_parser = window_size)]
        window: usize,
    },
}

impl Cli {
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        match self.mode {
            Mode::Receive { window, .. } => config.window_size = window,
            Mode::Send {
                window, timeout, ..
            } => {
                config.window_size = window;
                config.timeout = Duration::from_millis(timeout);
            }
        }
        config
    }
}

fn window_size(s: &str) -> Result<usize, String> {
    let size: usize = s.parse().map_err(|e| format!("{e}"))?;
    if size.is_power_of_two() && size <= MAX_WINDOW_SIZE {
        Ok(size)
    } else {
        Err(format!("window size must be a power of two up to {MAX_WINDOW_SIZE}"))
    }
}
