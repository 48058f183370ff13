//! Server configuration.
//!
//! Command-line flags with environment fallbacks, parsed by clap and
//! converted into a plain [`ServerConfig`].

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{Parser, ValueEnum};
use drawboard_core::{HistoryConfig, DEFAULT_CONTENTION_WINDOW_MS, DEFAULT_MAX_RETAINED};

use crate::rate_limit::{RateLimiter, DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_SUSTAINED};

/// Default port for the drawboard server.
pub const DEFAULT_PORT: u16 = 3000;

/// Default maximum number of rooms.
pub const DEFAULT_MAX_ROOMS: usize = 64;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Command-line arguments for the drawboard server.
#[derive(Debug, Clone, Parser)]
#[command(name = "drawboard")]
#[command(about = "Shared drawing canvas server with a global undo/redo timeline")]
#[command(version)]
pub struct CliArgs {
    /// Address to bind
    #[arg(long, env = "DRAWBOARD_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "DRAWBOARD_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Operations retained per room before the oldest is evicted
    #[arg(
        long,
        env = "DRAWBOARD_MAX_RETAINED",
        default_value_t = DEFAULT_MAX_RETAINED,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_retained: usize,

    /// Window in milliseconds within which operations from different users are flagged
    #[arg(
        long,
        env = "DRAWBOARD_CONTENTION_WINDOW_MS",
        default_value_t = DEFAULT_CONTENTION_WINDOW_MS
    )]
    pub contention_window_ms: u64,

    /// Maximum number of rooms
    #[arg(long, env = "DRAWBOARD_MAX_ROOMS", default_value_t = DEFAULT_MAX_ROOMS)]
    pub max_rooms: usize,

    /// WebSocket burst capacity (messages)
    #[arg(long, env = "WS_RATE_LIMIT_BURST", default_value_t = DEFAULT_RATE_LIMIT_BURST)]
    pub rate_limit_burst: u32,

    /// WebSocket sustained rate (messages per second)
    #[arg(long, env = "WS_RATE_LIMIT_SUSTAINED", default_value_t = DEFAULT_RATE_LIMIT_SUSTAINED)]
    pub rate_limit_sustained: u32,

    /// Log output format
    #[arg(long, env = "RUST_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
    /// Per-room history tunables.
    pub history: HistoryConfig,
    /// Maximum number of rooms.
    pub max_rooms: usize,
    /// WebSocket burst capacity.
    pub rate_limit_burst: u32,
    /// WebSocket sustained rate per second.
    pub rate_limit_sustained: u32,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            history: HistoryConfig::default(),
            max_rooms: DEFAULT_MAX_ROOMS,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
            rate_limit_sustained: DEFAULT_RATE_LIMIT_SUSTAINED,
            log_format: LogFormat::Text,
        }
    }

    /// Socket address to bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// A fresh rate limiter for one connection.
    #[must_use]
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.rate_limit_burst, self.rate_limit_sustained)
    }
}

impl From<CliArgs> for ServerConfig {
    fn from(args: CliArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            history: HistoryConfig {
                max_retained: args.max_retained,
                contention_window_ms: args.contention_window_ms,
            },
            max_rooms: args.max_rooms,
            rate_limit_burst: args.rate_limit_burst,
            rate_limit_sustained: args.rate_limit_sustained,
            log_format: args.log_format,
        }
    }
}
