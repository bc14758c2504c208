//! chipper: a personal music showcase for the terminal.
//!
//! Signs a listener in through an identity provider, lists curated Spotify
//! collections and drives a Spotify Connect device.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints of the local sign-in callback server
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration from environment variables and `.env`
//! - `error` - Error types per layer
//! - `identity` - Identity provider client and session events
//! - `logging` - Diagnostics setup
//! - `management` - Local session storage
//! - `player` - Playback controller and SDK abstraction
//! - `server` - Local HTTP server for sign-in callbacks
//! - `session` - Session coordinator and token supplier
//! - `spotify` - Spotify Web API clients
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod management;
pub mod player;
pub mod server;
pub mod session;
pub mod spotify;
pub mod types;
pub mod utils;

/// Result alias used by the binary layer.
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only for failures that leave nothing useful to do, such as missing
/// configuration at startup.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
