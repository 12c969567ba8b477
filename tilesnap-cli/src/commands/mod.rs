//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`area`] - `--rect` / `--polygon` selection arguments
//! - [`config`] - Configuration management (init, show, path)
//! - [`export`] - Single-image export of a stored change
//! - [`inspect`] - Snapshot listing and disk usage
//! - [`manage`] - Deleting changes and setting quotas
//! - [`serve`] - Tile server for the browser map
//! - [`snapshot`] - One-off and scheduled captures

pub mod area;
pub mod config;
pub mod export;
pub mod inspect;
pub mod manage;
pub mod serve;
pub mod snapshot;
