//! CKAN → Kobo sync driver.
//!
//! Reads `config.json`, asks for confirmation, pulls the CSV resource into a
//! choice list and creates or updates the Kobo question block. `main.rs`
//! only wires the real terminal, transport and logging into `run_sync`.

pub mod args;
pub mod config;
pub mod confirm;
pub mod driver;

pub use args::Cli;
pub use config::AppConfig;
pub use confirm::{Confirm, TerminalConfirm};
pub use driver::{run_sync, SyncOptions, SyncOutcome};
