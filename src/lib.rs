//! Model serving setup for the QA review bot
//!
//! Detects the GPU, picks the best model variant it can serve, and hands the
//! chosen weights over to a vLLM server with parameters tuned for the card.
//!
//! ## Main Components
//!
//! - `hardware`: GPU detection, architecture denylist, launch tuning table
//! - `catalog`: the fixed list of servable model variants
//! - `selection`: the selection policy tying them together
//! - `serving`: weight downloads, server hand-off, readiness checks
//! - `config`: paths and server settings

pub mod catalog;
pub mod config;
pub mod hardware;
pub mod selection;
pub mod serving;

pub use catalog::{Catalog, ModelVariant, MODEL_CATALOG};
pub use config::Config;
pub use hardware::{AcceleratorDescriptor, LaunchParameters};
pub use selection::{LaunchPlan, SelectionError, SelectionPolicy};

/// Library errors
pub use anyhow::{Error, Result};
