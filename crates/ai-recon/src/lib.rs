// region:    --- Modules

pub mod agent;
pub mod ais;
pub mod config;
mod error;
pub mod event;
mod expert;
pub mod reconcile;
pub mod store;
mod utils;

pub use self::error::{Error, Result};

pub use crate::expert::*;

// endregion: --- Modules
