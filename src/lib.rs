pub mod archive;
pub mod config;
pub mod datasets;
pub mod error;
pub mod extract;
pub mod reconcile;
pub mod sink;
pub mod table;

pub use config::{Config, OutputFormat};
pub use error::{ExtractError, Result};
