pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod links;
pub mod markdown;
pub mod paths;
pub mod registry;
pub mod repair;
pub mod rules;
pub mod script;
pub mod sequence;
pub mod template;
pub mod types;
pub mod validate;
pub mod watch;

pub use error::{PdocsError, Result};
