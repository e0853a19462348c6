pub mod band;
pub mod campaigns;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod execution;
pub mod io;
pub mod paths;
pub mod playbook;
pub mod policy;
pub mod processor;
pub mod risk;
pub mod score;
pub mod settings;
pub mod signals;
pub mod store;
pub mod types;
pub mod worker;

pub use error::{Result, RetentionError};
