//! Centralized error type for the tagtune umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Data: {0}")]
    Data(#[from] tagtune_data::Error),

    #[error("Engine: {0}")]
    Engine(#[from] tagtune_burn::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
