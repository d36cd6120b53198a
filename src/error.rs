use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DynamicsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid vehicle config: {0}")]
    InvalidConfig(String),

    #[error("Vehicle not found: {0}")]
    UnknownVehicle(Uuid),
}

pub type Result<T> = std::result::Result<T, DynamicsError>;
