use crate::schema::PeriodKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryMovementError {
    #[error("Period {0} not found")]
    MissingPeriod(PeriodKey),

    #[error("Opening balance row missing for period {0}")]
    MissingOpeningBalance(PeriodKey),

    #[error("No items available to generate movements for period {0}")]
    NoItems(PeriodKey),

    #[error("No business days in period {0}")]
    NoBusinessDays(PeriodKey),

    #[error("Invalid period {month:02}/{year}: month must be between 1 and 12")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("Invalid period format '{0}': expected MM/YYYY")]
    InvalidPeriodFormat(String),

    #[error("Monthly weight profile is invalid: {0}")]
    InvalidWeights(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Closing value mismatch for {period}: target {target:.2}, realized {realized:.2}")]
    ClosingMismatch {
        period: PeriodKey,
        target: f64,
        realized: f64,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InventoryMovementError>;
