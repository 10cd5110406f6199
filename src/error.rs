use crate::money::Money;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown liability: {0}")]
    UnknownLiability(String),

    #[error("Unknown interest profile: {0}")]
    UnknownInterestProfile(String),

    #[error("Unknown milestone: {0}")]
    UnknownMilestone(String),

    #[error("{entity} needs a {role} but the plan defines none")]
    MissingAccount { entity: String, role: String },

    #[error("Interest profile '{profile}' has no rate for period {period_index} (phases cover {available} months)")]
    MalformedProfile {
        profile: String,
        period_index: usize,
        available: usize,
    },

    #[error("Balance of {account} on {date} is {actual}, expected {expected} from the posted changes")]
    BalanceDiscontinuity {
        account: String,
        date: NaiveDate,
        expected: Money,
        actual: Money,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Date calculation error: {0}")]
    InvalidDate(String),

    #[error("Non-finite amount: {0}")]
    NonFiniteAmount(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Conditions that degrade a run without aborting it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastWarning {
    #[error("Unable to maintain minimum balance on account {account} on {date} (short by {shortfall})")]
    UnableToBalance {
        account: String,
        date: NaiveDate,
        shortfall: Money,
    },

    #[error("Plan document does not contain a version; errors may occur, consider re-saving")]
    MissingVersion,

    #[error("Plan document version {found} does not match the latest version {expected}")]
    VersionMismatch { found: String, expected: String },

    #[error("Plan document version {0} does not have the proper format, e.g. X.Y")]
    MalformedVersion(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
