//! # Plan Forecast
//!
//! A personal financial forecasting engine: a declarative plan of accounts,
//! assets, liabilities, incomes, expenses, transfers and mortgages is stepped
//! month by month into a balance history and a transaction ledger.
//!
//! ## Core Concepts
//!
//! - **Plan Document**: the serializable description of a forecast ([`PlanDocument`]), cross-referenced by name
//! - **Plan**: the assembled aggregate ([`Plan`]) with every name resolved to a handle
//! - **Interest Profiles**: monthly rate curves built from Constant and Linear phases, used both for interest and for growing transaction amounts
//! - **Balance Entities**: accounts, assets and liabilities; liabilities are carried as negative balances
//! - **Minimum Balances**: accounts can pull from their siblings, lowest priority first, to stay above a floor
//! - **Statement Date**: every posting for a simulated month is dated the first of the following month
//!
//! ## Example
//!
//! ```rust,ignore
//! use plan_forecast::*;
//!
//! let document = PlanDocument::from_yaml(r#"
//! version: "0.1"
//! configuration:
//!   start_year: 2024
//!   start_month: 0
//!   duration: 1
//! accounts:
//!   - name: Checking
//!     starting_balance: 1000
//!     interest_profile: No Interest
//! expenses:
//!   - name: Rent
//!     amount: 1000
//!     source_account: Checking
//! "#)?;
//!
//! let forecast = ForecastProcessor::process(&document)?;
//! assert_eq!(forecast.final_balance("Checking"), Some(rust_decimal_macros::dec!(-11000)));
//! forecast.write_balance_csv(std::io::stdout())?;
//! ```

pub mod balancer;
pub mod change;
pub mod engine;
pub mod entities;
pub mod error;
pub mod interest;
pub mod money;
pub mod mortgage;
pub mod plan;
pub mod report;
pub mod schema;
pub mod transaction;
pub mod utils;

pub use balancer::{enforce_minimum_balance, MinimumBalanceBalancer, RebalanceOutcome};
pub use change::{Change, ChangeType};
pub use engine::{simulate, Simulator};
pub use entities::{AccountId, BalanceEntity, EntityKind, LiabilityId};
pub use error::{ForecastError, ForecastWarning, Result};
pub use interest::{InterestPhase, InterestProfile, PhaseRule, ProfileId, INFLATION, NO_INTEREST};
pub use money::{amortized_payment, round_money, Money};
pub use mortgage::Mortgage;
pub use plan::{Milestone, Plan};
pub use report::{BalanceRecord, Forecast, TOTAL};
pub use schema::*;
pub use transaction::{AccountRole, Transaction, TransactionKind};
pub use utils::*;

use log::{debug, info};

pub struct ForecastProcessor;

impl ForecastProcessor {
    pub fn process(document: &PlanDocument) -> Result<Forecast> {
        let mut plan = Plan::from_document(document)?;

        info!("Forecasting plan: {}", plan.configuration.summary());
        for (list, count) in plan.summary() {
            debug!("{}: {}", list, count);
        }

        let forecast = simulate(&mut plan)?;

        for warning in &forecast.warnings {
            debug!("Forecast warning: {}", warning);
        }

        Ok(forecast)
    }

    /// Runs the forecast and then checks every logged balance against the posted changes.
    pub fn process_with_verification(document: &PlanDocument) -> Result<Forecast> {
        let forecast = Self::process(document)?;

        forecast.verify_balance_continuity()?;

        Ok(forecast)
    }
}

pub fn run_forecast(document: &PlanDocument) -> Result<Forecast> {
    ForecastProcessor::process(document)
}

pub fn run_forecast_from_yaml(text: &str) -> Result<Forecast> {
    ForecastProcessor::process(&PlanDocument::from_templated_yaml(text)?)
}

pub fn process_with_verification(document: &PlanDocument) -> Result<Forecast> {
    ForecastProcessor::process_with_verification(document)
}
