use crate::balancer::enforce_minimum_balance;
use crate::change::Change;
use crate::entities::BalanceEntity;
use crate::error::{ForecastError, Result};
use crate::interest::{InterestProfile, ProfileId};
use crate::money::Money;
use crate::plan::Plan;
use crate::report::{BalanceRecord, Forecast, TOTAL};
use crate::schema::Configuration;
use crate::utils::{index_to_date, MonthIndex};
use chrono::NaiveDate;
use log::{debug, info};

/// Steps a plan month by month from the configured start to (not including) its end.
pub struct Simulator {
    start: MonthIndex,
    end: MonthIndex,
}

impl Simulator {
    pub fn new(configuration: &Configuration) -> Self {
        Self {
            start: configuration.start_index(),
            end: configuration.end_index(),
        }
    }

    pub fn month_count(&self) -> usize {
        (self.end - self.start).max(0) as usize
    }

    /// Runs the forecast. The plan is reset first, so repeated runs agree.
    pub fn run(&self, plan: &mut Plan) -> Result<Forecast> {
        plan.reset();
        info!(
            "Simulating {} months ({})",
            self.month_count(),
            plan.configuration.display_date_range()
        );

        let opening = plan
            .balance_entities()
            .map(|entity| (entity.name.clone(), entity.balance))
            .collect();
        let mut forecast = Forecast::new(opening);
        forecast.warnings = plan.warnings.clone();

        let Plan {
            ref interest_profiles,
            ref mut accounts,
            ref mut assets,
            ref mut liabilities,
            ref mut incomes,
            ref mut expenses,
            ref mut transfers,
            ref mortgages,
            ..
        } = *plan;

        for current in self.start..self.end {
            let period_index = (current - self.start) as usize;
            let statement_date = index_to_date(current + 1)?;
            let mut changes: Vec<Change> = Vec::new();

            for index in 0..accounts.len() {
                let profile = profile_for(interest_profiles, &accounts[index])?;
                changes.extend(accounts[index].accrue_interest(statement_date, period_index, profile)?);
                let outcome = enforce_minimum_balance(accounts, index, statement_date);
                changes.extend(outcome.changes);
                forecast.warnings.extend(outcome.warning);
            }
            for entity in assets.iter_mut().chain(liabilities.iter_mut()) {
                let profile = profile_for(interest_profiles, entity)?;
                changes.extend(entity.accrue_interest(statement_date, period_index, profile)?);
            }

            for transaction in incomes
                .iter_mut()
                .chain(expenses.iter_mut())
                .chain(transfers.iter_mut())
            {
                changes.extend(transaction.update(statement_date, period_index, interest_profiles, accounts)?);
            }
            for mortgage in mortgages {
                changes.extend(mortgage.update(statement_date, accounts, liabilities)?);
            }

            debug!(
                "{}: {} changes posted in period {}",
                statement_date,
                changes.len(),
                period_index
            );
            forecast.transaction_log.extend(changes);
            snapshot(
                &mut forecast.balance_log,
                statement_date,
                accounts.iter().chain(assets.iter()).chain(liabilities.iter()),
            );
        }

        forecast.months_assessed = self.month_count();
        info!(
            "Forecast complete: {} balance rows, {} changes, {} warnings",
            forecast.balance_log.len(),
            forecast.transaction_log.len(),
            forecast.warnings.len()
        );
        Ok(forecast)
    }
}

fn profile_for<'a>(profiles: &'a [InterestProfile], entity: &BalanceEntity) -> Result<&'a InterestProfile> {
    let ProfileId(index) = entity.interest_profile;
    profiles
        .get(index)
        .ok_or_else(|| ForecastError::UnknownInterestProfile(format!("#{} for {}", index, entity.name)))
}

fn snapshot<'a>(
    log: &mut Vec<BalanceRecord>,
    statement_date: NaiveDate,
    entities: impl Iterator<Item = &'a BalanceEntity>,
) {
    let mut total = Money::ZERO;
    for entity in entities {
        total += entity.balance;
        log.push(BalanceRecord {
            date: statement_date,
            account: entity.name.clone(),
            entity_type: entity.kind.to_string(),
            balance: entity.balance,
        });
    }
    log.push(BalanceRecord {
        date: statement_date,
        account: TOTAL.to_string(),
        entity_type: TOTAL.to_string(),
        balance: total,
    });
}

/// Runs an already-assembled plan over its configured horizon.
pub fn simulate(plan: &mut Plan) -> Result<Forecast> {
    Simulator::new(&plan.configuration).run(plan)
}
