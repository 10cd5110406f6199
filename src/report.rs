use crate::change::Change;
use crate::error::{ForecastError, ForecastWarning, Result};
use crate::money::Money;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const TOTAL: &str = "TOTAL";

/// One row of the balance log: an entity's balance (or the month's total) on a statement date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub date: NaiveDate,
    pub account: String,
    /// Entity class (`Account`, `Asset`, `Liability`) or `TOTAL`.
    #[serde(rename = "type")]
    pub entity_type: String,
    pub balance: Money,
}

impl BalanceRecord {
    pub fn is_total(&self) -> bool {
        self.entity_type == TOTAL
    }
}

/// Output of one simulation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Forecast {
    pub balance_log: Vec<BalanceRecord>,
    pub transaction_log: Vec<Change>,
    #[serde(skip)]
    pub warnings: Vec<ForecastWarning>,
    pub months_assessed: usize,
    /// Entity names and balances before the first month, in log order.
    #[serde(skip)]
    pub opening_balances: Vec<(String, Money)>,
}

impl Forecast {
    pub fn new(opening_balances: Vec<(String, Money)>) -> Self {
        Self {
            opening_balances,
            ..Default::default()
        }
    }

    pub fn write_balance_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for record in &self.balance_log {
            csv_writer.serialize(record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_transaction_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for change in &self.transaction_log {
            csv_writer.serialize(change)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Balance logged for `name` in the last simulated month.
    pub fn final_balance(&self, name: &str) -> Option<Money> {
        self.balance_log
            .iter()
            .rev()
            .find(|record| record.account == name)
            .map(|record| record.balance)
    }

    pub fn balances_for(&self, name: &str) -> Vec<&BalanceRecord> {
        self.balance_log
            .iter()
            .filter(|record| record.account == name)
            .collect()
    }

    pub fn changes_for(&self, account: &str) -> Vec<&Change> {
        self.transaction_log
            .iter()
            .filter(|change| change.account == account)
            .collect()
    }

    pub fn totals(&self) -> Vec<&BalanceRecord> {
        self.balance_log.iter().filter(|r| r.is_total()).collect()
    }

    /// Checks that every logged balance equals the previous month's balance
    /// plus the changes posted to that entity in the month, and that each
    /// `TOTAL` row is the sum of its month.
    pub fn verify_balance_continuity(&self) -> Result<()> {
        let rows_per_month = self.opening_balances.len() + 1;
        let mut previous: Vec<Money> = self.opening_balances.iter().map(|(_, b)| *b).collect();

        for month in self.balance_log.chunks(rows_per_month) {
            let Some((total, entities)) = month.split_last() else {
                continue;
            };
            for (position, record) in entities.iter().enumerate() {
                let posted: Money = self
                    .transaction_log
                    .iter()
                    .filter(|c| c.date == record.date && c.account == record.account)
                    .map(|c| c.amount)
                    .sum();
                let expected = previous.get(position).copied().unwrap_or(Decimal::ZERO) + posted;
                if expected != record.balance {
                    return Err(ForecastError::BalanceDiscontinuity {
                        account: record.account.clone(),
                        date: record.date,
                        expected,
                        actual: record.balance,
                    });
                }
                if let Some(slot) = previous.get_mut(position) {
                    *slot = record.balance;
                }
            }

            let expected_total: Money = entities.iter().map(|r| r.balance).sum();
            if expected_total != total.balance {
                return Err(ForecastError::BalanceDiscontinuity {
                    account: total.account.clone(),
                    date: total.date,
                    expected: expected_total,
                    actual: total.balance,
                });
            }
        }
        Ok(())
    }
}
