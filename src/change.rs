use crate::money::Money;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    #[serde(rename = "interest")]
    Interest,
    #[serde(rename = "minimum_balance")]
    MinimumBalance,
    Income,
    Expense,
    Transfer,
    #[serde(rename = "mortgage_interest")]
    MortgageInterest,
    #[serde(rename = "mortgage_equity")]
    MortgageEquity,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Interest => "interest",
            ChangeType::MinimumBalance => "minimum_balance",
            ChangeType::Income => "Income",
            ChangeType::Expense => "Expense",
            ChangeType::Transfer => "Transfer",
            ChangeType::MortgageInterest => "mortgage_interest",
            ChangeType::MortgageEquity => "mortgage_equity",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ledger row: a signed amount applied to one account on a statement date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub name: String,
    pub amount: Money,
    pub date: NaiveDate,
    pub account: String,
}

impl Change {
    pub fn new(
        change_type: ChangeType,
        name: impl Into<String>,
        amount: Money,
        date: NaiveDate,
        account: impl Into<String>,
    ) -> Self {
        Self {
            change_type,
            name: name.into(),
            amount,
            date,
            account: account.into(),
        }
    }
}
