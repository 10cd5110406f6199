use crate::change::{Change, ChangeType};
use crate::error::Result;
use crate::interest::{InterestProfile, ProfileId};
use crate::money::{round_money, to_float, to_money, Money};
use crate::schema::BalanceEntityConfig;
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved reference into the plan's account list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub usize);

/// Resolved reference into the plan's liability list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LiabilityId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    Asset,
    Liability,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::Asset => "Asset",
            EntityKind::Liability => "Liability",
        }
    }

    pub fn accrues_interest(&self) -> bool {
        true
    }

    pub fn enforces_minimum(&self) -> bool {
        matches!(self, EntityKind::Account)
    }

    pub fn is_prioritized(&self) -> bool {
        matches!(self, EntityKind::Account)
    }

    /// Liabilities are held as the negation of the amount owed.
    pub fn is_negated(&self) -> bool {
        matches!(self, EntityKind::Liability)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account, asset or liability carrying a balance through the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEntity {
    pub unique_id: usize,
    pub kind: EntityKind,
    pub name: String,
    /// Internal signed opening balance (negative for liabilities).
    pub starting_balance: Money,
    pub balance: Money,
    pub interest_profile: ProfileId,
    pub minimum_balance: Money,
    pub enforce_minimum_balance: bool,
    pub priority: u32,
    /// Set once rebalancing has failed; the entity stops trying for the rest of the run.
    pub unable_to_balance: bool,
}

impl BalanceEntity {
    pub fn new(
        kind: EntityKind,
        unique_id: usize,
        name: impl Into<String>,
        starting_balance: Money,
        interest_profile: ProfileId,
    ) -> Self {
        let starting_balance = if kind.is_negated() {
            -starting_balance
        } else {
            starting_balance
        };
        Self {
            unique_id,
            kind,
            name: name.into(),
            starting_balance,
            balance: starting_balance,
            interest_profile,
            minimum_balance: Decimal::ZERO,
            enforce_minimum_balance: false,
            priority: unique_id as u32,
            unable_to_balance: false,
        }
    }

    pub fn from_config(
        kind: EntityKind,
        config: &BalanceEntityConfig,
        unique_id: usize,
        interest_profile: ProfileId,
    ) -> Result<Self> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("{} #{}", kind, unique_id));
        let mut entity = Self::new(
            kind,
            unique_id,
            name,
            round_money(to_money(config.starting_balance)?),
            interest_profile,
        );
        entity.minimum_balance = round_money(to_money(config.minimum_balance.unwrap_or(0.0))?);
        entity.enforce_minimum_balance = kind.enforces_minimum() && config.enforce_minimum_balance;
        if kind.is_prioritized() {
            entity.priority = config.priority.unwrap_or(unique_id as u32);
        }
        Ok(entity)
    }

    pub fn to_config(&self, interest_profile: &str) -> BalanceEntityConfig {
        BalanceEntityConfig {
            name: Some(self.name.clone()),
            starting_balance: to_float(self.display_starting_balance()),
            interest_profile: Some(interest_profile.to_string()),
            minimum_balance: self
                .enforce_minimum_balance
                .then(|| to_float(self.minimum_balance)),
            enforce_minimum_balance: self.enforce_minimum_balance,
            priority: self.kind.is_prioritized().then_some(self.priority),
        }
    }

    pub fn display_starting_balance(&self) -> Money {
        self.to_display(self.starting_balance)
    }

    /// Balance as a person reads it: liabilities shown as positive debt.
    pub fn display_balance(&self) -> Money {
        self.to_display(self.balance)
    }

    fn to_display(&self, value: Money) -> Money {
        if self.kind.is_negated() {
            -value
        } else {
            value
        }
    }

    pub fn reset(&mut self) {
        self.balance = self.starting_balance;
        self.unable_to_balance = false;
    }

    /// Applies this month's interest. Non-positive interest is dropped, never posted.
    pub fn accrue_interest(
        &mut self,
        statement_date: NaiveDate,
        period_index: usize,
        profile: &InterestProfile,
    ) -> Result<Option<Change>> {
        if !self.kind.accrues_interest() {
            return Ok(None);
        }
        let rate = profile.rate_at(period_index)?;
        let update_amount = round_money(to_money(rate * to_float(self.balance))?);
        if update_amount <= Decimal::ZERO {
            return Ok(None);
        }

        self.balance += update_amount;
        debug!(
            "{} {} accrued {} interest on {}",
            self.kind, self.name, update_amount, statement_date
        );
        Ok(Some(Change::new(
            ChangeType::Interest,
            format!("{}_interest", self.name),
            update_amount,
            statement_date,
            self.name.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::year_month_index;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    fn profile(rate: f64) -> InterestProfile {
        InterestProfile::constant("Test", rate, year_month_index(2024, 0), year_month_index(2025, 0))
    }

    #[test]
    fn test_interest_accrues_on_positive_balance() {
        let mut savings =
            BalanceEntity::new(EntityKind::Account, 1, "Savings", dec!(1200), ProfileId(0));
        let change = savings
            .accrue_interest(date(), 0, &profile(12.0))
            .unwrap()
            .unwrap();
        assert_eq!(change.amount, dec!(12));
        assert_eq!(change.change_type, ChangeType::Interest);
        assert_eq!(change.name, "Savings_interest");
        assert_eq!(savings.balance, dec!(1212));
    }

    #[test]
    fn test_negative_interest_is_dropped() {
        let mut loan =
            BalanceEntity::new(EntityKind::Liability, 1, "Loan", dec!(5000), ProfileId(0));
        assert_eq!(loan.balance, dec!(-5000));
        assert_eq!(loan.display_balance(), dec!(5000));

        let change = loan.accrue_interest(date(), 3, &profile(6.0)).unwrap();
        assert!(change.is_none());
        assert_eq!(loan.balance, dec!(-5000));
    }

    #[test]
    fn test_interest_below_half_cent_rounds_away() {
        let mut tiny = BalanceEntity::new(EntityKind::Asset, 1, "Coins", dec!(0.40), ProfileId(0));
        assert!(tiny.accrue_interest(date(), 0, &profile(12.0)).unwrap().is_none());
        assert_eq!(tiny.balance, dec!(0.40));
    }

    #[test]
    fn test_config_defaults() {
        let config = BalanceEntityConfig {
            starting_balance: 250.0,
            enforce_minimum_balance: true,
            minimum_balance: Some(100.0),
            ..Default::default()
        };
        let account = BalanceEntity::from_config(EntityKind::Account, &config, 2, ProfileId(0)).unwrap();
        assert_eq!(account.name, "Account #2");
        assert_eq!(account.priority, 2);
        assert!(account.enforce_minimum_balance);

        let asset = BalanceEntity::from_config(EntityKind::Asset, &config, 1, ProfileId(0)).unwrap();
        assert_eq!(asset.name, "Asset #1");
        assert!(!asset.enforce_minimum_balance);
    }

    #[test]
    fn test_reset_restores_opening_state() {
        let mut account =
            BalanceEntity::new(EntityKind::Account, 1, "Checking", dec!(100), ProfileId(0));
        account.balance = dec!(-20);
        account.unable_to_balance = true;
        account.reset();
        assert_eq!(account.balance, dec!(100));
        assert!(!account.unable_to_balance);
    }
}
