use crate::change::{Change, ChangeType};
use crate::entities::BalanceEntity;
use crate::error::ForecastWarning;
use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;

#[derive(Debug, Default)]
pub struct RebalanceOutcome {
    pub changes: Vec<Change>,
    pub warning: Option<ForecastWarning>,
}

/// Tops accounts back up to their minimum balance by pulling from sibling
/// accounts in ascending priority order.
///
/// The walk is greedy and single-pass: each sibling gives what it can (never
/// going below zero), and an account whose shortfall survives the whole list is
/// flagged `unable_to_balance` for the remainder of the run.
pub struct MinimumBalanceBalancer<'a> {
    accounts: &'a mut [BalanceEntity],
}

impl<'a> MinimumBalanceBalancer<'a> {
    pub fn new(accounts: &'a mut [BalanceEntity]) -> Self {
        Self { accounts }
    }

    pub fn enforce(&mut self, index: usize, statement_date: NaiveDate) -> RebalanceOutcome {
        let mut outcome = RebalanceOutcome::default();
        let Some(target) = self.accounts.get(index) else {
            return outcome;
        };
        if !target.kind.enforces_minimum()
            || !target.enforce_minimum_balance
            || target.unable_to_balance
            || target.balance >= target.minimum_balance
        {
            return outcome;
        }

        let target_name = target.name.clone();
        let transfer_name = format!("{}_min_balance", target_name);
        let mut delta_needed = target.minimum_balance - target.balance;

        for source_index in self.withdrawal_order(index) {
            if delta_needed <= Decimal::ZERO {
                break;
            }
            let available = self.accounts[source_index].balance;
            let transfer_amount = if available <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                available.min(delta_needed)
            };
            if transfer_amount.is_zero() {
                continue;
            }

            delta_needed -= transfer_amount;
            self.accounts[source_index].balance -= transfer_amount;
            self.accounts[index].balance += transfer_amount;

            let source_name = self.accounts[source_index].name.clone();
            debug!(
                "Moved {} from {} to {} to hold minimum balance",
                transfer_amount, source_name, target_name
            );
            outcome.changes.push(Change::new(
                ChangeType::MinimumBalance,
                transfer_name.clone(),
                transfer_amount,
                statement_date,
                target_name.clone(),
            ));
            outcome.changes.push(Change::new(
                ChangeType::MinimumBalance,
                transfer_name.clone(),
                -transfer_amount,
                statement_date,
                source_name,
            ));
        }

        if delta_needed > Decimal::ZERO {
            self.accounts[index].unable_to_balance = true;
            let warning = ForecastWarning::UnableToBalance {
                account: target_name,
                date: statement_date,
                shortfall: delta_needed,
            };
            warn!("{}", warning);
            outcome.warning = Some(warning);
        }

        outcome
    }

    /// Every other account, lowest priority value first. Ties keep list order.
    fn withdrawal_order(&self, index: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.accounts.len()).filter(|&i| i != index).collect();
        order.sort_by_key(|&i| self.accounts[i].priority);
        order
    }
}

pub fn enforce_minimum_balance(
    accounts: &mut [BalanceEntity],
    index: usize,
    statement_date: NaiveDate,
) -> RebalanceOutcome {
    MinimumBalanceBalancer::new(accounts).enforce(index, statement_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityKind;
    use crate::interest::ProfileId;
    use crate::money::Money;
    use rust_decimal_macros::dec;

    fn account(id: usize, name: &str, balance: Money, priority: u32) -> BalanceEntity {
        let mut account = BalanceEntity::new(EntityKind::Account, id, name, balance, ProfileId(0));
        account.priority = priority;
        account
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    #[test]
    fn test_pulls_in_priority_order() {
        let mut target = account(3, "Checking", dec!(0), 3);
        target.enforce_minimum_balance = true;
        target.minimum_balance = dec!(120);
        // B listed first but has the higher priority value
        let mut accounts = vec![
            target,
            account(2, "B", dec!(200), 2),
            account(1, "A", dec!(50), 1),
        ];

        let outcome = enforce_minimum_balance(&mut accounts, 0, date());
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.changes.len(), 4);

        assert_eq!(outcome.changes[0].amount, dec!(50));
        assert_eq!(outcome.changes[0].account, "Checking");
        assert_eq!(outcome.changes[1].amount, dec!(-50));
        assert_eq!(outcome.changes[1].account, "A");
        assert_eq!(outcome.changes[2].amount, dec!(70));
        assert_eq!(outcome.changes[3].amount, dec!(-70));
        assert_eq!(outcome.changes[3].account, "B");

        let total: Money = outcome.changes.iter().map(|c| c.amount).sum();
        assert_eq!(total, dec!(0));

        assert_eq!(accounts[0].balance, dec!(120));
        assert_eq!(accounts[1].balance, dec!(130));
        assert_eq!(accounts[2].balance, dec!(0));
    }

    #[test]
    fn test_skips_overdrawn_siblings() {
        let mut target = account(1, "Checking", dec!(10), 1);
        target.enforce_minimum_balance = true;
        target.minimum_balance = dec!(100);
        let mut accounts = vec![
            target,
            account(2, "Overdrawn", dec!(-40), 2),
            account(3, "Savings", dec!(500), 3),
        ];

        let outcome = enforce_minimum_balance(&mut accounts, 0, date());
        assert_eq!(outcome.changes.len(), 2);
        assert_eq!(accounts[1].balance, dec!(-40));
        assert_eq!(accounts[2].balance, dec!(410));
        assert_eq!(accounts[0].balance, dec!(100));
    }

    #[test]
    fn test_exhaustion_is_sticky() {
        let mut target = account(1, "Checking", dec!(0), 1);
        target.enforce_minimum_balance = true;
        target.minimum_balance = dec!(100);
        let mut accounts = vec![target, account(2, "Savings", dec!(30), 2)];

        let outcome = enforce_minimum_balance(&mut accounts, 0, date());
        assert_eq!(outcome.changes.len(), 2);
        assert_eq!(
            outcome.warning,
            Some(ForecastWarning::UnableToBalance {
                account: "Checking".to_string(),
                date: date(),
                shortfall: dec!(70),
            })
        );
        assert!(accounts[0].unable_to_balance);

        // fresh funds next month are ignored once the flag is set
        accounts[1].balance = dec!(1000);
        accounts[0].balance = dec!(-5);
        let outcome = enforce_minimum_balance(&mut accounts, 0, date());
        assert!(outcome.changes.is_empty());
        assert!(outcome.warning.is_none());
        assert_eq!(accounts[1].balance, dec!(1000));
    }

    #[test]
    fn test_noop_when_not_enforced_or_satisfied() {
        let mut accounts = vec![account(1, "Checking", dec!(-50), 1), account(2, "Savings", dec!(100), 2)];
        assert!(enforce_minimum_balance(&mut accounts, 0, date()).changes.is_empty());

        accounts[0].enforce_minimum_balance = true;
        accounts[0].minimum_balance = dec!(-100);
        assert!(enforce_minimum_balance(&mut accounts, 0, date()).changes.is_empty());
        assert_eq!(accounts[1].balance, dec!(100));
    }
}
