use crate::change::{Change, ChangeType};
use crate::entities::{AccountId, BalanceEntity, LiabilityId};
use crate::error::{ForecastError, Result};
use crate::money::{amortized_payment, round_money, to_float, to_money, Money, CENT};
use crate::schema::MortgageConfig;
use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;

/// Fixed-payment loan paid from an account against a liability.
#[derive(Debug, Clone, PartialEq)]
pub struct Mortgage {
    pub unique_id: usize,
    pub name: String,
    /// Original principal. Zero leaves the mortgage dormant.
    pub starting_balance: Money,
    /// Original term in years.
    pub length: u32,
    /// Monthly rate as a fraction.
    pub rate: f64,
    pub extra_principal: Money,
    pub liability: LiabilityId,
    pub source_account: AccountId,
    payment: Money,
}

impl Mortgage {
    /// `annual_rate` is a percentage, e.g. 5.0 for 5 %/yr.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unique_id: usize,
        name: impl Into<String>,
        starting_balance: Money,
        length: u32,
        annual_rate: f64,
        extra_principal: Money,
        liability: LiabilityId,
        source_account: AccountId,
    ) -> Result<Self> {
        let name = name.into();
        if length == 0 {
            return Err(ForecastError::InvalidConfiguration(format!(
                "mortgage '{name}' needs a length of at least one year"
            )));
        }
        let rate = annual_rate / 100.0 / 12.0;
        let payment = if starting_balance > Decimal::ZERO {
            amortized_payment(starting_balance, rate, length * 12)? + extra_principal
        } else {
            extra_principal
        };
        Ok(Self {
            unique_id,
            name,
            starting_balance,
            length,
            rate,
            extra_principal,
            liability,
            source_account,
            payment,
        })
    }

    pub fn from_config(
        config: &MortgageConfig,
        unique_id: usize,
        liability: LiabilityId,
        source_account: AccountId,
    ) -> Result<Self> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("Mortgage #{unique_id}"));
        Self::new(
            unique_id,
            name,
            round_money(to_money(config.starting_balance)?),
            config.length,
            config.rate,
            round_money(to_money(config.extra_principal)?),
            liability,
            source_account,
        )
    }

    pub fn to_config(&self, liabilities: &[BalanceEntity], accounts: &[BalanceEntity]) -> MortgageConfig {
        MortgageConfig {
            name: Some(self.name.clone()),
            starting_balance: to_float(self.starting_balance),
            length: self.length,
            rate: self.display_rate(),
            liability: liabilities.get(self.liability.0).map(|l| l.name.clone()),
            source_account: accounts.get(self.source_account.0).map(|a| a.name.clone()),
            extra_principal: to_float(self.extra_principal),
        }
    }

    /// Monthly payment fixed from the original terms, extra principal included.
    pub fn payment(&self) -> Money {
        self.payment
    }

    /// Annual rate in percent.
    pub fn display_rate(&self) -> f64 {
        self.rate * 12.0 * 100.0
    }

    pub fn update(
        &self,
        statement_date: NaiveDate,
        accounts: &mut [BalanceEntity],
        liabilities: &mut [BalanceEntity],
    ) -> Result<Vec<Change>> {
        if self.starting_balance <= Decimal::ZERO {
            return Ok(Vec::new());
        }
        let liability = liabilities
            .get_mut(self.liability.0)
            .ok_or_else(|| ForecastError::UnknownLiability(format!("referenced by mortgage {}", self.name)))?;
        let abs_remaining = liability.balance.abs();
        if abs_remaining <= CENT {
            return Ok(Vec::new());
        }
        let source = accounts
            .get_mut(self.source_account.0)
            .ok_or_else(|| ForecastError::UnknownAccount(format!("referenced by mortgage {}", self.name)))?;

        let closing = self.payment >= abs_remaining;
        let (interest_payment, principal_payment, total_payment) = if closing {
            (Decimal::ZERO, abs_remaining, abs_remaining)
        } else {
            let interest = round_money(to_money(to_float(abs_remaining) * self.rate)?);
            (interest, self.payment - interest, self.payment)
        };

        source.balance -= total_payment;

        let mut changes = Vec::with_capacity(3);
        if !interest_payment.is_zero() {
            changes.push(Change::new(
                ChangeType::MortgageInterest,
                self.name.clone(),
                -interest_payment,
                statement_date,
                source.name.clone(),
            ));
        }
        changes.push(Change::new(
            ChangeType::MortgageEquity,
            self.name.clone(),
            -principal_payment,
            statement_date,
            source.name.clone(),
        ));
        changes.push(Change::new(
            ChangeType::MortgageEquity,
            self.name.clone(),
            principal_payment,
            statement_date,
            liability.name.clone(),
        ));

        liability.balance += principal_payment;
        if closing {
            liability.balance = Decimal::ZERO;
            info!("Mortgage {} paid off on {}", self.name, statement_date);
        } else {
            debug!(
                "Mortgage {} paid {} interest and {} principal on {}",
                self.name, interest_payment, principal_payment, statement_date
            );
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityKind;
    use crate::interest::ProfileId;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    fn books(owed: Money) -> (Vec<BalanceEntity>, Vec<BalanceEntity>) {
        (
            vec![BalanceEntity::new(EntityKind::Account, 1, "Checking", dec!(10000), ProfileId(0))],
            vec![BalanceEntity::new(EntityKind::Liability, 1, "House Loan", owed, ProfileId(0))],
        )
    }

    fn house(principal: Money) -> Mortgage {
        Mortgage::new(1, "House", principal, 30, 6.0, dec!(0), LiabilityId(0), AccountId(0)).unwrap()
    }

    #[test]
    fn test_payment_and_rate() {
        let mortgage = house(dec!(200000));
        assert_eq!(mortgage.payment(), dec!(1199.10));
        assert!((mortgage.display_rate() - 6.0).abs() < 1e-9);

        let extra = Mortgage::new(2, "Extra", dec!(200000), 30, 6.0, dec!(100), LiabilityId(0), AccountId(0)).unwrap();
        assert_eq!(extra.payment(), dec!(1299.10));

        assert!(Mortgage::new(3, "Broken", dec!(1000), 0, 6.0, dec!(0), LiabilityId(0), AccountId(0)).is_err());
    }

    #[test]
    fn test_regular_payment_splits_interest_and_equity() {
        let (mut accounts, mut liabilities) = books(dec!(200000));
        let changes = house(dec!(200000))
            .update(date(), &mut accounts, &mut liabilities)
            .unwrap();

        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].change_type, ChangeType::MortgageInterest);
        assert_eq!(changes[0].amount, dec!(-1000));
        assert_eq!(changes[0].account, "Checking");
        assert_eq!(changes[1].amount, dec!(-199.10));
        assert_eq!(changes[2].amount, dec!(199.10));
        assert_eq!(changes[2].account, "House Loan");

        assert_eq!(accounts[0].balance, dec!(8800.90));
        assert_eq!(liabilities[0].balance, dec!(-199800.90));
    }

    #[test]
    fn test_closing_payment_zeroes_liability_and_stops() {
        let (mut accounts, mut liabilities) = books(dec!(500.005));
        let mortgage = house(dec!(200000));

        let changes = mortgage.update(date(), &mut accounts, &mut liabilities).unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.change_type == ChangeType::MortgageEquity));
        assert_eq!(changes[1].amount, dec!(500.005));
        assert_eq!(liabilities[0].balance, dec!(0));
        assert_eq!(accounts[0].balance, dec!(9499.995));

        let after = mortgage.update(date(), &mut accounts, &mut liabilities).unwrap();
        assert!(after.is_empty());
        assert_eq!(accounts[0].balance, dec!(9499.995));
    }

    #[test]
    fn test_dormant_when_unconfigured_or_below_a_cent() {
        let (mut accounts, mut liabilities) = books(dec!(1000));
        assert!(house(dec!(0))
            .update(date(), &mut accounts, &mut liabilities)
            .unwrap()
            .is_empty());

        liabilities[0].balance = dec!(-0.01);
        assert!(house(dec!(1000))
            .update(date(), &mut accounts, &mut liabilities)
            .unwrap()
            .is_empty());
        assert_eq!(accounts[0].balance, dec!(10000));
    }

    #[test]
    fn test_zero_rate_divides_evenly() {
        let mortgage = Mortgage::new(1, "Family", dec!(12000), 1, 0.0, dec!(0), LiabilityId(0), AccountId(0)).unwrap();
        assert_eq!(mortgage.payment(), dec!(1000));
        let (mut accounts, mut liabilities) = books(dec!(12000));
        let changes = mortgage.update(date(), &mut accounts, &mut liabilities).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(liabilities[0].balance, dec!(-11000));
    }
}
