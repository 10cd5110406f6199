use crate::change::{Change, ChangeType};
use crate::entities::{AccountId, BalanceEntity};
use crate::error::{ForecastError, Result};
use crate::interest::{InterestProfile, ProfileId};
use crate::money::{round_money, to_float, to_money, Money};
use crate::schema::{DurationKind, Frequency, TransactionConfig};
use crate::utils::{date_to_index, MonthIndex};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;

pub const DEFAULT_MONTH_GAP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

/// Which of a transaction's accounts a posting touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Source,
    Destination,
    Both,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
            TransactionKind::Transfer => "Transfer",
        }
    }

    pub fn active_account_role(&self) -> AccountRole {
        match self {
            TransactionKind::Income => AccountRole::Destination,
            TransactionKind::Expense => AccountRole::Source,
            TransactionKind::Transfer => AccountRole::Both,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            TransactionKind::Income => ChangeType::Income,
            TransactionKind::Expense => ChangeType::Expense,
            TransactionKind::Transfer => ChangeType::Transfer,
        }
    }

    /// Expenses are stored negative; everything else positive.
    fn signed(&self, amount: Money) -> Money {
        match self {
            TransactionKind::Expense => -amount,
            _ => amount,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Frequency {
    /// Months between postings, when postings are less frequent than monthly.
    pub fn month_gap(&self, configured: Option<u32>) -> Option<u32> {
        match self {
            Frequency::EveryXMonths => Some(configured.unwrap_or(DEFAULT_MONTH_GAP)),
            Frequency::Yearly => Some(12),
            _ => None,
        }
    }

    /// Equivalent monthly amount for sub-monthly frequencies.
    pub fn normalize(&self, amount: Money) -> Money {
        match self {
            Frequency::Daily => amount * dec!(365) / dec!(12),
            Frequency::Weekly => amount * dec!(52) / dec!(12),
            Frequency::Biweekly => amount * dec!(26) / dec!(12),
            Frequency::Monthly | Frequency::EveryXMonths | Frequency::Yearly => amount,
        }
    }
}

/// A scheduled income, expense or transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub unique_id: usize,
    pub kind: TransactionKind,
    pub name: String,
    /// Signed per kind: negative for expenses.
    pub amount: Money,
    pub frequency: Frequency,
    pub month_gap: Option<u32>,
    pub source_account: Option<AccountId>,
    pub destination_account: Option<AccountId>,
    pub duration: DurationKind,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub milestone_start: Option<String>,
    pub milestone_end: Option<String>,
    pub interest_profile: ProfileId,
    pub month_count: u32,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        unique_id: usize,
        name: impl Into<String>,
        amount: Money,
        frequency: Frequency,
        interest_profile: ProfileId,
    ) -> Self {
        Self {
            unique_id,
            kind,
            name: name.into(),
            amount: kind.signed(amount),
            frequency,
            month_gap: frequency.month_gap(None),
            source_account: None,
            destination_account: None,
            duration: DurationKind::Forever,
            start: None,
            end: None,
            milestone_start: None,
            milestone_end: None,
            interest_profile,
            month_count: 0,
        }
    }

    /// Builds from a document entry once names have been resolved to handles.
    pub fn from_config(
        kind: TransactionKind,
        config: &TransactionConfig,
        unique_id: usize,
        interest_profile: ProfileId,
        source_account: Option<AccountId>,
        destination_account: Option<AccountId>,
    ) -> Result<Self> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("{} #{}", kind, unique_id));
        let amount = round_money(to_money(config.amount)?);
        let mut transaction = Self::new(kind, unique_id, name, amount, config.frequency, interest_profile)
            .with_month_gap(config.month_gap)?
            .with_window(config.duration, config.start, config.end);
        transaction.source_account = source_account;
        transaction.destination_account = destination_account;
        Ok(transaction)
    }

    pub fn with_month_gap(mut self, configured: Option<u32>) -> Result<Self> {
        let gap = self.frequency.month_gap(configured);
        if gap == Some(0) {
            return Err(ForecastError::InvalidConfiguration(format!(
                "{} '{}' has a month gap of zero",
                self.kind, self.name
            )));
        }
        self.month_gap = gap;
        Ok(self)
    }

    /// Sets the active window. A one-time transaction ends where it starts.
    pub fn with_window(
        mut self,
        duration: DurationKind,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        self.duration = duration;
        self.start = start;
        self.end = if duration == DurationKind::OneTime {
            start
        } else {
            end
        };
        self
    }

    /// Replaces a window bound with a milestone's date, keeping the reference.
    pub fn anchor_start(&mut self, milestone: &str, date: NaiveDate) {
        self.milestone_start = Some(milestone.to_string());
        self.start = Some(date);
        if self.duration == DurationKind::OneTime {
            self.end = Some(date);
        }
    }

    /// Dates an undated one-time transaction, leaving dated ones alone.
    pub fn default_one_time_date(&mut self, date: NaiveDate) {
        if self.duration == DurationKind::OneTime && self.start.is_none() {
            self.start = Some(date);
            self.end = Some(date);
        }
    }

    pub fn anchor_end(&mut self, milestone: &str, date: NaiveDate) {
        self.milestone_end = Some(milestone.to_string());
        self.end = Some(date);
    }

    pub fn to_config(&self, accounts: &[BalanceEntity], profiles: &[InterestProfile]) -> TransactionConfig {
        let account_name =
            |id: Option<AccountId>| id.and_then(|id| accounts.get(id.0)).map(|a| a.name.clone());
        TransactionConfig {
            name: Some(self.name.clone()),
            amount: to_float(self.display_amount()),
            frequency: self.frequency,
            month_gap: match self.frequency {
                Frequency::EveryXMonths => self.month_gap,
                _ => None,
            },
            source_account: account_name(self.source_account),
            destination_account: account_name(self.destination_account),
            duration: self.duration,
            start: self.start.filter(|_| self.milestone_start.is_none()),
            end: self
                .end
                .filter(|_| self.milestone_end.is_none() && self.duration != DurationKind::OneTime),
            milestone_start: self.milestone_start.clone(),
            milestone_end: self.milestone_end.clone(),
            interest_profile: profiles.get(self.interest_profile.0).map(|p| p.name.clone()),
        }
    }

    pub fn display_amount(&self) -> Money {
        self.amount.abs()
    }

    /// Base amount per month before growth, signed.
    pub fn monthly_amount(&self) -> Money {
        self.frequency.normalize(self.amount)
    }

    /// Average monthly effect, spreading multi-month postings over their gap.
    pub fn monthly_cost(&self) -> Money {
        match self.month_gap {
            Some(gap) if gap > 0 => round_money(self.monthly_amount() / Decimal::from(gap)),
            _ => round_money(self.monthly_amount()),
        }
    }

    pub fn start_index(&self) -> Option<MonthIndex> {
        self.start.map(date_to_index)
    }

    pub fn end_index(&self) -> Option<MonthIndex> {
        self.end.map(date_to_index)
    }

    /// True when `index` falls inside the active window (bounds inclusive).
    pub fn date_pass(&self, index: MonthIndex) -> bool {
        let after_start = self.start_index().map_or(true, |start| index >= start);
        let before_end = self.end_index().map_or(true, |end| index <= end);
        after_start && before_end
    }

    /// Counts an active month and reports whether this one posts.
    fn frequency_gate(&mut self) -> bool {
        self.month_count += 1;
        match self.month_gap {
            Some(gap) if self.month_count < gap => false,
            _ => {
                self.month_count = 0;
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.month_count = 0;
    }

    pub fn update(
        &mut self,
        statement_date: NaiveDate,
        period_index: usize,
        profiles: &[InterestProfile],
        accounts: &mut [BalanceEntity],
    ) -> Result<Vec<Change>> {
        if !self.date_pass(date_to_index(statement_date)) {
            return Ok(Vec::new());
        }
        if !self.frequency_gate() {
            return Ok(Vec::new());
        }

        let profile = profiles.get(self.interest_profile.0).ok_or_else(|| {
            ForecastError::UnknownInterestProfile(format!("#{} for {}", self.interest_profile.0, self.name))
        })?;
        let amount = profile.calculate_future_value(self.monthly_amount(), period_index)?;
        debug!("{} {} posts {} on {}", self.kind, self.name, amount, statement_date);

        let change_type = self.kind.change_type();
        match self.kind.active_account_role() {
            AccountRole::Destination => {
                let account = self.account_mut(accounts, self.destination_account)?;
                account.balance += amount;
                Ok(vec![Change::new(
                    change_type,
                    self.name.clone(),
                    amount,
                    statement_date,
                    account.name.clone(),
                )])
            }
            AccountRole::Source => {
                let account = self.account_mut(accounts, self.source_account)?;
                account.balance += amount;
                Ok(vec![Change::new(
                    change_type,
                    self.name.clone(),
                    amount,
                    statement_date,
                    account.name.clone(),
                )])
            }
            AccountRole::Both => {
                let source = self.account_mut(accounts, self.source_account)?;
                source.balance -= amount;
                let source_name = source.name.clone();
                let destination = self.account_mut(accounts, self.destination_account)?;
                destination.balance += amount;
                Ok(vec![
                    Change::new(
                        change_type,
                        self.name.clone(),
                        -amount,
                        statement_date,
                        source_name,
                    ),
                    Change::new(
                        change_type,
                        self.name.clone(),
                        amount,
                        statement_date,
                        destination.name.clone(),
                    ),
                ])
            }
        }
    }

    fn account_mut<'a>(
        &self,
        accounts: &'a mut [BalanceEntity],
        id: Option<AccountId>,
    ) -> Result<&'a mut BalanceEntity> {
        id.and_then(|id| accounts.get_mut(id.0))
            .ok_or_else(|| ForecastError::UnknownAccount(format!("referenced by {} {}", self.kind, self.name)))
    }
}
