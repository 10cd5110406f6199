use crate::entities::{AccountId, BalanceEntity, EntityKind, LiabilityId};
use crate::error::{ForecastError, ForecastWarning, Result};
use crate::interest::{InterestProfile, ProfileId};
use crate::mortgage::Mortgage;
use crate::schema::{
    plan_version, verify_version, BalanceEntityConfig, Configuration, MilestoneConfig, PlanDocument,
    TransactionConfig,
};
use crate::transaction::{AccountRole, Transaction, TransactionKind};
use crate::utils::index_to_date;
use chrono::NaiveDate;
use log::{debug, info, warn};

/// A named date that transactions can anchor their window to.
#[derive(Debug, Clone, PartialEq)]
pub struct Milestone {
    pub unique_id: usize,
    pub name: String,
    pub date: NaiveDate,
}

impl Milestone {
    fn from_config(config: &MilestoneConfig, unique_id: usize, plan_start: NaiveDate) -> Self {
        Self {
            unique_id,
            name: config
                .name
                .clone()
                .unwrap_or_else(|| format!("Milestone #{unique_id}")),
            date: config.date.unwrap_or(plan_start),
        }
    }

    fn to_config(&self) -> MilestoneConfig {
        MilestoneConfig {
            name: Some(self.name.clone()),
            date: Some(self.date),
        }
    }
}

/// Every configured entity of one forecast, with cross-references resolved to handles.
///
/// A `Plan` is built once from a [`PlanDocument`]; any name that fails to
/// resolve aborts assembly, so the simulator never meets a dangling reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub configuration: Configuration,
    pub milestones: Vec<Milestone>,
    pub interest_profiles: Vec<InterestProfile>,
    pub assets: Vec<BalanceEntity>,
    pub accounts: Vec<BalanceEntity>,
    pub liabilities: Vec<BalanceEntity>,
    pub incomes: Vec<Transaction>,
    pub expenses: Vec<Transaction>,
    pub transfers: Vec<Transaction>,
    pub mortgages: Vec<Mortgage>,
    /// Soft problems found while loading the document.
    pub warnings: Vec<ForecastWarning>,
}

impl Plan {
    pub fn from_document(document: &PlanDocument) -> Result<Self> {
        let configuration = document.configuration.clone();
        configuration.validate()?;

        let mut warnings = Vec::new();
        if document.is_populated() {
            if let Some(warning) = verify_version(document.version.as_deref()) {
                warn!("{}", warning);
                warnings.push(warning);
            }
        }

        let plan_start = configuration.start()?;
        let (start, end) = (configuration.start_index(), configuration.end_index());

        let milestones = document
            .milestones
            .iter()
            .enumerate()
            .map(|(i, config)| Milestone::from_config(config, i + 1, plan_start))
            .collect();

        let mut interest_profiles: Vec<InterestProfile> = document
            .interest_profiles
            .iter()
            .enumerate()
            .map(|(i, config)| InterestProfile::from_config(config, i + 1, start, end))
            .collect();
        if interest_profiles.is_empty() {
            interest_profiles = InterestProfile::defaults(start, end);
        }

        let mut plan = Self {
            configuration,
            milestones,
            interest_profiles,
            assets: Vec::new(),
            accounts: Vec::new(),
            liabilities: Vec::new(),
            incomes: Vec::new(),
            expenses: Vec::new(),
            transfers: Vec::new(),
            mortgages: Vec::new(),
            warnings,
        };

        plan.assets = plan.build_entities(EntityKind::Asset, &document.assets)?;
        plan.accounts = plan.build_entities(EntityKind::Account, &document.accounts)?;
        plan.liabilities = plan.build_entities(EntityKind::Liability, &document.liabilities)?;
        plan.incomes = plan.build_transactions(TransactionKind::Income, &document.incomes)?;
        plan.expenses = plan.build_transactions(TransactionKind::Expense, &document.expenses)?;
        plan.transfers = plan.build_transactions(TransactionKind::Transfer, &document.transfers)?;

        let mut mortgages = Vec::with_capacity(document.mortgages.len());
        for (i, config) in document.mortgages.iter().enumerate() {
            let unique_id = i + 1;
            let label = config
                .name
                .clone()
                .unwrap_or_else(|| format!("Mortgage #{unique_id}"));
            let liability = plan.resolve_liability(config.liability.as_deref(), &label)?;
            let source = plan.resolve_account(config.source_account.as_deref(), &label, "source account")?;
            mortgages.push(Mortgage::from_config(config, unique_id, liability, source)?);
        }
        plan.mortgages = mortgages;

        info!(
            "Assembled plan: {} accounts, {} assets, {} liabilities, {} transactions, {} mortgages",
            plan.accounts.len(),
            plan.assets.len(),
            plan.liabilities.len(),
            plan.incomes.len() + plan.expenses.len() + plan.transfers.len(),
            plan.mortgages.len()
        );
        Ok(plan)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Self::from_document(&PlanDocument::from_yaml(text)?)
    }

    fn build_entities(&self, kind: EntityKind, configs: &[BalanceEntityConfig]) -> Result<Vec<BalanceEntity>> {
        configs
            .iter()
            .enumerate()
            .map(|(i, config)| {
                let profile = self.resolve_profile(config.interest_profile.as_deref())?;
                BalanceEntity::from_config(kind, config, i + 1, profile)
            })
            .collect()
    }

    fn build_transactions(&self, kind: TransactionKind, configs: &[TransactionConfig]) -> Result<Vec<Transaction>> {
        let first_statement = index_to_date(self.configuration.start_index() + 1)?;
        let mut transactions = Vec::with_capacity(configs.len());
        for (i, config) in configs.iter().enumerate() {
            let unique_id = i + 1;
            let label = config
                .name
                .clone()
                .unwrap_or_else(|| format!("{kind} #{unique_id}"));

            let role = kind.active_account_role();
            let source = match role {
                AccountRole::Source | AccountRole::Both => {
                    Some(self.resolve_account(config.source_account.as_deref(), &label, "source account")?)
                }
                AccountRole::Destination => None,
            };
            let destination = match role {
                AccountRole::Destination | AccountRole::Both => Some(self.resolve_account(
                    config.destination_account.as_deref(),
                    &label,
                    "destination account",
                )?),
                AccountRole::Source => None,
            };
            let profile = self.resolve_profile(config.interest_profile.as_deref())?;

            let mut transaction = Transaction::from_config(kind, config, unique_id, profile, source, destination)?;
            if let Some(name) = config.milestone_start.as_deref() {
                let date = self.get_milestone(name)?.date;
                transaction.anchor_start(name, date);
            }
            if let Some(name) = config.milestone_end.as_deref() {
                let date = self.get_milestone(name)?.date;
                transaction.anchor_end(name, date);
            }
            transaction.default_one_time_date(first_statement);
            debug!(
                "{} {} resolved: monthly cost {}",
                kind,
                transaction.name,
                transaction.monthly_cost()
            );
            transactions.push(transaction);
        }
        Ok(transactions)
    }

    fn resolve_profile(&self, name: Option<&str>) -> Result<ProfileId> {
        match name {
            Some(name) => self.get_interest_profile_id(name),
            None if self.interest_profiles.is_empty() => {
                Err(ForecastError::UnknownInterestProfile("plan defines no profiles".to_string()))
            }
            None => Ok(ProfileId(0)),
        }
    }

    fn resolve_account(&self, name: Option<&str>, entity: &str, role: &str) -> Result<AccountId> {
        match name {
            Some(name) => self.get_account_id(name),
            None if self.accounts.is_empty() => Err(ForecastError::MissingAccount {
                entity: entity.to_string(),
                role: role.to_string(),
            }),
            None => Ok(AccountId(0)),
        }
    }

    fn resolve_liability(&self, name: Option<&str>, entity: &str) -> Result<LiabilityId> {
        match name {
            Some(name) => self.get_liability_id(name),
            None if self.liabilities.is_empty() => Err(ForecastError::MissingAccount {
                entity: entity.to_string(),
                role: "liability".to_string(),
            }),
            None => Ok(LiabilityId(0)),
        }
    }

    pub fn get_account_id(&self, name: &str) -> Result<AccountId> {
        self.accounts
            .iter()
            .position(|a| a.name == name)
            .map(AccountId)
            .ok_or_else(|| ForecastError::UnknownAccount(name.to_string()))
    }

    pub fn get_account(&self, name: &str) -> Result<&BalanceEntity> {
        let id = self.get_account_id(name)?;
        Ok(&self.accounts[id.0])
    }

    pub fn get_liability_id(&self, name: &str) -> Result<LiabilityId> {
        self.liabilities
            .iter()
            .position(|l| l.name == name)
            .map(LiabilityId)
            .ok_or_else(|| ForecastError::UnknownLiability(name.to_string()))
    }

    pub fn get_liability(&self, name: &str) -> Result<&BalanceEntity> {
        let id = self.get_liability_id(name)?;
        Ok(&self.liabilities[id.0])
    }

    pub fn get_interest_profile_id(&self, name: &str) -> Result<ProfileId> {
        self.interest_profiles
            .iter()
            .position(|p| p.name == name)
            .map(ProfileId)
            .ok_or_else(|| ForecastError::UnknownInterestProfile(name.to_string()))
    }

    pub fn get_interest_profile(&self, name: &str) -> Result<&InterestProfile> {
        let id = self.get_interest_profile_id(name)?;
        Ok(&self.interest_profiles[id.0])
    }

    pub fn get_milestone(&self, name: &str) -> Result<&Milestone> {
        self.milestones
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| ForecastError::UnknownMilestone(name.to_string()))
    }

    /// Accounts, then assets, then liabilities: the order balances are updated and logged.
    pub fn balance_entities(&self) -> impl Iterator<Item = &BalanceEntity> {
        self.accounts
            .iter()
            .chain(self.assets.iter())
            .chain(self.liabilities.iter())
    }

    /// Incomes, then expenses, then transfers.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.incomes
            .iter()
            .chain(self.expenses.iter())
            .chain(self.transfers.iter())
    }

    /// Restores opening balances and clears run state so the plan can be simulated again.
    pub fn reset(&mut self) {
        for entity in self
            .accounts
            .iter_mut()
            .chain(self.assets.iter_mut())
            .chain(self.liabilities.iter_mut())
        {
            entity.reset();
        }
        for transaction in self
            .incomes
            .iter_mut()
            .chain(self.expenses.iter_mut())
            .chain(self.transfers.iter_mut())
        {
            transaction.reset();
        }
    }

    /// Item count per list, in display order.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("Milestones", self.milestones.len()),
            ("Interest Profiles", self.interest_profiles.len()),
            ("Asset", self.assets.len()),
            ("Account", self.accounts.len()),
            ("Liability", self.liabilities.len()),
            ("Income", self.incomes.len()),
            ("Expense", self.expenses.len()),
            ("Transfer", self.transfers.len()),
            ("Mortgage", self.mortgages.len()),
        ]
    }

    /// Exports the plan as a document stamped with the current format version.
    pub fn to_document(&self) -> PlanDocument {
        let profile_name = |id: ProfileId| {
            self.interest_profiles
                .get(id.0)
                .map(|p| p.name.clone())
                .unwrap_or_default()
        };
        let entities = |list: &[BalanceEntity]| -> Vec<BalanceEntityConfig> {
            list.iter()
                .map(|entity| entity.to_config(&profile_name(entity.interest_profile)))
                .collect()
        };
        let transactions = |list: &[Transaction]| -> Vec<TransactionConfig> {
            list.iter()
                .map(|t| t.to_config(&self.accounts, &self.interest_profiles))
                .collect()
        };

        PlanDocument {
            version: Some(plan_version()),
            configuration: self.configuration.clone(),
            milestones: self.milestones.iter().map(Milestone::to_config).collect(),
            interest_profiles: self.interest_profiles.iter().map(InterestProfile::to_config).collect(),
            assets: entities(&self.assets),
            accounts: entities(&self.accounts),
            liabilities: entities(&self.liabilities),
            incomes: transactions(&self.incomes),
            expenses: transactions(&self.expenses),
            transfers: transactions(&self.transfers),
            mortgages: self
                .mortgages
                .iter()
                .map(|m| m.to_config(&self.liabilities, &self.accounts))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interest::{INFLATION, NO_INTEREST};
    use crate::schema::{DurationKind, Frequency};
    use rust_decimal_macros::dec;

    const PLAN: &str = r#"
version: "0.1"
configuration:
  start_year: 2024
  start_month: 0
  duration: 2
milestones:
  - name: Retire
    date: 2025-01-01
accounts:
  - name: Checking
    starting_balance: 1000
  - name: Savings
    starting_balance: 5000
    interest_profile: Inflation
liabilities:
  - name: House Loan
    starting_balance: 150000
incomes:
  - name: Salary
    amount: 4000
    duration: End Date Only
    milestone_end: Retire
expenses:
  - name: Gift
    amount: 300
    duration: One Time
    start: 2024-06-01
  - amount: 50
    frequency: Every X Months
transfers:
  - name: Sweep
    amount: 100
    source_account: Checking
    destination_account: Savings
mortgages:
  - name: House
    starting_balance: 150000
    rate: 4.5
"#;

    #[test]
    fn test_assembly_resolves_defaults() {
        let plan = Plan::from_yaml(PLAN).unwrap();
        assert!(plan.warnings.is_empty());
        assert_eq!(plan.interest_profiles.len(), 2);
        assert_eq!(plan.interest_profiles[0].name, NO_INTEREST);

        let savings = plan.get_account("Savings").unwrap();
        assert_eq!(savings.interest_profile, plan.get_interest_profile_id(INFLATION).unwrap());
        assert_eq!(savings.priority, 2);
        assert_eq!(plan.get_liability("House Loan").unwrap().balance, dec!(-150000));

        let salary = &plan.incomes[0];
        assert_eq!(salary.destination_account, Some(AccountId(0)));
        assert_eq!(salary.end, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(salary.milestone_end.as_deref(), Some("Retire"));

        let gift = &plan.expenses[0];
        assert_eq!(gift.duration, DurationKind::OneTime);
        assert_eq!(gift.start, gift.end);

        let unnamed = &plan.expenses[1];
        assert_eq!(unnamed.name, "Expense #2");
        assert_eq!(unnamed.frequency, Frequency::EveryXMonths);
        assert_eq!(unnamed.month_gap, Some(2));

        assert_eq!(plan.transfers[0].destination_account, Some(AccountId(1)));
        assert_eq!(plan.mortgages[0].liability, LiabilityId(0));
        assert_eq!(plan.mortgages[0].length, 30);
    }

    #[test]
    fn test_undated_one_time_defaults_to_first_statement() {
        let undated = PLAN.replace("    start: 2024-06-01\n", "");
        let plan = Plan::from_yaml(&undated).unwrap();
        let gift = &plan.expenses[0];
        assert_eq!(gift.start, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert_eq!(gift.end, gift.start);
    }

    #[test]
    fn test_unknown_references_fail_assembly() {
        let bad_account = PLAN.replace("destination_account: Savings", "destination_account: Brokerage");
        assert!(matches!(
            Plan::from_yaml(&bad_account),
            Err(ForecastError::UnknownAccount(name)) if name == "Brokerage"
        ));

        let bad_milestone = PLAN.replace("milestone_end: Retire", "milestone_end: Sabbatical");
        assert!(matches!(
            Plan::from_yaml(&bad_milestone),
            Err(ForecastError::UnknownMilestone(_))
        ));

        let bad_profile = PLAN.replace("interest_profile: Inflation", "interest_profile: Stocks");
        assert!(matches!(
            Plan::from_yaml(&bad_profile),
            Err(ForecastError::UnknownInterestProfile(_))
        ));
    }

    #[test]
    fn test_mortgage_without_liability_is_missing_account() {
        let document = PlanDocument {
            version: Some(plan_version()),
            configuration: Configuration::new(2024, 0, 1),
            accounts: vec![BalanceEntityConfig::default()],
            mortgages: vec![Default::default()],
            ..Default::default()
        };
        assert!(matches!(
            Plan::from_document(&document),
            Err(ForecastError::MissingAccount { role, .. }) if role == "liability"
        ));
    }

    #[test]
    fn test_version_warnings_only_for_populated_documents() {
        let empty = PlanDocument {
            configuration: Configuration::new(2024, 0, 1),
            ..Default::default()
        };
        assert!(Plan::from_document(&empty).unwrap().warnings.is_empty());

        let unversioned = PlanDocument {
            accounts: vec![BalanceEntityConfig::default()],
            ..empty.clone()
        };
        assert_eq!(
            Plan::from_document(&unversioned).unwrap().warnings,
            vec![ForecastWarning::MissingVersion]
        );
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let document = PlanDocument {
            configuration: Configuration::new(2024, 12, 1),
            ..Default::default()
        };
        assert!(matches!(
            Plan::from_document(&document),
            Err(ForecastError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_export_reloads_to_same_plan() {
        let plan = Plan::from_yaml(PLAN).unwrap();
        let document = plan.to_document();
        assert_eq!(document.version.as_deref(), Some("0.1"));
        assert_eq!(document.liabilities[0].starting_balance, 150000.0);
        assert_eq!(document.expenses[0].amount, 300.0);
        assert!((document.mortgages[0].rate - 4.5).abs() < 1e-9);

        let reloaded = Plan::from_document(&document).unwrap();
        assert_eq!(reloaded.summary(), plan.summary());
        assert_eq!(reloaded.accounts, plan.accounts);
        assert_eq!(reloaded.liabilities, plan.liabilities);
        assert_eq!(reloaded.incomes[0].end, plan.incomes[0].end);
        assert_eq!(reloaded.expenses[0].start, plan.expenses[0].start);
        assert_eq!(reloaded.mortgages[0].payment(), plan.mortgages[0].payment());
    }

    #[test]
    fn test_summary_counts() {
        let plan = Plan::from_yaml(PLAN).unwrap();
        let summary = plan.summary();
        assert_eq!(summary[0], ("Milestones", 1));
        assert_eq!(summary[1], ("Interest Profiles", 2));
        assert_eq!(summary[3], ("Account", 2));
        assert_eq!(summary[6], ("Expense", 2));
        assert_eq!(summary[8], ("Mortgage", 1));
    }
}
