use crate::error::{ForecastError, ForecastWarning, Result};
use crate::utils::{first_of_month, year_month_index, MonthIndex, MONTHS};
use chrono::{Datelike, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PLAN_MAJOR: u32 = 0;
pub const PLAN_MINOR: u32 = 1;

pub fn plan_version() -> String {
    format!("{PLAN_MAJOR}.{PLAN_MINOR}")
}

pub const DEFAULT_RATE: f64 = 2.0;

fn default_rate() -> f64 {
    DEFAULT_RATE
}

fn default_start_year() -> i32 {
    Utc::now().year()
}

fn default_duration() -> u32 {
    10
}

fn default_mortgage_length() -> u32 {
    30
}

fn default_mortgage_rate() -> f64 {
    5.0
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Configuration {
    #[serde(default = "default_start_year")]
    #[schemars(description = "Calendar year in which the forecast begins")]
    pub start_year: i32,

    #[serde(default)]
    #[schemars(description = "Zero-based month in which the forecast begins (0 = January, 11 = December)")]
    pub start_month: u32,

    #[serde(default = "default_duration")]
    #[schemars(description = "Length of the forecast in whole years")]
    pub duration: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            start_month: 0,
            duration: default_duration(),
        }
    }
}

impl Configuration {
    pub fn new(start_year: i32, start_month: u32, duration: u32) -> Self {
        Self {
            start_year,
            start_month,
            duration,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_month > 11 {
            return Err(ForecastError::InvalidConfiguration(format!(
                "start_month {} must be between 0 and 11",
                self.start_month
            )));
        }
        if self.duration < 1 {
            return Err(ForecastError::InvalidConfiguration(
                "duration must be at least one year".to_string(),
            ));
        }
        if self.end_index() <= self.start_index() {
            return Err(ForecastError::InvalidConfiguration(
                "plan end must fall after plan start".to_string(),
            ));
        }
        Ok(())
    }

    pub fn end_year(&self) -> i32 {
        self.start_year + self.duration as i32
    }

    pub fn end_month(&self) -> u32 {
        self.start_month
    }

    pub fn start(&self) -> Result<NaiveDate> {
        first_of_month(self.start_year, self.start_month)
    }

    pub fn end(&self) -> Result<NaiveDate> {
        first_of_month(self.end_year(), self.end_month())
    }

    pub fn start_index(&self) -> MonthIndex {
        year_month_index(self.start_year, self.start_month)
    }

    pub fn end_index(&self) -> MonthIndex {
        year_month_index(self.end_year(), self.end_month())
    }

    pub fn month_count(&self) -> usize {
        (self.end_index() - self.start_index()).max(0) as usize
    }

    pub fn display_date_range(&self) -> String {
        format!(
            "Plan configured from {}-{} to {}-{}",
            self.start_year,
            self.start_month + 1,
            self.end_year(),
            self.end_month() + 1
        )
    }

    pub fn summary(&self) -> String {
        let month = MONTHS
            .get(self.start_month as usize)
            .copied()
            .unwrap_or("?");
        format!(
            "Configuration: {} {} to {}-{} ({} Years)",
            month,
            self.start_year,
            self.end_year(),
            self.end_month() + 1,
            self.duration
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct MilestoneConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Date of the milestone. Defaults to the plan start.")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
pub enum ProfileType {
    #[default]
    Constant,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "phase_type")]
pub enum PhaseConfig {
    #[schemars(description = "A flat annual rate across the phase")]
    Constant {
        #[serde(default = "default_rate")]
        #[schemars(description = "Annual rate in percent (2.0 = 2 %/yr)")]
        rate: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<NaiveDate>,
    },

    #[schemars(description = "An annual rate ramping linearly month by month from start_rate towards end_rate")]
    Linear {
        #[serde(default = "default_rate")]
        start_rate: f64,
        #[serde(default = "default_rate")]
        end_rate: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct InterestProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub profile_type: ProfileType,

    #[serde(default)]
    #[schemars(
        description = "Ordered phases. Together they must cover every month of the plan; a phase without start/end spans the whole plan."
    )]
    pub profile_phases: Vec<PhaseConfig>,
}

/// Shared shape of accounts, assets and liabilities in the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct BalanceEntityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    #[schemars(description = "Opening balance. Liabilities are entered as the positive amount owed.")]
    pub starting_balance: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_balance: Option<f64>,

    #[serde(default, skip_serializing_if = "is_false")]
    #[schemars(
        description = "Accounts only. When true the account pulls from other accounts each month, by priority, to stay at its minimum balance."
    )]
    pub enforce_minimum_balance: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Accounts only. Lower values are drawn from first when rebalancing. Defaults to list position.")]
    pub priority: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    #[default]
    Monthly,
    #[serde(rename = "Every X Months")]
    EveryXMonths,
    Yearly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema, Default)]
pub enum DurationKind {
    #[default]
    Forever,
    #[serde(rename = "Date Range")]
    DateRange,
    #[serde(rename = "End Date Only")]
    EndDateOnly,
    #[serde(rename = "Start Date Only")]
    StartDateOnly,
    #[serde(rename = "One Time")]
    OneTime,
}

/// Shared shape of incomes, expenses and transfers in the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct TransactionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    #[schemars(description = "Positive amount per frequency period, in today's money")]
    pub amount: f64,

    #[serde(default)]
    pub frequency: Frequency,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Months between postings, used with 'Every X Months'")]
    pub month_gap: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_account: Option<String>,

    #[serde(default)]
    pub duration: DurationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Milestone whose date replaces `start`")]
    pub milestone_start: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Milestone whose date replaces `end`")]
    pub milestone_end: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Profile used to grow the amount from plan start to each posting")]
    pub interest_profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MortgageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    #[schemars(description = "Original loan amount")]
    pub starting_balance: f64,

    #[serde(default = "default_mortgage_length")]
    #[schemars(description = "Original loan length in years")]
    pub length: u32,

    #[serde(default = "default_mortgage_rate")]
    #[schemars(description = "Annual rate in percent")]
    pub rate: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liability: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_account: Option<String>,

    #[serde(default)]
    #[schemars(description = "Extra principal paid every month on top of the amortized payment")]
    pub extra_principal: f64,
}

impl Default for MortgageConfig {
    fn default() -> Self {
        Self {
            name: None,
            starting_balance: 0.0,
            length: default_mortgage_length(),
            rate: default_mortgage_rate(),
            liability: None,
            source_account: None,
            extra_principal: 0.0,
        }
    }
}

/// The declarative plan handed to the engine: every entity, cross-referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema, Default)]
pub struct PlanDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Document format version, MAJOR.MINOR")]
    pub version: Option<String>,

    #[serde(default)]
    pub configuration: Configuration,

    #[serde(default)]
    pub milestones: Vec<MilestoneConfig>,

    #[serde(default)]
    #[schemars(
        description = "Named rate curves. When empty the plan receives 'No Interest' (0 %) and 'Inflation' (2 %) profiles."
    )]
    pub interest_profiles: Vec<InterestProfileConfig>,

    #[serde(default)]
    pub assets: Vec<BalanceEntityConfig>,

    #[serde(default)]
    pub accounts: Vec<BalanceEntityConfig>,

    #[serde(default)]
    pub liabilities: Vec<BalanceEntityConfig>,

    #[serde(default)]
    pub incomes: Vec<TransactionConfig>,

    #[serde(default)]
    pub expenses: Vec<TransactionConfig>,

    #[serde(default)]
    pub transfers: Vec<TransactionConfig>,

    #[serde(default)]
    pub mortgages: Vec<MortgageConfig>,
}

/// Line separating an optional constants preamble from the plan body.
pub const CONSTANTS_SEPARATOR: &str = "\n---\n";

/// Splits plan text into its constants preamble (if any) and body.
pub fn split_constants(text: &str) -> Result<(Option<&str>, &str)> {
    let sections: Vec<&str> = text.split(CONSTANTS_SEPARATOR).collect();
    match sections.as_slice() {
        [body] => Ok((None, body)),
        [constants, body] => Ok((Some(constants), body)),
        _ => Err(ForecastError::InvalidConfiguration(format!(
            "plan has {} '---' separators, at most one is allowed",
            sections.len() - 1
        ))),
    }
}

impl PlanDocument {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads a plan that may open with a YAML block of constants and a `---`
    /// line. The body is rendered as a Jinja template against those constants
    /// before it is parsed; without a preamble this is [`Self::from_yaml`].
    pub fn from_templated_yaml(text: &str) -> Result<Self> {
        match split_constants(text)? {
            (None, body) => Self::from_yaml(body),
            (Some(constants), body) => {
                let constants: serde_yaml::Value = serde_yaml::from_str(constants)?;
                let rendered = minijinja::Environment::new().render_str(body, &constants)?;
                Self::from_yaml(&rendered)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PlanDocument)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    /// True when the document carries anything beyond a configuration block.
    pub fn is_populated(&self) -> bool {
        self.version.is_some()
            || !self.milestones.is_empty()
            || !self.interest_profiles.is_empty()
            || !self.assets.is_empty()
            || !self.accounts.is_empty()
            || !self.liabilities.is_empty()
            || !self.incomes.is_empty()
            || !self.expenses.is_empty()
            || !self.transfers.is_empty()
            || !self.mortgages.is_empty()
    }
}

/// Checks a document version against the current format. Mismatches only warn.
pub fn verify_version(version: Option<&str>) -> Option<ForecastWarning> {
    let Some(version) = version else {
        return Some(ForecastWarning::MissingVersion);
    };

    let parsed = version
        .split_once('.')
        .and_then(|(major, minor)| Some((major.parse::<u32>().ok()?, minor.parse::<u32>().ok()?)));

    match parsed {
        None => Some(ForecastWarning::MalformedVersion(version.to_string())),
        Some((major, minor)) if major != PLAN_MAJOR || minor != PLAN_MINOR => {
            Some(ForecastWarning::VersionMismatch {
                found: version.to_string(),
                expected: plan_version(),
            })
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATED: &str = r#"salary: 4200
retire: 2030-06-01
---
version: "0.1"
configuration:
  start_year: 2024
  start_month: 0
  duration: 1
accounts:
  - name: Checking
    starting_balance: 0
incomes:
  - name: Salary
    amount: {{ salary }}
    duration: End Date Only
    end: {{ retire }}
"#;

    #[test]
    fn test_templated_plan_renders_constants() {
        let document = PlanDocument::from_templated_yaml(TEMPLATED).unwrap();
        assert_eq!(document.incomes[0].amount, 4200.0);
        assert_eq!(document.incomes[0].end, NaiveDate::from_ymd_opt(2030, 6, 1));
        assert_eq!(document.accounts[0].name.as_deref(), Some("Checking"));
    }

    #[test]
    fn test_templated_plan_without_preamble_is_plain_yaml() {
        let (_, body) = split_constants(TEMPLATED).unwrap();
        let body = body
            .replace("{{ salary }}", "10")
            .replace("{{ retire }}", "2031-01-01");
        let document = PlanDocument::from_templated_yaml(&body).unwrap();
        assert_eq!(document.incomes[0].amount, 10.0);
    }

    #[test]
    fn test_templated_plan_rejects_extra_separators() {
        let text = format!("a: 1\n---\n{}", TEMPLATED);
        assert!(matches!(
            PlanDocument::from_templated_yaml(&text),
            Err(ForecastError::InvalidConfiguration(_))
        ));
        assert!(PlanDocument::from_yaml(TEMPLATED).is_err());
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = PlanDocument::schema_as_json().unwrap();
        assert!(schema_json.contains("configuration"));
        assert!(schema_json.contains("interest_profiles"));
        assert!(schema_json.contains("mortgages"));
    }

    #[test]
    fn test_configuration_bounds() {
        let config = Configuration::new(2024, 0, 1);
        assert!(config.validate().is_ok());
        assert_eq!(config.start().unwrap(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(config.end().unwrap(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(config.month_count(), 12);

        assert!(Configuration::new(2024, 12, 1).validate().is_err());
        assert!(Configuration::new(2024, 3, 0).validate().is_err());
    }

    #[test]
    fn test_yaml_document_parsing() {
        let yaml = r#"
version: '0.1'
configuration:
  start_year: 2024
  start_month: 5
  duration: 2
interest_profiles:
  - name: Ramp
    profile_type: Linear
    profile_phases:
      - phase_type: Linear
        start_rate: 1.0
        end_rate: 3.0
accounts:
  - name: Checking
    starting_balance: 1000
    enforce_minimum_balance: true
    minimum_balance: 500
expenses:
  - name: Gym
    amount: 40
    frequency: Every X Months
    month_gap: 3
    duration: One Time
    start: 2024-09-01
"#;
        let doc = PlanDocument::from_yaml(yaml).unwrap();
        assert_eq!(doc.configuration.start_month, 5);
        assert_eq!(doc.interest_profiles[0].profile_type, ProfileType::Linear);
        assert!(matches!(
            doc.interest_profiles[0].profile_phases[0],
            PhaseConfig::Linear { start_rate, end_rate, .. } if start_rate == 1.0 && end_rate == 3.0
        ));
        assert!(doc.accounts[0].enforce_minimum_balance);
        assert_eq!(doc.expenses[0].frequency, Frequency::EveryXMonths);
        assert_eq!(doc.expenses[0].duration, DurationKind::OneTime);
        assert_eq!(
            doc.expenses[0].start,
            Some(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
        );
        assert!(doc.is_populated());
    }

    #[test]
    fn test_phase_defaults() {
        let yaml = "phase_type: Constant\n";
        let phase: PhaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            phase,
            PhaseConfig::Constant {
                rate: DEFAULT_RATE,
                start: None,
                end: None
            }
        );
    }

    #[test]
    fn test_verify_version() {
        assert_eq!(verify_version(Some("0.1")), None);
        assert_eq!(verify_version(None), Some(ForecastWarning::MissingVersion));
        assert!(matches!(
            verify_version(Some("1.1")),
            Some(ForecastWarning::VersionMismatch { .. })
        ));
        assert!(matches!(
            verify_version(Some("0.0")),
            Some(ForecastWarning::VersionMismatch { .. })
        ));
        assert!(matches!(
            verify_version(Some("latest")),
            Some(ForecastWarning::MalformedVersion(_))
        ));
    }
}
