use crate::error::{ForecastError, Result};
use crate::money::{to_float, to_money_rounded, Money};
use crate::schema::{InterestProfileConfig, PhaseConfig, ProfileType};
use crate::utils::{date_to_index, yearly_percentage_to_monthly, MonthIndex};
use chrono::NaiveDate;

pub const NO_INTEREST: &str = "No Interest";
pub const INFLATION: &str = "Inflation";
pub const INFLATION_RATE: f64 = 2.0;

/// Resolved reference to a profile in the plan's profile list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseRule {
    /// Annual percentage.
    Constant { rate: f64 },
    /// Annual percentages at the first month and at the phase end.
    Linear { start_rate: f64, end_rate: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterestPhase {
    pub rule: PhaseRule,
    /// Explicit bounds as configured; `None` falls back to the profile bounds.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    start_index: MonthIndex,
    end_index: MonthIndex,
}

impl InterestPhase {
    pub fn new(
        rule: PhaseRule,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        profile_start: MonthIndex,
        profile_end: MonthIndex,
    ) -> Self {
        Self {
            rule,
            start,
            end,
            start_index: start.map(date_to_index).unwrap_or(profile_start),
            end_index: end.map(date_to_index).unwrap_or(profile_end),
        }
    }

    pub fn month_count(&self) -> usize {
        (self.end_index - self.start_index).max(0) as usize
    }

    /// Monthly rates for every month in `[start, end)`.
    pub fn rates(&self) -> impl Iterator<Item = f64> + '_ {
        let count = self.month_count();
        let rule = self.rule;
        (0..count).map(move |offset| match rule {
            PhaseRule::Constant { rate } => yearly_percentage_to_monthly(rate),
            PhaseRule::Linear {
                start_rate,
                end_rate,
            } => {
                let first = yearly_percentage_to_monthly(start_rate);
                let last = yearly_percentage_to_monthly(end_rate);
                let increment = (last - first) / count as f64;
                first + offset as f64 * increment
            }
        })
    }

    fn from_config(config: &PhaseConfig, profile_start: MonthIndex, profile_end: MonthIndex) -> Self {
        match *config {
            PhaseConfig::Constant { rate, start, end } => Self::new(
                PhaseRule::Constant { rate },
                start,
                end,
                profile_start,
                profile_end,
            ),
            PhaseConfig::Linear {
                start_rate,
                end_rate,
                start,
                end,
            } => Self::new(
                PhaseRule::Linear {
                    start_rate,
                    end_rate,
                },
                start,
                end,
                profile_start,
                profile_end,
            ),
        }
    }

    fn to_config(&self) -> PhaseConfig {
        match self.rule {
            PhaseRule::Constant { rate } => PhaseConfig::Constant {
                rate,
                start: self.start,
                end: self.end,
            },
            PhaseRule::Linear {
                start_rate,
                end_rate,
            } => PhaseConfig::Linear {
                start_rate,
                end_rate,
                start: self.start,
                end: self.end,
            },
        }
    }
}

/// A named monthly rate curve made of consecutive phases.
///
/// Rates are recomputed on every query; nothing is cached so edits to the
/// phases take effect immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct InterestProfile {
    pub name: String,
    pub profile_type: ProfileType,
    pub phases: Vec<InterestPhase>,
}

impl InterestProfile {
    pub fn from_config(
        config: &InterestProfileConfig,
        unique_id: usize,
        start: MonthIndex,
        end: MonthIndex,
    ) -> Self {
        Self {
            name: config
                .name
                .clone()
                .unwrap_or_else(|| format!("Interest Profile #{unique_id}")),
            profile_type: config.profile_type,
            phases: config
                .profile_phases
                .iter()
                .map(|phase| InterestPhase::from_config(phase, start, end))
                .collect(),
        }
    }

    pub fn to_config(&self) -> InterestProfileConfig {
        InterestProfileConfig {
            name: Some(self.name.clone()),
            profile_type: self.profile_type,
            profile_phases: self.phases.iter().map(InterestPhase::to_config).collect(),
        }
    }

    /// Single constant phase spanning `[start, end)`.
    pub fn constant(name: &str, rate: f64, start: MonthIndex, end: MonthIndex) -> Self {
        Self {
            name: name.to_string(),
            profile_type: ProfileType::Constant,
            phases: vec![InterestPhase::new(
                PhaseRule::Constant { rate },
                None,
                None,
                start,
                end,
            )],
        }
    }

    /// The profiles every plan receives when it defines none.
    pub fn defaults(start: MonthIndex, end: MonthIndex) -> Vec<Self> {
        vec![
            Self::constant(NO_INTEREST, 0.0, start, end),
            Self::constant(INFLATION, INFLATION_RATE, start, end),
        ]
    }

    pub fn month_count(&self) -> usize {
        self.phases.iter().map(InterestPhase::month_count).sum()
    }

    pub fn rates(&self) -> impl Iterator<Item = f64> + '_ {
        self.phases.iter().flat_map(|phase| phase.rates())
    }

    pub fn get_profile(&self) -> Vec<f64> {
        self.rates().collect()
    }

    pub fn rate_at(&self, period_index: usize) -> Result<f64> {
        self.rates()
            .nth(period_index)
            .ok_or_else(|| self.malformed(period_index))
    }

    /// Monthly rate when the profile is exactly one constant phase.
    pub fn constant_rate(&self) -> Option<f64> {
        match self.phases.as_slice() {
            [InterestPhase {
                rule: PhaseRule::Constant { rate },
                ..
            }] => Some(yearly_percentage_to_monthly(*rate)),
            _ => None,
        }
    }

    /// Grows `value` through the first `period_index` monthly rates.
    ///
    /// Period 0 returns the value unchanged; rounding to the cent happens once,
    /// at the end.
    pub fn calculate_future_value(&self, value: Money, period_index: usize) -> Result<Money> {
        match self.constant_rate() {
            Some(rate) => {
                self.check_coverage(period_index)?;
                let exponent = i32::try_from(period_index).map_err(|_| self.malformed(period_index))?;
                to_money_rounded(to_float(value) * (1.0 + rate).powi(exponent))
            }
            None => self.compound_iteratively(value, period_index),
        }
    }

    pub fn compound_iteratively(&self, value: Money, period_index: usize) -> Result<Money> {
        self.check_coverage(period_index)?;
        let grown = self
            .rates()
            .take(period_index)
            .fold(to_float(value), |current, rate| current * (1.0 + rate));
        to_money_rounded(grown)
    }

    fn check_coverage(&self, period_index: usize) -> Result<()> {
        if period_index > self.month_count() {
            return Err(self.malformed(period_index));
        }
        Ok(())
    }

    fn malformed(&self, period_index: usize) -> ForecastError {
        ForecastError::MalformedProfile {
            profile: self.name.clone(),
            period_index,
            available: self.month_count(),
        }
    }
}
