// src/config.rs
use serde::Deserialize;

use crate::hours_aggregation::{HoursType, ReportOptions};

pub const ENV_PREFIX: &str = "SHIFTSTATS_";

/// Report defaults read from `SHIFTSTATS_*` environment variables (and `.env`).
/// Command-line flags override them per run.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub hours_type: HoursType,
    #[serde(default = "default_true")]
    pub include_breaks_hourly: bool,
    #[serde(default = "default_true")]
    pub show_break_times: bool,
    // Used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_true() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hours_type: HoursType::default(),
            include_breaks_hourly: true,
            show_break_times: true,
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenv::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env::<Config>()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            hours_type: self.hours_type,
            include_breaks_hourly: self.include_breaks_hourly,
            show_break_times: self.show_break_times,
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_vars(Vec::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.report_options(), ReportOptions::default());
    }

    #[test]
    fn prefixed_variables_are_read() {
        let config = Config::from_vars(vars(&[
            ("SHIFTSTATS_HOURS_TYPE", "previsto"),
            ("SHIFTSTATS_INCLUDE_BREAKS_HOURLY", "false"),
            ("SHIFTSTATS_SHOW_BREAK_TIMES", "false"),
            ("SHIFTSTATS_LOG_FILTER", "debug"),
            ("HOURS_TYPE", "actual"),
        ]))
        .unwrap();

        assert_eq!(config.hours_type, HoursType::Planned);
        assert!(!config.include_breaks_hourly);
        assert!(!config.show_break_times);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn planned_is_accepted_as_alias() {
        let config = Config::from_vars(vars(&[("SHIFTSTATS_HOURS_TYPE", "planned")])).unwrap();
        assert_eq!(config.hours_type, HoursType::Planned);
    }

    #[test]
    fn unknown_hours_type_is_rejected() {
        assert!(Config::from_vars(vars(&[("SHIFTSTATS_HOURS_TYPE", "weekly")])).is_err());
    }
}
