//! Pipeline configuration.
//!
//! One immutable `PipelineConfig` value is built at startup (defaults, builder
//! methods or JSON), validated, and handed to every component at construction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Environment variable holding an inline JSON configuration document.
pub const CONFIG_ENV_VAR: &str = "ORDER_PROMISE_CONFIG";

/// Upper bound, in days, for any lead time, buffer or transit time.
pub const MAX_PLANNING_DAYS: u32 = 3650;

/// Order line priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Top tier: deterministic carrier, fastest channel.
    #[serde(rename = "PRIORITY", alias = "HIGH")]
    Urgent,
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "LOW")]
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "PRIORITY",
            Priority::Normal => "NORMAL",
            Priority::Low => "LOW",
        }
    }
}

/// Confirmation delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Email,
    Api,
    Edi,
}

impl Default for Channel {
    fn default() -> Self {
        Self::Email
    }
}

impl core::fmt::Display for Channel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Channel::Email => "EMAIL",
            Channel::Api => "API",
            Channel::Edi => "EDI",
        })
    }
}

/// A carrier and its transit-time range in days (inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierConfig {
    pub name: String,
    pub min_transit_days: u32,
    pub max_transit_days: u32,
}

impl CarrierConfig {
    pub fn new(name: impl Into<String>, min_transit_days: u32, max_transit_days: u32) -> Self {
        Self {
            name: name.into(),
            min_transit_days,
            max_transit_days,
        }
    }
}

/// Backoff strategy between dispatch attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt-1)
    Exponential,
    /// Linear backoff: base * attempt
    Linear,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // Availability
    pub allow_partial_ship: bool,
    pub consider_unconfirmed_pos: bool,
    /// Safety stock applied to inventory rows that do not report one.
    pub default_safety_stock: i64,
    pub default_lead_time_days: u32,
    pub receiving_buffer_days: u32,
    pub quality_buffer_days: u32,
    pub transit_days_default: u32,
    /// Deduct stock/PO units promised to earlier lines of the same batch.
    pub reserve_supply_across_lines: bool,

    // Scheduling
    pub carriers: Vec<CarrierConfig>,
    pub carrier_preferences: BTreeMap<Priority, Vec<String>>,
    pub carrier_blackout_dates: Vec<NaiveDate>,
    /// Seed for the per-line carrier/transit random source.
    pub schedule_seed: u64,

    // Split shipments
    pub max_splits_per_order: usize,
    pub min_split_quantity: i64,

    // Dispatch
    pub channel_preferences: BTreeMap<Priority, Channel>,
    /// Total send attempts per confirmation (first attempt included).
    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_backoff: BackoffStrategy,

    // Execution
    pub worker_threads: usize,
    pub fetch_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let carrier_preferences = BTreeMap::from([
            (Priority::Urgent, vec!["FedEx".to_string()]),
            (Priority::Normal, vec!["UPS".to_string(), "FedEx".to_string()]),
            (Priority::Low, vec!["USPS".to_string(), "DHL".to_string()]),
        ]);
        let channel_preferences = BTreeMap::from([
            (Priority::Urgent, Channel::Api),
            (Priority::Normal, Channel::Email),
            (Priority::Low, Channel::Edi),
        ]);

        Self {
            allow_partial_ship: true,
            consider_unconfirmed_pos: false,
            default_safety_stock: 10,
            default_lead_time_days: 14,
            receiving_buffer_days: 1,
            quality_buffer_days: 1,
            transit_days_default: 2,
            reserve_supply_across_lines: true,
            carriers: vec![
                CarrierConfig::new("FedEx", 1, 3),
                CarrierConfig::new("UPS", 2, 4),
                CarrierConfig::new("DHL", 1, 5),
                CarrierConfig::new("USPS", 3, 7),
            ],
            carrier_preferences,
            carrier_blackout_dates: Vec::new(),
            schedule_seed: 0x5eed,
            max_splits_per_order: 3,
            min_split_quantity: 5,
            channel_preferences,
            max_retry_attempts: 3,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 5_000,
            retry_backoff: BackoffStrategy::Exponential,
            worker_threads: 4,
            fetch_timeout_ms: 20_000,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON document; missing keys fall back to defaults.
    pub fn from_json_str(raw: &str) -> DomainResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| DomainError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from [`CONFIG_ENV_VAR`] when set, otherwise defaults.
    pub fn from_env() -> DomainResult<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(raw) => Self::from_json_str(&raw),
            Err(_) => {
                tracing::debug!(var = CONFIG_ENV_VAR, "no config override; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn with_partial_ship(mut self, allow: bool) -> Self {
        self.allow_partial_ship = allow;
        self
    }

    pub fn with_unconfirmed_pos(mut self, consider: bool) -> Self {
        self.consider_unconfirmed_pos = consider;
        self
    }

    pub fn with_buffers(mut self, receiving: u32, quality: u32, transit: u32) -> Self {
        self.receiving_buffer_days = receiving;
        self.quality_buffer_days = quality;
        self.transit_days_default = transit;
        self
    }

    pub fn with_lead_time(mut self, days: u32) -> Self {
        self.default_lead_time_days = days;
        self
    }

    pub fn with_reservations(mut self, enabled: bool) -> Self {
        self.reserve_supply_across_lines = enabled;
        self
    }

    pub fn with_split_limits(mut self, max_splits: usize, min_quantity: i64) -> Self {
        self.max_splits_per_order = max_splits;
        self.min_split_quantity = min_quantity;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.max_retry_attempts = max_attempts;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.schedule_seed = seed;
        self
    }

    pub fn with_worker_threads(mut self, workers: usize) -> Self {
        self.worker_threads = workers;
        self
    }

    pub fn with_fetch_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.fetch_timeout_ms = timeout_ms;
        self
    }

    /// Sum of the receiving, quality and default transit buffers.
    pub fn total_buffer_days(&self) -> u32 {
        self.receiving_buffer_days
            .saturating_add(self.quality_buffer_days)
            .saturating_add(self.transit_days_default)
    }

    pub fn carrier(&self, name: &str) -> Option<&CarrierConfig> {
        self.carriers.iter().find(|c| c.name == name)
    }

    /// Preferred carriers for a priority tier, falling back to NORMAL.
    pub fn carriers_for(&self, priority: Priority) -> &[String] {
        self.carrier_preferences
            .get(&priority)
            .or_else(|| self.carrier_preferences.get(&Priority::Normal))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn channel_for(&self, priority: Priority) -> Channel {
        self.channel_preferences
            .get(&priority)
            .copied()
            .unwrap_or_default()
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.carriers.is_empty() {
            return Err(DomainError::config("at least one carrier is required"));
        }
        for carrier in &self.carriers {
            check_days(&format!("carrier {} max transit", carrier.name), carrier.max_transit_days)?;
            if carrier.min_transit_days > carrier.max_transit_days {
                return Err(DomainError::config(format!(
                    "carrier {} has min transit {} > max {}",
                    carrier.name, carrier.min_transit_days, carrier.max_transit_days
                )));
            }
        }
        for (priority, names) in &self.carrier_preferences {
            if names.is_empty() {
                return Err(DomainError::config(format!(
                    "no carriers preferred for priority {}",
                    priority.as_str()
                )));
            }
            if let Some(unknown) = names.iter().find(|n| self.carrier(n).is_none()) {
                return Err(DomainError::config(format!(
                    "priority {} prefers unknown carrier {unknown}",
                    priority.as_str()
                )));
            }
        }
        if self.carriers_for(Priority::Normal).is_empty() {
            return Err(DomainError::config("NORMAL priority needs a carrier preference"));
        }
        if self.default_safety_stock < 0 {
            return Err(DomainError::config("default_safety_stock cannot be negative"));
        }
        if self.max_retry_attempts == 0 {
            return Err(DomainError::config("max_retry_attempts must be at least 1"));
        }
        if self.max_splits_per_order == 0 {
            return Err(DomainError::config("max_splits_per_order must be at least 1"));
        }
        if self.min_split_quantity < 0 {
            return Err(DomainError::config("min_split_quantity cannot be negative"));
        }
        if self.worker_threads == 0 {
            return Err(DomainError::config("worker_threads must be at least 1"));
        }
        check_days("default_lead_time_days", self.default_lead_time_days)?;
        check_days("receiving_buffer_days", self.receiving_buffer_days)?;
        check_days("quality_buffer_days", self.quality_buffer_days)?;
        check_days("transit_days_default", self.transit_days_default)?;
        Ok(())
    }
}

fn check_days(field: &str, days: u32) -> DomainResult<()> {
    if days > MAX_PLANNING_DAYS {
        return Err(DomainError::config(format!(
            "{field} of {days} days exceeds {MAX_PLANNING_DAYS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.total_buffer_days(), 4);
        assert_eq!(config.channel_for(Priority::Urgent), Channel::Api);
        assert_eq!(config.carriers_for(Priority::Urgent), ["FedEx".to_string()]);
    }

    #[test]
    fn json_overrides_merge_with_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"max_retry_attempts": 5, "channel_preferences": {"LOW": "API"}}"#,
        )
        .unwrap();
        assert_eq!(config.max_retry_attempts, 5);
        assert_eq!(config.channel_for(Priority::Low), Channel::Api);
        // Priorities missing from the map fall back to EMAIL.
        assert_eq!(config.channel_for(Priority::Normal), Channel::Email);
        assert_eq!(config.default_lead_time_days, 14);
    }

    #[test]
    fn high_is_an_alias_of_priority() {
        let p: Priority = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(p, Priority::Urgent);
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"PRIORITY\"");
    }

    #[test]
    fn unknown_preferred_carrier_is_rejected() {
        let mut config = PipelineConfig::default();
        config
            .carrier_preferences
            .insert(Priority::Low, vec!["Pigeon".to_string()]);
        assert!(matches!(config.validate(), Err(DomainError::Config(_))));
    }

    #[test]
    fn zero_retry_attempts_is_rejected() {
        let config = PipelineConfig::default().with_retry(0, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_transit_range_is_rejected() {
        let mut config = PipelineConfig::default();
        config.carriers.push(CarrierConfig::new("Slow", 9, 2));
        assert!(config.validate().is_err());
    }

    #[test]
    fn day_counts_beyond_horizon_are_rejected() {
        let config = PipelineConfig::default().with_lead_time(MAX_PLANNING_DAYS + 1);
        assert!(matches!(config.validate(), Err(DomainError::Config(_))));

        let config = PipelineConfig::default().with_buffers(u32::MAX, 0, 0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.carriers.push(CarrierConfig::new("Glacier", 1, u32::MAX));
        assert!(config.validate().is_err());

        PipelineConfig::default()
            .with_lead_time(MAX_PLANNING_DAYS)
            .validate()
            .unwrap();
    }

    #[test]
    fn buffer_total_saturates() {
        let config = PipelineConfig::default().with_buffers(u32::MAX, u32::MAX, 1);
        assert_eq!(config.total_buffer_days(), u32::MAX);
    }
}
