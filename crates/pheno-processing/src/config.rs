//! Configuration types for the surveillance preparation pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use crate::types::Phenotype;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the outlier threshold for a category is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    /// Tukey fence over the category's full count column:
    /// `Q3 + k * (Q3 - Q1)`, quartiles by linear interpolation.
    TukeyFence { k: f64 },
    /// A fixed, externally supplied threshold (e.g. a previously computed
    /// fence frozen by the surveillance team).
    Fixed(f64),
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::TukeyFence { k: 1.5 }
    }
}

/// How a missing category count participates in the per-row total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MissingCountPolicy {
    /// Sum the counts that are present; the total is missing only when all
    /// four counts are.
    #[default]
    TreatAsZero,
    /// Any missing count makes the row's total missing.
    Propagate,
}

/// Configuration for the preparation pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration with a
/// fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use pheno_processing::{PipelineConfig, Phenotype, ThresholdPolicy};
///
/// let config = PipelineConfig::builder()
///     .monitored(vec![Phenotype::Mrsa, Phenotype::Vrsa])
///     .category_policy(Phenotype::Vrsa, ThresholdPolicy::Fixed(2.5))
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Categories for which thresholds are computed and alerts flagged.
    /// Default: MRSA and VRSA.
    pub monitored: Vec<Phenotype>,

    /// Threshold policy applied to monitored categories without an
    /// explicit override. Default: Tukey fence with k = 1.5.
    pub default_policy: ThresholdPolicy,

    /// Per-category policy overrides.
    pub category_policies: BTreeMap<Phenotype, ThresholdPolicy>,

    /// How missing counts participate in per-row totals.
    /// Default: TreatAsZero.
    pub missing_counts: MissingCountPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            monitored: vec![Phenotype::Mrsa, Phenotype::Vrsa],
            default_policy: ThresholdPolicy::default(),
            category_policies: BTreeMap::new(),
            missing_counts: MissingCountPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// The effective threshold policy for a category.
    pub fn policy_for(&self, category: Phenotype) -> ThresholdPolicy {
        self.category_policies
            .get(&category)
            .copied()
            .unwrap_or(self.default_policy)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.monitored.is_empty() {
            return Err(ConfigValidationError::NoMonitoredCategories);
        }

        let mut seen = Vec::with_capacity(self.monitored.len());
        for category in &self.monitored {
            if seen.contains(category) {
                return Err(ConfigValidationError::DuplicateCategory(*category));
            }
            seen.push(*category);
        }

        let mut policies: Vec<ThresholdPolicy> = vec![self.default_policy];
        policies.extend(self.category_policies.values().copied());
        for policy in policies {
            match policy {
                ThresholdPolicy::TukeyFence { k } => {
                    if !k.is_finite() || k < 0.0 {
                        return Err(ConfigValidationError::InvalidFenceMultiplier(k));
                    }
                }
                ThresholdPolicy::Fixed(value) => {
                    if !value.is_finite() {
                        return Err(ConfigValidationError::InvalidFixedThreshold(value));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("No monitored categories configured")]
    NoMonitoredCategories,

    #[error("Category '{0}' listed more than once in monitored categories")]
    DuplicateCategory(Phenotype),

    #[error("Invalid Tukey fence multiplier: {0} (must be finite and non-negative)")]
    InvalidFenceMultiplier(f64),

    #[error("Invalid fixed threshold: {0} (must be finite)")]
    InvalidFixedThreshold(f64),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    monitored: Option<Vec<Phenotype>>,
    default_policy: Option<ThresholdPolicy>,
    category_policies: BTreeMap<Phenotype, ThresholdPolicy>,
    missing_counts: Option<MissingCountPolicy>,
}

impl PipelineConfigBuilder {
    /// Replace the full set of monitored categories.
    pub fn monitored(mut self, categories: Vec<Phenotype>) -> Self {
        self.monitored = Some(categories);
        self
    }

    /// Add a single category to the monitored set.
    pub fn monitor(mut self, category: Phenotype) -> Self {
        self.monitored.get_or_insert_with(Vec::new).push(category);
        self
    }

    /// Set the default threshold policy.
    pub fn default_policy(mut self, policy: ThresholdPolicy) -> Self {
        self.default_policy = Some(policy);
        self
    }

    /// Override the threshold policy for one category.
    pub fn category_policy(mut self, category: Phenotype, policy: ThresholdPolicy) -> Self {
        self.category_policies.insert(category, policy);
        self
    }

    /// Set how missing counts participate in per-row totals.
    pub fn missing_counts(mut self, policy: MissingCountPolicy) -> Self {
        self.missing_counts = Some(policy);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            monitored: self.monitored.unwrap_or(defaults.monitored),
            default_policy: self.default_policy.unwrap_or(defaults.default_policy),
            category_policies: self.category_policies,
            missing_counts: self.missing_counts.unwrap_or(defaults.missing_counts),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.monitored, vec![Phenotype::Mrsa, Phenotype::Vrsa]);
        assert_eq!(config.default_policy, ThresholdPolicy::TukeyFence { k: 1.5 });
        assert_eq!(config.missing_counts, MissingCountPolicy::TreatAsZero);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_for_uses_override() {
        let config = PipelineConfig::builder()
            .category_policy(Phenotype::Vrsa, ThresholdPolicy::Fixed(2.5))
            .build()
            .unwrap();

        assert_eq!(
            config.policy_for(Phenotype::Vrsa),
            ThresholdPolicy::Fixed(2.5)
        );
        assert_eq!(
            config.policy_for(Phenotype::Mrsa),
            ThresholdPolicy::TukeyFence { k: 1.5 }
        );
    }

    #[test]
    fn test_builder_monitor_extends() {
        let config = PipelineConfig::builder()
            .monitor(Phenotype::Mrsa)
            .monitor(Phenotype::Wild)
            .build()
            .unwrap();
        assert_eq!(config.monitored, vec![Phenotype::Mrsa, Phenotype::Wild]);
    }

    #[test]
    fn test_validation_empty_monitored() {
        let result = PipelineConfig::builder().monitored(vec![]).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NoMonitoredCategories
        ));
    }

    #[test]
    fn test_validation_duplicate_category() {
        let result = PipelineConfig::builder()
            .monitored(vec![Phenotype::Mrsa, Phenotype::Mrsa])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::DuplicateCategory(Phenotype::Mrsa)
        ));
    }

    #[test]
    fn test_validation_negative_fence_multiplier() {
        let result = PipelineConfig::builder()
            .default_policy(ThresholdPolicy::TukeyFence { k: -1.0 })
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidFenceMultiplier(_)
        ));
    }

    #[test]
    fn test_validation_non_finite_fixed() {
        let result = PipelineConfig::builder()
            .category_policy(Phenotype::Mrsa, ThresholdPolicy::Fixed(f64::NAN))
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidFixedThreshold(_)
        ));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = PipelineConfig::builder()
            .category_policy(Phenotype::Mrsa, ThresholdPolicy::Fixed(31.875))
            .missing_counts(MissingCountPolicy::Propagate)
            .build()
            .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.monitored, config.monitored);
        assert_eq!(
            deserialized.policy_for(Phenotype::Mrsa),
            ThresholdPolicy::Fixed(31.875)
        );
        assert_eq!(deserialized.missing_counts, MissingCountPolicy::Propagate);
    }
}
