//! SLA threshold strategies.
//!
//! The strategy is chosen once at startup. Production uses the rule's own
//! SLA; pilot deployments may install a fixed override measured in minutes.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use tracing::warn;

use crate::condition::{minutes_to_duration, EscalationCondition};
use crate::error::{EscalationError, Result};

/// Picks the effective SLA threshold for a rule.
pub trait ThresholdResolver: Send + Sync + fmt::Debug {
    /// Threshold for a rule with the given condition.
    fn threshold(&self, condition: &EscalationCondition) -> Duration;

    /// Check whether this resolver ignores rule-configured SLAs.
    fn is_override(&self) -> bool {
        false
    }
}

/// Uses the SLA stored on the rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleSlaThreshold;

impl ThresholdResolver for RuleSlaThreshold {
    fn threshold(&self, condition: &EscalationCondition) -> Duration {
        condition.sla()
    }
}

/// Replaces every rule's SLA with a fixed number of minutes.
#[derive(Debug, Clone, Copy)]
pub struct SlaOverrideThreshold {
    minutes: f64,
    threshold: Duration,
}

impl SlaOverrideThreshold {
    /// Create an override. `minutes` must be finite and positive.
    pub fn new(minutes: f64) -> Result<Self> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(EscalationError::Configuration(format!(
                "SLA override must be a positive number of minutes, got {minutes}"
            )));
        }
        Ok(Self {
            minutes,
            threshold: minutes_to_duration(minutes),
        })
    }

    /// Configured override in minutes.
    #[must_use]
    pub fn minutes(&self) -> f64 {
        self.minutes
    }
}

impl ThresholdResolver for SlaOverrideThreshold {
    fn threshold(&self, _condition: &EscalationCondition) -> Duration {
        self.threshold
    }

    fn is_override(&self) -> bool {
        true
    }
}

/// Build the threshold strategy for this process.
///
/// An override is logged loudly under its own target so it cannot be
/// mistaken for production configuration.
pub fn threshold_resolver(sla_override_minutes: Option<f64>) -> Result<Arc<dyn ThresholdResolver>> {
    match sla_override_minutes {
        None => Ok(Arc::new(RuleSlaThreshold)),
        Some(minutes) => {
            let resolver = SlaOverrideThreshold::new(minutes)?;
            warn!(
                target: "escalation::sla_override",
                sla_override_minutes = minutes,
                "SLA OVERRIDE ACTIVE: rule-configured SLA hours are ignored for every rule"
            );
            Ok(Arc::new(resolver))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition() -> EscalationCondition {
        EscalationCondition::parse(&json!({"sla_hours": 72})).unwrap()
    }

    #[test]
    fn test_rule_sla_threshold() {
        let resolver = threshold_resolver(None).unwrap();
        assert!(!resolver.is_override());
        assert_eq!(resolver.threshold(&condition()), Duration::hours(72));
    }

    #[test]
    fn test_override_threshold() {
        let resolver = threshold_resolver(Some(0.5)).unwrap();
        assert!(resolver.is_override());
        assert_eq!(resolver.threshold(&condition()), Duration::seconds(30));
    }

    #[test]
    fn test_override_rejects_non_positive() {
        assert!(SlaOverrideThreshold::new(0.0).is_err());
        assert!(SlaOverrideThreshold::new(-2.0).is_err());
        assert!(SlaOverrideThreshold::new(f64::NAN).is_err());
    }
}
