//! Feature flags resolved per installation.
//!
//! Each flag names a calculation strategy; unknown strategy names fall back
//! to the default strategy. The control number is derived deterministically
//! from the anonymous application id, so an installation stays in the same
//! rollout cohort across restarts.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default)]
pub struct FeatureConditions {
    pub default_value: bool,
    /// Percentage ranges `[min, max)` of the control number space.
    pub perc: Vec<(f64, f64)>,
}

pub trait FlagStrategy: Send + Sync {
    fn calculate(&self, control_number: f64, conditions: &FeatureConditions) -> bool;
}

/// Static value from the flag's conditions.
struct DefaultFlagStrategy;

impl FlagStrategy for DefaultFlagStrategy {
    fn calculate(&self, _control_number: f64, conditions: &FeatureConditions) -> bool {
        conditions.default_value
    }
}

/// Percentage rollout: on when the control number falls in any `[min, max)`
/// range.
struct ControlGroupStrategy;

impl FlagStrategy for ControlGroupStrategy {
    fn calculate(&self, control_number: f64, conditions: &FeatureConditions) -> bool {
        conditions
            .perc
            .iter()
            .any(|(min, max)| control_number >= *min && control_number < *max)
    }
}

struct FeatureDef {
    name: &'static str,
    strategy: &'static str,
    conditions: FeatureConditions,
}

fn builtin_features() -> Vec<FeatureDef> {
    vec![
        FeatureDef {
            name: "insightsRecommendations",
            strategy: "default",
            conditions: FeatureConditions {
                default_value: true,
                perc: Vec::new(),
            },
        },
        FeatureDef {
            name: "liveRecommendations",
            strategy: "controlGroup",
            conditions: FeatureConditions {
                default_value: false,
                perc: vec![(0.0, 30.0)],
            },
        },
        FeatureDef {
            name: "redisDataIntegration",
            strategy: "default",
            conditions: FeatureConditions {
                default_value: true,
                perc: Vec::new(),
            },
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlInfo {
    pub control_number: f64,
    pub control_group: String,
}

pub struct FeatureFlagProvider {
    strategies: HashMap<&'static str, Box<dyn FlagStrategy>>,
    features: Vec<FeatureDef>,
    control_number: f64,
}

impl FeatureFlagProvider {
    pub fn new(anonymous_id: &str) -> Self {
        let mut strategies: HashMap<&'static str, Box<dyn FlagStrategy>> = HashMap::new();
        strategies.insert("default", Box::new(DefaultFlagStrategy));
        strategies.insert("controlGroup", Box::new(ControlGroupStrategy));

        Self {
            strategies,
            features: builtin_features(),
            control_number: control_number(anonymous_id),
        }
    }

    pub fn control_info(&self) -> ControlInfo {
        ControlInfo {
            control_number: self.control_number,
            control_group: format!("{}", self.control_number.trunc() as i64),
        }
    }

    fn strategy(&self, name: &str) -> &dyn FlagStrategy {
        self.strategies
            .get(name)
            .or_else(|| self.strategies.get("default"))
            .map(AsRef::as_ref)
            .unwrap_or(&DefaultFlagStrategy)
    }

    /// Evaluate one flag. Unknown flags are off.
    pub fn calculate(&self, name: &str) -> bool {
        self.features
            .iter()
            .find(|f| f.name == name)
            .is_some_and(|f| {
                self.strategy(f.strategy)
                    .calculate(self.control_number, &f.conditions)
            })
    }

    /// Evaluate every known flag.
    pub fn evaluate_all(&self) -> BTreeMap<String, bool> {
        self.features
            .iter()
            .map(|f| {
                (
                    f.name.to_owned(),
                    self.strategy(f.strategy)
                        .calculate(self.control_number, &f.conditions),
                )
            })
            .collect()
    }
}

/// Deterministic control number in `[0, 100)` with two decimals.
pub fn control_number(anonymous_id: &str) -> f64 {
    let digest = Sha256::digest(anonymous_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let bucket = u64::from_be_bytes(bytes) % 10_000;
    f64::from(u32::try_from(bucket).unwrap_or(0)) / 100.0
}
