//! Security policy: global defaults and per-agent overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use switchyard_config::{AgentSecurityOverride, SecurityConfig};
use switchyard_core::scanner::FailMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPolicy {
    pub enabled: bool,
    pub fail_mode: FailMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPolicy {
    pub fail_mode: FailMode,
}

/// Effective policy for one scope (global, or one agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub input: InputPolicy,
    pub output: OutputPolicy,
    /// Output policy per tool provider id
    pub providers: BTreeMap<String, OutputPolicy>,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::from_config(&SecurityConfig::default())
    }
}

impl SecurityPolicy {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            input: InputPolicy {
                enabled: config.input_enabled,
                fail_mode: config.input_fail_mode,
            },
            output: OutputPolicy {
                fail_mode: config.output_fail_mode,
            },
            providers: config
                .providers
                .iter()
                .map(|(id, p)| (id.clone(), OutputPolicy { fail_mode: p.fail_mode }))
                .collect(),
        }
    }

    /// Output fail mode for content produced by `provider`.
    pub fn output_fail_mode(&self, provider: Option<&str>) -> FailMode {
        provider
            .and_then(|id| self.providers.get(id))
            .map(|p| p.fail_mode)
            .unwrap_or(self.output.fail_mode)
    }
}

/// A partial policy. Unset fields inherit from the policy it is merged onto.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    #[serde(default)]
    pub input_enabled: Option<bool>,
    #[serde(default)]
    pub input_fail_mode: Option<FailMode>,
    #[serde(default)]
    pub output_fail_mode: Option<FailMode>,
    #[serde(default)]
    pub providers: BTreeMap<String, FailMode>,
}

impl From<&AgentSecurityOverride> for PolicyOverride {
    fn from(config: &AgentSecurityOverride) -> Self {
        Self {
            input_enabled: config.input_enabled,
            input_fail_mode: config.input_fail_mode,
            output_fail_mode: config.output_fail_mode,
            providers: config
                .providers
                .iter()
                .map(|(id, mode)| (id.clone(), *mode))
                .collect(),
        }
    }
}

/// Apply `overrides` on top of `global`, returning a new effective policy.
/// `global` is never modified.
pub fn merge_overrides(global: &SecurityPolicy, overrides: &PolicyOverride) -> SecurityPolicy {
    let mut effective = global.clone();

    if let Some(enabled) = overrides.input_enabled {
        effective.input.enabled = enabled;
    }
    if let Some(mode) = overrides.input_fail_mode {
        effective.input.fail_mode = mode;
    }
    if let Some(mode) = overrides.output_fail_mode {
        effective.output.fail_mode = mode;
    }
    for (provider, mode) in &overrides.providers {
        effective
            .providers
            .insert(provider.clone(), OutputPolicy { fail_mode: *mode });
    }

    effective
}
