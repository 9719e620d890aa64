// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cluster HA and DRS configuration.

use crate::advanced::AdvancedSetting;
use crate::identity::Ensure;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// DRS advanced option backing [`DrsSpec::distribution`].
pub const DRS_OPTION_DISTRIBUTION: &str = "TryBalanceVmsPerHost";

/// DRS advanced option backing [`DrsSpec::memory_load_balancing`].
pub const DRS_OPTION_MEMORY_LOAD_BALANCING: &str = "PercentIdleMBInMemDemand";

/// DRS advanced option backing [`DrsSpec::cpu_over_commitment`].
pub const DRS_OPTION_CPU_OVER_COMMITMENT: &str = "MaxVcpusPerClusterPct";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
)]
pub enum HaIsolationResponse {
    PowerOff,
    DoNothing,
    Shutdown,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
)]
pub enum HaRestartPriority {
    Disabled,
    Low,
    Medium,
    High,
}

/// The DRS `defaultVmBehavior`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
)]
pub enum DrsAutomationLevel {
    Manual,
    PartiallyAutomated,
    FullyAutomated,
}

/// Desired HA settings. `None` fields are not managed.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct HaSpec {
    pub enabled: Option<bool>,
    pub admission_control_enabled: Option<bool>,
    pub failover_level: Option<i32>,
    pub isolation_response: Option<HaIsolationResponse>,
    pub restart_priority: Option<HaRestartPriority>,
}

impl HaSpec {
    pub fn is_empty(&self) -> bool {
        *self == HaSpec::default()
    }
}

/// Desired DRS settings. `None` fields are not managed.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct DrsSpec {
    pub enabled: Option<bool>,
    pub automation_level: Option<DrsAutomationLevel>,
    /// The `vmotionRate`, from 1 (most conservative) to 5.
    pub migration_threshold: Option<i32>,
    /// The complete set of DRS advanced options, when managed.
    pub options: Option<Vec<AdvancedSetting>>,
    pub distribution: Option<i64>,
    pub memory_load_balancing: Option<i64>,
    pub cpu_over_commitment: Option<i64>,
}

impl DrsSpec {
    pub fn is_empty(&self) -> bool {
        *self == DrsSpec::default()
    }

    /// Options this spec declares individually, by name.
    pub fn typed_options(&self) -> Vec<AdvancedSetting> {
        [
            (DRS_OPTION_DISTRIBUTION, self.distribution),
            (DRS_OPTION_MEMORY_LOAD_BALANCING, self.memory_load_balancing),
            (DRS_OPTION_CPU_OVER_COMMITMENT, self.cpu_over_commitment),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value.map(|value| AdvancedSetting::int(name, value))
        })
        .collect()
    }
}

/// Desired state of a cluster.
///
/// HA-only and DRS-only resources are expressed as a `ClusterSpec` with the
/// other block left empty and `manage_lifecycle` unset: such specs only
/// reconfigure an existing cluster and never create or remove it.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct ClusterSpec {
    #[serde(default)]
    pub ensure: Ensure,
    #[serde(default)]
    pub ha: HaSpec,
    #[serde(default)]
    pub drs: DrsSpec,
    #[serde(default = "default_manage_lifecycle")]
    pub manage_lifecycle: bool,
}

fn default_manage_lifecycle() -> bool {
    true
}

// Must agree with what an empty TOML table deserializes to.
impl Default for ClusterSpec {
    fn default() -> Self {
        Self {
            ensure: Ensure::default(),
            ha: HaSpec::default(),
            drs: DrsSpec::default(),
            manage_lifecycle: default_manage_lifecycle(),
        }
    }
}

impl ClusterSpec {
    /// A spec that manages only the HA block of an existing cluster.
    pub fn ha_only(ha: HaSpec) -> Self {
        Self {
            ensure: Ensure::Present,
            ha,
            drs: DrsSpec::default(),
            manage_lifecycle: false,
        }
    }

    /// A spec that manages only the DRS block of an existing cluster.
    pub fn drs_only(drs: DrsSpec) -> Self {
        Self {
            ensure: Ensure::Present,
            ha: HaSpec::default(),
            drs,
            manage_lifecycle: false,
        }
    }
}

/// Observed HA state of a cluster (`dasConfig`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHaConfig {
    pub enabled: bool,
    pub admission_control_enabled: bool,
    pub failover_level: i32,
    pub isolation_response: HaIsolationResponse,
    pub restart_priority: HaRestartPriority,
}

impl Default for ClusterHaConfig {
    // The endpoint's defaults for a freshly created cluster.
    fn default() -> Self {
        Self {
            enabled: false,
            admission_control_enabled: true,
            failover_level: 1,
            isolation_response: HaIsolationResponse::PowerOff,
            restart_priority: HaRestartPriority::Medium,
        }
    }
}

/// Observed DRS state of a cluster (`drsConfig`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDrsConfig {
    pub enabled: bool,
    pub default_vm_behavior: DrsAutomationLevel,
    pub vmotion_rate: i32,
    pub options: Vec<AdvancedSetting>,
}

impl Default for ClusterDrsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_vm_behavior: DrsAutomationLevel::FullyAutomated,
            vmotion_rate: 3,
            options: Vec::new(),
        }
    }
}

/// Observed configuration of an existing cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub ha: ClusterHaConfig,
    pub drs: ClusterDrsConfig,
}

/// Partial HA block of a [`ClusterConfigSpecEx`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaConfigInfo {
    pub enabled: Option<bool>,
    pub admission_control_enabled: Option<bool>,
    pub failover_level: Option<i32>,
    pub isolation_response: Option<HaIsolationResponse>,
    pub restart_priority: Option<HaRestartPriority>,
}

impl HaConfigInfo {
    pub fn is_empty(&self) -> bool {
        *self == HaConfigInfo::default()
    }
}

/// Partial DRS block of a [`ClusterConfigSpecEx`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrsConfigInfo {
    pub enabled: Option<bool>,
    pub default_vm_behavior: Option<DrsAutomationLevel>,
    pub vmotion_rate: Option<i32>,
    /// Full replacement list of DRS options.
    pub options: Option<Vec<AdvancedSetting>>,
}

impl DrsConfigInfo {
    pub fn is_empty(&self) -> bool {
        *self == DrsConfigInfo::default()
    }
}

/// A cluster reconfiguration, submitted as one atomic call.
///
/// Used both to create a cluster (carrying the full desired block) and to
/// reconfigure one (carrying only the fields that differ).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfigSpecEx {
    pub das_config: Option<HaConfigInfo>,
    pub drs_config: Option<DrsConfigInfo>,
}
