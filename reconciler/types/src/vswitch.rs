// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standard virtual switches and their bridge and network policy.

use crate::identity::Ensure;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

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
pub enum LinkDiscoveryProtocol {
    Cdp,
    Lldp,
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
pub enum LinkDiscoveryOperation {
    Down,
    Listen,
    Advertise,
    Both,
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
)]
pub struct LinkDiscoveryPolicy {
    pub protocol: LinkDiscoveryProtocol,
    pub operation: LinkDiscoveryOperation,
}

/// How a switch is bridged to physical NICs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchBridge {
    Auto,
    Bond {
        beacon_interval: i32,
        link_discovery_policy: Option<LinkDiscoveryPolicy>,
        nics: Vec<String>,
    },
    Simple {
        nics: Vec<String>,
    },
}

/// Desired bridge. NIC lists are unordered; `None` fields are not managed.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeSpec {
    Auto,
    Bond {
        beacon_interval: Option<i32>,
        link_discovery_policy: Option<LinkDiscoveryPolicy>,
        nics: Vec<String>,
    },
    Simple {
        nics: Vec<String>,
    },
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
pub enum NicTeamingPolicy {
    LoadBalanceIp,
    LoadBalanceSrcMac,
    LoadBalanceSrcId,
    FailoverExplicit,
}

/// Observed teaming policy.
///
/// `active_nics` and `standby_nics` are in failover order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NicTeaming {
    pub policy: NicTeamingPolicy,
    pub notify_switches: bool,
    pub rolling_order: bool,
    pub check_beacon: bool,
    pub active_nics: Vec<String>,
    pub standby_nics: Vec<String>,
}

impl Default for NicTeaming {
    fn default() -> Self {
        Self {
            policy: NicTeamingPolicy::LoadBalanceSrcId,
            notify_switches: true,
            rolling_order: false,
            check_beacon: false,
            active_nics: Vec::new(),
            standby_nics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub allow_promiscuous: bool,
    pub forged_transmits: bool,
    pub mac_changes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapingPolicy {
    pub enabled: bool,
    pub average_bandwidth: Option<i64>,
    pub peak_bandwidth: Option<i64>,
    pub burst_size: Option<i64>,
}

/// Observed network policy of a switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPolicy {
    pub teaming: NicTeaming,
    pub security: SecurityPolicy,
    pub shaping: ShapingPolicy,
}

/// Observed `HostVirtualSwitch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostVirtualSwitch {
    pub key: String,
    pub name: String,
    pub mtu: i32,
    pub num_ports: i32,
    pub num_ports_available: i32,
    pub pnics: Vec<String>,
    pub portgroups: Vec<String>,
    pub bridge: Option<SwitchBridge>,
    pub policy: NetworkPolicy,
}

impl HostVirtualSwitch {
    /// A switch with the endpoint's defaults, as created by `AddVirtualSwitch`
    /// with an otherwise empty spec.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: format!("key-vim.host.VirtualSwitch-{name}"),
            name,
            mtu: 1500,
            num_ports: 128,
            num_ports_available: 128,
            pnics: Vec::new(),
            portgroups: Vec::new(),
            bridge: None,
            policy: NetworkPolicy::default(),
        }
    }
}

/// Desired teaming policy. `None` fields are not managed.
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
pub struct NicTeamingSpec {
    pub policy: Option<NicTeamingPolicy>,
    pub notify_switches: Option<bool>,
    pub rolling_order: Option<bool>,
    pub check_beacon: Option<bool>,
    pub active_nics: Option<Vec<String>>,
    pub standby_nics: Option<Vec<String>>,
}

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
pub struct SecuritySpec {
    pub allow_promiscuous: Option<bool>,
    pub forged_transmits: Option<bool>,
    pub mac_changes: Option<bool>,
}

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
pub struct ShapingSpec {
    pub enabled: Option<bool>,
    pub average_bandwidth: Option<i64>,
    pub peak_bandwidth: Option<i64>,
    pub burst_size: Option<i64>,
}

/// Desired network policy of a switch, also used as the policy part of a
/// switch update (where only the fields that differ are set).
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
pub struct NetworkPolicySpec {
    #[serde(default)]
    pub teaming: NicTeamingSpec,
    #[serde(default)]
    pub security: SecuritySpec,
    #[serde(default)]
    pub shaping: ShapingSpec,
}

impl NetworkPolicySpec {
    pub fn is_empty(&self) -> bool {
        *self == NetworkPolicySpec::default()
    }
}

/// Desired switch existence and sizing.
///
/// Only `mtu` and `num_ports` take part in deciding whether the switch needs
/// a change; bridge and policy have their own resources.
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
pub struct VssSpec {
    #[serde(default)]
    pub ensure: Ensure,
    pub mtu: Option<i32>,
    pub num_ports: Option<i32>,
}

/// Desired bridge of an existing switch.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(deny_unknown_fields)]
pub struct VssBridgeSpec {
    pub bridge: BridgeSpec,
}

/// Desired network policy of an existing switch.
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
#[serde(transparent)]
pub struct VssPolicySpec {
    pub policy: NetworkPolicySpec,
}

/// Payload of `AddVirtualSwitch` / `UpdateVirtualSwitch`.
///
/// Fields left `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualSwitchSpecPatch {
    pub mtu: Option<i32>,
    pub num_ports: Option<i32>,
    pub bridge: Option<SwitchBridge>,
    pub policy: Option<NetworkPolicySpec>,
}
