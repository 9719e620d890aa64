// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identities used to locate entities on the management endpoint.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// A reference to a remote managed object.
///
/// This is a weak reference: holding one never implies ownership of the
/// object it names, and two references are the same iff both fields match.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct ManagedObjectRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl ManagedObjectRef {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self { kind: kind.into(), value: value.into() }
    }
}

impl fmt::Display for ManagedObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.value)
    }
}

/// Location of a cluster, found by traversing the inventory.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct ClusterPath {
    /// Folder path to the datacenter; empty when the datacenter sits in the
    /// root folder.
    #[serde(default)]
    pub datacenter_inventory_path: String,
    pub datacenter: String,
    pub name: String,
}

impl fmt::Display for ClusterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.datacenter_inventory_path.is_empty() {
            write!(f, "{}/{}", self.datacenter, self.name)
        } else {
            write!(
                f,
                "{}/{}/{}",
                self.datacenter_inventory_path, self.datacenter, self.name
            )
        }
    }
}

/// A host, used as the identity of host-scoped singleton configuration
/// (NTP, DNS, syslog, services, advanced settings, SATP claim rules).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct HostRef {
    pub host: String,
}

impl HostRef {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl fmt::Display for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host)
    }
}

/// A standard virtual switch on a particular host.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct HostSwitchPath {
    pub host: String,
    pub switch: String,
}

impl HostSwitchPath {
    pub fn new(host: impl Into<String>, switch: impl Into<String>) -> Self {
        Self { host: host.into(), switch: switch.into() }
    }
}

impl fmt::Display for HostSwitchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.switch)
    }
}

/// A historical statistics interval on a vCenter.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
pub struct PerfIntervalId {
    pub vcenter: String,
    pub key: i32,
}

impl fmt::Display for PerfIntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/interval-{}", self.vcenter, self.key)
    }
}

/// Any entity identity, used when reporting outcomes across resource kinds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityId {
    Ref(ManagedObjectRef),
    Cluster(ClusterPath),
    Host(HostRef),
    HostSwitch(HostSwitchPath),
    PerfInterval(PerfIntervalId),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Ref(id) => fmt::Display::fmt(id, f),
            EntityId::Cluster(id) => fmt::Display::fmt(id, f),
            EntityId::Host(id) => fmt::Display::fmt(id, f),
            EntityId::HostSwitch(id) => fmt::Display::fmt(id, f),
            EntityId::PerfInterval(id) => fmt::Display::fmt(id, f),
        }
    }
}

macro_rules! impl_from_for_entity_id {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for EntityId {
                fn from(id: $ty) -> Self {
                    EntityId::$variant(id)
                }
            }
        )*
    };
}

impl_from_for_entity_id! {
    ManagedObjectRef => Ref,
    ClusterPath => Cluster,
    HostRef => Host,
    HostSwitchPath => HostSwitch,
    PerfIntervalId => PerfInterval,
}

/// Whether an entity should exist.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
)]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_path_display_omits_empty_inventory_path() {
        let path = ClusterPath {
            datacenter_inventory_path: String::new(),
            datacenter: "Datacenter".to_string(),
            name: "MyCluster".to_string(),
        };
        assert_eq!(path.to_string(), "Datacenter/MyCluster");

        let path = ClusterPath {
            datacenter_inventory_path: "Folder".to_string(),
            ..path
        };
        assert_eq!(path.to_string(), "Folder/Datacenter/MyCluster");
    }

    #[test]
    fn managed_object_ref_uses_type_on_the_wire() {
        let moref =
            ManagedObjectRef::new("HostNetworkSystem", "networkSystem-1");
        let json = serde_json::to_value(&moref).unwrap();
        assert_eq!(json["type"], "HostNetworkSystem");
        assert_eq!(json["value"], "networkSystem-1");
    }
}
