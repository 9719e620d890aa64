// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host services.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Startup policy of a host service.
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
    strum::EnumString,
)]
pub enum ServicePolicy {
    #[default]
    Unset,
    On,
    Off,
    Automatic,
}

/// A service as reported by the host's service system.
///
/// `label`, `required`, `uninstallable` and `ruleset` are descriptive only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostService {
    pub key: String,
    pub label: String,
    pub policy: ServicePolicy,
    pub running: bool,
    pub required: bool,
    pub uninstallable: bool,
    pub ruleset: Vec<String>,
}

/// The converged part of a host service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub key: String,
    pub policy: ServicePolicy,
    pub running: bool,
}

impl From<&HostService> for ServiceConfig {
    fn from(service: &HostService) -> Self {
        Self {
            key: service.key.clone(),
            policy: service.policy,
            running: service.running,
        }
    }
}

/// Desired state of one service. `None` fields are not managed.
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
pub struct ServiceSpec {
    pub key: String,
    pub policy: Option<ServicePolicy>,
    pub running: Option<bool>,
}

/// Desired state of a set of services on one host.
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
pub struct HostServicesSpec {
    pub services: Vec<ServiceSpec>,
}

/// Change to a single service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceChange {
    pub key: String,
    /// New policy, via `UpdateServicePolicy`.
    pub policy: Option<ServicePolicy>,
    /// `true` starts the service, `false` stops it.
    pub running: Option<bool>,
}
