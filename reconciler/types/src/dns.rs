// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host DNS configuration.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Observed `HostDnsConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    pub addresses: Vec<String>,
    pub dhcp_enabled: bool,
    pub domain_name: String,
    pub host_name: String,
    pub ipv6_vnic_device: Option<String>,
    pub search_domains: Vec<String>,
    pub vnic_device: Option<String>,
}

/// Desired DNS configuration. `None` fields are not managed.
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
pub struct DnsSpec {
    /// DNS server addresses. Not part of equivalence: only pushed alongside
    /// some other change.
    pub addresses: Option<Vec<String>>,
    pub dhcp_enabled: Option<bool>,
    pub domain_name: Option<String>,
    pub host_name: Option<String>,
    pub ipv6_vnic_device: Option<String>,
    /// Search domains. Same treatment as `addresses`.
    pub search_domains: Option<Vec<String>>,
    pub vnic_device: Option<String>,
}

/// Fields of an `UpdateDnsConfig` call; only the fields that differ are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfigPatch {
    pub addresses: Option<Vec<String>>,
    pub dhcp_enabled: Option<bool>,
    pub domain_name: Option<String>,
    pub host_name: Option<String>,
    pub ipv6_vnic_device: Option<String>,
    pub search_domains: Option<Vec<String>>,
    pub vnic_device: Option<String>,
}
