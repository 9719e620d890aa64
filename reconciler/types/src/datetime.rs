// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host date/time configuration.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// NTP configuration of a host.
///
/// `servers` is a set: order carries no meaning. `None` means the endpoint
/// reported no server list at all, which is distinct from an empty list.
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
pub struct NtpConfig {
    pub servers: Option<Vec<String>>,
    #[serde(default)]
    pub config_files: Option<Vec<String>>,
}

impl NtpConfig {
    pub fn with_servers<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: Some(servers.into_iter().map(Into::into).collect()),
            config_files: None,
        }
    }
}

/// Observed `HostDateTimeConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDateTimeConfig {
    pub ntp: Option<NtpConfig>,
}

/// Desired NTP servers for a host.
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
pub struct NtpSpec {
    pub servers: Option<Vec<String>>,
}
