// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host syslog configuration.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Observed syslog configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyslogConfig {
    pub log_host: String,
    pub log_dir: String,
    pub log_dir_unique: bool,
    pub check_ssl_certs: bool,
    pub default_rotate: i64,
    pub default_size: i64,
    pub default_timeout: i64,
    pub queue_drop_mark: i64,
    pub drop_log_rotate: i64,
    pub drop_log_size: i64,
}

/// Desired syslog configuration; also the payload of a syslog update, where
/// only the fields that differ are set.
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
pub struct SyslogSpec {
    pub log_host: Option<String>,
    pub log_dir: Option<String>,
    pub log_dir_unique: Option<bool>,
    pub check_ssl_certs: Option<bool>,
    pub default_rotate: Option<i64>,
    pub default_size: Option<i64>,
    pub default_timeout: Option<i64>,
    pub queue_drop_mark: Option<i64>,
    pub drop_log_rotate: Option<i64>,
    pub drop_log_size: Option<i64>,
}
