// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! vCenter historical statistics intervals.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Observed `PerfInterval`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfInterval {
    pub key: i32,
    pub name: String,
    pub enabled: bool,
    /// Seconds between samples.
    pub sampling_period: i64,
    /// Seconds a sample is retained.
    pub length: i64,
    /// Statistics level, 1 through 4.
    pub level: i32,
}

/// Desired statistics interval. `None` fields are not managed.
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
pub struct PerfIntervalSpec {
    pub enabled: Option<bool>,
    pub sampling_period: Option<i64>,
    pub length: Option<i64>,
    pub level: Option<i32>,
}
