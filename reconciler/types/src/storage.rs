// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Storage path policy: SATP claim rules.

use crate::identity::Ensure;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// A SATP claim rule as listed by the host.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(default)]
pub struct SatpClaimRule {
    /// The SATP the rule claims devices for, e.g. `VMW_SATP_ALUA`.
    pub name: String,
    pub psp_options: Option<String>,
    pub transport: Option<String>,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub device: Option<String>,
    pub driver: Option<String>,
    pub claim_options: Option<String>,
    pub default_psp: Option<String>,
    pub options: Option<String>,
    pub model: Option<String>,
}

/// Desired presence of a claim rule.
///
/// The rule matches an observed rule when every field it declares is equal;
/// undeclared fields are not compared.
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
pub struct SatpClaimRuleSpec {
    #[serde(default)]
    pub ensure: Ensure,
    pub rule: SatpClaimRule,
}
