// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cluster HA and DRS configuration.
//!
//! The endpoint reconfigures a cluster through one `ConfigSpecEx`, so every
//! change to either block (or both) is a single request. An update carries
//! only the fields that differ; DRS options are always sent as a complete
//! replacement list.

use super::duplicates;
use super::update_existing;
use crate::equivalence::same_setting;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::advanced::AdvancedSetting;
use vsphere_reconciler_types::cluster::ClusterConfig;
use vsphere_reconciler_types::cluster::ClusterConfigSpecEx;
use vsphere_reconciler_types::cluster::ClusterSpec;
use vsphere_reconciler_types::cluster::DrsConfigInfo;
use vsphere_reconciler_types::cluster::DrsSpec;
use vsphere_reconciler_types::cluster::HaConfigInfo;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::ClusterPath;
use vsphere_reconciler_types::Ensure;

const MIGRATION_THRESHOLD_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

#[derive(Debug)]
pub struct Cluster;

impl Resource for Cluster {
    const KIND: ResourceKind = ResourceKind::Cluster;

    type Id = ClusterPath;
    type Desired = ClusterSpec;
    type Observed = ClusterConfig;
    type Create = ClusterConfigSpecEx;
    type Update = ClusterConfigSpecEx;

    fn ensure(desired: &ClusterSpec) -> Ensure {
        desired.ensure
    }

    fn manages_lifecycle(desired: &ClusterSpec) -> bool {
        desired.manage_lifecycle
    }

    fn mismatches(
        desired: &ClusterSpec,
        observed: &ClusterConfig,
    ) -> Vec<FieldMismatch> {
        compare(desired, observed).0
    }

    fn plan_create(
        _id: &ClusterPath,
        desired: &ClusterSpec,
    ) -> Result<ClusterConfigSpecEx, PlanError> {
        validate(desired)?;

        let ha = &desired.ha;
        let das_config = HaConfigInfo {
            enabled: ha.enabled,
            admission_control_enabled: ha.admission_control_enabled,
            failover_level: ha.failover_level,
            isolation_response: ha.isolation_response,
            restart_priority: ha.restart_priority,
        };
        let drs = &desired.drs;
        let drs_config = DrsConfigInfo {
            enabled: drs.enabled,
            default_vm_behavior: drs.automation_level,
            vmotion_rate: drs.migration_threshold,
            options: desired_options(drs, &[]),
        };
        Ok(ClusterConfigSpecEx {
            das_config: (!das_config.is_empty()).then_some(das_config),
            drs_config: (!drs_config.is_empty()).then_some(drs_config),
        })
    }

    fn plan_update(
        desired: &ClusterSpec,
        observed: &ClusterConfig,
    ) -> Result<ClusterConfigSpecEx, PlanError> {
        validate(desired)?;
        let (_, spec) = compare(desired, observed);
        if spec.das_config.is_none() && spec.drs_config.is_none() {
            return Err(PlanError::AlreadyConverged { kind: Self::KIND });
        }
        Ok(spec)
    }

    fn simulate_apply(
        id: &ClusterPath,
        observed: Option<&ClusterConfig>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<ClusterConfig>, ProviderError> {
        match change {
            ChangeRequest::Create(spec) => {
                if observed.is_some() {
                    return Err(ProviderError::rejected(format!(
                        "cluster {id} already exists"
                    )));
                }
                let mut config = ClusterConfig::default();
                apply_config_spec(&mut config, spec);
                Ok(Some(config))
            }
            ChangeRequest::Update(spec) => update_existing(observed, |config| {
                apply_config_spec(config, spec);
                Ok(())
            }),
            ChangeRequest::Delete => {
                observed.ok_or(ProviderError::NotFound)?;
                Ok(None)
            }
        }
    }
}

/// Compare both blocks, returning the mismatches together with the
/// reconfiguration that carries exactly the differing fields.
fn compare(
    desired: &ClusterSpec,
    observed: &ClusterConfig,
) -> (Vec<FieldMismatch>, ClusterConfigSpecEx) {
    let mut cmp = FieldComparison::new();

    let ha = &desired.ha;
    let current = &observed.ha;
    cmp.within("ha");
    let das_config = HaConfigInfo {
        enabled: cmp.scalar("enabled", ha.enabled.as_ref(), &current.enabled),
        admission_control_enabled: cmp.scalar(
            "admission_control_enabled",
            ha.admission_control_enabled.as_ref(),
            &current.admission_control_enabled,
        ),
        failover_level: cmp.scalar(
            "failover_level",
            ha.failover_level.as_ref(),
            &current.failover_level,
        ),
        isolation_response: cmp.scalar(
            "isolation_response",
            ha.isolation_response.as_ref(),
            &current.isolation_response,
        ),
        restart_priority: cmp.scalar(
            "restart_priority",
            ha.restart_priority.as_ref(),
            &current.restart_priority,
        ),
    };

    let drs = &desired.drs;
    let current = &observed.drs;
    cmp.within("drs");
    let options = desired_options(drs, &current.options);
    let drs_config = DrsConfigInfo {
        enabled: cmp.scalar(
            "enabled",
            drs.enabled.as_ref(),
            &current.enabled,
        ),
        default_vm_behavior: cmp.scalar(
            "automation_level",
            drs.automation_level.as_ref(),
            &current.default_vm_behavior,
        ),
        vmotion_rate: cmp.scalar(
            "migration_threshold",
            drs.migration_threshold.as_ref(),
            &current.vmotion_rate,
        ),
        options: cmp.set(
            "options",
            options.as_deref(),
            Some(current.options.as_slice()),
        ),
    };

    let spec = ClusterConfigSpecEx {
        das_config: (!das_config.is_empty()).then_some(das_config),
        drs_config: (!drs_config.is_empty()).then_some(drs_config),
    };
    (cmp.finish(), spec)
}

/// The complete DRS option list the cluster should end up with, or `None`
/// when the desired spec does not manage any option.
///
/// An explicit `options` list replaces whatever the cluster has. Typed
/// options on their own only pin their own keys and leave the rest of the
/// observed list alone.
fn desired_options(
    drs: &DrsSpec,
    observed: &[AdvancedSetting],
) -> Option<Vec<AdvancedSetting>> {
    let typed = drs.typed_options();
    let mut options = match &drs.options {
        Some(options) => options.clone(),
        None if typed.is_empty() => return None,
        None => observed.to_vec(),
    };
    for setting in typed {
        match options.iter_mut().find(|o| same_setting(o, &setting)) {
            Some(existing) => existing.value = setting.value,
            None => options.push(setting),
        }
    }
    Some(options)
}

fn validate(desired: &ClusterSpec) -> Result<(), PlanError> {
    if let Some(threshold) = desired.drs.migration_threshold {
        if !MIGRATION_THRESHOLD_RANGE.contains(&threshold) {
            return Err(PlanError::Malformed {
                reason: format!(
                    "DRS migration threshold {threshold} is outside {}..={}",
                    MIGRATION_THRESHOLD_RANGE.start(),
                    MIGRATION_THRESHOLD_RANGE.end(),
                ),
            });
        }
    }
    if let Some(level) = desired.ha.failover_level {
        if level < 1 {
            return Err(PlanError::Malformed {
                reason: format!("HA failover level {level} must be positive"),
            });
        }
    }
    if let Some(options) = &desired.drs.options {
        let dups = duplicates(options.iter().map(|o| o.name.as_str()));
        if !dups.is_empty() {
            return Err(PlanError::Malformed {
                reason: format!("duplicate DRS options: {}", dups.join(", ")),
            });
        }
    }
    Ok(())
}

fn apply_config_spec(config: &mut ClusterConfig, spec: &ClusterConfigSpecEx) {
    if let Some(das) = &spec.das_config {
        let ha = &mut config.ha;
        if let Some(v) = das.enabled {
            ha.enabled = v;
        }
        if let Some(v) = das.admission_control_enabled {
            ha.admission_control_enabled = v;
        }
        if let Some(v) = das.failover_level {
            ha.failover_level = v;
        }
        if let Some(v) = das.isolation_response {
            ha.isolation_response = v;
        }
        if let Some(v) = das.restart_priority {
            ha.restart_priority = v;
        }
    }
    if let Some(drs_config) = &spec.drs_config {
        let drs = &mut config.drs;
        if let Some(v) = drs_config.enabled {
            drs.enabled = v;
        }
        if let Some(v) = drs_config.default_vm_behavior {
            drs.default_vm_behavior = v;
        }
        if let Some(v) = drs_config.vmotion_rate {
            drs.vmotion_rate = v;
        }
        if let Some(options) = &drs_config.options {
            drs.options = options.clone();
        }
    }
}
