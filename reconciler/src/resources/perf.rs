// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! vCenter historical statistics intervals.

use super::update_existing;
use crate::equivalence::Equivalent;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::perf::PerfInterval;
use vsphere_reconciler_types::perf::PerfIntervalSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::NotCreatable;
use vsphere_reconciler_types::PerfIntervalId;

const LEVEL_RANGE: std::ops::RangeInclusive<i32> = 1..=4;

/// One of the statistics intervals of a vCenter's performance manager.
///
/// The interval set is fixed by vCenter; intervals are only reconfigured.
#[derive(Debug)]
pub struct PerfIntervalConfig;

impl Resource for PerfIntervalConfig {
    const KIND: ResourceKind = ResourceKind::PerfInterval;

    type Id = PerfIntervalId;
    type Desired = PerfIntervalSpec;
    type Observed = PerfInterval;
    type Create = NotCreatable;
    type Update = PerfIntervalSpec;

    fn mismatches(
        desired: &PerfIntervalSpec,
        observed: &PerfInterval,
    ) -> Vec<FieldMismatch> {
        let target = PerfInterval {
            enabled: desired.enabled.unwrap_or(observed.enabled),
            sampling_period: desired
                .sampling_period
                .unwrap_or(observed.sampling_period),
            length: desired.length.unwrap_or(observed.length),
            level: desired.level.unwrap_or(observed.level),
            ..observed.clone()
        };
        if target.equivalent(observed) {
            return Vec::new();
        }
        compare(desired, observed).0
    }

    fn plan_create(
        _id: &PerfIntervalId,
        _desired: &PerfIntervalSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &PerfIntervalSpec,
        observed: &PerfInterval,
    ) -> Result<PerfIntervalSpec, PlanError> {
        if let Some(level) = desired.level {
            if !LEVEL_RANGE.contains(&level) {
                return Err(PlanError::Malformed {
                    reason: format!(
                        "statistics level {level} is outside 1..=4"
                    ),
                });
            }
        }
        let sampling_period =
            desired.sampling_period.unwrap_or(observed.sampling_period);
        let length = desired.length.unwrap_or(observed.length);
        if sampling_period <= 0 || length < sampling_period {
            return Err(PlanError::Malformed {
                reason: format!(
                    "interval length {length}s must cover at least one \
                     {sampling_period}s sample"
                ),
            });
        }
        Ok(compare(desired, observed).1)
    }

    fn simulate_apply(
        _id: &PerfIntervalId,
        observed: Option<&PerfInterval>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<PerfInterval>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(patch) => {
                update_existing(observed, |interval| {
                    if let Some(v) = patch.enabled {
                        interval.enabled = v;
                    }
                    if let Some(v) = patch.sampling_period {
                        interval.sampling_period = v;
                    }
                    if let Some(v) = patch.length {
                        interval.length = v;
                    }
                    if let Some(v) = patch.level {
                        interval.level = v;
                    }
                    Ok(())
                })
            }
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "statistics intervals cannot be removed",
            )),
        }
    }
}

fn compare(
    desired: &PerfIntervalSpec,
    observed: &PerfInterval,
) -> (Vec<FieldMismatch>, PerfIntervalSpec) {
    let mut cmp = FieldComparison::new();
    let patch = PerfIntervalSpec {
        enabled: cmp.scalar(
            "enabled",
            desired.enabled.as_ref(),
            &observed.enabled,
        ),
        sampling_period: cmp.scalar(
            "sampling_period",
            desired.sampling_period.as_ref(),
            &observed.sampling_period,
        ),
        length: cmp.scalar("length", desired.length.as_ref(), &observed.length),
        level: cmp.scalar("level", desired.level.as_ref(), &observed.level),
    };
    (cmp.finish(), patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::resource_equivalent;
    use crate::planner::plan;
    use assert_matches::assert_matches;

    fn id() -> PerfIntervalId {
        PerfIntervalId { vcenter: "vc-01".to_string(), key: 1 }
    }

    fn past_day() -> PerfInterval {
        PerfInterval {
            key: 1,
            name: "Past day".to_string(),
            enabled: true,
            sampling_period: 300,
            length: 86400,
            level: 1,
        }
    }

    #[test]
    fn level_change() {
        let desired =
            PerfIntervalSpec { level: Some(2), ..PerfIntervalSpec::default() };
        let current = past_day();
        let change = plan::<PerfIntervalConfig>(&id(), &desired, Some(&current))
            .unwrap();
        assert_eq!(change, ChangeRequest::Update(desired.clone()));
        let after =
            PerfIntervalConfig::simulate_apply(&id(), Some(&current), &change)
                .unwrap()
                .unwrap();
        assert_eq!(after.name, "Past day");
        assert!(resource_equivalent::<PerfIntervalConfig>(
            &desired,
            Some(&after)
        ));
    }

    #[test]
    fn declared_equal_fields_are_in_sync() {
        let desired = PerfIntervalSpec {
            enabled: Some(true),
            sampling_period: Some(300),
            ..PerfIntervalSpec::default()
        };
        let mismatches = PerfIntervalConfig::mismatches(&desired, &past_day());
        assert!(mismatches.is_empty());
    }

    #[test]
    fn invalid_intervals_are_malformed() {
        let desired =
            PerfIntervalSpec { level: Some(5), ..PerfIntervalSpec::default() };
        assert_matches!(
            plan::<PerfIntervalConfig>(&id(), &desired, Some(&past_day())),
            Err(PlanError::Malformed { .. })
        );

        let desired = PerfIntervalSpec {
            length: Some(60),
            ..PerfIntervalSpec::default()
        };
        assert_matches!(
            plan::<PerfIntervalConfig>(&id(), &desired, Some(&past_day())),
            Err(PlanError::Malformed { .. })
        );
    }

    #[test]
    fn missing_interval_is_not_created() {
        let desired =
            PerfIntervalSpec { level: Some(2), ..PerfIntervalSpec::default() };
        assert_matches!(
            plan::<PerfIntervalConfig>(&id(), &desired, None),
            Err(PlanError::NotCreatable { .. })
        );
    }
}
