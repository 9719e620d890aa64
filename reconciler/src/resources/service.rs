// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host service startup policy and running state.

use super::duplicates;
use super::update_existing;
use crate::equivalence::Equivalent;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::service::HostService;
use vsphere_reconciler_types::service::HostServicesSpec;
use vsphere_reconciler_types::service::ServiceChange;
use vsphere_reconciler_types::service::ServiceConfig;
use vsphere_reconciler_types::service::ServiceSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::HostRef;
use vsphere_reconciler_types::NotCreatable;

/// The services of one host, as listed by its service system.
#[derive(Debug)]
pub struct HostServices;

impl Resource for HostServices {
    const KIND: ResourceKind = ResourceKind::HostServices;

    type Id = HostRef;
    type Desired = HostServicesSpec;
    type Observed = Vec<HostService>;
    type Create = NotCreatable;
    /// One entry per service that needs a policy change, a start or a stop.
    type Update = Vec<ServiceChange>;

    fn mismatches(
        desired: &HostServicesSpec,
        observed: &Vec<HostService>,
    ) -> Vec<FieldMismatch> {
        let mut cmp = FieldComparison::new();
        for spec in &desired.services {
            let _ = compare_service(&mut cmp, spec, observed);
        }
        cmp.finish()
    }

    fn plan_create(
        _id: &HostRef,
        _desired: &HostServicesSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &HostServicesSpec,
        observed: &Vec<HostService>,
    ) -> Result<Vec<ServiceChange>, PlanError> {
        let dups = duplicates(desired.services.iter().map(|s| s.key.as_str()));
        if !dups.is_empty() {
            return Err(PlanError::Malformed {
                reason: format!("services declared twice: {}", dups.join(", ")),
            });
        }

        let mut cmp = FieldComparison::new();
        let mut changes = Vec::new();
        for spec in &desired.services {
            if let Some(change) = compare_service(&mut cmp, spec, observed)? {
                changes.push(change);
            }
        }
        Ok(changes)
    }

    fn simulate_apply(
        _id: &HostRef,
        observed: Option<&Vec<HostService>>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<Vec<HostService>>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(changes) => {
                update_existing(observed, |services| {
                    for change in changes {
                        let service = services
                            .iter_mut()
                            .find(|s| s.key == change.key)
                            .ok_or(ProviderError::NotFound)?;
                        if let Some(policy) = change.policy {
                            service.policy = policy;
                        }
                        if let Some(running) = change.running {
                            service.running = running;
                        }
                    }
                    Ok(())
                })
            }
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "host services cannot be removed",
            )),
        }
    }
}

/// Compare one declared service against the host's list, recording any
/// mismatch and returning the change that fixes it.
fn compare_service(
    cmp: &mut FieldComparison,
    spec: &ServiceSpec,
    observed: &[HostService],
) -> Result<Option<ServiceChange>, PlanError> {
    cmp.within(format!("services.{}", spec.key));
    let Some(service) = observed.iter().find(|s| s.key == spec.key) else {
        cmp.mismatch("present", true, false);
        return Err(PlanError::UnknownService { key: spec.key.clone() });
    };

    let current = ServiceConfig::from(service);
    let target = ServiceConfig {
        key: spec.key.clone(),
        policy: spec.policy.unwrap_or(current.policy),
        running: spec.running.unwrap_or(current.running),
    };
    if target.equivalent(&current) {
        return Ok(None);
    }

    let change = ServiceChange {
        key: spec.key.clone(),
        policy: cmp.scalar("policy", spec.policy.as_ref(), &current.policy),
        running: cmp.scalar("running", spec.running.as_ref(), &current.running),
    };
    Ok(Some(change))
}
