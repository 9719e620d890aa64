// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host NTP servers.

use super::update_existing;
use crate::equivalence::Equivalent;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::datetime::HostDateTimeConfig;
use vsphere_reconciler_types::datetime::NtpConfig;
use vsphere_reconciler_types::datetime::NtpSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::HostRef;
use vsphere_reconciler_types::NotCreatable;

#[derive(Debug)]
pub struct Ntp;

impl Resource for Ntp {
    const KIND: ResourceKind = ResourceKind::Ntp;

    type Id = HostRef;
    type Desired = NtpSpec;
    type Observed = HostDateTimeConfig;
    type Create = NotCreatable;
    /// Payload of `UpdateDateTimeConfig`: the complete server list.
    type Update = HostDateTimeConfig;

    fn mismatches(
        desired: &NtpSpec,
        observed: &HostDateTimeConfig,
    ) -> Vec<FieldMismatch> {
        let Some(servers) = &desired.servers else {
            return Vec::new();
        };
        let target = NtpConfig::with_servers(servers.iter().cloned());
        let current = observed.ntp.clone().unwrap_or_default();
        if target.equivalent(&current) {
            return Vec::new();
        }
        let mut cmp = FieldComparison::new();
        cmp.set(
            "ntp.servers",
            Some(servers.as_slice()),
            current.servers.as_deref(),
        );
        cmp.finish()
    }

    fn plan_create(
        _id: &HostRef,
        _desired: &NtpSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &NtpSpec,
        _observed: &HostDateTimeConfig,
    ) -> Result<HostDateTimeConfig, PlanError> {
        let servers = desired.servers.as_ref().ok_or_else(|| {
            PlanError::AlreadyConverged { kind: Self::KIND }
        })?;
        if servers.iter().any(|s| s.trim().is_empty()) {
            return Err(PlanError::Malformed {
                reason: "NTP server names must not be empty".to_string(),
            });
        }
        Ok(HostDateTimeConfig {
            ntp: Some(NtpConfig::with_servers(servers.iter().cloned())),
        })
    }

    fn simulate_apply(
        _id: &HostRef,
        observed: Option<&HostDateTimeConfig>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<HostDateTimeConfig>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(update) => {
                update_existing(observed, |config| {
                    let Some(ntp) = &update.ntp else {
                        return Ok(());
                    };
                    config.ntp.get_or_insert_with(NtpConfig::default).servers =
                        ntp.servers.clone();
                    Ok(())
                })
            }
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "host date/time configuration cannot be removed",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::resource_equivalent;
    use crate::planner::plan;
    use assert_matches::assert_matches;

    fn host() -> HostRef {
        HostRef::new("esx-01.example.com")
    }

    fn spec(servers: &[&str]) -> NtpSpec {
        NtpSpec {
            servers: Some(servers.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn observed(servers: &[&str]) -> HostDateTimeConfig {
        HostDateTimeConfig {
            ntp: Some(NtpConfig::with_servers(servers.iter().copied())),
        }
    }

    #[test]
    fn server_order_is_irrelevant() {
        let desired = spec(&["a", "b"]);
        assert!(Ntp::mismatches(&desired, &observed(&["b", "a"])).is_empty());
        assert!(
            !Ntp::mismatches(&desired, &observed(&["a", "b", "c"])).is_empty()
        );
    }

    #[test]
    fn drift_is_replaced_with_the_full_list() {
        let desired = spec(&["ntp1", "ntp2"]);
        let current = observed(&["ntp1"]);
        let mismatches = Ntp::mismatches(&desired, &current);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "ntp.servers");

        let change = plan::<Ntp>(&host(), &desired, Some(&current)).unwrap();
        assert_eq!(change, ChangeRequest::Update(observed(&["ntp1", "ntp2"])));

        let after = Ntp::simulate_apply(&host(), Some(&current), &change)
            .unwrap()
            .unwrap();
        assert!(resource_equivalent::<Ntp>(&desired, Some(&after)));
    }

    #[test]
    fn empty_list_differs_from_no_list() {
        let desired = spec(&[]);
        let unset = HostDateTimeConfig { ntp: None };
        assert_eq!(Ntp::mismatches(&desired, &unset).len(), 1);
        assert!(Ntp::mismatches(&desired, &observed(&[])).is_empty());
    }

    #[test]
    fn unmanaged_servers_never_drift() {
        let desired = NtpSpec { servers: None };
        assert!(Ntp::mismatches(&desired, &observed(&["x"])).is_empty());
        assert!(Ntp::mismatches(&desired, &HostDateTimeConfig::default())
            .is_empty());
    }

    #[test]
    fn missing_host_is_not_created() {
        assert_matches!(
            plan::<Ntp>(&host(), &spec(&["ntp1"]), None),
            Err(PlanError::NotCreatable { kind: ResourceKind::Ntp })
        );
    }

    #[test]
    fn blank_server_is_malformed() {
        assert_matches!(
            plan::<Ntp>(&host(), &spec(&["ntp1", " "]), Some(&observed(&[]))),
            Err(PlanError::Malformed { .. })
        );
    }
}
