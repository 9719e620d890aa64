// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host DNS configuration.

use super::update_existing;
use crate::equivalence::Equivalent;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::dns::DnsConfig;
use vsphere_reconciler_types::dns::DnsConfigPatch;
use vsphere_reconciler_types::dns::DnsSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::HostRef;
use vsphere_reconciler_types::NotCreatable;

#[derive(Debug)]
pub struct Dns;

impl Resource for Dns {
    const KIND: ResourceKind = ResourceKind::Dns;

    type Id = HostRef;
    type Desired = DnsSpec;
    type Observed = DnsConfig;
    type Create = NotCreatable;
    type Update = DnsConfigPatch;

    fn mismatches(
        desired: &DnsSpec,
        observed: &DnsConfig,
    ) -> Vec<FieldMismatch> {
        compare(desired, observed).0
    }

    fn plan_create(
        _id: &HostRef,
        _desired: &DnsSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &DnsSpec,
        observed: &DnsConfig,
    ) -> Result<DnsConfigPatch, PlanError> {
        let (mismatches, mut patch) = compare(desired, observed);
        if mismatches.is_empty() {
            return Err(PlanError::AlreadyConverged { kind: Self::KIND });
        }

        // The address lists never drive a change on their own, but ride along
        // with one so the host ends up with everything the caller declared.
        let mut extra = FieldComparison::new();
        patch.addresses = extra.set(
            "addresses",
            desired.addresses.as_deref(),
            Some(observed.addresses.as_slice()),
        );
        patch.search_domains = extra.set(
            "search_domains",
            desired.search_domains.as_deref(),
            Some(observed.search_domains.as_slice()),
        );

        let dhcp = patch.dhcp_enabled.unwrap_or(observed.dhcp_enabled);
        let vnic = patch.vnic_device.as_ref().or(observed.vnic_device.as_ref());
        if dhcp && vnic.is_none() {
            return Err(PlanError::Malformed {
                reason: "DHCP-provided DNS requires a VMkernel NIC".to_string(),
            });
        }
        Ok(patch)
    }

    fn simulate_apply(
        _id: &HostRef,
        observed: Option<&DnsConfig>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<DnsConfig>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(patch) => update_existing(observed, |config| {
                apply_patch(config, patch);
                Ok(())
            }),
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "host DNS configuration cannot be removed",
            )),
        }
    }
}

fn compare(
    desired: &DnsSpec,
    observed: &DnsConfig,
) -> (Vec<FieldMismatch>, DnsConfigPatch) {
    let mut target = observed.clone();
    apply_patch(
        &mut target,
        &DnsConfigPatch {
            addresses: None,
            dhcp_enabled: desired.dhcp_enabled,
            domain_name: desired.domain_name.clone(),
            host_name: desired.host_name.clone(),
            ipv6_vnic_device: desired.ipv6_vnic_device.clone(),
            search_domains: None,
            vnic_device: desired.vnic_device.clone(),
        },
    );
    if target.equivalent(observed) {
        return (Vec::new(), DnsConfigPatch::default());
    }

    let mut cmp = FieldComparison::new();
    let patch = DnsConfigPatch {
        addresses: None,
        dhcp_enabled: cmp.scalar(
            "dhcp_enabled",
            desired.dhcp_enabled.as_ref(),
            &observed.dhcp_enabled,
        ),
        domain_name: cmp.scalar(
            "domain_name",
            desired.domain_name.as_ref(),
            &observed.domain_name,
        ),
        host_name: cmp.scalar(
            "host_name",
            desired.host_name.as_ref(),
            &observed.host_name,
        ),
        ipv6_vnic_device: cmp.optional(
            "ipv6_vnic_device",
            desired.ipv6_vnic_device.as_ref(),
            observed.ipv6_vnic_device.as_ref(),
        ),
        search_domains: None,
        vnic_device: cmp.optional(
            "vnic_device",
            desired.vnic_device.as_ref(),
            observed.vnic_device.as_ref(),
        ),
    };
    (cmp.finish(), patch)
}

fn apply_patch(config: &mut DnsConfig, patch: &DnsConfigPatch) {
    if let Some(v) = &patch.addresses {
        config.addresses = v.clone();
    }
    if let Some(v) = patch.dhcp_enabled {
        config.dhcp_enabled = v;
    }
    if let Some(v) = &patch.domain_name {
        config.domain_name = v.clone();
    }
    if let Some(v) = &patch.host_name {
        config.host_name = v.clone();
    }
    if let Some(v) = &patch.ipv6_vnic_device {
        config.ipv6_vnic_device = Some(v.clone());
    }
    if let Some(v) = &patch.search_domains {
        config.search_domains = v.clone();
    }
    if let Some(v) = &patch.vnic_device {
        config.vnic_device = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::resource_equivalent;
    use crate::planner::plan;
    use assert_matches::assert_matches;

    fn host() -> HostRef {
        HostRef::new("esx-01")
    }

    fn observed() -> DnsConfig {
        DnsConfig {
            addresses: vec!["10.0.0.1".to_string()],
            dhcp_enabled: false,
            domain_name: "example.com".to_string(),
            host_name: "esx-01".to_string(),
            ipv6_vnic_device: None,
            search_domains: vec!["example.com".to_string()],
            vnic_device: None,
        }
    }

    #[test]
    fn address_lists_alone_never_drift() {
        let desired = DnsSpec {
            addresses: Some(vec!["10.0.0.9".to_string()]),
            search_domains: Some(Vec::new()),
            host_name: Some("esx-01".to_string()),
            ..DnsSpec::default()
        };
        assert!(resource_equivalent::<Dns>(&desired, Some(&observed())));
    }

    #[test]
    fn addresses_ride_along_with_a_real_change() {
        let desired = DnsSpec {
            addresses: Some(vec!["10.0.0.9".to_string()]),
            domain_name: Some("corp.example.com".to_string()),
            ..DnsSpec::default()
        };
        let current = observed();
        let mismatches = Dns::mismatches(&desired, &current);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "domain_name");

        let change = plan::<Dns>(&host(), &desired, Some(&current)).unwrap();
        assert_eq!(
            change,
            ChangeRequest::Update(DnsConfigPatch {
                addresses: Some(vec!["10.0.0.9".to_string()]),
                domain_name: Some("corp.example.com".to_string()),
                ..DnsConfigPatch::default()
            })
        );
        let after = Dns::simulate_apply(&host(), Some(&current), &change)
            .unwrap()
            .unwrap();
        assert_eq!(after.addresses, ["10.0.0.9"]);
        assert!(resource_equivalent::<Dns>(&desired, Some(&after)));
    }

    #[test]
    fn vnic_device_set_where_none_observed() {
        let desired = DnsSpec {
            vnic_device: Some("vmk0".to_string()),
            ..DnsSpec::default()
        };
        let mismatches = Dns::mismatches(&desired, &observed());
        assert_eq!(mismatches[0].field, "vnic_device");
        assert_eq!(mismatches[0].observed, "None");
    }

    #[test]
    fn dhcp_without_vnic_is_malformed() {
        let desired =
            DnsSpec { dhcp_enabled: Some(true), ..DnsSpec::default() };
        assert_matches!(
            plan::<Dns>(&host(), &desired, Some(&observed())),
            Err(PlanError::Malformed { .. })
        );

        let desired = DnsSpec {
            dhcp_enabled: Some(true),
            vnic_device: Some("vmk0".to_string()),
            ..DnsSpec::default()
        };
        assert!(plan::<Dns>(&host(), &desired, Some(&observed())).is_ok());
    }
}
