// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Standard virtual switches.
//!
//! A switch is managed by three resources over the same observed
//! [`HostVirtualSwitch`]: [`Vss`] owns its existence and sizing, [`VssBridge`]
//! its uplinks, and [`VssPolicy`] its network policy. All three submit the
//! same `HostVirtualSwitchSpec`-shaped patch; only [`Vss`] may add or remove
//! the switch.

use super::update_existing;
use crate::equivalence::Equivalent;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use std::ops::RangeInclusive;
use vsphere_reconciler_types::vswitch::BridgeSpec;
use vsphere_reconciler_types::vswitch::HostVirtualSwitch;
use vsphere_reconciler_types::vswitch::NetworkPolicy;
use vsphere_reconciler_types::vswitch::NetworkPolicySpec;
use vsphere_reconciler_types::vswitch::NicTeamingSpec;
use vsphere_reconciler_types::vswitch::SecuritySpec;
use vsphere_reconciler_types::vswitch::ShapingSpec;
use vsphere_reconciler_types::vswitch::SwitchBridge;
use vsphere_reconciler_types::vswitch::VirtualSwitchSpecPatch;
use vsphere_reconciler_types::vswitch::VssBridgeSpec;
use vsphere_reconciler_types::vswitch::VssPolicySpec;
use vsphere_reconciler_types::vswitch::VssSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::Ensure;
use vsphere_reconciler_types::HostSwitchPath;
use vsphere_reconciler_types::NotCreatable;

const MTU_RANGE: RangeInclusive<i32> = 1280..=9000;
const NUM_PORTS_RANGE: RangeInclusive<i32> = 1..=4088;

/// Beacon interval the endpoint assigns a bond bridge when none is given.
const DEFAULT_BEACON_INTERVAL: i32 = 1;

/// Existence, MTU and port count of a switch.
#[derive(Debug)]
pub struct Vss;

impl Resource for Vss {
    const KIND: ResourceKind = ResourceKind::Vss;

    type Id = HostSwitchPath;
    type Desired = VssSpec;
    type Observed = HostVirtualSwitch;
    type Create = VirtualSwitchSpecPatch;
    type Update = VirtualSwitchSpecPatch;

    fn ensure(desired: &VssSpec) -> Ensure {
        desired.ensure
    }

    fn manages_lifecycle(_desired: &VssSpec) -> bool {
        true
    }

    fn mismatches(
        desired: &VssSpec,
        observed: &HostVirtualSwitch,
    ) -> Vec<FieldMismatch> {
        compare_sizing(desired, observed).0
    }

    fn plan_create(
        _id: &HostSwitchPath,
        desired: &VssSpec,
    ) -> Result<VirtualSwitchSpecPatch, PlanError> {
        validate_sizing(desired)?;
        Ok(VirtualSwitchSpecPatch {
            mtu: desired.mtu,
            num_ports: desired.num_ports,
            ..VirtualSwitchSpecPatch::default()
        })
    }

    fn plan_update(
        desired: &VssSpec,
        observed: &HostVirtualSwitch,
    ) -> Result<VirtualSwitchSpecPatch, PlanError> {
        validate_sizing(desired)?;
        Ok(compare_sizing(desired, observed).1)
    }

    fn simulate_apply(
        id: &HostSwitchPath,
        observed: Option<&HostVirtualSwitch>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<HostVirtualSwitch>, ProviderError> {
        match change {
            ChangeRequest::Create(patch) => {
                if observed.is_some() {
                    return Err(ProviderError::rejected(format!(
                        "virtual switch {id} already exists"
                    )));
                }
                let mut switch = HostVirtualSwitch::new(id.switch.clone());
                apply_patch(&mut switch, patch);
                Ok(Some(switch))
            }
            ChangeRequest::Update(patch) => {
                update_existing(observed, |switch| {
                    apply_patch(switch, patch);
                    Ok(())
                })
            }
            ChangeRequest::Delete => {
                let switch = observed.ok_or(ProviderError::NotFound)?;
                if !switch.portgroups.is_empty() {
                    return Err(ProviderError::rejected(format!(
                        "virtual switch {id} still has port groups"
                    )));
                }
                Ok(None)
            }
        }
    }
}

fn compare_sizing(
    desired: &VssSpec,
    observed: &HostVirtualSwitch,
) -> (Vec<FieldMismatch>, VirtualSwitchSpecPatch) {
    let mut target = observed.clone();
    target.mtu = desired.mtu.unwrap_or(observed.mtu);
    target.num_ports = desired.num_ports.unwrap_or(observed.num_ports);
    if target.equivalent(observed) {
        return (Vec::new(), VirtualSwitchSpecPatch::default());
    }

    let mut cmp = FieldComparison::new();
    let patch = VirtualSwitchSpecPatch {
        mtu: cmp.scalar("mtu", desired.mtu.as_ref(), &observed.mtu),
        num_ports: cmp.scalar(
            "num_ports",
            desired.num_ports.as_ref(),
            &observed.num_ports,
        ),
        ..VirtualSwitchSpecPatch::default()
    };
    (cmp.finish(), patch)
}

fn validate_sizing(desired: &VssSpec) -> Result<(), PlanError> {
    if let Some(mtu) = desired.mtu {
        if !MTU_RANGE.contains(&mtu) {
            return Err(PlanError::Malformed {
                reason: format!("MTU {mtu} is outside {MTU_RANGE:?}"),
            });
        }
    }
    if let Some(ports) = desired.num_ports {
        if !NUM_PORTS_RANGE.contains(&ports) {
            return Err(PlanError::Malformed {
                reason: format!(
                    "port count {ports} is outside {NUM_PORTS_RANGE:?}"
                ),
            });
        }
    }
    Ok(())
}

/// The physical NIC bridge of an existing switch.
#[derive(Debug)]
pub struct VssBridge;

impl Resource for VssBridge {
    const KIND: ResourceKind = ResourceKind::VssBridge;

    type Id = HostSwitchPath;
    type Desired = VssBridgeSpec;
    type Observed = HostVirtualSwitch;
    type Create = NotCreatable;
    type Update = VirtualSwitchSpecPatch;

    fn mismatches(
        desired: &VssBridgeSpec,
        observed: &HostVirtualSwitch,
    ) -> Vec<FieldMismatch> {
        let mut cmp = FieldComparison::new();
        cmp.within("bridge");
        match (&desired.bridge, &observed.bridge) {
            (BridgeSpec::Auto, Some(SwitchBridge::Auto)) => (),
            (
                BridgeSpec::Bond {
                    beacon_interval,
                    link_discovery_policy,
                    nics,
                },
                Some(SwitchBridge::Bond {
                    beacon_interval: current_interval,
                    link_discovery_policy: current_ldp,
                    nics: current_nics,
                }),
            ) => {
                cmp.set(
                    "nics",
                    Some(nics.as_slice()),
                    Some(current_nics.as_slice()),
                );
                cmp.scalar(
                    "beacon_interval",
                    beacon_interval.as_ref(),
                    current_interval,
                );
                cmp.optional(
                    "link_discovery_policy",
                    link_discovery_policy.as_ref(),
                    current_ldp.as_ref(),
                );
            }
            (
                BridgeSpec::Simple { nics },
                Some(SwitchBridge::Simple { nics: current_nics }),
            ) => {
                cmp.set(
                    "nics",
                    Some(nics.as_slice()),
                    Some(current_nics.as_slice()),
                );
            }
            (desired, observed) => {
                cmp.mismatch(
                    "kind",
                    bridge_spec_kind(desired),
                    observed.as_ref().map_or("none", bridge_kind),
                );
            }
        }
        cmp.finish()
    }

    fn plan_create(
        _id: &HostSwitchPath,
        _desired: &VssBridgeSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &VssBridgeSpec,
        observed: &HostVirtualSwitch,
    ) -> Result<VirtualSwitchSpecPatch, PlanError> {
        let bridge = match &desired.bridge {
            BridgeSpec::Auto => SwitchBridge::Auto,
            BridgeSpec::Simple { nics } => {
                SwitchBridge::Simple { nics: unique_nics(nics)? }
            }
            BridgeSpec::Bond {
                beacon_interval,
                link_discovery_policy,
                nics,
            } => {
                // Unmanaged bond settings keep whatever the switch has now.
                let (current_interval, current_ldp) = match &observed.bridge {
                    Some(SwitchBridge::Bond {
                        beacon_interval,
                        link_discovery_policy,
                        ..
                    }) => (Some(*beacon_interval), *link_discovery_policy),
                    _ => (None, None),
                };
                SwitchBridge::Bond {
                    beacon_interval: beacon_interval
                        .or(current_interval)
                        .unwrap_or(DEFAULT_BEACON_INTERVAL),
                    link_discovery_policy: link_discovery_policy
                        .or(current_ldp),
                    nics: unique_nics(nics)?,
                }
            }
        };
        Ok(VirtualSwitchSpecPatch {
            bridge: Some(bridge),
            ..VirtualSwitchSpecPatch::default()
        })
    }

    fn simulate_apply(
        _id: &HostSwitchPath,
        observed: Option<&HostVirtualSwitch>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<HostVirtualSwitch>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(patch) => {
                update_existing(observed, |switch| {
                    apply_patch(switch, patch);
                    Ok(())
                })
            }
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "a switch bridge cannot be removed on its own",
            )),
        }
    }
}

fn bridge_spec_kind(bridge: &BridgeSpec) -> &'static str {
    match bridge {
        BridgeSpec::Auto => "auto",
        BridgeSpec::Bond { .. } => "bond",
        BridgeSpec::Simple { .. } => "simple",
    }
}

fn bridge_kind(bridge: &SwitchBridge) -> &'static str {
    match bridge {
        SwitchBridge::Auto => "auto",
        SwitchBridge::Bond { .. } => "bond",
        SwitchBridge::Simple { .. } => "simple",
    }
}

fn unique_nics(nics: &[String]) -> Result<Vec<String>, PlanError> {
    let dups = super::duplicates(nics.iter().map(String::as_str));
    if !dups.is_empty() {
        return Err(PlanError::Malformed {
            reason: format!("NICs bridged twice: {}", dups.join(", ")),
        });
    }
    Ok(nics.to_vec())
}

/// The teaming, security and traffic shaping policy of an existing switch.
#[derive(Debug)]
pub struct VssPolicy;

impl Resource for VssPolicy {
    const KIND: ResourceKind = ResourceKind::VssPolicy;

    type Id = HostSwitchPath;
    type Desired = VssPolicySpec;
    type Observed = HostVirtualSwitch;
    type Create = NotCreatable;
    type Update = VirtualSwitchSpecPatch;

    fn mismatches(
        desired: &VssPolicySpec,
        observed: &HostVirtualSwitch,
    ) -> Vec<FieldMismatch> {
        compare_policy(&desired.policy, &observed.policy).0
    }

    fn plan_create(
        _id: &HostSwitchPath,
        _desired: &VssPolicySpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &VssPolicySpec,
        observed: &HostVirtualSwitch,
    ) -> Result<VirtualSwitchSpecPatch, PlanError> {
        let teaming = &desired.policy.teaming;
        if let (Some(active), Some(standby)) =
            (&teaming.active_nics, &teaming.standby_nics)
        {
            if let Some(nic) = active.iter().find(|nic| standby.contains(nic)) {
                return Err(PlanError::Malformed {
                    reason: format!("NIC {nic} is both active and standby"),
                });
            }
        }
        let (_, policy) = compare_policy(&desired.policy, &observed.policy);
        Ok(VirtualSwitchSpecPatch {
            policy: Some(policy),
            ..VirtualSwitchSpecPatch::default()
        })
    }

    fn simulate_apply(
        _id: &HostSwitchPath,
        observed: Option<&HostVirtualSwitch>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<HostVirtualSwitch>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(patch) => {
                update_existing(observed, |switch| {
                    apply_patch(switch, patch);
                    Ok(())
                })
            }
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "a switch policy cannot be removed on its own",
            )),
        }
    }
}

/// Compare policies field by field. Teaming NIC lists are in failover order,
/// so they are compared as sequences.
fn compare_policy(
    desired: &NetworkPolicySpec,
    observed: &NetworkPolicy,
) -> (Vec<FieldMismatch>, NetworkPolicySpec) {
    let mut cmp = FieldComparison::new();

    let d = &desired.teaming;
    let o = &observed.teaming;
    cmp.within("teaming");
    let teaming = NicTeamingSpec {
        policy: cmp.scalar("policy", d.policy.as_ref(), &o.policy),
        notify_switches: cmp.scalar(
            "notify_switches",
            d.notify_switches.as_ref(),
            &o.notify_switches,
        ),
        rolling_order: cmp.scalar(
            "rolling_order",
            d.rolling_order.as_ref(),
            &o.rolling_order,
        ),
        check_beacon: cmp.scalar(
            "check_beacon",
            d.check_beacon.as_ref(),
            &o.check_beacon,
        ),
        active_nics: cmp.sequence(
            "active_nics",
            d.active_nics.as_deref(),
            &o.active_nics,
        ),
        standby_nics: cmp.sequence(
            "standby_nics",
            d.standby_nics.as_deref(),
            &o.standby_nics,
        ),
    };

    let d = &desired.security;
    let o = &observed.security;
    cmp.within("security");
    let security = SecuritySpec {
        allow_promiscuous: cmp.scalar(
            "allow_promiscuous",
            d.allow_promiscuous.as_ref(),
            &o.allow_promiscuous,
        ),
        forged_transmits: cmp.scalar(
            "forged_transmits",
            d.forged_transmits.as_ref(),
            &o.forged_transmits,
        ),
        mac_changes: cmp.scalar(
            "mac_changes",
            d.mac_changes.as_ref(),
            &o.mac_changes,
        ),
    };

    let d = &desired.shaping;
    let o = &observed.shaping;
    cmp.within("shaping");
    let shaping = ShapingSpec {
        enabled: cmp.scalar("enabled", d.enabled.as_ref(), &o.enabled),
        average_bandwidth: cmp.optional(
            "average_bandwidth",
            d.average_bandwidth.as_ref(),
            o.average_bandwidth.as_ref(),
        ),
        peak_bandwidth: cmp.optional(
            "peak_bandwidth",
            d.peak_bandwidth.as_ref(),
            o.peak_bandwidth.as_ref(),
        ),
        burst_size: cmp.optional(
            "burst_size",
            d.burst_size.as_ref(),
            o.burst_size.as_ref(),
        ),
    };

    (cmp.finish(), NetworkPolicySpec { teaming, security, shaping })
}

/// Apply a switch patch the way `UpdateVirtualSwitch` does.
fn apply_patch(switch: &mut HostVirtualSwitch, patch: &VirtualSwitchSpecPatch) {
    if let Some(mtu) = patch.mtu {
        switch.mtu = mtu;
    }
    if let Some(num_ports) = patch.num_ports {
        let in_use = switch.num_ports - switch.num_ports_available;
        switch.num_ports = num_ports;
        switch.num_ports_available = (num_ports - in_use).max(0);
    }
    if let Some(bridge) = &patch.bridge {
        switch.pnics = match bridge {
            SwitchBridge::Auto => Vec::new(),
            SwitchBridge::Bond { nics, .. } | SwitchBridge::Simple { nics } => {
                nics.clone()
            }
        };
        switch.bridge = Some(bridge.clone());
    }
    if let Some(policy) = &patch.policy {
        apply_policy(&mut switch.policy, policy);
    }
}

fn apply_policy(policy: &mut NetworkPolicy, patch: &NetworkPolicySpec) {
    let teaming = &mut policy.teaming;
    let t = &patch.teaming;
    if let Some(v) = t.policy {
        teaming.policy = v;
    }
    if let Some(v) = t.notify_switches {
        teaming.notify_switches = v;
    }
    if let Some(v) = t.rolling_order {
        teaming.rolling_order = v;
    }
    if let Some(v) = t.check_beacon {
        teaming.check_beacon = v;
    }
    if let Some(v) = &t.active_nics {
        teaming.active_nics = v.clone();
    }
    if let Some(v) = &t.standby_nics {
        teaming.standby_nics = v.clone();
    }

    let security = &mut policy.security;
    let s = &patch.security;
    if let Some(v) = s.allow_promiscuous {
        security.allow_promiscuous = v;
    }
    if let Some(v) = s.forged_transmits {
        security.forged_transmits = v;
    }
    if let Some(v) = s.mac_changes {
        security.mac_changes = v;
    }

    let shaping = &mut policy.shaping;
    let s = &patch.shaping;
    if let Some(v) = s.enabled {
        shaping.enabled = v;
    }
    if let Some(v) = s.average_bandwidth {
        shaping.average_bandwidth = Some(v);
    }
    if let Some(v) = s.peak_bandwidth {
        shaping.peak_bandwidth = Some(v);
    }
    if let Some(v) = s.burst_size {
        shaping.burst_size = Some(v);
    }
}
