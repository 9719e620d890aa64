// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deciding whether two states agree.
//!
//! There are two layers here:
//!
//! * [`Equivalent`] compares two values of the same observed type using the
//!   rules of that type (set semantics for unordered collections, excluded
//!   descriptive fields, and so on).
//! * [`FieldComparison`] compares a partially-populated desired spec against
//!   an observed value field by field, skipping every field the caller did
//!   not declare and recording a [`FieldMismatch`] for each one that differs.
//!
//! Neither layer ever consults reference identity.

use crate::resource::Resource;
use serde::Serialize;
use std::fmt;
use std::fmt::Debug;
use vsphere_reconciler_types::advanced::AdvancedSetting;
use vsphere_reconciler_types::cluster::ClusterConfig;
use vsphere_reconciler_types::cluster::ClusterDrsConfig;
use vsphere_reconciler_types::cluster::ClusterHaConfig;
use vsphere_reconciler_types::datetime::HostDateTimeConfig;
use vsphere_reconciler_types::datetime::NtpConfig;
use vsphere_reconciler_types::dns::DnsConfig;
use vsphere_reconciler_types::perf::PerfInterval;
use vsphere_reconciler_types::service::HostService;
use vsphere_reconciler_types::service::ServiceConfig;
use vsphere_reconciler_types::syslog::SyslogConfig;
use vsphere_reconciler_types::vswitch::HostVirtualSwitch;
use vsphere_reconciler_types::Ensure;
use vsphere_reconciler_types::ManagedObjectRef;

/// Structural equivalence between two values of the same type.
///
/// Implementations must be reflexive, symmetric and transitive.
pub trait Equivalent {
    fn equivalent(&self, other: &Self) -> bool;
}

/// Equivalence lifted over absence: two absent values agree, and an absent
/// value never agrees with a present one (not even an empty one).
pub fn equivalent_opt<T: Equivalent>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.equivalent(b),
        (Some(_), None) | (None, Some(_)) => false,
    }
}

/// Multiset equality: same cardinality, and every element of each side has
/// a match on the other.
pub fn same_elements<T: Ord + Clone>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

fn same_elements_opt<T: Ord + Clone>(a: Option<&[T]>, b: Option<&[T]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => same_elements(a, b),
        _ => false,
    }
}

impl Equivalent for ManagedObjectRef {
    fn equivalent(&self, other: &Self) -> bool {
        self == other
    }
}

impl Equivalent for NtpConfig {
    // `config_files` is reported by the endpoint but never managed.
    fn equivalent(&self, other: &Self) -> bool {
        same_elements_opt(self.servers.as_deref(), other.servers.as_deref())
    }
}

impl Equivalent for HostDateTimeConfig {
    fn equivalent(&self, other: &Self) -> bool {
        equivalent_opt(self.ntp.as_ref(), other.ntp.as_ref())
    }
}

impl Equivalent for DnsConfig {
    // Address and search-domain lists are operationally derived; they are not
    // part of what identifies a DNS configuration.
    fn equivalent(&self, other: &Self) -> bool {
        self.dhcp_enabled == other.dhcp_enabled
            && self.domain_name == other.domain_name
            && self.host_name == other.host_name
            && self.vnic_device == other.vnic_device
            && self.ipv6_vnic_device == other.ipv6_vnic_device
    }
}

impl Equivalent for ServiceConfig {
    fn equivalent(&self, other: &Self) -> bool {
        self == other
    }
}

impl Equivalent for HostService {
    fn equivalent(&self, other: &Self) -> bool {
        ServiceConfig::from(self).equivalent(&ServiceConfig::from(other))
    }
}

impl Equivalent for AdvancedSetting {
    /// Two settings are in sync when both name and value match. Use
    /// [`same_setting`] to find "the same setting" regardless of value.
    fn equivalent(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// Whether two settings name the same option.
pub fn same_setting(a: &AdvancedSetting, b: &AdvancedSetting) -> bool {
    a.name == b.name
}

impl Equivalent for HostVirtualSwitch {
    // Coarse equality: NIC, bridge and policy differences are handled by
    // their own resources.
    fn equivalent(&self, other: &Self) -> bool {
        self.name == other.name
            && self.num_ports == other.num_ports
            && self.mtu == other.mtu
    }
}

impl Equivalent for ClusterHaConfig {
    fn equivalent(&self, other: &Self) -> bool {
        self == other
    }
}

impl Equivalent for ClusterDrsConfig {
    fn equivalent(&self, other: &Self) -> bool {
        self.enabled == other.enabled
            && self.default_vm_behavior == other.default_vm_behavior
            && self.vmotion_rate == other.vmotion_rate
            && same_elements(&self.options, &other.options)
    }
}

impl Equivalent for ClusterConfig {
    fn equivalent(&self, other: &Self) -> bool {
        self.ha.equivalent(&other.ha) && self.drs.equivalent(&other.drs)
    }
}

impl Equivalent for SyslogConfig {
    fn equivalent(&self, other: &Self) -> bool {
        self == other
    }
}

impl Equivalent for PerfInterval {
    fn equivalent(&self, other: &Self) -> bool {
        self == other
    }
}

/// A single field whose desired value differs from the observed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMismatch {
    pub field: String,
    pub desired: String,
    pub observed: String,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: desired {}, observed {}",
            self.field, self.desired, self.observed
        )
    }
}

/// Accumulates field mismatches between a desired spec and an observed
/// value.
///
/// Each comparison method skips fields whose desired value is `None` and
/// returns the desired value when the field differs, so that a planner can
/// use the same pass to build its update payload.
#[derive(Debug, Default)]
pub struct FieldComparison {
    prefix: Option<String>,
    mismatches: Vec<FieldMismatch>,
}

impl FieldComparison {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every field recorded from here on with `prefix`.
    pub fn within(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.prefix = Some(prefix.into());
        self
    }

    fn record(&mut self, field: &str, desired: String, observed: String) {
        let field = match &self.prefix {
            Some(prefix) => format!("{prefix}.{field}"),
            None => field.to_string(),
        };
        self.mismatches.push(FieldMismatch { field, desired, observed });
    }

    /// Compare a scalar field.
    pub fn scalar<T>(
        &mut self,
        field: &str,
        desired: Option<&T>,
        observed: &T,
    ) -> Option<T>
    where
        T: PartialEq + Clone + Debug,
    {
        let desired = desired?;
        if desired == observed {
            return None;
        }
        self.record(field, format!("{desired:?}"), format!("{observed:?}"));
        Some(desired.clone())
    }

    /// Compare a scalar field whose observed value may itself be unset.
    pub fn optional<T>(
        &mut self,
        field: &str,
        desired: Option<&T>,
        observed: Option<&T>,
    ) -> Option<T>
    where
        T: PartialEq + Clone + Debug,
    {
        let desired = desired?;
        if Some(desired) == observed {
            return None;
        }
        self.record(field, format!("{desired:?}"), format!("{observed:?}"));
        Some(desired.clone())
    }

    /// Compare an unordered collection.
    ///
    /// An unset observed collection never matches a declared one, even an
    /// empty one.
    pub fn set<T>(
        &mut self,
        field: &str,
        desired: Option<&[T]>,
        observed: Option<&[T]>,
    ) -> Option<Vec<T>>
    where
        T: Ord + Clone + Debug,
    {
        let desired = desired?;
        if let Some(observed) = observed {
            if same_elements(desired, observed) {
                return None;
            }
        }
        self.record(field, format!("{desired:?}"), format!("{observed:?}"));
        Some(desired.to_vec())
    }

    /// Compare an ordered collection, where position carries meaning.
    pub fn sequence<T>(
        &mut self,
        field: &str,
        desired: Option<&[T]>,
        observed: &[T],
    ) -> Option<Vec<T>>
    where
        T: PartialEq + Clone + Debug,
    {
        let desired = desired?;
        if desired == observed {
            return None;
        }
        self.record(field, format!("{desired:?}"), format!("{observed:?}"));
        Some(desired.to_vec())
    }

    /// Record a mismatch computed by the caller.
    pub fn mismatch(
        &mut self,
        field: &str,
        desired: impl fmt::Display,
        observed: impl fmt::Display,
    ) {
        self.record(field, desired.to_string(), observed.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn finish(self) -> Vec<FieldMismatch> {
        self.mismatches
    }
}

/// Every difference between the desired state of an entity of kind `R` and
/// its observed state (`None` if it does not exist).
///
/// An entity that should be absent is in sync exactly when it does not
/// exist; one that should be present is in sync when it exists and no
/// managed field differs.
pub fn resource_mismatches<R: Resource>(
    desired: &R::Desired,
    observed: Option<&R::Observed>,
) -> Vec<FieldMismatch> {
    let existence = |wanted: bool, found: bool| {
        vec![FieldMismatch {
            field: "exists".to_string(),
            desired: wanted.to_string(),
            observed: found.to_string(),
        }]
    };
    match (R::ensure(desired), observed) {
        (Ensure::Absent, None) => Vec::new(),
        (Ensure::Absent, Some(_)) => existence(false, true),
        (Ensure::Present, None) => existence(true, false),
        (Ensure::Present, Some(observed)) => R::mismatches(desired, observed),
    }
}

/// Whether an entity of kind `R` is in its desired state.
pub fn resource_equivalent<R: Resource>(
    desired: &R::Desired,
    observed: Option<&R::Observed>,
) -> bool {
    resource_mismatches::<R>(desired, observed).is_empty()
}
