// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! [`Resource`](crate::Resource) implementations, one per kind of managed
//! entity.

mod advanced;
mod cluster;
mod dns;
mod ntp;
mod perf;
mod satp;
mod service;
mod syslog;
mod vswitch;

pub use advanced::HostAdvancedSettings;
pub use cluster::Cluster;
pub use dns::Dns;
pub use ntp::Ntp;
pub use perf::PerfIntervalConfig;
pub use satp::SatpClaimRules;
pub use satp::SatpRuleChange;
pub use service::HostServices;
pub use syslog::Syslog;
pub use vswitch::Vss;
pub use vswitch::VssBridge;
pub use vswitch::VssPolicy;

use crate::provider::ProviderError;

/// Apply an in-place reconfiguration to an entity that must already exist.
fn update_existing<T: Clone>(
    observed: Option<&T>,
    update: impl FnOnce(&mut T) -> Result<(), ProviderError>,
) -> Result<Option<T>, ProviderError> {
    let mut state = observed.cloned().ok_or(ProviderError::NotFound)?;
    update(&mut state)?;
    Ok(Some(state))
}

/// Report names that occur more than once, in first-seen order.
fn duplicates<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = std::collections::BTreeSet::new();
    let mut dups = Vec::new();
    for name in names {
        if !seen.insert(name) && !dups.contains(&name) {
            dups.push(name);
        }
    }
    dups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_reported_once() {
        assert!(duplicates(["a", "b"]).is_empty());
        assert_eq!(duplicates(["a", "b", "a", "a", "b"]), vec!["a", "b"]);
    }

    #[test]
    fn update_existing_requires_presence() {
        let result = update_existing::<i32>(None, |_| Ok(()));
        assert!(matches!(result, Err(ProviderError::NotFound)));
        let result = update_existing(Some(&1), |v| {
            *v += 1;
            Ok(())
        });
        assert_eq!(result.unwrap(), Some(2));
    }
}
