// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host advanced settings.
//!
//! The host's option manager accepts per-key updates, so only the keys whose
//! values differ are sent. Keys the host does not know are never created.

use super::update_existing;
use crate::equivalence::same_setting;
use crate::equivalence::Equivalent;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::advanced::AdvancedSetting;
use vsphere_reconciler_types::advanced::AdvancedSettingsSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::HostRef;
use vsphere_reconciler_types::NotCreatable;

#[derive(Debug)]
pub struct HostAdvancedSettings;

impl Resource for HostAdvancedSettings {
    const KIND: ResourceKind = ResourceKind::AdvancedSettings;

    type Id = HostRef;
    type Desired = AdvancedSettingsSpec;
    type Observed = Vec<AdvancedSetting>;
    type Create = NotCreatable;
    /// Payload of `UpdateOptions`: only the keys that differ.
    type Update = Vec<AdvancedSetting>;

    fn mismatches(
        desired: &AdvancedSettingsSpec,
        observed: &Vec<AdvancedSetting>,
    ) -> Vec<FieldMismatch> {
        let mut cmp = FieldComparison::new();
        let _ = compare(&mut cmp, desired, observed);
        cmp.finish()
    }

    fn plan_create(
        _id: &HostRef,
        _desired: &AdvancedSettingsSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &AdvancedSettingsSpec,
        observed: &Vec<AdvancedSetting>,
    ) -> Result<Vec<AdvancedSetting>, PlanError> {
        let mut cmp = FieldComparison::new();
        compare(&mut cmp, desired, observed)
    }

    fn simulate_apply(
        _id: &HostRef,
        observed: Option<&Vec<AdvancedSetting>>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<Vec<AdvancedSetting>>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(updates) => {
                update_existing(observed, |settings| {
                    for update in updates {
                        let setting = settings
                            .iter_mut()
                            .find(|s| same_setting(s, update))
                            .ok_or_else(|| {
                                ProviderError::rejected(format!(
                                    "invalid option name {:?}",
                                    update.name
                                ))
                            })?;
                        setting.value = update.value.clone();
                    }
                    Ok(())
                })
            }
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "host advanced settings cannot be removed",
            )),
        }
    }
}

/// Look up each declared key by name, recording mismatches and collecting
/// the settings to send.
///
/// The first unknown key is an error, but comparison carries on so that
/// every mismatch is still recorded.
fn compare(
    cmp: &mut FieldComparison,
    desired: &AdvancedSettingsSpec,
    observed: &[AdvancedSetting],
) -> Result<Vec<AdvancedSetting>, PlanError> {
    let mut unknown = None;
    let mut updates = Vec::new();
    for (name, value) in &desired.settings {
        let target = AdvancedSetting::new(name.clone(), value.clone());
        let current = observed.iter().find(|s| same_setting(s, &target));
        match current {
            None => {
                cmp.mismatch(name, value, "unset");
                unknown.get_or_insert_with(|| name.clone());
            }
            Some(current) if !target.equivalent(current) => {
                cmp.mismatch(name, value, &current.value);
                updates.push(target);
            }
            Some(_) => (),
        }
    }
    match unknown {
        Some(name) => Err(PlanError::UnknownSetting { name }),
        None => Ok(updates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::resource_equivalent;
    use crate::planner::plan;
    use assert_matches::assert_matches;
    use vsphere_reconciler_types::advanced::SettingValue;

    fn host() -> HostRef {
        HostRef::new("esx-01")
    }

    fn observed() -> Vec<AdvancedSetting> {
        vec![
            AdvancedSetting::int("Mem.ShareForceSalting", 2),
            AdvancedSetting::new("Syslog.global.logHost", "udp://log:514"),
            AdvancedSetting::int("UserVars.SuppressShellWarning", 0),
        ]
    }

    #[test]
    fn only_mismatched_keys_are_updated() {
        let desired: AdvancedSettingsSpec = [
            ("Mem.ShareForceSalting", SettingValue::Int(2)),
            ("UserVars.SuppressShellWarning", SettingValue::Int(1)),
        ]
        .into_iter()
        .collect();
        let current = observed();

        let mismatches = HostAdvancedSettings::mismatches(&desired, &current);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].field, "UserVars.SuppressShellWarning");

        let change =
            plan::<HostAdvancedSettings>(&host(), &desired, Some(&current))
                .unwrap();
        assert_eq!(
            change,
            ChangeRequest::Update(vec![AdvancedSetting::int(
                "UserVars.SuppressShellWarning",
                1
            )])
        );

        let after = HostAdvancedSettings::simulate_apply(
            &host(),
            Some(&current),
            &change,
        )
        .unwrap()
                .unwrap();
        assert_eq!(after.len(), current.len());
        assert!(resource_equivalent::<HostAdvancedSettings>(
            &desired,
            Some(&after)
        ));
    }

    #[test]
    fn value_type_matters() {
        let desired: AdvancedSettingsSpec =
            [("Mem.ShareForceSalting", "2")].into_iter().collect();
        assert!(!HostAdvancedSettings::mismatches(&desired, &observed())
            .is_empty());
    }

    #[test]
    fn unknown_key_is_not_created() {
        let desired: AdvancedSettingsSpec = [
            ("Net.NotARealOption", SettingValue::Int(1)),
            ("UserVars.SuppressShellWarning", SettingValue::Int(1)),
        ]
        .into_iter()
        .collect();
        let mismatches =
            HostAdvancedSettings::mismatches(&desired, &observed());
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].observed, "unset");
        assert_matches!(
            plan::<HostAdvancedSettings>(&host(), &desired, Some(&observed())),
            Err(PlanError::UnknownSetting { name })
                if name == "Net.NotARealOption"
        );
    }
}
