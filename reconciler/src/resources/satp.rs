// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SATP claim rules of a host's storage array type plugin.
//!
//! The entity is the host's rule list, which always exists. Each desired
//! rule declares whether a matching rule should be in that list.

use super::update_existing;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use serde::Serialize;
use vsphere_reconciler_types::storage::SatpClaimRule;
use vsphere_reconciler_types::storage::SatpClaimRuleSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::Ensure;
use vsphere_reconciler_types::HostRef;
use vsphere_reconciler_types::NotCreatable;

/// `esxcli storage nmp satp rule add/remove` invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum SatpRuleChange {
    Add(SatpClaimRule),
    /// Every listed rule the desired rule matches, each named exactly as
    /// the host lists it. Never empty.
    Remove(Vec<SatpClaimRule>),
}

#[derive(Debug)]
pub struct SatpClaimRules;

impl Resource for SatpClaimRules {
    const KIND: ResourceKind = ResourceKind::SatpClaimRule;

    type Id = HostRef;
    type Desired = SatpClaimRuleSpec;
    type Observed = Vec<SatpClaimRule>;
    type Create = NotCreatable;
    type Update = SatpRuleChange;

    fn mismatches(
        desired: &SatpClaimRuleSpec,
        observed: &Vec<SatpClaimRule>,
    ) -> Vec<FieldMismatch> {
        let found =
            observed.iter().any(|rule| rule_matches(&desired.rule, rule));
        let wanted = desired.ensure == Ensure::Present;
        if found == wanted {
            return Vec::new();
        }
        vec![FieldMismatch {
            field: format!("rules.{}", desired.rule.name),
            desired: presence(wanted).to_string(),
            observed: presence(found).to_string(),
        }]
    }

    fn plan_create(
        _id: &HostRef,
        _desired: &SatpClaimRuleSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &SatpClaimRuleSpec,
        observed: &Vec<SatpClaimRule>,
    ) -> Result<SatpRuleChange, PlanError> {
        if desired.rule.name.is_empty() {
            return Err(PlanError::Malformed {
                reason: "SATP claim rule must name its SATP".to_string(),
            });
        }
        match desired.ensure {
            Ensure::Present => Ok(SatpRuleChange::Add(desired.rule.clone())),
            Ensure::Absent => {
                let matching: Vec<_> = observed
                    .iter()
                    .filter(|rule| rule_matches(&desired.rule, rule))
                    .cloned()
                    .collect();
                if matching.is_empty() {
                    return Err(PlanError::AlreadyConverged {
                        kind: Self::KIND,
                    });
                }
                Ok(SatpRuleChange::Remove(matching))
            }
        }
    }

    fn simulate_apply(
        _id: &HostRef,
        observed: Option<&Vec<SatpClaimRule>>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<Vec<SatpClaimRule>>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(SatpRuleChange::Add(rule)) => {
                update_existing(observed, |rules| {
                    if rules.contains(rule) {
                        return Err(ProviderError::rejected(format!(
                            "duplicate claim rule for {}",
                            rule.name
                        )));
                    }
                    rules.push(rule.clone());
                    Ok(())
                })
            }
            ChangeRequest::Update(SatpRuleChange::Remove(targets)) => {
                update_existing(observed, |rules| {
                    for target in targets {
                        let index = rules
                            .iter()
                            .position(|r| r == target)
                            .ok_or(ProviderError::NotFound)?;
                        rules.remove(index);
                    }
                    Ok(())
                })
            }
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "the claim rule list cannot be removed",
            )),
        }
    }
}

fn presence(present: bool) -> &'static str {
    if present {
        "present"
    } else {
        "absent"
    }
}

/// Whether `observed` satisfies every field `desired` declares.
fn rule_matches(desired: &SatpClaimRule, observed: &SatpClaimRule) -> bool {
    fn field(desired: &Option<String>, observed: &Option<String>) -> bool {
        desired.is_none() || desired == observed
    }

    desired.name == observed.name
        && field(&desired.psp_options, &observed.psp_options)
        && field(&desired.transport, &observed.transport)
        && field(&desired.description, &observed.description)
        && field(&desired.vendor, &observed.vendor)
        && field(&desired.device, &observed.device)
        && field(&desired.driver, &observed.driver)
        && field(&desired.claim_options, &observed.claim_options)
        && field(&desired.default_psp, &observed.default_psp)
        && field(&desired.options, &observed.options)
        && field(&desired.model, &observed.model)
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

    fn rule(vendor: &str, psp: Option<&str>) -> SatpClaimRule {
        SatpClaimRule {
            name: "VMW_SATP_ALUA".to_string(),
            vendor: Some(vendor.to_string()),
            default_psp: psp.map(str::to_string),
            ..SatpClaimRule::default()
        }
    }

    fn observed() -> Vec<SatpClaimRule> {
        vec![SatpClaimRule {
            description: Some("PURE FlashArray".to_string()),
            ..rule("PURE", Some("VMW_PSP_RR"))
        }]
    }

    #[test]
    fn undeclared_fields_do_not_prevent_a_match() {
        let desired = SatpClaimRuleSpec {
            ensure: Ensure::Present,
            rule: rule("PURE", None),
        };
        assert!(resource_equivalent::<SatpClaimRules>(
            &desired,
            Some(&observed())
        ));
    }

    #[test]
    fn missing_rule_is_added() {
        let desired = SatpClaimRuleSpec {
            ensure: Ensure::Present,
            rule: rule("NETAPP", Some("VMW_PSP_RR")),
        };
        let current = observed();
        let mismatches = SatpClaimRules::mismatches(&desired, &current);
        assert_eq!(mismatches[0].field, "rules.VMW_SATP_ALUA");
        assert_eq!(mismatches[0].desired, "present");

        let change =
            plan::<SatpClaimRules>(&host(), &desired, Some(&current)).unwrap();
        assert_eq!(
            change,
            ChangeRequest::Update(SatpRuleChange::Add(desired.rule.clone()))
        );
        let after =
            SatpClaimRules::simulate_apply(&host(), Some(&current), &change)
                .unwrap()
                .unwrap();
        assert_eq!(after.len(), 2);
        assert!(resource_equivalent::<SatpClaimRules>(&desired, Some(&after)));
    }

    #[test]
    fn absent_rule_is_removed_by_its_full_listing() {
        let desired = SatpClaimRuleSpec {
            ensure: Ensure::Absent,
            rule: rule("PURE", None),
        };
        let current = observed();
        let change =
            plan::<SatpClaimRules>(&host(), &desired, Some(&current)).unwrap();
        assert_eq!(
            change,
            ChangeRequest::Update(SatpRuleChange::Remove(current.clone()))
        );
        let after =
            SatpClaimRules::simulate_apply(&host(), Some(&current), &change)
                .unwrap()
                .unwrap();
        assert!(after.is_empty());
        assert!(resource_equivalent::<SatpClaimRules>(&desired, Some(&after)));
    }

    #[test]
    fn absent_rule_removes_every_listed_match() {
        let desired = SatpClaimRuleSpec {
            ensure: Ensure::Absent,
            rule: SatpClaimRule {
                name: "VMW_SATP_ALUA".to_string(),
                ..SatpClaimRule::default()
            },
        };
        let other = SatpClaimRule {
            name: "VMW_SATP_LOCAL".to_string(),
            ..SatpClaimRule::default()
        };
        let current = vec![
            rule("PURE", Some("VMW_PSP_RR")),
            other.clone(),
            rule("NETAPP", None),
        ];
        let change =
            plan::<SatpClaimRules>(&host(), &desired, Some(&current)).unwrap();
        assert_eq!(
            change,
            ChangeRequest::Update(SatpRuleChange::Remove(vec![
                current[0].clone(),
                current[2].clone(),
            ]))
        );
        let after =
            SatpClaimRules::simulate_apply(&host(), Some(&current), &change)
                .unwrap()
                .unwrap();
        assert_eq!(after, vec![other]);
        assert!(resource_equivalent::<SatpClaimRules>(&desired, Some(&after)));
    }

    #[test]
    fn absent_and_not_listed_is_in_sync() {
        let desired = SatpClaimRuleSpec {
            ensure: Ensure::Absent,
            rule: rule("HITACHI", None),
        };
        assert!(SatpClaimRules::mismatches(&desired, &observed()).is_empty());
    }

    #[test]
    fn unnamed_rule_is_malformed() {
        let desired = SatpClaimRuleSpec {
            ensure: Ensure::Present,
            rule: SatpClaimRule::default(),
        };
        assert_matches!(
            plan::<SatpClaimRules>(&host(), &desired, Some(&observed())),
            Err(PlanError::Malformed { .. })
        );
    }
}
