// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host syslog configuration.

use super::update_existing;
use crate::equivalence::FieldComparison;
use crate::equivalence::FieldMismatch;
use crate::planner::PlanError;
use crate::provider::ProviderError;
use crate::resource::Resource;
use crate::resource::ResourceChange;
use crate::resource::ResourceKind;
use vsphere_reconciler_types::syslog::SyslogConfig;
use vsphere_reconciler_types::syslog::SyslogSpec;
use vsphere_reconciler_types::ChangeRequest;
use vsphere_reconciler_types::HostRef;
use vsphere_reconciler_types::NotCreatable;

#[derive(Debug)]
pub struct Syslog;

impl Resource for Syslog {
    const KIND: ResourceKind = ResourceKind::Syslog;

    type Id = HostRef;
    type Desired = SyslogSpec;
    type Observed = SyslogConfig;
    type Create = NotCreatable;
    type Update = SyslogSpec;

    fn mismatches(
        desired: &SyslogSpec,
        observed: &SyslogConfig,
    ) -> Vec<FieldMismatch> {
        compare(desired, observed).0
    }

    fn plan_create(
        _id: &HostRef,
        _desired: &SyslogSpec,
    ) -> Result<NotCreatable, PlanError> {
        Err(PlanError::NotCreatable { kind: Self::KIND })
    }

    fn plan_update(
        desired: &SyslogSpec,
        observed: &SyslogConfig,
    ) -> Result<SyslogSpec, PlanError> {
        let numeric = [
            ("default_rotate", desired.default_rotate),
            ("default_size", desired.default_size),
            ("default_timeout", desired.default_timeout),
            ("queue_drop_mark", desired.queue_drop_mark),
            ("drop_log_rotate", desired.drop_log_rotate),
            ("drop_log_size", desired.drop_log_size),
        ];
        if let Some((field, value)) =
            numeric.iter().find(|(_, v)| v.is_some_and(|v| v < 0))
        {
            return Err(PlanError::Malformed {
                reason: format!(
                    "syslog {field} must not be negative: {value:?}"
                ),
            });
        }
        Ok(compare(desired, observed).1)
    }

    fn simulate_apply(
        _id: &HostRef,
        observed: Option<&SyslogConfig>,
        change: &ResourceChange<Self>,
    ) -> Result<Option<SyslogConfig>, ProviderError> {
        match change {
            ChangeRequest::Create(never) => match *never {},
            ChangeRequest::Update(patch) => update_existing(observed, |config| {
                apply_patch(config, patch);
                Ok(())
            }),
            ChangeRequest::Delete => Err(ProviderError::rejected(
                "host syslog configuration cannot be removed",
            )),
        }
    }
}

// Every field is managed when declared; none is excluded.
fn compare(
    desired: &SyslogSpec,
    observed: &SyslogConfig,
) -> (Vec<FieldMismatch>, SyslogSpec) {
    let mut cmp = FieldComparison::new();
    let d = desired;
    let o = observed;
    let patch = SyslogSpec {
        log_host: cmp.scalar("log_host", d.log_host.as_ref(), &o.log_host),
        log_dir: cmp.scalar("log_dir", d.log_dir.as_ref(), &o.log_dir),
        log_dir_unique: cmp.scalar(
            "log_dir_unique",
            d.log_dir_unique.as_ref(),
            &o.log_dir_unique,
        ),
        check_ssl_certs: cmp.scalar(
            "check_ssl_certs",
            d.check_ssl_certs.as_ref(),
            &o.check_ssl_certs,
        ),
        default_rotate: cmp.scalar(
            "default_rotate",
            d.default_rotate.as_ref(),
            &o.default_rotate,
        ),
        default_size: cmp.scalar(
            "default_size",
            d.default_size.as_ref(),
            &o.default_size,
        ),
        default_timeout: cmp.scalar(
            "default_timeout",
            d.default_timeout.as_ref(),
            &o.default_timeout,
        ),
        queue_drop_mark: cmp.scalar(
            "queue_drop_mark",
            d.queue_drop_mark.as_ref(),
            &o.queue_drop_mark,
        ),
        drop_log_rotate: cmp.scalar(
            "drop_log_rotate",
            d.drop_log_rotate.as_ref(),
            &o.drop_log_rotate,
        ),
        drop_log_size: cmp.scalar(
            "drop_log_size",
            d.drop_log_size.as_ref(),
            &o.drop_log_size,
        ),
    };
    (cmp.finish(), patch)
}

fn apply_patch(config: &mut SyslogConfig, patch: &SyslogSpec) {
    if let Some(v) = &patch.log_host {
        config.log_host = v.clone();
    }
    if let Some(v) = &patch.log_dir {
        config.log_dir = v.clone();
    }
    if let Some(v) = patch.log_dir_unique {
        config.log_dir_unique = v;
    }
    if let Some(v) = patch.check_ssl_certs {
        config.check_ssl_certs = v;
    }
    if let Some(v) = patch.default_rotate {
        config.default_rotate = v;
    }
    if let Some(v) = patch.default_size {
        config.default_size = v;
    }
    if let Some(v) = patch.default_timeout {
        config.default_timeout = v;
    }
    if let Some(v) = patch.queue_drop_mark {
        config.queue_drop_mark = v;
    }
    if let Some(v) = patch.drop_log_rotate {
        config.drop_log_rotate = v;
    }
    if let Some(v) = patch.drop_log_size {
        config.drop_log_size = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equivalence::resource_equivalent;
    use crate::planner::plan;
    use assert_matches::assert_matches;

    fn observed() -> SyslogConfig {
        SyslogConfig {
            log_host: "udp://syslog.example.com:514".to_string(),
            log_dir: "[] /scratch/log".to_string(),
            log_dir_unique: false,
            check_ssl_certs: true,
            default_rotate: 8,
            default_size: 1024,
            default_timeout: 180,
            queue_drop_mark: 90,
            drop_log_rotate: 10,
            drop_log_size: 100,
        }
    }

    #[test]
    fn every_declared_field_is_compared() {
        let current = observed();
        let desired = SyslogSpec {
            log_host: Some(current.log_host.clone()),
            log_dir_unique: Some(true),
            drop_log_size: Some(200),
            ..SyslogSpec::default()
        };
        let fields: Vec<_> = Syslog::mismatches(&desired, &current)
            .into_iter()
            .map(|m| m.field)
            .collect();
        assert_eq!(fields, ["log_dir_unique", "drop_log_size"]);

        let host = HostRef::new("esx-01");
        let change = plan::<Syslog>(&host, &desired, Some(&current)).unwrap();
        assert_eq!(
            change,
            ChangeRequest::Update(SyslogSpec {
                log_dir_unique: Some(true),
                drop_log_size: Some(200),
                ..SyslogSpec::default()
            })
        );
        let after = Syslog::simulate_apply(&host, Some(&current), &change)
            .unwrap()
            .unwrap();
        assert!(resource_equivalent::<Syslog>(&desired, Some(&after)));
    }

    #[test]
    fn negative_sizes_are_malformed() {
        let desired =
            SyslogSpec { default_size: Some(-1), ..SyslogSpec::default() };
        let host = HostRef::new("esx-01");
        assert_matches!(
            plan::<Syslog>(&host, &desired, Some(&observed())),
            Err(PlanError::Malformed { reason })
                if reason.contains("default_size")
        );
    }
}
