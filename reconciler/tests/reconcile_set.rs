// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciling entities of several kinds in one concurrent run.

use pretty_assertions::assert_eq;
use slog::o;
use slog::Logger;
use std::collections::BTreeMap;
use std::sync::Arc;
use vsphere_reconciler::fake::FakeProvider;
use vsphere_reconciler::resources::Cluster;
use vsphere_reconciler::resources::HostServices;
use vsphere_reconciler::resources::Ntp;
use vsphere_reconciler::ProviderError;
use vsphere_reconciler::ReconcileSet;
use vsphere_reconciler::ReconcileState;
use vsphere_reconciler::ReconcileSummary;
use vsphere_reconciler::ReconcilerConfig;
use vsphere_reconciler::ResourceKind;
use vsphere_reconciler_types::cluster::ClusterConfig;
use vsphere_reconciler_types::cluster::ClusterSpec;
use vsphere_reconciler_types::cluster::DrsAutomationLevel;
use vsphere_reconciler_types::cluster::DrsSpec;
use vsphere_reconciler_types::datetime::HostDateTimeConfig;
use vsphere_reconciler_types::datetime::NtpConfig;
use vsphere_reconciler_types::datetime::NtpSpec;
use vsphere_reconciler_types::service::HostService;
use vsphere_reconciler_types::service::HostServicesSpec;
use vsphere_reconciler_types::service::ServicePolicy;
use vsphere_reconciler_types::service::ServiceSpec;
use vsphere_reconciler_types::ChangeOp;
use vsphere_reconciler_types::ClusterPath;
use vsphere_reconciler_types::EntityId;
use vsphere_reconciler_types::HostRef;

fn ntp(servers: &[&str]) -> HostDateTimeConfig {
    HostDateTimeConfig {
        ntp: Some(NtpConfig::with_servers(servers.iter().copied())),
    }
}

fn ssh(policy: ServicePolicy, running: bool) -> Vec<HostService> {
    vec![HostService {
        key: "TSM-SSH".to_string(),
        label: "SSH".to_string(),
        policy,
        running,
        required: false,
        uninstallable: false,
        ruleset: vec!["sshServer".to_string()],
    }]
}

fn by_entity(
    summaries: Vec<ReconcileSummary>,
) -> BTreeMap<String, ReconcileSummary> {
    summaries.into_iter().map(|s| (s.entity.to_string(), s)).collect()
}

#[tokio::test]
async fn mixed_kinds_are_reported_together() {
    let log = Logger::root(slog::Discard, o!());
    let config = ReconcilerConfig { max_parallelism: 2, ..Default::default() };
    let mut set = ReconcileSet::from_config(&log, &config);

    let ntp_provider = Arc::new(FakeProvider::<Ntp>::new());
    let ntp_desired = NtpSpec {
        servers: Some(vec!["ntp1".to_string(), "ntp2".to_string()]),
    };
    for (host, servers) in [
        ("esx-01", &["ntp1", "ntp2"][..]),
        ("esx-02", &["ntp1"][..]),
        ("esx-03", &["ntp3"][..]),
    ] {
        ntp_provider.insert(HostRef::new(host), ntp(servers));
        set.spawn::<Ntp, _>(
            Arc::clone(&ntp_provider),
            HostRef::new(host),
            ntp_desired.clone(),
        );
    }
    // The third host's endpoint is unreachable.
    ntp_provider.fail_next_fetch(ProviderError::transport("no route to host"));

    let service_provider = Arc::new(FakeProvider::<HostServices>::new());
    service_provider
        .insert(HostRef::new("esx-04"), ssh(ServicePolicy::On, true));
    set.spawn::<HostServices, _>(
        Arc::clone(&service_provider),
        HostRef::new("esx-04"),
        HostServicesSpec {
            services: vec![ServiceSpec {
                key: "TSM-SSH".to_string(),
                policy: Some(ServicePolicy::Off),
                running: Some(false),
            }],
        },
    );

    let path = ClusterPath {
        datacenter_inventory_path: String::new(),
        datacenter: "dc1".to_string(),
        name: "compute".to_string(),
    };
    let cluster_provider = Arc::new(FakeProvider::<Cluster>::new());
    cluster_provider.insert(path.clone(), ClusterConfig::default());
    set.spawn::<Cluster, _>(
        Arc::clone(&cluster_provider),
        path.clone(),
        ClusterSpec::drs_only(DrsSpec {
            automation_level: Some(DrsAutomationLevel::Manual),
            ..DrsSpec::default()
        }),
    );

    assert_eq!(set.len(), 5);
    let summaries = by_entity(set.join_all().await);
    assert_eq!(summaries.len(), 5);

    // Exactly one NTP fetch fails; which host draws it depends on
    // scheduling, so only count outcomes by state.
    let ntp_states: Vec<_> = ["esx-01", "esx-02", "esx-03"]
        .iter()
        .map(|host| summaries[*host].state)
        .collect();
    assert_eq!(
        ntp_states
            .iter()
            .filter(|s| **s == ReconcileState::FetchFailed)
            .count(),
        1
    );
    assert!(ntp_states.iter().all(|s| matches!(
        s,
        ReconcileState::InSync
            | ReconcileState::Converged
            | ReconcileState::FetchFailed
    )));

    let services = &summaries["esx-04"];
    assert_eq!(services.kind, ResourceKind::HostServices);
    assert_eq!(services.state, ReconcileState::Converged);
    assert_eq!(services.op, Some(ChangeOp::Update));
    assert_eq!(
        service_provider.get(&HostRef::new("esx-04")),
        Some(ssh(ServicePolicy::Off, false))
    );

    let cluster = &summaries[&path.to_string()];
    assert_eq!(cluster.entity, EntityId::from(path.clone()));
    assert_eq!(cluster.state, ReconcileState::Converged);
    assert_eq!(
        cluster_provider.get(&path).unwrap().drs.default_vm_behavior,
        DrsAutomationLevel::Manual
    );
}

#[tokio::test]
async fn summaries_serialize_for_reporting() {
    let log = Logger::root(slog::Discard, o!());
    let mut set = ReconcileSet::from_config(&log, &ReconcilerConfig::default());
    let provider = Arc::new(FakeProvider::<Ntp>::new());
    provider.insert(HostRef::new("esx-01"), ntp(&["ntp1"]));
    provider.ignore_applies();
    set.spawn::<Ntp, _>(
        provider,
        HostRef::new("esx-01"),
        NtpSpec { servers: Some(vec!["ntp2".to_string()]) },
    );

    let summaries = set.join_all().await;
    let summary = &summaries[0];
    assert!(!summary.is_success());

    let json = serde_json::to_value(summary).unwrap();
    assert_eq!(json["kind"], "ntp");
    assert_eq!(json["state"], "converge_failed");
    assert_eq!(json["op"], "update");
    assert_eq!(json["entity"]["kind"], "host");
    assert_eq!(json["mismatches"][0]["field"], "ntp.servers");
    assert_eq!(json["change"]["op"], "update");
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("still differ (nothing changed)"), "{error}");
}
