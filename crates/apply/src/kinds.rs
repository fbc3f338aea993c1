//! Content equality per supported kind.
//!
//! Only the fields an apply owns are compared. Metadata is handled by the merger,
//! status and server-assigned or server-defaulted fields are ignored.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMap, Container, Namespace, Pod, PodSpec, Secret, Service, ServiceAccount, ServicePort, ServiceSpec,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::{CSIDriver, CSIDriverSpec, StorageClass};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceConversion, CustomResourceDefinition, CustomResourceDefinitionSpec,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;

pub trait Content {
    /// `self` is the required object, `other` the stored one.
    fn content_eq(&self, other: &Self) -> bool;
}

fn same_map<V: PartialEq>(a: &Option<BTreeMap<String, V>>, b: &Option<BTreeMap<String, V>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        (Some(m), None) | (None, Some(m)) => m.is_empty(),
        (None, None) => true,
    }
}

fn same_vec<T: PartialEq>(a: &Option<Vec<T>>, b: &Option<Vec<T>>) -> bool {
    a.as_deref().unwrap_or_default() == b.as_deref().unwrap_or_default()
}

fn or_default<'a>(v: &'a Option<String>, default: &'a str) -> &'a str {
    v.as_deref().unwrap_or(default)
}

/// Unset in `required` means the server decides.
fn pinned<T: PartialEq>(required: &Option<T>, existing: &Option<T>) -> bool {
    required.is_none() || required == existing
}

fn none_if_empty<T>(v: &mut Option<Vec<T>>) {
    if v.as_ref().is_some_and(|v| v.is_empty()) {
        *v = None;
    }
}

impl Content for Namespace {
    // spec only carries server-managed finalizers
    fn content_eq(&self, _other: &Self) -> bool { true }
}

impl Content for ConfigMap {
    fn content_eq(&self, other: &Self) -> bool {
        same_map(&self.data, &other.data)
            && same_map(&self.binary_data, &other.binary_data)
            && self.immutable.unwrap_or(false) == other.immutable.unwrap_or(false)
    }
}

impl Content for Secret {
    fn content_eq(&self, other: &Self) -> bool {
        // stringData is write-only; the server folds it into data
        fn effective(s: &Secret) -> BTreeMap<String, ByteString> {
            let mut out = s.data.clone().unwrap_or_default();
            for (k, v) in s.string_data.iter().flatten() {
                out.insert(k.clone(), ByteString(v.as_bytes().to_vec()));
            }
            out
        }
        or_default(&self.type_, "Opaque") == or_default(&other.type_, "Opaque")
            && self.immutable.unwrap_or(false) == other.immutable.unwrap_or(false)
            && effective(self) == effective(other)
    }
}

impl Content for ServiceAccount {
    // .secrets is managed by the token controller
    fn content_eq(&self, other: &Self) -> bool {
        self.automount_service_account_token == other.automount_service_account_token
            && same_vec(&self.image_pull_secrets, &other.image_pull_secrets)
    }
}

impl Content for Service {
    fn content_eq(&self, other: &Self) -> bool {
        let required = self.spec.clone().unwrap_or_default();
        let existing = other.spec.clone().unwrap_or_default();
        service_spec_eq(&required, &existing)
    }
}

fn service_spec_eq(required: &ServiceSpec, existing: &ServiceSpec) -> bool {
    fn port(p: &ServicePort, keep_node_port: bool) -> ServicePort {
        let mut p = p.clone();
        p.protocol.get_or_insert_with(|| "TCP".to_string());
        p.target_port.get_or_insert(IntOrString::Int(p.port));
        if !keep_node_port { p.node_port = None; }
        p
    }
    let req_ports: Vec<_> = required.ports.iter().flatten().map(|p| port(p, p.node_port.is_some())).collect();
    let ex_ports: Vec<_> = existing
        .ports
        .iter()
        .flatten()
        .zip(required.ports.iter().flatten().map(|p| p.node_port.is_some()).chain(std::iter::repeat(true)))
        .map(|(p, keep)| port(p, keep))
        .collect();

    // clusterIP(s), ipFamilies and healthCheckNodePort are allocated by the server unless pinned;
    // the policies below are defaulted depending on type and cluster config
    same_map(&required.selector, &existing.selector)
        && req_ports == ex_ports
        && or_default(&required.type_, "ClusterIP") == or_default(&existing.type_, "ClusterIP")
        && required.external_name == existing.external_name
        && same_vec(&required.external_ips, &existing.external_ips)
        && required.load_balancer_ip == existing.load_balancer_ip
        && required.load_balancer_class == existing.load_balancer_class
        && same_vec(&required.load_balancer_source_ranges, &existing.load_balancer_source_ranges)
        && required.publish_not_ready_addresses.unwrap_or(false) == existing.publish_not_ready_addresses.unwrap_or(false)
        && or_default(&required.session_affinity, "None") == or_default(&existing.session_affinity, "None")
        && or_default(&required.internal_traffic_policy, "Cluster") == or_default(&existing.internal_traffic_policy, "Cluster")
        && pinned(&required.session_affinity_config, &existing.session_affinity_config)
        && pinned(&required.external_traffic_policy, &existing.external_traffic_policy)
        && pinned(&required.allocate_load_balancer_node_ports, &existing.allocate_load_balancer_node_ports)
        && pinned(&required.ip_family_policy, &existing.ip_family_policy)
        && pinned(&required.ip_families, &existing.ip_families)
        && pinned(&required.cluster_ip, &existing.cluster_ip)
        && pinned(&required.cluster_ips, &existing.cluster_ips)
        && pinned(&required.health_check_node_port, &existing.health_check_node_port)
}

impl Content for Pod {
    fn content_eq(&self, other: &Self) -> bool {
        let mut required = self.spec.clone().unwrap_or_default();
        let mut existing = other.spec.clone().unwrap_or_default();
        strip_injected(&mut existing, &required);
        pod_spec_defaults(&mut required);
        pod_spec_defaults(&mut existing);
        required == existing
    }
}

const SERVICE_ACCOUNT_VOLUME_PREFIX: &str = "kube-api-access-";
const DEFAULT_TOLERATION_KEYS: [&str; 2] = ["node.kubernetes.io/not-ready", "node.kubernetes.io/unreachable"];

/// Remove what admission and the scheduler add to a stored pod unless `required` asked for it.
fn strip_injected(existing: &mut PodSpec, required: &PodSpec) {
    if required.node_name.is_none() {
        existing.node_name = None;
    }
    let req_tolerations = required.tolerations.as_deref().unwrap_or_default();
    if let Some(tolerations) = existing.tolerations.as_mut() {
        tolerations.retain(|t| {
            req_tolerations.contains(t) || !DEFAULT_TOLERATION_KEYS.contains(&t.key.as_deref().unwrap_or_default())
        });
    }
    let injected = |name: &str| {
        name.starts_with(SERVICE_ACCOUNT_VOLUME_PREFIX)
            && !required.volumes.iter().flatten().any(|v| v.name == name)
    };
    if let Some(volumes) = existing.volumes.as_mut() {
        volumes.retain(|v| !injected(&v.name));
    }
    for c in existing.containers.iter_mut().chain(existing.init_containers.iter_mut().flatten()) {
        if let Some(mounts) = c.volume_mounts.as_mut() {
            mounts.retain(|m| !injected(&m.name));
        }
    }
}

fn pod_spec_defaults(spec: &mut PodSpec) {
    spec.dns_policy.get_or_insert_with(|| "ClusterFirst".into());
    spec.restart_policy.get_or_insert_with(|| "Always".into());
    spec.scheduler_name.get_or_insert_with(|| "default-scheduler".into());
    spec.termination_grace_period_seconds.get_or_insert(30);
    spec.enable_service_links.get_or_insert(true);
    spec.priority.get_or_insert(0);
    spec.preemption_policy.get_or_insert_with(|| "PreemptLowerPriority".into());
    spec.security_context.get_or_insert_with(Default::default);
    // serviceAccount is the deprecated alias of serviceAccountName
    if spec.service_account_name.is_none() {
        spec.service_account_name = Some(spec.service_account.clone().unwrap_or_else(|| "default".into()));
    }
    spec.service_account = None;
    none_if_empty(&mut spec.tolerations);
    none_if_empty(&mut spec.volumes);
    for c in spec.containers.iter_mut().chain(spec.init_containers.iter_mut().flatten()) {
        container_defaults(c);
    }
}

fn container_defaults(c: &mut Container) {
    c.termination_message_path.get_or_insert_with(|| "/dev/termination-log".into());
    c.termination_message_policy.get_or_insert_with(|| "File".into());
    if c.image_pull_policy.is_none() {
        c.image_pull_policy = Some(default_pull_policy(c.image.as_deref().unwrap_or_default()).into());
    }
    c.resources.get_or_insert_with(Default::default);
    for p in c.ports.iter_mut().flatten() {
        p.protocol.get_or_insert_with(|| "TCP".into());
    }
    none_if_empty(&mut c.volume_mounts);
}

/// `Always` for untagged or `:latest` images, `IfNotPresent` otherwise.
fn default_pull_policy(image: &str) -> &'static str {
    if image.contains('@') {
        return "IfNotPresent";
    }
    let last = image.rsplit('/').next().unwrap_or(image);
    match last.split_once(':') {
        Some((_, tag)) if tag != "latest" => "IfNotPresent",
        _ => "Always",
    }
}

impl Content for ClusterRole {
    fn content_eq(&self, other: &Self) -> bool {
        // aggregated roles get their rules filled in by the aggregation controller
        if self.aggregation_rule.is_some() {
            return self.aggregation_rule == other.aggregation_rule;
        }
        other.aggregation_rule.is_none() && same_vec(&self.rules, &other.rules)
    }
}

impl Content for ClusterRoleBinding {
    fn content_eq(&self, other: &Self) -> bool {
        self.role_ref == other.role_ref && same_vec(&self.subjects, &other.subjects)
    }
}

impl Content for Role {
    fn content_eq(&self, other: &Self) -> bool { same_vec(&self.rules, &other.rules) }
}

impl Content for RoleBinding {
    fn content_eq(&self, other: &Self) -> bool {
        self.role_ref == other.role_ref && same_vec(&self.subjects, &other.subjects)
    }
}

impl Content for CustomResourceDefinition {
    fn content_eq(&self, other: &Self) -> bool { crd_spec_defaults(&self.spec) == crd_spec_defaults(&other.spec) }
}

fn crd_spec_defaults(spec: &CustomResourceDefinitionSpec) -> CustomResourceDefinitionSpec {
    let mut spec = spec.clone();
    spec.conversion.get_or_insert_with(|| CustomResourceConversion { strategy: "None".into(), webhook: None });
    let names = &mut spec.names;
    if names.singular.as_deref().unwrap_or_default().is_empty() {
        names.singular = Some(names.kind.to_lowercase());
    }
    if names.list_kind.as_deref().unwrap_or_default().is_empty() {
        names.list_kind = Some(format!("{}List", names.kind));
    }
    spec
}

impl Content for StorageClass {
    fn content_eq(&self, other: &Self) -> bool {
        self.provisioner == other.provisioner
            && same_map(&self.parameters, &other.parameters)
            && or_default(&self.reclaim_policy, "Delete") == or_default(&other.reclaim_policy, "Delete")
            && or_default(&self.volume_binding_mode, "Immediate") == or_default(&other.volume_binding_mode, "Immediate")
            && same_vec(&self.mount_options, &other.mount_options)
            && self.allow_volume_expansion.unwrap_or(false) == other.allow_volume_expansion.unwrap_or(false)
            && same_vec(&self.allowed_topologies, &other.allowed_topologies)
    }
}

impl Content for CSIDriver {
    fn content_eq(&self, other: &Self) -> bool { csi_spec_defaults(&self.spec) == csi_spec_defaults(&other.spec) }
}

fn csi_spec_defaults(spec: &CSIDriverSpec) -> CSIDriverSpec {
    let mut spec = spec.clone();
    spec.attach_required.get_or_insert(true);
    spec.pod_info_on_mount.get_or_insert(false);
    spec.storage_capacity.get_or_insert(false);
    spec.requires_republish.get_or_insert(false);
    spec.se_linux_mount.get_or_insert(false);
    spec.fs_group_policy.get_or_insert_with(|| "ReadWriteOnceWithFSType".into());
    spec.volume_lifecycle_modes.get_or_insert_with(|| vec!["Persistent".into()]);
    none_if_empty(&mut spec.token_requests);
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ClientIPConfig, ContainerPort, PodSecurityContext, ResourceRequirements, SessionAffinityConfig, Toleration,
        Volume, VolumeMount,
    };
    use k8s_openapi::api::rbac::v1::{AggregationRule, PolicyRule};
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceDefinitionNames, CustomResourceDefinitionVersion,
    };

    fn strings(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn configmap_treats_missing_and_empty_data_alike() {
        let a = ConfigMap { data: Some(BTreeMap::new()), ..Default::default() };
        let b = ConfigMap::default();
        assert!(a.content_eq(&b));
        let c = ConfigMap { data: strings(&[("k", "v")]), ..Default::default() };
        assert!(!c.content_eq(&b));
    }

    #[test]
    fn secret_string_data_matches_stored_data() {
        let required = Secret { string_data: strings(&[("password", "hunter2")]), ..Default::default() };
        let stored = Secret {
            type_: Some("Opaque".into()),
            data: Some([("password".to_string(), ByteString(b"hunter2".to_vec()))].into_iter().collect()),
            ..Default::default()
        };
        assert!(required.content_eq(&stored));
        let changed = Secret { string_data: strings(&[("password", "other")]), ..Default::default() };
        assert!(!changed.content_eq(&stored));
    }

    #[test]
    fn service_ignores_allocated_fields() {
        let required = Service {
            spec: Some(ServiceSpec {
                selector: strings(&[("app", "web")]),
                ports: Some(vec![ServicePort { port: 80, ..Default::default() }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let stored = Service {
            spec: Some(ServiceSpec {
                selector: strings(&[("app", "web")]),
                cluster_ip: Some("10.0.0.12".into()),
                type_: Some("ClusterIP".into()),
                ports: Some(vec![ServicePort {
                    port: 80,
                    protocol: Some("TCP".into()),
                    target_port: Some(IntOrString::Int(80)),
                    node_port: Some(30080),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(required.content_eq(&stored));

        let mut moved = required.clone();
        moved.spec.as_mut().unwrap().ports = Some(vec![ServicePort { port: 8080, ..Default::default() }]);
        assert!(!moved.content_eq(&stored));
    }

    #[test]
    fn aggregated_cluster_role_ignores_rules() {
        let agg = AggregationRule { cluster_role_selectors: None };
        let required = ClusterRole { aggregation_rule: Some(agg.clone()), ..Default::default() };
        let stored = ClusterRole {
            aggregation_rule: Some(agg),
            rules: Some(vec![PolicyRule { verbs: vec!["get".into()], ..Default::default() }]),
            ..Default::default()
        };
        assert!(required.content_eq(&stored));

        let plain = ClusterRole { rules: Some(vec![]), ..Default::default() };
        assert!(!plain.content_eq(&stored));
    }

    fn web_service() -> ServiceSpec {
        ServiceSpec {
            selector: strings(&[("app", "web")]),
            ports: Some(vec![ServicePort { port: 80, ..Default::default() }]),
            ..Default::default()
        }
    }

    /// What the API server stores for `web_service()` with type LoadBalancer.
    fn defaulted_lb_service() -> ServiceSpec {
        ServiceSpec {
            selector: strings(&[("app", "web")]),
            type_: Some("LoadBalancer".into()),
            ports: Some(vec![ServicePort {
                port: 80,
                protocol: Some("TCP".into()),
                target_port: Some(IntOrString::Int(80)),
                node_port: Some(31000),
                ..Default::default()
            }]),
            cluster_ip: Some("10.0.0.12".into()),
            cluster_ips: Some(vec!["10.0.0.12".into()]),
            ip_families: Some(vec!["IPv4".into()]),
            ip_family_policy: Some("SingleStack".into()),
            session_affinity: Some("None".into()),
            internal_traffic_policy: Some("Cluster".into()),
            external_traffic_policy: Some("Cluster".into()),
            allocate_load_balancer_node_ports: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn service_matches_server_defaults() {
        let required = ServiceSpec { type_: Some("LoadBalancer".into()), ..web_service() };
        assert!(service_spec_eq(&required, &defaulted_lb_service()));
        assert!(service_spec_eq(&web_service(), &ServiceSpec { type_: None, ..defaulted_lb_service() }));
    }

    #[test]
    fn every_caller_owned_service_field_is_compared() {
        let cases: Vec<(&str, fn(&mut ServiceSpec))> = vec![
            ("externalIPs", |s| s.external_ips = Some(vec!["192.0.2.10".into()])),
            ("sessionAffinity", |s| s.session_affinity = Some("ClientIP".into())),
            ("sessionAffinityConfig", |s| {
                s.session_affinity_config = Some(SessionAffinityConfig {
                    client_ip: Some(ClientIPConfig { timeout_seconds: Some(600) }),
                })
            }),
            ("externalTrafficPolicy", |s| s.external_traffic_policy = Some("Local".into())),
            ("internalTrafficPolicy", |s| s.internal_traffic_policy = Some("Local".into())),
            ("loadBalancerIP", |s| s.load_balancer_ip = Some("192.0.2.20".into())),
            ("loadBalancerClass", |s| s.load_balancer_class = Some("example.com/lb".into())),
            ("ipFamilyPolicy", |s| s.ip_family_policy = Some("PreferDualStack".into())),
            ("allocateLoadBalancerNodePorts", |s| s.allocate_load_balancer_node_ports = Some(false)),
            ("loadBalancerSourceRanges", |s| s.load_balancer_source_ranges = Some(vec!["10.0.0.0/8".into()])),
            ("publishNotReadyAddresses", |s| s.publish_not_ready_addresses = Some(true)),
            ("clusterIP", |s| s.cluster_ip = Some("10.0.0.99".into())),
            ("healthCheckNodePort", |s| s.health_check_node_port = Some(32000)),
        ];
        let stored = defaulted_lb_service();
        for (field, set) in cases {
            let mut required = ServiceSpec { type_: Some("LoadBalancer".into()), ..web_service() };
            set(&mut required);
            assert!(!service_spec_eq(&required, &stored), "{} change went unnoticed", field);
        }
    }

    #[test]
    fn pinned_service_fields_equal_when_stored_alike() {
        let mut required = ServiceSpec { type_: Some("LoadBalancer".into()), ..web_service() };
        required.external_traffic_policy = Some("Cluster".into());
        required.ip_family_policy = Some("SingleStack".into());
        required.cluster_ip = Some("10.0.0.12".into());
        assert!(service_spec_eq(&required, &defaulted_lb_service()));
    }

    fn container(image: &str) -> Container {
        Container {
            name: "app".into(),
            image: Some(image.into()),
            ports: Some(vec![ContainerPort { container_port: 8080, ..Default::default() }]),
            ..Default::default()
        }
    }

    fn defaulted_pod(image: &str, pull: &str) -> PodSpec {
        let mut c = container(image);
        c.image_pull_policy = Some(pull.into());
        c.termination_message_path = Some("/dev/termination-log".into());
        c.termination_message_policy = Some("File".into());
        c.resources = Some(ResourceRequirements::default());
        c.ports = Some(vec![ContainerPort { container_port: 8080, protocol: Some("TCP".into()), ..Default::default() }]);
        c.volume_mounts = Some(vec![VolumeMount {
            name: "kube-api-access-x7k2p".into(),
            mount_path: "/var/run/secrets/kubernetes.io/serviceaccount".into(),
            read_only: Some(true),
            ..Default::default()
        }]);
        PodSpec {
            containers: vec![c],
            dns_policy: Some("ClusterFirst".into()),
            restart_policy: Some("Always".into()),
            scheduler_name: Some("default-scheduler".into()),
            termination_grace_period_seconds: Some(30),
            enable_service_links: Some(true),
            priority: Some(0),
            preemption_policy: Some("PreemptLowerPriority".into()),
            security_context: Some(PodSecurityContext::default()),
            service_account: Some("default".into()),
            service_account_name: Some("default".into()),
            node_name: Some("node-1".into()),
            tolerations: Some(
                DEFAULT_TOLERATION_KEYS
                    .iter()
                    .map(|k| Toleration {
                        key: Some(k.to_string()),
                        operator: Some("Exists".into()),
                        effect: Some("NoExecute".into()),
                        toleration_seconds: Some(300),
                        ..Default::default()
                    })
                    .collect(),
            ),
            volumes: Some(vec![Volume { name: "kube-api-access-x7k2p".into(), ..Default::default() }]),
            ..Default::default()
        }
    }

    fn pod(spec: PodSpec) -> Pod { Pod { spec: Some(spec), ..Default::default() } }

    #[test]
    fn pod_matches_server_defaulted_copy() {
        let required = pod(PodSpec { containers: vec![container("nginx:1.25")], ..Default::default() });
        assert!(required.content_eq(&pod(defaulted_pod("nginx:1.25", "IfNotPresent"))));

        let latest = pod(PodSpec { containers: vec![container("nginx")], ..Default::default() });
        assert!(latest.content_eq(&pod(defaulted_pod("nginx", "Always"))));
        assert!(!latest.content_eq(&pod(defaulted_pod("nginx", "IfNotPresent"))));
    }

    #[test]
    fn pod_changes_are_still_seen() {
        let stored = pod(defaulted_pod("nginx:1.25", "IfNotPresent"));
        let bumped = pod(PodSpec { containers: vec![container("nginx:1.26")], ..Default::default() });
        assert!(!bumped.content_eq(&stored));

        let restart = pod(PodSpec {
            containers: vec![container("nginx:1.25")],
            restart_policy: Some("Never".into()),
            ..Default::default()
        });
        assert!(!restart.content_eq(&stored));

        // a pinned node is caller-owned
        let pinned_node = pod(PodSpec {
            containers: vec![container("nginx:1.25")],
            node_name: Some("node-2".into()),
            ..Default::default()
        });
        assert!(!pinned_node.content_eq(&stored));
    }

    #[test]
    fn pull_policy_follows_image_tag() {
        assert_eq!(default_pull_policy("nginx"), "Always");
        assert_eq!(default_pull_policy("nginx:latest"), "Always");
        assert_eq!(default_pull_policy("registry:5000/nginx"), "Always");
        assert_eq!(default_pull_policy("registry:5000/nginx:1.25"), "IfNotPresent");
        assert_eq!(default_pull_policy("nginx@sha256:abcd"), "IfNotPresent");
    }

    fn widget_crd() -> CustomResourceDefinition {
        CustomResourceDefinition {
            spec: CustomResourceDefinitionSpec {
                group: "example.com".into(),
                scope: "Namespaced".into(),
                names: CustomResourceDefinitionNames {
                    kind: "Widget".into(),
                    plural: "widgets".into(),
                    ..Default::default()
                },
                versions: vec![CustomResourceDefinitionVersion {
                    name: "v1".into(),
                    served: true,
                    storage: true,
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn crd_matches_server_defaulted_copy() {
        let required = widget_crd();
        let mut stored = widget_crd();
        stored.spec.names.singular = Some("widget".into());
        stored.spec.names.list_kind = Some("WidgetList".into());
        stored.spec.conversion = Some(CustomResourceConversion { strategy: "None".into(), webhook: None });
        assert!(required.content_eq(&stored));

        let mut cluster_scoped = widget_crd();
        cluster_scoped.spec.scope = "Cluster".into();
        assert!(!cluster_scoped.content_eq(&stored));
    }

    #[test]
    fn csi_driver_matches_server_defaulted_copy() {
        let required = CSIDriver::default();
        let stored = CSIDriver {
            spec: CSIDriverSpec {
                attach_required: Some(true),
                pod_info_on_mount: Some(false),
                storage_capacity: Some(false),
                requires_republish: Some(false),
                se_linux_mount: Some(false),
                fs_group_policy: Some("ReadWriteOnceWithFSType".into()),
                volume_lifecycle_modes: Some(vec!["Persistent".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(required.content_eq(&stored));

        let detached = CSIDriver {
            spec: CSIDriverSpec { attach_required: Some(false), ..Default::default() },
            ..Default::default()
        };
        assert!(!detached.content_eq(&stored));
    }
}
