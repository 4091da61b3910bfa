//! The measurements a load test run watches by default.
//!
//! Every entry is a factory returning a [`QueryDescriptor`]; bind it to a backend
//! with [`crate::QueryGetter::new`] or [`crate::Collector::add_queries`].

use crate::query::{
    QueryDescriptor,
    ResultKind,
};

pub const OLM_OPERATOR_NAMESPACE: &str = "openshift-operator-lifecycle-manager";
pub const OLM_OPERATOR_WORKLOAD: &str = "olm-operator";
pub const OS_API_SERVER_NAMESPACE: &str = "openshift-apiserver";
pub const OS_API_SERVER_WORKLOAD: &str = "apiserver";

const QUERY_OS_KUBE_API_MEMORY: &str =
    r#"sum(container_memory_usage_bytes{namespace="openshift-kube-apiserver", pod=~"kube-apiserver-.*"})"#;
const QUERY_ETCD_MEMORY: &str = r#"process_resident_memory_bytes{job="etcd"}"#;
const QUERY_CLUSTER_CPU: &str = r#"1 - avg(rate(node_cpu_seconds_total{mode="idle", cluster=""}[5m]))"#;
const QUERY_CLUSTER_MEMORY: &str =
    r#"1 - sum(:node_memory_MemAvailable_bytes:sum{cluster=""}) / sum(node_memory_MemTotal_bytes{cluster=""})"#;
const QUERY_NODE_MEMORY: &str = r#"1 - sum (node_memory_MemAvailable_bytes * on(instance) (group by(instance)(label_replace(kube_node_role{role="master"}, "instance", "$1", "node", "(.*)"))))/
    sum (node_memory_MemTotal_bytes * on(instance) (group by(instance)(label_replace(kube_node_role{role="master"}, "instance", "$1", "node", "(.*)"))))"#;

pub fn openshift_kube_api_memory_utilisation() -> QueryDescriptor {
    QueryDescriptor::new("openshift-kube-apiserver", QUERY_OS_KUBE_API_MEMORY, ResultKind::Memory)
}

pub fn etcd_memory_usage() -> QueryDescriptor {
    QueryDescriptor::new("etcd Instance Memory Usage", QUERY_ETCD_MEMORY, ResultKind::Memory)
}

pub fn cluster_cpu_utilisation() -> QueryDescriptor {
    QueryDescriptor::new("Cluster CPU Utilisation", QUERY_CLUSTER_CPU, ResultKind::Percentage)
}

pub fn cluster_memory_utilisation() -> QueryDescriptor {
    QueryDescriptor::new("Cluster Memory Utilisation", QUERY_CLUSTER_MEMORY, ResultKind::Percentage)
}

/// Memory utilisation of the control plane nodes.
pub fn node_memory_utilisation() -> QueryDescriptor {
    QueryDescriptor::new("Node Memory Usage", QUERY_NODE_MEMORY, ResultKind::Percentage)
}

/// CPU seconds per pod of a deployment, averaged over its pods when polled.
pub fn workload_cpu_usage(namespace: &str, workload: &str) -> QueryDescriptor {
    let query = format!(
        r#"sum(
    node_namespace_pod_container:container_cpu_usage_seconds_total:sum_irate{{cluster="", namespace="{namespace}"}}
  * on(namespace,pod)
    group_left(workload, workload_type) namespace_workload_pod:kube_pod_owner:relabel{{cluster="", namespace="{namespace}", workload="{workload}", workload_type="deployment"}}
) by (pod)"#
    );
    QueryDescriptor::new(format!("{workload} CPU Usage"), query, ResultKind::Simple)
}

/// Working set bytes per pod of a deployment.
pub fn workload_memory_usage(namespace: &str, workload: &str) -> QueryDescriptor {
    let query = format!(
        r#"sum(
    container_memory_working_set_bytes{{cluster="", namespace="{namespace}", container!="", image!=""}}
  * on(namespace,pod)
    group_left(workload, workload_type) namespace_workload_pod:kube_pod_owner:relabel{{cluster="", namespace="{namespace}", workload="{workload}", workload_type="deployment"}}
) by (pod)"#
    );
    QueryDescriptor::new(format!("{workload} Memory Usage"), query, ResultKind::Memory)
}

/// CPU and memory usage of one deployment.
pub fn workload(namespace: &str, workload: &str) -> [QueryDescriptor; 2] {
    [
        workload_cpu_usage(namespace, workload),
        workload_memory_usage(namespace, workload),
    ]
}

/// Cluster wide measurements plus the OLM operator and openshift-apiserver workloads.
pub fn cluster_defaults() -> Vec<QueryDescriptor> {
    let mut queries = vec![
        cluster_cpu_utilisation(),
        cluster_memory_utilisation(),
        node_memory_utilisation(),
        etcd_memory_usage(),
    ];
    queries.extend(workload(OLM_OPERATOR_NAMESPACE, OLM_OPERATOR_WORKLOAD));
    queries.push(openshift_kube_api_memory_utilisation());
    queries.extend(workload(OS_API_SERVER_NAMESPACE, OS_API_SERVER_WORKLOAD));
    queries
}
