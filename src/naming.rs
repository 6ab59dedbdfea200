// Copyright 2025 The MinIO Operator Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deterministic names, hostnames and labels derived from a [`Tenant`].
//!
//! Every object the operator creates is located again on the next attempt by
//! the name computed here, so these functions must stay stable across
//! releases.

use crate::types::v1::pool::Pool;
use crate::types::v1::tenant::Tenant;
use crate::types::v1::tls::CertRole;
use kube::ResourceExt;
use std::collections::BTreeMap;

const LABEL_PREFIX: &str = "v1.min.io/";

pub const LABEL_TENANT: &str = const_str::concat!(LABEL_PREFIX, "tenant");
pub const LABEL_POOL: &str = const_str::concat!(LABEL_PREFIX, "pool");
pub const LABEL_CONSOLE: &str = const_str::concat!(LABEL_PREFIX, "console");
pub const LABEL_CERT_ROLE: &str = const_str::concat!(LABEL_PREFIX, "cert-role");
pub const LABEL_NAMESPACE: &str = const_str::concat!(LABEL_PREFIX, "namespace");
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

pub const OPERATOR_NAME: &str = "minio-operator";

/// Annotation on the pending key Secret recording when its CSR was submitted.
pub const ANNOTATION_SUBMITTED_AT: &str = const_str::concat!(LABEL_PREFIX, "csr-submitted-at");

const CLUSTER_DOMAIN: &str = "svc.cluster.local";

pub fn namespace(tenant: &Tenant) -> &str {
    tenant.metadata.namespace.as_deref().unwrap_or("default")
}

pub fn statefulset(tenant: &Tenant, pool: &Pool) -> String {
    format!("{}-{}", tenant.name_any(), pool.name)
}

pub fn headless_service(tenant: &Tenant) -> String {
    format!("{}-hl", tenant.name_any())
}

pub fn minio_service(tenant: &Tenant) -> String {
    format!("{}-minio", tenant.name_any())
}

/// Shared by the console Service and Deployment.
pub fn console(tenant: &Tenant) -> String {
    format!("{}-console", tenant.name_any())
}

pub fn creds_secret(tenant: &Tenant) -> String {
    format!("{}-creds-secret", tenant.name_any())
}

pub fn console_secret(tenant: &Tenant) -> String {
    format!("{}-console-secret", tenant.name_any())
}

/// Secret the operator persists an issued certificate of `role` into.
pub fn tls_secret(tenant: &Tenant, role: CertRole) -> String {
    match role {
        CertRole::Server => format!("{}-tls", tenant.name_any()),
        CertRole::Client => format!("{}-client-tls", tenant.name_any()),
        CertRole::Kms => format!("{}-kes-tls", tenant.name_any()),
    }
}

/// Holds the private key of an in-flight request until it is approved.
pub fn pending_key_secret(tenant: &Tenant, role: CertRole) -> String {
    format!("{}-pending", tls_secret(tenant, role))
}

/// CSRs are cluster scoped, so the namespace is part of the name.
pub fn csr(tenant: &Tenant, role: CertRole) -> String {
    format!("{}-{}-{}-csr", tenant.name_any(), namespace(tenant), role)
}

pub fn pod_host(tenant: &Tenant, pool: &Pool, ordinal: i32) -> String {
    format!(
        "{}-{}.{}.{}.{}",
        statefulset(tenant, pool),
        ordinal,
        headless_service(tenant),
        namespace(tenant),
        CLUSTER_DOMAIN
    )
}

/// `{0...n-1}` expansion of every pod of a pool, as MinIO reads it.
pub fn pool_host_template(tenant: &Tenant, pool: &Pool) -> String {
    format!(
        "{}-{{0...{}}}.{}.{}.{}",
        statefulset(tenant, pool),
        pool.servers - 1,
        headless_service(tenant),
        namespace(tenant),
        CLUSTER_DOMAIN
    )
}

pub fn headless_wildcard(tenant: &Tenant) -> String {
    format!(
        "*.{}.{}.{}",
        headless_service(tenant),
        namespace(tenant),
        CLUSTER_DOMAIN
    )
}

pub fn headless_host(tenant: &Tenant) -> String {
    format!(
        "{}.{}.{}",
        headless_service(tenant),
        namespace(tenant),
        CLUSTER_DOMAIN
    )
}

/// Short, namespaced and fully qualified forms of a Service name.
pub fn service_aliases(tenant: &Tenant, service: &str) -> Vec<String> {
    let ns = namespace(tenant);
    vec![
        service.to_owned(),
        format!("{service}.{ns}"),
        format!("{service}.{ns}.{CLUSTER_DOMAIN}"),
    ]
}

pub fn service_host(tenant: &Tenant, service: &str) -> String {
    format!("{}.{}.{}", service, namespace(tenant), CLUSTER_DOMAIN)
}

/// Hostnames the server certificate must cover: every pod of every pool,
/// the headless wildcard and the MinIO Service.
pub fn server_hosts(tenant: &Tenant) -> Vec<String> {
    let mut hosts: Vec<String> = tenant
        .spec
        .pools
        .iter()
        .flat_map(|pool| (0..pool.servers).map(move |i| pod_host(tenant, pool, i)))
        .collect();
    hosts.push(headless_wildcard(tenant));
    hosts.extend(service_aliases(tenant, &minio_service(tenant)));
    hosts
}

/// Labels shared by every object of a tenant.
pub fn common_labels(tenant: &Tenant) -> BTreeMap<String, String> {
    [
        (LABEL_MANAGED_BY.to_owned(), OPERATOR_NAME.to_owned()),
        (LABEL_TENANT.to_owned(), tenant.name_any()),
    ]
    .into_iter()
    .collect()
}

/// Selects the MinIO pods of all pools.
pub fn tenant_selector(tenant: &Tenant) -> BTreeMap<String, String> {
    [(LABEL_TENANT.to_owned(), tenant.name_any())]
        .into_iter()
        .collect()
}

pub fn pool_selector(tenant: &Tenant, pool: &Pool) -> BTreeMap<String, String> {
    let mut labels = tenant_selector(tenant);
    labels.insert(LABEL_POOL.to_owned(), pool.name.clone());
    labels
}

pub fn console_selector(tenant: &Tenant) -> BTreeMap<String, String> {
    [(LABEL_CONSOLE.to_owned(), console(tenant))]
        .into_iter()
        .collect()
}

/// Labels of a CSR, used to map it back onto its tenant.
pub fn csr_labels(tenant: &Tenant, role: CertRole) -> BTreeMap<String, String> {
    let mut labels = common_labels(tenant);
    labels.insert(LABEL_NAMESPACE.to_owned(), namespace(tenant).to_owned());
    labels.insert(LABEL_CERT_ROLE.to_owned(), role.to_string());
    labels
}
