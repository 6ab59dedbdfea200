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

#![allow(clippy::unwrap_used, clippy::expect_used)]


use k8s_openapi::ByteString;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::certificates::v1::{
    CertificateSigningRequest, CertificateSigningRequestCondition, CertificateSigningRequestStatus,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::ResourceExt;
use rcgen::{CertificateParams, KeyPair, PKCS_ECDSA_P521_SHA512};
use serde_json::json;

use crate::config::OperatorConfig;
use crate::context::Context;
use crate::naming;
use crate::types::v1::kms::KmsConfig;
use crate::types::v1::pool::Pool;
use crate::types::v1::tenant::{Tenant, TenantSpec, secret_value};
use crate::types::v1::tls::{CertRole, SecretLayout, TlsMode};
use api_server::{ApiServer, path};

pub const NS: &str = "tenant-ns";

// 4 servers x 8 volumes, 16Ti in total
pub fn create_test_tenant() -> Tenant {
    Tenant {
        metadata: metav1::ObjectMeta {
            name: Some("minio".to_string()),
            namespace: Some("tenant-ns".to_string()),
            uid: Some("test-uid-123".to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: TenantSpec {
            pools: vec![
                Pool::from_totals("pool-0", 4, 32, "16Ti").expect("valid test pool"),
            ],
            ..Default::default()
        },
        status: None,
    }
}

pub fn single_drive_tenant() -> Tenant {
    let mut tenant = create_test_tenant();
    tenant.spec.pools =
        vec![Pool::from_totals("pool-0", 1, 1, "1Ti").expect("valid test pool")];
    tenant
}

pub fn with_auto_tls(mut tenant: Tenant) -> Tenant {
    tenant.spec.tls.mode = TlsMode::AutoIssued;
    tenant
}

pub fn with_kms(mut tenant: Tenant) -> Tenant {
    tenant.spec.kms = Some(KmsConfig {
        endpoint: "https://kes.kms:7373".to_string(),
        hosts: vec!["kes.kms".to_string()],
        ..Default::default()
    });
    tenant
}

/// What the API server hands back after creating `desired`.
pub fn with_platform_defaults(desired: &StatefulSet) -> StatefulSet {
    let mut live = serde_json::to_value(desired).unwrap();
    live["metadata"]["uid"] = json!("live-uid");
    live["metadata"]["resourceVersion"] = json!("12345");
    live["metadata"]["generation"] = json!(1);
    live["spec"]["revisionHistoryLimit"] = json!(10);
    live["spec"]["persistentVolumeClaimRetentionPolicy"] =
        json!({"whenDeleted": "Retain", "whenScaled": "Retain"});
    live["spec"]["template"]["spec"]["dnsPolicy"] = json!("ClusterFirst");
    live["spec"]["template"]["spec"]["schedulerName"] = json!("default-scheduler");
    live["spec"]["template"]["spec"]["terminationGracePeriodSeconds"] = json!(30);
    live["spec"]["template"]["spec"]["securityContext"] = json!({});
    for container in live["spec"]["template"]["spec"]["containers"]
        .as_array_mut()
        .unwrap()
    {
        container["terminationMessagePath"] = json!("/dev/termination-log");
        container["terminationMessagePolicy"] = json!("File");
        if container.get("resources").is_none() {
            container["resources"] = json!({});
        }
        container["ports"][0]["protocol"] = json!("TCP");
    }
    let replicas = live["spec"]["replicas"].clone();
    live["status"] = json!({"replicas": replicas, "readyReplicas": replicas});
    serde_json::from_value(live).unwrap()
}

/// A context whose client talks to a fresh in-memory API server holding `tenant`.
pub fn serve_tenant(tenant: &Tenant) -> (ApiServer, Context) {
    let (server, client) = ApiServer::start();
    server.insert(
        &path::<Tenant>(Some(NS), &tenant.name_any()),
        serde_json::to_value(tenant).unwrap(),
    );
    (server, Context::new(client, OperatorConfig::default()))
}

pub fn csr_path(tenant: &Tenant, role: CertRole) -> String {
    path::<CertificateSigningRequest>(None, &naming::csr(tenant, role))
}

fn set_csr_status(server: &ApiServer, tenant: &Tenant, role: CertRole, status: CertificateSigningRequestStatus) {
    server.update(&csr_path(tenant, role), |csr| {
        csr["status"] = serde_json::to_value(&status).unwrap();
    });
}

fn condition(type_: &str) -> CertificateSigningRequestCondition {
    CertificateSigningRequestCondition {
        type_: type_.to_string(),
        status: "True".to_string(),
        reason: Some(format!("{type_}ByTest")),
        ..Default::default()
    }
}

/// Approves the submitted CSR of `role` and issues a certificate for the
/// stored pending key, as an administrator and the signer would.
pub fn approve(server: &ApiServer, tenant: &Tenant, role: CertRole) -> String {
    let pending: Secret = server
        .object(&path::<Secret>(Some(NS), &naming::pending_key_secret(tenant, role)))
        .expect("a pending key is stored before approval");
    let key_pem = secret_value(&pending, SecretLayout::Generic.private_key_key()).unwrap();
    let key = KeyPair::from_pem_and_sign_algo(&key_pem, &PKCS_ECDSA_P521_SHA512).unwrap();
    let cert_pem = CertificateParams::new(vec!["minio.local".to_string()])
        .unwrap()
        .self_signed(&key)
        .unwrap()
        .pem();

    set_csr_status(
        server,
        tenant,
        role,
        CertificateSigningRequestStatus {
            certificate: Some(ByteString(cert_pem.clone().into_bytes())),
            conditions: Some(vec![condition("Approved")]),
        },
    );
    cert_pem
}

pub fn deny(server: &ApiServer, tenant: &Tenant, role: CertRole) {
    set_csr_status(
        server,
        tenant,
        role,
        CertificateSigningRequestStatus {
            certificate: None,
            conditions: Some(vec![condition("Denied")]),
        },
    );
}
