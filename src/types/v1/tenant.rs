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

use crate::types;
use crate::types::error::{InvalidSpecSnafu, NoNamespaceSnafu};
use crate::types::v1::console::ConsoleConfig;
use crate::types::v1::k8s;
use crate::types::v1::kms::KmsConfig;
use crate::types::v1::pool::{self, Pool};
use crate::types::v1::tls::{CertRole, ExternalCertSecret, SecretLayout, TlsConfig, TlsMode};
use crate::naming;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::{CustomResource, KubeSchema, Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

mod console;
mod secrets;
mod services;
mod tls;
mod workloads;

pub use secrets::{ConsoleSecretValues, CredentialValues, secret_value};

pub const DEFAULT_MINIO_IMAGE: &str = "minio/minio:RELEASE.2020-10-18T21-54-12Z";
pub const DEFAULT_MOUNT_PATH: &str = "/export";
pub const DEFAULT_CERT_ORGANIZATION: &str = "system:nodes";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, KubeSchema, Default)]
#[kube(
    group = "minio.min.io",
    version = "v1",
    kind = "Tenant",
    namespaced,
    status = "crate::types::v1::status::Status",
    shortname = "tenant",
    plural = "tenants",
    singular = "tenant",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.currentState"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct TenantSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<k8s::ImagePullPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<corev1::LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_management_policy: Option<k8s::PodManagementPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,

    #[x_kube(validation = Rule::new("self.startsWith('/')").message("mountPath must be absolute"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<corev1::EnvVar>,

    /// Secret with `accesskey` and `secretkey`. When unset the operator
    /// generates one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creds_secret: Option<corev1::LocalObjectReference>,

    #[x_kube(validation = Rule::new("self.size() > 0").message("pools must be configured"))]
    pub pools: Vec<Pool>,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms: Option<KmsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<ConsoleConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<k8s::ProbeConfig>,
}

/// Where the pods read the certificate of one role from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsSource {
    pub role: CertRole,
    pub secret_name: String,
    pub layout: SecretLayout,
}

impl Tenant {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    /// a new owner reference for tenant
    pub fn new_owner_ref(&self) -> metav1::OwnerReference {
        metav1::OwnerReference {
            api_version: Self::api_version(&()).to_string(),
            kind: Self::kind(&()).to_string(),
            name: self.name(),
            uid: self.meta().uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    /// Metadata every generated namespaced object starts from.
    fn new_object_meta(
        &self,
        name: String,
        labels: std::collections::BTreeMap<String, String>,
    ) -> metav1::ObjectMeta {
        let mut all_labels = naming::common_labels(self);
        all_labels.extend(labels);

        metav1::ObjectMeta {
            name: Some(name),
            namespace: Some(naming::namespace(self).to_owned()),
            owner_references: Some(vec![self.new_owner_ref()]),
            labels: Some(all_labels),
            ..Default::default()
        }
    }

    pub fn image(&self) -> &str {
        self.spec.image.as_deref().unwrap_or(DEFAULT_MINIO_IMAGE)
    }

    pub fn mount_path(&self) -> &str {
        self.spec.mount_path.as_deref().unwrap_or(DEFAULT_MOUNT_PATH)
    }

    pub fn tls_enabled(&self) -> bool {
        self.spec.tls.mode != TlsMode::None
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls_enabled() { "https" } else { "http" }
    }

    pub fn console_config(&self) -> ConsoleConfig {
        self.spec.console.clone().unwrap_or_default()
    }

    pub fn cert_organizations(&self) -> Vec<String> {
        match &self.spec.tls.cert_config {
            Some(cfg) if !cfg.organization_name.is_empty() => cfg.organization_name.clone(),
            _ => vec![DEFAULT_CERT_ORGANIZATION.to_owned()],
        }
    }

    /// Certificate roles the MinIO pods consume, in issuance order.
    pub fn cert_roles(&self) -> Vec<CertRole> {
        match self.spec.tls.mode {
            TlsMode::None => vec![],
            TlsMode::AutoIssued | TlsMode::External => {
                if self.spec.kms.is_some() {
                    vec![CertRole::Server, CertRole::Client, CertRole::Kms]
                } else {
                    vec![CertRole::Server]
                }
            }
        }
    }

    /// True when the operator issues certificates itself.
    pub fn issues_certificates(&self) -> bool {
        self.spec.tls.mode == TlsMode::AutoIssued
    }

    fn external_secret(&self, role: CertRole) -> Option<&ExternalCertSecret> {
        match role {
            CertRole::Server => self.spec.tls.external_cert_secret.as_ref(),
            CertRole::Client => self.spec.tls.external_client_cert_secret.as_ref(),
            CertRole::Kms => self
                .spec
                .kms
                .as_ref()
                .and_then(|kms| kms.external_cert_secret.as_ref()),
        }
    }

    /// Secret and key layout the pods read the certificate of `role` from.
    pub fn tls_source(&self, role: CertRole) -> Option<TlsSource> {
        match self.spec.tls.mode {
            TlsMode::None => None,
            TlsMode::AutoIssued => Some(TlsSource {
                role,
                secret_name: naming::tls_secret(self, role),
                layout: SecretLayout::Generic,
            }),
            TlsMode::External => self.external_secret(role).map(|secret| TlsSource {
                role,
                secret_name: secret.name.clone(),
                layout: SecretLayout::from_secret_type(secret.type_.as_deref()),
            }),
        }
    }

    pub fn tls_sources(&self) -> Vec<TlsSource> {
        self.cert_roles()
            .into_iter()
            .filter_map(|role| self.tls_source(role))
            .collect()
    }

    /// Hostnames the certificate of `role` is requested for.
    pub fn cert_hosts(&self, role: CertRole) -> Vec<String> {
        match role {
            CertRole::Server => naming::server_hosts(self),
            CertRole::Client => vec![format!("{}-client", self.name())],
            CertRole::Kms => self
                .spec
                .kms
                .as_ref()
                .map(KmsConfig::cert_hosts)
                .unwrap_or_default(),
        }
    }

    /// Appends a pool. Existing pools are never reordered or replaced.
    pub fn add_pool(&mut self, pool: Pool) -> Result<(), types::error::Error> {
        if self.spec.pools.iter().any(|p| p.name == pool.name) {
            return InvalidSpecSnafu {
                field: format!("pools[{}].name", pool.name),
                message: "a pool with this name already exists",
            }
            .fail();
        }
        pool.validate()?;
        self.spec.pools.push(pool);
        Ok(())
    }

    /// Checks everything the generators take for granted.
    pub fn validate(&self) -> Result<(), types::error::Error> {
        pool::validate_pools(&self.spec.pools)?;

        if !self.mount_path().starts_with('/') {
            return InvalidSpecSnafu {
                field: "mountPath",
                message: "must be an absolute path",
            }
            .fail();
        }

        if let Some(kms) = &self.spec.kms {
            if kms.endpoint.is_empty() {
                return InvalidSpecSnafu {
                    field: "kms.endpoint",
                    message: "must not be empty",
                }
                .fail();
            }
            if !self.tls_enabled() {
                return InvalidSpecSnafu {
                    field: "kms",
                    message: "a KMS requires tls.mode auto-issued or external",
                }
                .fail();
            }
            if self.issues_certificates() && kms.cert_hosts().is_empty() {
                return InvalidSpecSnafu {
                    field: "kms.hosts",
                    message: "no KMS hostname for the certificate: set kms.hosts or a kms.endpoint with a host",
                }
                .fail();
            }
        }

        if self.spec.tls.mode == TlsMode::External {
            for role in self.cert_roles() {
                if self.external_secret(role).is_none_or(|s| s.name.is_empty()) {
                    let field = match role {
                        CertRole::Server => "tls.externalCertSecret",
                        CertRole::Client => "tls.externalClientCertSecret",
                        CertRole::Kms => "kms.externalCertSecret",
                    };
                    return InvalidSpecSnafu {
                        field,
                        message: "required when tls.mode is external",
                    }
                    .fail();
                }
            }
        }

        if let Some(replicas) = self.spec.console.as_ref().and_then(|c| c.replicas)
            && replicas < 0
        {
            return InvalidSpecSnafu {
                field: "console.replicas",
                message: "must not be negative",
            }
            .fail();
        }

        Ok(())
    }
}
