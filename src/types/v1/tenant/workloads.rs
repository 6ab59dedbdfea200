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

use super::Tenant;
use crate::naming;
use crate::types::v1::pool::{DEFAULT_VOLUME_CAPACITY, Pool};
use crate::types::v1::tls::CertRole;
use k8s_openapi::api::apps::v1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use k8s_openapi::apimachinery::pkg::util::intstr;
use std::collections::BTreeMap;

pub const MINIO_CONTAINER_NAME: &str = "minio";
pub const MINIO_PORT: i32 = 9000;
pub const CERTS_DIR: &str = "/tmp/certs";

const VOLUME_CLAIM_TEMPLATE_PREFIX: &str = "data";
const TLS_VOLUME_NAME: &str = "tls-certs";
const INIT_CONTAINER_IMAGE: &str = "busybox:1.32";
const VALIDATE_MOUNTS_INIT_CONTAINER: &str = "validate-mounts";
const WAIT_FOR_DNS_INIT_CONTAINER: &str = "wait-for-dns";
const LIVENESS_PATH: &str = "/minio/health/live";
const LIVENESS_FAILURE_THRESHOLD: i32 = 3;

const UPDATE_MINISIGN_PUBKEY: &str = "RWTx5Zr1tiHQLwG9keckT0c45M3AGeHD6IvimQHpyRywVWGbP1aVSGav";
pub const ACCESS_KEY: &str = "accesskey";
pub const SECRET_KEY: &str = "secretkey";

fn volume_claim_template_name(index: i32) -> String {
    format!("{VOLUME_CLAIM_TEMPLATE_PREFIX}{index}")
}

fn env_value(name: &str, value: impl Into<String>) -> corev1::EnvVar {
    corev1::EnvVar {
        name: name.to_owned(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn env_from_secret(name: &str, secret: &str, key: &str) -> corev1::EnvVar {
    corev1::EnvVar {
        name: name.to_owned(),
        value_from: Some(corev1::EnvVarSource {
            secret_key_ref: Some(corev1::SecretKeySelector {
                name: secret.to_owned(),
                key: key.to_owned(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl Tenant {
    /// Path of the data volumes of `pool` as MinIO expands it:
    /// `/export` for a single drive, `/export{0...n-1}` otherwise.
    pub fn volume_path(&self, pool: &Pool) -> String {
        if pool.volumes_per_server == 1 {
            self.mount_path().to_owned()
        } else {
            format!("{}{{0...{}}}", self.mount_path(), pool.volumes_per_server - 1)
        }
    }

    /// One mount per data volume, plus the certificate directory when TLS is on.
    pub fn volume_mounts(&self, pool: &Pool) -> Vec<corev1::VolumeMount> {
        let mut mounts: Vec<corev1::VolumeMount> = if pool.volumes_per_server == 1 {
            vec![corev1::VolumeMount {
                name: volume_claim_template_name(0),
                mount_path: self.mount_path().to_owned(),
                ..Default::default()
            }]
        } else {
            (0..pool.volumes_per_server)
                .map(|i| corev1::VolumeMount {
                    name: volume_claim_template_name(i),
                    mount_path: format!("{}{}", self.mount_path(), i),
                    ..Default::default()
                })
                .collect()
        };

        if self.tls_enabled() {
            mounts.push(corev1::VolumeMount {
                name: TLS_VOLUME_NAME.to_owned(),
                mount_path: CERTS_DIR.to_owned(),
                ..Default::default()
            });
        }

        mounts
    }

    /// Arguments of the MinIO server.
    ///
    /// A single server runs standalone on a bare path. Anything else gets one
    /// endpoint expansion per pool, in pool order, each with that pool's own
    /// volume path.
    pub fn container_args(&self) -> Vec<String> {
        let mut args = vec![
            "server".to_owned(),
            "--certs-dir".to_owned(),
            CERTS_DIR.to_owned(),
        ];

        match self.spec.pools.as_slice() {
            [pool] if pool.servers == 1 => args.push(self.volume_path(pool)),
            pools => args.extend(pools.iter().map(|pool| {
                format!(
                    "{}://{}:{}{}",
                    self.scheme(),
                    naming::pool_host_template(self, pool),
                    MINIO_PORT,
                    self.volume_path(pool)
                )
            })),
        }

        args
    }

    /// Environment of the MinIO container. User variables come first; a user
    /// variable sharing a name with an operator-managed one is dropped.
    pub fn minio_env(&self) -> Vec<corev1::EnvVar> {
        let mut managed = vec![
            env_value("MINIO_UPDATE", "on"),
            env_value("MINIO_UPDATE_MINISIGN_PUBKEY", UPDATE_MINISIGN_PUBKEY),
        ];

        let creds = self
            .spec
            .creds_secret
            .as_ref()
            .filter(|s| !s.name.is_empty())
            .map(|s| s.name.clone())
            .unwrap_or_else(|| naming::creds_secret(self));
        managed.push(env_from_secret("MINIO_ACCESS_KEY", &creds, ACCESS_KEY));
        managed.push(env_from_secret("MINIO_SECRET_KEY", &creds, SECRET_KEY));

        if let Some(kms) = &self.spec.kms {
            managed.extend([
                env_value("MINIO_KMS_KES_ENDPOINT", kms.endpoint.clone()),
                env_value("MINIO_KMS_KES_CERT_FILE", format!("{CERTS_DIR}/client.crt")),
                env_value("MINIO_KMS_KES_KEY_FILE", format!("{CERTS_DIR}/client.key")),
                env_value("MINIO_KMS_KES_CA_PATH", format!("{CERTS_DIR}/CAs/kes.crt")),
                env_value("MINIO_KMS_KES_KEY_NAME", kms.key_name()),
            ]);
        }

        let mut env: Vec<corev1::EnvVar> = self
            .spec
            .env
            .iter()
            .filter(|user| !managed.iter().any(|m| m.name == user.name))
            .cloned()
            .collect();
        env.extend(managed);
        env
    }

    fn liveness_probe(&self) -> Option<corev1::Probe> {
        let cfg = self.spec.liveness.as_ref()?;
        Some(corev1::Probe {
            http_get: Some(corev1::HTTPGetAction {
                path: Some(LIVENESS_PATH.to_owned()),
                port: intstr::IntOrString::Int(MINIO_PORT),
                scheme: Some(self.scheme().to_uppercase()),
                ..Default::default()
            }),
            initial_delay_seconds: cfg.initial_delay_seconds,
            period_seconds: cfg.period_seconds,
            timeout_seconds: cfg.timeout_seconds,
            failure_threshold: Some(LIVENESS_FAILURE_THRESHOLD),
            ..Default::default()
        })
    }

    /// Blocks pod start until every mount and, with TLS, every certificate
    /// file can be read.
    fn validate_mounts_init_container(&self, pool: &Pool) -> corev1::Container {
        let mounts = self.volume_mounts(pool);
        let mut script: String = mounts
            .iter()
            .map(|m| format!("until /bin/stat {}; do sleep 2; done;", m.mount_path))
            .collect();

        if self.tls_enabled() {
            script.push_str("echo Wait till certs can be read;");
            for file in ["private.key", "public.crt", "CAs/public.crt"] {
                script.push_str(&format!(
                    "until /bin/cat {CERTS_DIR}/{file} > /dev/null; do sleep 2; done;"
                ));
            }
        }

        corev1::Container {
            name: VALIDATE_MOUNTS_INIT_CONTAINER.to_owned(),
            image: Some(INIT_CONTAINER_IMAGE.to_owned()),
            command: Some(vec!["/bin/sh".to_owned(), "-c".to_owned()]),
            args: Some(vec![script]),
            volume_mounts: Some(mounts),
            ..Default::default()
        }
    }

    fn wait_for_dns_init_container(&self) -> corev1::Container {
        let host = naming::headless_host(self);
        corev1::Container {
            name: WAIT_FOR_DNS_INIT_CONTAINER.to_owned(),
            image: Some(INIT_CONTAINER_IMAGE.to_owned()),
            command: Some(vec!["/bin/sh".to_owned(), "-c".to_owned()]),
            args: Some(vec![format!(
                "echo Wait for service; until nslookup {host} ; do echo waiting for {host}; sleep 2; done; "
            )]),
            ..Default::default()
        }
    }

    /// Creates volume claim templates for a pool
    fn volume_claim_templates(&self, pool: &Pool) -> Vec<corev1::PersistentVolumeClaim> {
        // capacity was checked by Tenant::validate before generation
        let capacity = pool
            .volume_capacity()
            .unwrap_or_else(|_| DEFAULT_VOLUME_CAPACITY.to_owned());

        let spec = corev1::PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_owned()]),
            storage_class_name: pool.storage_class_name.clone(),
            resources: Some(corev1::VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_owned(),
                    Quantity(capacity),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        };

        (0..pool.volumes_per_server)
            .map(|i| corev1::PersistentVolumeClaim {
                metadata: metav1::ObjectMeta {
                    name: Some(volume_claim_template_name(i)),
                    labels: Some(naming::pool_selector(self, pool)),
                    ..Default::default()
                },
                spec: Some(spec.clone()),
                ..Default::default()
            })
            .collect()
    }

    pub fn new_statefulset(&self, pool: &Pool) -> v1::StatefulSet {
        let selector_labels = naming::pool_selector(self, pool);

        let container = corev1::Container {
            name: MINIO_CONTAINER_NAME.to_owned(),
            image: Some(self.image().to_owned()),
            image_pull_policy: self
                .spec
                .image_pull_policy
                .as_ref()
                .map(ToString::to_string),
            args: Some(self.container_args()),
            env: Some(self.minio_env()),
            ports: Some(vec![corev1::ContainerPort {
                container_port: MINIO_PORT,
                ..Default::default()
            }]),
            volume_mounts: Some(self.volume_mounts(pool)),
            resources: pool.resources.clone(),
            liveness_probe: self.liveness_probe(),
            ..Default::default()
        };

        let projection = self.tls_projection();
        let volumes = (!projection.is_empty()).then(|| {
            vec![corev1::Volume {
                name: TLS_VOLUME_NAME.to_owned(),
                projected: Some(corev1::ProjectedVolumeSource {
                    sources: Some(projection),
                    ..Default::default()
                }),
                ..Default::default()
            }]
        });

        v1::StatefulSet {
            metadata: self.new_object_meta(naming::statefulset(self, pool), selector_labels.clone()),
            spec: Some(v1::StatefulSetSpec {
                replicas: Some(pool.servers),
                service_name: Some(naming::headless_service(self)),
                pod_management_policy: Some(
                    self.spec
                        .pod_management_policy
                        .clone()
                        .unwrap_or_default()
                        .to_string(),
                ),
                update_strategy: Some(v1::StatefulSetUpdateStrategy {
                    type_: Some("RollingUpdate".to_owned()),
                    ..Default::default()
                }),
                selector: metav1::LabelSelector {
                    match_labels: Some(selector_labels.clone()),
                    ..Default::default()
                },
                template: corev1::PodTemplateSpec {
                    metadata: Some(metav1::ObjectMeta {
                        labels: Some(selector_labels),
                        ..Default::default()
                    }),
                    spec: Some(corev1::PodSpec {
                        init_containers: Some(vec![
                            self.validate_mounts_init_container(pool),
                            self.wait_for_dns_init_container(),
                        ]),
                        containers: vec![container],
                        volumes,
                        restart_policy: Some("Always".to_owned()),
                        service_account_name: self.spec.service_account_name.clone(),
                        priority_class_name: self.spec.priority_class_name.clone(),
                        scheduler_name: self.spec.scheduler.clone(),
                        image_pull_secrets: self
                            .spec
                            .image_pull_secret
                            .clone()
                            .filter(|s| !s.name.is_empty())
                            .map(|s| vec![s]),
                        node_selector: pool.node_selector.clone(),
                        affinity: pool.affinity.clone(),
                        tolerations: pool.tolerations.clone(),
                        ..Default::default()
                    }),
                },
                volume_claim_templates: Some(self.volume_claim_templates(pool)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Certificate roles whose Secrets the pods of every pool mount.
    pub fn statefulset_cert_roles(&self) -> Vec<CertRole> {
        self.tls_sources().into_iter().map(|s| s.role).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{create_test_tenant, single_drive_tenant, with_auto_tls, with_kms};

    fn pod_spec(sts: &v1::StatefulSet) -> corev1::PodSpec {
        sts.spec
            .clone()
            .expect("StatefulSet should have spec")
            .template
            .spec
            .expect("Pod template should have spec")
    }

    #[test]
    fn test_volume_mounts_indexed_per_volume() {
        let tenant = create_test_tenant();
        let pool = &tenant.spec.pools[0];

        let mounts = tenant.volume_mounts(pool);
        assert_eq!(mounts.len(), 8);
        assert_eq!(mounts[0].name, "data0");
        assert_eq!(mounts[0].mount_path, "/export0");
        assert_eq!(mounts[7].mount_path, "/export7");
    }

    #[test]
    fn test_single_volume_mount_has_no_suffix() {
        let tenant = single_drive_tenant();
        let mounts = tenant.volume_mounts(&tenant.spec.pools[0]);
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, "/export");
    }

    #[test]
    fn test_standalone_args() {
        let tenant = single_drive_tenant();
        assert_eq!(
            tenant.container_args(),
            vec!["server", "--certs-dir", "/tmp/certs", "/export"]
        );
    }

    #[test]
    fn test_distributed_args_align_hosts_with_paths() {
        let mut tenant = create_test_tenant();
        tenant
            .add_pool(Pool::from_totals("pool-1", 2, 2, "2Ti").unwrap())
            .unwrap();

        let args = tenant.container_args();
        assert_eq!(args.len(), 5);
        assert_eq!(
            args[3],
            "http://minio-pool-0-{0...3}.minio-hl.tenant-ns.svc.cluster.local:9000/export{0...7}"
        );
        assert_eq!(
            args[4],
            "http://minio-pool-1-{0...1}.minio-hl.tenant-ns.svc.cluster.local:9000/export"
        );

        let tls = with_auto_tls(tenant);
        assert!(tls.container_args()[3].starts_with("https://"));
    }

    #[test]
    fn test_init_containers() {
        let tenant = with_auto_tls(create_test_tenant());
        let sts = tenant.new_statefulset(&tenant.spec.pools[0]);
        let init = pod_spec(&sts).init_containers.unwrap();

        assert_eq!(init.len(), 2);
        let script = &init[0].args.as_ref().unwrap()[0];
        assert!(script.contains("until /bin/stat /export0; do sleep 2; done;"));
        assert!(script.contains("until /bin/stat /export7; do sleep 2; done;"));
        assert!(script.contains("/tmp/certs/private.key"));
        assert!(script.contains("/tmp/certs/CAs/public.crt"));

        let dns = &init[1].args.as_ref().unwrap()[0];
        assert!(dns.contains("until nslookup minio-hl.tenant-ns.svc.cluster.local"));

        let plain = create_test_tenant();
        let sts = plain.new_statefulset(&plain.spec.pools[0]);
        let script = pod_spec(&sts).init_containers.unwrap()[0].args.clone().unwrap();
        assert!(!script[0].contains("/tmp/certs"));
    }

    #[test]
    fn test_env_contract_generated_credentials() {
        let tenant = create_test_tenant();
        let env = tenant.minio_env();

        let access = env.iter().find(|e| e.name == "MINIO_ACCESS_KEY").unwrap();
        let secret_ref = access
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(secret_ref.name, "minio-creds-secret");
        assert_eq!(secret_ref.key, "accesskey");
        assert!(env.iter().all(|e| !e.name.starts_with("MINIO_KMS")));
    }

    #[test]
    fn test_env_contract_explicit_secret_and_kms() {
        let mut tenant = with_kms(with_auto_tls(create_test_tenant()));
        tenant.spec.creds_secret = Some(corev1::LocalObjectReference {
            name: "my-creds".to_string(),
        });
        tenant.spec.env = vec![
            corev1::EnvVar {
                name: "MINIO_BROWSER".to_string(),
                value: Some("off".to_string()),
                ..Default::default()
            },
            corev1::EnvVar {
                name: "MINIO_UPDATE".to_string(),
                value: Some("off".to_string()),
                ..Default::default()
            },
        ];

        let env = tenant.minio_env();
        assert_eq!(env[0].name, "MINIO_BROWSER", "user env comes first");
        assert_eq!(
            env.iter().filter(|e| e.name == "MINIO_UPDATE").count(),
            1,
            "operator-managed names win"
        );

        let access = env.iter().find(|e| e.name == "MINIO_SECRET_KEY").unwrap();
        assert_eq!(
            access
                .value_from
                .as_ref()
                .and_then(|v| v.secret_key_ref.as_ref())
                .unwrap()
                .name,
            "my-creds"
        );

        let get = |name: &str| {
            env.iter()
                .find(|e| e.name == name)
                .and_then(|e| e.value.clone())
                .unwrap()
        };
        assert_eq!(get("MINIO_KMS_KES_ENDPOINT"), "https://kes.kms:7373");
        assert_eq!(get("MINIO_KMS_KES_CERT_FILE"), "/tmp/certs/client.crt");
        assert_eq!(get("MINIO_KMS_KES_KEY_FILE"), "/tmp/certs/client.key");
        assert_eq!(get("MINIO_KMS_KES_CA_PATH"), "/tmp/certs/CAs/kes.crt");
        assert_eq!(get("MINIO_KMS_KES_KEY_NAME"), "my-minio-key");
    }

    #[test]
    fn test_statefulset_shape() {
        let tenant = create_test_tenant();
        let pool = &tenant.spec.pools[0];
        let sts = tenant.new_statefulset(pool);

        assert_eq!(sts.metadata.name.as_deref(), Some("minio-pool-0"));
        assert_eq!(sts.metadata.namespace.as_deref(), Some("tenant-ns"));
        let owners = sts.metadata.owner_references.as_ref().unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "test-uid-123");

        let spec = sts.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(4));
        assert_eq!(spec.service_name.as_deref(), Some("minio-hl"));
        assert_eq!(spec.pod_management_policy.as_deref(), Some("Parallel"));

        let vcts = spec.volume_claim_templates.as_ref().unwrap();
        assert_eq!(vcts.len(), 8);
        let storage = vcts[0]
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .and_then(|r| r.get("storage"))
            .unwrap();
        assert_eq!(storage.0, "512Gi");

        assert_eq!(
            spec.template.metadata.as_ref().unwrap().labels,
            spec.selector.match_labels
        );
        assert!(pod_spec(&sts).volumes.is_none(), "no TLS volume without TLS");
    }

    #[test]
    fn test_liveness_probe_scheme_follows_tls() {
        let mut tenant = with_auto_tls(create_test_tenant());
        tenant.spec.liveness = Some(crate::types::v1::k8s::ProbeConfig {
            initial_delay_seconds: Some(10),
            period_seconds: Some(1),
            timeout_seconds: Some(1),
        });
        let sts = tenant.new_statefulset(&tenant.spec.pools[0]);
        let probe = pod_spec(&sts).containers[0].liveness_probe.clone().unwrap();
        let http = probe.http_get.unwrap();
        assert_eq!(http.scheme.as_deref(), Some("HTTPS"));
        assert_eq!(http.path.as_deref(), Some("/minio/health/live"));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let tenant = with_kms(with_auto_tls(create_test_tenant()));
        let pool = &tenant.spec.pools[0];

        let first = serde_json::to_vec(&tenant.new_statefulset(pool)).unwrap();
        let second = serde_json::to_vec(&tenant.new_statefulset(pool)).unwrap();
        assert_eq!(first, second);
    }
}
