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
use k8s_openapi::api::apps::v1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

pub const CONSOLE_CONTAINER_NAME: &str = "console";
pub const CONSOLE_PORT: i32 = 9090;

impl Tenant {
    /// Secret the console reads its JWT, PBKDF and MinIO credentials from.
    pub fn console_secret_name(&self) -> String {
        self.spec
            .console
            .as_ref()
            .and_then(|c| c.console_secret.as_ref())
            .filter(|s| !s.name.is_empty())
            .map(|s| s.name.clone())
            .unwrap_or_else(|| naming::console_secret(self))
    }

    fn console_env(&self) -> Vec<corev1::EnvVar> {
        let mut env = vec![corev1::EnvVar {
            name: "MCS_MINIO_SERVER".to_owned(),
            value: Some(format!(
                "{}://{}:{}",
                self.scheme(),
                naming::service_host(self, &naming::minio_service(self)),
                self.minio_service_port()
            )),
            ..Default::default()
        }];

        if self.tls_enabled() {
            env.push(corev1::EnvVar {
                name: "MCS_MINIO_SERVER_TLS_SKIP_VERIFICATION".to_owned(),
                value: Some("on".to_owned()),
                ..Default::default()
            });
        }

        env
    }

    pub fn new_console_deployment(&self) -> v1::Deployment {
        let config = self.console_config();
        let selector_labels = naming::console_selector(self);

        let container = corev1::Container {
            name: CONSOLE_CONTAINER_NAME.to_owned(),
            image: Some(config.image().to_owned()),
            image_pull_policy: Some(
                self.spec
                    .image_pull_policy
                    .clone()
                    .unwrap_or_default()
                    .to_string(),
            ),
            args: Some(vec!["server".to_owned()]),
            ports: Some(vec![corev1::ContainerPort {
                container_port: CONSOLE_PORT,
                ..Default::default()
            }]),
            env: Some(self.console_env()),
            env_from: Some(vec![corev1::EnvFromSource {
                secret_ref: Some(corev1::SecretEnvSource {
                    name: self.console_secret_name(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            resources: config.resources.clone(),
            ..Default::default()
        };

        v1::Deployment {
            metadata: self.new_object_meta(naming::console(self), selector_labels.clone()),
            spec: Some(v1::DeploymentSpec {
                replicas: Some(config.replicas()),
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
                        containers: vec![container],
                        restart_policy: Some("Always".to_owned()),
                        image_pull_secrets: self
                            .spec
                            .image_pull_secret
                            .clone()
                            .filter(|s| !s.name.is_empty())
                            .map(|s| vec![s]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::tests::{create_test_tenant, with_auto_tls};
    use crate::types::v1::console::ConsoleConfig;
    use k8s_openapi::api::core::v1 as corev1;

    #[test]
    fn test_console_defaults() {
        let tenant = create_test_tenant();
        let deployment = tenant.new_console_deployment();
        let spec = deployment.spec.unwrap();
        let container = &spec.template.spec.unwrap().containers[0];

        assert_eq!(deployment.metadata.name.as_deref(), Some("minio-console"));
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(container.image.as_deref(), Some("minio/mcs:v0.2.1"));

        let env = container.env.as_ref().unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(
            env[0].value.as_deref(),
            Some("http://minio-minio.tenant-ns.svc.cluster.local:80")
        );
        let env_from = container.env_from.as_ref().unwrap();
        assert_eq!(
            env_from[0].secret_ref.as_ref().unwrap().name,
            "minio-console-secret"
        );
    }

    #[test]
    fn test_console_tls_and_overrides() {
        let mut tenant = with_auto_tls(create_test_tenant());
        tenant.spec.console = Some(ConsoleConfig {
            image: Some("minio/mcs:v0.3.0".to_string()),
            replicas: Some(2),
            console_secret: Some(corev1::LocalObjectReference {
                name: "my-console".to_string(),
            }),
            resources: None,
        });

        let deployment = tenant.new_console_deployment();
        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(2));
        let container = &spec.template.spec.unwrap().containers[0];
        let env = container.env.as_ref().unwrap();
        assert!(env[0].value.as_deref().unwrap().starts_with("https://"));
        assert_eq!(env[1].name, "MCS_MINIO_SERVER_TLS_SKIP_VERIFICATION");
        assert_eq!(
            container.env_from.as_ref().unwrap()[0]
                .secret_ref
                .as_ref()
                .unwrap()
                .name,
            "my-console"
        );
    }
}
