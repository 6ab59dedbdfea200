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
use super::console::CONSOLE_PORT;
use super::workloads::MINIO_PORT;
use crate::naming;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::util::intstr;
use std::collections::BTreeMap;

impl Tenant {
    /// Port clients reach MinIO on through the ClusterIP Service.
    pub fn minio_service_port(&self) -> i32 {
        if self.tls_enabled() { 443 } else { 80 }
    }

    /// a new MinIO Service for tenant
    pub fn new_minio_service(&self) -> corev1::Service {
        let port_name = if self.tls_enabled() {
            "https-minio"
        } else {
            "http-minio"
        };

        corev1::Service {
            metadata: self.new_object_meta(naming::minio_service(self), BTreeMap::new()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(naming::tenant_selector(self)),
                ports: Some(vec![corev1::ServicePort {
                    port: self.minio_service_port(),
                    target_port: Some(intstr::IntOrString::Int(MINIO_PORT)),
                    name: Some(port_name.to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// a new headless Service for tenant, giving every pod a stable DNS name
    pub fn new_headless_service(&self) -> corev1::Service {
        corev1::Service {
            metadata: self.new_object_meta(naming::headless_service(self), BTreeMap::new()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                cluster_ip: Some("None".to_owned()),
                publish_not_ready_addresses: Some(true),
                selector: Some(naming::tenant_selector(self)),
                ports: Some(vec![corev1::ServicePort {
                    port: MINIO_PORT,
                    name: Some(format!("{}-minio", self.scheme())),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// a new console Service for tenant
    pub fn new_console_service(&self) -> corev1::Service {
        corev1::Service {
            metadata: self.new_object_meta(naming::console(self), BTreeMap::new()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                selector: Some(naming::console_selector(self)),
                ports: Some(vec![corev1::ServicePort {
                    port: CONSOLE_PORT,
                    target_port: Some(intstr::IntOrString::Int(CONSOLE_PORT)),
                    name: Some("http-console".to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn new_services(&self) -> Vec<corev1::Service> {
        vec![
            self.new_minio_service(),
            self.new_headless_service(),
            self.new_console_service(),
        ]
    }
}
