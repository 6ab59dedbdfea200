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

use super::{Tenant, TlsSource};
use crate::types::v1::tls::CertRole;
use k8s_openapi::api::core::v1 as corev1;

fn key_to_path(key: &str, path: &str) -> corev1::KeyToPath {
    corev1::KeyToPath {
        key: key.to_owned(),
        path: path.to_owned(),
        ..Default::default()
    }
}

impl TlsSource {
    /// Maps the keys of the source Secret onto the fixed file names MinIO
    /// reads from its certs directory.
    pub fn items(&self) -> Vec<corev1::KeyToPath> {
        let layout = self.layout;
        match self.role {
            CertRole::Server => vec![
                key_to_path(layout.certificate_key(), "public.crt"),
                key_to_path(layout.private_key_key(), "private.key"),
                key_to_path(layout.ca_key(), "CAs/public.crt"),
            ],
            CertRole::Client => vec![
                key_to_path(layout.certificate_key(), "client.crt"),
                key_to_path(layout.private_key_key(), "client.key"),
            ],
            CertRole::Kms => vec![key_to_path(layout.certificate_key(), "CAs/kes.crt")],
        }
    }
}

impl Tenant {
    /// Sources of the projected certificate volume, one per role the pods consume.
    pub fn tls_projection(&self) -> Vec<corev1::VolumeProjection> {
        self.tls_sources()
            .into_iter()
            .map(|source| corev1::VolumeProjection {
                secret: Some(corev1::SecretProjection {
                    name: source.secret_name.clone(),
                    items: Some(source.items()),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect()
    }
}
