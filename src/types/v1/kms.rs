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

use super::tls::ExternalCertSecret;
use kube::KubeSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_KMS_KEY_NAME: &str = "my-minio-key";

/// External KES endpoint MinIO encrypts objects through.
#[derive(Default, Deserialize, Serialize, Clone, Debug, KubeSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KmsConfig {
    #[x_kube(validation = Rule::new("self != ''").message("kms endpoint must not be empty"))]
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,

    /// Hostnames the auto-issued KMS certificate is valid for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,

    /// KMS serving certificate, trusted by MinIO as a CA in `external` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_cert_secret: Option<ExternalCertSecret>,
}

impl KmsConfig {
    pub fn key_name(&self) -> &str {
        self.key_name.as_deref().unwrap_or(DEFAULT_KMS_KEY_NAME)
    }

    /// `hosts` when given, otherwise the host part of `endpoint`.
    pub fn cert_hosts(&self) -> Vec<String> {
        if !self.hosts.is_empty() {
            return self.hosts.clone();
        }
        self.endpoint
            .parse::<http::Uri>()
            .ok()
            .and_then(|uri| uri.host().map(str::to_owned))
            .filter(|host| !host.is_empty())
            .into_iter()
            .collect()
    }
}
