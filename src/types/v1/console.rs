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

use k8s_openapi::api::core::v1 as corev1;
use kube::KubeSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONSOLE_IMAGE: &str = "minio/mcs:v0.2.1";
pub const DEFAULT_CONSOLE_REPLICAS: i32 = 1;

#[derive(Default, Deserialize, Serialize, Clone, Debug, KubeSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[x_kube(validation = Rule::new("self >= 0").message("console replicas must not be negative"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Secret holding the console's JWT and PBKDF material. Generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_secret: Option<corev1::LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,
}

impl ConsoleConfig {
    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_CONSOLE_IMAGE)
    }

    pub fn replicas(&self) -> i32 {
        self.replicas.unwrap_or(DEFAULT_CONSOLE_REPLICAS)
    }
}
