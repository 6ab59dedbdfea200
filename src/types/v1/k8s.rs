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

//! Kubernetes enums and small structs the Tenant spec exposes verbatim.
//!
//! They serialize to the exact strings the API server expects, so the
//! generators can hand them to `k8s-openapi` fields with `to_string()`.

use k8s_openapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// How the StatefulSet of a pool starts and stops its MinIO servers.
///
/// MinIO servers of a pool wait for each other at startup, so `Parallel`
/// is the default: with `OrderedReady` pod 0 never becomes ready on its own
/// and the remaining pods are never started.
///
/// https://kubernetes.io/docs/concepts/workloads/controllers/statefulset/#pod-management-policies
#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, Display, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[schemars(rename_all = "PascalCase")]
pub enum PodManagementPolicy {
    /// One pod at a time, each waiting for its predecessor to be ready.
    #[strum(to_string = "OrderedReady")]
    OrderedReady,

    /// All pods of the pool at once.
    #[strum(to_string = "Parallel")]
    #[default]
    Parallel,
}

/// When the kubelet pulls the MinIO and console images.
///
/// https://kubernetes.io/docs/concepts/containers/images/#image-pull-policy
#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, Display, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
#[schemars(rename_all = "PascalCase")]
pub enum ImagePullPolicy {
    /// On every pod start. Needed when a release tag is re-pushed.
    #[strum(to_string = "Always")]
    Always,

    /// Only images already on the node are used.
    #[strum(to_string = "Never")]
    Never,

    #[strum(to_string = "IfNotPresent")]
    #[default]
    IfNotPresent,
}

/// Timing of the HTTP liveness probe on `/minio/health/live`.
///
/// The probe scheme follows the tenant TLS mode, so only timings are configurable.
/// Unset fields keep the kubelet defaults.
#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_match_the_api_server() {
        assert_eq!(PodManagementPolicy::default().to_string(), "Parallel");
        assert_eq!(
            serde_json::to_value(PodManagementPolicy::OrderedReady).unwrap(),
            "OrderedReady"
        );
        assert_eq!(ImagePullPolicy::default().to_string(), "IfNotPresent");
        let policy: ImagePullPolicy = serde_json::from_str("\"Always\"").unwrap();
        assert_eq!(policy, ImagePullPolicy::Always);
    }
}
