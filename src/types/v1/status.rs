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

pub mod certificate;
pub mod pool;
pub mod state;

use kube::KubeSchema;
use serde::{Deserialize, Serialize};

/// Condition type raised while a certificate role is denied or timed out.
pub const CONDITION_CERTIFICATE_BLOCKED: &str = "CertificateBlocked";
/// Condition type raised while the spec fails validation.
pub const CONDITION_INVALID_SPEC: &str = "InvalidSpec";
/// Condition type reporting that every pool is applied and converged.
pub const CONDITION_READY: &str = "Ready";

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub current_state: state::State,

    #[serde(default)]
    pub available_replicas: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pools: Vec<pool::Pool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<certificate::Certificate>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,

    /// `True`, `False` or `Unknown`.
    pub status: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default)]
    pub message: String,

    /// RFC 3339 timestamp of the last change of `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(type_: &str, status: bool, reason: &str, message: impl Into<String>) -> Self {
        Self {
            type_: type_.to_owned(),
            status: if status { "True" } else { "False" }.to_owned(),
            reason: reason.to_owned(),
            message: message.into(),
            last_transition_time: None,
        }
    }
}

impl Status {
    /// Replaces the condition of the same type, keeping its transition time
    /// when the status did not flip.
    pub fn set_condition(&mut self, mut condition: Condition, now: &str) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == condition.type_)
        {
            Some(existing) => {
                condition.last_transition_time = if existing.status == condition.status {
                    existing.last_transition_time.clone()
                } else {
                    Some(now.to_owned())
                };
                *existing = condition;
            }
            None => {
                condition.last_transition_time = Some(now.to_owned());
                self.conditions.push(condition);
            }
        }
    }

    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}
