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

use crate::types::v1::tls::CertRole;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Progress of one certificate role.
///
/// `KeyGenerated -> Submitted -> {Approved | Denied | TimedOut} -> SecretPersisted`
#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum CertPhase {
    KeyGenerated,
    Submitted,
    Approved,
    Denied,
    TimedOut,
    SecretPersisted,
    /// An externally supplied Secret is not there yet.
    SecretMissing,
}

impl CertPhase {
    /// Needs an administrator: a new request or a spec change.
    pub fn is_blocking(&self) -> bool {
        matches!(self, CertPhase::Denied | CertPhase::TimedOut)
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, CertPhase::SecretPersisted)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub role: CertRole,

    pub phase: CertPhase,

    pub secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
