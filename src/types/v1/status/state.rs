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

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use strum::Display;

/// Overall phase of a tenant as shown in `kubectl get tenants`.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Display, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    #[serde(rename = "Provisioning")]
    #[strum(serialize = "Provisioning")]
    Provisioning,

    #[serde(rename = "Waiting for certificates")]
    #[strum(serialize = "Waiting for certificates")]
    WaitingForCertificates,

    #[serde(rename = "Certificate blocked")]
    #[strum(serialize = "Certificate blocked")]
    CertificateBlocked,

    #[serde(rename = "Invalid spec")]
    #[strum(serialize = "Invalid spec")]
    InvalidSpec,

    #[serde(rename = "Updating")]
    #[strum(serialize = "Updating")]
    Updating,

    #[serde(rename = "Initialized")]
    #[strum(serialize = "Initialized")]
    Initialized,
}

impl JsonSchema for State {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("State")
    }
    fn schema_id() -> Cow<'static, str> {
        Cow::Borrowed(concat!(module_path!(), "::", "State"))
    }
    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema! {
            {"type": "string"}
        }
    }
}
