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

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

/// How the MinIO servers of a tenant obtain TLS material.
#[derive(Default, Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// Plain HTTP between clients and servers.
    #[default]
    #[strum(to_string = "none")]
    None,

    /// Key pairs are generated by the operator and signed through the
    /// cluster's CertificateSigningRequest API.
    #[strum(to_string = "auto-issued")]
    AutoIssued,

    /// Certificates are supplied by the user as Secrets.
    #[strum(to_string = "external")]
    External,
}

#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    #[serde(default)]
    pub mode: TlsMode,

    /// Server certificate, required in `external` mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_cert_secret: Option<ExternalCertSecret>,

    /// Client certificate presented to the KMS, required in `external` mode with a KMS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_client_cert_secret: Option<ExternalCertSecret>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_config: Option<CertConfig>,
}

/// Reference to a user supplied Secret holding a certificate.
///
/// `type` is the Secret type and decides which keys the certificate is read
/// from, see [`SecretLayout`].
#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalCertSecret {
    pub name: String,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

#[derive(Default, Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organization_name: Vec<String>,
}

/// The certificates a tenant may need. Each role progresses through issuance
/// independently of the others.
#[derive(
    Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "camelCase")]
pub enum CertRole {
    /// Serving certificate of the MinIO servers.
    #[strum(to_string = "server")]
    Server,

    /// Client certificate MinIO presents to the KMS.
    #[strum(to_string = "client")]
    Client,

    /// Serving certificate of the KMS, trusted by MinIO as a CA.
    #[strum(to_string = "kms")]
    Kms,
}

/// Key names a certificate Secret stores its material under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretLayout {
    /// `public.crt` / `private.key`, written by the operator itself.
    Generic,
    /// `kubernetes.io/tls`: `tls.crt` / `tls.key`, the CA is the certificate itself.
    KubernetesTls,
    /// cert-manager: `tls.crt` / `tls.key` with the issuing CA in `ca.crt`.
    CertManager,
}

impl SecretLayout {
    pub fn from_secret_type(type_: Option<&str>) -> Self {
        match type_ {
            Some("kubernetes.io/tls") => SecretLayout::KubernetesTls,
            Some("cert-manager.io/v1alpha2") | Some("cert-manager.io/v1") => SecretLayout::CertManager,
            _ => SecretLayout::Generic,
        }
    }

    pub fn certificate_key(&self) -> &'static str {
        match self {
            SecretLayout::Generic => "public.crt",
            SecretLayout::KubernetesTls | SecretLayout::CertManager => "tls.crt",
        }
    }

    pub fn private_key_key(&self) -> &'static str {
        match self {
            SecretLayout::Generic => "private.key",
            SecretLayout::KubernetesTls | SecretLayout::CertManager => "tls.key",
        }
    }

    pub fn ca_key(&self) -> &'static str {
        match self {
            SecretLayout::Generic => "public.crt",
            SecretLayout::KubernetesTls => "tls.crt",
            SecretLayout::CertManager => "ca.crt",
        }
    }
}
