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
use super::workloads::{ACCESS_KEY, SECRET_KEY};
use crate::naming;
use crate::types::v1::tls::{CertRole, SecretLayout};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1 as corev1;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::BTreeMap;

const ACCESS_KEY_LEN: usize = 20;
const SECRET_KEY_LEN: usize = 40;

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn secret_data<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> BTreeMap<String, ByteString> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_owned(), ByteString(v.as_bytes().to_vec())))
        .collect()
}

/// MinIO root credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialValues {
    pub access_key: String,
    pub secret_key: String,
}

impl CredentialValues {
    pub fn generate() -> Self {
        Self {
            access_key: random_string(ACCESS_KEY_LEN),
            secret_key: random_string(SECRET_KEY_LEN),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleSecretValues {
    pub hmac_jwt_secret: String,
    pub pbkdf_passphrase: String,
    pub pbkdf_salt: String,
    pub access_key: String,
    pub secret_key: String,
}

impl ConsoleSecretValues {
    pub fn generate() -> Self {
        Self {
            hmac_jwt_secret: random_string(32),
            pbkdf_passphrase: random_string(32),
            pbkdf_salt: random_string(16),
            access_key: random_string(ACCESS_KEY_LEN),
            secret_key: random_string(SECRET_KEY_LEN),
        }
    }
}

impl Tenant {
    pub fn new_creds_secret(&self, values: &CredentialValues) -> corev1::Secret {
        corev1::Secret {
            metadata: self.new_object_meta(naming::creds_secret(self), BTreeMap::new()),
            type_: Some("Opaque".to_owned()),
            data: Some(secret_data([
                (ACCESS_KEY, values.access_key.as_str()),
                (SECRET_KEY, values.secret_key.as_str()),
            ])),
            ..Default::default()
        }
    }

    pub fn new_console_secret(&self, values: &ConsoleSecretValues) -> corev1::Secret {
        corev1::Secret {
            metadata: self.new_object_meta(naming::console_secret(self), BTreeMap::new()),
            type_: Some("Opaque".to_owned()),
            data: Some(secret_data([
                ("MCS_HMAC_JWT_SECRET", values.hmac_jwt_secret.as_str()),
                ("MCS_PBKDF_PASSPHRASE", values.pbkdf_passphrase.as_str()),
                ("MCS_PBKDF_SALT", values.pbkdf_salt.as_str()),
                ("MCS_ACCESS_KEY", values.access_key.as_str()),
                ("MCS_SECRET_KEY", values.secret_key.as_str()),
            ])),
            ..Default::default()
        }
    }

    fn cert_role_labels(&self, role: CertRole) -> BTreeMap<String, String> {
        [(naming::LABEL_CERT_ROLE.to_owned(), role.to_string())]
            .into_iter()
            .collect()
    }

    /// Issued certificate and its key, in the layout the pods project.
    pub fn new_tls_secret(&self, role: CertRole, cert_pem: &str, key_pem: &str) -> corev1::Secret {
        let layout = SecretLayout::Generic;
        corev1::Secret {
            metadata: self.new_object_meta(naming::tls_secret(self, role), self.cert_role_labels(role)),
            type_: Some("Opaque".to_owned()),
            data: Some(secret_data([
                (layout.certificate_key(), cert_pem),
                (layout.private_key_key(), key_pem),
            ])),
            ..Default::default()
        }
    }

    /// Holds the private key of a submitted CSR across reconcile attempts.
    pub fn new_pending_key_secret(
        &self,
        role: CertRole,
        key_pem: &str,
        submitted_at: &str,
    ) -> corev1::Secret {
        let mut metadata =
            self.new_object_meta(naming::pending_key_secret(self, role), self.cert_role_labels(role));
        metadata.annotations = Some(BTreeMap::from([(
            naming::ANNOTATION_SUBMITTED_AT.to_owned(),
            submitted_at.to_owned(),
        )]));

        corev1::Secret {
            metadata,
            type_: Some("Opaque".to_owned()),
            data: Some(secret_data([(
                SecretLayout::Generic.private_key_key(),
                key_pem,
            )])),
            ..Default::default()
        }
    }
}

/// Reads a UTF-8 value out of a Secret's data.
pub fn secret_value(secret: &corev1::Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|value| String::from_utf8(value.0.clone()).ok())
}
