// Copyright 2025 The MinIO Operator Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use rcgen::{
    CertificateParams, DistinguishedName, DnType, DnValue, KeyPair, PKCS_ECDSA_P521_SHA512,
};
use rustls::crypto::aws_lc_rs::sign;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls_pemfile::Item;
use snafu::{ResultExt, Snafu};
use std::io::{self, Cursor};
use x509_parser::prelude::{FromDer, X509Certificate};

/// Fraction of a certificate's lifetime after which it is re-issued, as a ratio.
const ROTATION_NUMERATOR: i64 = 4;
const ROTATION_DENOMINATOR: i64 = 5;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("parse certificate error"))]
    InvalidCertificate { source: io::Error },

    #[snafu(display("no certificate"))]
    NonCertificate,

    #[snafu(display("parse private key error"))]
    InvalidPrivateKey { source: io::Error },

    #[snafu(display("no private key"))]
    NonPrivateKey,

    #[snafu(display("key pair match failed"))]
    MatchFailed { source: rustls::Error },

    #[snafu(display("no supported sign type"))]
    NoSupportedSignType { source: rustls::Error },

    #[snafu(display("no supported pem type"))]
    NoSupportedPEMType,

    #[snafu(display("decode certificate error: {}", message))]
    DecodeCertificate { message: String },

    #[snafu(display("generate private key error"))]
    KeyGeneration { source: rcgen::Error },

    #[snafu(display("generate certificate signing request error"))]
    CsrGeneration { source: rcgen::Error },
}

// load certificates from PEM file
fn load_certs(cert: &[u8]) -> Result<Vec<CertificateDer<'static>>, Error> {
    let certs = rustls_pemfile::certs(&mut Cursor::new(cert))
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .context(InvalidCertificateSnafu)?;

    if certs.is_empty() {
        return NonCertificateSnafu.fail();
    }

    Ok(certs)
}

fn load_private_key(private_key: &[u8]) -> Result<PrivateKeyDer<'static>, Error> {
    let item = rustls_pemfile::read_one(&mut Cursor::new(private_key))
        .context(InvalidPrivateKeySnafu)?
        .ok_or(Error::NonPrivateKey)?;

    // only pkcs8/pkcs1/sec1 supported
    Ok(match item {
        Item::Pkcs8Key(key) => key.into(),
        Item::Pkcs1Key(key) => key.into(),
        Item::Sec1Key(key) => key.into(),
        _ => return NoSupportedPEMTypeSnafu.fail(),
    })
}

/// Checks that the leaf certificate was issued for the given private key.
pub fn x509_key_pair<T: AsRef<[u8]>>(cert_pem: T, key_pem: T) -> Result<(), Error> {
    let certs = load_certs(cert_pem.as_ref())?;
    let private_key = load_private_key(key_pem.as_ref())?;

    let signing_key = sign::any_supported_type(&private_key).context(NoSupportedSignTypeSnafu)?;

    let certified_key = CertifiedKey::new(certs, signing_key);
    certified_key.keys_match().context(MatchFailedSnafu)
}

/// Validity window of a leaf certificate, in unix seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: i64,
    pub not_after: i64,
}

impl Validity {
    pub fn from_pem(cert_pem: &[u8]) -> Result<Self, Error> {
        let certs = load_certs(cert_pem)?;
        let (_, cert) = X509Certificate::from_der(certs[0].as_ref()).map_err(|e| {
            Error::DecodeCertificate {
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
        })
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.not_after
    }

    /// True once 80% of the lifetime has elapsed.
    pub fn needs_rotation(&self, now: i64) -> bool {
        let lifetime = self.not_after - self.not_before;
        if lifetime <= 0 {
            return true;
        }
        (now - self.not_before) * ROTATION_DENOMINATOR >= lifetime * ROTATION_NUMERATOR
    }
}

/// A fresh ECDSA P-521 private key, PKCS#8 PEM encoded.
pub fn new_private_key_pem() -> Result<String, Error> {
    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P521_SHA512).context(KeyGenerationSnafu)?;
    Ok(key_pair.serialize_pem())
}

/// Builds a PEM CSR signed with ECDSA-SHA512 by `key_pem`, requesting every
/// entry of `hosts` as a DNS subject alternative name.
pub fn new_csr_pem(
    key_pem: &str,
    common_name: &str,
    organizations: &[String],
    hosts: &[String],
) -> Result<String, Error> {
    let key_pair = KeyPair::from_pem_and_sign_algo(key_pem, &PKCS_ECDSA_P521_SHA512)
        .context(KeyGenerationSnafu)?;

    let mut params = CertificateParams::new(hosts.to_vec()).context(CsrGenerationSnafu)?;
    let mut dn = DistinguishedName::new();
    dn.push(
        DnType::CommonName,
        DnValue::Utf8String(common_name.to_string()),
    );
    for org in organizations {
        dn.push(DnType::OrganizationName, DnValue::Utf8String(org.clone()));
    }
    params.distinguished_name = dn;

    params
        .serialize_request(&key_pair)
        .context(CsrGenerationSnafu)?
        .pem()
        .context(CsrGenerationSnafu)
}
