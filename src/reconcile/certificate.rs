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

//! Issues TLS key pairs through the cluster's CSR approval workflow.
//!
//! Nothing is kept in memory between attempts. Each attempt observes the
//! persisted TLS Secret, the pending key Secret and the CSR of a role, derives
//! one [`Step`] from them and performs it. A role never has more than one CSR
//! because its name is derived from the tenant and the role, and a CSR is only
//! submitted while none exists.

use super::{Error, notify};
use crate::context::{Context, PatchStrategy};
use crate::naming;
use crate::types::v1::status::certificate::{CertPhase, Certificate};
use crate::types::v1::tenant::{Tenant, TlsSource, secret_value};
use crate::types::v1::tls::{CertRole, SecretLayout};
use crate::utils::tls;
use chrono::{DateTime, Utc};
use k8s_openapi::ByteString;
use k8s_openapi::api::certificates::v1::{CertificateSigningRequest, CertificateSigningRequestSpec};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use tracing::{debug, info, warn};

const SERVER_USAGES: [&str; 3] = ["digital signature", "key encipherment", "server auth"];
const CLIENT_USAGES: [&str; 3] = ["digital signature", "key encipherment", "client auth"];

/// What one attempt does for one role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// The persisted certificate is current.
    Persisted,
    /// Current certificate, but the CSR or pending key outlived it.
    Cleanup,
    /// Generate a key, store it and submit a CSR.
    Generate,
    /// The key is stored but its CSR is gone: submit again with the same key.
    Resubmit { key_pem: String },
    /// Store the issued certificate next to its key.
    Persist { key_pem: String, cert_pem: String },
    /// Drop the leftovers and start over on the next attempt.
    Reset { reason: String },
    Wait(CertPhase),
    Blocked { phase: CertPhase, message: String },
}

impl Step {
    /// Phase reported once the step is carried out.
    pub fn phase(&self) -> CertPhase {
        match self {
            Step::Persisted | Step::Cleanup | Step::Persist { .. } => CertPhase::SecretPersisted,
            Step::Generate | Step::Resubmit { .. } | Step::Reset { .. } => CertPhase::KeyGenerated,
            Step::Wait(phase) | Step::Blocked { phase, .. } => *phase,
        }
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Step::Reset { reason } => Some(reason.clone()),
            Step::Blocked { message, .. } => Some(message.clone()),
            Step::Wait(CertPhase::Submitted) => Some("waiting for the CSR to be approved".to_owned()),
            Step::Wait(CertPhase::Approved) => Some("waiting for the signer to issue the certificate".to_owned()),
            _ => None,
        }
    }
}

/// Result of one attempt for one role.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleReport {
    pub certificate: Certificate,
    /// A Secret the pods can mount exists for this role.
    pub usable: bool,
}

/// Cluster objects of one role, as read at the start of the attempt.
#[derive(Clone, Copy, Debug, Default)]
pub struct Observed<'a> {
    pub tls: Option<&'a Secret>,
    pub pending: Option<&'a Secret>,
    pub csr: Option<&'a CertificateSigningRequest>,
}

/// Validity of a persisted certificate whose key matches.
fn persisted_validity(tls: &Secret) -> Option<tls::Validity> {
    let layout = SecretLayout::Generic;
    let cert = secret_value(tls, layout.certificate_key())?;
    let key = secret_value(tls, layout.private_key_key())?;

    tls::x509_key_pair(cert.as_str(), key.as_str()).ok()?;
    tls::Validity::from_pem(cert.as_bytes()).ok()
}

fn is_current(tls: &Secret, now: i64) -> bool {
    persisted_validity(tls).is_some_and(|v| !v.needs_rotation(now))
}

/// The pods can mount it: the key matches and it has not expired, even if
/// it is due for rotation.
pub fn is_usable(tls: &Secret, now: i64) -> bool {
    persisted_validity(tls).is_some_and(|v| !v.is_expired(now))
}

fn has_condition(csr: &CertificateSigningRequest, type_: &str) -> bool {
    csr.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| conds.iter().any(|c| c.type_ == type_ && c.status == "True"))
}

fn condition_message(csr: &CertificateSigningRequest, type_: &str) -> Option<String> {
    csr.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == type_)
        .and_then(|c| c.message.clone().or_else(|| c.reason.clone()))
}

fn issued_certificate(csr: &CertificateSigningRequest) -> Option<String> {
    csr.status
        .as_ref()?
        .certificate
        .as_ref()
        .and_then(|cert| String::from_utf8(cert.0.clone()).ok())
        .filter(|cert| !cert.trim().is_empty())
}

fn submitted_at(pending: &Secret) -> Option<DateTime<Utc>> {
    pending
        .metadata
        .annotations
        .as_ref()?
        .get(naming::ANNOTATION_SUBMITTED_AT)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Derives the next step of a role from what is in the cluster.
pub fn plan(observed: Observed<'_>, now: DateTime<Utc>, timeout: chrono::Duration) -> Step {
    if observed.tls.is_some_and(|tls| is_current(tls, now.timestamp())) {
        return if observed.csr.is_some() || observed.pending.is_some() {
            Step::Cleanup
        } else {
            Step::Persisted
        };
    }

    let key_pem = observed
        .pending
        .and_then(|p| secret_value(p, SecretLayout::Generic.private_key_key()))
        .filter(|key| !key.trim().is_empty());

    let (pending, key_pem, csr) = match (observed.pending, key_pem, observed.csr) {
        (None, _, None) => return Step::Generate,
        (None, _, Some(_)) => {
            return Step::Reset {
                reason: "CSR has no pending private key".to_owned(),
            };
        }
        (Some(_), None, _) => {
            return Step::Reset {
                reason: "pending Secret holds no private key".to_owned(),
            };
        }
        (Some(_), Some(key_pem), None) => return Step::Resubmit { key_pem },
        (Some(pending), Some(key_pem), Some(csr)) => (pending, key_pem, csr),
    };

    for type_ in ["Denied", "Failed"] {
        if has_condition(csr, type_) {
            return Step::Blocked {
                phase: CertPhase::Denied,
                message: condition_message(csr, type_)
                    .unwrap_or_else(|| format!("CSR {}", type_.to_lowercase())),
            };
        }
    }

    if has_condition(csr, "Approved") {
        return match issued_certificate(csr) {
            Some(cert_pem) if tls::x509_key_pair(cert_pem.as_str(), key_pem.as_str()).is_ok() => {
                Step::Persist { key_pem, cert_pem }
            }
            Some(_) => Step::Reset {
                reason: "issued certificate does not match the pending key".to_owned(),
            },
            None => Step::Wait(CertPhase::Approved),
        };
    }

    match submitted_at(pending) {
        Some(at) if now - at > timeout => Step::Blocked {
            phase: CertPhase::TimedOut,
            message: format!("CSR not approved within {}s", timeout.num_seconds()),
        },
        Some(_) => Step::Wait(CertPhase::Submitted),
        None => Step::Reset {
            reason: "pending Secret has no submission time".to_owned(),
        },
    }
}

/// `system:node:{tenant}-{role}.{namespace}`
pub fn common_name(tenant: &Tenant, role: CertRole) -> String {
    format!(
        "system:node:{}-{}.{}",
        tenant.name(),
        role,
        naming::namespace(tenant)
    )
}

pub fn new_csr(tenant: &Tenant, role: CertRole, request_pem: &str, signer: &str) -> CertificateSigningRequest {
    let usages = match role {
        CertRole::Client => CLIENT_USAGES,
        CertRole::Server | CertRole::Kms => SERVER_USAGES,
    };

    CertificateSigningRequest {
        metadata: ObjectMeta {
            name: Some(naming::csr(tenant, role)),
            labels: Some(naming::csr_labels(tenant, role)),
            ..Default::default()
        },
        spec: CertificateSigningRequestSpec {
            request: ByteString(request_pem.as_bytes().to_vec()),
            signer_name: signer.to_owned(),
            usages: Some(usages.iter().map(|u| (*u).to_owned()).collect()),
            ..Default::default()
        },
        status: None,
    }
}

async fn submit(ctx: &Context, tenant: &Tenant, role: CertRole, key_pem: &str) -> Result<bool, Error> {
    let request = tls::new_csr_pem(
        key_pem,
        &common_name(tenant, role),
        &tenant.cert_organizations(),
        &tenant.cert_hosts(role),
    )?;
    let signer = match role {
        CertRole::Client => &ctx.config.client_signer,
        CertRole::Server | CertRole::Kms => &ctx.config.server_signer,
    };

    let created = ctx.create_csr(&new_csr(tenant, role, &request, signer)).await?;
    if created {
        info!("submitted CSR {} signed by {}", naming::csr(tenant, role), signer);
        notify(
            ctx,
            tenant,
            EventType::Normal,
            "CSRSubmitted",
            &format!("submitted {role} certificate request, waiting for approval"),
        )
        .await;
    }
    Ok(created)
}

async fn discard(ctx: &Context, tenant: &Tenant, role: CertRole) -> Result<(), Error> {
    ctx.delete_csr(&naming::csr(tenant, role)).await?;
    ctx.delete_opt::<Secret>(&naming::pending_key_secret(tenant, role), &tenant.namespace()?)
        .await?;
    Ok(())
}

async fn ensure_issued(ctx: &Context, tenant: &Tenant, role: CertRole, now: DateTime<Utc>) -> Result<RoleReport, Error> {
    let ns = tenant.namespace()?;
    let secret_name = naming::tls_secret(tenant, role);
    let pending_name = naming::pending_key_secret(tenant, role);

    let persisted: Option<Secret> = ctx.get_opt(&secret_name, &ns).await?;
    let pending: Option<Secret> = ctx.get_opt(&pending_name, &ns).await?;
    let csr = ctx.get_csr(&naming::csr(tenant, role)).await?;

    let step = plan(
        Observed {
            tls: persisted.as_ref(),
            pending: pending.as_ref(),
            csr: csr.as_ref(),
        },
        now,
        ctx.config.csr_timeout(),
    );
    debug!("certificate {} of tenant {}: {:?}", role, tenant.name(), step.phase());

    match &step {
        Step::Persisted | Step::Wait(_) => {}
        Step::Cleanup => discard(ctx, tenant, role).await?,
        Step::Generate => {
            let key_pem = tls::new_private_key_pem()?;
            let secret = tenant.new_pending_key_secret(role, &key_pem, &now.to_rfc3339());
            // Someone else stored a key first; pick it up next attempt.
            if ctx.ensure_exists(&secret).await? {
                submit(ctx, tenant, role, &key_pem).await?;
            }
        }
        Step::Resubmit { key_pem } => {
            let annotations = serde_json::json!({
                "metadata": { "annotations": { naming::ANNOTATION_SUBMITTED_AT: now.to_rfc3339() } }
            });
            ctx.ensure_patched::<Secret>(&pending_name, &ns, &annotations, PatchStrategy::Merge)
                .await?;
            submit(ctx, tenant, role, key_pem).await?;
        }
        Step::Persist { key_pem, cert_pem } => {
            let secret = tenant.new_tls_secret(role, cert_pem, key_pem);
            if !ctx.ensure_exists(&secret).await? {
                let data = serde_json::json!({ "data": secret.data });
                ctx.ensure_patched::<Secret>(&secret_name, &ns, &data, PatchStrategy::Merge)
                    .await?;
            }
            discard(ctx, tenant, role).await?;
            info!("persisted {} certificate into {}/{}", role, ns, secret_name);
            notify(
                ctx,
                tenant,
                EventType::Normal,
                "CertificatePersisted",
                &format!("{role} certificate stored in Secret {secret_name}"),
            )
            .await;
        }
        Step::Reset { reason } => {
            warn!("resetting {} certificate of tenant {}: {}", role, tenant.name(), reason);
            discard(ctx, tenant, role).await?;
        }
        Step::Blocked { phase, message } => {
            notify(
                ctx,
                tenant,
                EventType::Warning,
                "CertificateBlocked",
                &format!("{role} certificate {phase}: {message}"),
            )
            .await;
        }
    }

    let usable = step.phase().is_persisted()
        || persisted.as_ref().is_some_and(|s| is_usable(s, now.timestamp()));

    Ok(RoleReport {
        certificate: Certificate {
            role,
            phase: step.phase(),
            secret_name,
            message: step.message(),
        },
        usable,
    })
}

async fn ensure_external(ctx: &Context, tenant: &Tenant, source: &TlsSource) -> Result<RoleReport, Error> {
    let secret: Option<Secret> = ctx.get_opt(&source.secret_name, &tenant.namespace()?).await?;
    let present = secret
        .as_ref()
        .is_some_and(|s| secret_value(s, source.layout.certificate_key()).is_some());

    let certificate = Certificate {
        role: source.role,
        phase: if present {
            CertPhase::SecretPersisted
        } else {
            CertPhase::SecretMissing
        },
        secret_name: source.secret_name.clone(),
        message: (!present).then(|| {
            format!(
                "Secret {} with key {} not found",
                source.secret_name,
                source.layout.certificate_key()
            )
        }),
    };

    Ok(RoleReport {
        certificate,
        usable: present,
    })
}

/// Brings every certificate role of the tenant one step forward.
///
/// Roles progress independently; a blocked role does not hold back the others.
pub async fn ensure_certificates(ctx: &Context, tenant: &Tenant) -> Result<Vec<RoleReport>, Error> {
    let now = Utc::now();
    let mut reports = Vec::new();

    for source in tenant.tls_sources() {
        let report = if tenant.issues_certificates() {
            ensure_issued(ctx, tenant, source.role, now).await?
        } else {
            ensure_external(ctx, tenant, &source).await?
        };
        reports.push(report);
    }

    Ok(reports)
}
