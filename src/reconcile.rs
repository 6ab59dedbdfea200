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

use crate::context::Context;
use crate::naming;
use crate::types::v1::status::Status;
use crate::types::v1::status::certificate::{CertPhase, Certificate};
use crate::types::v1::tenant::{ConsoleSecretValues, CredentialValues, Tenant};
use crate::types::v1::tls::CertRole;
use crate::{context, types, utils};
use certificate::RoleReport;
use chrono::Utc;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Secret;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use snafu::Snafu;
use status::Progress;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod apply;
pub mod certificate;
pub mod drift;
pub mod status;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Tls { source: utils::tls::Error },

    #[snafu(display("{} certificate is {}: {}", role, phase, message))]
    CertificateBlocked {
        role: CertRole,
        phase: CertPhase,
        message: String,
    },
}

impl Error {
    /// Retrying cannot help until the tenant spec changes.
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Types { source } => source.is_validation(),
            Error::Context {
                source: context::Error::Types { source },
            } => source.is_validation(),
            _ => false,
        }
    }
}

/// Key of a tenant in the failure counter.
pub(crate) fn attempt_key(tenant: &Tenant) -> String {
    format!("{}/{}", naming::namespace(tenant), tenant.name())
}

/// Records an event. A failure to record never fails the attempt.
pub(crate) async fn notify(ctx: &Context, tenant: &Tenant, event_type: EventType, reason: &str, message: &str) {
    if let Err(e) = ctx.record(tenant, event_type, reason, message).await {
        warn!("failed to record {} event for tenant {}: {}", reason, tenant.name(), e);
    }
}

/// What the certificates allow in this attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateGate {
    /// Every role the pods mount has a usable Secret.
    pub apply_pools: bool,
    pub blocked: Option<Certificate>,
    /// Some role is still being issued or rotated.
    pub pending: bool,
}

pub fn certificate_gate(tenant: &Tenant, reports: &[RoleReport]) -> CertificateGate {
    let apply_pools = tenant.statefulset_cert_roles().iter().all(|role| {
        reports
            .iter()
            .any(|r| r.certificate.role == *role && r.usable)
    });

    CertificateGate {
        apply_pools,
        blocked: reports
            .iter()
            .find(|r| r.certificate.phase.is_blocking())
            .map(|r| r.certificate.clone()),
        pending: reports
            .iter()
            .any(|r| !r.certificate.phase.is_persisted()),
    }
}

async fn write_status(ctx: &Context, tenant: &Tenant, status: Status) -> Result<(), Error> {
    if tenant.status.as_ref() == Some(&status) {
        debug!("status of tenant {} unchanged", tenant.name());
        return Ok(());
    }
    ctx.patch_status(tenant, &status).await?;
    Ok(())
}

/// Creates the credentials and console Secrets the tenant does not bring.
/// Existing Secrets are never regenerated.
async fn ensure_generated_secrets(ctx: &Context, tenant: &Tenant) -> Result<(), Error> {
    let ns = tenant.namespace()?;

    let explicit_creds = tenant
        .spec
        .creds_secret
        .as_ref()
        .is_some_and(|s| !s.name.is_empty());
    if !explicit_creds
        && ctx
            .get_opt::<Secret>(&naming::creds_secret(tenant), &ns)
            .await?
            .is_none()
    {
        ctx.ensure_exists(&tenant.new_creds_secret(&CredentialValues::generate()))
            .await?;
    }

    if tenant.console_secret_name() == naming::console_secret(tenant)
        && ctx
            .get_opt::<Secret>(&naming::console_secret(tenant), &ns)
            .await?
            .is_none()
    {
        ctx.ensure_exists(&tenant.new_console_secret(&ConsoleSecretValues::generate()))
            .await?;
    }

    Ok(())
}

pub async fn reconcile_tenant(tenant: Arc<Tenant>, ctx: Arc<Context>) -> Result<Action, Error> {
    let ns = tenant.namespace()?;
    let key = attempt_key(&tenant);

    let Some(latest) = ctx.get_opt::<Tenant>(&tenant.name(), &ns).await? else {
        debug!("tenant {} is gone", key);
        ctx.reset_attempts(&key);
        return Ok(Action::await_change());
    };

    if latest.metadata.deletion_timestamp.is_some() {
        debug!(
            "tenant {} is deleted, deletion_timestamp is {:?}",
            key, latest.metadata.deletion_timestamp
        );
        return Ok(Action::await_change());
    }

    info!(tenant = %latest.name(), namespace = %ns, "reconciling");
    let now = Utc::now().to_rfc3339();

    if let Err(source) = latest.validate() {
        warn!("tenant {} is invalid: {}", key, source);
        notify(&ctx, &latest, EventType::Warning, "InvalidSpec", &source.to_string()).await;
        write_status(&ctx, &latest, status::invalid_spec(&latest, &source.to_string(), &now)).await?;
        return Err(source.into());
    }

    ctx.validate_credential_secret(&latest).await?;
    ensure_generated_secrets(&ctx, &latest).await?;

    for service in latest.new_services() {
        ctx.ensure_exists(&service).await?;
    }

    let reports = certificate::ensure_certificates(&ctx, &latest).await?;
    let gate = certificate_gate(&latest, &reports);

    apply::apply(&ctx, &latest, &latest.new_console_deployment()).await?;

    let mut changed = false;
    let mut live = Vec::with_capacity(latest.spec.pools.len());
    for pool in &latest.spec.pools {
        let name = naming::statefulset(&latest, pool);
        if gate.apply_pools {
            changed |= apply::apply(&ctx, &latest, &latest.new_statefulset(pool))
                .await?
                .is_change();
        }
        live.push(ctx.get_opt::<StatefulSet>(&name, &ns).await?);
    }

    let progress = match (&gate.blocked, gate.apply_pools, changed) {
        (Some(cert), _, _) => Progress::CertificateBlocked {
            message: format!(
                "{} certificate {}: {}",
                cert.role,
                cert.phase,
                cert.message.as_deref().unwrap_or_default()
            ),
        },
        (None, false, _) => Progress::WaitingForCertificates,
        (None, true, true) => Progress::Updating,
        (None, true, false) => Progress::Applied,
    };

    let certificates = reports.into_iter().map(|r| r.certificate).collect();
    write_status(
        &ctx,
        &latest,
        status::build(&latest, &progress, certificates, &live, &now),
    )
    .await?;

    if let Some(cert) = gate.blocked {
        return CertificateBlockedSnafu {
            role: cert.role,
            phase: cert.phase,
            message: cert.message.unwrap_or_default(),
        }
        .fail();
    }

    ctx.reset_attempts(&key);
    let action = if gate.pending || progress == Progress::Updating {
        Action::requeue(ctx.config.pending_interval())
    } else {
        Action::requeue(ctx.config.resync_interval())
    };
    info!("tenant {} reconciled: {:?}, next {:?}", key, progress, action);
    Ok(action)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::api_server::{ApiServer, path};
    use crate::tests::{NS, approve, create_test_tenant, deny, serve_tenant, with_auto_tls, with_kms};
    use crate::types::error::InvalidSpecSnafu;
    use crate::types::v1::pool::Pool;
    use crate::types::v1::status::state::State;
    use http::Method;
    use k8s_openapi::api::apps::v1::Deployment;
    use k8s_openapi::api::certificates::v1::CertificateSigningRequest;
    use kube::Resource;

    fn report(role: CertRole, phase: CertPhase, usable: bool) -> RoleReport {
        RoleReport {
            certificate: Certificate {
                role,
                phase,
                secret_name: format!("minio-{role}-tls"),
                message: None,
            },
            usable,
        }
    }

    #[test]
    fn test_no_tls_applies_pools() {
        let tenant = create_test_tenant();
        let gate = certificate_gate(&tenant, &[]);
        assert!(gate.apply_pools);
        assert!(!gate.pending);
        assert!(gate.blocked.is_none());
    }

    #[test]
    fn test_pending_certificate_holds_pools() {
        let tenant = with_auto_tls(create_test_tenant());
        let gate = certificate_gate(&tenant, &[report(CertRole::Server, CertPhase::KeyGenerated, false)]);
        assert!(!gate.apply_pools);
        assert!(gate.pending);
    }

    #[test]
    fn test_denied_certificate_blocks_without_statefulset() {
        let tenant = with_kms(with_auto_tls(create_test_tenant()));
        let gate = certificate_gate(
            &tenant,
            &[
                report(CertRole::Server, CertPhase::SecretPersisted, true),
                report(CertRole::Client, CertPhase::Denied, false),
                report(CertRole::Kms, CertPhase::SecretPersisted, true),
            ],
        );

        assert!(!gate.apply_pools);
        assert_eq!(gate.blocked.unwrap().role, CertRole::Client);
    }

    #[test]
    fn test_rotation_keeps_pools_applied() {
        let tenant = with_auto_tls(create_test_tenant());
        let gate = certificate_gate(&tenant, &[report(CertRole::Server, CertPhase::Submitted, true)]);
        assert!(gate.apply_pools);
        assert!(gate.pending);
    }

    #[test]
    fn test_all_persisted_applies_pools() {
        let tenant = with_kms(with_auto_tls(create_test_tenant()));
        let reports: Vec<_> = [CertRole::Server, CertRole::Client, CertRole::Kms]
            .into_iter()
            .map(|role| report(role, CertPhase::SecretPersisted, true))
            .collect();

        let gate = certificate_gate(&tenant, &reports);
        assert!(gate.apply_pools);
        assert!(!gate.pending);
        assert!(gate.blocked.is_none());
    }

    #[test]
    fn test_validation_errors_are_not_retried() {
        let err: Error = InvalidSpecSnafu {
            field: "pools",
            message: "empty",
        }
        .build()
        .into();
        assert!(err.is_validation());

        let blocked = Error::CertificateBlocked {
            role: CertRole::Server,
            phase: CertPhase::Denied,
            message: "denied".to_string(),
        };
        assert!(!blocked.is_validation());
        assert_eq!(blocked.to_string(), "server certificate is Denied: denied");
    }

    #[test]
    fn test_attempt_key() {
        assert_eq!(attempt_key(&create_test_tenant()), "tenant-ns/minio");
    }

    async fn attempt(ctx: &Arc<Context>, tenant: &Tenant) -> Result<Action, Error> {
        reconcile_tenant(Arc::new(tenant.clone()), ctx.clone()).await
    }

    fn stored(server: &ApiServer) -> Tenant {
        server.object(&path::<Tenant>(Some(NS), "minio")).unwrap()
    }

    fn statefulset(server: &ApiServer, name: &str) -> StatefulSet {
        server.object(&path::<StatefulSet>(Some(NS), name)).unwrap()
    }

    #[tokio::test]
    async fn test_gone_tenant_awaits_change() {
        let (server, client) = ApiServer::start();
        let ctx = Arc::new(Context::new(client, crate::config::OperatorConfig::default()));

        let action = attempt(&ctx, &create_test_tenant()).await.unwrap();
        assert_eq!(action, Action::await_change());
        assert!(server.writes().is_empty());
    }

    #[tokio::test]
    async fn test_attempt_writes_in_dependency_order() {
        let tenant = with_auto_tls(create_test_tenant());
        let (server, ctx) = serve_tenant(&tenant);
        let ctx = Arc::new(ctx);

        let action = attempt(&ctx, &tenant).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.config.pending_interval()));

        let mut order = server.written_resources();
        order.dedup();
        assert_eq!(
            order,
            vec![
                "secrets",
                "services",
                "secrets",
                "certificatesigningrequests",
                "deployments",
                "tenants/status",
            ]
        );
        assert!(server.names::<StatefulSet>(Some(NS)).is_empty());
        assert_eq!(
            stored(&server).status.unwrap().current_state,
            State::WaitingForCertificates
        );
    }

    #[tokio::test]
    async fn test_new_tenant_converges_after_approval() {
        let tenant = with_auto_tls(create_test_tenant());
        let (server, ctx) = serve_tenant(&tenant);
        let ctx = Arc::new(ctx);

        attempt(&ctx, &tenant).await.unwrap();
        let status = stored(&server).status.unwrap();
        assert_eq!(status.certificates.len(), 1);
        assert_eq!(status.certificates[0].phase, CertPhase::KeyGenerated);

        approve(&server, &tenant, CertRole::Server);
        attempt(&ctx, &tenant).await.unwrap();

        assert_eq!(
            server.names::<Secret>(Some(NS)),
            vec!["minio-console-secret", "minio-creds-secret", "minio-tls"]
        );
        assert!(server.names::<CertificateSigningRequest>(None).is_empty());
        assert_eq!(server.names::<StatefulSet>(Some(NS)), vec!["minio-pool-0"]);

        let sts = statefulset(&server, "minio-pool-0");
        let spec = sts.spec.unwrap();
        assert_eq!(spec.replicas, Some(4));
        let mounts = spec.template.spec.unwrap().containers[0]
            .volume_mounts
            .clone()
            .unwrap();
        assert_eq!(mounts.iter().filter(|m| m.name.starts_with("data")).count(), 8);

        let status = stored(&server).status.unwrap();
        assert_eq!(status.certificates[0].phase, CertPhase::SecretPersisted);
        assert_eq!(status.current_state, State::Updating);
    }

    #[tokio::test]
    async fn test_second_attempt_patches_nothing() {
        let tenant = create_test_tenant();
        let (server, ctx) = serve_tenant(&tenant);
        let ctx = Arc::new(ctx);
        attempt(&ctx, &tenant).await.unwrap();
        assert_eq!(server.names::<StatefulSet>(Some(NS)), vec!["minio-pool-0"]);

        server.clear_calls();
        let action = attempt(&ctx, &tenant).await.unwrap();
        assert_eq!(action, Action::requeue(ctx.config.resync_interval()));
        // only the status moves on, from Updating to Provisioning
        assert_eq!(server.written_resources(), vec!["tenants/status"]);

        server.clear_calls();
        attempt(&ctx, &tenant).await.unwrap();
        assert!(server.writes().is_empty());
    }

    #[tokio::test]
    async fn test_added_pool_creates_only_its_statefulset() {
        let mut tenant = create_test_tenant();
        let (server, ctx) = serve_tenant(&tenant);
        let ctx = Arc::new(ctx);
        attempt(&ctx, &tenant).await.unwrap();
        let first = statefulset(&server, "minio-pool-0");

        tenant
            .add_pool(Pool::from_totals("pool-1", 4, 16, "8Ti").unwrap())
            .unwrap();
        let pools = serde_json::to_value(&tenant.spec.pools).unwrap();
        server.update(&path::<Tenant>(Some(NS), "minio"), |t| t["spec"]["pools"] = pools);

        server.clear_calls();
        attempt(&ctx, &tenant).await.unwrap();

        let sts_writes: Vec<_> = server
            .writes()
            .into_iter()
            .filter(|(_, p)| p.contains("/statefulsets"))
            .collect();
        assert_eq!(
            sts_writes,
            vec![(Method::POST, StatefulSet::url_path(&(), Some(NS)))]
        );
        assert_eq!(
            server.names::<StatefulSet>(Some(NS)),
            vec!["minio-pool-0", "minio-pool-1"]
        );
        assert_eq!(statefulset(&server, "minio-pool-0"), first);
        assert!(server.names::<Deployment>(Some(NS)).contains(&"minio-console".to_string()));
    }

    #[tokio::test]
    async fn test_reconcile_denied_certificate_blocks_without_statefulset() {
        let tenant = with_auto_tls(create_test_tenant());
        let (server, ctx) = serve_tenant(&tenant);
        let ctx = Arc::new(ctx);
        attempt(&ctx, &tenant).await.unwrap();
        deny(&server, &tenant, CertRole::Server);

        let err = attempt(&ctx, &tenant).await.unwrap_err();
        assert!(matches!(
            err,
            Error::CertificateBlocked {
                role: CertRole::Server,
                phase: CertPhase::Denied,
                ..
            }
        ));
        assert!(!err.is_validation());
        assert!(server.names::<StatefulSet>(Some(NS)).is_empty());

        let status = stored(&server).status.unwrap();
        assert_eq!(status.current_state, State::CertificateBlocked);
        assert_eq!(
            status
                .condition(crate::types::v1::status::CONDITION_CERTIFICATE_BLOCKED)
                .unwrap()
                .status,
            "True"
        );
    }

    #[tokio::test]
    async fn test_invalid_spec_is_reported_and_nothing_created() {
        let mut tenant = create_test_tenant();
        tenant.spec.pools.clear();
        let (server, ctx) = serve_tenant(&tenant);
        let ctx = Arc::new(ctx);

        let err = attempt(&ctx, &tenant).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(server.written_resources(), vec!["tenants/status"]);
        assert_eq!(stored(&server).status.unwrap().current_state, State::InvalidSpec);
    }
}
