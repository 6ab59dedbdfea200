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

use crate::config::OperatorConfig;
use crate::context::Context;
use crate::error_policy::error_policy;
use crate::reconcile::reconcile_tenant;
use crate::types::v1::tenant::Tenant;
use futures::StreamExt;
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::certificates::v1::CertificateSigningRequest;
use k8s_openapi::api::core::v1 as corev1;
use kube::CustomResourceExt;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{Controller, controller, watcher};
use kube::{Api, Client};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
mod context;
mod error_policy;
pub mod naming;
pub mod reconcile;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

/// Maps a CSR back onto the tenant that submitted it.
fn csr_tenant(csr: CertificateSigningRequest) -> Option<ObjectRef<Tenant>> {
    let labels = csr.metadata.labels.as_ref()?;
    let name = labels.get(naming::LABEL_TENANT)?;
    let namespace = labels.get(naming::LABEL_NAMESPACE)?;
    Some(ObjectRef::new(name).within(namespace))
}

pub async fn run(config: OperatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    info!("starting minio-operator with {:?}", config);

    let client = Client::try_default().await?;
    let tenant_client = Api::<Tenant>::all(client.clone());
    let controller_config = controller::Config::default().concurrency(config.concurrency);

    let context = Context::new(client.clone(), config);
    Controller::new(tenant_client, watcher::Config::default())
        .with_config(controller_config)
        .owns(
            Api::<appsv1::StatefulSet>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<appsv1::Deployment>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<corev1::Service>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<corev1::Secret>::all(client.clone()),
            watcher::Config::default(),
        )
        .watches(
            Api::<CertificateSigningRequest>::all(client.clone()),
            watcher::Config::default().labels(naming::LABEL_TENANT),
            csr_tenant,
        )
        .shutdown_on_signal()
        .run(reconcile_tenant, error_policy, Arc::new(context))
        .for_each(|res| async move {
            match res {
                Ok((tenant, _)) => info!("reconciled tenant {}", tenant),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    Ok(())
}

pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    writer
        .write_all(serde_yaml_ng::to_string(&Tenant::crd())?.as_bytes())
        .await?;
    writer.flush().await?;

    Ok(())
}
