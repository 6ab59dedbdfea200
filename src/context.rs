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
use crate::types;
use crate::types::v1::status::Status;
use crate::types::v1::tenant::Tenant;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::certificates::v1::CertificateSigningRequest;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, ResourceExt, api::Api};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::Snafu;
use snafu::futures::TryFutureExt;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use tracing::{debug, info};

const MIN_ACCESS_KEY_LEN: usize = 3;
const MIN_SECRET_KEY_LEN: usize = 8;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(display("refusing to create {} '{}' without an owner reference", kind, name))]
    MissingOwnerReference { kind: String, name: String },

    #[snafu(display("credential secret '{}' not found", name))]
    CredentialSecretNotFound { name: String },

    #[snafu(display("credential secret '{}' missing required key '{}'", secret_name, key))]
    CredentialSecretMissingKey { secret_name: String, key: String },

    #[snafu(display(
        "credential secret '{}' key '{}' must be at least {} characters (got {} characters)",
        secret_name,
        key,
        min,
        length
    ))]
    CredentialSecretTooShort {
        secret_name: String,
        key: String,
        min: usize,
        length: usize,
    },
}

/// How a patch body is merged into the live object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchStrategy {
    /// Lists merge by their merge key (`name` for containers and env).
    Strategic,
    Merge,
}

/// Every namespaced object the operator creates must point at its tenant.
pub fn check_owned<T>(resource: &T) -> Result<(), Error>
where
    T: Resource,
    <T as Resource>::DynamicType: Default,
{
    let owned = resource
        .meta()
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.controller == Some(true) && !r.uid.is_empty()));

    if owned {
        Ok(())
    } else {
        MissingOwnerReferenceSnafu {
            kind: T::kind(&Default::default()).to_string(),
            name: resource.name_any(),
        }
        .fail()
    }
}

fn is_status(error: &kube::Error, code: u16) -> bool {
    matches!(error, kube::Error::Api(ae) if ae.code == code)
}

pub struct Context {
    pub(crate) client: kube::Client,
    pub(crate) recorder: Recorder,
    pub(crate) config: OperatorConfig,
    attempts: Mutex<HashMap<String, u32>>,
}

impl Context {
    pub fn new(client: kube::Client, config: OperatorConfig) -> Self {
        let reporter = Reporter {
            controller: "minio-operator".into(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self {
            client,
            recorder,
            config,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// send event
    #[inline]
    pub async fn record(
        &self,
        resource: &Tenant,
        event_type: EventType,
        reason: &str,
        message: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(message.into()),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                &resource.object_ref(&()),
            )
            .context(RecordSnafu)
            .await
    }

    /// Counts a failed attempt of `key` and returns how many came before it.
    pub fn next_attempt(&self, key: &str) -> u32 {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let counter = attempts.entry(key.to_owned()).or_insert(0);
        let previous = *counter;
        *counter = counter.saturating_add(1);
        previous
    }

    pub fn reset_attempts(&self, key: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
    }

    /// Writes the status sub-resource with a merge patch. The spec is never touched.
    pub async fn patch_status(&self, resource: &Tenant, status: &Status) -> Result<Tenant, Error> {
        let api: Api<Tenant> = Api::namespaced(self.client.clone(), &resource.namespace()?);
        let body = serde_json::json!({ "status": status });

        api.patch_status(&resource.name(), &PatchParams::default(), &Patch::Merge(&body))
            .context(KubeSnafu)
            .await
    }

    pub async fn get_opt<T>(&self, name: &str, namespace: &str) -> Result<Option<T>, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
        <T as kube::Resource>::DynamicType: Default,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name).context(KubeSnafu).await
    }

    /// Creates `desired` unless it exists. Returns whether it was created.
    ///
    /// Losing a create race to another attempt is not an error.
    pub async fn ensure_exists<T>(&self, desired: &T) -> Result<bool, Error>
    where
        T: Clone + Serialize + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
        <T as kube::Resource>::DynamicType: Default,
    {
        check_owned(desired)?;
        let namespace = desired
            .meta()
            .namespace
            .clone()
            .ok_or(types::error::Error::NoNamespace)?;

        let api: Api<T> = Api::namespaced(self.client.clone(), &namespace);
        match api.create(&PostParams::default(), desired).await {
            Ok(_) => {
                info!(
                    "created {} {}/{}",
                    T::kind(&Default::default()),
                    namespace,
                    desired.name_any()
                );
                Ok(true)
            }
            Err(e) if is_status(&e, 409) => {
                debug!("{} {} already exists", T::kind(&Default::default()), desired.name_any());
                Ok(false)
            }
            Err(source) => Err(Error::Kube { source }),
        }
    }

    /// Patches only the fields present in `patch`.
    pub async fn ensure_patched<T>(
        &self,
        name: &str,
        namespace: &str,
        patch: &serde_json::Value,
        strategy: PatchStrategy,
    ) -> Result<T, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
        <T as kube::Resource>::DynamicType: Default,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        let patch = match strategy {
            PatchStrategy::Strategic => Patch::Strategic(patch),
            PatchStrategy::Merge => Patch::Merge(patch),
        };
        api.patch(name, &PatchParams::default(), &patch)
            .context(KubeSnafu)
            .await
    }

    /// Deletes the object if present. Returns whether anything was deleted.
    pub async fn delete_opt<T>(&self, name: &str, namespace: &str) -> Result<bool, Error>
    where
        T: Clone + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
        <T as kube::Resource>::DynamicType: Default,
    {
        let api: Api<T> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(source) => Err(Error::Kube { source }),
        }
    }

    pub async fn get_csr(&self, name: &str) -> Result<Option<CertificateSigningRequest>, Error> {
        let api: Api<CertificateSigningRequest> = Api::all(self.client.clone());
        api.get_opt(name).context(KubeSnafu).await
    }

    /// CSRs are cluster scoped and carry labels instead of an owner reference.
    pub async fn create_csr(&self, csr: &CertificateSigningRequest) -> Result<bool, Error> {
        let api: Api<CertificateSigningRequest> = Api::all(self.client.clone());
        match api.create(&PostParams::default(), csr).await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 409) => Ok(false),
            Err(source) => Err(Error::Kube { source }),
        }
    }

    pub async fn delete_csr(&self, name: &str) -> Result<bool, Error> {
        let api: Api<CertificateSigningRequest> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(source) => Err(Error::Kube { source }),
        }
    }

    /// Validates that an explicitly referenced credential Secret exists and
    /// holds keys MinIO accepts.
    ///
    /// Values are never read into the pods from here: the StatefulSet
    /// references the Secret through `secretKeyRef`.
    pub async fn validate_credential_secret(&self, tenant: &Tenant) -> Result<(), Error> {
        let Some(cfg) = tenant.spec.creds_secret.as_ref().filter(|c| !c.name.is_empty()) else {
            return Ok(());
        };

        let secret: Secret = self
            .get_opt(&cfg.name, &tenant.namespace()?)
            .await?
            .ok_or_else(|| Error::CredentialSecretNotFound {
                name: cfg.name.clone(),
            })?;

        check_credential_secret(&cfg.name, &secret)
    }
}

pub(crate) fn check_credential_secret(name: &str, secret: &Secret) -> Result<(), Error> {
    for (key, min) in [("accesskey", MIN_ACCESS_KEY_LEN), ("secretkey", MIN_SECRET_KEY_LEN)] {
        let Some(value) = types::v1::tenant::secret_value(secret, key) else {
            return CredentialSecretMissingKeySnafu {
                secret_name: name,
                key,
            }
            .fail();
        };

        if value.len() < min {
            return CredentialSecretTooShortSnafu {
                secret_name: name,
                key,
                min,
                length: value.len(),
            }
            .fail();
        }
    }
    Ok(())
}
