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

use super::drift::{self, Comparison, Drift};
use super::{Error, notify};
use crate::context::{Context, PatchStrategy};
use crate::types;
use crate::types::v1::tenant::Tenant;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info};

/// What the apply layer does with one desired workload.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    Create,
    Patch(Drift),
    Unchanged,
}

impl Operation {
    pub fn is_change(&self) -> bool {
        !matches!(self, Operation::Unchanged)
    }
}

pub fn plan<K: Serialize>(desired: &K, live: Option<&K>) -> Result<Operation, types::error::Error> {
    Ok(match drift::compare(desired, live)? {
        Comparison::Missing => Operation::Create,
        Comparison::Converged => Operation::Unchanged,
        Comparison::Drifted(drift) => Operation::Patch(drift),
    })
}

/// Creates or patches `desired` so the live object converges to it.
pub async fn apply<K>(ctx: &Context, tenant: &Tenant, desired: &K) -> Result<Operation, Error>
where
    K: Clone + Serialize + DeserializeOwned + Debug + Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    let ns = tenant.namespace()?;
    let name = desired.name_any();
    let kind = K::kind(&Default::default()).to_string();
    let live: Option<K> = ctx.get_opt(&name, &ns).await?;

    let operation = plan(desired, live.as_ref())?;
    match &operation {
        Operation::Create => {
            if ctx.ensure_exists(desired).await? {
                notify(ctx, tenant, EventType::Normal, "Created", &format!("created {kind} {name}")).await;
            }
        }
        Operation::Patch(drift) => {
            info!("{} {}/{} drifted ({}), patching {:?}", kind, ns, name, drift.reason, drift.fields);
            ctx.ensure_patched::<K>(&name, &ns, &drift.patch, PatchStrategy::Strategic)
                .await?;
            notify(
                ctx,
                tenant,
                EventType::Normal,
                "Updated",
                &format!("updated {kind} {name}: {}", drift.reason),
            )
            .await;
        }
        Operation::Unchanged => debug!("{} {}/{} is up to date", kind, ns, name),
    }

    Ok(operation)
}
