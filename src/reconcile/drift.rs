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

//! Decides whether a live workload still matches what the tenant asks for.
//!
//! The comparison is directional: every field set in the desired object must
//! be present with the same value in the live one, but fields only the live
//! object carries (API server defaults, status, fields owned by other
//! controllers) are ignored. Lists of named items (containers, env,
//! volume mounts) are matched by `name`, so an item removed from the tenant
//! stays on the live object.

use crate::types;
use crate::utils::quantity;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use strum::Display;

/// Mutable fields the comparator looks at, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum DriftReason {
    #[strum(to_string = "version drift")]
    Image,
    #[strum(to_string = "replica count changed")]
    Replicas,
    #[strum(to_string = "resource requirements changed")]
    Resources,
    #[strum(to_string = "environment changed")]
    Env,
    #[strum(to_string = "volume mounts changed")]
    VolumeMounts,
    #[strum(to_string = "template labels changed")]
    TemplateLabels,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Drift {
    /// First mismatch found.
    pub reason: DriftReason,
    /// Every mismatched field.
    pub fields: Vec<DriftReason>,
    /// Strategic merge patch overwriting only the mismatched fields.
    pub patch: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Comparison {
    /// Nothing live yet: the object must be created, not patched.
    Missing,
    Converged,
    Drifted(Drift),
}

/// Compares a desired StatefulSet or Deployment against its live counterpart.
pub fn compare<K: Serialize>(desired: &K, live: Option<&K>) -> Result<Comparison, types::error::Error> {
    let Some(live) = live else {
        return Ok(Comparison::Missing);
    };

    let desired = serde_json::to_value(desired)?;
    let live = serde_json::to_value(live)?;
    Ok(compare_values(&desired, &live))
}

fn containers(object: &Value) -> &[Value] {
    object
        .pointer("/spec/template/spec/containers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn find_named<'a>(items: &'a [Value], name: &str) -> Option<&'a Value> {
    items
        .iter()
        .find(|item| item.get("name").and_then(Value::as_str) == Some(name))
}

fn compare_values(desired: &Value, live: &Value) -> Comparison {
    let mut fields = Vec::new();
    let mut container_patches: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    let mut spec_patch = Map::new();
    let mut template_patch = Map::new();

    let live_containers = containers(live);
    let checks = [
        (DriftReason::Image, "image", false),
        (DriftReason::Resources, "resources", true),
        (DriftReason::Env, "env", false),
        (DriftReason::VolumeMounts, "volumeMounts", false),
    ];

    for container in containers(desired) {
        let Some(name) = container.get("name").and_then(Value::as_str) else {
            continue;
        };
        let live_container = find_named(live_containers, name).unwrap_or(&Value::Null);

        for (reason, field, quantities) in checks {
            let Some(wanted) = container.get(field) else {
                continue;
            };
            let observed = live_container.get(field).unwrap_or(&Value::Null);
            if !is_subset(wanted, observed, quantities) {
                if !fields.contains(&reason) {
                    fields.push(reason);
                }
                container_patches
                    .entry(name.to_owned())
                    .or_default()
                    .insert(field.to_owned(), wanted.clone());
            }
        }
    }

    if let Some(replicas) = desired.pointer("/spec/replicas")
        && !is_subset(replicas, live.pointer("/spec/replicas").unwrap_or(&Value::Null), false)
    {
        fields.push(DriftReason::Replicas);
        spec_patch.insert("replicas".to_owned(), replicas.clone());
    }

    if let Some(labels) = desired.pointer("/spec/template/metadata/labels")
        && !is_subset(
            labels,
            live.pointer("/spec/template/metadata/labels")
                .unwrap_or(&Value::Null),
            false,
        )
    {
        fields.push(DriftReason::TemplateLabels);
        template_patch.insert("metadata".to_owned(), json!({ "labels": labels }));
    }

    if fields.is_empty() {
        return Comparison::Converged;
    }

    if !container_patches.is_empty() {
        let containers: Vec<Value> = container_patches
            .into_iter()
            .map(|(name, mut patch)| {
                patch.insert("name".to_owned(), Value::String(name));
                Value::Object(patch)
            })
            .collect();
        let mut pod_patch = Map::new();
        pod_patch.insert("containers".to_owned(), Value::Array(containers));
        // new mounts need their volumes, and the init containers that fill them
        if fields.contains(&DriftReason::VolumeMounts) {
            for field in ["volumes", "initContainers"] {
                if let Some(wanted) = desired.pointer(&format!("/spec/template/spec/{field}")) {
                    pod_patch.insert(field.to_owned(), wanted.clone());
                }
            }
        }
        template_patch.insert("spec".to_owned(), Value::Object(pod_patch));
    }
    if !template_patch.is_empty() {
        spec_patch.insert("template".to_owned(), Value::Object(template_patch));
    }

    // evaluation order decides the reported reason
    let order = [
        DriftReason::Image,
        DriftReason::Replicas,
        DriftReason::Resources,
        DriftReason::Env,
        DriftReason::VolumeMounts,
        DriftReason::TemplateLabels,
    ];
    fields.sort_by_key(|f| order.iter().position(|o| o == f));

    Comparison::Drifted(Drift {
        reason: fields[0],
        fields,
        patch: json!({ "spec": spec_patch }),
    })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// True when everything set in `desired` is present in `live`.
fn is_subset(desired: &Value, live: &Value, quantities: bool) -> bool {
    if is_empty(desired) {
        return true;
    }

    match (desired, live) {
        (Value::Object(want), Value::Object(have)) => want.iter().all(|(key, value)| {
            is_subset(value, have.get(key).unwrap_or(&Value::Null), quantities)
        }),
        (Value::Array(want), Value::Array(have)) => {
            let keyed = want
                .iter()
                .all(|item| item.get("name").and_then(Value::as_str).is_some());
            if keyed {
                want.iter().all(|item| {
                    let name = item.get("name").and_then(Value::as_str).unwrap_or_default();
                    find_named(have, name).is_some_and(|found| is_subset(item, found, quantities))
                })
            } else {
                want.len() == have.len()
                    && want
                        .iter()
                        .zip(have)
                        .all(|(w, h)| is_subset(w, h, quantities))
            }
        }
        (Value::String(want), Value::String(have)) if quantities => {
            quantity::semantic_eq(want, have)
        }
        (want, have) => want == have,
    }
}
