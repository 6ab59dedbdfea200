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

use crate::types::error::{Error, InvalidSpecSnafu};
use crate::utils::quantity;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::KubeSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Volume size used when a pool declares neither a per-volume nor a total capacity.
pub const DEFAULT_VOLUME_CAPACITY: &str = "10Gi";

/// A named group of MinIO servers with identical storage layout.
///
/// The name is the identity of the pool: it is part of the StatefulSet name
/// and of the pod selector, so it must never change once the pool exists.
#[derive(Deserialize, Serialize, Clone, Debug, KubeSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub name: String,

    #[x_kube(validation = Rule::new("self > 0").message("servers must be positive"))]
    pub servers: i32,

    #[x_kube(validation = Rule::new("self > 0").message("volumesPerServer must be positive"))]
    pub volumes_per_server: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_per_volume: Option<Quantity>,

    /// Declared total volumes, checked against `servers * volumesPerServer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<i32>,

    /// Declared total raw capacity, divided exactly across all volumes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<corev1::ResourceRequirements>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<corev1::Affinity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<corev1::Toleration>>,
}

/// Servers each get `volumes / servers` drives; the split must be exact.
pub fn volumes_per_server(volumes: i32, servers: i32) -> Result<i32, Error> {
    if servers <= 0 || volumes <= 0 {
        return InvalidSpecSnafu {
            field: "volumes",
            message: format!("servers ({servers}) and volumes ({volumes}) must be positive"),
        }
        .fail();
    }
    if volumes % servers != 0 {
        return InvalidSpecSnafu {
            field: "volumes",
            message: format!("{volumes} volumes cannot be spread evenly over {servers} servers"),
        }
        .fail();
    }
    Ok(volumes / servers)
}

pub fn capacity_per_volume(capacity: &str, volumes: i32) -> Result<String, Error> {
    quantity::divide_exact(capacity, volumes)
}

impl Pool {
    /// Builds a pool from totals the way an administrator states them:
    /// "4 servers, 32 volumes, 16Ti".
    pub fn from_totals(name: &str, servers: i32, volumes: i32, capacity: &str) -> Result<Pool, Error> {
        let per_server = volumes_per_server(volumes, servers)?;
        let per_volume = capacity_per_volume(capacity, volumes)?;

        Ok(Pool {
            name: name.to_owned(),
            servers,
            volumes_per_server: per_server,
            capacity_per_volume: Some(Quantity(per_volume)),
            volumes: Some(volumes),
            capacity: Some(Quantity(capacity.to_owned())),
            ..Default::default()
        })
    }

    pub fn total_volumes(&self) -> i32 {
        self.servers.saturating_mul(self.volumes_per_server)
    }

    /// Size requested by each PersistentVolumeClaim of this pool.
    pub fn volume_capacity(&self) -> Result<String, Error> {
        if let Some(per_volume) = &self.capacity_per_volume {
            quantity::parse_bytes(&per_volume.0)?;
            return Ok(per_volume.0.clone());
        }
        if let Some(total) = &self.capacity {
            return capacity_per_volume(&total.0, self.total_volumes());
        }
        Ok(DEFAULT_VOLUME_CAPACITY.to_owned())
    }

    pub fn validate(&self) -> Result<(), Error> {
        let field = |name: &str| format!("pools[{}].{}", self.name, name);

        if !is_dns_label(&self.name) {
            return InvalidSpecSnafu {
                field: field("name"),
                message: "must be a lowercase RFC 1123 label",
            }
            .fail();
        }
        if self.servers <= 0 {
            return InvalidSpecSnafu {
                field: field("servers"),
                message: "must be greater than zero",
            }
            .fail();
        }
        if self.volumes_per_server <= 0 {
            return InvalidSpecSnafu {
                field: field("volumesPerServer"),
                message: "must be greater than zero",
            }
            .fail();
        }

        let total = self.total_volumes();
        if let Some(volumes) = self.volumes
            && volumes != total
        {
            return InvalidSpecSnafu {
                field: field("volumes"),
                message: format!(
                    "{} servers x {} volumes per server is {}, not {}",
                    self.servers, self.volumes_per_server, total, volumes
                ),
            }
            .fail();
        }

        if let Some(per_volume) = &self.capacity_per_volume {
            quantity::parse_bytes(&per_volume.0)?;
        }

        if let Some(capacity) = &self.capacity {
            let derived = capacity_per_volume(&capacity.0, total)?;
            if let Some(per_volume) = &self.capacity_per_volume
                && !quantity::semantic_eq(&derived, &per_volume.0)
            {
                return InvalidSpecSnafu {
                    field: field("capacityPerVolume"),
                    message: format!(
                        "{} across {} volumes is {}, not {}",
                        capacity.0, total, derived, per_volume.0
                    ),
                }
                .fail();
            }
        }

        Ok(())
    }
}

fn is_dns_label(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

/// Pool names must be unique within a tenant.
pub fn validate_pools(pools: &[Pool]) -> Result<(), Error> {
    if pools.is_empty() {
        return InvalidSpecSnafu {
            field: "pools",
            message: "at least one pool is required",
        }
        .fail();
    }

    let mut seen = HashSet::new();
    for pool in pools {
        pool.validate()?;
        if !seen.insert(pool.name.as_str()) {
            return InvalidSpecSnafu {
                field: format!("pools[{}].name", pool.name),
                message: "duplicate pool name",
            }
            .fail();
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_totals_sizing_is_exact() {
        let pool = Pool::from_totals("pool-0", 4, 32, "16Ti").expect("valid totals");

        assert_eq!(pool.volumes_per_server, 8);
        assert_eq!(pool.total_volumes(), 32);
        assert_eq!(pool.volume_capacity().unwrap(), "512Gi");
        assert!(pool.validate().is_ok());

        let per_volume = quantity::parse_bytes(&pool.volume_capacity().unwrap()).unwrap();
        assert_eq!(
            per_volume * pool.total_volumes() as u64,
            quantity::parse_bytes("16Ti").unwrap()
        );
    }

    #[test]
    fn test_from_totals_rejects_uneven_splits() {
        assert!(Pool::from_totals("pool-0", 3, 32, "16Ti").is_err());
        assert!(Pool::from_totals("pool-0", 4, 0, "16Ti").is_err());
        assert!(Pool::from_totals("pool-0", 4, 12, "1000").is_err());
    }

    #[test]
    fn test_validate_declared_volumes_mismatch() {
        let mut pool = Pool::from_totals("pool-0", 4, 32, "16Ti").unwrap();
        pool.volumes_per_server = 4;

        let err = pool.validate().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("volumes"), "{err}");
    }

    #[test]
    fn test_validate_capacity_per_volume_conflict() {
        let mut pool = Pool::from_totals("pool-0", 4, 32, "16Ti").unwrap();
        pool.capacity_per_volume = Some(Quantity("1Ti".to_string()));
        assert!(pool.validate().is_err());

        pool.capacity_per_volume = Some(Quantity("524288Mi".to_string()));
        assert!(pool.validate().is_ok(), "512Gi spelled in Mi is the same size");
    }

    #[test]
    fn test_volume_capacity_defaults() {
        let pool = Pool {
            name: "pool-0".to_string(),
            servers: 1,
            volumes_per_server: 1,
            ..Default::default()
        };
        assert_eq!(pool.volume_capacity().unwrap(), DEFAULT_VOLUME_CAPACITY);
    }

    #[test]
    fn test_validate_pools() {
        let pool = Pool::from_totals("pool-0", 4, 32, "16Ti").unwrap();
        assert!(validate_pools(&[]).is_err());
        assert!(validate_pools(std::slice::from_ref(&pool)).is_ok());
        assert!(validate_pools(&[pool.clone(), pool.clone()]).is_err());

        let mut bad = pool;
        bad.name = "Pool_0".to_string();
        assert!(validate_pools(&[bad]).is_err());
    }
}
