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

use crate::naming;
use crate::types::v1::pool::Pool;
use crate::types::v1::status::certificate::Certificate;
use crate::types::v1::status::pool::{Pool as PoolStatus, PoolState};
use crate::types::v1::status::state::State;
use crate::types::v1::status::{
    CONDITION_CERTIFICATE_BLOCKED, CONDITION_INVALID_SPEC, CONDITION_READY, Condition, Status,
};
use crate::types::v1::tenant::Tenant;
use k8s_openapi::api::apps::v1::StatefulSet;

/// Where an attempt ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// Pools were created or patched in this attempt.
    Updating,
    /// Nothing to change.
    Applied,
    WaitingForCertificates,
    CertificateBlocked { message: String },
}

pub fn pool_status(tenant: &Tenant, pool: &Pool, live: Option<&StatefulSet>) -> PoolStatus {
    let ready_replicas = live
        .and_then(|sts| sts.status.as_ref())
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);

    let state = match live {
        None => PoolState::NotCreated,
        Some(_) if ready_replicas >= pool.servers => PoolState::Initialized,
        Some(_) => PoolState::Created,
    };

    PoolStatus {
        name: pool.name.clone(),
        stateful_set: naming::statefulset(tenant, pool),
        state,
        ready_replicas,
    }
}

/// Status of a valid tenant after an attempt. `live` lists each pool's
/// StatefulSet in pool order.
pub fn build(
    tenant: &Tenant,
    progress: &Progress,
    certificates: Vec<Certificate>,
    live: &[Option<StatefulSet>],
    now: &str,
) -> Status {
    let mut status = tenant.status.clone().unwrap_or_default();

    status.pools = tenant
        .spec
        .pools
        .iter()
        .enumerate()
        .map(|(i, pool)| pool_status(tenant, pool, live.get(i).and_then(Option::as_ref)))
        .collect();
    status.available_replicas = status.pools.iter().map(|p| p.ready_replicas).sum();
    status.observed_generation = tenant.metadata.generation;
    status.certificates = certificates;

    let initialized = !status.pools.is_empty()
        && status.pools.iter().all(|p| p.state == PoolState::Initialized);

    status.current_state = match progress {
        Progress::CertificateBlocked { .. } => State::CertificateBlocked,
        Progress::WaitingForCertificates => State::WaitingForCertificates,
        Progress::Updating => State::Updating,
        Progress::Applied if initialized => State::Initialized,
        Progress::Applied => State::Provisioning,
    };

    let blocked = match progress {
        Progress::CertificateBlocked { message } => {
            Condition::new(CONDITION_CERTIFICATE_BLOCKED, true, "CertificateBlocked", message.clone())
        }
        _ => Condition::new(CONDITION_CERTIFICATE_BLOCKED, false, "CertificatesIssued", ""),
    };
    status.set_condition(blocked, now);
    status.set_condition(Condition::new(CONDITION_INVALID_SPEC, false, "Valid", ""), now);

    let ready = status.current_state == State::Initialized;
    status.set_condition(
        Condition::new(
            CONDITION_READY,
            ready,
            &format!("{:?}", status.current_state),
            format!("{} of {} pools initialized", initialized_pools(&status), status.pools.len()),
        ),
        now,
    );

    status
}

fn initialized_pools(status: &Status) -> usize {
    status
        .pools
        .iter()
        .filter(|p| p.state == PoolState::Initialized)
        .count()
}

/// Status of a tenant whose spec failed validation. Pools keep their last
/// reported state.
pub fn invalid_spec(tenant: &Tenant, message: &str, now: &str) -> Status {
    let mut status = tenant.status.clone().unwrap_or_default();
    status.current_state = State::InvalidSpec;
    status.observed_generation = tenant.metadata.generation;
    status.set_condition(Condition::new(CONDITION_INVALID_SPEC, true, "ValidationFailed", message), now);
    status.set_condition(Condition::new(CONDITION_READY, false, "InvalidSpec", message), now);
    status
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::create_test_tenant;
    use k8s_openapi::api::apps::v1::StatefulSetStatus;

    fn ready(tenant: &Tenant, replicas: i32) -> StatefulSet {
        let mut sts = tenant.new_statefulset(&tenant.spec.pools[0]);
        sts.status = Some(StatefulSetStatus {
            replicas,
            ready_replicas: Some(replicas),
            ..Default::default()
        });
        sts
    }

    #[test]
    fn test_all_pools_ready_is_initialized() {
        let tenant = create_test_tenant();
        let live = vec![Some(ready(&tenant, 4))];
        let status = build(&tenant, &Progress::Applied, vec![], &live, "t1");

        assert_eq!(status.current_state, State::Initialized);
        assert_eq!(status.available_replicas, 4);
        assert_eq!(status.observed_generation, Some(1));
        assert_eq!(status.pools[0].state, PoolState::Initialized);
        assert_eq!(status.pools[0].stateful_set, "minio-pool-0");
        assert_eq!(status.condition(CONDITION_READY).unwrap().status, "True");
    }

    #[test]
    fn test_partially_ready_pool_is_provisioning() {
        let tenant = create_test_tenant();
        let live = vec![Some(ready(&tenant, 2))];
        let status = build(&tenant, &Progress::Applied, vec![], &live, "t1");

        assert_eq!(status.current_state, State::Provisioning);
        assert_eq!(status.pools[0].state, PoolState::Created);
        assert_eq!(status.condition(CONDITION_READY).unwrap().status, "False");
    }

    #[test]
    fn test_blocked_certificate_sets_condition() {
        let tenant = create_test_tenant();
        let progress = Progress::CertificateBlocked {
            message: "server certificate Denied".to_string(),
        };
        let status = build(&tenant, &progress, vec![], &[None], "t1");

        assert_eq!(status.current_state, State::CertificateBlocked);
        assert_eq!(status.pools[0].state, PoolState::NotCreated);
        let cond = status.condition(CONDITION_CERTIFICATE_BLOCKED).unwrap();
        assert_eq!(cond.status, "True");
        assert_eq!(cond.message, "server certificate Denied");
    }

    #[test]
    fn test_unchanged_attempt_yields_equal_status() {
        let mut tenant = create_test_tenant();
        let live = vec![Some(ready(&tenant, 4))];
        let first = build(&tenant, &Progress::Applied, vec![], &live, "t1");

        tenant.status = Some(first.clone());
        let second = build(&tenant, &Progress::Applied, vec![], &live, "t2");
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_spec_keeps_pools() {
        let mut tenant = create_test_tenant();
        let live = vec![Some(ready(&tenant, 4))];
        tenant.status = Some(build(&tenant, &Progress::Applied, vec![], &live, "t1"));

        let status = invalid_spec(&tenant, "pools[0].servers: must be positive", "t2");
        assert_eq!(status.current_state, State::InvalidSpec);
        assert_eq!(status.pools.len(), 1);
        assert_eq!(status.condition(CONDITION_INVALID_SPEC).unwrap().status, "True");
    }
}
