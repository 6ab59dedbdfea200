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
use crate::reconcile::{Error, attempt_key};
use crate::types::v1::tenant::Tenant;
use kube::runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, warn};

/// Validation errors wait for the next spec change. Everything else is
/// retried with a per-tenant exponential backoff.
pub fn error_policy(tenant: Arc<Tenant>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_validation() {
        warn!("tenant {} waits for a spec change: {}", attempt_key(&tenant), error);
        return Action::await_change();
    }

    let key = attempt_key(&tenant);
    let attempt = ctx.next_attempt(&key);
    let delay = ctx.config.backoff(attempt);
    error!("reconcile of tenant {} failed (attempt {}), retry in {:?}: {}", key, attempt + 1, delay, error);
    Action::requeue(delay)
}
