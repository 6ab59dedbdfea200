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

use clap::Args;
use std::time::Duration;

pub const DEFAULT_SERVER_SIGNER: &str = "kubernetes.io/kubelet-serving";
pub const DEFAULT_CLIENT_SIGNER: &str = "kubernetes.io/kube-apiserver-client";

/// Controller settings, from flags or the environment.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Tenants reconciled in parallel, 0 for unbounded.
    #[arg(long, env = "MINIO_OPERATOR_CONCURRENCY", default_value_t = 0)]
    pub concurrency: u16,

    /// Requeue interval of a converged tenant.
    #[arg(long, env = "MINIO_OPERATOR_RESYNC_SECS", default_value_t = 300)]
    pub resync_secs: u64,

    /// Requeue interval while certificates await approval.
    #[arg(long, env = "MINIO_OPERATOR_PENDING_REQUEUE_SECS", default_value_t = 10)]
    pub pending_requeue_secs: u64,

    /// A CSR not approved within this window is reported as timed out.
    #[arg(long, env = "MINIO_OPERATOR_CSR_TIMEOUT_SECS", default_value_t = 1800)]
    pub csr_timeout_secs: u64,

    #[arg(long, env = "MINIO_OPERATOR_BACKOFF_BASE_SECS", default_value_t = 5)]
    pub backoff_base_secs: u64,

    #[arg(long, env = "MINIO_OPERATOR_BACKOFF_MAX_SECS", default_value_t = 300)]
    pub backoff_max_secs: u64,

    /// Signer of the server and KMS certificates.
    #[arg(long, env = "MINIO_OPERATOR_SERVER_SIGNER", default_value = DEFAULT_SERVER_SIGNER)]
    pub server_signer: String,

    /// Signer of the client certificate MinIO presents to the KMS.
    #[arg(long, env = "MINIO_OPERATOR_CLIENT_SIGNER", default_value = DEFAULT_CLIENT_SIGNER)]
    pub client_signer: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            resync_secs: 300,
            pending_requeue_secs: 10,
            csr_timeout_secs: 1800,
            backoff_base_secs: 5,
            backoff_max_secs: 300,
            server_signer: DEFAULT_SERVER_SIGNER.to_owned(),
            client_signer: DEFAULT_CLIENT_SIGNER.to_owned(),
        }
    }
}

impl OperatorConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    pub fn pending_interval(&self) -> Duration {
        Duration::from_secs(self.pending_requeue_secs)
    }

    pub fn csr_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.csr_timeout_secs).unwrap_or(i64::MAX))
    }

    /// `base * 2^attempt`, capped at the maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .backoff_base_secs
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_secs(delay.min(self.backoff_max_secs))
    }
}
