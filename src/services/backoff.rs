// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use std::time::Duration;

/// Delay between local fetch attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// `attempt_index * step`, with the first attempt at index 1
    Linear(Duration),
    Disabled,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Linear(Duration::from_secs(1))
    }
}

impl BackoffPolicy {
    pub fn delay(&self, attempt_index: u32) -> Duration {
        match self {
            BackoffPolicy::Linear(step) => step.saturating_mul(attempt_index),
            BackoffPolicy::Disabled => Duration::ZERO,
        }
    }

    pub async fn wait(&self, attempt_index: u32) {
        let delay = self.delay(attempt_index);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
