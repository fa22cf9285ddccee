//! Provider health tracking for the gateway.
//!
//! A rate-limited provider is put into cooldown and skipped by every task
//! kind until the cooldown elapses. Any other failure leaves the provider
//! eligible for the next call. These types live in core because
//! `ProviderGateway` depends on them.

use std::time::{Duration, Instant};

use serde::Serialize;

use foundry_types::llm::LlmError;

/// Health tracking for a single provider.
#[derive(Debug)]
pub struct ProviderHealth {
    /// Provider name (matches `ProviderConfig.name`).
    pub name: String,
    /// If rate-limited, don't use until this instant.
    pub rate_limit_until: Option<Instant>,
    /// Last error message from this provider.
    pub last_error: Option<String>,
    /// When this provider last succeeded.
    pub last_success: Option<Instant>,
    /// Latency of the last call in milliseconds.
    pub last_latency_ms: Option<u64>,
    pub total_calls: u64,
    pub total_failures: u64,
}

impl ProviderHealth {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rate_limit_until: None,
            last_error: None,
            last_success: None,
            last_latency_ms: None,
            total_calls: 0,
            total_failures: 0,
        }
    }

    /// Check whether this provider is outside its rate-limit cooldown.
    /// Clears an expired cooldown.
    pub fn is_available(&mut self) -> bool {
        if let Some(until) = self.rate_limit_until {
            if Instant::now() < until {
                return false;
            }
            self.rate_limit_until = None;
        }
        true
    }

    /// Seconds left in the current cooldown, if any.
    pub fn cooldown_remaining(&self) -> Option<u64> {
        self.rate_limit_until
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .map(|d| d.as_secs().max(1))
    }

    pub fn record_success(&mut self, latency_ms: u64) {
        self.total_calls += 1;
        self.last_success = Some(Instant::now());
        self.last_latency_ms = Some(latency_ms);
    }

    pub fn record_failure(&mut self, error: &LlmError, latency_ms: u64) {
        self.total_calls += 1;
        self.total_failures += 1;
        self.last_error = Some(error.to_string());
        self.last_latency_ms = Some(latency_ms);
    }

    /// Start a cooldown window of `cooldown` from now.
    pub fn set_rate_limited(&mut self, cooldown: Duration) {
        self.rate_limit_until = Some(Instant::now() + cooldown);
    }

    /// Convert to a [`ProviderStatus`] for CLI display.
    pub fn to_status(&self, model: &str) -> ProviderStatus {
        let last_success_ago = self.last_success.map(|s| {
            let elapsed = s.elapsed();
            if elapsed.as_secs() < 60 {
                format!("{}s ago", elapsed.as_secs())
            } else if elapsed.as_secs() < 3600 {
                format!("{}m ago", elapsed.as_secs() / 60)
            } else {
                format!("{}h ago", elapsed.as_secs() / 3600)
            }
        });

        ProviderStatus {
            name: self.name.clone(),
            model: model.to_string(),
            cooldown_remaining_secs: self.cooldown_remaining(),
            last_error: self.last_error.clone(),
            last_success_ago,
            total_calls: self.total_calls,
            total_failures: self.total_failures,
        }
    }
}

/// Point-in-time view of a provider for the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub model: String,
    pub cooldown_remaining_secs: Option<u64>,
    pub last_error: Option<String>,
    pub last_success_ago: Option<String>,
    pub total_calls: u64,
    pub total_failures: u64,
}
