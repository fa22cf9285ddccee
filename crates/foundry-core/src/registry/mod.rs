//! Capability registry: the source of truth for what a worker may call.
//!
//! Merges the fixed built-in catalog with active synthesized records from
//! the store. Built-in names always win. One registry is constructed per
//! process and passed by reference to the planner, synthesizer, pipeline
//! and worker runtime.
//!
//! Storage is best-effort here: a failed read degrades the registry to
//! built-ins plus whatever this process registered, for the rest of the
//! process lifetime, and `snapshot` never fails.

pub mod builtin;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use foundry_types::capability::{
    Capability, CapabilityOrigin, CapabilityStatus, TestVerdict, ValidationReport,
};
use foundry_types::error::RegistryError;

use crate::repository::capability::CapabilityRepository;

pub use builtin::{builtin_capabilities, is_builtin};

pub struct CapabilityRegistry<R: CapabilityRepository> {
    repo: R,
    builtins: Vec<Capability>,
    /// Capabilities registered by this process, one entry per name.
    registered: Mutex<Vec<Capability>>,
    degraded: AtomicBool,
}

impl<R: CapabilityRepository> CapabilityRegistry<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            builtins: builtin_capabilities(),
            registered: Mutex::new(Vec::new()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether a store failure has reduced this registry to in-process knowledge.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Every active capability: built-ins first, then synthesized ones by name.
    pub async fn snapshot(&self) -> Vec<Capability> {
        let mut merged = self.builtins.clone();

        let stored = if self.is_degraded() {
            Vec::new()
        } else {
            match self.repo.list_active().await {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %e, "Capability store unavailable, using built-ins only");
                    self.degraded.store(true, Ordering::Relaxed);
                    Vec::new()
                }
            }
        };

        let local = self.registered_view();
        let mut synthesized: Vec<Capability> = Vec::new();
        for cap in stored.into_iter().chain(local) {
            if !cap.is_active() || cap.origin != CapabilityOrigin::Synthesized {
                continue;
            }
            if is_builtin(&cap.name) {
                tracing::warn!(name = %cap.name, "Ignoring stored capability that shadows a built-in");
                continue;
            }
            if synthesized.iter().any(|c| c.name == cap.name) {
                continue;
            }
            synthesized.push(cap);
        }
        synthesized.sort_by(|a, b| a.name.cmp(&b.name));

        merged.extend(synthesized);
        merged
    }

    /// `name: description` lines for every active capability.
    pub async fn listing(&self) -> String {
        listing_of(&self.snapshot().await)
    }

    /// Find a capability by name in any status. Built-ins are consulted first.
    pub async fn lookup(&self, name: &str) -> Option<Capability> {
        if let Some(cap) = self.builtins.iter().find(|c| c.name == name) {
            return Some(cap.clone());
        }
        if let Some(cap) = self.registered_view().into_iter().find(|c| c.name == name) {
            return Some(cap);
        }
        if self.is_degraded() {
            return None;
        }
        match self.repo.get(name).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, %name, "Capability lookup failed");
                None
            }
        }
    }

    /// Persist a freshly synthesized candidate as inactive and untested.
    pub async fn record_candidate(&self, candidate: &Capability) -> Result<(), RegistryError> {
        if is_builtin(&candidate.name) {
            return Err(RegistryError::ReservedName(candidate.name.clone()));
        }
        let mut record = candidate.clone();
        record.status = CapabilityStatus::Inactive;
        record.test_verdict = TestVerdict::Untested;
        if let Err(e) = self.repo.upsert(&record).await {
            tracing::warn!(error = %e, name = %record.name, "Failed to persist capability candidate");
        }
        Ok(())
    }

    /// Record a failed smoke test. The capability stays (or becomes) inactive.
    pub async fn record_failure(&self, name: &str, report: &ValidationReport) {
        if is_builtin(name) {
            return;
        }
        if let Err(e) = self
            .repo
            .set_verdict(name, report.verdict(), &report.error, CapabilityStatus::Inactive)
            .await
        {
            tracing::warn!(error = %e, %name, "Failed to persist capability verdict");
        }
        let mut registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
        registered.retain(|c| c.name != name);
    }

    /// Promote a validated capability to active.
    ///
    /// Idempotent by name for the in-memory view; persisted metadata is
    /// refreshed on every call. Built-in names and unvalidated reports are
    /// refused.
    pub async fn register(
        &self,
        capability: &Capability,
        report: &ValidationReport,
    ) -> Result<Capability, RegistryError> {
        if is_builtin(&capability.name) {
            return Err(RegistryError::ReservedName(capability.name.clone()));
        }
        if !report.passed {
            return Err(RegistryError::NotValidated(capability.name.clone()));
        }

        let mut active = capability.clone();
        active.origin = CapabilityOrigin::Synthesized;
        active.status = CapabilityStatus::Active;
        active.test_verdict = TestVerdict::Passed;
        active.test_output = Some(report.output.clone());
        active.updated_at = chrono::Utc::now();

        {
            let mut registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
            if !registered.iter().any(|c| c.name == active.name) {
                registered.push(active.clone());
            }
        }

        if let Err(e) = self.repo.upsert(&active).await {
            tracing::warn!(error = %e, name = %active.name, "Failed to persist capability registration");
        }

        tracing::info!(name = %active.name, "Capability registered");
        Ok(active)
    }

    /// Record which worker a synthesized capability was built for.
    pub async fn assign_owner(&self, name: &str, worker_id: &str) {
        if is_builtin(name) {
            return;
        }
        {
            let mut registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cap) = registered.iter_mut().find(|c| c.name == name) {
                cap.created_for = Some(worker_id.to_string());
            }
        }
        if let Err(e) = self.repo.set_owner(name, worker_id).await {
            tracing::warn!(error = %e, %name, "Failed to record capability owner");
        }
    }

    /// Built-ins plus every stored record in any status, for inspection.
    pub async fn all_records(&self) -> Vec<Capability> {
        let mut all = self.builtins.clone();
        match self.repo.list_all().await {
            Ok(records) => all.extend(records.into_iter().filter(|c| !is_builtin(&c.name))),
            Err(e) => tracing::warn!(error = %e, "Failed to list stored capabilities"),
        }
        all
    }

    fn registered_view(&self) -> Vec<Capability> {
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// `name: description` lines for the active entries of `capabilities`.
pub fn listing_of(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .filter(|c| c.is_active())
        .map(Capability::listing_line)
        .collect::<Vec<_>>()
        .join("\n")
}
