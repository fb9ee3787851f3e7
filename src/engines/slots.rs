//! Engine residency manager.
//!
//! Sessions never load engines directly; they acquire a mode's engine set
//! from this manager, which loads on demand and applies an eviction policy
//! when a different set is requested. Sessions hold `Arc` clones, so an
//! evicted set stays usable by sessions that already acquired it; eviction
//! only drops the manager's reference.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{DuplexEngines, PipelineEngines};

/// Identity of an engine set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineSetKind {
    /// Recognizer + translator + synthesizer + voice activity.
    Pipeline,
    /// Codec + stepper.
    Duplex,
}

impl EngineSetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineSetKind::Pipeline => "pipeline",
            EngineSetKind::Duplex => "duplex",
        }
    }
}

/// Loads engine sets on demand. Model lifecycle internals live behind this
/// trait and are out of the relay's scope.
#[async_trait]
pub trait EngineProvider: Send + Sync {
    async fn load_pipeline(&self) -> Result<PipelineEngines>;
    async fn load_duplex(&self) -> Result<DuplexEngines>;
}

/// Decides what happens to resident sets when a different set is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// At most one set resident at a time; acquiring one releases the other.
    #[default]
    ExclusiveResidency,
    /// Sets stay resident once loaded.
    KeepResident,
}

#[derive(Default)]
struct SlotState {
    pipeline: Option<PipelineEngines>,
    duplex: Option<DuplexEngines>,
}

/// Snapshot of which sets are resident, for health reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residency {
    pub pipeline: bool,
    pub duplex: bool,
}

/// Engine-set residency manager shared by all sessions.
pub struct EngineSlots {
    provider: Arc<dyn EngineProvider>,
    policy: EvictionPolicy,
    state: Mutex<SlotState>,
}

impl EngineSlots {
    pub fn new(provider: Arc<dyn EngineProvider>, policy: EvictionPolicy) -> Self {
        Self {
            provider,
            policy,
            state: Mutex::new(SlotState::default()),
        }
    }

    /// True when the set is already loaded; used to decide whether a session
    /// must announce a loading phase before acquiring.
    pub async fn is_resident(&self, kind: EngineSetKind) -> bool {
        let state = self.state.lock().await;
        match kind {
            EngineSetKind::Pipeline => state.pipeline.is_some(),
            EngineSetKind::Duplex => state.duplex.is_some(),
        }
    }

    /// Residency snapshot for health reporting.
    pub async fn residency(&self) -> Residency {
        let state = self.state.lock().await;
        Residency {
            pipeline: state.pipeline.is_some(),
            duplex: state.duplex.is_some(),
        }
    }

    /// Acquires the pipeline engine set, loading it first when absent.
    pub async fn acquire_pipeline(&self) -> Result<PipelineEngines> {
        let mut state = self.state.lock().await;
        if let Some(engines) = &state.pipeline {
            return Ok(engines.clone());
        }
        if self.policy == EvictionPolicy::ExclusiveResidency {
            state.duplex = None;
        }
        let engines = self.provider.load_pipeline().await?;
        state.pipeline = Some(engines.clone());
        tracing::info!("pipeline engine set loaded");
        Ok(engines)
    }

    /// Acquires the duplex engine set, loading it first when absent.
    pub async fn acquire_duplex(&self) -> Result<DuplexEngines> {
        let mut state = self.state.lock().await;
        if let Some(engines) = &state.duplex {
            return Ok(engines.clone());
        }
        if self.policy == EvictionPolicy::ExclusiveResidency {
            state.pipeline = None;
        }
        let engines = self.provider.load_duplex().await?;
        state.duplex = Some(engines.clone());
        tracing::info!("duplex engine set loaded");
        Ok(engines)
    }

    /// Releases every resident set.
    pub async fn release_all(&self) {
        let mut state = self.state.lock().await;
        state.pipeline = None;
        state.duplex = None;
    }
}
