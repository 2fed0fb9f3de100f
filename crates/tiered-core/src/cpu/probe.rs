//! Lazily cached host tier detection

use std::sync::OnceLock;

use super::{CpuFeatures, CpuTier};
use crate::config;

/// Function that computes a host tier from scratch
pub type Detector = fn() -> CpuTier;

/// One-shot, thread-safe tier detection
///
/// The first caller of [`detect`](Self::detect) runs the detector; racing
/// callers block until that value is stored and every later call is a
/// single atomic load. Probes are usually `static`.
#[derive(Debug)]
pub struct CpuFeatureProbe {
    detector: Detector,
    tier: OnceLock<CpuTier>,
}

impl CpuFeatureProbe {
    /// Create a probe around a detector function
    pub const fn new(detector: Detector) -> Self {
        Self {
            detector,
            tier: OnceLock::new(),
        }
    }

    /// The probed tier, running the detector on first use
    pub fn detect(&self) -> CpuTier {
        *self.tier.get_or_init(|| {
            let tier = (self.detector)();
            log::debug!("CPU tier detected: {tier}");
            tier
        })
    }

    /// Whether detection has already run
    pub fn is_initialized(&self) -> bool {
        self.tier.get().is_some()
    }
}

static HOST_PROBE: CpuFeatureProbe = CpuFeatureProbe::new(detect_host_tier);

/// The process-wide host probe
pub fn host_probe() -> &'static CpuFeatureProbe {
    &HOST_PROBE
}

/// The effective host tier, cached for the process lifetime
pub fn host_tier() -> CpuTier {
    HOST_PROBE.detect()
}

/// Detect the host tier and apply the configured `max_tier` cap
///
/// Never fails: unknown or older hardware maps to [`CpuTier::Baseline`].
pub fn detect_host_tier() -> CpuTier {
    let features = CpuFeatures::host();
    let detected = features.tier();
    log::trace!("CPU features: {features:?}");

    match config::global().max_tier {
        Some(max) => {
            let capped = detected.capped(max);
            if capped != detected {
                log::debug!("CPU tier {detected} capped to {capped} by configuration");
            }
            capped
        }
        None => detected,
    }
}
