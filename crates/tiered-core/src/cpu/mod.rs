//! CPU capability tiers and host detection
//!
//! A [`CpuTier`] is an ordered instruction-set level. Kernels are compiled
//! once per tier and the dispatcher picks the highest tier the host can run.
//!
//! Tiers form a single total order, but tiers from different ISA families
//! never substitute for each other: an AVX2 kernel is not runnable on an
//! SVE host even though `Avx2 < Sve`. Only [`CpuTier::Baseline`] is shared
//! by every family.

mod features;
mod probe;

pub use features::CpuFeatures;
pub use probe::{detect_host_tier, host_probe, host_tier, CpuFeatureProbe, Detector};

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::{Error, Result};

/// Instruction-set family a tier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsaFamily {
    /// Portable code, runs everywhere
    Generic,
    X86,
    Arm,
}

/// Ordered CPU capability level
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CpuTier {
    /// Portable scalar code (SSE2 on x86_64, plain code elsewhere)
    Baseline = 0,
    /// SSE4.2 with POPCNT
    Sse42 = 1,
    /// AVX2 with FMA and BMI
    Avx2 = 2,
    /// AVX-512 F/CD/BW/DQ/VL
    Avx512 = 3,
    /// Arm Scalable Vector Extension
    Sve = 4,
}

impl CpuTier {
    /// All tiers in ascending order
    pub const ALL: [CpuTier; 5] = [
        CpuTier::Baseline,
        CpuTier::Sse42,
        CpuTier::Avx2,
        CpuTier::Avx512,
        CpuTier::Sve,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            CpuTier::Baseline => "baseline",
            CpuTier::Sse42 => "sse42",
            CpuTier::Avx2 => "avx2",
            CpuTier::Avx512 => "avx512",
            CpuTier::Sve => "sve",
        }
    }

    pub const fn family(self) -> IsaFamily {
        match self {
            CpuTier::Baseline => IsaFamily::Generic,
            CpuTier::Sse42 | CpuTier::Avx2 | CpuTier::Avx512 => IsaFamily::X86,
            CpuTier::Sve => IsaFamily::Arm,
        }
    }

    /// Whether a host at this tier can execute a kernel compiled for `kernel`
    pub fn can_run(self, kernel: CpuTier) -> bool {
        kernel <= self
            && (kernel.family() == IsaFamily::Generic || kernel.family() == self.family())
    }

    /// Highest tier at or below `max` that this host can run
    pub fn capped(self, max: CpuTier) -> CpuTier {
        CpuTier::ALL
            .iter()
            .rev()
            .copied()
            .find(|&t| t <= max && self.can_run(t))
            .unwrap_or(CpuTier::Baseline)
    }

    /// The ISA extensions a host must expose for this tier
    pub fn required_features(self) -> CpuFeatures {
        let sse42 = CpuFeatures::SSE2
            | CpuFeatures::SSSE3
            | CpuFeatures::SSE4_1
            | CpuFeatures::SSE4_2
            | CpuFeatures::POPCNT;
        let avx2 = sse42
            | CpuFeatures::AVX
            | CpuFeatures::AVX2
            | CpuFeatures::FMA
            | CpuFeatures::BMI1
            | CpuFeatures::BMI2
            | CpuFeatures::LZCNT;
        match self {
            CpuTier::Baseline => CpuFeatures::empty(),
            CpuTier::Sse42 => sse42,
            CpuTier::Avx2 => avx2,
            CpuTier::Avx512 => {
                avx2 | CpuFeatures::AVX512F
                    | CpuFeatures::AVX512CD
                    | CpuFeatures::AVX512BW
                    | CpuFeatures::AVX512DQ
                    | CpuFeatures::AVX512VL
            }
            CpuTier::Sve => CpuFeatures::NEON | CpuFeatures::SVE,
        }
    }
}

impl Display for CpuTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" | "generic" | "scalar" | "sse2" => Ok(CpuTier::Baseline),
            "sse42" | "sse4.2" | "sse4_2" => Ok(CpuTier::Sse42),
            "avx2" => Ok(CpuTier::Avx2),
            "avx512" | "avx-512" | "avx512f" => Ok(CpuTier::Avx512),
            "sve" => Ok(CpuTier::Sve),
            other => Err(Error::Config(format!("unknown CPU tier '{other}'"))),
        }
    }
}
