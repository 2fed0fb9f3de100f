//! Raw ISA extension detection

use bitflags::bitflags;
use std::sync::OnceLock;

use super::CpuTier;

bitflags! {
    /// Instruction-set extensions relevant to tier selection
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CpuFeatures: u32 {
        const SSE2 = 1 << 0;
        const SSSE3 = 1 << 1;
        const SSE4_1 = 1 << 2;
        const SSE4_2 = 1 << 3;
        const POPCNT = 1 << 4;
        const AVX = 1 << 5;
        const AVX2 = 1 << 6;
        const FMA = 1 << 7;
        const BMI1 = 1 << 8;
        const BMI2 = 1 << 9;
        const LZCNT = 1 << 10;
        const AVX512F = 1 << 11;
        const AVX512CD = 1 << 12;
        const AVX512BW = 1 << 13;
        const AVX512DQ = 1 << 14;
        const AVX512VL = 1 << 15;
        const NEON = 1 << 16;
        const SVE = 1 << 17;
    }
}

impl CpuFeatures {
    /// Query the host for its ISA extensions
    ///
    /// The std detection macros also check OS support for the extended
    /// register state (XSAVE/XGETBV), so a reported AVX feature is usable.
    pub fn detect() -> Self {
        #[allow(unused_mut)]
        let mut features = CpuFeatures::empty();

        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            macro_rules! probe {
                ($($name:tt => $flag:ident),+ $(,)?) => {
                    $(
                        if std::arch::is_x86_feature_detected!($name) {
                            features |= CpuFeatures::$flag;
                        }
                    )+
                };
            }
            probe! {
                "sse2" => SSE2,
                "ssse3" => SSSE3,
                "sse4.1" => SSE4_1,
                "sse4.2" => SSE4_2,
                "popcnt" => POPCNT,
                "avx" => AVX,
                "avx2" => AVX2,
                "fma" => FMA,
                "bmi1" => BMI1,
                "bmi2" => BMI2,
                "lzcnt" => LZCNT,
                "avx512f" => AVX512F,
                "avx512cd" => AVX512CD,
                "avx512bw" => AVX512BW,
                "avx512dq" => AVX512DQ,
                "avx512vl" => AVX512VL,
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                features |= CpuFeatures::NEON;
            }
            if std::arch::is_aarch64_feature_detected!("sve") {
                features |= CpuFeatures::SVE;
            }
        }

        features
    }

    /// Host features, detected once per process
    ///
    /// Unlike the host tier this is never capped by configuration: it is
    /// what backends check before emitting tier-specific instructions.
    pub fn host() -> Self {
        static HOST: OnceLock<CpuFeatures> = OnceLock::new();
        *HOST.get_or_init(Self::detect)
    }

    /// Highest tier whose full requirement set is present
    ///
    /// A partially supported tier (e.g. AVX2 without FMA) does not count.
    pub fn tier(self) -> CpuTier {
        CpuTier::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| self.contains(tier.required_features()))
            .unwrap_or(CpuTier::Baseline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_maps_to_baseline() {
        assert_eq!(CpuFeatures::empty().tier(), CpuTier::Baseline);
    }

    #[test]
    fn test_partial_tier_is_not_selected() {
        // AVX2 without FMA/BMI is not a complete AVX2 tier
        let features = CpuTier::Sse42.required_features() | CpuFeatures::AVX | CpuFeatures::AVX2;
        assert_eq!(features.tier(), CpuTier::Sse42);
    }

    #[test]
    fn test_complete_sets_map_to_their_tier() {
        for tier in CpuTier::ALL {
            assert_eq!(tier.required_features().tier(), tier);
        }
    }

    #[test]
    fn test_detect_is_consistent_with_std() {
        let features = CpuFeatures::detect();

        #[cfg(target_arch = "x86_64")]
        {
            // SSE2 is part of the x86_64 baseline
            assert!(features.contains(CpuFeatures::SSE2));
            assert_eq!(
                features.contains(CpuFeatures::AVX2),
                std::arch::is_x86_feature_detected!("avx2")
            );
        }

        #[cfg(target_arch = "aarch64")]
        assert!(features.contains(CpuFeatures::NEON));

        let _ = features.tier();
    }
}
