//! Kernel registry
//!
//! Maps `(AlgorithmTag, FloatType, CpuTier)` to a concrete kernel entry
//! point. Algorithm crates declare their kernels in a static manifest with
//! [`register_kernels!`](crate::register_kernels), which instantiates one
//! kernel per float type and tier and binds each tier to its backend.
//! Tiers that do not exist on the target architecture are compiled out.
//!
//! The registry is built once and then only read:
//!
//! ```rust
//! use tiered_core::context::KernelContext;
//! use tiered_core::registry::{Algorithm, AlgorithmTag, DataLayout, KernelRegistry};
//! use tiered_core::{CpuTier, KernelFloat, Result};
//! use tiered_core::primitives::{ComputePrimitives, TierBackend};
//!
//! struct Total;
//!
//! impl<F: KernelFloat> Algorithm<F> for Total {
//!     const TAG: AlgorithmTag = AlgorithmTag::new("total", "default", DataLayout::Dense);
//!     type Input = Vec<F>;
//!     type Parameter = ();
//!     type Output = F;
//! }
//!
//! fn total<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
//!     _ctx: &KernelContext<'_>,
//!     input: &Vec<F>,
//!     _param: &(),
//! ) -> Result<F> {
//!     Ok(P::try_new()?.sum(input))
//! }
//!
//! let mut builder = KernelRegistry::builder();
//! tiered_core::register_kernels!(&mut builder, Total => total,
//!     floats: [f32, f64],
//!     tiers: [baseline, avx2],
//!     targets: [HOST],
//! )
//! .unwrap();
//! let registry = builder.build();
//!
//! let entry = registry.lookup::<Total, f64>(CpuTier::Baseline).unwrap();
//! assert_eq!(entry.tier(), CpuTier::Baseline);
//! ```

mod entry;
mod macros;
mod tag;

pub use entry::{ContextTargets, KernelEntry, KernelFn};
pub use tag::{AlgorithmTag, ComputeMode, DataLayout};

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;

use crate::cpu::CpuTier;
use crate::numeric::{FloatType, KernelFloat};
use crate::{Error, Result};

/// An algorithm front-end's kernel signature for float type `F`
pub trait Algorithm<F: KernelFloat>: 'static {
    /// Registry key shared by every kernel of this algorithm
    const TAG: AlgorithmTag;

    type Input;
    type Parameter;
    type Output;
}

/// A type-erased [`KernelEntry`] ready to be added to a registry
pub struct KernelRegistration {
    tag: AlgorithmTag,
    float_type: FloatType,
    tier: CpuTier,
    symbol: &'static str,
    algorithm: &'static str,
    entry: Box<dyn Any + Send + Sync>,
}

impl KernelRegistration {
    pub fn tag(&self) -> AlgorithmTag {
        self.tag
    }

    pub fn float_type(&self) -> FloatType {
        self.float_type
    }

    pub fn tier(&self) -> CpuTier {
        self.tier
    }

    pub fn symbol(&self) -> &'static str {
        self.symbol
    }
}

impl<A: Algorithm<F>, F: KernelFloat> From<KernelEntry<A, F>> for KernelRegistration {
    fn from(entry: KernelEntry<A, F>) -> Self {
        Self {
            tag: A::TAG,
            float_type: F::FLOAT_TYPE,
            tier: entry.tier(),
            symbol: entry.symbol(),
            algorithm: type_name::<A>(),
            entry: Box::new(entry),
        }
    }
}

impl fmt::Debug for KernelRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistration")
            .field("tag", &self.tag)
            .field("float_type", &self.float_type)
            .field("tier", &self.tier)
            .field("symbol", &self.symbol)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

type TierTable = BTreeMap<CpuTier, KernelRegistration>;

/// Collects registrations and freezes them into a [`KernelRegistry`]
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    tables: BTreeMap<(AlgorithmTag, FloatType), TierTable>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one kernel
    ///
    /// Each `(tag, float type, tier)` may be registered once; a second
    /// registration is a manifest error.
    pub fn register(&mut self, registration: impl Into<KernelRegistration>) -> Result<&mut Self> {
        let registration = registration.into();
        let table = self
            .tables
            .entry((registration.tag, registration.float_type))
            .or_default();

        if let Some(existing) = table.get(&registration.tier) {
            return Err(Error::DuplicateKernel {
                tag: registration.tag.to_string(),
                float_type: registration.float_type,
                tier: existing.tier,
            });
        }

        log::trace!(
            "Registered kernel {} for {}/{} at {}",
            registration.symbol,
            registration.tag,
            registration.float_type,
            registration.tier
        );
        table.insert(registration.tier, registration);
        Ok(self)
    }

    /// Number of kernels registered so far
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn build(self) -> KernelRegistry {
        let registry = KernelRegistry {
            tables: self.tables,
        };
        log::debug!(
            "Kernel registry built: {} kernels for {} algorithm/float pairs",
            registry.len(),
            registry.tables.len()
        );
        registry
    }
}

/// Immutable table of compiled kernels
#[derive(Debug, Default)]
pub struct KernelRegistry {
    tables: BTreeMap<(AlgorithmTag, FloatType), TierTable>,
}

impl KernelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Resolve the best kernel of `A` for `F` on a host at `tier`
    ///
    /// Returns the highest registered tier that is at most `tier` and that
    /// a host at `tier` can execute. The result depends only on the
    /// registered set and `tier`.
    pub fn lookup<A: Algorithm<F>, F: KernelFloat>(&self, tier: CpuTier) -> Result<KernelEntry<A, F>> {
        let tag = A::TAG;
        let float_type = F::FLOAT_TYPE;
        let table = self
            .tables
            .get(&(tag, float_type))
            .ok_or_else(|| Error::UnsupportedCombination {
                tag: tag.to_string(),
                float_type,
            })?;

        let registration = table
            .range(..=tier)
            .rev()
            .map(|(_, registration)| registration)
            .find(|registration| tier.can_run(registration.tier))
            .ok_or_else(|| Error::KernelNotFound {
                tag: tag.to_string(),
                float_type,
                tier,
            })?;

        registration
            .entry
            .downcast_ref::<KernelEntry<A, F>>()
            .copied()
            .ok_or_else(|| {
                log::error!(
                    "Kernel {} was registered by {}, requested as {}",
                    registration.symbol,
                    registration.algorithm,
                    type_name::<A>()
                );
                Error::SignatureMismatch {
                    tag: tag.to_string(),
                    float_type,
                }
            })
    }

    /// Tiers registered for a `(tag, float type)` pair, ascending
    pub fn tiers(&self, tag: AlgorithmTag, float_type: FloatType) -> Vec<CpuTier> {
        self.tables
            .get(&(tag, float_type))
            .map(|table| table.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, tag: AlgorithmTag, float_type: FloatType, tier: CpuTier) -> bool {
        self.tables
            .get(&(tag, float_type))
            .is_some_and(|table| table.contains_key(&tier))
    }

    /// Total number of registered kernels
    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// All registrations in key order
    pub fn iter(&self) -> impl Iterator<Item = &KernelRegistration> + '_ {
        self.tables.values().flat_map(BTreeMap::values)
    }
}
