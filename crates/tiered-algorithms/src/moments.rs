//! Low order moments: batch, online and distributed
//!
//! All three modes share one per-block kernel that produces
//! [`PartialMoments`]. Batch finalizes a single block, online merges blocks
//! as they arrive, and the distributed mode computes partials per data
//! partition (step 1) and merges them on the master (step 2).

use rayon::prelude::*;
use tracing::{debug, instrument};

use tiered_core::context::{self, KernelContext};
use tiered_core::primitives::{ComputePrimitives, TierBackend};
use tiered_core::registry::{Algorithm, AlgorithmTag, ComputeMode, DataLayout, RegistryBuilder};
use tiered_core::{register_kernels, CpuTier, DispatchContainer, Error, KernelFloat, Result};

use crate::table::DenseTable;

const BATCH_TAG: AlgorithmTag = AlgorithmTag::new("low_order_moments", "default", DataLayout::Dense);

/// Per-column summary statistics
#[derive(Debug, Clone, PartialEq)]
pub struct Moments<F> {
    pub nobs: usize,
    pub sum: Vec<F>,
    pub sum_squares: Vec<F>,
    pub mean: Vec<F>,
    /// Sample variance (divisor `nobs - 1`), zero for a single observation
    pub variance: Vec<F>,
    /// NaN-ignoring minimum, NaN when a column has no numbers
    pub min: Vec<F>,
    pub max: Vec<F>,
}

/// Mergeable sufficient statistics of a block of rows
#[derive(Debug, Clone, PartialEq)]
pub struct PartialMoments<F> {
    pub nobs: usize,
    pub sum: Vec<F>,
    pub sum_squares: Vec<F>,
    pub min: Vec<F>,
    pub max: Vec<F>,
}

impl<F: KernelFloat> PartialMoments<F> {
    /// Statistics of zero rows
    pub fn empty(cols: usize) -> Self {
        Self {
            nobs: 0,
            sum: vec![F::zero(); cols],
            sum_squares: vec![F::zero(); cols],
            min: vec![F::infinity(); cols],
            max: vec![F::neg_infinity(); cols],
        }
    }

    pub fn cols(&self) -> usize {
        self.sum.len()
    }

    pub fn merge(&mut self, other: &PartialMoments<F>) -> Result<()> {
        if other.cols() != self.cols() {
            return Err(Error::size_mismatch(self.cols(), other.cols(), "PartialMoments::merge"));
        }
        self.nobs += other.nobs;
        for j in 0..self.cols() {
            self.sum[j] = self.sum[j] + other.sum[j];
            self.sum_squares[j] = self.sum_squares[j] + other.sum_squares[j];
            self.min[j] = self.min[j].min(other.min[j]);
            self.max[j] = self.max[j].max(other.max[j]);
        }
        Ok(())
    }

    pub fn finalize(&self) -> Result<Moments<F>> {
        if self.nobs == 0 {
            return Err(Error::InvalidInput("moments of an empty table".to_string()));
        }
        let n = F::from_usize(self.nobs)
            .ok_or_else(|| Error::Computation(format!("{} observations overflow", self.nobs)))?;

        let mean: Vec<F> = self.sum.iter().map(|&s| s / n).collect();
        let variance = self
            .sum
            .iter()
            .zip(&self.sum_squares)
            .map(|(&s, &ss)| {
                if self.nobs == 1 {
                    F::zero()
                } else {
                    // Rounding can push a constant column slightly negative
                    ((ss - s * s / n) / (n - F::one())).max(F::zero())
                }
            })
            .collect();
        let (min, max): (Vec<F>, Vec<F>) = self
            .min
            .iter()
            .zip(&self.max)
            .map(|(&lo, &hi)| if lo > hi { (F::nan(), F::nan()) } else { (lo, hi) })
            .unzip();

        Ok(Moments {
            nobs: self.nobs,
            sum: self.sum.clone(),
            sum_squares: self.sum_squares.clone(),
            mean,
            variance,
            min,
            max,
        })
    }
}

/// Batch low order moments of a dense table
pub struct LowOrderMoments;

impl<F: KernelFloat> Algorithm<F> for LowOrderMoments {
    const TAG: AlgorithmTag = BATCH_TAG;
    type Input = DenseTable<F>;
    type Parameter = ();
    type Output = Moments<F>;
}

/// Partial moments of one block in online mode
pub struct LowOrderMomentsOnline;

impl<F: KernelFloat> Algorithm<F> for LowOrderMomentsOnline {
    const TAG: AlgorithmTag = BATCH_TAG.with_mode(ComputeMode::Online);
    type Input = DenseTable<F>;
    type Parameter = ();
    type Output = PartialMoments<F>;
}

/// Distributed step 1: partial moments of a local partition
pub struct LowOrderMomentsLocal;

impl<F: KernelFloat> Algorithm<F> for LowOrderMomentsLocal {
    const TAG: AlgorithmTag = BATCH_TAG.with_mode(ComputeMode::Distributed(1));
    type Input = DenseTable<F>;
    type Parameter = ();
    type Output = PartialMoments<F>;
}

/// Distributed step 2: merge local partials on the master
pub struct LowOrderMomentsMaster;

impl<F: KernelFloat> Algorithm<F> for LowOrderMomentsMaster {
    const TAG: AlgorithmTag = BATCH_TAG.with_mode(ComputeMode::Distributed(2));
    type Input = Vec<PartialMoments<F>>;
    type Parameter = ();
    type Output = Moments<F>;
}

fn partial_kernel<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
    _ctx: &KernelContext<'_>,
    input: &DenseTable<F>,
    _param: &(),
) -> Result<PartialMoments<F>> {
    let backend = P::try_new()?;
    let mut partial = PartialMoments::empty(input.cols());
    partial.nobs = input.rows();
    for (j, column) in input.columns().enumerate() {
        partial.sum[j] = backend.sum(column);
        partial.sum_squares[j] = backend.sum_of_squares(column);
        if let Some((lo, hi)) = backend.min_max(column) {
            partial.min[j] = lo;
            partial.max[j] = hi;
        }
    }
    Ok(partial)
}

fn batch_kernel<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
    ctx: &KernelContext<'_>,
    input: &DenseTable<F>,
    param: &(),
) -> Result<Moments<F>> {
    partial_kernel::<F, P>(ctx, input, param)?.finalize()
}

fn merge_kernel<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
    _ctx: &KernelContext<'_>,
    partials: &Vec<PartialMoments<F>>,
    _param: &(),
) -> Result<Moments<F>> {
    let (first, rest) = partials
        .split_first()
        .ok_or_else(|| Error::InvalidInput("no partial results to merge".to_string()))?;
    let mut total = first.clone();
    for partial in rest {
        total.merge(partial)?;
    }
    total.finalize()
}

pub(crate) fn register(builder: &mut RegistryBuilder) -> Result<()> {
    register_kernels!(builder, LowOrderMoments => batch_kernel,
        floats: [f32, f64],
        tiers: [baseline, sse42, avx2, avx512, sve],
        targets: [HOST],
    )?;
    register_kernels!(builder, LowOrderMomentsOnline => partial_kernel,
        floats: [f32, f64],
        tiers: [baseline, sse42, avx2, avx512, sve],
        targets: [HOST],
    )?;
    register_kernels!(builder, LowOrderMomentsLocal => partial_kernel,
        floats: [f32, f64],
        tiers: [baseline, sse42, avx2, avx512, sve],
        targets: [HOST],
    )?;
    // Merging is a handful of adds per column
    register_kernels!(builder, LowOrderMomentsMaster => merge_kernel,
        floats: [f32, f64],
        tiers: [baseline],
        targets: [HOST],
    )
}

/// Batch moments with the kernel resolved for the host
#[derive(Debug, Clone)]
pub struct MomentsEstimator<F: KernelFloat> {
    container: DispatchContainer<LowOrderMoments, F>,
}

impl<F: KernelFloat> MomentsEstimator<F> {
    pub fn new() -> Result<Self> {
        Ok(Self {
            container: DispatchContainer::new(crate::registry()?)?,
        })
    }

    /// Resolve as if the host were at `tier`
    pub fn with_tier(tier: CpuTier) -> Result<Self> {
        Ok(Self {
            container: DispatchContainer::with_tier(crate::registry()?, tier)?,
        })
    }

    pub fn resolved_tier(&self) -> CpuTier {
        self.container.resolved_tier()
    }

    #[instrument(skip(self, data), fields(rows = data.rows(), cols = data.cols()))]
    pub fn compute(&self, data: &DenseTable<F>) -> Result<Moments<F>> {
        debug!("Computing moments with {}", self.container.entry().symbol());
        self.container.compute(data, &())
    }
}

/// Moments accumulated block by block
#[derive(Debug, Clone)]
pub struct OnlineMoments<F: KernelFloat> {
    container: DispatchContainer<LowOrderMomentsOnline, F>,
    state: Option<PartialMoments<F>>,
}

impl<F: KernelFloat> OnlineMoments<F> {
    pub fn new() -> Result<Self> {
        Ok(Self {
            container: DispatchContainer::new(crate::registry()?)?,
            state: None,
        })
    }

    /// Fold one block of rows into the running statistics
    #[instrument(skip(self, block), fields(rows = block.rows()))]
    pub fn update(&mut self, block: &DenseTable<F>) -> Result<()> {
        let partial = self.container.compute(block, &())?;
        match &mut self.state {
            Some(state) => state.merge(&partial)?,
            None => self.state = Some(partial),
        }
        Ok(())
    }

    /// Rows seen so far
    pub fn nobs(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.nobs)
    }

    pub fn partial(&self) -> Option<&PartialMoments<F>> {
        self.state.as_ref()
    }

    pub fn finalize(&self) -> Result<Moments<F>> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("no blocks were added".to_string()))?
            .finalize()
    }
}

/// Moments of a dataset split into partitions
///
/// Step 1 runs on every partition in parallel against the current
/// execution context; step 2 merges the partials.
#[instrument(skip(partitions), fields(partitions = partitions.len()))]
pub fn distributed_moments<F: KernelFloat>(partitions: &[DenseTable<F>]) -> Result<Moments<F>> {
    let registry = crate::registry()?;
    let local = DispatchContainer::<LowOrderMomentsLocal, F>::new(registry)?;
    let master = DispatchContainer::<LowOrderMomentsMaster, F>::new(registry)?;
    let ctx = context::current();

    let partials = partitions
        .par_iter()
        .map(|partition| local.compute_in(ctx.as_ref(), partition, &()))
        .collect::<Result<Vec<_>>>()?;
    debug!("Merging {} partial results", partials.len());

    master.compute_in(ctx.as_ref(), &partials, &())
}

/// Batch moments of `data` on the host's best tier
pub fn low_order_moments<F: KernelFloat>(data: &DenseTable<F>) -> Result<Moments<F>> {
    MomentsEstimator::new()?.compute(data)
}
