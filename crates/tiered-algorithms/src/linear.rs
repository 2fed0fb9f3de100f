//! Linear model prediction on dense and CSR tables

use tracing::{debug, instrument};

use tiered_core::context::KernelContext;
use tiered_core::primitives::{ComputePrimitives, TierBackend};
use tiered_core::registry::{Algorithm, AlgorithmTag, DataLayout, RegistryBuilder};
use tiered_core::{register_kernels, CpuTier, DispatchContainer, Error, KernelFloat, Result};

use crate::table::{CsrTable, DenseTable};

/// Coefficients of `y = X·beta + intercept`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel<F> {
    pub beta: Vec<F>,
    pub intercept: F,
}

impl<F: KernelFloat> LinearModel<F> {
    pub fn new(beta: Vec<F>, intercept: F) -> Self {
        Self { beta, intercept }
    }

    fn check_features(&self, cols: usize) -> Result<()> {
        if cols != self.beta.len() {
            return Err(Error::size_mismatch(self.beta.len(), cols, "linear prediction features"));
        }
        Ok(())
    }
}

/// Prediction on a dense table
pub struct LinearPrediction;

impl<F: KernelFloat> Algorithm<F> for LinearPrediction {
    const TAG: AlgorithmTag = AlgorithmTag::new("linear_regression", "prediction", DataLayout::Dense);
    type Input = DenseTable<F>;
    type Parameter = LinearModel<F>;
    type Output = Vec<F>;
}

/// Prediction on a CSR table
pub struct LinearPredictionCsr;

impl<F: KernelFloat> Algorithm<F> for LinearPredictionCsr {
    const TAG: AlgorithmTag = AlgorithmTag::new("linear_regression", "prediction", DataLayout::Csr);
    type Input = CsrTable<F>;
    type Parameter = LinearModel<F>;
    type Output = Vec<F>;
}

fn dense_kernel<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
    _ctx: &KernelContext<'_>,
    input: &DenseTable<F>,
    model: &LinearModel<F>,
) -> Result<Vec<F>> {
    model.check_features(input.cols())?;
    let backend = P::try_new()?;
    let mut y = vec![model.intercept; input.rows()];
    for (column, &beta) in input.columns().zip(&model.beta) {
        backend.axpy(beta, column, &mut y);
    }
    Ok(y)
}

fn csr_kernel<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
    _ctx: &KernelContext<'_>,
    input: &CsrTable<F>,
    model: &LinearModel<F>,
) -> Result<Vec<F>> {
    model.check_features(input.cols())?;
    let backend = P::try_new()?;
    Ok((0..input.rows())
        .map(|i| {
            let (cols, values) = input.row(i);
            model.intercept + backend.sparse_weighted_sum(&model.beta, cols, values)
        })
        .collect())
}

pub(crate) fn register(builder: &mut RegistryBuilder) -> Result<()> {
    register_kernels!(builder, LinearPrediction => dense_kernel,
        floats: [f32, f64],
        tiers: [baseline, sse42, avx2, avx512, sve],
        targets: [HOST],
    )?;
    register_kernels!(builder, LinearPredictionCsr => csr_kernel,
        floats: [f32, f64],
        tiers: [baseline, avx2, avx512, sve],
        targets: [HOST],
    )
}

/// A linear model with its prediction kernels resolved for the host
#[derive(Debug, Clone)]
pub struct LinearPredictor<F: KernelFloat> {
    model: LinearModel<F>,
    dense: DispatchContainer<LinearPrediction, F>,
    csr: DispatchContainer<LinearPredictionCsr, F>,
}

impl<F: KernelFloat> LinearPredictor<F> {
    pub fn new(model: LinearModel<F>) -> Result<Self> {
        let registry = crate::registry()?;
        Ok(Self {
            model,
            dense: DispatchContainer::new(registry)?,
            csr: DispatchContainer::new(registry)?,
        })
    }

    /// Resolve as if the host were at `tier`
    pub fn with_tier(model: LinearModel<F>, tier: CpuTier) -> Result<Self> {
        let registry = crate::registry()?;
        Ok(Self {
            model,
            dense: DispatchContainer::with_tier(registry, tier)?,
            csr: DispatchContainer::with_tier(registry, tier)?,
        })
    }

    pub fn model(&self) -> &LinearModel<F> {
        &self.model
    }

    /// Tiers of the dense and CSR kernels
    pub fn resolved_tiers(&self) -> (CpuTier, CpuTier) {
        (self.dense.resolved_tier(), self.csr.resolved_tier())
    }

    #[instrument(skip(self, x), fields(rows = x.rows()))]
    pub fn predict(&self, x: &DenseTable<F>) -> Result<Vec<F>> {
        self.dense.compute(x, &self.model)
    }

    #[instrument(skip(self, x), fields(rows = x.rows(), nnz = x.nnz()))]
    pub fn predict_csr(&self, x: &CsrTable<F>) -> Result<Vec<F>> {
        debug!("Sparse prediction via {}", self.csr.entry().symbol());
        self.csr.compute(x, &self.model)
    }
}
