//! Covariance and correlation matrices
//!
//! The kernel stages the table in context memory and runs the column-pair
//! work as a context task, so it runs unchanged on the host context and on
//! a device queue.

use std::sync::Arc;
use tracing::{debug, instrument};

use tiered_core::context::{
    self, Buffer, ContextExt, Event, ExecutionContext, KernelContext, Memory,
};
use tiered_core::primitives::{ComputePrimitives, TierBackend};
use tiered_core::registry::{Algorithm, AlgorithmTag, DataLayout, RegistryBuilder};
use tiered_core::{register_kernels, CpuTier, DispatchContainer, Error, KernelFloat, Result};

use crate::table::DenseTable;

/// Which matrix the covariance kernel produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMatrix {
    #[default]
    Covariance,
    Correlation,
}

/// Options of the covariance kernel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CovarianceOptions {
    pub output: OutputMatrix,
}

/// Means and a `p × p` row-major symmetric matrix
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceResult<F> {
    pub means: Vec<F>,
    pub matrix: Vec<F>,
    pub dim: usize,
}

impl<F: KernelFloat> CovarianceResult<F> {
    pub fn get(&self, i: usize, j: usize) -> F {
        self.matrix[i * self.dim + j]
    }
}

/// Dense batch covariance
pub struct Covariance;

impl<F: KernelFloat> Algorithm<F> for Covariance {
    const TAG: AlgorithmTag = AlgorithmTag::new("covariance", "default", DataLayout::Dense);
    type Input = DenseTable<F>;
    type Parameter = CovarianceOptions;
    type Output = CovarianceResult<F>;
}

/// Means followed by the row-major matrix
fn cross_products<F: KernelFloat, P: ComputePrimitives<F>>(
    backend: &P,
    data: &[F],
    rows: usize,
    cols: usize,
    output: OutputMatrix,
) -> Vec<F> {
    let n = F::from_usize(rows).unwrap_or_else(F::nan);
    let column = |j: usize| &data[j * rows..(j + 1) * rows];

    let mut result = vec![F::zero(); cols + cols * cols];
    let (means, matrix) = result.split_at_mut(cols);
    for (j, mean) in means.iter_mut().enumerate() {
        *mean = backend.sum(column(j)) / n;
    }
    for i in 0..cols {
        for j in i..cols {
            let cross = backend.dot_product(column(i), column(j)) - n * means[i] * means[j];
            let value = cross / (n - F::one());
            matrix[i * cols + j] = value;
            matrix[j * cols + i] = value;
        }
    }

    if output == OutputMatrix::Correlation {
        let scale: Vec<F> = (0..cols).map(|i| matrix[i * cols + i].sqrt()).collect();
        for i in 0..cols {
            for j in 0..cols {
                matrix[i * cols + j] = matrix[i * cols + j] / (scale[i] * scale[j]);
            }
        }
    }
    result
}

fn covariance_kernel<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
    ctx: &KernelContext<'_>,
    input: &DenseTable<F>,
    options: &CovarianceOptions,
) -> Result<CovarianceResult<F>> {
    let backend = P::try_new()?;
    let (rows, cols) = (input.rows(), input.cols());
    if rows < 2 {
        return Err(Error::InvalidInput(format!(
            "covariance needs at least 2 observations, got {rows}"
        )));
    }

    let exec = ctx.context();
    let data = exec.upload(input.as_slice())?;
    let computed = run_on_device(exec, &backend, &data, rows, cols, options.output);
    let released = exec.release(data);
    let mut means = computed?;
    released?;
    let matrix = means.split_off(cols);

    Ok(CovarianceResult {
        means,
        matrix,
        dim: cols,
    })
}

/// Allocate the output, run the task and download it; the output buffer is
/// released whatever the outcome
fn run_on_device<F: KernelFloat, P: ComputePrimitives<F> + TierBackend>(
    exec: &dyn ExecutionContext,
    backend: &P,
    data: &Buffer,
    rows: usize,
    cols: usize,
    output: OutputMatrix,
) -> Result<Vec<F>> {
    let out = exec.allocate((cols + cols * cols) * std::mem::size_of::<F>())?;

    let (source, target, backend) = (data.clone(), out.clone(), *backend);
    let downloaded = exec
        .submit(move |memory: &mut Memory| {
            let result = cross_products(&backend, memory.slice::<F>(&source)?, rows, cols, output);
            memory.slice_mut::<F>(&target)?.copy_from_slice(&result);
            Ok(())
        })
        .and_then(Event::wait)
        .and_then(|()| exec.download::<F>(&out));

    let released = exec.release(out);
    let values = downloaded?;
    released?;
    Ok(values)
}

pub(crate) fn register(builder: &mut RegistryBuilder) -> Result<()> {
    // No AVX-512 build: those hosts run the AVX2 kernel
    register_kernels!(builder, Covariance => covariance_kernel,
        floats: [f32, f64],
        tiers: [baseline, sse42, avx2, sve],
        targets: [HOST, DEVICE],
    )
}

/// Covariance with the kernel resolved once
#[derive(Debug, Clone)]
pub struct CovarianceEstimator<F: KernelFloat> {
    container: DispatchContainer<Covariance, F>,
    options: CovarianceOptions,
}

impl<F: KernelFloat> CovarianceEstimator<F> {
    pub fn new() -> Result<Self> {
        Ok(Self {
            container: DispatchContainer::new(crate::registry()?)?,
            options: CovarianceOptions::default(),
        })
    }

    /// Resolve as if the host were at `tier`
    pub fn with_tier(tier: CpuTier) -> Result<Self> {
        Ok(Self {
            container: DispatchContainer::with_tier(crate::registry()?, tier)?,
            options: CovarianceOptions::default(),
        })
    }

    pub fn correlation(mut self) -> Self {
        self.options.output = OutputMatrix::Correlation;
        self
    }

    pub fn resolved_tier(&self) -> CpuTier {
        self.container.resolved_tier()
    }

    /// Compute on the current execution context
    #[instrument(skip(self, data), fields(rows = data.rows(), cols = data.cols()))]
    pub fn compute(&self, data: &DenseTable<F>) -> Result<CovarianceResult<F>> {
        let ctx = context::current();
        self.compute_in(ctx.as_ref(), data)
    }

    /// Compute on an explicit execution context
    pub fn compute_in(
        &self,
        ctx: &dyn ExecutionContext,
        data: &DenseTable<F>,
    ) -> Result<CovarianceResult<F>> {
        debug!(
            "Covariance via {} on {} context '{}'",
            self.container.entry().symbol(),
            ctx.kind(),
            ctx.name()
        );
        self.container.compute_in(ctx, data, &self.options)
    }
}

/// Covariance of `data` on the current execution context
pub fn covariance<F: KernelFloat>(data: &DenseTable<F>) -> Result<CovarianceResult<F>> {
    CovarianceEstimator::new()?.compute(data)
}

/// Run `estimator` on a shared context from several threads
///
/// Every call uses the same `ctx`, which is how concurrent kernels must
/// share a context.
pub fn covariance_many<F: KernelFloat>(
    estimator: &CovarianceEstimator<F>,
    ctx: Arc<dyn ExecutionContext>,
    tables: &[DenseTable<F>],
) -> Result<Vec<CovarianceResult<F>>> {
    use rayon::prelude::*;
    tables
        .par_iter()
        .map(|table| estimator.compute_in(ctx.as_ref(), table))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tiered_core::{cpu, CpuContext, QueueContext};

    fn sample() -> DenseTable<f64> {
        DenseTable::from_rows(&[
            vec![1.0, 2.0, 5.0],
            vec![2.0, 4.1, 3.0],
            vec![3.0, 6.2, 4.0],
            vec![4.0, 7.9, 1.0],
            vec![5.0, 9.8, 2.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_covariance_values() {
        let estimator = CovarianceEstimator::<f64>::new().unwrap();
        let result = estimator.compute_in(&CpuContext::new(), &sample()).unwrap();
        assert_eq!(result.dim, 3);
        assert_relative_eq!(result.means[0], 3.0);
        assert_relative_eq!(result.get(0, 0), 2.5, epsilon = 1e-12);
        assert_relative_eq!(result.get(2, 2), 2.5, epsilon = 1e-12);
        assert_relative_eq!(result.get(0, 2), -2.0, epsilon = 1e-12);
        assert_eq!(result.get(0, 1), result.get(1, 0));
    }

    #[test]
    fn test_host_and_device_agree() {
        let estimator = CovarianceEstimator::<f64>::new().unwrap().correlation();
        let host = estimator.compute_in(&CpuContext::new(), &sample()).unwrap();

        let device = QueueContext::new("covariance").unwrap();
        let on_device = estimator.compute_in(&device, &sample()).unwrap();
        assert_eq!(device.allocated_bytes(), 0);

        for (a, b) in host.matrix.iter().zip(&on_device.matrix) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        for i in 0..3 {
            assert_relative_eq!(host.get(i, i), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_avx512_host_falls_back() {
        let estimator = CovarianceEstimator::<f32>::with_tier(CpuTier::Avx512);
        if cfg!(target_arch = "x86_64") {
            assert_eq!(estimator.unwrap().resolved_tier(), CpuTier::Avx2);
        } else {
            assert!(estimator.unwrap().resolved_tier() < CpuTier::Avx512);
        }
    }

    #[test]
    fn test_tiers_agree() {
        let host = cpu::host_tier();
        let ctx = CpuContext::new();
        let reference = CovarianceEstimator::<f64>::with_tier(CpuTier::Baseline)
            .unwrap()
            .compute_in(&ctx, &sample())
            .unwrap();
        for tier in CpuTier::ALL.into_iter().filter(|&t| host.can_run(t)) {
            let result = CovarianceEstimator::<f64>::with_tier(tier)
                .unwrap()
                .compute_in(&ctx, &sample())
                .unwrap();
            for (a, b) in result.matrix.iter().zip(&reference.matrix) {
                assert_relative_eq!(*a, *b, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_too_few_rows() {
        let one_row = DenseTable::from_rows(&[vec![1.0f64, 2.0]]).unwrap();
        let err = CovarianceEstimator::new().unwrap().compute_in(&CpuContext::new(), &one_row);
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_failed_compute_releases_buffers() {
        // Room for the 120-byte input but not the 96-byte output
        let device = QueueContext::with_capacity("tight", 150).unwrap();
        let err = CovarianceEstimator::<f64>::new()
            .unwrap()
            .compute_in(&device, &sample())
            .unwrap_err();
        assert!(matches!(err, Error::Memory(_)));
        assert_eq!(device.allocated_bytes(), 0);

        let roomy = QueueContext::with_capacity("roomy", 216).unwrap();
        assert!(CovarianceEstimator::<f64>::new().unwrap().compute_in(&roomy, &sample()).is_ok());
        assert_eq!(roomy.allocated_bytes(), 0);
    }

    #[test]
    fn test_many_on_shared_device() {
        let estimator = CovarianceEstimator::<f64>::new().unwrap();
        let device: Arc<dyn ExecutionContext> = Arc::new(QueueContext::new("shared").unwrap());
        let tables = sample().split_rows(1).into_iter().cycle().take(4).collect::<Vec<_>>();
        let results = covariance_many(&estimator, device, &tables).unwrap();
        assert_eq!(results.len(), 4);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
