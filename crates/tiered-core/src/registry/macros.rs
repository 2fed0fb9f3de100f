//! The static kernel manifest macro

/// Register a kernel for every listed float type and CPU tier
///
/// `kernel` must be a function in scope, generic as
/// `kernel::<F, Backend>`, with the [`KernelFn`](crate::registry::KernelFn)
/// signature of `Algorithm`. Each tier name is bound to its backend:
///
/// | tier       | backend         | compiled on          |
/// |------------|-----------------|----------------------|
/// | `baseline` | `ScalarBackend` | every target         |
/// | `sse42`    | `SseBackend`    | `x86`, `x86_64`      |
/// | `avx2`     | `Avx2Backend`   | `x86_64`             |
/// | `avx512`   | `Avx512Backend` | `x86_64`             |
/// | `sve`      | `SveBackend`    | `aarch64`            |
///
/// Tiers that do not exist for the target are skipped, so one manifest
/// serves every platform. Evaluates to `Result<()>`; the first duplicate
/// registration aborts the manifest.
///
/// ```rust,ignore
/// register_kernels!(&mut builder, Covariance => covariance_kernel,
///     floats: [f32, f64],
///     tiers: [baseline, sse42, avx2, sve],
///     targets: [HOST, DEVICE],
/// )?;
/// ```
#[macro_export]
macro_rules! register_kernels {
    (
        $builder:expr, $alg:ty => $kernel:ident,
        floats: [$($float:ty),+ $(,)?],
        tiers: $tiers:tt,
        targets: [$($target:ident),+ $(,)?] $(,)?
    ) => {{
        let builder: &mut $crate::registry::RegistryBuilder = $builder;
        let targets = $crate::registry::ContextTargets::empty()
            $(| $crate::registry::ContextTargets::$target)+;
        (|| -> $crate::Result<()> {
            $(
                $crate::register_kernels!(@float builder, targets, $alg, $kernel, $float, $tiers);
            )+
            Ok(())
        })()
    }};

    (@float $b:ident, $t:ident, $alg:ty, $kernel:ident, $float:ty, [$($tier:ident),+ $(,)?]) => {
        $(
            $crate::register_kernels!(@tier $b, $t, $alg, $kernel, $float, $tier);
        )+
    };

    (@tier $b:ident, $t:ident, $alg:ty, $kernel:ident, $float:ty, baseline) => {
        $crate::register_kernels!(@entry $b, $t, $alg, $kernel, $float,
            Baseline, ScalarBackend, "baseline");
    };
    (@tier $b:ident, $t:ident, $alg:ty, $kernel:ident, $float:ty, sse42) => {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        $crate::register_kernels!(@entry $b, $t, $alg, $kernel, $float,
            Sse42, SseBackend, "sse42");
    };
    (@tier $b:ident, $t:ident, $alg:ty, $kernel:ident, $float:ty, avx2) => {
        #[cfg(target_arch = "x86_64")]
        $crate::register_kernels!(@entry $b, $t, $alg, $kernel, $float,
            Avx2, Avx2Backend, "avx2");
    };
    (@tier $b:ident, $t:ident, $alg:ty, $kernel:ident, $float:ty, avx512) => {
        #[cfg(target_arch = "x86_64")]
        $crate::register_kernels!(@entry $b, $t, $alg, $kernel, $float,
            Avx512, Avx512Backend, "avx512");
    };
    (@tier $b:ident, $t:ident, $alg:ty, $kernel:ident, $float:ty, sve) => {
        #[cfg(target_arch = "aarch64")]
        $crate::register_kernels!(@entry $b, $t, $alg, $kernel, $float,
            Sve, SveBackend, "sve");
    };

    (@entry $b:ident, $t:ident, $alg:ty, $kernel:ident, $float:ty,
        $tier:ident, $backend:ident, $tier_name:literal) => {
        $b.register($crate::registry::KernelEntry::<$alg, $float>::new(
            $crate::cpu::CpuTier::$tier,
            concat!(stringify!($kernel), "<", stringify!($float), ", ", $tier_name, ">"),
            $t,
            $kernel::<$float, $crate::primitives::backends::$backend>,
        ))?;
    };
}
