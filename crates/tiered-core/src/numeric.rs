//! Floating-point types kernels are specialized for
//!
//! Every kernel entry is keyed by a [`FloatType`]. The [`KernelFloat`] trait
//! ties a Rust type to its runtime key so that registration and lookup can
//! never disagree about which float a kernel was compiled for.

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};
use std::iter::Sum;

/// Runtime key for the floating-point type of a kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FloatType {
    F32,
    F64,
}

impl FloatType {
    /// Size of one element in bytes
    pub const fn size_of(self) -> usize {
        match self {
            FloatType::F32 => 4,
            FloatType::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FloatType::F32 => "f32",
            FloatType::F64 => "f64",
        }
    }
}

impl Display for FloatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Floating-point element type a kernel can be instantiated for
///
/// `Pod` allows buffers to move between host slices and context-owned
/// byte storage without copies through intermediate types.
pub trait KernelFloat:
    Float + FromPrimitive + Pod + Sum + Default + Debug + Display + Send + Sync + 'static
{
    /// The runtime key of this type
    const FLOAT_TYPE: FloatType;
}

impl KernelFloat for f32 {
    const FLOAT_TYPE: FloatType = FloatType::F32;
}

impl KernelFloat for f64 {
    const FLOAT_TYPE: FloatType = FloatType::F64;
}
