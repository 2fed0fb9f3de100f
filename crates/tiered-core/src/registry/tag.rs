//! Kernel identity keys

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Storage layout of an algorithm's input data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLayout {
    /// Column-major dense table
    Dense,
    /// Compressed sparse rows
    Csr,
}

impl Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataLayout::Dense => f.write_str("dense"),
            DataLayout::Csr => f.write_str("csr"),
        }
    }
}

/// How an algorithm consumes its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeMode {
    /// All data at once
    Batch,
    /// Block by block, with state carried between calls
    Online,
    /// One step of a multi-node computation
    Distributed(u8),
}

impl Display for ComputeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeMode::Batch => f.write_str("batch"),
            ComputeMode::Online => f.write_str("online"),
            ComputeMode::Distributed(step) => write!(f, "distributed-step{step}"),
        }
    }
}

/// Identifies an algorithm, method, layout and mode combination
///
/// Tags are plain constants, usually declared as
/// [`Algorithm::TAG`](crate::registry::Algorithm::TAG). Displayed as
/// `algorithm/method/layout`, with a `/mode` suffix for non-batch modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlgorithmTag {
    pub algorithm: &'static str,
    pub method: &'static str,
    pub layout: DataLayout,
    pub mode: ComputeMode,
}

impl AlgorithmTag {
    /// A batch-mode tag
    pub const fn new(algorithm: &'static str, method: &'static str, layout: DataLayout) -> Self {
        Self {
            algorithm,
            method,
            layout,
            mode: ComputeMode::Batch,
        }
    }

    pub const fn with_mode(self, mode: ComputeMode) -> Self {
        Self { mode, ..self }
    }
}

impl Display for AlgorithmTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.algorithm, self.method, self.layout)?;
        if self.mode != ComputeMode::Batch {
            write!(f, "/{}", self.mode)?;
        }
        Ok(())
    }
}
