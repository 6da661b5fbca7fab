//! Target descriptors.
//!
//! A [`Target`] tells composite schedules which recipe family to use and the
//! limits that shape it: maximum threads per block, SIMD width and the
//! storage scopes the backend can allocate.

use bon::bon;
use strata_ir::MemoryScope;

/// Hardware architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Arch {
    X86,
    NvGpu,
}

/// Backend capabilities the scheduler consults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub arch: Arch,

    /// Maximum number of threads per block.
    ///
    /// Used by the GPU injective and reduction schedules to size thread
    /// extents. Irrelevant on CPU targets.
    pub max_num_threads: i64,

    /// SIMD register width in bits.
    ///
    /// CPU schedules derive the vector factor of a loop from this and the
    /// element width.
    pub vector_bits: usize,

    /// Storage scopes the backend can allocate.
    pub scopes: Vec<MemoryScope>,
}

#[bon]
impl Target {
    #[builder]
    pub fn builder(
        arch: Arch,
        #[builder(default = 1024)] max_num_threads: i64,
        #[builder(default = 512)] vector_bits: usize,
        #[builder(default = vec![MemoryScope::Global, MemoryScope::Local])] scopes: Vec<MemoryScope>,
    ) -> Self {
        Self { arch, max_num_threads, vector_bits, scopes }
    }

    /// x86 CPU with AVX-512.
    pub fn x86() -> Self {
        Self::builder().arch(Arch::X86).build()
    }

    /// NVIDIA GPU: 1024 threads per block, shared and local memory.
    pub fn cuda() -> Self {
        Self::builder()
            .arch(Arch::NvGpu)
            .vector_bits(128)
            .scopes(vec![MemoryScope::Global, MemoryScope::Shared, MemoryScope::Local])
            .build()
    }

    /// Target from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `STRATA_TARGET` - `x86` or `nvgpu` (default: `x86`)
    /// * `STRATA_MAX_THREADS` - Override the thread limit per block
    pub fn from_env() -> Self {
        let arch = std::env::var("STRATA_TARGET").ok().and_then(|s| s.parse().ok()).unwrap_or(Arch::X86);
        let mut target = match arch {
            Arch::X86 => Self::x86(),
            Arch::NvGpu => Self::cuda(),
        };
        if let Ok(threads) = std::env::var("STRATA_MAX_THREADS")
            && let Ok(threads) = threads.parse::<i64>()
            && threads > 0
        {
            target.max_num_threads = threads;
        }
        target
    }

    pub fn is_gpu(&self) -> bool {
        self.arch == Arch::NvGpu
    }

    pub fn supports_scope(&self, scope: MemoryScope) -> bool {
        self.scopes.contains(&scope)
    }
}
