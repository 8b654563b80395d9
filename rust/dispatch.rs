//! CPU capability detection and dispatch-table resolution.
//!
//! The host is probed once, on first use, into a bitmask of [`cap`] flags. Each vector
//! primitive then owns an ordered list of `(implementation, required capabilities)` pairs,
//! most capable first; the first entry whose requirements are a subset of the host mask is
//! installed for the rest of the process. Later calls go straight through the stored
//! function pointer.
//!
//! ```rust
//! use thtensor::{cap, capabilities};
//!
//! let caps = capabilities::available();
//! assert!(caps & cap::SERIAL != 0);
//! if caps & cap::AVX != 0 {
//!     println!("256-bit kernels are available");
//! }
//! ```

use std::sync::OnceLock;

use crate::scalars::{f16, Numeric};
use crate::vector::{Selection, VectorTable};

// region: Capabilities

/// Capability bit masks.
pub mod cap {
    pub const SERIAL: u64 = 1 << 0; // Always: portable unrolled loops
    pub const SSE: u64 = 1 << 1; // x86 SSE2, 128-bit
    pub const AVX: u64 = 1 << 2; // x86 AVX, 256-bit floating point
    pub const AVX2: u64 = 1 << 3; // x86 AVX2, 256-bit integer
    pub const NEON: u64 = 1 << 4; // Arm Advanced SIMD, 128-bit

    /// Name of the most capable extension in `mask`.
    pub fn name(mask: u64) -> &'static str {
        if mask & AVX2 != 0 {
            "avx2"
        } else if mask & AVX != 0 {
            "avx"
        } else if mask & SSE != 0 {
            "sse"
        } else if mask & NEON != 0 {
            "neon"
        } else {
            "serial"
        }
    }
}

pub mod capabilities {
    use std::sync::OnceLock;

    use super::cap;

    /// Returns the bitmask of available CPU capabilities, probing the host on first call.
    pub fn available() -> u64 {
        static MASK: OnceLock<u64> = OnceLock::new();
        *MASK.get_or_init(detect)
    }

    /// Returns `true`: kernels are chosen at runtime rather than at compile time.
    pub fn uses_dynamic_dispatch() -> bool {
        true
    }

    #[tracing::instrument(level = "debug")]
    fn detect() -> u64 {
        let mut mask = cap::SERIAL;
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if std::arch::is_x86_feature_detected!("sse2") {
                mask |= cap::SSE;
            }
            if std::arch::is_x86_feature_detected!("avx") {
                mask |= cap::AVX;
            }
            if std::arch::is_x86_feature_detected!("avx2") {
                mask |= cap::AVX2;
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                mask |= cap::NEON;
            }
        }
        tracing::debug!(mask, best = cap::name(mask), "detected host SIMD extensions");
        mask
    }
}

// endregion: Capabilities

// region: Entries

/// Ordered implementations of one operation.
pub struct Entries<F> {
    /// Accelerated variants, most capable first, each with its required capabilities.
    pub accelerated: Vec<(F, u64)>,
    /// Portable implementation used when nothing else matches.
    pub baseline: F,
}

impl<F: Copy> Entries<F> {
    pub fn portable(baseline: F) -> Self {
        Self {
            accelerated: Vec::new(),
            baseline,
        }
    }

    /// Adds a variant at the end of the list (after every more capable one).
    pub fn then(mut self, function: F, requires: u64) -> Self {
        self.accelerated.push((function, requires));
        self
    }

    /// First entry whose requirements are all present in `mask`.
    pub fn resolve(&self, mask: u64) -> (F, u64) {
        self.accelerated
            .iter()
            .find(|(_, requires)| requires & mask == *requires)
            .copied()
            .unwrap_or((self.baseline, cap::SERIAL))
    }
}

// endregion: Entries

/// Resolves the vector tables of every kind.
///
/// Calling this is optional, tables also resolve on first use, but doing it once at
/// startup keeps the probe out of the first kernel call.
pub fn init() {
    static DONE: OnceLock<()> = OnceLock::new();
    DONE.get_or_init(|| {
        let mask = capabilities::available();
        let _ = u8::vector();
        let _ = i8::vector();
        let _ = i16::vector();
        let _ = i32::vector();
        let _ = i64::vector();
        let _ = f32::vector();
        let _ = f64::vector();
        let _ = f16::vector();
        tracing::debug!(best = cap::name(mask), "vector dispatch initialized");
    });
}

/// Capability mask each primitive of `T` was installed for.
pub fn selected<T: Numeric>() -> Selection {
    T::vector().selection()
}

/// Builds a table of `T` for an arbitrary capability mask without touching the installed one.
///
/// Extensions the host lacks are ignored.
pub fn with_capabilities<T: Numeric>(mask: u64) -> VectorTable<T> {
    VectorTable::with_capabilities(mask)
}
