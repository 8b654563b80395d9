//! Fixed-length vector primitives and their per-kind dispatch tables.
//!
//! Every kind gets the same nine operations over flat buffers of `n` elements:
//!
//! - `fill(x, c)`: `x[i] = c`
//! - `copy(y, x)`: `y[i] = x[i]`
//! - `adds(y, x, c)`: `y[i] = x[i] + c`
//! - `add(y, x, c)`: scaled accumulate, `y[i] = y[i] + c * x[i]`
//! - `cadd(z, x, y, c)`: `z[i] = x[i] + c * y[i]`
//! - `mul(y, x, c)` / `div(y, x, c)`: `y[i] = x[i] * c`, `y[i] = x[i] / c`
//! - `cmul(z, x, y)` / `cdiv(z, x, y)`: `z[i] = x[i] * y[i]`, `z[i] = x[i] / y[i]`
//!
//! The portable versions are unrolled by four. `f32` and `f64` also have SSE, AVX and NEON
//! variants, `i32` has AVX2 variants for everything but division. None of the SIMD variants
//! fuse multiply and add, so their output matches the portable loops bit for bit.
//!
//! Raw-pointer entry points accept an output buffer that either coincides exactly with an
//! input or does not overlap it at all.

use crate::dispatch::{cap, capabilities, Entries};
use crate::scalars::Numeric;

pub type FillFn<T> = unsafe fn(*mut T, T, usize);
pub type CopyFn<T> = unsafe fn(*mut T, *const T, usize);
pub type ScalarFn<T> = unsafe fn(*mut T, *const T, T, usize);
pub type BinaryFn<T> = unsafe fn(*mut T, *const T, *const T, usize);
pub type ScaledFn<T> = unsafe fn(*mut T, *const T, *const T, T, usize);

// region: Portable

/// Portable kernels, unrolled by four.
pub mod portable {
    use crate::scalars::Numeric;

    macro_rules! unroll4 {
        ($i:ident, $n:expr, $body:expr) => {
            let mut $i = 0usize;
            while $i + 4 <= $n {
                $body;
                $i += 1;
                $body;
                $i += 1;
                $body;
                $i += 1;
                $body;
                $i += 1;
            }
            while $i < $n {
                $body;
                $i += 1;
            }
        };
    }

    pub unsafe fn fill<T: Numeric>(x: *mut T, c: T, n: usize) {
        unroll4!(i, n, *x.add(i) = c);
    }

    pub unsafe fn copy<T: Numeric>(y: *mut T, x: *const T, n: usize) {
        if core::ptr::eq(y as *const T, x) {
            return;
        }
        unroll4!(i, n, *y.add(i) = *x.add(i));
    }

    pub unsafe fn adds<T: Numeric>(y: *mut T, x: *const T, c: T, n: usize) {
        unroll4!(i, n, *y.add(i) = (*x.add(i)).add(c));
    }

    pub unsafe fn add<T: Numeric>(y: *mut T, x: *const T, c: T, n: usize) {
        unroll4!(i, n, *y.add(i) = (*y.add(i)).add(c.mul(*x.add(i))));
    }

    pub unsafe fn cadd<T: Numeric>(z: *mut T, x: *const T, y: *const T, c: T, n: usize) {
        unroll4!(i, n, *z.add(i) = (*x.add(i)).add(c.mul(*y.add(i))));
    }

    pub unsafe fn mul<T: Numeric>(y: *mut T, x: *const T, c: T, n: usize) {
        unroll4!(i, n, *y.add(i) = (*x.add(i)).mul(c));
    }

    pub unsafe fn div<T: Numeric>(y: *mut T, x: *const T, c: T, n: usize) {
        unroll4!(i, n, *y.add(i) = (*x.add(i)).div(c));
    }

    pub unsafe fn cmul<T: Numeric>(z: *mut T, x: *const T, y: *const T, n: usize) {
        unroll4!(i, n, *z.add(i) = (*x.add(i)).mul(*y.add(i)));
    }

    pub unsafe fn cdiv<T: Numeric>(z: *mut T, x: *const T, y: *const T, n: usize) {
        unroll4!(i, n, *z.add(i) = (*x.add(i)).div(*y.add(i)));
    }
}

// endregion: Portable

// region: x86

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
macro_rules! x86_float_kernels {
    ($module:ident, $feature:literal, $t:ty, $lanes:expr,
     $load:ident, $store:ident, $splat:ident, $add:ident, $mul:ident, $div:ident) => {
        pub mod $module {
            #[cfg(target_arch = "x86")]
            use core::arch::x86::*;
            #[cfg(target_arch = "x86_64")]
            use core::arch::x86_64::*;

            #[target_feature(enable = $feature)]
            pub unsafe fn fill(x: *mut $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(x.add(i), vc);
                    i += $lanes;
                }
                while i < n {
                    *x.add(i) = c;
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn copy(y: *mut $t, x: *const $t, n: usize) {
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $load(x.add(i)));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn adds(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $add($load(x.add(i)), vc));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i) + c;
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn add(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    let scaled = $mul(vc, $load(x.add(i)));
                    $store(y.add(i), $add($load(y.add(i)), scaled));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *y.add(i) + c * *x.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn cadd(z: *mut $t, x: *const $t, y: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    let scaled = $mul(vc, $load(y.add(i)));
                    $store(z.add(i), $add($load(x.add(i)), scaled));
                    i += $lanes;
                }
                while i < n {
                    *z.add(i) = *x.add(i) + c * *y.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn mul(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $mul($load(x.add(i)), vc));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i) * c;
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn div(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $div($load(x.add(i)), vc));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i) / c;
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn cmul(z: *mut $t, x: *const $t, y: *const $t, n: usize) {
                let mut i = 0;
                while i + $lanes <= n {
                    $store(z.add(i), $mul($load(x.add(i)), $load(y.add(i))));
                    i += $lanes;
                }
                while i < n {
                    *z.add(i) = *x.add(i) * *y.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = $feature)]
            pub unsafe fn cdiv(z: *mut $t, x: *const $t, y: *const $t, n: usize) {
                let mut i = 0;
                while i + $lanes <= n {
                    $store(z.add(i), $div($load(x.add(i)), $load(y.add(i))));
                    i += $lanes;
                }
                while i < n {
                    *z.add(i) = *x.add(i) / *y.add(i);
                    i += 1;
                }
            }
        }
    };
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
x86_float_kernels!(sse_f32, "sse", f32, 4, _mm_loadu_ps, _mm_storeu_ps, _mm_set1_ps, _mm_add_ps, _mm_mul_ps, _mm_div_ps);
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
x86_float_kernels!(sse_f64, "sse2", f64, 2, _mm_loadu_pd, _mm_storeu_pd, _mm_set1_pd, _mm_add_pd, _mm_mul_pd, _mm_div_pd);
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
x86_float_kernels!(avx_f32, "avx", f32, 8, _mm256_loadu_ps, _mm256_storeu_ps, _mm256_set1_ps, _mm256_add_ps, _mm256_mul_ps, _mm256_div_ps);
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
x86_float_kernels!(avx_f64, "avx", f64, 4, _mm256_loadu_pd, _mm256_storeu_pd, _mm256_set1_pd, _mm256_add_pd, _mm256_mul_pd, _mm256_div_pd);

/// 256-bit integer kernels. Lanes wrap on overflow like the portable loops.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod avx2_i32 {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::*;

    const LANES: usize = 8;

    #[inline(always)]
    unsafe fn load(p: *const i32) -> __m256i {
        _mm256_loadu_si256(p as *const __m256i)
    }

    #[inline(always)]
    unsafe fn store(p: *mut i32, v: __m256i) {
        _mm256_storeu_si256(p as *mut __m256i, v)
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn fill(x: *mut i32, c: i32, n: usize) {
        let vc = _mm256_set1_epi32(c);
        let mut i = 0;
        while i + LANES <= n {
            store(x.add(i), vc);
            i += LANES;
        }
        while i < n {
            *x.add(i) = c;
            i += 1;
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn copy(y: *mut i32, x: *const i32, n: usize) {
        let mut i = 0;
        while i + LANES <= n {
            store(y.add(i), load(x.add(i)));
            i += LANES;
        }
        while i < n {
            *y.add(i) = *x.add(i);
            i += 1;
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn adds(y: *mut i32, x: *const i32, c: i32, n: usize) {
        let vc = _mm256_set1_epi32(c);
        let mut i = 0;
        while i + LANES <= n {
            store(y.add(i), _mm256_add_epi32(load(x.add(i)), vc));
            i += LANES;
        }
        while i < n {
            *y.add(i) = (*x.add(i)).wrapping_add(c);
            i += 1;
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn add(y: *mut i32, x: *const i32, c: i32, n: usize) {
        let vc = _mm256_set1_epi32(c);
        let mut i = 0;
        while i + LANES <= n {
            let scaled = _mm256_mullo_epi32(vc, load(x.add(i)));
            store(y.add(i), _mm256_add_epi32(load(y.add(i)), scaled));
            i += LANES;
        }
        while i < n {
            *y.add(i) = (*y.add(i)).wrapping_add(c.wrapping_mul(*x.add(i)));
            i += 1;
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn cadd(z: *mut i32, x: *const i32, y: *const i32, c: i32, n: usize) {
        let vc = _mm256_set1_epi32(c);
        let mut i = 0;
        while i + LANES <= n {
            let scaled = _mm256_mullo_epi32(vc, load(y.add(i)));
            store(z.add(i), _mm256_add_epi32(load(x.add(i)), scaled));
            i += LANES;
        }
        while i < n {
            *z.add(i) = (*x.add(i)).wrapping_add(c.wrapping_mul(*y.add(i)));
            i += 1;
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn mul(y: *mut i32, x: *const i32, c: i32, n: usize) {
        let vc = _mm256_set1_epi32(c);
        let mut i = 0;
        while i + LANES <= n {
            store(y.add(i), _mm256_mullo_epi32(load(x.add(i)), vc));
            i += LANES;
        }
        while i < n {
            *y.add(i) = (*x.add(i)).wrapping_mul(c);
            i += 1;
        }
    }

    #[target_feature(enable = "avx2")]
    pub unsafe fn cmul(z: *mut i32, x: *const i32, y: *const i32, n: usize) {
        let mut i = 0;
        while i + LANES <= n {
            store(z.add(i), _mm256_mullo_epi32(load(x.add(i)), load(y.add(i))));
            i += LANES;
        }
        while i < n {
            *z.add(i) = (*x.add(i)).wrapping_mul(*y.add(i));
            i += 1;
        }
    }
}

// endregion: x86

// region: NEON

#[cfg(target_arch = "aarch64")]
macro_rules! neon_float_kernels {
    ($module:ident, $t:ty, $lanes:expr,
     $load:ident, $store:ident, $splat:ident, $add:ident, $mul:ident, $div:ident) => {
        pub mod $module {
            use core::arch::aarch64::*;

            #[target_feature(enable = "neon")]
            pub unsafe fn fill(x: *mut $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(x.add(i), vc);
                    i += $lanes;
                }
                while i < n {
                    *x.add(i) = c;
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn copy(y: *mut $t, x: *const $t, n: usize) {
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $load(x.add(i)));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn adds(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $add($load(x.add(i)), vc));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i) + c;
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn add(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    let scaled = $mul(vc, $load(x.add(i)));
                    $store(y.add(i), $add($load(y.add(i)), scaled));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *y.add(i) + c * *x.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn cadd(z: *mut $t, x: *const $t, y: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    let scaled = $mul(vc, $load(y.add(i)));
                    $store(z.add(i), $add($load(x.add(i)), scaled));
                    i += $lanes;
                }
                while i < n {
                    *z.add(i) = *x.add(i) + c * *y.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn mul(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $mul($load(x.add(i)), vc));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i) * c;
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn div(y: *mut $t, x: *const $t, c: $t, n: usize) {
                let vc = $splat(c);
                let mut i = 0;
                while i + $lanes <= n {
                    $store(y.add(i), $div($load(x.add(i)), vc));
                    i += $lanes;
                }
                while i < n {
                    *y.add(i) = *x.add(i) / c;
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn cmul(z: *mut $t, x: *const $t, y: *const $t, n: usize) {
                let mut i = 0;
                while i + $lanes <= n {
                    $store(z.add(i), $mul($load(x.add(i)), $load(y.add(i))));
                    i += $lanes;
                }
                while i < n {
                    *z.add(i) = *x.add(i) * *y.add(i);
                    i += 1;
                }
            }

            #[target_feature(enable = "neon")]
            pub unsafe fn cdiv(z: *mut $t, x: *const $t, y: *const $t, n: usize) {
                let mut i = 0;
                while i + $lanes <= n {
                    $store(z.add(i), $div($load(x.add(i)), $load(y.add(i))));
                    i += $lanes;
                }
                while i < n {
                    *z.add(i) = *x.add(i) / *y.add(i);
                    i += 1;
                }
            }
        }
    };
}

#[cfg(target_arch = "aarch64")]
neon_float_kernels!(neon_f32, f32, 4, vld1q_f32, vst1q_f32, vdupq_n_f32, vaddq_f32, vmulq_f32, vdivq_f32);
#[cfg(target_arch = "aarch64")]
neon_float_kernels!(neon_f64, f64, 2, vld1q_f64, vst1q_f64, vdupq_n_f64, vaddq_f64, vmulq_f64, vdivq_f64);

// endregion: NEON

// region: Candidates

/// Dispatch lists for every primitive of one kind.
pub struct Candidates<T> {
    pub fill: Entries<FillFn<T>>,
    pub copy: Entries<CopyFn<T>>,
    pub adds: Entries<ScalarFn<T>>,
    pub add: Entries<ScalarFn<T>>,
    pub cadd: Entries<ScaledFn<T>>,
    pub mul: Entries<ScalarFn<T>>,
    pub div: Entries<ScalarFn<T>>,
    pub cmul: Entries<BinaryFn<T>>,
    pub cdiv: Entries<BinaryFn<T>>,
}

/// Only the portable loops.
pub fn portable_candidates<T: Numeric>() -> Candidates<T> {
    Candidates {
        fill: Entries::portable(portable::fill::<T> as FillFn<T>),
        copy: Entries::portable(portable::copy::<T> as CopyFn<T>),
        adds: Entries::portable(portable::adds::<T> as ScalarFn<T>),
        add: Entries::portable(portable::add::<T> as ScalarFn<T>),
        cadd: Entries::portable(portable::cadd::<T> as ScaledFn<T>),
        mul: Entries::portable(portable::mul::<T> as ScalarFn<T>),
        div: Entries::portable(portable::div::<T> as ScalarFn<T>),
        cmul: Entries::portable(portable::cmul::<T> as BinaryFn<T>),
        cdiv: Entries::portable(portable::cdiv::<T> as BinaryFn<T>),
    }
}

#[allow(unused_macros)]
macro_rules! push_float_set {
    ($candidates:ident, $module:ident, $t:ty, $requires:expr) => {
        $candidates.fill.accelerated.push(($module::fill as FillFn<$t>, $requires));
        $candidates.copy.accelerated.push(($module::copy as CopyFn<$t>, $requires));
        $candidates.adds.accelerated.push(($module::adds as ScalarFn<$t>, $requires));
        $candidates.add.accelerated.push(($module::add as ScalarFn<$t>, $requires));
        $candidates.cadd.accelerated.push(($module::cadd as ScaledFn<$t>, $requires));
        $candidates.mul.accelerated.push(($module::mul as ScalarFn<$t>, $requires));
        $candidates.div.accelerated.push(($module::div as ScalarFn<$t>, $requires));
        $candidates.cmul.accelerated.push(($module::cmul as BinaryFn<$t>, $requires));
        $candidates.cdiv.accelerated.push(($module::cdiv as BinaryFn<$t>, $requires));
    };
}

#[allow(unused_mut)]
pub fn f32_candidates() -> Candidates<f32> {
    let mut candidates = portable_candidates::<f32>();
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        push_float_set!(candidates, avx_f32, f32, cap::AVX);
        push_float_set!(candidates, sse_f32, f32, cap::SSE);
    }
    #[cfg(target_arch = "aarch64")]
    {
        push_float_set!(candidates, neon_f32, f32, cap::NEON);
    }
    candidates
}

#[allow(unused_mut)]
pub fn f64_candidates() -> Candidates<f64> {
    let mut candidates = portable_candidates::<f64>();
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        push_float_set!(candidates, avx_f64, f64, cap::AVX);
        push_float_set!(candidates, sse_f64, f64, cap::SSE);
    }
    #[cfg(target_arch = "aarch64")]
    {
        push_float_set!(candidates, neon_f64, f64, cap::NEON);
    }
    candidates
}

#[allow(unused_mut)]
pub fn i32_candidates() -> Candidates<i32> {
    let mut candidates = portable_candidates::<i32>();
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        let requires = cap::AVX | cap::AVX2;
        candidates.fill = candidates.fill.then(avx2_i32::fill, requires);
        candidates.copy = candidates.copy.then(avx2_i32::copy, requires);
        candidates.adds = candidates.adds.then(avx2_i32::adds, requires);
        candidates.add = candidates.add.then(avx2_i32::add, requires);
        candidates.cadd = candidates.cadd.then(avx2_i32::cadd, requires);
        candidates.mul = candidates.mul.then(avx2_i32::mul, requires);
        candidates.cmul = candidates.cmul.then(avx2_i32::cmul, requires);
    }
    candidates
}

// endregion: Candidates

// region: VectorTable

/// Capability mask each installed primitive was chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub fill: u64,
    pub copy: u64,
    pub adds: u64,
    pub add: u64,
    pub cadd: u64,
    pub mul: u64,
    pub div: u64,
    pub cmul: u64,
    pub cdiv: u64,
}

/// Resolved primitives for one kind.
///
/// Slice methods return `None` when buffer lengths disagree.
pub struct VectorTable<T> {
    pub(crate) fill: FillFn<T>,
    pub(crate) copy: CopyFn<T>,
    pub(crate) adds: ScalarFn<T>,
    pub(crate) add: ScalarFn<T>,
    pub(crate) cadd: ScaledFn<T>,
    pub(crate) mul: ScalarFn<T>,
    pub(crate) div: ScalarFn<T>,
    pub(crate) cmul: BinaryFn<T>,
    pub(crate) cdiv: BinaryFn<T>,
    selection: Selection,
}

impl<T: Numeric> VectorTable<T> {
    /// Walks every dispatch list once against `mask`.
    pub fn resolve(candidates: &Candidates<T>, mask: u64) -> Self {
        let (fill, fill_ext) = candidates.fill.resolve(mask);
        let (copy, copy_ext) = candidates.copy.resolve(mask);
        let (adds, adds_ext) = candidates.adds.resolve(mask);
        let (add, add_ext) = candidates.add.resolve(mask);
        let (cadd, cadd_ext) = candidates.cadd.resolve(mask);
        let (mul, mul_ext) = candidates.mul.resolve(mask);
        let (div, div_ext) = candidates.div.resolve(mask);
        let (cmul, cmul_ext) = candidates.cmul.resolve(mask);
        let (cdiv, cdiv_ext) = candidates.cdiv.resolve(mask);
        Self {
            fill,
            copy,
            adds,
            add,
            cadd,
            mul,
            div,
            cmul,
            cdiv,
            selection: Selection {
                fill: fill_ext,
                copy: copy_ext,
                adds: adds_ext,
                add: add_ext,
                cadd: cadd_ext,
                mul: mul_ext,
                div: div_ext,
                cmul: cmul_ext,
                cdiv: cdiv_ext,
            },
        }
    }

    /// Table restricted to `mask`. Extensions the host lacks are dropped from the mask.
    pub fn with_capabilities(mask: u64) -> Self {
        Self::resolve(&T::vector_candidates(), (mask & capabilities::available()) | cap::SERIAL)
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn fill(&self, x: &mut [T], c: T) {
        unsafe { (self.fill)(x.as_mut_ptr(), c, x.len()) }
    }

    pub fn copy(&self, y: &mut [T], x: &[T]) -> Option<()> {
        same_len(y.len(), x.len())?;
        unsafe { (self.copy)(y.as_mut_ptr(), x.as_ptr(), x.len()) };
        Some(())
    }

    pub fn adds(&self, y: &mut [T], x: &[T], c: T) -> Option<()> {
        same_len(y.len(), x.len())?;
        unsafe { (self.adds)(y.as_mut_ptr(), x.as_ptr(), c, x.len()) };
        Some(())
    }

    pub fn add(&self, y: &mut [T], x: &[T], c: T) -> Option<()> {
        same_len(y.len(), x.len())?;
        unsafe { (self.add)(y.as_mut_ptr(), x.as_ptr(), c, x.len()) };
        Some(())
    }

    pub fn cadd(&self, z: &mut [T], x: &[T], y: &[T], c: T) -> Option<()> {
        same_len(z.len(), x.len())?;
        same_len(z.len(), y.len())?;
        unsafe { (self.cadd)(z.as_mut_ptr(), x.as_ptr(), y.as_ptr(), c, x.len()) };
        Some(())
    }

    pub fn mul(&self, y: &mut [T], x: &[T], c: T) -> Option<()> {
        same_len(y.len(), x.len())?;
        unsafe { (self.mul)(y.as_mut_ptr(), x.as_ptr(), c, x.len()) };
        Some(())
    }

    pub fn div(&self, y: &mut [T], x: &[T], c: T) -> Option<()> {
        same_len(y.len(), x.len())?;
        unsafe { (self.div)(y.as_mut_ptr(), x.as_ptr(), c, x.len()) };
        Some(())
    }

    pub fn cmul(&self, z: &mut [T], x: &[T], y: &[T]) -> Option<()> {
        same_len(z.len(), x.len())?;
        same_len(z.len(), y.len())?;
        unsafe { (self.cmul)(z.as_mut_ptr(), x.as_ptr(), y.as_ptr(), x.len()) };
        Some(())
    }

    pub fn cdiv(&self, z: &mut [T], x: &[T], y: &[T]) -> Option<()> {
        same_len(z.len(), x.len())?;
        same_len(z.len(), y.len())?;
        unsafe { (self.cdiv)(z.as_mut_ptr(), x.as_ptr(), y.as_ptr(), x.len()) };
        Some(())
    }
}

fn same_len(a: usize, b: usize) -> Option<()> {
    (a == b).then_some(())
}

/// Resolves the table of `T` against the host, logging each choice.
pub(crate) fn select<T: Numeric>() -> VectorTable<T> {
    let table = VectorTable::resolve(&T::vector_candidates(), capabilities::available());
    let s = table.selection;
    tracing::debug!(
        kind = %T::KIND,
        fill = cap::name(s.fill),
        copy = cap::name(s.copy),
        adds = cap::name(s.adds),
        add = cap::name(s.add),
        cadd = cap::name(s.cadd),
        mul = cap::name(s.mul),
        div = cap::name(s.div),
        cmul = cap::name(s.cmul),
        cdiv = cap::name(s.cdiv),
        "installed vector kernels"
    );
    table
}

// endregion: VectorTable
