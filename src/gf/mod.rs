//! GF(2^8) arithmetic kernel.
//!
//! Owns the process-wide `EXP`/`LOG`/`MUL`/`DIV` tables and the
//! runtime-dispatched SIMD primitives the matrix layer and RS codec build
//! on. Mirrors the teacher's `once_cell`-backed static table plus
//! `SimdLevel` dispatch (`spdk::SimdLevel`), generalized to pure-Rust
//! split-nibble shuffle kernels instead of an ISA-L FFI call.

mod simd;
mod tables;

pub use simd::SimdLevel;
pub use tables::{tables, GfTables};

use std::sync::OnceLock;

/// Handle to the process-wide GF(2^8) arithmetic kernel.
///
/// Cheap to construct (it's a handle over a lazily-initialized static);
/// callers are expected to keep one around (e.g. embedded in `RsCodec`)
/// rather than re-detecting the SIMD level on every call.
#[derive(Debug, Clone, Copy)]
pub struct GaloisField {
    level: SimdLevel,
}

static DETECTED_LEVEL: OnceLock<SimdLevel> = OnceLock::new();

impl GaloisField {
    /// Builds a handle using the best SIMD level available on this CPU,
    /// detected once per process.
    pub fn new() -> Self {
        let level = *DETECTED_LEVEL.get_or_init(SimdLevel::detect);
        Self { level }
    }

    /// Builds a handle pinned to a specific SIMD level, bypassing
    /// detection. Used by tests to exercise every kernel on one machine.
    pub fn with_level(level: SimdLevel) -> Self {
        Self { level }
    }

    /// The SIMD level this handle dispatches to.
    pub fn level(&self) -> SimdLevel {
        self.level
    }

    /// Scalar multiply of two field elements.
    #[inline]
    pub fn mul_byte(&self, a: u8, b: u8) -> u8 {
        tables().mul_byte(a, b)
    }

    /// Scalar divide of two field elements (`b != 0`).
    #[inline]
    pub fn div_byte(&self, a: u8, b: u8) -> u8 {
        tables().div_byte(a, b)
    }

    /// Multiplicative inverse of a nonzero field element.
    #[inline]
    pub fn inv_byte(&self, a: u8) -> u8 {
        tables().inv_byte(a)
    }

    /// `dst[i] = c * src[i]` for every `i`.
    pub fn mul(&self, dst: &mut [u8], src: &[u8], c: u8) {
        simd::mul(dst, src, c, self.level);
    }

    /// `dst[i] ^= c * src[i]` for every `i`.
    pub fn mul_add(&self, dst: &mut [u8], src: &[u8], c: u8) {
        simd::mul_add(dst, src, c, self.level);
    }

    /// `dst[i] ^= src[i]` for every `i`.
    pub fn add(&self, dst: &mut [u8], src: &[u8]) {
        simd::add(dst, src);
    }
}

impl Default for GaloisField {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a `GaloisField` handle at the best SIMD level detected for
/// this process. Detection runs once; subsequent calls are a cheap
/// `OnceLock` read.
pub fn gf() -> GaloisField {
    GaloisField::new()
}
