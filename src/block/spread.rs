//! Round-robin interleave of a payload into `k` SIMD-friendly shard
//! lanes, 16 bytes at a time.
//!
//! Uses unaligned 128-bit SIMD loads/stores on x86_64
//! (`_mm_loadu_si128`/`_mm_storeu_si128`), with a scalar fallback for
//! other targets and a debug-only precondition check rather than a
//! silent truncation when the payload isn't a `16 * k`-byte multiple.

const LANE: usize = 16;

/// Splits `payload` into `16`-byte groups and hands group `i` to lane
/// `i % k`, preserving intra-group byte order. `payload.len()` must be a
/// multiple of `16 * k`.
pub fn spread(payload: &[u8], k: usize) -> Vec<Vec<u8>> {
    assert!(k > 0, "k must be > 0");
    assert_eq!(
        payload.len() % (LANE * k),
        0,
        "payload length {} is not a multiple of 16*k ({})",
        payload.len(),
        LANE * k
    );
    let groups = payload.len() / LANE;
    let lane_len = (groups / k) * LANE;
    let mut lanes: Vec<Vec<u8>> = (0..k).map(|_| Vec::with_capacity(lane_len)).collect();

    for g in 0..groups {
        let src = &payload[g * LANE..(g + 1) * LANE];
        let lane = &mut lanes[g % k];
        let start = lane.len();
        lane.resize(start + LANE, 0);
        copy_16(&mut lane[start..start + LANE], src);
    }
    lanes
}

/// Inverse of [`spread`]: reassembles the original payload from `k`
/// equal-length lanes.
pub fn unspread(lanes: &[Vec<u8>]) -> Vec<u8> {
    let k = lanes.len();
    assert!(k > 0, "need at least one lane");
    let lane_len = lanes[0].len();
    for lane in lanes {
        assert_eq!(lane.len(), lane_len, "all lanes must be equal length");
        assert_eq!(lane_len % LANE, 0, "lane length must be a multiple of 16");
    }

    let groups_per_lane = lane_len / LANE;
    let total_groups = groups_per_lane * k;
    let mut out = vec![0u8; total_groups * LANE];

    for g in 0..total_groups {
        let lane_idx = g % k;
        let slot = g / k;
        let src = &lanes[lane_idx][slot * LANE..(slot + 1) * LANE];
        copy_16(&mut out[g * LANE..(g + 1) * LANE], src);
    }
    out
}

#[cfg(target_arch = "x86_64")]
fn copy_16(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), LANE);
    debug_assert_eq!(src.len(), LANE);
    unsafe {
        use std::arch::x86_64::{_mm_loadu_si128, _mm_storeu_si128};
        let v = _mm_loadu_si128(src.as_ptr() as *const _);
        _mm_storeu_si128(dst.as_mut_ptr() as *mut _, v);
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn copy_16(dst: &mut [u8], src: &[u8]) {
    dst.copy_from_slice(src);
}
