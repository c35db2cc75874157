//! Interpolation helpers:
//! - lerp (scalar linear blend)
//! - find_segment (bracketing keyframe lookup over sorted, unique times)

/// Linear interpolation of scalars.
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Find the segment `[i, i + 1]` that contains `t` and return `(i, i + 1, local_t)`,
/// where `local_t` is normalized to `[0, 1]` between `times[i] .. times[i + 1]`.
///
/// Edge cases:
/// - If `t <= times[0]` (or there is a single time), returns `(0, 0, 0)`.
/// - If `t >= times[last]`, returns `(last, last, 0)`.
///
/// `times` must be sorted ascending without duplicates.
pub fn find_segment(times: &[f64], t: f64) -> (usize, usize, f64) {
    let n = times.len();
    if n <= 1 || t <= times[0] {
        return (0, 0, 0.0);
    }
    if t >= times[n - 1] {
        return (n - 1, n - 1, 0.0);
    }
    // times[0] < t < times[n - 1], so 1 <= i1 <= n - 1.
    let i1 = times.partition_point(|&x| x <= t);
    let i0 = i1 - 1;
    let (t0, t1) = (times[i0], times[i1]);
    let lt = (t - t0) / (t1 - t0);
    (i0, i1, lt.clamp(0.0, 1.0))
}
