/// Vectorized sine/cosine evaluation: fills `sin_out` and `cos_out` from
/// the angles in `angles`.
///
/// The Matsubara transform evaluates large batches of trigonometric
/// functions; the routine doing so is injected as a function reference at
/// construction so a platform-tuned vector-math implementation can be
/// swapped in without touching the core.
pub type SinCosFn = fn(&[f64], &mut [f64], &mut [f64]);

/// Portable fallback that evaluates one angle at a time.
pub fn sincos_scalar(angles: &[f64], sin_out: &mut [f64], cos_out: &mut [f64]) {
    debug_assert_eq!(angles.len(), sin_out.len());
    debug_assert_eq!(angles.len(), cos_out.len());
    for (i, angle) in angles.iter().enumerate() {
        let (s, c) = angle.sin_cos();
        sin_out[i] = s;
        cos_out[i] = c;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_scalar_sin_cos() {
        let angles: Vec<f64> = (0..100).map(|k| 0.17 * k as f64 - 5.0).collect();
        let mut sines = vec![0.0; angles.len()];
        let mut cosines = vec![0.0; angles.len()];
        sincos_scalar(&angles, &mut sines, &mut cosines);
        for (k, angle) in angles.iter().enumerate() {
            assert_eq!(sines[k], angle.sin());
            assert_eq!(cosines[k], angle.cos());
        }
    }
}
