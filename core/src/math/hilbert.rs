use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// FFT-based analytic-signal transform of a fixed length.
///
/// The output's real part reconstructs the input and the imaginary part is
/// its quadrature component: the spectrum is made one-sided by keeping DC
/// and Nyquist, doubling positive frequencies, and zeroing negative ones.
/// Plans and scratch are allocated once and reused across calls.
pub struct AnalyticTransform {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
    len: usize,
}

impl AnalyticTransform {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            forward,
            inverse,
            buffer: vec![Complex64::zero(); len],
            scratch: vec![Complex64::zero(); scratch_len],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Transforms a real sequence into its analytic signal. The returned
    /// slice borrows internal scratch and is valid until the next call.
    pub fn analytic(&mut self, input: &[f64]) -> &[Complex64] {
        debug_assert_eq!(input.len(), self.len);

        for (slot, &value) in self.buffer.iter_mut().zip(input) {
            *slot = Complex64::new(value, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        // One-sided spectrum: DC (and Nyquist for even lengths) unchanged,
        // positive frequencies doubled, negative frequencies zeroed.
        let n = self.len;
        let positive_end = (n + 1) / 2;
        for (k, bin) in self.buffer.iter_mut().enumerate().skip(1) {
            if k < positive_end {
                *bin *= 2.0;
            } else if !(n % 2 == 0 && k == n / 2) {
                *bin = Complex64::zero();
            }
        }

        self.inverse
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        let scale = 1.0 / n as f64;
        for bin in &mut self.buffer {
            *bin *= scale;
        }

        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn real_part_reconstructs_input() {
        let mut transform = AnalyticTransform::new(64);
        let input: Vec<f64> = (0..64).map(|j| (j as f64 * 0.37).sin() * 3.0).collect();
        let output = transform.analytic(&input);
        for (a, &x) in output.iter().zip(&input) {
            assert!((a.re - x).abs() < 1e-9, "re {} vs input {}", a.re, x);
        }
    }

    #[test]
    fn cosine_becomes_unit_magnitude_phasor() {
        let mut transform = AnalyticTransform::new(128);
        let input: Vec<f64> = (0..128)
            .map(|j| (2.0 * PI * 8.0 * j as f64 / 128.0).cos())
            .collect();
        let output = transform.analytic(&input);
        for a in output {
            assert!((a.norm() - 1.0).abs() < 1e-9, "magnitude {}", a.norm());
        }
    }

    #[test]
    fn quadrature_of_cosine_is_sine() {
        let mut transform = AnalyticTransform::new(64);
        let input: Vec<f64> = (0..64)
            .map(|j| (2.0 * PI * 4.0 * j as f64 / 64.0).cos())
            .collect();
        let output = transform.analytic(&input);
        for (j, a) in output.iter().enumerate() {
            let expected = (2.0 * PI * 4.0 * j as f64 / 64.0).sin();
            assert!((a.im - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn odd_length_keeps_reconstruction() {
        let mut transform = AnalyticTransform::new(33);
        let input: Vec<f64> = (0..33).map(|j| (j as f64 * 0.21).cos()).collect();
        let output = transform.analytic(&input);
        for (a, &x) in output.iter().zip(&input) {
            assert!((a.re - x).abs() < 1e-9);
        }
    }

    #[test]
    fn buffers_are_reused_across_calls() {
        let mut transform = AnalyticTransform::new(16);
        let first: Vec<f64> = (0..16).map(|j| j as f64).collect();
        let second = vec![0.0; 16];
        transform.analytic(&first);
        let output = transform.analytic(&second);
        for a in output {
            assert!(a.re.abs() < 1e-12 && a.im.abs() < 1e-12);
        }
    }
}
