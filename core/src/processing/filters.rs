use crate::prelude::Field;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Smoothing and differentiation parameters for the post-engine chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub cutoff_hz: f64,
    pub sample_rate_hz: f64,
    pub diff_half_len: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            cutoff_hz: 15.0,
            sample_rate_hz: 1000.0,
            diff_half_len: 5,
        }
    }
}

impl FilterParams {
    /// One-pole RC low-pass coefficient for the configured cutoff.
    pub fn alpha(&self) -> f64 {
        let rc = 1.0 / (2.0 * PI * self.cutoff_hz);
        let dt = 1.0 / self.sample_rate_hz;
        dt / (rc + dt)
    }
}

/// In-place spatial filter over a displacement field.
pub trait FieldFilter {
    fn apply(&self, field: &mut Field);
}

/// Median-of-three despike along the axial direction. Boundary samples are
/// left unmodified.
pub struct MedianDespike;

impl FieldFilter for MedianDespike {
    fn apply(&self, field: &mut Field) {
        let (beams, depth) = field.dim();
        if depth < 3 {
            return;
        }
        for i in 0..beams {
            for j in 1..depth - 1 {
                field[[i, j]] = median3(field[[i, j - 1]], field[[i, j]], field[[i, j + 1]]);
            }
        }
    }
}

fn median3(a: f64, b: f64, c: f64) -> f64 {
    a.max(b).min(a.min(b).max(c))
}

/// Causal one-pole low-pass run along each beam with increasing depth.
pub struct AxialLowPass {
    alpha: f64,
}

impl AxialLowPass {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl FieldFilter for AxialLowPass {
    fn apply(&self, field: &mut Field) {
        let (beams, depth) = field.dim();
        for i in 0..beams {
            for j in 1..depth {
                let previous = field[[i, j - 1]];
                field[[i, j]] = previous + self.alpha * (field[[i, j]] - previous);
            }
        }
    }
}

/// The same recurrence run across beams for each fixed depth index.
pub struct LateralLowPass {
    alpha: f64,
}

impl LateralLowPass {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl FieldFilter for LateralLowPass {
    fn apply(&self, field: &mut Field) {
        let (beams, depth) = field.dim();
        for j in 0..depth {
            for i in 1..beams {
                let previous = field[[i - 1, j]];
                field[[i, j]] = previous + self.alpha * (field[[i, j]] - previous);
            }
        }
    }
}

/// Centered finite-difference differentiator that turns displacement into
/// strain by accumulation.
pub struct StrainDifferentiator {
    half_len: usize,
    weight: f64,
}

impl StrainDifferentiator {
    pub fn new(params: &FilterParams) -> Self {
        let half_len = params.diff_half_len.max(1);
        Self {
            half_len,
            weight: 1.0 / (half_len * (half_len + 1)) as f64,
        }
    }

    /// Adds the axial derivative estimate into `strain`. Indices without a
    /// full symmetric neighborhood keep their accumulated value, and the
    /// displacement field is read untouched, so repeated calls accumulate
    /// additively.
    pub fn accumulate(&self, displacement: &Field, strain: &mut Field) {
        debug_assert_eq!(displacement.dim(), strain.dim());
        let (beams, depth) = displacement.dim();
        if depth < 2 * self.half_len + 1 {
            return;
        }
        for i in 0..beams {
            for j in self.half_len..depth - self.half_len {
                let mut derivative = 0.0;
                for k in 1..=self.half_len {
                    derivative +=
                        self.weight * (displacement[[i, j + k]] - displacement[[i, j - k]]);
                }
                strain[[i, j]] += derivative;
            }
        }
    }
}

/// Sequential post-engine chain: despike, axial and lateral smoothing, then
/// strain accumulation.
pub struct FilterChain {
    despike: MedianDespike,
    axial: AxialLowPass,
    lateral: LateralLowPass,
    differentiator: StrainDifferentiator,
}

impl FilterChain {
    pub fn new(params: &FilterParams) -> Self {
        let alpha = params.alpha();
        Self {
            despike: MedianDespike,
            axial: AxialLowPass::new(alpha),
            lateral: LateralLowPass::new(alpha),
            differentiator: StrainDifferentiator::new(params),
        }
    }

    pub fn run(&self, displacement: &mut Field, strain: &mut Field) {
        self.despike.apply(displacement);
        self.axial.apply(displacement);
        self.lateral.apply(displacement);
        self.differentiator.accumulate(displacement, strain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn median3_is_the_statistical_median() {
        let values = [0.0, 1.0, 2.0];
        for &a in &values {
            for &b in &values {
                for &c in &values {
                    let mut sorted = [a, b, c];
                    sorted.sort_by(|x, y| x.partial_cmp(y).unwrap());
                    assert_eq!(
                        median3(a, b, c),
                        sorted[1],
                        "median of ({}, {}, {})",
                        a,
                        b,
                        c
                    );
                }
            }
        }
    }

    #[test]
    fn despike_removes_isolated_outlier() {
        let mut field = Array2::from_shape_vec((1, 5), vec![1.0, 1.0, 50.0, 1.0, 1.0]).unwrap();
        MedianDespike.apply(&mut field);
        for value in field.iter() {
            assert_eq!(*value, 1.0);
        }
    }

    #[test]
    fn despike_leaves_short_rows_alone() {
        let mut field = Array2::from_shape_vec((1, 2), vec![5.0, -5.0]).unwrap();
        MedianDespike.apply(&mut field);
        assert_eq!(field[[0, 0]], 5.0);
        assert_eq!(field[[0, 1]], -5.0);
    }

    #[test]
    fn axial_smoother_preserves_constant_rows() {
        let params = FilterParams::default();
        let mut field = Array2::from_elem((3, 16), 3.7);
        AxialLowPass::new(params.alpha()).apply(&mut field);
        for value in field.iter() {
            assert_eq!(*value, 3.7);
        }
    }

    #[test]
    fn lateral_smoother_preserves_constant_columns() {
        let params = FilterParams::default();
        let mut field = Array2::from_elem((8, 4), -1.25);
        LateralLowPass::new(params.alpha()).apply(&mut field);
        for value in field.iter() {
            assert_eq!(*value, -1.25);
        }
    }

    #[test]
    fn smoother_coefficient_stays_in_unit_range() {
        let alpha = FilterParams::default().alpha();
        assert!(alpha > 0.0 && alpha < 1.0);
    }

    #[test]
    fn differentiator_of_linear_ramp_is_unit_slope() {
        // For v[j] = j the weighted sum telescopes to
        // w * 2 * (1 + ... + L) = w * L * (L + 1) = 1.
        let params = FilterParams::default();
        let differentiator = StrainDifferentiator::new(&params);
        let displacement = Array2::from_shape_fn((2, 32), |(_, j)| j as f64);
        let mut strain = Array2::zeros((2, 32));

        differentiator.accumulate(&displacement, &mut strain);

        for i in 0..2 {
            for j in 5..27 {
                assert!((strain[[i, j]] - 1.0).abs() < 1e-12);
            }
            assert_eq!(strain[[i, 0]], 0.0);
            assert_eq!(strain[[i, 31]], 0.0);
        }
    }

    #[test]
    fn differentiator_accumulates_across_calls() {
        let params = FilterParams::default();
        let differentiator = StrainDifferentiator::new(&params);
        let displacement = Array2::from_shape_fn((3, 24), |(i, j)| (i as f64) - 0.1 * j as f64);
        let mut once = Array2::zeros((3, 24));
        let mut twice = Array2::zeros((3, 24));

        differentiator.accumulate(&displacement, &mut once);
        differentiator.accumulate(&displacement, &mut twice);
        differentiator.accumulate(&displacement, &mut twice);

        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((b - 2.0 * a).abs() < 1e-12);
        }
    }

    #[test]
    fn chain_maps_constant_displacement_to_zero_strain() {
        let chain = FilterChain::new(&FilterParams::default());
        let mut displacement = Array2::from_elem((4, 32), 0.42);
        let mut strain = Array2::zeros((4, 32));

        chain.run(&mut displacement, &mut strain);

        for value in strain.iter() {
            assert_eq!(*value, 0.0);
        }
    }

    #[test]
    fn short_depth_fields_pass_through_untouched() {
        let params = FilterParams::default();
        let differentiator = StrainDifferentiator::new(&params);
        let displacement = Array2::from_elem((2, 8), 1.0);
        let mut strain = Array2::from_elem((2, 8), 0.5);
        differentiator.accumulate(&displacement, &mut strain);
        for value in strain.iter() {
            assert_eq!(*value, 0.5);
        }
    }
}
