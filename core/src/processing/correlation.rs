use crate::prelude::{AnalyticField, EngineConfig};
use ndarray::{Array2, ArrayViewMut2};
use num_complex::Complex64;

/// The two window buffers owned by one correlation task, selected by task
/// id so concurrent tasks never share them.
pub struct WindowPair {
    window1: Array2<Complex64>,
    window2: Array2<Complex64>,
}

impl WindowPair {
    pub fn new(lateral: usize, axial: usize) -> Self {
        Self {
            window1: Array2::zeros((lateral, axial)),
            window2: Array2::zeros((lateral, axial)),
        }
    }
}

/// Phase-based displacement estimation for the beam rows
/// `[begin, begin + chunk)`. Reads both full analytic fields, writes the
/// matching row range of the displacement field.
pub fn estimate_rows(
    field1: &AnalyticField,
    field2: &AnalyticField,
    mut out: ArrayViewMut2<'_, f64>,
    begin: usize,
    config: &EngineConfig,
    windows: &mut WindowPair,
) {
    let floor = config.near_field_defects;
    for local in 0..out.nrows() {
        let beam = begin + local;
        for m in floor..config.depth {
            extract_window(field1, beam, m, floor, &mut windows.window1);
            extract_window(field2, beam, m, floor, &mut windows.window2);

            let zero_lag = lagged_product(&windows.window1, &windows.window2, 0);
            let plus = lagged_product(&windows.window1, &windows.window2, 1);
            let minus = lagged_product(&windows.window1, &windows.window2, -1);

            let phase = zero_lag.im.atan2(zero_lag.re);
            let slope = plus.im.atan2(plus.re) - minus.im.atan2(minus.re);

            // A zero phase slope yields a non-finite estimate; downstream
            // filtering treats that as a data-quality condition.
            out[[local, m]] = phase / slope;
        }
    }
}

/// Copies an edge-clamped window centered at `(beam, sample)` out of the
/// field. The axial clamp floor keeps the near-field band out of window
/// content; lateral indices clamp to the outermost beams.
fn extract_window(
    field: &AnalyticField,
    beam: usize,
    sample: usize,
    floor: usize,
    window: &mut Array2<Complex64>,
) {
    let beams = field.nrows() as isize;
    let depth = field.ncols() as isize;
    let half_lateral = (window.nrows() / 2) as isize;
    let half_axial = (window.ncols() / 2) as isize;
    let floor = (floor as isize).min(depth - 1);

    for wj in 0..window.nrows() {
        let j = (beam as isize - half_lateral + wj as isize).clamp(0, beams - 1) as usize;
        for wk in 0..window.ncols() {
            let k = (sample as isize - half_axial + wk as isize).clamp(floor, depth - 1) as usize;
            window[[wj, wk]] = field[[j, k]];
        }
    }
}

/// Complex correlation of the two windows with an integer lag applied to
/// the second window's axial index; lagged indices clamp to the window
/// edge.
fn lagged_product(window1: &Array2<Complex64>, window2: &Array2<Complex64>, lag: isize) -> Complex64 {
    let axial = window1.ncols() as isize;
    let mut acc = Complex64::new(0.0, 0.0);
    for j in 0..window1.nrows() {
        for k in 0..window1.ncols() {
            let shifted = (k as isize + lag).clamp(0, axial - 1) as usize;
            acc += window1[[j, k]] * window2[[j, shifted]].conj();
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::f64::consts::PI;

    fn phase_ramp(beams: usize, depth: usize, omega: f64, delay: f64) -> AnalyticField {
        Array2::from_shape_fn((beams, depth), |(_, k)| {
            Complex64::from_polar(1.0, omega * (k as f64 - delay))
        })
    }

    #[test]
    fn corner_window_only_contains_valid_elements() {
        let field = Array2::from_shape_fn((4, 6), |(j, k)| Complex64::new((j * 100 + k) as f64, 0.0));
        let mut window = Array2::zeros((4, 4));
        let floor = 2;

        extract_window(&field, 0, floor, floor, &mut window);

        for value in window.iter() {
            assert!(
                field.iter().any(|v| v == value),
                "window element {} not present in the source field",
                value.re
            );
        }
        // Both axes clamp: lateral to beam 0, axial to the floor index.
        assert_eq!(window[[0, 0]], field[[0, floor]]);
        assert_eq!(window[[3, 3]], field[[1, floor + 1]]);
    }

    #[test]
    fn axial_floor_excludes_near_field_band() {
        let field = Array2::from_shape_fn((2, 8), |(_, k)| Complex64::new(k as f64, 0.0));
        let mut window = Array2::zeros((2, 4));
        extract_window(&field, 0, 3, 3, &mut window);
        for value in window.iter() {
            assert!(value.re >= 3.0);
        }
    }

    #[test]
    fn uniform_delay_yields_uniform_phase_ratio() {
        // Analytic phase ramps with a constant delay d give
        // theta(0) = omega * d, while the in-window clamp pins the edge
        // term of the lagged sums at zero lag:
        //   C(+-1) = (W - 1) * exp(i*omega*(d -+ 1)) + exp(i*omega*d),
        // so the slope is -2 * arg((W - 1) * e^{i*omega} + 1) and the
        // estimate is uniform over interior coordinates.
        let omega = PI / 6.0;
        let delay = 0.8;
        let config = EngineConfig {
            beams: 6,
            depth: 16,
            window_lateral: 2,
            window_axial: 4,
            near_field_defects: 0,
        };
        let field1 = phase_ramp(config.beams, config.depth, omega, 0.0);
        let field2 = phase_ramp(config.beams, config.depth, omega, delay);
        let mut out = Array2::zeros((config.beams, config.depth));
        let mut windows = WindowPair::new(config.window_lateral, config.window_axial);

        estimate_rows(&field1, &field2, out.view_mut(), 0, &config, &mut windows);

        let edge = config.window_axial as f64 - 1.0;
        let phi = (edge * omega.sin()).atan2(edge * omega.cos() + 1.0);
        let expected = -omega * delay / (2.0 * phi);
        for n in 0..config.beams {
            for m in 2..=14 {
                assert!(
                    (out[[n, m]] - expected).abs() < 1e-9,
                    "estimate at ({}, {}) was {}, expected {}",
                    n,
                    m,
                    out[[n, m]],
                    expected
                );
            }
        }
        assert!(expected < 0.0);
    }

    #[test]
    fn identical_fields_estimate_zero_shift() {
        let config = EngineConfig {
            beams: 4,
            depth: 12,
            window_lateral: 2,
            window_axial: 4,
            near_field_defects: 0,
        };
        let field = phase_ramp(config.beams, config.depth, PI / 5.0, 0.0);
        let mut out = Array2::zeros((config.beams, config.depth));
        let mut windows = WindowPair::new(config.window_lateral, config.window_axial);

        estimate_rows(&field, &field, out.view_mut(), 0, &config, &mut windows);

        for m in 3..=9 {
            assert!(out[[1, m]].abs() < 1e-9);
        }
    }
}
