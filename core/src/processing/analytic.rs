use crate::math::{AnalyticTransform, StatsHelper};
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};
use num_complex::Complex64;

/// Private working buffers for one analytic-signal task. Sized once at
/// engine construction and reused for every frame pair.
pub struct AnalyticScratch {
    transform: AnalyticTransform,
    samples: Vec<f64>,
    input: Vec<f64>,
}

impl AnalyticScratch {
    pub fn new(depth: usize) -> Self {
        Self {
            transform: AnalyticTransform::new(depth),
            samples: vec![0.0; depth],
            input: vec![0.0; depth],
        }
    }
}

/// Converts the rows `[begin, begin + chunk)` of both raw frames into
/// analytic signals. `out1`/`out2` are the matching row ranges of the two
/// persistent analytic fields; writes from concurrent tasks therefore touch
/// disjoint memory.
pub fn transform_rows(
    raw1: ArrayView2<'_, i16>,
    raw2: ArrayView2<'_, i16>,
    mut out1: ArrayViewMut2<'_, Complex64>,
    mut out2: ArrayViewMut2<'_, Complex64>,
    begin: usize,
    defects: usize,
    scratch: &mut AnalyticScratch,
) {
    for local in 0..out1.nrows() {
        let beam = begin + local;
        transform_beam(raw1.row(beam), out1.row_mut(local), defects, scratch);
        transform_beam(raw2.row(beam), out2.row_mut(local), defects, scratch);
    }
}

/// Mean removal over the valid depth range followed by the analytic
/// transform. The near-field band enters the transform as explicit zeros,
/// which equals mean-fill after mean removal.
fn transform_beam(
    raw: ArrayView1<'_, i16>,
    mut out: ArrayViewMut1<'_, Complex64>,
    defects: usize,
    scratch: &mut AnalyticScratch,
) {
    for (slot, &sample) in scratch.samples.iter_mut().zip(raw.iter()) {
        *slot = f64::from(sample);
    }
    let mean = StatsHelper::mean(&scratch.samples[defects..]);
    for (j, slot) in scratch.input.iter_mut().enumerate() {
        *slot = if j < defects {
            0.0
        } else {
            scratch.samples[j] - mean
        };
    }

    let analytic = scratch.transform.analytic(&scratch.input);
    for (dst, &value) in out.iter_mut().zip(analytic) {
        *dst = value;
    }
}
