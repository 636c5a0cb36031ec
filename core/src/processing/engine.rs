use crate::pool::WorkerPool;
use crate::prelude::{AnalyticField, EngineConfig, EngineError, EngineResult, Field, RawFrame};
use crate::processing::analytic::{self, AnalyticScratch};
use crate::processing::correlation::{self, WindowPair};
use crate::telemetry::LogManager;
use ndarray::Axis;
use std::ops::Range;

/// Contiguous split of the beam range into equal pool pieces plus a
/// remainder handled synchronously by the dispatching thread.
#[derive(Debug, Clone, Copy)]
pub struct Partition {
    total: usize,
    pieces: usize,
    piece_len: usize,
}

impl Partition {
    pub fn new(total: usize, pieces: usize) -> Self {
        let pieces = pieces.max(1);
        Self {
            total,
            pieces,
            piece_len: total / pieces,
        }
    }

    pub fn piece_count(&self) -> usize {
        self.pieces
    }

    pub fn piece_len(&self) -> usize {
        self.piece_len
    }

    pub fn piece(&self, index: usize) -> Range<usize> {
        let begin = index * self.piece_len;
        begin..begin + self.piece_len
    }

    pub fn remainder(&self) -> Range<usize> {
        self.pieces * self.piece_len..self.total
    }

    /// Pool pieces plus the remainder slot when it is non-empty.
    pub fn task_count(&self) -> usize {
        self.pieces + usize::from(!self.remainder().is_empty())
    }
}

/// Two-stage parallel displacement estimator.
///
/// Owns the worker pool, both persistent analytic fields, and one scratch
/// slot per concurrent task; everything is sized once at construction and
/// reused for every frame pair. Each [`DisplacementEngine::estimate`] call
/// runs the analytic-signal stage and the correlation stage behind separate
/// barriers, so the correlation stage never observes a partially written
/// analytic field.
pub struct DisplacementEngine {
    // Declared first: dropping the engine joins the workers before any of
    // the buffers they may reference go away.
    pool: WorkerPool,
    config: EngineConfig,
    partition: Partition,
    field1: AnalyticField,
    field2: AnalyticField,
    analytic_scratch: Vec<AnalyticScratch>,
    window_scratch: Vec<WindowPair>,
    logger: LogManager,
}

impl DisplacementEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_pool(config, WorkerPool::new())
    }

    /// Engine over a caller-supplied pool, e.g. one with a fixed thread
    /// count.
    pub fn with_pool(config: EngineConfig, pool: WorkerPool) -> EngineResult<Self> {
        if config.beams == 0 || config.depth == 0 {
            return Err(EngineError::InvalidConfig(
                "frame dimensions must be non-zero".into(),
            ));
        }
        if config.near_field_defects >= config.depth {
            return Err(EngineError::InvalidConfig(format!(
                "near-field exclusion of {} swallows the whole depth of {}",
                config.near_field_defects, config.depth
            )));
        }
        if config.window_lateral < 2
            || config.window_axial < 2
            || config.window_lateral % 2 != 0
            || config.window_axial % 2 != 0
        {
            return Err(EngineError::InvalidConfig(
                "correlation window sizes must be even and at least 2".into(),
            ));
        }

        let partition = Partition::new(config.beams, pool.thread_count());
        let slots = partition.task_count();
        let analytic_scratch = (0..slots).map(|_| AnalyticScratch::new(config.depth)).collect();
        let window_scratch = (0..slots)
            .map(|_| WindowPair::new(config.window_lateral, config.window_axial))
            .collect();

        let logger = LogManager::new();
        logger.record(&format!(
            "displacement engine ready: {} worker threads, {} beam tasks",
            pool.thread_count(),
            slots
        ));

        Ok(Self {
            pool,
            field1: AnalyticField::zeros((config.beams, config.depth)),
            field2: AnalyticField::zeros((config.beams, config.depth)),
            analytic_scratch,
            window_scratch,
            partition,
            config,
            logger,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn thread_count(&self) -> usize {
        self.pool.thread_count()
    }

    /// Estimates the per-sample displacement between two frames, writing
    /// into the caller-owned field. Frame content is taken as valid; only
    /// dimensions are checked.
    pub fn estimate(
        &mut self,
        frame1: &RawFrame,
        frame2: &RawFrame,
        out: &mut Field,
    ) -> EngineResult<()> {
        let dims = (self.config.beams, self.config.depth);
        for (name, got) in [
            ("first frame", frame1.dim()),
            ("second frame", frame2.dim()),
            ("output field", out.dim()),
        ] {
            if got != dims {
                return Err(EngineError::InvalidInput(format!(
                    "{} is {}x{}, engine expects {}x{}",
                    name, got.0, got.1, dims.0, dims.1
                )));
            }
        }

        self.logger.record_detail(&format!(
            "displacement pass over {} beams x {} samples",
            dims.0, dims.1
        ));
        self.run_analytic_stage(frame1, frame2);
        self.run_correlation_stage(out);
        Ok(())
    }

    /// Stage one: analytic-signal conversion of both frames, parallel over
    /// beam pieces, remainder on the calling thread.
    fn run_analytic_stage(&mut self, frame1: &RawFrame, frame2: &RawFrame) {
        let partition = self.partition;
        let defects = self.config.near_field_defects;
        let piece_len = partition.piece_len();

        let (piece_scratch, tail_scratch) =
            self.analytic_scratch.split_at_mut(partition.piece_count());
        let mut rest1 = self.field1.view_mut();
        let mut rest2 = self.field2.view_mut();

        self.pool.begin_barrier(partition.piece_count());
        for (index, scratch) in piece_scratch.iter_mut().enumerate() {
            let (chunk1, tail1) = rest1.split_at(Axis(0), piece_len);
            let (chunk2, tail2) = rest2.split_at(Axis(0), piece_len);
            rest1 = tail1;
            rest2 = tail2;

            let raw1 = frame1.view();
            let raw2 = frame2.view();
            let begin = partition.piece(index).start;
            // SAFETY: `await_barrier` below returns only after every
            // dispatched task has completed, so the borrowed views and
            // scratch outlive their use on the workers.
            unsafe {
                self.pool.submit_borrowed(Box::new(move || {
                    analytic::transform_rows(raw1, raw2, chunk1, chunk2, begin, defects, scratch);
                }));
            }
        }

        let tail = partition.remainder();
        if !tail.is_empty() {
            if let Some(scratch) = tail_scratch.first_mut() {
                analytic::transform_rows(
                    frame1.view(),
                    frame2.view(),
                    rest1,
                    rest2,
                    tail.start,
                    defects,
                    scratch,
                );
            }
        }
        self.pool.await_barrier();
    }

    /// Stage two: windowed correlation over both fully populated analytic
    /// fields, parallel over the same beam pieces.
    fn run_correlation_stage(&mut self, out: &mut Field) {
        let partition = self.partition;
        let piece_len = partition.piece_len();
        let config = &self.config;
        let field1 = &self.field1;
        let field2 = &self.field2;

        let (piece_scratch, tail_scratch) =
            self.window_scratch.split_at_mut(partition.piece_count());
        let mut rest = out.view_mut();

        self.pool.begin_barrier(partition.piece_count());
        for (index, windows) in piece_scratch.iter_mut().enumerate() {
            let (chunk, tail) = rest.split_at(Axis(0), piece_len);
            rest = tail;

            let begin = partition.piece(index).start;
            // SAFETY: as above, the barrier at the end of this stage keeps
            // every borrow alive past the last worker access.
            unsafe {
                self.pool.submit_borrowed(Box::new(move || {
                    correlation::estimate_rows(field1, field2, chunk, begin, config, windows);
                }));
            }
        }

        let tail = partition.remainder();
        if !tail.is_empty() {
            if let Some(windows) = tail_scratch.first_mut() {
                correlation::estimate_rows(field1, field2, rest, tail.start, config, windows);
            }
        }
        self.pool.await_barrier();
    }
}
