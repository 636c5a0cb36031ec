use std::sync::Mutex;

/// Run counters shared between the processing loop and its collaborators.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

struct Metrics {
    steps: usize,
    collaborator_errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                steps: 0,
                collaborator_errors: 0,
            }),
        }
    }

    /// Counts one fully processed frame pair.
    pub fn record_step(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.steps += 1;
        }
    }

    /// Counts a recorder or probe failure that did not abort the step.
    pub fn record_collaborator_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.collaborator_errors += 1;
        }
    }

    pub fn snapshot(&self) -> (usize, usize) {
        if let Ok(metrics) = self.inner.lock() {
            (metrics.steps, metrics.collaborator_errors)
        } else {
            (0, 0)
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
