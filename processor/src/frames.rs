use anyhow::Context;
use ndarray::Array2;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use ustcore::RawFrame;

pub const RAW_EXTENSION: &str = "raw";

/// Non-recursive listing of raw frame files in lexical name order.
pub fn scan_raw_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("scanning raw directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("reading directory entry in {}", dir.display()))?
            .path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(RAW_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads one little-endian `i16` frame of exactly `beams x depth` samples,
/// beam major. A short file is an I/O error.
pub fn read_raw_frame(path: &Path, beams: usize, depth: usize) -> anyhow::Result<RawFrame> {
    let mut file =
        File::open(path).with_context(|| format!("opening raw frame {}", path.display()))?;
    let mut bytes = vec![0u8; beams * depth * 2];
    file.read_exact(&mut bytes).with_context(|| {
        format!(
            "raw frame {} shorter than {}x{} samples",
            path.display(),
            beams,
            depth
        )
    })?;

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Array2::from_shape_vec((beams, depth), samples)
        .with_context(|| format!("shaping raw frame {}", path.display()))
}

/// Stride-driven pair selection over the lexical frame sequence: the first
/// position is always kept, and every position divisible by the stride
/// forms a pair with the previously kept frame. Positions in between are
/// never even loaded.
pub struct FramePairer {
    skip: usize,
    offered: usize,
    held: Option<RawFrame>,
}

impl FramePairer {
    pub fn new(skip: usize) -> Self {
        Self {
            skip: skip.max(1),
            offered: 0,
            held: None,
        }
    }

    /// Advances the position counter; true when the file at this position
    /// must be loaded.
    pub fn admit(&mut self) -> bool {
        self.offered += 1;
        self.offered == 1 || self.offered % self.skip == 0
    }

    /// Accepts an admitted frame, yielding a pair once a predecessor is
    /// held. The new frame becomes the predecessor of the next pair.
    pub fn push(&mut self, frame: RawFrame) -> Option<(RawFrame, RawFrame)> {
        match self.held.take() {
            None => {
                self.held = Some(frame);
                None
            }
            Some(previous) => {
                self.held = Some(frame.clone());
                Some((previous, frame))
            }
        }
    }
}
