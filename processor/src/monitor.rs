use crate::workflow::config::AreaSize;
use anyhow::Context;
use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use ustcore::Field;

#[derive(Debug, Deserialize)]
struct MonitorFile {
    monitors: Vec<MonitorEntry>,
}

/// One entry of the monitoring config: either grid coordinates (omitting
/// one axis makes it a line) or polar coordinates resolved against the
/// physical scan area.
#[derive(Debug, Deserialize)]
struct MonitorEntry {
    name: Option<String>,
    x: Option<i64>,
    z: Option<i64>,
    r: Option<f64>,
    phi: Option<f64>,
}

/// A full row or column of the grid sampled by a line probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineTarget {
    /// Every depth sample of one beam.
    AlongDepth { beam: usize },
    /// One depth sample across all beams.
    AcrossBeams { val: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ResolvedProbe {
    Point { beam: usize, val: usize },
    Line(LineTarget),
}

#[derive(Debug)]
struct PointProbe {
    name: String,
    beam: usize,
    val: usize,
    files: HashMap<String, File>,
}

#[derive(Debug)]
struct LineProbe {
    name: String,
    target: LineTarget,
}

/// Appends configured point and line samples of named fields to log files,
/// one entry per processing step. Point logs stay open for the whole run;
/// line probes write one file per step.
pub struct MonitorSet {
    base: PathBuf,
    fields: Vec<String>,
    points: Vec<PointProbe>,
    lines: Vec<LineProbe>,
}

impl MonitorSet {
    pub fn load(
        config_path: &Path,
        beams: usize,
        depth: usize,
        area: AreaSize,
        output_root: &Path,
        fields: &[&str],
    ) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("reading monitoring config {}", config_path.display()))?;
        let parsed: MonitorFile = serde_json::from_str(&contents)
            .with_context(|| format!("parsing monitoring config {}", config_path.display()))?;

        let mut resolved_points = Vec::new();
        let mut lines = Vec::new();
        for entry in &parsed.monitors {
            match resolve_entry(entry, beams, depth, area) {
                Some((name, ResolvedProbe::Point { beam, val })) => {
                    resolved_points.push((name, beam, val));
                }
                Some((name, ResolvedProbe::Line(target))) => {
                    lines.push(LineProbe { name, target });
                }
                None => warn!("skipping invalid or out-of-range monitor entry"),
            }
        }

        let base = output_root.join("monitoring");
        fs::create_dir_all(&base)
            .with_context(|| format!("creating monitoring directory {}", base.display()))?;
        for field in fields {
            let field_dir = base.join(field);
            fs::create_dir_all(&field_dir)?;
            for line in &lines {
                fs::create_dir_all(field_dir.join(&line.name))?;
            }
        }

        let points = resolved_points
            .into_iter()
            .map(|(name, beam, val)| {
                let mut files = HashMap::new();
                for field in fields {
                    let path = base.join(field).join(format!("{}.dat", name));
                    let file = OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(&path)
                        .with_context(|| format!("opening point log {}", path.display()))?;
                    files.insert(field.to_string(), file);
                }
                Ok(PointProbe {
                    name,
                    beam,
                    val,
                    files,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            base,
            fields: fields.iter().map(|field| field.to_string()).collect(),
            points,
            lines,
        })
    }

    pub fn probe_count(&self) -> usize {
        self.points.len() + self.lines.len()
    }

    /// Logs all probes of one named field for the given step label.
    /// Coordinates outside the data grid are silently skipped.
    pub fn process(&mut self, field_name: &str, data: &Field, label: &str) -> anyhow::Result<()> {
        if !self.fields.iter().any(|field| field == field_name) {
            return Ok(());
        }
        self.process_points(field_name, data, label)?;
        self.process_lines(field_name, data, label)
    }

    fn process_points(&mut self, field_name: &str, data: &Field, label: &str) -> anyhow::Result<()> {
        let (beams, depth) = data.dim();
        for probe in &mut self.points {
            if probe.beam >= beams || probe.val >= depth {
                continue;
            }
            if let Some(file) = probe.files.get_mut(field_name) {
                writeln!(file, "{},{}", label, data[[probe.beam, probe.val]])
                    .with_context(|| format!("appending point sample for {}", probe.name))?;
            }
        }
        Ok(())
    }

    fn process_lines(&self, field_name: &str, data: &Field, label: &str) -> anyhow::Result<()> {
        for line in &self.lines {
            let path = self
                .base
                .join(field_name)
                .join(&line.name)
                .join(format!("{}.dat", label));
            let mut out = match File::create(&path) {
                Ok(file) => file,
                Err(err) => {
                    warn!("cannot open line log {}: {}", path.display(), err);
                    continue;
                }
            };
            match line.target {
                LineTarget::AlongDepth { beam } => {
                    if beam >= data.nrows() {
                        continue;
                    }
                    for j in 0..data.ncols() {
                        writeln!(out, "{}", data[[beam, j]])?;
                    }
                }
                LineTarget::AcrossBeams { val } => {
                    if val >= data.ncols() {
                        continue;
                    }
                    for i in 0..data.nrows() {
                        writeln!(out, "{}", data[[i, val]])?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn resolve_entry(
    entry: &MonitorEntry,
    beams: usize,
    depth: usize,
    area: AreaSize,
) -> Option<(String, ResolvedProbe)> {
    let name = entry.name.clone()?;

    if let (Some(r), Some(phi)) = (entry.r, entry.phi) {
        let angle = phi.to_radians();
        let x = r * angle.cos();
        let z = r * angle.sin();
        let beam = x / area.width_mm * beams as f64 + beams as f64 / 2.0;
        let val = z / area.depth_mm * depth as f64 + depth as f64 / 2.0;
        if beam >= 0.0 && (beam as usize) < beams && val >= 0.0 && (val as usize) < depth {
            return Some((
                name,
                ResolvedProbe::Point {
                    beam: beam as usize,
                    val: val as usize,
                },
            ));
        }
        return None;
    }

    match (entry.x, entry.z) {
        (Some(x), Some(z)) => {
            if x >= 0 && (x as usize) < beams && z >= 0 && (z as usize) < depth {
                Some((
                    name,
                    ResolvedProbe::Point {
                        beam: x as usize,
                        val: z as usize,
                    },
                ))
            } else {
                None
            }
        }
        (Some(x), None) => {
            if x >= 0 && (x as usize) < beams {
                Some((
                    name,
                    ResolvedProbe::Line(LineTarget::AlongDepth { beam: x as usize }),
                ))
            } else {
                None
            }
        }
        (None, Some(z)) => {
            if z >= 0 && (z as usize) < depth {
                Some((
                    name,
                    ResolvedProbe::Line(LineTarget::AcrossBeams { val: z as usize }),
                ))
            } else {
                None
            }
        }
        (None, None) => None,
    }
}
