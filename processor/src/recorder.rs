use crate::workflow::config::AreaSize;
use anyhow::{bail, Context};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use ustcore::Field;

pub const ZONE_MAGIC: &[u8; 4] = b"USTZ";
pub const ZONE_FORMAT_VERSION: u32 = 1;

/// Physical sample positions for every grid node, built once per run:
/// lateral positions centered on the probe axis, axial positions from the
/// transducer face downward.
pub struct CoordinateGrid {
    lateral: Field,
    axial: Field,
}

impl CoordinateGrid {
    pub fn new(beams: usize, depth: usize, area: AreaSize) -> Self {
        let dx = if beams > 1 {
            area.width_mm / (beams - 1) as f64
        } else {
            0.0
        };
        let dz = if depth > 1 {
            area.depth_mm / (depth - 1) as f64
        } else {
            0.0
        };
        let half_width = area.width_mm / 2.0;
        Self {
            lateral: Field::from_shape_fn((beams, depth), |(i, _)| i as f64 * dx - half_width),
            axial: Field::from_shape_fn((beams, depth), |(_, j)| j as f64 * dz),
        }
    }

    pub fn lateral(&self) -> &Field {
        &self.lateral
    }

    pub fn axial(&self) -> &Field {
        &self.axial
    }
}

/// Appends labeled time-step zones (the coordinate planes plus named
/// scalar fields) to a binary output stream.
///
/// Layout: a header of magic, format version, grid dimensions, and the
/// variable names; then per zone the solution time followed by one plane
/// per variable, all little-endian doubles in column-major order.
pub struct ZoneRecorder {
    writer: BufWriter<File>,
    beams: usize,
    depth: usize,
    field_vars: usize,
    zones_written: usize,
    staging: Vec<f64>,
}

impl ZoneRecorder {
    /// Creates the stream and writes the header. `variables` names every
    /// plane of a zone in write order, the two coordinate planes first.
    pub fn create(
        path: &Path,
        variables: &[&str],
        beams: usize,
        depth: usize,
    ) -> anyhow::Result<Self> {
        if variables.len() < 3 {
            bail!("zone streams carry two coordinate planes plus at least one field");
        }

        let file = File::create(path)
            .with_context(|| format!("opening zone stream {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(ZONE_MAGIC)?;
        writer.write_all(&ZONE_FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(beams as u32).to_le_bytes())?;
        writer.write_all(&(depth as u32).to_le_bytes())?;
        writer.write_all(&(variables.len() as u32).to_le_bytes())?;
        for name in variables {
            writer.write_all(&(name.len() as u32).to_le_bytes())?;
            writer.write_all(name.as_bytes())?;
        }

        Ok(Self {
            writer,
            beams,
            depth,
            field_vars: variables.len() - 2,
            zones_written: 0,
            staging: vec![0.0; beams * depth],
        })
    }

    /// Appends one zone. The zone index doubles as the solution time, as
    /// the legacy stream numbered its steps.
    pub fn write_zone(&mut self, coords: &CoordinateGrid, fields: &[&Field]) -> anyhow::Result<()> {
        if fields.len() != self.field_vars {
            bail!(
                "zone carries {} fields, header declared {}",
                fields.len(),
                self.field_vars
            );
        }
        let dims = (self.beams, self.depth);
        if coords.lateral().dim() != dims || fields.iter().any(|field| field.dim() != dims) {
            bail!("zone plane dimensions do not match the stream header");
        }

        self.writer
            .write_all(&(self.zones_written as f64).to_le_bytes())?;
        self.write_plane_staged(coords.lateral())?;
        self.write_plane_staged(coords.axial())?;
        for field in fields {
            self.write_plane_staged(field)?;
        }
        self.zones_written += 1;
        Ok(())
    }

    fn write_plane_staged(&mut self, plane: &Field) -> anyhow::Result<()> {
        for j in 0..self.depth {
            for i in 0..self.beams {
                self.staging[j * self.beams + i] = plane[[i, j]];
            }
        }
        for value in &self.staging {
            self.writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn zones_written(&self) -> usize {
        self.zones_written
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        self.writer.flush().context("flushing zone stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use tempfile::tempdir;

    fn read_f64(bytes: &[u8], offset: usize) -> f64 {
        f64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
    }

    #[test]
    fn header_and_zone_layout_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("epsilon.plt");
        let area = AreaSize::default();
        let coords = CoordinateGrid::new(2, 3, area);
        let field = Array2::from_shape_fn((2, 3), |(i, j)| (i * 10 + j + 7) as f64);

        let mut recorder = ZoneRecorder::create(&path, &["x", "z", "epsilon"], 2, 3).unwrap();
        recorder.write_zone(&coords, &[&field]).unwrap();
        recorder.write_zone(&coords, &[&field]).unwrap();
        assert_eq!(recorder.zones_written(), 2);
        recorder.finish().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], ZONE_MAGIC);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 3);

        // Names: "x", "z", "epsilon" with length prefixes.
        let header_len = 20 + (4 + 1) + (4 + 1) + (4 + 7);
        assert_eq!(&bytes[24..25], b"x");
        assert_eq!(&bytes[34..41], b"epsilon");

        // One zone: time plus three 2x3 planes of doubles.
        let zone_len = 8 + 3 * 2 * 3 * 8;
        assert_eq!(bytes.len(), header_len + 2 * zone_len);

        // First zone carries time zero and starts with the lateral plane;
        // column-major puts grid node (0, 0) first.
        assert_eq!(read_f64(&bytes, header_len), 0.0);
        assert_eq!(
            read_f64(&bytes, header_len + 8),
            coords.lateral()[[0, 0]]
        );
        // The field plane follows the two coordinate planes.
        let field_plane = header_len + 8 + 2 * 2 * 3 * 8;
        assert_eq!(read_f64(&bytes, field_plane), 7.0);
        assert_eq!(read_f64(&bytes, field_plane + 8), 17.0);

        // Second zone advances the solution time.
        assert_eq!(read_f64(&bytes, header_len + zone_len), 1.0);
    }

    #[test]
    fn mismatched_zone_dimensions_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.plt");
        let coords = CoordinateGrid::new(2, 3, AreaSize::default());
        let wrong = Array2::zeros((3, 2));

        let mut recorder = ZoneRecorder::create(&path, &["x", "z", "epsilon"], 2, 3).unwrap();
        assert!(recorder.write_zone(&coords, &[&wrong]).is_err());
        assert!(recorder.write_zone(&coords, &[]).is_err());
        assert_eq!(recorder.zones_written(), 0);
    }

    #[test]
    fn coordinate_grid_centers_lateral_axis() {
        let grid = CoordinateGrid::new(5, 4, AreaSize {
            width_mm: 40.0,
            depth_mm: 60.0,
        });
        assert_eq!(grid.lateral()[[0, 0]], -20.0);
        assert_eq!(grid.lateral()[[4, 0]], 20.0);
        assert_eq!(grid.lateral()[[2, 3]], 0.0);
        assert_eq!(grid.axial()[[0, 0]], 0.0);
        assert_eq!(grid.axial()[[0, 3]], 60.0);
    }

    #[test]
    fn degenerate_single_beam_grid_has_zero_spacing() {
        let grid = CoordinateGrid::new(1, 1, AreaSize::default());
        assert_eq!(grid.lateral()[[0, 0]], -20.0);
        assert_eq!(grid.axial()[[0, 0]], 0.0);
    }
}
