use std::f64::consts::PI;

use log::debug;
use serde::{Deserialize, Serialize};

use super::{generate, Attribute, GridMesh, GridSpec, ProceduralSurface, Sample};
use crate::error::MeshError;

/// Sweep of the spiral ribbon in parameter space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelicoidParams {
    /// Radial coordinate covers `[0, radial_extent)`.
    pub radial_extent: f64,
    pub radial_step: f64,
    /// Angular samples over `[0, 2π]`.
    pub intervals: usize,
}

impl Default for HelicoidParams {
    fn default() -> Self { Self { radial_extent: 10.0, radial_step: 0.2, intervals: 40 } }
}

impl HelicoidParams {
    /// Number of radial rows, `ceil(extent / step)`.
    pub fn rows(&self) -> usize {
        if !(self.radial_step.is_finite() && self.radial_step > 0.0) {
            return 0;
        }
        // tolerate steps that divide the extent up to rounding error
        let n = (self.radial_extent / self.radial_step - 1e-9).ceil();
        if n.is_finite() && n > 0.0 { n as usize } else { 0 }
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if !(self.radial_step.is_finite() && self.radial_step > 0.0) {
            return Err(MeshError::InvalidStep(self.radial_step));
        }
        GridSpec::new(self.rows(), self.intervals).validate()
    }

    pub fn sample(&self, row: usize, j: usize) -> Sample {
        let x = row as f64 * self.radial_step;
        let theta = j as f64 / (self.intervals - 1) as f64 * 2.0 * PI;
        Sample {
            // left in (radius, angle) form; the vertex stage winds it into a spiral
            position: [x as f32, theta as f32, 0.0],
            normal: [0.0; 3],
            texcoord: [theta as f32, x as f32],
        }
    }
}

/// Spiral ribbon kept in parameter space on the CPU. Normals are zero, so the
/// surface picks up no diffuse shading from them.
#[derive(Debug, Clone, PartialEq)]
pub struct HelicoidSurface {
    params: HelicoidParams,
    mesh: GridMesh,
}

impl HelicoidSurface {
    pub fn new() -> Result<Self, MeshError> {
        Self::with_params(HelicoidParams::default())
    }

    pub fn with_params(params: HelicoidParams) -> Result<Self, MeshError> {
        params.validate()?;
        let spec = GridSpec::new(params.rows(), params.intervals).wrap_u(true);
        let mesh = generate(spec, |row, j| params.sample(row, j))?.with_lowest_y(0.0);
        debug!("helicoid {}x{} built", spec.rows, spec.cols);
        Ok(Self { params, mesh })
    }

    pub fn params(&self) -> HelicoidParams { self.params }
}

impl ProceduralSurface for HelicoidSurface {
    fn mesh(&self) -> &GridMesh { &self.mesh }

    fn bound_attributes(&self) -> &'static [Attribute] { &[Attribute::Position] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ribbon_counts() {
        let h = HelicoidSurface::new().unwrap();
        assert_eq!(h.mesh().rows(), 50);
        assert_eq!(h.mesh().cols(), 40);
        assert_eq!(h.mesh().vertex_count(), 2000);
        assert_eq!(h.mesh().index_count(), 11466);
        assert_eq!(h.lowest_y(), 0.0);
    }

    #[test]
    fn stays_in_parameter_space() {
        let h = HelicoidSurface::new().unwrap();
        let m = h.mesh();
        assert!(m.positions().iter().all(|p| p[2] == 0.0));
        assert!(m.normals().iter().all(|n| *n == [0.0; 3]));
        let last = m.sample(49, 39).unwrap();
        assert!((last.position[0] - 9.8).abs() < 1e-5);
        assert!((last.position[1] - std::f32::consts::TAU).abs() < 1e-5);
        assert_eq!(last.texcoord, [last.position[1], last.position[0]]);
        assert!(m.positions().iter().all(|p| p[0] < 10.0));
    }

    #[test]
    fn rows_cover_half_open_extent() {
        let p = HelicoidParams { radial_extent: 1.0, radial_step: 0.3, intervals: 4 };
        assert_eq!(p.rows(), 4);
        let p = HelicoidParams { radial_extent: 1.0, radial_step: 0.25, intervals: 4 };
        assert_eq!(p.rows(), 4);
    }

    #[test]
    fn only_positions_are_bound() {
        let h = HelicoidSurface::new().unwrap();
        assert_eq!(h.bound_attributes(), &[Attribute::Position]);
    }

    #[test]
    fn rejects_bad_sweeps() {
        let zero_step = HelicoidParams { radial_step: 0.0, ..HelicoidParams::default() };
        assert_eq!(
            HelicoidSurface::with_params(zero_step).unwrap_err(),
            MeshError::InvalidStep(0.0)
        );
        let one_row = HelicoidParams { radial_extent: 0.1, ..HelicoidParams::default() };
        assert_eq!(
            HelicoidSurface::with_params(one_row).unwrap_err(),
            MeshError::DegenerateGrid { rows: 1, cols: 40 }
        );
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(HelicoidSurface::new().unwrap(), HelicoidSurface::new().unwrap());
    }
}
