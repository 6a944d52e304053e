use std::f64::consts::PI;

use log::debug;

use super::{generate, Attribute, GridMesh, GridSpec, ProceduralSurface, Sample};
use crate::error::MeshError;

pub const DEFAULT_INTERVALS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereParams {
    pub radius: f64,
    /// Samples along both the polar and the azimuthal direction.
    pub intervals: usize,
}

impl Default for SphereParams {
    fn default() -> Self { Self { radius: 1.0, intervals: DEFAULT_INTERVALS } }
}

impl SphereParams {
    pub fn validate(&self) -> Result<(), MeshError> {
        // positions are stored as f32
        if !(self.radius.is_finite() && self.radius > 0.0 && self.radius <= f32::MAX as f64) {
            return Err(MeshError::InvalidRadius(self.radius));
        }
        GridSpec::new(self.intervals, self.intervals).validate()
    }

    /// Sample for lattice row `row` and column `j`.
    ///
    /// Rows run from the south pole (polar index `n-1`) up to the north pole
    /// (index 0); the row order fixes the triangle winding.
    pub fn sample(&self, row: usize, j: usize) -> Sample {
        let last = (self.intervals - 1) as f64;
        let i = (self.intervals - 1 - row) as f64;
        let theta = i / last * PI;
        let phi = j as f64 / last * PI * 2.0;
        let r = self.radius;
        let x = r * theta.sin() * phi.sin();
        let y = r * theta.cos();
        let z = r * theta.sin() * phi.cos();
        let position = [x as f32, y as f32, z as f32];
        Sample {
            position,
            // centred on the origin, so the position is an outward normal
            normal: position,
            texcoord: [(j as f64 / last) as f32, ((last - i) / last) as f32],
        }
    }
}

/// Closed sphere sampled in spherical coordinates. Longitude wraps with a
/// duplicate-vertex seam at `φ = 0 = 2π`; latitude runs pole to pole.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereSurface {
    params: SphereParams,
    mesh: GridMesh,
}

impl SphereSurface {
    pub fn new(radius: f64) -> Result<Self, MeshError> {
        Self::with_params(SphereParams { radius, ..SphereParams::default() })
    }

    pub fn with_params(params: SphereParams) -> Result<Self, MeshError> {
        params.validate()?;
        let n = params.intervals;
        let mesh = generate(GridSpec::new(n, n).wrap_u(true), |row, j| params.sample(row, j))?
            .with_lowest_y(-params.radius as f32);
        debug!("sphere r={} built with {} vertices", params.radius, mesh.vertex_count());
        Ok(Self { params, mesh })
    }

    pub fn params(&self) -> SphereParams { self.params }
    pub fn radius(&self) -> f64 { self.params.radius }
}

impl ProceduralSurface for SphereSurface {
    fn mesh(&self) -> &GridMesh { &self.mesh }

    fn bound_attributes(&self) -> &'static [Attribute] {
        &[Attribute::Position, Attribute::Normal]
    }
}
