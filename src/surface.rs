//! Surface hole accumulation on a terrain grid.
//!
//! An emission arriving at the surface is injected at its source cell,
//! spread by an isotropic Gaussian blur, weighted by an altitude attraction
//! factor `1 + s·(z − z̄)` and added into the running grid.
//!
//! Nothing is renormalised. With [`BoundaryMode::Truncate`] the kernel is cut
//! at the grid edge and mass leaks out; the attraction factor scales mass up
//! on high ground and down on low ground. The grid total after an update is
//! therefore not `previous + amount` in general.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::error::{require_finite, require_non_negative, SimError};

/// Kernel half-width in standard deviations.
const KERNEL_TRUNCATE: f64 = 4.0;

/// Static altitude map z(x, y).
#[derive(Debug, Clone)]
pub struct TerrainMap {
    altitude: Array2<f64>,
    mean: f64,
}

impl TerrainMap {
    pub fn new(altitude: Array2<f64>) -> Result<Self, SimError> {
        let (nx, ny) = altitude.dim();
        if nx == 0 || ny == 0 {
            return Err(SimError::invalid("terrain", "grid must be non-empty"));
        }
        if altitude.iter().any(|z| !z.is_finite()) {
            return Err(SimError::invalid("terrain", "altitudes must be finite"));
        }
        let mean = altitude.sum() / (nx * ny) as f64;
        Ok(Self { altitude, mean })
    }

    /// Flat terrain of the given shape.
    pub fn flat(nx: usize, ny: usize) -> Result<Self, SimError> {
        Self::new(Array2::zeros((nx, ny)))
    }

    pub fn dim(&self) -> (usize, usize) {
        self.altitude.dim()
    }

    pub fn altitude(&self) -> &Array2<f64> {
        &self.altitude
    }

    pub fn mean_altitude(&self) -> f64 {
        self.mean
    }

    /// Pointwise attraction multiplier `1 + strength·(z − z̄)`.
    pub fn attraction(&self, strength: f64) -> Array2<f64> {
        self.altitude.mapv(|z| 1.0 + strength * (z - self.mean))
    }

    /// Error unless `(x, y)` lies inside the grid.
    pub fn check_index(&self, what: &'static str, x: usize, y: usize) -> Result<(), SimError> {
        let (nx, ny) = self.dim();
        if x >= nx || y >= ny {
            return Err(SimError::OutOfBounds { what, x, y, nx, ny });
        }
        Ok(())
    }
}

/// How the blur treats samples beyond the grid edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryMode {
    /// Samples outside the grid are zero; mass spread past the edge is lost.
    #[default]
    Truncate,
    /// Samples mirror about the edge (`d c b a | a b c d | d c b a`).
    Reflect,
}

/// Lateral spreading and altitude weighting of arriving holes.
#[derive(Debug, Clone)]
pub struct SurfaceParams {
    /// Standard deviation of the lateral blur (cells)
    pub diffusion_sigma: f64,
    /// Attraction to high altitude (per unit altitude)
    pub attraction_strength: f64,
    pub boundary: BoundaryMode,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            diffusion_sigma: 1.0,
            attraction_strength: 0.005,
            boundary: BoundaryMode::Truncate,
        }
    }
}

impl SurfaceParams {
    pub fn validate(&self) -> Result<(), SimError> {
        require_non_negative("diffusion_sigma", self.diffusion_sigma)?;
        require_finite("attraction_strength", self.attraction_strength)
    }
}

/// Normalised 1D Gaussian kernel of radius `round(4σ)`.
///
/// `σ = 0` gives the identity kernel `[1.0]`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (KERNEL_TRUNCATE * sigma + 0.5) as i64;
    let inv = -0.5 / (sigma * sigma);
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|k| (inv * (k * k) as f64).exp())
        .collect();
    let norm: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= norm;
    }
    weights
}

/// Map an out-of-range index back into `0..n` according to `mode`.
fn boundary_index(i: i64, n: usize, mode: BoundaryMode) -> Option<usize> {
    let n = n as i64;
    if (0..n).contains(&i) {
        return Some(i as usize);
    }
    match mode {
        BoundaryMode::Truncate => None,
        BoundaryMode::Reflect => {
            let period = 2 * n;
            let m = i.rem_euclid(period);
            let reflected = if m < n { m } else { period - 1 - m };
            Some(reflected as usize)
        }
    }
}

/// Correlate a 1D signal with a symmetric kernel.
pub fn blur_1d(signal: ArrayView1<f64>, kernel: &[f64], mode: BoundaryMode) -> Array1<f64> {
    let n = signal.len();
    let radius = (kernel.len() / 2) as i64;
    Array1::from_shape_fn(n, |i| {
        kernel
            .iter()
            .enumerate()
            .filter_map(|(k, w)| {
                let src = i as i64 + k as i64 - radius;
                boundary_index(src, n, mode).map(|j| w * signal[j])
            })
            .sum()
    })
}

/// Separable isotropic Gaussian blur of a 2D field.
pub fn gaussian_blur(field: &Array2<f64>, sigma: f64, mode: BoundaryMode) -> Array2<f64> {
    let kernel = gaussian_kernel(sigma);
    let mut out = field.clone();
    for axis in [Axis(0), Axis(1)] {
        let blurred = out.clone();
        for (mut dst, src) in out.lanes_mut(axis).into_iter().zip(blurred.lanes(axis)) {
            dst.assign(&blur_1d(src, &kernel, mode));
        }
    }
    out
}

/// Surface model bound to one terrain and one parameter set.
///
/// The attraction factor and blur kernel are computed once and reused by
/// every [`update`](Self::update).
#[derive(Debug, Clone)]
pub struct SurfaceAccumulationField {
    terrain: TerrainMap,
    params: SurfaceParams,
    attraction: Array2<f64>,
    kernel: Vec<f64>,
}

impl SurfaceAccumulationField {
    pub fn new(terrain: TerrainMap, params: SurfaceParams) -> Result<Self, SimError> {
        params.validate()?;
        let attraction = terrain.attraction(params.attraction_strength);
        let kernel = gaussian_kernel(params.diffusion_sigma);
        Ok(Self {
            terrain,
            params,
            attraction,
            kernel,
        })
    }

    pub fn terrain(&self) -> &TerrainMap {
        &self.terrain
    }

    pub fn params(&self) -> &SurfaceParams {
        &self.params
    }

    /// Empty accumulation grid with the terrain's shape.
    pub fn empty_grid(&self) -> Array2<f64> {
        Array2::zeros(self.terrain.dim())
    }

    /// Spread `amount` injected at `(x, y)` without adding it anywhere.
    ///
    /// A point source factorises into two 1D impulses, so the 2D blur is the
    /// outer product of their 1D blurs.
    pub fn deposit(&self, x: usize, y: usize, amount: f64) -> Result<Array2<f64>, SimError> {
        self.terrain.check_index("source", x, y)?;
        require_finite("amount", amount)?;
        let (nx, ny) = self.terrain.dim();
        let mode = self.params.boundary;

        let mut ex = Array1::zeros(nx);
        ex[x] = amount;
        let mut ey = Array1::zeros(ny);
        ey[y] = 1.0;
        let bx = blur_1d(ex.view(), &self.kernel, mode);
        let by = blur_1d(ey.view(), &self.kernel, mode);

        let mut spread = Array2::from_shape_fn((nx, ny), |(i, j)| bx[i] * by[j]);
        spread *= &self.attraction;
        Ok(spread)
    }

    /// Inject `amount` at `(x, y)` and add the spread result into `grid`.
    pub fn update(
        &self,
        grid: &mut Array2<f64>,
        x: usize,
        y: usize,
        amount: f64,
    ) -> Result<(), SimError> {
        if grid.dim() != self.terrain.dim() {
            return Err(SimError::ShapeMismatch {
                what: "accumulation grid",
                expected: self.terrain.dim(),
                actual: grid.dim(),
            });
        }
        let spread = self.deposit(x, y, amount)?;
        *grid += &spread;
        Ok(())
    }
}

/// One-shot form of [`SurfaceAccumulationField::update`].
pub fn update_surface_accumulation(
    grid: &mut Array2<f64>,
    terrain: &TerrainMap,
    source_x: usize,
    source_y: usize,
    amount: f64,
    diffusion_sigma: f64,
    attraction_strength: f64,
) -> Result<(), SimError> {
    let params = SurfaceParams {
        diffusion_sigma,
        attraction_strength,
        boundary: BoundaryMode::Truncate,
    };
    SurfaceAccumulationField::new(terrain.clone(), params)?.update(grid, source_x, source_y, amount)
}
