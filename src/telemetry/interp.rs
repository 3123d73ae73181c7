use anyhow::{bail, Result};

/// Piecewise-linear interpolation over strictly increasing knots.
///
/// Outside the knot range the nearest end value is returned (no extrapolation).
#[derive(Debug, Clone)]
pub struct Interpolator {
    xp: Vec<f64>,
    fp: Vec<f64>,
}

impl Interpolator {
    pub fn new(xp: Vec<f64>, fp: Vec<f64>) -> Result<Self> {
        if xp.is_empty() {
            bail!("cannot interpolate without sample points");
        }
        if xp.len() != fp.len() {
            bail!("{} sample times but {} sample values", xp.len(), fp.len());
        }
        if xp.iter().chain(fp.iter()).any(|v| !v.is_finite()) {
            bail!("sample points must be finite");
        }
        if let Some(pos) = xp.windows(2).position(|w| w[0] >= w[1]) {
            bail!(
                "sample times must be strictly increasing ({} is followed by {})",
                xp[pos],
                xp[pos + 1]
            );
        }
        Ok(Self { xp, fp })
    }

    pub fn from_points(points: &[(f64, f64)]) -> Result<Self> {
        let (xp, fp) = points.iter().copied().unzip();
        Self::new(xp, fp)
    }

    pub fn at(&self, x: f64) -> f64 {
        let n = self.xp.len();
        // index of the first knot strictly after x
        let upper = self.xp.partition_point(|&k| k <= x);

        if upper == 0 {
            return self.fp[0];
        }
        if upper == n {
            return self.fp[n - 1];
        }

        let lower = upper - 1;
        let (x0, x1) = (self.xp[lower], self.xp[upper]);
        let (y0, y1) = (self.fp[lower], self.fp[upper]);
        let slope = (y1 - y0) / (x1 - x0);
        slope * (x - x0) + y0
    }
}
