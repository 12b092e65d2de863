use serde::{Deserialize, Serialize};

/// Intercept of the linear regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Intercept {
    /// least-squares fit of both the slope and the intercept
    #[default]
    Free,
    /// line through the origin
    Zero,
}

/// Least-squares line `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient
    pub r: f64,
    /// Standard error of the slope
    pub std_err: f64,
}

impl LinearFit {
    /// Fits a line to the samples `(x, y)`
    ///
    /// Returns `None` if there are fewer than 2 samples or if `x` is degenerate
    pub fn new(x: &[f64], y: &[f64], intercept: Intercept) -> Option<Self> {
        let n = x.len().min(y.len());
        if n < 2 {
            return None;
        }
        let (x, y) = (&x[..n], &y[..n]);
        match intercept {
            Intercept::Free => {
                let nf = n as f64;
                let mx = x.iter().sum::<f64>() / nf;
                let my = y.iter().sum::<f64>() / nf;
                let (sxx, syy, sxy) = x.iter().zip(y).fold((0f64, 0f64, 0f64), |(a, b, c), (x, y)| {
                    let (dx, dy) = (x - mx, y - my);
                    (a + dx * dx, b + dy * dy, c + dx * dy)
                });
                if !(sxx > 0.) {
                    return None;
                }
                let slope = sxy / sxx;
                let r = if syy > 0. {
                    (sxy / (sxx * syy).sqrt()).clamp(-1., 1.)
                } else {
                    0.
                };
                let std_err = if n > 2 {
                    ((1. - r * r) * syy / sxx / (n - 2) as f64).sqrt()
                } else {
                    0.
                };
                Some(Self {
                    slope,
                    intercept: my - slope * mx,
                    r,
                    std_err,
                })
            }
            Intercept::Zero => {
                let (sxx, syy, sxy) = x.iter().zip(y).fold((0f64, 0f64, 0f64), |(a, b, c), (x, y)| {
                    (a + x * x, b + y * y, c + x * y)
                });
                if !(sxx > 0.) {
                    return None;
                }
                let slope = sxy / sxx;
                let r = if syy > 0. {
                    (sxy / (sxx * syy).sqrt()).clamp(-1., 1.)
                } else {
                    0.
                };
                let rss: f64 = x
                    .iter()
                    .zip(y)
                    .map(|(x, y)| (y - slope * x).powi(2))
                    .sum();
                Some(Self {
                    slope,
                    intercept: 0.,
                    r,
                    std_err: (rss / (n - 1) as f64 / sxx).sqrt(),
                })
            }
        }
    }
}
