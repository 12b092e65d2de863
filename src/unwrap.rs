//! 2D phase unwrapping
//!
//! [ReliabilitySorting] implements the sorting by reliability following a non-continuous
//! path algorithm of Herráez et al. (Applied Optics, 2002):
//! pixels are ranked by the second differences of their wrapped phase, the edges between
//! neighboring pixels are sorted by the sum of the rankings of their pixels and the pixels
//! are grouped together following the edges, the most reliable edges first.

use std::f64::consts::PI;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{AoError, Result};

const TWO_PI: f64 = 2. * PI;

/// 2D phase unwrapping capability
pub trait PhaseUnwrapper {
    /// Unwraps the phase inside the optional mask
    ///
    /// The returned phase differs from `wrapped` by an integer multiple of 2π at each pixel;
    /// the pixels outside the mask are returned unchanged.
    fn unwrap(&self, wrapped: &DMatrix<f64>, mask: Option<&DMatrix<bool>>)
        -> Result<DMatrix<f64>>;
}

/// Reliability sorting phase unwrapper
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReliabilitySorting;

#[inline]
fn wrap(x: f64) -> f64 {
    x - TWO_PI * (x / TWO_PI).round()
}

#[inline]
fn find_wrap(d: f64) -> i64 {
    if d > PI {
        -1
    } else if d < -PI {
        1
    } else {
        0
    }
}

struct Edge {
    reliability: f64,
    p: usize,
    q: usize,
    wrap: i64,
}

impl ReliabilitySorting {
    fn reliability(phase: &DMatrix<f64>, valid: &DMatrix<bool>) -> DMatrix<f64> {
        let (nrows, ncols) = phase.shape();
        DMatrix::from_fn(nrows, ncols, |i, j| {
            if i == 0 || j == 0 || i + 1 == nrows || j + 1 == ncols {
                return f64::INFINITY;
            }
            let neighbors_valid = (i - 1..=i + 1)
                .flat_map(|ii| (j - 1..=j + 1).map(move |jj| (ii, jj)))
                .all(|p| valid[p]);
            if !neighbors_valid {
                return f64::INFINITY;
            }
            let c = phase[(i, j)];
            let d = |a: (usize, usize), b: (usize, usize)| wrap(phase[a] - c) - wrap(c - phase[b]);
            let h = d((i, j - 1), (i, j + 1));
            let v = d((i - 1, j), (i + 1, j));
            let d1 = d((i - 1, j - 1), (i + 1, j + 1));
            let d2 = d((i - 1, j + 1), (i + 1, j - 1));
            h * h + v * v + d1 * d1 + d2 * d2
        })
    }
    fn edges(phase: &DMatrix<f64>, valid: &DMatrix<bool>, reliability: &DMatrix<f64>) -> Vec<Edge> {
        let (nrows, ncols) = phase.shape();
        let mut edges = Vec::with_capacity(2 * phase.len());
        let mut push = |a: (usize, usize), b: (usize, usize)| {
            if valid[a] && valid[b] {
                edges.push(Edge {
                    reliability: reliability[a] + reliability[b],
                    p: a.0 + a.1 * nrows,
                    q: b.0 + b.1 * nrows,
                    wrap: find_wrap(phase[a] - phase[b]),
                });
            }
        };
        for j in 0..ncols {
            for i in 0..nrows {
                if j + 1 < ncols {
                    push((i, j), (i, j + 1));
                }
                if i + 1 < nrows {
                    push((i, j), (i + 1, j));
                }
            }
        }
        edges
    }
}

impl PhaseUnwrapper for ReliabilitySorting {
    fn unwrap(
        &self,
        wrapped: &DMatrix<f64>,
        mask: Option<&DMatrix<bool>>,
    ) -> Result<DMatrix<f64>> {
        let shape = wrapped.shape();
        let valid = match mask {
            Some(mask) if mask.shape() != shape => {
                return Err(AoError::shape_mismatch(shape, mask.shape()))
            }
            Some(mask) => mask.zip_map(wrapped, |m, x| m && x.is_finite()),
            None => wrapped.map(|x| x.is_finite()),
        };

        let reliability = Self::reliability(wrapped, &valid);
        let mut edges = Self::edges(wrapped, &valid, &reliability);
        edges.sort_by(|a, b| a.reliability.total_cmp(&b.reliability));

        let n = wrapped.len();
        let mut group: Vec<usize> = (0..n).collect();
        let mut members: Vec<Vec<usize>> = (0..n).map(|p| vec![p]).collect();
        let mut k = vec![0i64; n];
        for Edge { p, q, wrap, .. } in edges {
            let (gp, gq) = (group[p], group[q]);
            if gp == gq {
                continue;
            }
            // the smaller group joins the larger one
            let (from, to, delta) = if members[gp].len() <= members[gq].len() {
                (gp, gq, k[q] + wrap - k[p])
            } else {
                (gq, gp, k[p] - wrap - k[q])
            };
            let moved = std::mem::take(&mut members[from]);
            for &m in &moved {
                group[m] = to;
                k[m] += delta;
            }
            members[to].extend(moved);
        }

        let mut unwrapped = wrapped.clone();
        unwrapped
            .iter_mut()
            .zip(valid.iter())
            .zip(k)
            .filter(|((_, v), _)| **v)
            .for_each(|((x, _), k)| *x += TWO_PI * k as f64);
        Ok(unwrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn surface(n: usize) -> DMatrix<f64> {
        let c = n as f64 / 2.;
        DMatrix::from_fn(n, n, |i, j| {
            let (y, x) = (i as f64 - c, j as f64 - c);
            0.3 * y + 2e-3 * x * x - 1e-3 * x * y + 3.
        })
    }

    fn wrapped(phase: &DMatrix<f64>) -> DMatrix<f64> {
        phase.map(|x| x.sin().atan2(x.cos()))
    }

    fn assert_global_offset(unwrapped: &DMatrix<f64>, truth: &DMatrix<f64>, mask: &DMatrix<bool>) {
        let residual: Vec<f64> = unwrapped
            .iter()
            .zip(truth.iter())
            .zip(mask.iter())
            .filter(|(_, m)| **m)
            .map(|((u, t), _)| u - t)
            .collect();
        let offset = residual[0];
        assert!((offset / TWO_PI - (offset / TWO_PI).round()).abs() < 1e-9);
        residual
            .iter()
            .for_each(|r| assert!((r - offset).abs() < 1e-9, "{r} vs {offset}"));
    }

    #[test]
    fn smooth_surface() {
        let n = 64;
        let truth = surface(n);
        let mask = DMatrix::from_element(n, n, true);
        let unwrapped = ReliabilitySorting.unwrap(&wrapped(&truth), None).unwrap();
        assert_global_offset(&unwrapped, &truth, &mask);
    }

    #[test]
    fn noisy_surface_in_pupil() {
        let n = 64;
        let mut rng = StdRng::seed_from_u64(7);
        let truth = surface(n).map(|x| x + rng.gen_range(-0.3..0.3));
        let r = (n / 2) as i64;
        let mask = DMatrix::from_fn(n, n, |i, j| {
            (i as i64 - r).pow(2) + (j as i64 - r).pow(2) < r * r
        });
        let wrapped = wrapped(&truth).zip_map(&mask, |x, m| if m { x } else { 7. });
        let unwrapped = ReliabilitySorting.unwrap(&wrapped, Some(&mask)).unwrap();
        assert_global_offset(&unwrapped, &truth, &mask);
        unwrapped
            .iter()
            .zip(mask.iter())
            .filter(|(_, m)| !**m)
            .for_each(|(x, _)| assert_eq!(*x, 7.));
    }

    #[test]
    fn mask_shape() {
        let wrapped = DMatrix::zeros(8, 8);
        let mask = DMatrix::from_element(8, 6, true);
        assert!(matches!(
            ReliabilitySorting.unwrap(&wrapped, Some(&mask)),
            Err(AoError::ShapeMismatch { .. })
        ));
    }
}
