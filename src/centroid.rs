//! Intensity-weighted centroid

use nalgebra::DMatrix;

/// Computes the `(x, y)` centroid of `image`
///
/// Each sample is weighted by its own value if the value is greater or equal to `threshold`,
/// and by zero otherwise; `x` is the mean column index and `y` the mean row index.
/// If the total weight vanishes, the geometric center `((ncols-1)/2, (nrows-1)/2)` is returned.
pub fn centroid(image: &DMatrix<f64>, threshold: f64) -> (f64, f64) {
    let (nrows, ncols) = image.shape();
    let (mut w, mut wx, mut wy) = (0f64, 0f64, 0f64);
    for j in 0..ncols {
        for i in 0..nrows {
            let v = image[(i, j)];
            if v >= threshold && v.is_finite() {
                w += v;
                wx += v * j as f64;
                wy += v * i as f64;
            }
        }
    }
    if w == 0. || !w.is_finite() {
        return geometric_center(nrows, ncols);
    }
    (wx / w, wy / w)
}

/// Computes the `(x, y)` centroid of `image` weighting every sample by its value
pub fn mgcentroid(image: &DMatrix<f64>) -> (f64, f64) {
    centroid(image, 0.)
}

#[inline]
fn geometric_center(nrows: usize, ncols: usize) -> (f64, f64) {
    (
        0.5 * ncols.saturating_sub(1) as f64,
        0.5 * nrows.saturating_sub(1) as f64,
    )
}
