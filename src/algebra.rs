//! Minkowski metric and vector algebra.
//!
//! Every four-vector in this crate uses the metric diag(+1, -1, -1, -1)
//! with the energy (timelike) component first. Batched operations act on
//! the trailing axis of an `ArrayD` and broadcast over all leading axes;
//! the `*4`-suffixed helpers work on single `ArrayView1` vectors and are
//! used inside the per-entity construction loops.

use ndarray::{stack, Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis};
use std::error::Error;

/// Signs of the metric diag(+1, -1, -1, -1), timelike component first.
pub const METRIC: [f32; 4] = [1.0, -1.0, -1.0, -1.0];

fn check_trailing(u: &ArrayViewD<f32>, expected: usize, what: &str) -> Result<(), Box<dyn Error>> {
    let last = u.shape().last().copied().unwrap_or(0);
    if last != expected {
        return Err(format!(
            "{} expects trailing axis of size {}, got shape {:?}",
            what,
            expected,
            u.shape()
        )
        .into());
    }
    Ok(())
}

/// Minkowski inner product u·v contracted over the trailing 4-axis.
///
/// Output drops the trailing axis: shape `(..., 4)` -> `(...)`.
pub fn minkowski_dot(u: &ArrayViewD<f32>, v: &ArrayViewD<f32>) -> Result<ArrayD<f32>, Box<dyn Error>> {
    check_trailing(u, 4, "minkowski_dot")?;
    if u.shape() != v.shape() {
        return Err(format!(
            "minkowski_dot operands must share a shape, got {:?} and {:?}",
            u.shape(),
            v.shape()
        )
        .into());
    }
    let prod = u * v;
    let last = Axis(prod.ndim() - 1);
    let mut acc = prod.index_axis(last, 0).to_owned();
    for c in 1..4 {
        acc = acc - &prod.index_axis(last, c);
    }
    Ok(acc)
}

/// Minkowski norm sqrt(max(v·v, 0)), guarded against spacelike arguments.
pub fn minkowski_norm(v: &ArrayViewD<f32>) -> Result<ArrayD<f32>, Box<dyn Error>> {
    let sq = minkowski_dot(v, v)?;
    Ok(sq.mapv(|x| x.max(0.0).sqrt()))
}

/// v / (minkowski_norm(v) + eps), broadcast over leading axes.
pub fn normalize(v: &ArrayViewD<f32>, eps: f32) -> Result<ArrayD<f32>, Box<dyn Error>> {
    let norm = minkowski_norm(v)?;
    let denom = norm.mapv(|n| n + eps).insert_axis(Axis(v.ndim() - 1));
    Ok(v.to_owned() / &denom)
}

/// Euclidean component norm over the trailing axis. Not a physical norm;
/// used only for numerical conditioning of candidate vector batches.
pub fn euclidean_norm(v: &ArrayViewD<f32>) -> ArrayD<f32> {
    let sq = v.mapv(|x| x * x);
    sq.sum_axis(Axis(v.ndim() - 1)).mapv(f32::sqrt)
}

/// 3D cross product over the trailing 3-axis, broadcast over leading axes.
pub fn cross3(a: &ArrayViewD<f32>, b: &ArrayViewD<f32>) -> Result<ArrayD<f32>, Box<dyn Error>> {
    check_trailing(a, 3, "cross3")?;
    if a.shape() != b.shape() {
        return Err(format!(
            "cross3 operands must share a shape, got {:?} and {:?}",
            a.shape(),
            b.shape()
        )
        .into());
    }
    let last = Axis(a.ndim() - 1);
    let (ax, ay, az) = (
        a.index_axis(last, 0),
        a.index_axis(last, 1),
        a.index_axis(last, 2),
    );
    let (bx, by, bz) = (
        b.index_axis(last, 0),
        b.index_axis(last, 1),
        b.index_axis(last, 2),
    );
    let cx = &ay.to_owned() * &bz - &az.to_owned() * &by;
    let cy = &az.to_owned() * &bx - &ax.to_owned() * &bz;
    let cz = &ax.to_owned() * &by - &ay.to_owned() * &bx;
    let out = stack(last, &[cx.view(), cy.view(), cz.view()])
        .map_err(|e| format!("cross3 failed to stack components: {}", e))?;
    Ok(out)
}

/// Inverse of a Lorentz matrix via the metric: L^-1 = g L^T g.
///
/// Exact for group members; used for decanonicalization and relative
/// frames instead of a general matrix inverse.
pub fn lorentz_inverse(l: &ArrayView2<f32>) -> Array2<f32> {
    let mut out = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            out[[i, j]] = METRIC[i] * l[[j, i]] * METRIC[j];
        }
    }
    out
}

// Per-vector helpers for the construction loops.

/// Minkowski inner product of two single four-vectors.
pub fn dot4(u: ArrayView1<f32>, v: ArrayView1<f32>) -> f32 {
    u[0] * v[0] - u[1] * v[1] - u[2] * v[2] - u[3] * v[3]
}

/// Minkowski norm of a single four-vector, clamped at zero.
pub fn norm4(v: ArrayView1<f32>) -> f32 {
    dot4(v, v).max(0.0).sqrt()
}

/// v / (norm4(v) + eps) for a single four-vector.
pub fn normalize4(v: ArrayView1<f32>, eps: f32) -> Array1<f32> {
    let n = norm4(v) + eps;
    v.mapv(|x| x / n)
}

/// Cross product of two single 3-vectors.
pub fn cross3v(a: ArrayView1<f32>, b: ArrayView1<f32>) -> Array1<f32> {
    Array1::from(vec![
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array, ArrayD};

    fn scalar(a: &ArrayD<f32>) -> f32 {
        *a.iter().next().expect("expected at least one element")
    }

    #[test]
    fn test_minkowski_dot_signature() {
        let u = arr1(&[2.0f32, 1.0, 0.0, 0.0]).into_dyn();
        let v = arr1(&[3.0f32, 1.0, 0.0, 0.0]).into_dyn();
        let d = minkowski_dot(&u.view(), &v.view()).unwrap();
        // 2*3 - 1*1 = 5
        assert_abs_diff_eq!(scalar(&d), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_minkowski_dot_batched() {
        let u = Array::from_shape_vec(
            (2, 4),
            vec![1.0f32, 0.0, 0.0, 0.0, 5.0, 3.0, 0.0, 4.0],
        )
        .unwrap()
        .into_dyn();
        let d = minkowski_dot(&u.view(), &u.view()).unwrap();
        assert_eq!(d.shape(), &[2]);
        assert_abs_diff_eq!(d[[0]], 1.0, epsilon = 1e-6);
        // 25 - 9 - 16 = 0 (lightlike)
        assert_abs_diff_eq!(d[[1]], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_minkowski_norm_clamps_spacelike() {
        let v = arr1(&[0.0f32, 1.0, 0.0, 0.0]).into_dyn();
        let n = minkowski_norm(&v.view()).unwrap();
        assert_abs_diff_eq!(scalar(&n), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_unit_timelike() {
        let v = arr1(&[10.0f32, 6.0, 0.0, 0.0]).into_dyn();
        let u = normalize(&v.view(), 1e-15).unwrap();
        let uu = minkowski_dot(&u.view(), &u.view()).unwrap();
        assert_abs_diff_eq!(scalar(&uu), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_cross3_right_handed() {
        let x = arr1(&[1.0f32, 0.0, 0.0]).into_dyn();
        let y = arr1(&[0.0f32, 1.0, 0.0]).into_dyn();
        let z = cross3(&x.view(), &y.view()).unwrap();
        assert_abs_diff_eq!(z[[0]], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z[[1]], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z[[2]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_cross3_shape_mismatch_is_error() {
        let a = Array::<f32, _>::zeros((2, 3)).into_dyn();
        let b = Array::<f32, _>::zeros((3, 3)).into_dyn();
        assert!(cross3(&a.view(), &b.view()).is_err());
    }

    #[test]
    fn test_lorentz_inverse_of_boost() {
        // Boost along x with beta = 0.6: gamma = 1.25.
        let g = 1.25f32;
        let gb = 0.75f32;
        let boost = arr2(&[
            [g, -gb, 0.0, 0.0],
            [-gb, g, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        let inv = lorentz_inverse(&boost.view());
        let prod = boost.dot(&inv);
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(prod[[i, j]], expected, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_dot4_matches_batched() {
        let u = arr1(&[1.5f32, 0.2, -0.3, 0.9]);
        let v = arr1(&[0.7f32, -0.1, 0.4, 0.2]);
        let batched = minkowski_dot(&u.clone().into_dyn().view(), &v.clone().into_dyn().view()).unwrap();
        assert_abs_diff_eq!(dot4(u.view(), v.view()), scalar(&batched), epsilon = 1e-6);
    }

    #[test]
    fn test_euclidean_norm() {
        let v = arr1(&[3.0f32, 0.0, 4.0, 0.0]).into_dyn();
        let n = euclidean_norm(&v.view());
        assert_abs_diff_eq!(scalar(&n), 5.0, epsilon = 1e-6);
    }
}
