//! Piecewise cubic Hermite interpolation.

use super::KnownPoints;

pub(super) fn fill(known: &KnownPoints, left: usize, targets: &[f64]) -> Vec<f64> {
    let (x0, x1) = (known.x[left], known.x[left + 1]);
    let (y0, y1) = (known.y[left], known.y[left + 1]);
    let (d0, d1) = (slope(known, left), slope(known, left + 1));
    let h = x1 - x0;

    targets
        .iter()
        .map(|&x| {
            let s = (x - x0) / h;
            let s2 = s * s;
            let s3 = s2 * s;
            (2.0 * s3 - 3.0 * s2 + 1.0) * y0
                + (s3 - 2.0 * s2 + s) * h * d0
                + (-2.0 * s3 + 3.0 * s2) * y1
                + (s3 - s2) * h * d1
        })
        .collect()
}

/// Derivative implied at known point `i`: a three-point estimate weighted by
/// spacing in the interior, the adjacent secant at either end.
fn slope(known: &KnownPoints, i: usize) -> f64 {
    let (x, y) = (&known.x, &known.y);
    let n = x.len();
    if n < 2 {
        return 0.0;
    }
    if i == 0 {
        return (y[1] - y[0]) / (x[1] - x[0]);
    }
    if i == n - 1 {
        return (y[n - 1] - y[n - 2]) / (x[n - 1] - x[n - 2]);
    }

    let h0 = x[i] - x[i - 1];
    let h1 = x[i + 1] - x[i];
    let back = (y[i] - y[i - 1]) / h0;
    let forward = (y[i + 1] - y[i]) / h1;
    (h1 * back + h0 * forward) / (h0 + h1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_reproduced() {
        let known = KnownPoints {
            x: vec![0.0, 2.0, 5.0],
            y: vec![1.0, 5.0, 11.0],
        };
        let out = fill(&known, 1, &[3.0, 4.0]);
        assert!((out[0] - 7.0).abs() < 1e-12);
        assert!((out[1] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_quadratic_reproduced_between_interior_points() {
        let f = |x: f64| x * x;
        let xs = [0.0, 1.0, 3.0, 4.0];
        let known = KnownPoints {
            x: xs.to_vec(),
            y: xs.iter().map(|&x| f(x)).collect(),
        };
        let out = fill(&known, 1, &[2.0]);
        assert!((out[0] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_matches_endpoint_values() {
        let known = KnownPoints {
            x: vec![0.0, 1.0],
            y: vec![3.0, -2.0],
        };
        let out = fill(&known, 0, &[0.0, 1.0]);
        assert_eq!(out, vec![3.0, -2.0]);
    }
}
