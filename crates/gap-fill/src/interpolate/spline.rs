//! Interpolating B-splines of order 1 to 5.
//!
//! Each gap gets its own spline through up to `order + 1` known points on
//! either side. Knots follow the not-a-knot convention: data sites for odd
//! orders, midpoints between sites for even orders, with the ends repeated
//! `order + 1` times.

use super::{KnownPoints, window};
use crate::error::{GapFillError, Result};

pub(super) fn fill(
    known: &KnownPoints,
    left: usize,
    order: usize,
    targets: &[f64],
) -> Result<Vec<f64>> {
    let range = window(known.len(), left, 2 * (order + 1));
    let x = &known.x[range.clone()];
    let y = &known.y[range];
    if x.len() <= order {
        return Err(GapFillError::InsufficientPoints {
            method: "spline".to_string(),
            order,
            required: order + 1,
            available: x.len(),
        });
    }

    let origin = x[0];
    let scale = x[x.len() - 1] - origin;
    let sites: Vec<f64> = x.iter().map(|xi| (xi - origin) / scale).collect();

    let knots = knot_vector(&sites, order);
    let matrix: Vec<Vec<f64>> = sites.iter().map(|&s| basis(&knots, order, s)).collect();
    let coefficients = solve(matrix, y.to_vec()).ok_or_else(|| {
        GapFillError::InvalidSeries(format!(
            "spline of order {} has a singular collocation system",
            order
        ))
    })?;

    Ok(targets
        .iter()
        .map(|t| {
            basis(&knots, order, (t - origin) / scale)
                .iter()
                .zip(&coefficients)
                .map(|(b, c)| b * c)
                .sum()
        })
        .collect())
}

fn knot_vector(sites: &[f64], order: usize) -> Vec<f64> {
    let n = sites.len();
    let mut knots = vec![sites[0]; order + 1];
    if order % 2 == 1 {
        let half = order.div_ceil(2);
        knots.extend_from_slice(&sites[half..n - half]);
    } else {
        let half = order / 2;
        let midpoints: Vec<f64> = sites.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        knots.extend_from_slice(&midpoints[half..midpoints.len() - half]);
    }
    knots.extend(std::iter::repeat_n(sites[n - 1], order + 1));
    knots
}

/// Values of every B-spline basis function of degree `order` at `x`
/// (Cox-de Boor recursion).
fn basis(knots: &[f64], order: usize, x: f64) -> Vec<f64> {
    let spans = knots.len() - 1;
    let mut current = vec![0.0; spans];

    let last = knots[spans];
    let span = if x >= last {
        (0..spans).rev().find(|&i| knots[i] < knots[i + 1])
    } else {
        (0..spans).find(|&i| knots[i] <= x && x < knots[i + 1])
    };
    if let Some(span) = span {
        current[span] = 1.0;
    }

    for degree in 1..=order {
        let next: Vec<f64> = (0..spans - degree)
            .map(|i| {
                let mut value = 0.0;
                let left = knots[i + degree] - knots[i];
                if left > 0.0 {
                    value += (x - knots[i]) / left * current[i];
                }
                let right = knots[i + degree + 1] - knots[i + 1];
                if right > 0.0 {
                    value += (knots[i + degree + 1] - x) / right * current[i + 1];
                }
                value
            })
            .collect();
        current = next;
    }
    current
}

/// Gaussian elimination with partial pivoting. `None` when singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        for row in col + 1..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for (target, source) in a[row][col..].iter_mut().zip(&pivot_row[col..]) {
                *target -= factor * source;
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
