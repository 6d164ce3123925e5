//! Local polynomial interpolation.
//!
//! A gap is filled from the unique polynomial of degree `order` through the
//! `order + 1` known points nearest to it.

use super::{KnownPoints, window};

pub(super) fn fill(known: &KnownPoints, left: usize, order: usize, targets: &[f64]) -> Vec<f64> {
    let range = window(known.len(), left, order + 1);
    let x = &known.x[range.clone()];
    let y = &known.y[range];

    // Rescale so the bracketing interval is [0, 1]; elapsed seconds get large
    // enough to hurt the products below.
    let origin = known.x[left];
    let scale = known.x[left + 1] - origin;
    let nodes: Vec<f64> = x.iter().map(|xi| (xi - origin) / scale).collect();

    targets
        .iter()
        .map(|t| lagrange(&nodes, y, (t - origin) / scale))
        .collect()
}

fn lagrange(nodes: &[f64], values: &[f64], t: f64) -> f64 {
    let mut total = 0.0;
    for (j, (&xj, &yj)) in nodes.iter().zip(values).enumerate() {
        let mut basis = 1.0;
        for (m, &xm) in nodes.iter().enumerate() {
            if m != j {
                basis *= (t - xm) / (xj - xm);
            }
        }
        total += yj * basis;
    }
    total
}
