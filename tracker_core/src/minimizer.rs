//! A small Nelder-Mead simplex minimizer (Design Notes §9).
//!
//! No repository in the retrieval pack depends on an external
//! optimization crate, and the nonlinear refinement step of the circle
//! and line fits (spec.md §4.3, §4.4) is named directly as core
//! algorithmic work rather than ambient plumbing, so it is implemented
//! here rather than borrowed.

use crate::error::FitStatus;

/// Outcome of a minimization run.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizerResult {
    pub x: Vec<f64>,
    pub fval: f64,
    pub status: FitStatus,
    pub iterations: usize,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimize `objective` starting from `x0`, perturbing each coordinate
/// by `step` to build the initial simplex.
pub fn minimize(objective: impl Fn(&[f64]) -> f64, x0: &[f64], step: f64, max_iterations: usize) -> MinimizerResult {
    let n = x0.len();
    if n == 0 {
        return MinimizerResult { x: Vec::new(), fval: objective(x0), status: FitStatus::DegenerateInput, iterations: 0 };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut vertex = x0.to_vec();
        vertex[i] += if step.abs() > 1e-12 { step } else { 1.0 };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let spread = values[n] - values[0];
        if spread.abs() < 1e-12 {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();

        let reflect = reflect_point(&centroid, &simplex[n], REFLECT);
        let f_reflect = objective(&reflect);

        if f_reflect < values[0] {
            let expanded = reflect_point(&centroid, &simplex[n], EXPAND);
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflect {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflect;
                values[n] = f_reflect;
            }
        } else if f_reflect < values[n - 1] {
            simplex[n] = reflect;
            values[n] = f_reflect;
        } else {
            let contracted = reflect_point(&centroid, &simplex[n], CONTRACT);
            let f_contracted = objective(&contracted);
            if f_contracted < values[n] {
                simplex[n] = contracted;
                values[n] = f_contracted;
            } else {
                for i in 1..=n {
                    for j in 0..n {
                        simplex[i][j] = simplex[0][j] + SHRINK * (simplex[i][j] - simplex[0][j]);
                    }
                    values[i] = objective(&simplex[i]);
                }
            }
        }

        iterations += 1;
    }

    let mut order: Vec<usize> = (0..=n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
    let best_idx = order[0];

    MinimizerResult {
        x: simplex[best_idx].clone(),
        fval: values[best_idx],
        status: if converged { FitStatus::Converged } else { FitStatus::MaxIterationsReached },
        iterations,
    }
}

fn reflect_point(centroid: &[f64], worst: &[f64], coefficient: f64) -> Vec<f64> {
    centroid.iter().zip(worst.iter()).map(|(c, w)| c + coefficient * (c - w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn minimizes_a_simple_paraboloid() {
        let objective = |x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] + 2.0).powi(2);
        let result = minimize(objective, &[0.0, 0.0], 1.0, 500);
        assert_eq!(result.status, FitStatus::Converged);
        assert_relative_eq!(result.x[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(result.x[1], -2.0, epsilon = 1e-3);
    }

    #[test]
    fn reports_max_iterations_reached_when_starved() {
        let objective = |x: &[f64]| (x[0] - 100.0).powi(2);
        let result = minimize(objective, &[0.0], 0.1, 2);
        assert_eq!(result.status, FitStatus::MaxIterationsReached);
    }

    #[test]
    fn empty_parameter_vector_is_degenerate() {
        let result = minimize(|_: &[f64]| 0.0, &[], 1.0, 10);
        assert_eq!(result.status, FitStatus::DegenerateInput);
    }
}
