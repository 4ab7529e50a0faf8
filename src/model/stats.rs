//! Reference models exercising the full capability surface.
//!
//! Both are deterministic, which keeps the fit/predict symmetry and state
//! round-trip properties exactly testable.

use super::{Model, ModelFactory, ParamMap};
use crate::adapter::Matrix;
use crate::error::{DataflowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

fn ensure_ncols(x: &Matrix, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(DataflowError::ShapeMismatch {
            expected: format!("{expected} columns"),
            actual: format!("{} columns", x.ncols()),
        });
    }
    Ok(())
}

fn ensure_non_empty(x: &Matrix) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(DataflowError::ShapeMismatch {
            expected: "a non-empty matrix".to_string(),
            actual: format!("{}x{}", x.nrows(), x.ncols()),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Standardize
// ---------------------------------------------------------------------------

/// Per-column mean/stdev scaling with an exact inverse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Standardize {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Standardize {
    fn fitted(&self) -> Result<(&[f64], &[f64])> {
        if self.means.is_empty() {
            return Err(DataflowError::NotFitted);
        }
        Ok((&self.means, &self.stds))
    }
}

impl Model for Standardize {
    fn fit(&mut self, x: &Matrix) -> Result<()> {
        ensure_non_empty(x)?;
        let n = x.nrows() as f64;
        self.means = (0..x.ncols())
            .map(|c| x.column_iter(c).sum::<f64>() / n)
            .collect();
        self.stds = (0..x.ncols())
            .map(|c| {
                let mean = self.means[c];
                let var = x.column_iter(c).map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                // A constant column scales by 1 so the inverse stays exact.
                if std > 0.0 { std } else { 1.0 }
            })
            .collect();
        Ok(())
    }

    fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let (means, stds) = self.fitted()?;
        ensure_ncols(x, means.len())?;
        let mut out = Matrix::zeros(x.nrows(), x.ncols());
        for r in 0..x.nrows() {
            for c in 0..x.ncols() {
                out.set(r, c, (x.get(r, c) - means[c]) / stds[c]);
            }
        }
        Ok(out)
    }

    fn inverse_transform(&self, x: &Matrix) -> Result<Matrix> {
        let (means, stds) = self.fitted()?;
        ensure_ncols(x, means.len())?;
        let mut out = Matrix::zeros(x.nrows(), x.ncols());
        for r in 0..x.nrows() {
            for c in 0..x.ncols() {
                out.set(r, c, x.get(r, c) * stds[c] + means[c]);
            }
        }
        Ok(out)
    }

    fn params(&self) -> ParamMap {
        ParamMap::new()
    }

    fn describe(&self) -> ParamMap {
        let mut info = ParamMap::new();
        info.insert("means".to_string(), json!(self.means));
        info.insert("stds".to_string(), json!(self.stds));
        info
    }

    fn clone_box(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}

/// Factory for [`Standardize`].
#[derive(Debug, Clone, Default)]
pub struct StandardizeSpec;

impl ModelFactory for StandardizeSpec {
    fn build(&self) -> Box<dyn Model> {
        Box::new(Standardize::default())
    }

    fn supports_inverse(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// PrincipalFactors
// ---------------------------------------------------------------------------

/// Leading principal components via covariance power iteration.
///
/// `transform` projects centered rows onto the retained components;
/// `inverse_transform` reconstructs rows in the original column space,
/// which is what residualization and cross-group projection consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalFactors {
    spec: PrincipalFactorsSpec,
    means: Vec<f64>,
    // num_factors rows, each of length num input columns; orthonormal.
    components: Vec<Vec<f64>>,
    eigenvalues: Vec<f64>,
}

impl PrincipalFactors {
    pub fn new(spec: PrincipalFactorsSpec) -> Self {
        Self { spec, means: Vec::new(), components: Vec::new(), eigenvalues: Vec::new() }
    }

    fn fitted(&self) -> Result<&[Vec<f64>]> {
        if self.components.is_empty() {
            return Err(DataflowError::NotFitted);
        }
        Ok(&self.components)
    }

    fn covariance(&self, x: &Matrix) -> Vec<Vec<f64>> {
        let (n, p) = (x.nrows(), x.ncols());
        let mut cov = vec![vec![0.0; p]; p];
        for r in 0..n {
            for i in 0..p {
                let xi = x.get(r, i) - self.means[i];
                for j in i..p {
                    let xj = x.get(r, j) - self.means[j];
                    cov[i][j] += xi * xj;
                }
            }
        }
        for i in 0..p {
            for j in i..p {
                cov[i][j] /= n as f64;
                cov[j][i] = cov[i][j];
            }
        }
        cov
    }

    /// Extracts the leading eigenvector of `cov` orthogonal to the
    /// components found so far.
    fn power_iterate(&self, cov: &[Vec<f64>]) -> (Vec<f64>, f64) {
        let p = cov.len();
        // Deterministic, non-degenerate start vector.
        let mut v: Vec<f64> = (0..p).map(|i| 1.0 / (i + 1) as f64).collect();
        normalize(&mut v);
        for _ in 0..self.spec.max_iter {
            let mut next: Vec<f64> = (0..p)
                .map(|i| (0..p).map(|j| cov[i][j] * v[j]).sum())
                .collect();
            for comp in &self.components {
                let dot: f64 = next.iter().zip(comp).map(|(a, b)| a * b).sum();
                for (n_i, c_i) in next.iter_mut().zip(comp) {
                    *n_i -= dot * c_i;
                }
            }
            if normalize(&mut next) < self.spec.tol {
                v = next;
                break;
            }
            let delta: f64 = next
                .iter()
                .zip(&v)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            v = next;
            if delta < self.spec.tol {
                break;
            }
        }
        let eigenvalue: f64 = (0..p)
            .map(|i| v[i] * (0..p).map(|j| cov[i][j] * v[j]).sum::<f64>())
            .sum();
        (v, eigenvalue)
    }
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    norm
}

impl Model for PrincipalFactors {
    fn fit(&mut self, x: &Matrix) -> Result<()> {
        ensure_non_empty(x)?;
        let p = x.ncols();
        if self.spec.num_factors == 0 || self.spec.num_factors > p {
            return Err(DataflowError::InvalidConfig(format!(
                "num_factors {} out of range for {p} input columns",
                self.spec.num_factors
            )));
        }
        let n = x.nrows() as f64;
        self.means = (0..p).map(|c| x.column_iter(c).sum::<f64>() / n).collect();
        self.components.clear();
        self.eigenvalues.clear();
        let cov = self.covariance(x);
        for _ in 0..self.spec.num_factors {
            let (component, eigenvalue) = self.power_iterate(&cov);
            self.components.push(component);
            self.eigenvalues.push(eigenvalue);
        }
        Ok(())
    }

    fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let components = self.fitted()?;
        ensure_ncols(x, self.means.len())?;
        let mut out = Matrix::zeros(x.nrows(), components.len());
        for r in 0..x.nrows() {
            for (k, comp) in components.iter().enumerate() {
                let score: f64 = comp
                    .iter()
                    .enumerate()
                    .map(|(c, w)| w * (x.get(r, c) - self.means[c]))
                    .sum();
                out.set(r, k, score);
            }
        }
        Ok(out)
    }

    fn inverse_transform(&self, x: &Matrix) -> Result<Matrix> {
        let components = self.fitted()?;
        ensure_ncols(x, components.len())?;
        let p = self.means.len();
        let mut out = Matrix::zeros(x.nrows(), p);
        for r in 0..x.nrows() {
            for c in 0..p {
                let value: f64 = components
                    .iter()
                    .enumerate()
                    .map(|(k, comp)| x.get(r, k) * comp[c])
                    .sum();
                out.set(r, c, value + self.means[c]);
            }
        }
        Ok(out)
    }

    fn params(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("num_factors".to_string(), json!(self.spec.num_factors));
        params.insert("max_iter".to_string(), json!(self.spec.max_iter));
        params.insert("tol".to_string(), json!(self.spec.tol));
        params
    }

    fn describe(&self) -> ParamMap {
        let mut info = ParamMap::new();
        info.insert("means".to_string(), json!(self.means));
        info.insert("eigenvalues".to_string(), json!(self.eigenvalues));
        info.insert("components".to_string(), json!(self.components));
        info
    }

    fn clone_box(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}

/// Hyperparameters for [`PrincipalFactors`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalFactorsSpec {
    pub num_factors: usize,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for PrincipalFactorsSpec {
    fn default() -> Self {
        Self { num_factors: 1, max_iter: 300, tol: 1e-12 }
    }
}

impl ModelFactory for PrincipalFactorsSpec {
    fn build(&self) -> Box<dyn Model> {
        Box::new(PrincipalFactors::new(self.clone()))
    }

    fn supports_inverse(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn matrix(rows: &[&[f64]]) -> Matrix {
        let ncols = rows[0].len();
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Matrix::from_rows(rows.len(), ncols, data).unwrap()
    }

    #[test]
    fn test_standardize_round_trip() {
        let x = matrix(&[&[1.0, 10.0], &[2.0, 20.0], &[3.0, 30.0]]);
        let mut model = Standardize::default();
        model.fit(&x).unwrap();
        let z = model.transform(&x).unwrap();
        // Column means are zero after standardization.
        for c in 0..2 {
            let mean: f64 = z.column_iter(c).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-12);
        }
        let back = model.inverse_transform(&z).unwrap();
        for r in 0..3 {
            for c in 0..2 {
                assert!((back.get(r, c) - x.get(r, c)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_standardize_unfitted_transform_fails() {
        let model = Standardize::default();
        let err = model.transform(&Matrix::zeros(2, 2)).unwrap_err();
        assert_eq!(err, DataflowError::NotFitted);
    }

    #[test]
    fn test_principal_factors_recovers_rank_one_structure() {
        // Two perfectly correlated columns: one factor reconstructs exactly.
        let x = matrix(&[&[1.0, 2.0], &[2.0, 4.0], &[3.0, 6.0], &[4.0, 8.0]]);
        let mut model = PrincipalFactors::new(PrincipalFactorsSpec::default());
        model.fit(&x).unwrap();
        let scores = model.transform(&x).unwrap();
        assert_eq!(scores.ncols(), 1);
        let back = model.inverse_transform(&scores).unwrap();
        for r in 0..4 {
            for c in 0..2 {
                assert!((back.get(r, c) - x.get(r, c)).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_principal_factors_components_are_orthonormal() {
        let x = matrix(&[
            &[1.0, 0.2, -1.0],
            &[2.0, -0.3, 0.5],
            &[-1.0, 0.8, 2.0],
            &[0.5, -1.2, 1.0],
            &[3.0, 0.1, -0.5],
        ]);
        let mut model = PrincipalFactors::new(PrincipalFactorsSpec {
            num_factors: 2,
            ..Default::default()
        });
        model.fit(&x).unwrap();
        let c = &model.components;
        let dot: f64 = c[0].iter().zip(&c[1]).map(|(a, b)| a * b).sum();
        assert!(dot.abs() < 1e-8);
        for comp in c {
            let norm: f64 = comp.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-8);
        }
        assert!(model.eigenvalues[0] >= model.eigenvalues[1]);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    fn test_principal_factors_rejects_bad_rank(#[case] num_factors: usize) {
        let x = matrix(&[&[1.0, 2.0], &[2.0, 1.0]]);
        let mut model = PrincipalFactors::new(PrincipalFactorsSpec {
            num_factors,
            ..Default::default()
        });
        let err = model.fit(&x).unwrap_err();
        assert!(matches!(err, DataflowError::InvalidConfig(_)));
    }
}
