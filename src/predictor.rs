//! Predictor capability
//!
//! Learned scorers are opaque collaborators behind the [`Predictor`] trait.
//! This module supplies the pieces around them: a feature matrix built from
//! scored entities, a per-run standardizer, a deterministic ridge regression
//! reference predictor, and weighted blending of several predictors' outputs.
//!
//! Nothing here is global. A fitted scaler or model lives exactly as long as
//! the caller keeps it.

use crate::error::ComputeError;
use crate::types::{CompositeResult, Flavor, MetricKey};
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Ensemble weights for two predictors
pub const TWO_MODEL_BLEND: [f64; 2] = [0.6, 0.4];

/// Ensemble weights for three predictors
pub const THREE_MODEL_BLEND: [f64; 3] = [0.4, 0.35, 0.25];

/// Relative pivot below which the normal equations are treated as singular
const SINGULAR_TOLERANCE: f64 = 1e-10;

/// A trainable scorer
pub trait Predictor {
    type Model;

    /// Fit a model mapping feature rows to targets
    fn fit(&self, features: &FeatureMatrix, targets: &[f64]) -> Result<Self::Model, ComputeError>;

    /// Predict one value per feature row
    fn predict(&self, model: &Self::Model, features: &FeatureMatrix) -> Result<Vec<f64>, ComputeError>;
}

/// Row-major feature matrix with named metric columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    columns: Vec<MetricKey>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<MetricKey>, rows: Vec<Vec<f64>>) -> Result<Self, ComputeError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ComputeError::Prediction(format!(
                "row {index} has {} values, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Metric values of scored entities, columns in the flavor's metric order
    pub fn from_results(results: &[CompositeResult], flavor: &Flavor) -> Self {
        let columns = flavor.metric_keys().to_vec();
        let rows = results
            .iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|key| r.metrics.get(*key).unwrap_or(0.0))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[MetricKey] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    fn column(&self, index: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(move |row| row[index])
    }
}

/// Per-column standardization fitted on one run's features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<MetricKey>,
    means: Vec<f64>,
    /// Population standard deviations; 0 marks a constant column
    std_devs: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(features: &FeatureMatrix) -> Result<Self, ComputeError> {
        if features.n_rows() == 0 {
            return Err(ComputeError::Prediction(
                "cannot fit a scaler on zero rows".to_string(),
            ));
        }
        let n = features.n_rows() as f64;
        let (means, std_devs) = (0..features.n_cols())
            .map(|col| {
                let mean = features.column(col).sum::<f64>() / n;
                let variance = features.column(col).map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                (mean, variance.sqrt())
            })
            .unzip();
        Ok(Self {
            columns: features.columns.clone(),
            means,
            std_devs,
        })
    }

    /// `(x - mean) / std`; constant columns map to 0
    pub fn transform(&self, features: &FeatureMatrix) -> Result<FeatureMatrix, ComputeError> {
        if features.columns != self.columns {
            return Err(ComputeError::Prediction(format!(
                "scaler fitted on {:?}, got {:?}",
                self.columns, features.columns
            )));
        }
        let rows = features
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.std_devs))
                    .map(|(x, (mean, sd))| if *sd > 0.0 { (x - mean) / sd } else { 0.0 })
                    .collect()
            })
            .collect();
        Ok(FeatureMatrix {
            columns: self.columns.clone(),
            rows,
        })
    }
}

/// Closed-form ridge regression with an unpenalized intercept
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RidgePredictor {
    pub lambda: f64,
}

impl Default for RidgePredictor {
    fn default() -> Self {
        Self { lambda: 1.0 }
    }
}

/// Fitted ridge model, including the scaler it was trained behind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub scaler: StandardScaler,
}

impl Predictor for RidgePredictor {
    type Model = RidgeModel;

    /// Solve `(Z^T Z + lambda * P) w = Z^T y` where `Z = [1 | standardized X]`
    /// and `P` is the identity with the intercept entry zeroed.
    fn fit(&self, features: &FeatureMatrix, targets: &[f64]) -> Result<RidgeModel, ComputeError> {
        if !self.lambda.is_finite() || self.lambda < 0.0 {
            return Err(ComputeError::Prediction(format!(
                "ridge lambda must be finite and non-negative, got {}",
                self.lambda
            )));
        }
        if targets.len() != features.n_rows() {
            return Err(ComputeError::Prediction(format!(
                "{} targets for {} rows",
                targets.len(),
                features.n_rows()
            )));
        }

        let scaler = StandardScaler::fit(features)?;
        let scaled = scaler.transform(features)?;
        let n = scaled.n_rows();
        let dim = scaled.n_cols() + 1;

        let design = DMatrix::<f64>::from_fn(n, dim, |i, j| {
            if j == 0 {
                1.0
            } else {
                scaled.rows[i][j - 1]
            }
        });
        let y = DVector::<f64>::from_column_slice(targets);

        let mut normal = design.transpose() * &design;
        for d in 1..dim {
            normal[(d, d)] += self.lambda;
        }
        let rhs = design.transpose() * y;

        let scale = normal.diagonal().max().max(1.0);
        let chol = Cholesky::new(normal).ok_or_else(|| {
            ComputeError::Prediction("normal equations are singular".to_string())
        })?;
        if chol
            .l_dirty()
            .diagonal()
            .iter()
            .any(|pivot| pivot * pivot < SINGULAR_TOLERANCE * scale)
        {
            return Err(ComputeError::Prediction(
                "normal equations are singular".to_string(),
            ));
        }

        let w = chol.solve(&rhs);
        Ok(RidgeModel {
            intercept: w[0],
            coefficients: w.iter().skip(1).copied().collect(),
            scaler,
        })
    }

    fn predict(&self, model: &RidgeModel, features: &FeatureMatrix) -> Result<Vec<f64>, ComputeError> {
        let scaled = model.scaler.transform(features)?;
        Ok(scaled
            .rows
            .iter()
            .map(|row| {
                model.intercept
                    + row
                        .iter()
                        .zip(&model.coefficients)
                        .map(|(x, w)| x * w)
                        .sum::<f64>()
            })
            .collect())
    }
}

/// Weighted sum of several predictors' outputs
///
/// Weights are used as given (not renormalized).
pub fn blend(predictions: &[(Vec<f64>, f64)]) -> Result<Vec<f64>, ComputeError> {
    let Some((first, _)) = predictions.first() else {
        return Err(ComputeError::Prediction("nothing to blend".to_string()));
    };
    let len = first.len();

    let mut blended = vec![0.0; len];
    for (index, (values, weight)) in predictions.iter().enumerate() {
        if values.len() != len {
            return Err(ComputeError::Prediction(format!(
                "prediction set {index} has {} values, expected {len}",
                values.len()
            )));
        }
        if !weight.is_finite() || *weight < 0.0 {
            return Err(ComputeError::Prediction(format!(
                "blend weight {index} must be finite and non-negative, got {weight}"
            )));
        }
        for (acc, v) in blended.iter_mut().zip(values) {
            *acc += weight * v;
        }
    }
    Ok(blended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityMetrics, MetricSet, Sentiment};

    fn matrix(rows: Vec<Vec<f64>>) -> FeatureMatrix {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        FeatureMatrix::new(MetricKey::ENGAGEMENT[..cols].to_vec(), rows).unwrap()
    }

    #[test]
    fn test_unregularized_fit_recovers_a_line() {
        let features = matrix(vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0], vec![5.0]]);
        let targets = [5.0, 7.0, 9.0, 11.0, 13.0];
        let ridge = RidgePredictor { lambda: 0.0 };
        let model = ridge.fit(&features, &targets).unwrap();
        assert!((model.intercept - 9.0).abs() < 1e-9);

        let predictions = ridge.predict(&model, &features).unwrap();
        for (p, t) in predictions.iter().zip(&targets) {
            assert!((p - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_regularization_shrinks_coefficients() {
        let features = matrix(vec![
            vec![1.0, 0.5],
            vec![2.0, 0.1],
            vec![3.0, 0.9],
            vec![4.0, 0.3],
        ]);
        let targets = [1.0, 2.0, 3.0, 4.0];
        let loose = RidgePredictor { lambda: 0.0 }.fit(&features, &targets).unwrap();
        let tight = RidgePredictor { lambda: 100.0 }.fit(&features, &targets).unwrap();
        assert!(tight.coefficients[0].abs() < loose.coefficients[0].abs());
        // Intercept is the target mean either way
        assert!((tight.intercept - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_features_are_singular_without_penalty() {
        let features = matrix(vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]]);
        let err = RidgePredictor { lambda: 0.0 }
            .fit(&features, &[1.0, 2.0, 3.0])
            .unwrap_err();
        assert!(matches!(err, ComputeError::Prediction(_)));

        // A penalty makes the same system solvable
        assert!(RidgePredictor { lambda: 0.5 }
            .fit(&features, &[1.0, 2.0, 3.0])
            .is_ok());
    }

    #[test]
    fn test_scaler_zeroes_constant_columns() {
        let features = matrix(vec![vec![1.0, 7.0], vec![3.0, 7.0]]);
        let scaler = StandardScaler::fit(&features).unwrap();
        let scaled = scaler.transform(&features).unwrap();
        assert_eq!(scaled.rows(), &[vec![-1.0, 0.0], vec![1.0, 0.0]]);

        let other = FeatureMatrix::new(vec![MetricKey::ViralCoefficient, MetricKey::GrowthMomentum], vec![])
            .unwrap();
        assert!(scaler.transform(&other).is_err());
        assert!(StandardScaler::fit(&other).is_err());
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        assert!(FeatureMatrix::new(
            vec![MetricKey::MomentumScore],
            vec![vec![1.0], vec![1.0, 2.0]]
        )
        .is_err());
    }

    #[test]
    fn test_target_count_must_match() {
        let features = matrix(vec![vec![1.0], vec![2.0]]);
        assert!(RidgePredictor::default().fit(&features, &[1.0]).is_err());
    }

    #[test]
    fn test_feature_matrix_from_results() {
        let result = CompositeResult {
            id: "a".to_string(),
            metrics: EntityMetrics::Engagement(MetricSet {
                momentum_score: 0.4,
                ..MetricSet::default()
            }),
            composite_score: 0.3,
            sentiment: Sentiment::Negative,
            label: "Bearish".to_string(),
        };
        let features = FeatureMatrix::from_results(
            &[result],
            &Flavor::Engagement {
                counter: crate::types::Counter::Likes,
            },
        );
        assert_eq!(features.n_cols(), 8);
        assert_eq!(features.rows()[0][2], 0.4);
    }

    #[test]
    fn test_blend() {
        let blended = blend(&[
            (vec![1.0, 2.0], TWO_MODEL_BLEND[0]),
            (vec![3.0, 4.0], TWO_MODEL_BLEND[1]),
        ])
        .unwrap();
        assert!((blended[0] - 1.8).abs() < 1e-12);
        assert!((blended[1] - 2.8).abs() < 1e-12);

        assert!(blend(&[]).is_err());
        assert!(blend(&[(vec![1.0], 0.5), (vec![1.0, 2.0], 0.5)]).is_err());
        assert!(blend(&[(vec![1.0], -0.5)]).is_err());
        assert!((THREE_MODEL_BLEND.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
