//! Per-feature standardization fitted at training time

use serde::{Deserialize, Serialize};

use super::{ClassifierError, Row};
use crate::features::FEATURE_COUNT;

/// Zero-mean, unit-variance transform. Constant features keep a scale of 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Row]) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.iter()) {
                *m += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut scale = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                scale[j] += (v - mean[j]).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, row: &Row) -> Result<Row, ClassifierError> {
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.mean.len(),
                actual: FEATURE_COUNT,
            });
        }
        let mut out = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            out[j] = (row[j] - self.mean[j]) / self.scale[j];
        }
        Ok(out)
    }

    pub fn transform_all(&self, rows: &[Row]) -> Result<Vec<Row>, ClassifierError> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_centers_and_scales() {
        let rows = vec![[1.0; FEATURE_COUNT], [3.0; FEATURE_COUNT]];
        let scaler = StandardScaler::fit(&rows);
        assert_eq!(scaler.mean, vec![2.0; FEATURE_COUNT]);
        assert_eq!(scaler.scale, vec![1.0; FEATURE_COUNT]);
        let t = scaler.transform(&rows[1]).unwrap();
        assert!((t[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_feature_keeps_unit_scale() {
        let rows = vec![[5.0; FEATURE_COUNT]; 4];
        let scaler = StandardScaler::fit(&rows);
        assert!(scaler.scale.iter().all(|s| *s == 1.0));
        assert_eq!(scaler.transform(&rows[0]).unwrap(), [0.0; FEATURE_COUNT]);
    }
}
