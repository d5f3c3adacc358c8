use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use super::{LogRegModel, sigmoid};
use crate::error::ClassifierError;
use crate::ml::rows::FeatureRows;

/// Training options for the logistic regression base learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRegOptions {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
    pub batch_size: usize,
    /// Weight each class by `total / (2 * count)`.
    pub balance_classes: bool,
}

impl Default for LogRegOptions {
    fn default() -> Self {
        Self {
            epochs: 20,
            learning_rate: 0.1,
            l2: 1e-4,
            batch_size: 128,
            balance_classes: false,
        }
    }
}

/// Mini-batch SGD on the weighted log loss. Inputs are assumed validated.
pub fn train_logreg<X: FeatureRows>(
    x: &X,
    y: &[u8],
    options: &LogRegOptions,
    seed: u64,
) -> Result<LogRegModel, ClassifierError> {
    let dim = x.n_cols();
    let rows: Vec<Vec<(usize, f64)>> = (0..x.n_rows()).map(|row| x.row_entries(row)).collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut weights: Vec<f64> = (0..dim)
        .map(|_| (rng.random::<f64>() - 0.5) * 0.01)
        .collect();
    let mut bias = 0.0f64;

    let class_weights = if options.balance_classes {
        let mut counts = [0f64; 2];
        for &label in y {
            counts[label as usize] += 1.0;
        }
        let total = counts[0] + counts[1];
        counts.map(|count| if count == 0.0 { 0.0 } else { total / (2.0 * count) })
    } else {
        [1.0, 1.0]
    };

    let mut indices: Vec<usize> = (0..rows.len()).collect();
    let batch_size = options.batch_size.max(1);
    let lr = options.learning_rate;
    let l2 = options.l2.max(0.0);

    for _epoch in 0..options.epochs {
        indices.shuffle(&mut rng);
        for chunk in indices.chunks(batch_size) {
            let mut grad_w = vec![0.0f64; dim];
            let mut grad_b = 0.0f64;
            let mut batch_weight = 0.0f64;
            for &idx in chunk {
                let label = y[idx];
                let weight = class_weights[label as usize];
                if weight == 0.0 {
                    continue;
                }
                let entries = &rows[idx];
                let logit = entries
                    .iter()
                    .fold(bias, |sum, &(col, value)| sum + weights[col] * value);
                let diff = (sigmoid(logit) - label as f64) * weight;
                for &(col, value) in entries {
                    grad_w[col] += diff * value;
                }
                grad_b += diff;
                batch_weight += weight;
            }
            if batch_weight == 0.0 {
                continue;
            }
            let inv = 1.0 / batch_weight;
            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= lr * (g * inv + l2 * *w);
            }
            bias -= lr * grad_b * inv;
        }
    }

    let model = LogRegModel { weights, bias };
    model.validate()?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn same_seed_gives_identical_weights() {
        let x = array![[1.0, 0.0, 2.0], [0.0, 1.0, 0.5], [1.0, 1.0, 0.0]];
        let y = [1, 0, 1];
        let a = train_logreg(&x, &y, &LogRegOptions::default(), 11).unwrap();
        let b = train_logreg(&x, &y, &LogRegOptions::default(), 11).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
    }

    #[test]
    fn balanced_weights_shift_bias_toward_minority() {
        let x = array![[0.0], [0.0], [0.0], [0.0]];
        let y = [0, 0, 0, 1];
        let options = LogRegOptions {
            epochs: 300,
            learning_rate: 0.5,
            l2: 0.0,
            ..LogRegOptions::default()
        };
        let plain = train_logreg(&x, &y, &options, 3).unwrap();
        let balanced = train_logreg(
            &x,
            &y,
            &LogRegOptions {
                balance_classes: true,
                ..options
            },
            3,
        )
        .unwrap();
        assert!(plain.bias < 0.0);
        assert!(balanced.bias > plain.bias);
    }
}
