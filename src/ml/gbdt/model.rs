use crate::ml::logreg::sigmoid;

/// Node of a binary regression tree stored in a flat arena.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        /// Rows with `!(value > threshold)` go left, NaN included.
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Regression tree predicting a raw-score increment. Node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn leaf(value: f64) -> Self {
        Self {
            nodes: vec![TreeNode::Leaf { value }],
        }
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = features.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if value > *threshold { *right } else { *left };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    pub(crate) fn leaf_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            TreeNode::Leaf { value } => Some(*value),
            TreeNode::Split { .. } => None,
        })
    }
}

/// Boosted ensemble for binary log loss.
#[derive(Debug, Clone, PartialEq)]
pub struct GbdtModel {
    pub n_features: usize,
    pub learning_rate: f64,
    /// Log-odds of the weighted positive rate.
    pub init_raw: f64,
    pub trees: Vec<RegressionTree>,
}

impl GbdtModel {
    pub fn predict_raw(&self, features: &[f64]) -> f64 {
        self.trees.iter().fold(self.init_raw, |raw, tree| {
            raw + self.learning_rate * tree.predict(features)
        })
    }

    /// Probability of label 1.
    pub fn predict_probability(&self, features: &[f64]) -> f64 {
        sigmoid(self.predict_raw(features))
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.init_raw.is_finite()
            && self
                .trees
                .iter()
                .all(|tree| tree.leaf_values().all(f64::is_finite))
    }
}
