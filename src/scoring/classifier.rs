//! Pretrained binary classifier for hand raises.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClassifierError, EngageError};

/// Predict + predict-probability contract of a hand-raise model.
pub trait HandRaiseClassifier: Send + Sync {
    /// Probability of the positive ("hand raised") class.
    fn predict_proba(&self, features: &[f32]) -> Result<f32, ClassifierError>;

    /// Positive when the positive class is the more likely one.
    fn predict(&self, features: &[f32]) -> Result<bool, ClassifierError> {
        Ok(self.predict_proba(features)? > 0.5)
    }
}

/// Node of a binary decision tree. Splits send `x[feature] <= threshold`
/// left; leaves hold per-class weights `[negative, positive]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
    Leaf {
        value: [f32; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Positive-class probability at the leaf reached by `features`.
    fn leaf_probability(&self, tree: usize, features: &[f32]) -> Result<f32, ClassifierError> {
        let malformed = |reason: String| ClassifierError::MalformedTree { tree, reason };

        let mut idx = 0;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => {
                    let sum = value[0] + value[1];
                    return Ok(if sum > 0.0 { value[1] / sum } else { 0.0 });
                }
                Some(&TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features
                        .get(feature)
                        .ok_or_else(|| malformed(format!("feature {feature} out of range")))?;
                    idx = if *x <= threshold { left } else { right };
                }
                None => return Err(malformed(format!("node {idx} does not exist"))),
            }
        }
        Err(malformed("cycle detected".to_string()))
    }
}

/// Tree ensemble exported from a trained random forest.
///
/// The probability is the mean of the per-tree leaf probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestClassifier {
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl ForestClassifier {
    pub fn new(n_features: usize, trees: Vec<DecisionTree>) -> Result<Self, EngageError> {
        let forest = Self { n_features, trees };
        forest.validate()?;
        Ok(forest)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, EngageError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EngageError::ModelLoad(format!("{}: {}", path.display(), e))
        })?;
        let forest: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EngageError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        forest.validate()?;
        info!(
            path = %path.display(),
            trees = forest.trees.len(),
            n_features = forest.n_features,
            "loaded hand-raise classifier"
        );
        Ok(forest)
    }

    fn validate(&self) -> Result<(), EngageError> {
        if self.n_features == 0 {
            return Err(EngageError::ModelLoad("n_features must be positive".into()));
        }
        if self.trees.is_empty() {
            return Err(EngageError::ModelLoad("forest has no trees".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(EngageError::ModelLoad(format!("tree {t} has no nodes")));
            }
            for node in &tree.nodes {
                if let TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } = *node
                {
                    if feature >= self.n_features
                        || left >= tree.nodes.len()
                        || right >= tree.nodes.len()
                    {
                        return Err(EngageError::ModelLoad(format!(
                            "tree {t} references a missing node or feature"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl HandRaiseClassifier for ForestClassifier {
    fn predict_proba(&self, features: &[f32]) -> Result<f32, ClassifierError> {
        if features.len() != self.n_features {
            return Err(ClassifierError::FeatureCount {
                expected: self.n_features,
                got: features.len(),
            });
        }
        let mut sum = 0.0;
        for (t, tree) in self.trees.iter().enumerate() {
            sum += tree.leaf_probability(t, features)?;
        }
        Ok(sum / self.trees.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single stump on feature 0 at 0.3.
    fn stump(low: [f32; 2], high: [f32; 2]) -> DecisionTree {
        DecisionTree {
            nodes: vec![
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.3,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn test_forest_averages_trees() {
        let forest = ForestClassifier::new(
            2,
            vec![stump([10.0, 0.0], [2.0, 8.0]), stump([1.0, 0.0], [0.0, 1.0])],
        )
        .unwrap();

        assert_eq!(forest.predict_proba(&[0.1, 0.0]).unwrap(), 0.0);
        assert!(!forest.predict(&[0.1, 0.0]).unwrap());

        let p = forest.predict_proba(&[0.5, 0.0]).unwrap();
        assert!((p - 0.9).abs() < 1e-6);
        assert!(forest.predict(&[0.5, 0.0]).unwrap());
    }

    #[test]
    fn test_feature_count_mismatch() {
        let forest = ForestClassifier::new(9, vec![stump([1.0, 0.0], [0.0, 1.0])]).unwrap();
        assert_eq!(
            forest.predict_proba(&[0.5]),
            Err(ClassifierError::FeatureCount {
                expected: 9,
                got: 1
            })
        );
    }

    #[test]
    fn test_rejects_dangling_child() {
        let tree = DecisionTree {
            nodes: vec![TreeNode::Split {
                feature: 0,
                threshold: 0.0,
                left: 1,
                right: 5,
            }],
        };
        assert!(matches!(
            ForestClassifier::new(1, vec![tree]),
            Err(EngageError::ModelLoad(_))
        ));
        assert!(ForestClassifier::new(1, vec![]).is_err());
    }

    #[test]
    fn test_cycle_is_reported() {
        let forest = ForestClassifier {
            n_features: 1,
            trees: vec![DecisionTree {
                nodes: vec![TreeNode::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 0,
                }],
            }],
        };
        assert!(matches!(
            forest.predict_proba(&[0.0]),
            Err(ClassifierError::MalformedTree { tree: 0, .. })
        ));
    }

    #[test]
    fn test_json_artifact() {
        let json = r#"{
            "n_features": 1,
            "trees": [{"nodes": [
                {"feature": 0, "threshold": 0.5, "left": 1, "right": 2},
                {"value": [3.0, 1.0]},
                {"value": [0.0, 4.0]}
            ]}]
        }"#;
        let forest: ForestClassifier = serde_json::from_str(json).unwrap();
        assert_eq!(forest.predict_proba(&[0.2]).unwrap(), 0.25);
        assert_eq!(forest.predict_proba(&[0.9]).unwrap(), 1.0);
    }
}
