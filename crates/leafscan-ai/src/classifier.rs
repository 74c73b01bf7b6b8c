//! Tree-ensemble classification of image embeddings.
//!
//! Reads a fitted random forest exported in scikit-learn's node-array layout
//! (`children_left`, `children_right`, `feature`, `threshold`, `value`) and
//! scores embeddings by letting every tree vote. Internal nodes route left
//! when `x[feature] <= threshold`, as scikit-learn does.

use std::path::Path;

use leafscan_core::{ClassProbability, Embedding, PipelineError, Prediction, Voting};
use serde::Deserialize;
use tracing::{error, info};

use crate::labels::LabelCodec;

/// scikit-learn marks leaves with `children_left == children_right == -1`.
const TREE_LEAF: i64 = -1;

/// On-disk forest as written by the export script.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestArtifact {
    /// Embedding length the forest was fit against.
    pub n_features: usize,
    /// Fitted class order, when the codec is bundled with the forest.
    #[serde(default)]
    pub classes: Option<Vec<String>>,
    pub trees: Vec<TreeArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeArtifact {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights; only leaf rows are read.
    pub value: Vec<Vec<f64>>,
}

impl ForestArtifact {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::artifact(path, e))?;
        serde_json::from_str(&text).map_err(|e| PipelineError::artifact(path, e))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Arg-max of the leaf distribution, lowest index on ties.
        class: usize,
        /// Leaf weights normalized to sum to 1.
        distribution: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Validate one exported tree. Children must point strictly forward, so
    /// traversal always terminates.
    fn from_artifact(
        t: &TreeArtifact,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self, String> {
        let n = t.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if t.children_right.len() != n
            || t.feature.len() != n
            || t.threshold.len() != n
            || t.value.len() != n
        {
            return Err(format!(
                "node arrays disagree in length: left={n} right={} feature={} threshold={} value={}",
                t.children_right.len(),
                t.feature.len(),
                t.threshold.len(),
                t.value.len()
            ));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (t.children_left[i], t.children_right[i]);
            if left == TREE_LEAF || right == TREE_LEAF {
                if left != right {
                    return Err(format!("node {i} has exactly one child"));
                }
                nodes.push(leaf_node(i, &t.value[i], n_classes)?);
                continue;
            }

            let child = |c: i64| -> Result<usize, String> {
                usize::try_from(c)
                    .ok()
                    .filter(|&c| c > i && c < n)
                    .ok_or_else(|| format!("node {i} has invalid child {c}"))
            };
            let feature = usize::try_from(t.feature[i])
                .ok()
                .filter(|&f| f < n_features)
                .ok_or_else(|| {
                    format!(
                        "node {i} splits on feature {} but embedding has {n_features}",
                        t.feature[i]
                    )
                })?;
            let threshold = t.threshold[i];
            if !threshold.is_finite() {
                return Err(format!("node {i} has non-finite threshold"));
            }
            nodes.push(Node::Split {
                feature,
                threshold,
                left: child(left)?,
                right: child(right)?,
            });
        }
        Ok(Self { nodes })
    }

    fn leaf(&self, x: &[f32]) -> (usize, &[f64]) {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    i = if f64::from(x[*feature]) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf {
                    class,
                    distribution,
                } => return (*class, distribution),
            }
        }
    }
}

fn leaf_node(i: usize, weights: &[f64], n_classes: usize) -> Result<Node, String> {
    if weights.len() != n_classes {
        return Err(format!(
            "leaf {i} has {} class weights, label set has {n_classes}",
            weights.len()
        ));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(format!("leaf {i} has a negative or non-finite weight"));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(format!("leaf {i} has no weight"));
    }
    Ok(Node::Leaf {
        class: argmax(weights),
        distribution: weights.iter().map(|w| w / total).collect(),
    })
}

/// Index of the largest value; the lowest index wins ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Fitted forest plus the label codec that names its classes.
pub struct Classifier {
    trees: Vec<Tree>,
    n_features: usize,
    codec: LabelCodec,
    voting: Voting,
}

impl Classifier {
    /// Validate an artifact against its codec.
    ///
    /// `labels` is the standalone codec artifact, if any. When the forest also
    /// bundles its classes the two must agree exactly.
    pub fn from_artifact(
        artifact: &ForestArtifact,
        labels: Option<LabelCodec>,
        voting: Voting,
    ) -> Result<Self, PipelineError> {
        let bundled = artifact.classes.clone().map(LabelCodec::new).transpose()?;
        let codec = match (bundled, labels) {
            (Some(b), Some(l)) => {
                b.ensure_same(&l)?;
                l
            }
            (Some(c), None) | (None, Some(c)) => c,
            (None, None) => {
                return Err(PipelineError::InvalidArtifact(
                    "forest has no bundled classes and no label artifact was given".into(),
                ));
            }
        };

        if artifact.n_features == 0 {
            return Err(PipelineError::InvalidArtifact("forest declares zero features".into()));
        }
        if artifact.trees.is_empty() {
            return Err(PipelineError::InvalidArtifact("forest has no trees".into()));
        }

        let trees = artifact
            .trees
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Tree::from_artifact(t, artifact.n_features, codec.len())
                    .map_err(|e| PipelineError::InvalidArtifact(format!("tree {i}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            trees,
            n_features: artifact.n_features,
            codec,
            voting,
        })
    }

    /// Load and validate a forest file.
    pub fn load(
        path: &Path,
        labels: Option<LabelCodec>,
        voting: Voting,
    ) -> Result<Self, PipelineError> {
        let artifact = ForestArtifact::load(path)?;
        let clf = Self::from_artifact(&artifact, labels, voting).map_err(|e| match e {
            PipelineError::InvalidArtifact(reason) => PipelineError::artifact(path, reason),
            other => other,
        })?;
        info!(
            trees = clf.n_trees(),
            features = clf.n_features,
            classes = clf.codec.len(),
            voting = ?voting,
            path = %path.display(),
            "loaded forest classifier"
        );
        Ok(clf)
    }

    /// Embedding length the forest was fit against.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn voting(&self) -> Voting {
        self.voting
    }

    /// Per-class vote fractions in codec order.
    pub fn probabilities(&self, embedding: &[f32]) -> Result<Vec<f64>, PipelineError> {
        if embedding.len() != self.n_features {
            error!(
                expected = self.n_features,
                actual = embedding.len(),
                "embedding reached classifier with wrong length"
            );
            return Err(PipelineError::ShapeMismatch {
                expected: self.n_features,
                actual: embedding.len(),
            });
        }

        let mut acc = vec![0.0f64; self.codec.len()];
        for tree in &self.trees {
            let (class, distribution) = tree.leaf(embedding);
            match self.voting {
                Voting::Hard => acc[class] += 1.0,
                Voting::Soft => {
                    for (a, p) in acc.iter_mut().zip(distribution) {
                        *a += p;
                    }
                }
            }
        }

        let n = self.trees.len() as f64;
        for a in &mut acc {
            *a /= n;
        }
        Ok(acc)
    }

    /// Classify one embedding: plurality label plus the full distribution.
    pub fn classify(&self, embedding: &Embedding) -> Result<Prediction, PipelineError> {
        let probs = self.probabilities(embedding.as_slice())?;
        let class_index = argmax(&probs);
        let label = self.codec.decode(class_index)?.to_string();

        let probabilities = self
            .codec
            .names()
            .iter()
            .zip(probs)
            .map(|(name, probability)| ClassProbability {
                label: name.clone(),
                probability,
            })
            .collect();

        Ok(Prediction {
            label,
            class_index,
            probabilities,
        })
    }
}
