//! Isolation forest outlier model
//!
//! Each tree recursively partitions a random subsample of the batch on a
//! random feature at a random split value. Points that are isolated after
//! few splits get short average path lengths and therefore high anomaly
//! scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of trees in the ensemble
pub const DEFAULT_TREES: usize = 100;

/// Upper bound on rows drawn per tree
pub const DEFAULT_MAX_SAMPLES: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Untrained forest parameters
#[derive(Debug, Clone)]
pub struct IsolationForest {
    pub n_trees: usize,
    pub max_samples: usize,
    pub seed: Option<u64>,
}

impl IsolationForest {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
            seed,
        }
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees.max(1);
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples.max(1);
        self
    }

    /// Grow the ensemble on `data` (one row per observation)
    ///
    /// The returned model borrows nothing from `data` and is meant to be
    /// dropped once the batch has been scored.
    pub fn fit(&self, data: &[Vec<f64>]) -> FittedForest {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let subsample = self.max_samples.min(data.len()).max(1);
        let depth_limit = (subsample as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..self.n_trees)
            .map(|_| {
                let indices = if subsample >= data.len() {
                    (0..data.len()).collect()
                } else {
                    rand::seq::index::sample(&mut rng, data.len(), subsample).into_vec()
                };
                grow(data, indices, 0, depth_limit, &mut rng)
            })
            .collect();

        FittedForest { trees, subsample }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

fn grow(
    data: &[Vec<f64>],
    indices: Vec<usize>,
    depth: usize,
    depth_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= depth_limit || indices.len() <= 1 {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Only features that still vary inside this node can separate points
    let width = data[indices[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (lo, hi) = indices.iter().fold(
                (f64::INFINITY, f64::NEG_INFINITY),
                |(lo, hi), &i| (lo.min(data[i][feature]), hi.max(data[i][feature])),
            );
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    // Interpolate rather than sample `lo..hi`: the span of finite values
    // can itself overflow to infinity
    let t: f64 = rng.gen();
    let threshold = lo * (1.0 - t) + hi * t;

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| data[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(data, left, depth + 1, depth_limit, rng)),
        right: Box::new(grow(data, right, depth + 1, depth_limit, rng)),
    }
}

/// Forest fitted on one batch
#[derive(Debug)]
pub struct FittedForest {
    trees: Vec<Node>,
    subsample: usize,
}

impl FittedForest {
    /// Anomaly score in (0, 1]; values near 1 are outliers, ~0.5 or less are not
    pub fn score(&self, row: &[f64]) -> f64 {
        let norm = average_path_length(self.subsample);
        if norm <= 0.0 || self.trees.is_empty() {
            return 0.5;
        }

        let mean_depth = self
            .trees
            .iter()
            .map(|tree| path_length(tree, row, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        2f64.powf(-mean_depth / norm)
    }

    pub fn score_all(&self, data: &[Vec<f64>]) -> Vec<f64> {
        data.iter().map(|row| self.score(row)).collect()
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let value = row.get(*feature).copied().unwrap_or(0.0);
            if value < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linearly interpolated percentile, `q` in [0, 1]
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}
