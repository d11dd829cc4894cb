//! Oversampled hierarchical clustering with centroid-based deduplication.
//!
//! A median-linkage tree is built over the pairwise cosine distance matrix.
//! Every flat cluster of every exact-k cut (k = 1..n) whose size lies within
//! bounds becomes a candidate, so one entity usually appears in many
//! candidates. Candidates whose centroids nearly coincide are then folded
//! together in a single forward pass.

use std::collections::{HashMap, HashSet};

use autohist_core::HistogramConfig;
use autohist_core::vector::{cosine_distance_matrix, mean, normalized, unit_cosine_distance};
use tracing::{debug, info};

use crate::AiError;

/// Entity indices, ascending for candidates straight out of the tree.
pub type Cluster = Vec<usize>;

/// One agglomeration step. Nodes `0..n` are the leaves; the node created by
/// step `s` has id `n + s`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f32,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct LinkageTree {
    leaves: usize,
    merges: Vec<Merge>,
}

impl LinkageTree {
    /// Agglomerate with the median (WPGMC) update rule:
    ///
    /// `d(k, i∪j) = sqrt(d(k,i)²/2 + d(k,j)²/2 − d(i,j)²/4)`
    ///
    /// applied to the given dissimilarities. The closest pair is merged at each
    /// step; ties go to the lowest slot index.
    pub fn median(distances: &[Vec<f32>]) -> Result<Self, AiError> {
        let n = distances.len();
        if let Some((i, row)) = distances.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(AiError::InvalidParameter {
                name: "distances",
                message: format!("row {i} has {} columns, expected {n}", row.len()),
            });
        }
        if n < 2 {
            return Ok(Self {
                leaves: n,
                merges: Vec::new(),
            });
        }

        let mut d = distances.to_vec();
        let mut active = vec![true; n];
        let mut node = (0..n).collect::<Vec<_>>();
        let mut size = vec![1usize; n];
        let mut nearest: Vec<usize> = (0..n).map(|i| nearest_active(&d, &active, i)).collect();
        let mut merges = Vec::with_capacity(n - 1);

        for step in 0..n - 1 {
            let mut a = usize::MAX;
            let mut best = f32::INFINITY;
            for i in (0..n).filter(|&i| active[i]) {
                let dist = d[i][nearest[i]];
                if a == usize::MAX || dist < best {
                    a = i;
                    best = dist;
                }
            }
            let (a, b) = (a.min(nearest[a]), a.max(nearest[a]));
            let dist_ab = d[a][b];

            merges.push(Merge {
                left: node[a].min(node[b]),
                right: node[a].max(node[b]),
                distance: dist_ab,
                size: size[a] + size[b],
            });

            // The merged cluster takes slot `a`; slot `b` retires.
            active[b] = false;
            for k in (0..n).filter(|&k| active[k] && k != a) {
                let updated = ((d[k][a] * d[k][a] + d[k][b] * d[k][b]) / 2.0
                    - dist_ab * dist_ab / 4.0)
                    .max(0.0)
                    .sqrt();
                d[k][a] = updated;
                d[a][k] = updated;
            }
            size[a] += size[b];
            node[a] = n + step;

            for k in (0..n).filter(|&k| active[k]) {
                if k == a || nearest[k] == a || nearest[k] == b {
                    nearest[k] = nearest_active(&d, &active, k);
                } else {
                    let current = nearest[k];
                    if d[k][a] < d[k][current] || (d[k][a] == d[k][current] && a < current) {
                        nearest[k] = a;
                    }
                }
            }
        }

        Ok(Self { leaves: n, merges })
    }

    pub fn leaves(&self) -> usize {
        self.leaves
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Flat clusters after undoing the last `k - 1` merges: exactly `k`
    /// clusters, ordered by their smallest member.
    pub fn cut(&self, k: usize) -> Result<Vec<Cluster>, AiError> {
        let n = self.leaves;
        if k == 0 || k > n {
            return Err(AiError::InvalidParameter {
                name: "k",
                message: format!("must be in 1..={n}, got {k}"),
            });
        }

        let mut parent: Vec<usize> = (0..n + self.merges.len()).collect();
        for (step, merge) in self.merges.iter().take(n - k).enumerate() {
            parent[merge.left] = n + step;
            parent[merge.right] = n + step;
        }

        let mut clusters: Vec<Cluster> = Vec::with_capacity(k);
        let mut slot_of_root = HashMap::new();
        for leaf in 0..n {
            let mut root = leaf;
            while parent[root] != root {
                root = parent[root];
            }
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[slot].push(leaf);
        }
        Ok(clusters)
    }

    /// Every distinct flat cluster across all cuts k = 1..n whose size is in
    /// `[min_size, max_size]`.
    ///
    /// Each tree node is a flat cluster for a contiguous range of k, so nodes
    /// are enumerated in the order the cuts would first produce them: by the
    /// smallest k containing them, then by smallest member.
    pub fn oversample(&self, min_size: usize, max_size: usize) -> Vec<Cluster> {
        let n = self.leaves;
        if n == 0 {
            return Vec::new();
        }

        // Members are only materialized for nodes small enough to qualify.
        let mut members: Vec<Cluster> = (0..n).map(|i| vec![i]).collect();
        let mut first_k = vec![1usize; n + self.merges.len()];
        for (step, merge) in self.merges.iter().enumerate() {
            let joined = if merge.size <= max_size {
                let mut joined = members[merge.left].clone();
                joined.extend_from_slice(&members[merge.right]);
                joined.sort_unstable();
                joined
            } else {
                Vec::new()
            };
            members.push(joined);
            first_k[merge.left] = n - step;
            first_k[merge.right] = n - step;
        }

        let mut nodes: Vec<usize> = (0..members.len())
            .filter(|&id| !members[id].is_empty())
            .filter(|&id| (min_size..=max_size).contains(&members[id].len()))
            .collect();
        nodes.sort_by_key(|&id| (first_k[id], members[id][0]));

        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(nodes.len());
        for id in nodes {
            if seen.insert(members[id].clone()) {
                candidates.push(std::mem::take(&mut members[id]));
            }
        }
        candidates
    }
}

fn nearest_active(d: &[Vec<f32>], active: &[bool], i: usize) -> usize {
    let mut best = usize::MAX;
    for j in (0..d.len()).filter(|&j| j != i && active[j]) {
        if best == usize::MAX || d[i][j] < d[i][best] {
            best = j;
        }
    }
    best
}

/// Fold together candidates whose centroids are closer than `threshold`.
///
/// Single forward pass over the original enumeration order: for each
/// surviving candidate `i`, every later unconsumed `j` with
/// `distance(centroid_i, centroid_j) < threshold` is absorbed into `i`.
/// Centroids are those of the original candidates, and an absorbed candidate
/// is not compared again, so merging is not transitive. Members are
/// deduplicated keeping first occurrence.
pub fn merge_by_centroid(clusters: &[Cluster], embeddings: &[Vec<f32>], threshold: f32) -> Vec<Cluster> {
    let centroids: Vec<Vec<f32>> = clusters
        .iter()
        .map(|c| {
            let centroid = mean(c.iter().map(|&i| embeddings[i].as_slice())).unwrap_or_default();
            normalized(&centroid)
        })
        .collect();

    let mut consumed = vec![false; clusters.len()];
    let mut merged = Vec::new();
    for i in 0..clusters.len() {
        if consumed[i] {
            continue;
        }
        let mut members = clusters[i].clone();
        for j in (i + 1)..clusters.len() {
            if consumed[j] {
                continue;
            }
            if unit_cosine_distance(&centroids[i], &centroids[j]) < threshold {
                members.extend_from_slice(&clusters[j]);
                consumed[j] = true;
            }
        }

        let mut seen = HashSet::new();
        members.retain(|m| seen.insert(*m));
        merged.push(members);
    }

    debug!(
        before = clusters.len(),
        after = merged.len(),
        "merged near-duplicate clusters"
    );
    merged
}

/// Cluster size bounds and merge threshold for one run.
#[derive(Debug, Clone, Copy)]
pub struct ClusteringEngine {
    pub min_size: usize,
    pub max_size: usize,
    pub merge_threshold: f32,
}

impl Default for ClusteringEngine {
    fn default() -> Self {
        Self::from_config(&HistogramConfig::default())
    }
}

impl ClusteringEngine {
    pub fn from_config(config: &HistogramConfig) -> Self {
        Self {
            min_size: config.min_cluster_size,
            max_size: config.max_cluster_size,
            merge_threshold: config.merge_threshold,
        }
    }

    /// Pre-merge candidates from a distance matrix. Member sets are pairwise
    /// distinct and sized within bounds.
    pub fn candidates(&self, distances: &[Vec<f32>]) -> Result<Vec<Cluster>, AiError> {
        let tree = LinkageTree::median(distances)?;
        Ok(tree.oversample(self.min_size, self.max_size))
    }

    /// Candidates over `embeddings`, then centroid-merged.
    pub fn cluster(&self, embeddings: &[Vec<f32>]) -> Result<Vec<Cluster>, AiError> {
        let distances = cosine_distance_matrix(embeddings);
        let candidates = self.candidates(&distances)?;
        let merged = merge_by_centroid(&candidates, embeddings, self.merge_threshold);
        info!(
            entities = embeddings.len(),
            candidates = candidates.len(),
            clusters = merged.len(),
            "clustered entities"
        );
        Ok(merged)
    }
}
