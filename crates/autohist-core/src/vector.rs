//! Dense vector helpers shared by clustering, classification, and search.
//!
//! Embeddings are plain `Vec<f32>`. Cosine distance is `1 - cos(a, b)` on
//! L2-normalised inputs; Euclidean distance operates on raw vectors.

/// L2-normalize a vector in place.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Return an L2-normalized copy.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize(&mut out);
    out
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine distance between two vectors, normalizing both first.
///
/// Clamped at zero: rounding can push `1 - cos` slightly negative for
/// near-identical vectors.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - dot(&normalized(a), &normalized(b))).max(0.0)
}

/// Cosine distance between two vectors that are already unit length.
pub fn unit_cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - dot(a, b)).max(0.0)
}

pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Element-wise mean of a set of vectors. `None` for an empty set.
pub fn mean<'a, I>(vectors: I) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = vectors.into_iter();
    let first = iter.next()?;
    let mut sum = first.to_vec();
    let mut count = 1usize;
    for v in iter {
        for (acc, &val) in sum.iter_mut().zip(v) {
            *acc += val;
        }
        count += 1;
    }
    for x in &mut sum {
        *x /= count as f32;
    }
    Some(sum)
}

/// Full pairwise cosine distance matrix, `D[i][j] = 1 - cos(e_i, e_j)`.
pub fn cosine_distance_matrix(embeddings: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let unit: Vec<Vec<f32>> = embeddings.iter().map(|e| normalized(e)).collect();
    let n = unit.len();
    let mut matrix = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = unit_cosine_distance(&unit[i], &unit[j]);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    matrix
}
