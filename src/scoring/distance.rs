/// Similarity metric for k-nearest vector queries
///
/// Every metric maps into `[0.0, 1.0]`, higher meaning closer, so vector
/// scores can be ranked alongside each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl DistanceMetric {
    /// `None` when the dimensions differ.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> Option<f32> {
        if a.len() != b.len() {
            return None;
        }
        if a.is_empty() {
            return Some(0.5);
        }

        let score = match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::Euclidean => euclidean_similarity(a, b),
            DistanceMetric::DotProduct => dot_product_similarity(a, b),
        };

        if score.is_nan() {
            return Some(0.5);
        }
        Some(score.clamp(0.0, 1.0))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::DotProduct => "dot_product",
        }
    }
}

// (cos + 1) / 2
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.5;
    }

    let cosine = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    (cosine + 1.0) / 2.0
}

// 1 / (1 + distance)
fn euclidean_similarity(a: &[f32], b: &[f32]) -> f32 {
    let distance_squared: f32 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum();

    1.0 / (1.0 + distance_squared.sqrt())
}

// Logistic squash of the raw dot product
fn dot_product_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    1.0 / (1.0 + (-dot).exp())
}
