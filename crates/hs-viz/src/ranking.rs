use serde::{Deserialize, Serialize};

/// Covariate-importance ranking artifact (plot-friendly JSON).
///
/// This is the data product behind a horizontal importance bar chart:
/// covariates sorted by their share of (depth-weighted) forest splits,
/// most important first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceArtifact {
    /// Covariate names, descending by score.
    pub names: Vec<String>,
    /// Importance scores aligned with `names`; scores sum to 1 over the
    /// full (untruncated) ranking.
    pub scores: Vec<f64>,
    /// Covariates in the fitted model, including any truncated away.
    pub n_covariates: usize,
}

impl ImportanceArtifact {
    /// Rank `scores` over `names`, keeping the top `top_k` entries
    /// (everything when `None`). Ties break by name for stable output.
    pub fn rank(names: &[String], scores: &[f64], top_k: Option<usize>) -> Self {
        let mut order: Vec<usize> = (0..names.len().min(scores.len())).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| names[a].cmp(&names[b]))
        });
        if let Some(k) = top_k {
            order.truncate(k);
        }

        Self {
            names: order.iter().map(|&i| names[i].clone()).collect(),
            scores: order.iter().map(|&i| scores[i]).collect(),
            n_covariates: names.len(),
        }
    }

    /// Top-ranked covariate names, for seeding downstream displays.
    pub fn top_names(&self, k: usize) -> Vec<String> {
        self.names.iter().take(k).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_sorts_descending() {
        let names: Vec<String> =
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let scores = [0.2, 0.5, 0.3];
        let artifact = ImportanceArtifact::rank(&names, &scores, None);
        assert_eq!(artifact.names, vec!["b", "c", "a"]);
        assert_eq!(artifact.scores, vec![0.5, 0.3, 0.2]);
        assert_eq!(artifact.n_covariates, 3);
    }

    #[test]
    fn test_rank_truncates_but_reports_total() {
        let names: Vec<String> =
            ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let scores = [0.1, 0.4, 0.3, 0.2];
        let artifact = ImportanceArtifact::rank(&names, &scores, Some(2));
        assert_eq!(artifact.names, vec!["b", "c"]);
        assert_eq!(artifact.n_covariates, 4);
        assert_eq!(artifact.top_names(1), vec!["b"]);
    }

    #[test]
    fn test_serializes_to_parallel_arrays() {
        let names: Vec<String> = vec!["x".to_string()];
        let artifact = ImportanceArtifact::rank(&names, &[1.0], None);
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["names"][0], "x");
        assert_eq!(json["scores"][0], 1.0);
    }
}
