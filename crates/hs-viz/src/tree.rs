use hs_inference::{CartNode, IllustrativeTree};
use serde::{Deserialize, Serialize};

/// One node of a renderable tree diagram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDiagramNode {
    /// Node id; children reference these ids.
    pub id: usize,
    /// Depth below the root.
    pub depth: usize,
    /// Display label: split rule for decision nodes, class for leaves.
    pub label: String,
    /// Rows reaching the node.
    pub n: usize,
    /// Rows per outcome category.
    pub class_counts: Vec<usize>,
    /// Child ids `[left, right]` for decision nodes, empty for leaves.
    pub children: Vec<usize>,
}

/// Tree diagram artifact (plot-friendly JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDiagramArtifact {
    /// Flat node list; node 0 is the root.
    pub nodes: Vec<TreeDiagramNode>,
    /// Outcome category labels, in ordinal order.
    pub class_labels: Vec<String>,
    /// Observed outcome range of each category, aligned with labels.
    pub class_ranges: Vec<(f64, f64)>,
    /// Rows used to grow the tree.
    pub n_train: usize,
}

impl From<&IllustrativeTree> for TreeDiagramArtifact {
    fn from(fitted: &IllustrativeTree) -> Self {
        let nodes = fitted.tree.nodes.iter().map(|node| diagram_node(node, fitted)).collect();
        Self {
            nodes,
            class_labels: fitted.tree.class_labels.clone(),
            class_ranges: fitted.category_ranges.clone(),
            n_train: fitted.n_train,
        }
    }
}

fn diagram_node(node: &CartNode, fitted: &IllustrativeTree) -> TreeDiagramNode {
    let (label, children) = match &node.split {
        Some(split) => (
            format!("{} <= {:.4}", split.feature, split.threshold),
            vec![split.left, split.right],
        ),
        None => {
            let class = fitted
                .tree
                .class_labels
                .get(node.predicted_class)
                .cloned()
                .unwrap_or_else(|| node.predicted_class.to_string());
            (class, Vec::new())
        }
    };
    TreeDiagramNode {
        id: node.id,
        depth: node.depth,
        label,
        n: node.n,
        class_counts: node.class_counts.clone(),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_core::{Column, DataFrame};
    use hs_inference::{IllustrativeTreeConfig, illustrative_tree};

    fn fitted_tree() -> IllustrativeTree {
        let n = 100;
        let treatment = vec![1.0; n];
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let outcome: Vec<f64> = x.iter().map(|v| v * 3.0).collect();
        let clean = DataFrame::from_columns(vec![
            Column::numeric("treatment", treatment),
            Column::numeric("profit_change", outcome),
            Column::numeric("assets_total_bl", x),
        ])
        .unwrap();
        let config = IllustrativeTreeConfig {
            covariates: vec!["assets_total_bl".to_string()],
            seed: 5,
            ..Default::default()
        };
        illustrative_tree(&clean, &config).unwrap()
    }

    #[test]
    fn test_diagram_roots_and_children_consistent() {
        let fitted = fitted_tree();
        let artifact = TreeDiagramArtifact::from(&fitted);

        assert_eq!(artifact.nodes[0].id, 0);
        assert_eq!(artifact.n_train, fitted.n_train);
        assert_eq!(artifact.class_labels.len(), 5);

        for node in &artifact.nodes {
            for &child in &node.children {
                assert!(child < artifact.nodes.len());
                assert_eq!(artifact.nodes[child].depth, node.depth + 1);
            }
            if node.children.is_empty() {
                // Leaf labels name an outcome category.
                assert!(artifact.class_labels.contains(&node.label), "label {}", node.label);
            } else {
                assert!(node.label.contains("assets_total_bl"));
            }
        }
    }
}
