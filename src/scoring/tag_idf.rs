//! Corpus-wide tag statistics, playing the role of the teacher's
//! `scoring::scorer::DocStats` (collection-wide numbers computed once per
//! rescore and handed to every pair score).

use std::collections::BTreeMap;

use crate::core::types::Node;

pub struct TagIdfContext {
    pub idf: BTreeMap<String, f64>,
    pub max_idf: f64,
}

impl TagIdfContext {
    pub fn build(nodes: &[Node]) -> Self {
        let total_nodes = nodes.len().max(1) as f64;

        let mut doc_frequency: BTreeMap<String, u32> = BTreeMap::new();
        for node in nodes {
            for tag in &node.tags {
                *doc_frequency.entry(tag.clone()).or_insert(0) += 1;
            }
        }

        let mut idf = BTreeMap::new();
        let mut max_idf = 0.0f64;
        for (tag, frequency) in doc_frequency {
            let value = (total_nodes / (frequency as f64).max(1.0)).ln();
            max_idf = max_idf.max(value);
            idf.insert(tag, value);
        }

        TagIdfContext { idf, max_idf }
    }

    pub fn idf_of(&self, tag: &str) -> f64 {
        self.idf.get(tag).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with_tags(tags: &[&str]) -> Node {
        let mut node = Node::new("Title".into(), "Body".into());
        node.tags = tags.iter().map(|t| t.to_string()).collect();
        node
    }

    #[test]
    fn rare_tags_have_higher_idf_than_common_ones() {
        let nodes = vec![
            node_with_tags(&["rust"]),
            node_with_tags(&["rust"]),
            node_with_tags(&["rust"]),
            node_with_tags(&["rare"]),
        ];
        let ctx = TagIdfContext::build(&nodes);
        assert!(ctx.idf_of("rare") > ctx.idf_of("rust"));
        assert!((ctx.max_idf - ctx.idf_of("rare")).abs() < 1e-9);
    }

    #[test]
    fn unknown_tag_has_zero_idf() {
        let ctx = TagIdfContext::build(&[node_with_tags(&["rust"])]);
        assert_eq!(ctx.idf_of("never-seen"), 0.0);
    }
}
