//! End-to-end scenarios exercising `Engine` as a whole, one test per
//! documented capture/link/search/graph behavior.

use std::collections::BTreeSet;

use forest_engine::core::config::{Config, DegreeCapPolicy, EmbedProvider};
use forest_engine::document::ChunkStrategy;
use forest_engine::engine::Engine;
use forest_engine::search::MetadataCriteria;

fn open_engine(semantic_threshold: f32, tag_threshold: f32) -> (tempfile::TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.db_path = dir.path().to_path_buf();
    config.embed_provider = EmbedProvider::Mock;
    config.semantic_threshold = semantic_threshold;
    config.tag_threshold = tag_threshold;
    config.degree_cap_policy = DegreeCapPolicy::Unlimited;
    let engine = Engine::open(&config).unwrap();
    (dir, engine)
}

/// S1: capture three notes; shared tags drive the auto-linking.
#[test]
fn capture_and_link() {
    let (_dir, engine) = open_engine(0.5, 0.3);

    let a = engine.capture(Some("Rust Programming"), "memory safety focus").unwrap();
    let b = engine.capture(Some("Knowledge Graphs"), "semantic graphs link concepts").unwrap();
    let c = engine.capture(Some("Auto-linking"), "rust algorithm to link notes automatically").unwrap();
    engine.add_tag(a.id, "rust").unwrap();
    engine.add_tag(c.id, "rust").unwrap();
    engine.add_tag(b.id, "link").unwrap();
    engine.add_tag(c.id, "link").unwrap();

    let edges = engine.list_edges(&forest_engine::core::types::EdgeFilter::default());
    assert!((2..=3).contains(&edges.len()), "expected 2-3 accepted edges, got {}", edges.len());
    assert!(edges.iter().any(|e| e.touches(a.id) && e.touches(c.id)));

    for edge in &edges {
        let (lo, hi) = if edge.source_id < edge.target_id {
            (edge.source_id, edge.target_id)
        } else {
            (edge.target_id, edge.source_id)
        };
        assert_eq!(edge.source_id, lo);
        assert_eq!(edge.target_id, hi);
    }

    let report = engine.degree_report();
    assert_eq!(report.mismatched, 0);
}

/// S2: the A-C edge's explanation carries the shared-tag breakdown.
#[test]
fn edge_explain_breaks_down_tag_and_semantic_score() {
    let (_dir, engine) = open_engine(0.5, 0.3);

    let a = engine.capture(Some("Rust Programming"), "memory safety focus").unwrap();
    let c = engine.capture(Some("Auto-linking"), "rust algorithm to link notes automatically").unwrap();
    engine.add_tag(a.id, "rust").unwrap();
    engine.add_tag(c.id, "rust").unwrap();

    let explanation = engine.explain_edge(a.id, c.id).unwrap();
    assert!(explanation.edge.shared_tags.contains(&"rust".to_string()));
    assert!(explanation.jaccard.is_some());
    assert!(explanation.avg_idf.is_some());
    assert!(explanation.max_idf >= explanation.avg_idf.unwrap());
}

/// S3: editing one section of a three-section document only touches
/// that section's chunk, and the canonical body reassembles untouched.
#[test]
fn document_edit_touches_only_changed_section() {
    let (_dir, engine) = open_engine(0.5, 0.3);

    let body = "# One\nfirst section body\n# Two\nsecond section body\n# Three\nthird section body\n";
    let outcome = engine.import_document(Some("Guide"), body, ChunkStrategy::Headers, "import").unwrap();
    assert_eq!(outcome.document.version, 1);
    assert_eq!(outcome.chunk_nodes.len(), 3);

    let buffer = engine.render_document_edit_buffer(outcome.document.id).unwrap();
    let edited = buffer.replace("second section body", "second section body, revised");

    let result = engine.apply_document_edit_buffer(outcome.document.id, &edited).unwrap();
    assert_eq!(result.document.version, 2);
    assert_eq!(result.touched_node_ids.len(), 1);
    assert!(result.document.body.contains("first section body"));
    assert!(result.document.body.contains("second section body, revised"));
    assert!(result.document.body.contains("third section body"));
}

/// A byte-identical edit buffer is a no-op: no section's checksum
/// changes, so the document stays at its current version.
#[test]
fn document_edit_with_no_changes_is_a_no_op() {
    let (_dir, engine) = open_engine(0.5, 0.3);

    let body = "# One\nfirst section body\n# Two\nsecond section body\n";
    let outcome = engine.import_document(Some("Guide"), body, ChunkStrategy::Headers, "import").unwrap();
    assert_eq!(outcome.document.version, 1);

    let buffer = engine.render_document_edit_buffer(outcome.document.id).unwrap();
    let result = engine.apply_document_edit_buffer(outcome.document.id, &buffer).unwrap();

    assert_eq!(result.document.version, 1);
    assert!(result.touched_node_ids.is_empty());
    assert_eq!(result.document.body, outcome.document.body);
}

/// S4: renaming a tag moves every owner and merges the TagIDF rows.
#[test]
fn tag_rename_moves_every_owner() {
    let (_dir, engine) = open_engine(0.5, 0.3);

    for i in 0..10 {
        let node = engine.capture(None, &format!("rust note number {}", i)).unwrap();
        engine.add_tag(node.id, "rust").unwrap();
    }
    for i in 0..3 {
        let node = engine.capture(None, &format!("rust-lang note number {}", i)).unwrap();
        engine.add_tag(node.id, "rust-lang").unwrap();
    }

    let report = engine.rename_tag("rust", "rust-lang").unwrap();
    assert_eq!(report.nodes_updated, 10);

    let merged = engine.metadata_search(&MetadataCriteria {
        tags_all: Some(BTreeSet::from(["rust-lang".to_string()])),
        ..Default::default()
    });
    assert_eq!(merged.len(), 13);

    let stale = engine.metadata_search(&MetadataCriteria {
        tags_all: Some(BTreeSet::from(["rust".to_string()])),
        ..Default::default()
    });
    assert!(stale.is_empty());
}

/// S5: a semantic query over a chunked document collapses chunk hits
/// onto the document's root node.
#[test]
fn semantic_search_collapses_chunk_hits_onto_document_root() {
    let (_dir, engine) = open_engine(0.0, 0.0);

    let body = "# Intro\nintroductory material\n# Safety\nmemory safety is the focus of this section\n\
        # Usage\nhow to use the library\n# Notes\nmiscellaneous closing notes\n";
    let outcome = engine.import_document(Some("Handbook"), body, ChunkStrategy::Headers, "import").unwrap();

    engine.capture(Some("Standalone A"), "completely unrelated gardening content").unwrap();
    engine.capture(Some("Standalone B"), "completely unrelated cooking content").unwrap();
    engine.capture(Some("Standalone C"), "memory safety discussion in rust").unwrap();

    let hits = engine.semantic_search("memory safety", 10, 0.0, None).unwrap();
    let root_hits: Vec<_> = hits.iter().filter(|h| h.node.id == outcome.root_node.id).collect();
    assert_eq!(root_hits.len(), 1, "document root must appear exactly once");

    for chunk in &outcome.chunk_nodes {
        assert!(!hits.iter().any(|h| h.node.id == chunk.id), "chunk nodes must not appear directly");
    }
}

/// S6: a six-node chain has a five-hop shortest path that breaks once
/// an interior node is removed.
#[test]
fn shortest_path_chain_breaks_on_node_removal() {
    let (_dir, engine) = open_engine(0.5, 0.3);

    let mut ids = Vec::new();
    for i in 0..6 {
        ids.push(engine.capture(None, &format!("chain node {}", i)).unwrap().id);
    }
    for pair in ids.windows(2) {
        engine.link_manual(pair[0], pair[1], 0.8).unwrap();
    }

    let result = engine.shortest_path(ids[0], ids[5]);
    assert!(result.found);
    assert_eq!(result.steps.len(), 5);

    engine.delete_node(ids[3]).unwrap();
    let broken = engine.shortest_path(ids[0], ids[5]);
    assert!(!broken.found);
}
