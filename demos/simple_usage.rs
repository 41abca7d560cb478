/// Complete Forest Engine API Demo
///
/// Demonstrates the major engine operations:
/// - Capture (insert + auto-link)
/// - Tagging and tag rename
/// - Semantic search
/// - Graph queries (neighborhood, shortest path)
/// - Admin operations and health checks

use forest_engine::core::config::{Config, EmbedProvider};
use forest_engine::engine::Engine;
use forest_engine::search::MetadataCriteria;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== Forest Engine - API Demo ===\n");

    println!("Opening engine...");
    let dir = tempfile::tempdir()?;
    let mut config = Config::default();
    config.db_path = dir.path().to_path_buf();
    config.embed_provider = EmbedProvider::Mock;
    let engine = Engine::open(&config)?;
    println!("Done!\n");

    println!("Step 1: CAPTURE - Adding notes...");
    let rust_note = engine.capture(Some("Rust Programming"), "Learn Rust ownership and borrowing")?;
    let db_note = engine.capture(Some("Database Systems"), "SQL and NoSQL storage engines")?;
    let web_note = engine.capture(Some("Web Development"), "Building web apps with Rust frameworks")?;
    println!("  Captured 3 notes\n");

    println!("Step 2: TAG - Adding tags...");
    engine.add_tag(rust_note.id, "rust")?;
    engine.add_tag(web_note.id, "rust")?;
    println!("  Tagged 2 notes 'rust'\n");

    println!("Step 3: SEARCH - Querying notes...");
    let hits = engine.semantic_search("rust ownership", 5, 0.0, None)?;
    println!("  'rust ownership': {} results", hits.len());
    let tagged = engine.metadata_search(&MetadataCriteria {
        tags_all: Some(std::collections::BTreeSet::from(["rust".to_string()])),
        ..Default::default()
    });
    println!("  tag:rust: {} results\n", tagged.len());

    println!("Step 4: EXPLAIN - Scoring breakdown...");
    let explanation = engine.explain_edge(rust_note.id, web_note.id)?;
    println!("  score={:.3} sharedTags={:?}\n", explanation.edge.score, explanation.edge.shared_tags);

    println!("Step 5: RENAME TAG - rust -> rust-lang...");
    let report = engine.rename_tag("rust", "rust-lang")?;
    println!("  {} notes updated\n", report.nodes_updated);

    println!("Step 6: GRAPH - Neighborhood and path...");
    let neighborhood = engine.neighborhood(rust_note.id, 1, 10)?;
    println!("  neighborhood: {} nodes, {} edges", neighborhood.nodes.len(), neighborhood.edges.len());
    let path = engine.shortest_path(rust_note.id, db_note.id);
    println!("  path found: {}\n", path.found);

    println!("Step 7: ADMIN - Rescore and degree counters...");
    let rescore_report = engine.rescore_all()?;
    println!("  rescored {} candidates, {} accepted", rescore_report.candidates, rescore_report.accepted);
    let repair_report = engine.rebuild_degree_counters()?;
    println!("  checked {} nodes, repaired {}\n", repair_report.nodes_checked, repair_report.nodes_repaired);

    println!("Step 8: STATS - Engine metrics:");
    let stats = engine.stats();
    println!("  Nodes:    {}", stats.node_count);
    println!("  Edges:    {}", stats.edge_count);
    println!("  Provider: {}\n", stats.embed_provider);

    println!("Step 9: HEALTH CHECK - System status:");
    let health = engine.health_check();
    println!("  Status: {:?}", health.status);
    for check in &health.checks {
        println!("    - {}: {:?}", check.name, check.status);
    }

    println!("\n=== Demo complete ===\n");

    Ok(())
}
