//! Read-mostly traversal views over the accepted-edge graph (spec §4.7).
//! The best-first frontier ordering follows the teacher's
//! `search::results::TopKCollector`/`ScoredDocument` max-heap pattern;
//! Dijkstra's relaxation loop is otherwise unrelated to anything in the
//! teacher (it has no graph-shortest-path concept at all).

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::core::id::NodeId;
use crate::core::types::{Edge, EdgeFilter, EdgeStatus, Node, NodeFilter};
use crate::store::Store;

pub struct GraphService<'a> {
    store: &'a Store,
}

#[derive(Debug, Clone, Default)]
pub struct NeighborhoodResult {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone)]
pub struct PathStep {
    pub node: Node,
    pub incoming_edge: Option<Edge>,
}

#[derive(Debug, Clone)]
pub struct PathResult {
    pub found: bool,
    pub steps: Vec<PathStep>,
    pub total_distance: f32,
}

#[derive(Debug, Clone)]
pub struct DegreeOffender {
    pub node_id: NodeId,
    pub stored: u32,
    pub actual: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DegreeReport {
    pub mismatched: usize,
    pub max_delta: u32,
    pub offenders: Vec<DegreeOffender>,
}

struct ScoredHop {
    score: f32,
    depth: u32,
    edge: Edge,
    node_id: NodeId,
}

impl PartialEq for ScoredHop {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for ScoredHop {}
impl PartialOrd for ScoredHop {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredHop {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score)
    }
}

#[derive(Clone)]
struct DijkstraEntry {
    distance: f32,
    node_id: NodeId,
}

impl PartialEq for DijkstraEntry {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl Eq for DijkstraEntry {}
impl PartialOrd for DijkstraEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DijkstraEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance)
    }
}

impl<'a> GraphService<'a> {
    pub fn new(store: &'a Store) -> Self {
        GraphService { store }
    }

    /// Best-first BFS expansion over accepted edges of any type, capped at
    /// `limit` nodes, never exceeding `depth` hops from `node_id`.
    pub fn neighborhood(&self, node_id: NodeId, depth: u32, limit: usize) -> NeighborhoodResult {
        let mut visited = HashSet::new();
        visited.insert(node_id);

        let mut frontier = BinaryHeap::new();
        for edge in self.accepted_edges_touching(node_id) {
            if let Some(other) = edge.other(node_id) {
                frontier.push(ScoredHop { score: edge.score, depth: 1, edge, node_id: other });
            }
        }

        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        while let Some(hop) = frontier.pop() {
            if nodes.len() >= limit {
                break;
            }
            if visited.contains(&hop.node_id) {
                continue;
            }
            visited.insert(hop.node_id);

            let Some(node) = self.store.get_node(hop.node_id) else { continue };
            edges.push(hop.edge.clone());
            let at_depth = hop.depth;
            nodes.push(node);

            if at_depth < depth {
                for edge in self.accepted_edges_touching(hop.node_id) {
                    if let Some(next) = edge.other(hop.node_id) {
                        if !visited.contains(&next) {
                            frontier.push(ScoredHop { score: edge.score, depth: at_depth + 1, edge, node_id: next });
                        }
                    }
                }
            }
        }

        NeighborhoodResult { nodes, edges }
    }

    /// Dijkstra over the accepted-edge graph with edge weight `1 - score`,
    /// so a perfectly-scored edge costs nothing and a near-threshold edge
    /// costs nearly one hop-equivalent.
    pub fn shortest_path(&self, from: NodeId, to: NodeId) -> PathResult {
        if from == to {
            let steps = self.store.get_node(from).map(|node| vec![PathStep { node, incoming_edge: None }]).unwrap_or_default();
            return PathResult { found: !steps.is_empty(), steps, total_distance: 0.0 };
        }

        let mut distance: HashMap<NodeId, f32> = HashMap::new();
        let mut predecessor: HashMap<NodeId, (NodeId, Edge)> = HashMap::new();
        let mut heap = BinaryHeap::new();

        distance.insert(from, 0.0);
        heap.push(Reverse(DijkstraEntry { distance: 0.0, node_id: from }));

        while let Some(Reverse(current)) = heap.pop() {
            if current.node_id == to {
                break;
            }
            if current.distance > *distance.get(&current.node_id).unwrap_or(&f32::INFINITY) {
                continue;
            }

            for edge in self.accepted_edges_touching(current.node_id) {
                let Some(next) = edge.other(current.node_id) else { continue };
                let weight = (1.0 - edge.score).max(0.0);
                let candidate = current.distance + weight;

                if candidate < *distance.get(&next).unwrap_or(&f32::INFINITY) {
                    distance.insert(next, candidate);
                    predecessor.insert(next, (current.node_id, edge));
                    heap.push(Reverse(DijkstraEntry { distance: candidate, node_id: next }));
                }
            }
        }

        let Some(&total_distance) = distance.get(&to) else {
            return PathResult { found: false, steps: vec![], total_distance: f32::INFINITY };
        };

        let mut steps = Vec::new();
        let mut cursor = to;
        while cursor != from {
            let Some((previous, edge)) = predecessor.get(&cursor).cloned() else {
                return PathResult { found: false, steps: vec![], total_distance: f32::INFINITY };
            };
            let Some(node) = self.store.get_node(cursor) else {
                return PathResult { found: false, steps: vec![], total_distance: f32::INFINITY };
            };
            steps.push(PathStep { node, incoming_edge: Some(edge) });
            cursor = previous;
        }
        let Some(start_node) = self.store.get_node(from) else {
            return PathResult { found: false, steps: vec![], total_distance: f32::INFINITY };
        };
        steps.push(PathStep { node: start_node, incoming_edge: None });
        steps.reverse();

        PathResult { found: true, steps, total_distance }
    }

    /// Compares each node's stored `accepted_degree` counter to its true
    /// degree in the accepted edge set; reports up to 10 sample offenders.
    pub fn degree_report(&self) -> DegreeReport {
        let nodes = self.store.list_nodes(&NodeFilter { include_chunks: true, ..Default::default() });

        let mut actual: HashMap<NodeId, u32> = HashMap::new();
        for edge in self.store.list_edges(&EdgeFilter::default()) {
            if edge.status == EdgeStatus::Accepted {
                *actual.entry(edge.source_id).or_insert(0) += 1;
                *actual.entry(edge.target_id).or_insert(0) += 1;
            }
        }

        let mut offenders: Vec<DegreeOffender> = Vec::new();
        let mut max_delta = 0;

        for node in &nodes {
            let actual_degree = actual.get(&node.id).copied().unwrap_or(0);
            if actual_degree != node.accepted_degree {
                let delta = node.accepted_degree.abs_diff(actual_degree);
                max_delta = max_delta.max(delta);
                offenders.push(DegreeOffender { node_id: node.id, stored: node.accepted_degree, actual: actual_degree });
            }
        }

        let mismatched = offenders.len();
        offenders.sort_by_key(|o| Reverse(o.stored.abs_diff(o.actual)));
        offenders.truncate(10);

        DegreeReport { mismatched, max_delta, offenders }
    }

    pub fn hot_nodes(&self, k: usize) -> Vec<Node> {
        let mut nodes = self.store.list_nodes(&NodeFilter { include_chunks: true, ..Default::default() });
        nodes.sort_by(|a, b| b.accepted_degree.cmp(&a.accepted_degree).then_with(|| b.updated_at.cmp(&a.updated_at)));
        nodes.truncate(k);
        nodes
    }

    pub fn recent_nodes(&self, k: usize) -> Vec<Node> {
        let mut nodes = self.store.list_nodes(&NodeFilter { include_chunks: true, ..Default::default() });
        nodes.truncate(k);
        nodes
    }

    fn accepted_edges_touching(&self, node_id: NodeId) -> Vec<Edge> {
        self.store
            .list_edges(&EdgeFilter { node_id: Some(node_id), edge_type: None })
            .into_iter()
            .filter(|e| e.status == EdgeStatus::Accepted)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::types::EdgeType;

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.db_path = dir.path().to_path_buf();
        let store = Store::open(&config).unwrap();
        (dir, store)
    }

    fn link(store: &Store, a: NodeId, b: NodeId, score: f32) {
        let edge = Edge::normalized(a, b, score, Some(score), None, vec![], EdgeType::Semantic, serde_json::Value::Null);
        store.upsert_edge(edge).unwrap();
    }

    #[test]
    fn neighborhood_expands_best_scoring_edges_first_and_respects_limit() {
        let (_dir, store) = open_store();
        let a = Node::new("A".into(), "a".into());
        let b = Node::new("B".into(), "b".into());
        let c = Node::new("C".into(), "c".into());
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();
        store.insert_node(c).unwrap();
        link(&store, a_id, b_id, 0.9);
        link(&store, a_id, c_id, 0.6);

        let graph = GraphService::new(&store);
        let result = graph.neighborhood(a_id, 1, 1);
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, b_id);
    }

    #[test]
    fn shortest_path_prefers_high_score_route() {
        let (_dir, store) = open_store();
        let a = Node::new("A".into(), "a".into());
        let b = Node::new("B".into(), "b".into());
        let c = Node::new("C".into(), "c".into());
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();
        store.insert_node(c).unwrap();
        link(&store, a_id, b_id, 0.9);
        link(&store, b_id, c_id, 0.9);
        link(&store, a_id, c_id, 0.1);

        let graph = GraphService::new(&store);
        let path = graph.shortest_path(a_id, c_id);
        assert!(path.found);
        assert_eq!(path.steps.len(), 3);
        assert_eq!(path.steps[1].node.id, b_id);
    }

    #[test]
    fn shortest_path_reports_not_found_when_disconnected() {
        let (_dir, store) = open_store();
        let a = Node::new("A".into(), "a".into());
        let b = Node::new("B".into(), "b".into());
        let (a_id, b_id) = (a.id, b.id);
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();

        let graph = GraphService::new(&store);
        let path = graph.shortest_path(a_id, b_id);
        assert!(!path.found);
    }

    #[test]
    fn degree_report_is_clean_when_counters_track_accepted_edges() {
        let (_dir, store) = open_store();
        let a = Node::new("A".into(), "a".into());
        let b = Node::new("B".into(), "b".into());
        let (a_id, b_id) = (a.id, b.id);
        store.insert_node(a).unwrap();
        store.insert_node(b).unwrap();
        link(&store, a_id, b_id, 0.9);

        let graph = GraphService::new(&store);
        let report = graph.degree_report();
        assert_eq!(report.mismatched, 0);
        assert_eq!(store.get_node(a_id).unwrap().accepted_degree, 1);
    }
}
