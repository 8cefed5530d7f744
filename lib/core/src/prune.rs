//! Depth pruning of a fully expanded graph.
//!
//! Every leaf must lie strictly deeper than `min_depth` and, when bounded, no
//! deeper than `max_depth` (depth counted in atom hops to the major claim).
//! A branch that is too shallow is removed up to the point where it joins a
//! surviving branch; a branch that is too deep is cut back to `max_depth`.
//! Nodes are only ever deleted once nothing points at them anymore.

use crate::error::{Error, Result};
use crate::graph::{Graph, Node, NodeId};
use ahash::AHashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed_atoms: usize,
    pub removed_schemes: usize,
    pub removed_participants: usize,
}

impl PruneReport {
    pub fn removed_nodes(&self) -> usize {
        self.removed_atoms + self.removed_schemes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    TooShallow,
    TooDeep(usize),
    Detached,
}

pub fn prune(graph: &mut Graph, min_depth: usize, max_depth: Option<usize>) -> Result<PruneReport> {
    let root = graph
        .major_claim()
        .ok_or_else(|| Error::NodeNotFound("major claim".to_string()))?;
    let mut report = PruneReport::default();

    // Cutting a deep branch back can expose a new leaf, so repeat until stable
    loop {
        let mut removed_any = false;
        // removing a branch never changes the depth of the atoms that stay
        let depths = graph.atom_depths(root);

        for leaf in graph.leaf_nodes() {
            if leaf == root || graph.node(leaf).is_none() {
                continue;
            }

            let Some(violation) = check_leaf(graph, &depths, leaf, min_depth, max_depth) else {
                continue;
            };

            debug!(leaf = graph.node(leaf).map(Node::id).unwrap_or_default(), ?violation, "pruning branch");
            removed_any |= remove_branch(graph, &depths, leaf, root, violation, &mut report) > 0;
        }

        if !removed_any {
            break;
        }
    }

    report.removed_participants = graph.clean_participants();
    Ok(report)
}

fn check_leaf(
    graph: &Graph,
    depths: &AHashMap<NodeId, usize>,
    leaf: NodeId,
    min_depth: usize,
    max_depth: Option<usize>,
) -> Option<Violation> {
    if !graph.node(leaf)?.is_atom() {
        // a scheme without a premise is not a relation
        return Some(Violation::Detached);
    }

    match depths.get(&leaf).copied() {
        None => Some(Violation::Detached),
        Some(distance) if distance <= min_depth => Some(Violation::TooShallow),
        Some(distance) => match max_depth {
            Some(max) if distance > max => Some(Violation::TooDeep(max)),
            _ => None,
        },
    }
}

fn remove_branch(
    graph: &mut Graph,
    depths: &AHashMap<NodeId, usize>,
    leaf: NodeId,
    root: NodeId,
    violation: Violation,
    report: &mut PruneReport,
) -> usize {
    let mut worklist = vec![leaf];
    let mut removed = 0;

    while let Some(node) = worklist.pop() {
        if node == root || !graph.incoming_nodes(node).is_empty() {
            continue;
        }

        let is_atom = match graph.node(node) {
            Some(n) => n.is_atom(),
            None => continue,
        };

        if let Violation::TooDeep(max) = violation {
            if is_atom && depths.get(&node).is_some_and(|depth| *depth <= max) {
                continue;
            }
        }

        let next = graph.outgoing_nodes(node);
        graph.remove_node(node);
        removed += 1;
        if is_atom {
            report.removed_atoms += 1;
        } else {
            report.removed_schemes += 1;
        }

        worklist.extend(next);
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AtomNode, SchemeNode};
    use crate::participant::Participant;
    use crate::post::Author;
    use std::sync::Arc;

    /// Build a graph from `(child, parent)` pairs; "1" is the major claim
    fn tree(pairs: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        let root = graph.add_node(AtomNode::new("1", "root")).unwrap();
        graph.set_major_claim(root).unwrap();
        for (child, parent) in pairs {
            let c = graph.add_node(AtomNode::new(*child, "text")).unwrap();
            let p = graph.node_id(parent).unwrap();
            graph.connect(c, SchemeNode::between(child, parent), p).unwrap();
        }
        graph
    }

    fn atom_ids(graph: &Graph) -> Vec<String> {
        graph.atoms().map(|a| a.id.clone()).collect()
    }

    fn assert_no_dangling_schemes(graph: &Graph) {
        for (id, node) in graph.nodes() {
            if !node.is_atom() {
                assert_eq!(graph.incoming_nodes(id).len(), 1);
                assert_eq!(graph.outgoing_nodes(id).len(), 1);
            }
        }
    }

    #[test]
    fn test_chain_cut_back_to_max_depth() {
        let mut graph = tree(&[("2", "1"), ("3", "2"), ("4", "3")]);

        let report = prune(&mut graph, 1, Some(2)).unwrap();
        assert_eq!(atom_ids(&graph), vec!["1", "2", "3"]);
        assert!(graph.scheme("4,3").is_none());
        assert_eq!(report.removed_atoms, 1);
        assert_eq!(report.removed_schemes, 1);
        assert_no_dangling_schemes(&graph);
    }

    #[test]
    fn test_deep_chain_with_side_branches() {
        // 1 <- 2 <- ... <- 2000, every tenth atom also has a single reply
        let ids: Vec<String> = (1..=2000).map(|i| i.to_string()).collect();
        let mut pairs: Vec<(String, String)> = ids.windows(2).map(|w| (w[1].clone(), w[0].clone())).collect();
        pairs.extend((10..=2000).step_by(10).map(|i| (format!("s{}", i), i.to_string())));
        let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(c, p)| (c.as_str(), p.as_str())).collect();
        let mut graph = tree(&borrowed);

        prune(&mut graph, 1, Some(12)).unwrap();

        let mut kept = atom_ids(&graph);
        kept.sort();
        let mut expected: Vec<String> = (1..=13).map(|i| i.to_string()).chain(["s10".to_string()]).collect();
        expected.sort();
        assert_eq!(kept, expected);
        assert_no_dangling_schemes(&graph);
    }

    #[test]
    fn test_shallow_branch_removed_up_to_fork() {
        // 1 <- 2 <- 3 <- 4 and 2 <- 5
        let mut graph = tree(&[("2", "1"), ("3", "2"), ("4", "3"), ("5", "2")]);

        prune(&mut graph, 2, None).unwrap();
        assert_eq!(atom_ids(&graph), vec!["1", "2", "3", "4"]);
        assert!(graph.scheme("5,2").is_none());
        assert_no_dangling_schemes(&graph);
    }

    #[test]
    fn test_whole_conversation_too_shallow() {
        let mut graph = tree(&[("2", "1"), ("3", "1")]);

        let report = prune(&mut graph, 1, None).unwrap();
        assert_eq!(atom_ids(&graph), vec!["1"]);
        assert_eq!(report.removed_nodes(), 4);
        assert!(graph.major_claim().is_some());
    }

    #[test]
    fn test_lone_major_claim_untouched() {
        let mut graph = tree(&[]);

        let report = prune(&mut graph, 5, Some(10)).unwrap();
        assert_eq!(atom_ids(&graph), vec!["1"]);
        assert_eq!(report.removed_nodes(), 0);
    }

    #[test]
    fn test_equal_bounds_leave_only_root() {
        let mut graph = tree(&[("2", "1"), ("3", "2"), ("4", "3")]);

        prune(&mut graph, 2, Some(2)).unwrap();
        assert_eq!(atom_ids(&graph), vec!["1"]);
    }

    #[test]
    fn test_default_bounds_keep_everything() {
        let mut graph = tree(&[("2", "1"), ("3", "2"), ("4", "1")]);

        let report = prune(&mut graph, 0, None).unwrap();
        assert_eq!(report, PruneReport::default());
        assert_eq!(graph.atom_count(), 4);
    }

    #[test]
    fn test_dangling_scheme_removed() {
        let mut graph = tree(&[("2", "1")]);
        let root = graph.major_claim().unwrap();
        let scheme = graph.add_node(SchemeNode::new("orphan")).unwrap();
        graph.add_edge(scheme, root).unwrap();

        prune(&mut graph, 0, None).unwrap();
        assert!(graph.scheme("orphan").is_none());
        assert_eq!(graph.atom_count(), 2);
    }

    #[test]
    fn test_stale_participants_dropped() {
        let mut graph = Graph::new();
        let alice = Arc::new(Participant::from_author(&Author::new("alice")));
        let bob = Arc::new(Participant::from_author(&Author::new("bob")));
        let root = graph.add_node(AtomNode::new("1", "root").with_participant(Some(alice))).unwrap();
        graph.set_major_claim(root).unwrap();
        let reply = graph.add_node(AtomNode::new("2", "reply").with_participant(Some(bob))).unwrap();
        graph.connect(reply, SchemeNode::between("2", "1"), root).unwrap();

        let report = prune(&mut graph, 1, None).unwrap();
        assert_eq!(report.removed_participants, 1);
        assert!(graph.participant("bob").is_none());
        assert!(graph.participant("alice").is_some());
    }

    #[test]
    fn test_missing_major_claim_is_an_error() {
        let mut graph = Graph::new();
        graph.add_node(AtomNode::new("1", "root")).unwrap();
        assert!(prune(&mut graph, 0, None).is_err());
    }

    /// Pseudo-random trees: every surviving leaf satisfies the bounds
    #[test]
    fn test_prune_completeness_on_generated_trees() {
        let mut seed: u64 = 0x5eed;
        let mut next = move |bound: usize| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
            ((seed >> 33) as usize) % bound
        };

        for _ in 0..50 {
            let size = 2 + next(40);
            let pairs: Vec<(String, String)> = (2..=size)
                .map(|i| (i.to_string(), (1 + next(i - 1)).to_string()))
                .collect();
            let borrowed: Vec<(&str, &str)> = pairs.iter().map(|(c, p)| (c.as_str(), p.as_str())).collect();
            let mut graph = tree(&borrowed);

            let min_depth = next(4);
            let max_depth = if next(2) == 0 { None } else { Some(min_depth + 1 + next(3)) };
            prune(&mut graph, min_depth, max_depth).unwrap();

            let root = graph.major_claim().unwrap();
            assert_no_dangling_schemes(&graph);
            for leaf in graph.leaf_nodes() {
                if leaf == root {
                    assert_eq!(graph.node_count(), 1);
                    continue;
                }
                let distance = graph.node_distance(leaf, root, None).unwrap();
                assert!(distance > min_depth);
                assert!(max_depth.map_or(true, |max| distance <= max));
            }
        }
    }
}
