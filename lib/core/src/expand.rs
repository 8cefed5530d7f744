//! Reply tree expansion.
//!
//! Starting from the major claim, every reply that passes the filters
//! becomes an atom node linked to its parent through a scheme node. A
//! rejected reply is never descended into, so its whole subtree stays out
//! of the graph. Traversal is depth-first pre-order driven by an explicit
//! stack, so arbitrarily deep threads do not grow the native call stack.

use crate::config::TextConfig;
use crate::entailment::{classify_schemes, EntailmentClassifier};
use crate::error::{Error, Result};
use crate::filter::{Rejection, ReplyFilter};
use crate::graph::{AtomNode, Graph, Node, NodeId, SchemeNode};
use crate::participant::Participants;
use crate::post::Post;
use crate::reply_index::ReplyIndex;
use crate::text::normalize;
use std::collections::BTreeMap;
use tracing::debug;

/// What happened during one expansion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionReport {
    pub accepted: usize,
    pub rejected: BTreeMap<Rejection, usize>,
    /// Replies reached a second time (multiple parents or a reply cycle)
    pub revisited: usize,
    /// Schemes labeled support or attack by the classifier
    pub classified: usize,
}

impl ExpansionReport {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

/// Build the atom node for a post from its already normalized text
pub fn atom_from_post(post: &Post, text: String, participants: &Participants, userdata: &[String]) -> AtomNode {
    let participant = post
        .author_id
        .as_deref()
        .and_then(|author| participants.get(author))
        .cloned();

    AtomNode::new(post.id.clone(), text)
        .with_created(post.created_at)
        .with_participant(participant)
        .with_userdata(post.userdata(userdata))
}

/// Expand the replies below `parent` into `graph`.
///
/// When a classifier is given, all accepted schemes are classified in one
/// batch once the traversal finished; a classifier error aborts the
/// expansion.
pub fn expand(
    graph: &mut Graph,
    parent: NodeId,
    index: &ReplyIndex<'_>,
    participants: &Participants,
    config: &TextConfig,
    classifier: Option<&dyn EntailmentClassifier>,
) -> Result<ExpansionReport> {
    let parent_key = graph
        .node(parent)
        .map(|node| node.id().to_string())
        .ok_or_else(|| Error::NodeNotFound(parent.to_string()))?;

    let filter = ReplyFilter::new(config);
    let mut report = ExpansionReport::default();
    let mut schemes = Vec::new();

    // Reversed so that popping yields replies in index order
    let mut stack: Vec<(&Post, NodeId)> = index
        .replies(&parent_key)
        .iter()
        .rev()
        .map(|post| (*post, parent))
        .collect();

    while let Some((post, parent)) = stack.pop() {
        let text = normalize(post.text.as_deref(), config.clean).unwrap_or_default();

        if let Err(reason) = filter
            .check_text(post, &text)
            .and_then(|_| filter.check_engagement(post))
        {
            debug!(post = %post.id, %reason, "reply rejected");
            *report.rejected.entry(reason).or_default() += 1;
            continue;
        }

        if graph.node_id(&post.id).is_some() {
            debug!(post = %post.id, "reply already in graph, skipping");
            report.revisited += 1;
            continue;
        }

        let parent_key = match graph.node(parent) {
            Some(Node::Atom(atom)) => atom.id.clone(),
            _ => return Err(Error::NodeNotFound(parent.to_string())),
        };

        let child = graph.add_node(atom_from_post(post, text, participants, &config.userdata))?;
        let scheme = graph.connect(child, SchemeNode::between(&post.id, &parent_key), parent)?;
        schemes.push(scheme);
        report.accepted += 1;

        stack.extend(index.replies(&post.id).iter().rev().map(|reply| (*reply, child)));
    }

    if let Some(classifier) = classifier {
        report.classified = classify_schemes(graph, &schemes, &config.language, classifier)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Bounds;
    use crate::entailment::{Entailment, EntailmentRequest};
    use crate::graph::SchemeType;
    use crate::participant::build_participants;
    use crate::post::{Author, Metrics};

    fn root_graph(root: &Post) -> (Graph, NodeId) {
        let mut graph = Graph::new();
        let id = graph
            .add_node(AtomNode::new(root.id.clone(), root.text.clone().unwrap_or_default()))
            .unwrap();
        graph.set_major_claim(id).unwrap();
        (graph, id)
    }

    fn run(posts: &[Post], config: &TextConfig) -> (Graph, ExpansionReport) {
        let (mut graph, root) = root_graph(&posts[0]);
        let index = ReplyIndex::build(posts);
        let report = expand(&mut graph, root, &index, &Participants::new(), config, None).unwrap();
        (graph, report)
    }

    fn atom_ids(graph: &Graph) -> Vec<String> {
        graph.atoms().map(|a| a.id.clone()).collect()
    }

    /// Every non-root atom has exactly one path towards the root
    fn assert_tree(graph: &Graph) {
        let root = graph.major_claim().unwrap();
        assert!(graph.outgoing_nodes(root).is_empty());
        for (id, node) in graph.nodes() {
            if node.is_atom() && id != root {
                assert_eq!(graph.outgoing_atoms(id).len(), 1, "atom {} has not one parent", node.id());
                assert!(graph.node_distance(id, root, None).is_some());
            }
        }
    }

    #[test]
    fn test_engagement_rejects_reply() {
        let posts = vec![
            Post::new("1").with_text("A"),
            Post::new("2").with_text("B").replying_to("1").with_metrics(Metrics::new(5, 0, 0, 0)),
            Post::new("3").with_text("C").replying_to("1"),
        ];
        let config = TextConfig {
            interactions: Bounds::at_least(1),
            ..TextConfig::default()
        };

        let (graph, report) = run(&posts, &config);
        assert_eq!(atom_ids(&graph), vec!["1", "2"]);
        assert!(graph.scheme("2,1").is_some());
        assert!(graph.scheme("3,1").is_none());
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected[&Rejection::Engagement], 1);
    }

    #[test]
    fn test_rejected_reply_drops_subtree() {
        let posts = vec![
            Post::new("1").with_text("root claim"),
            Post::new("2").with_text("no").replying_to("1"),
            Post::new("3").with_text("long enough").replying_to("2"),
            Post::new("4").with_text("also long enough").replying_to("3"),
            Post::new("5").with_text("sibling reply").replying_to("1"),
        ];
        let config = TextConfig {
            chars: Bounds::at_least(5),
            ..TextConfig::default()
        };

        let (graph, report) = run(&posts, &config);
        assert_eq!(atom_ids(&graph), vec!["1", "5"]);
        assert_eq!(report.rejected_total(), 1);
        assert_tree(&graph);
    }

    #[test]
    fn test_preorder_traversal() {
        let posts = vec![
            Post::new("1").with_text("root"),
            Post::new("2").with_text("a").replying_to("1"),
            Post::new("3").with_text("b").replying_to("1"),
            Post::new("4").with_text("a1").replying_to("2"),
            Post::new("5").with_text("a1x").replying_to("4"),
            Post::new("6").with_text("b1").replying_to("3"),
        ];

        let (graph, report) = run(&posts, &TextConfig::default());
        assert_eq!(atom_ids(&graph), vec!["1", "2", "4", "5", "3", "6"]);
        assert_eq!(report.accepted, 5);
        assert_tree(&graph);
    }

    #[test]
    fn test_text_is_normalized_and_language_checked() {
        let posts = vec![
            Post::new("1").with_text("root"),
            Post::new("2").with_text("@root  hello   there").replying_to("1").with_language("en"),
            Post::new("3").with_text("@root hallo").replying_to("1").with_language("de"),
            Post::new("4").with_text("@root @other").replying_to("1"),
        ];

        let (graph, report) = run(&posts, &TextConfig::default());
        assert_eq!(graph.atom("2").unwrap().text, "hello there");
        assert!(graph.atom("3").is_none());
        assert!(graph.atom("4").is_none());
        assert_eq!(report.rejected[&Rejection::Language], 1);
        assert_eq!(report.rejected[&Rejection::EmptyText], 1);
    }

    #[test]
    fn test_raw_text_kept() {
        let posts = vec![
            Post::new("1").with_text("root"),
            Post::new("2").with_text("@root  hello").replying_to("1"),
        ];
        let config = TextConfig {
            clean: false,
            ..TextConfig::default()
        };

        let (graph, _) = run(&posts, &config);
        assert_eq!(graph.atom("2").unwrap().text, "@root  hello");
    }

    #[test]
    fn test_participants_and_userdata_attached() {
        let posts = vec![
            Post::new("1").with_text("root"),
            Post::new("2")
                .with_text("reply")
                .replying_to("1")
                .with_author("u1")
                .with_extra("source", serde_json::json!("web"))
                .with_extra("internal", serde_json::json!(1)),
            Post::new("3").with_text("anonymous").replying_to("1").with_author("ghost"),
        ];
        let participants = build_participants(&[Author::new("u1").with_username("alice")]);

        let (mut graph, root) = root_graph(&posts[0]);
        let index = ReplyIndex::build(&posts);
        expand(&mut graph, root, &index, &participants, &TextConfig::default(), None).unwrap();

        let atom = graph.atom("2").unwrap();
        assert_eq!(atom.participant.as_ref().unwrap().username.as_deref(), Some("alice"));
        assert!(atom.userdata.contains_key("source"));
        assert!(!atom.userdata.contains_key("internal"));
        assert!(graph.atom("3").unwrap().participant.is_none());
        assert_eq!(graph.participants().count(), 1);
    }

    #[test]
    fn test_reply_cycle_is_not_followed() {
        let posts = vec![
            Post::new("1").with_text("root").replying_to("3"),
            Post::new("2").with_text("a").replying_to("1"),
            Post::new("3").with_text("b").replying_to("2"),
        ];

        let (graph, report) = run(&posts, &TextConfig::default());
        assert_eq!(atom_ids(&graph), vec!["1", "2", "3"]);
        assert_eq!(report.revisited, 1);
        assert_tree(&graph);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let depth = 20_000;
        let mut posts = vec![Post::new("0").with_text("root")];
        for i in 1..=depth {
            posts.push(Post::new(i.to_string()).with_text("reply").replying_to((i - 1).to_string()));
        }

        let (graph, report) = run(&posts, &TextConfig::default());
        assert_eq!(report.accepted, depth);
        assert_eq!(graph.atom_count(), depth + 1);
    }

    struct Fixed(Result<Vec<Entailment>>);

    impl EntailmentClassifier for Fixed {
        fn classify(&self, request: &EntailmentRequest) -> Result<Vec<Entailment>> {
            match &self.0 {
                Ok(answers) => Ok(answers.iter().copied().take(request.pairs.len()).collect()),
                Err(e) => Err(Error::Classifier(e.to_string())),
            }
        }
    }

    #[test]
    fn test_classifier_labels_schemes() {
        let posts = vec![
            Post::new("1").with_text("root"),
            Post::new("2").with_text("agree").replying_to("1"),
        ];
        let (mut graph, root) = root_graph(&posts[0]);
        let index = ReplyIndex::build(&posts);
        let classifier = Fixed(Ok(vec![Entailment::Entailment]));

        let report = expand(
            &mut graph,
            root,
            &index,
            &Participants::new(),
            &TextConfig::default(),
            Some(&classifier),
        )
        .unwrap();

        assert_eq!(report.classified, 1);
        assert_eq!(graph.scheme("2,1").unwrap().scheme_type, SchemeType::Support);
    }

    #[test]
    fn test_classifier_failure_aborts() {
        let posts = vec![
            Post::new("1").with_text("root"),
            Post::new("2").with_text("agree").replying_to("1"),
        ];
        let (mut graph, root) = root_graph(&posts[0]);
        let index = ReplyIndex::build(&posts);
        let classifier = Fixed(Err(Error::Classifier("unavailable".to_string())));

        let result = expand(
            &mut graph,
            root,
            &index,
            &Participants::new(),
            &TextConfig::default(),
            Some(&classifier),
        );
        assert!(matches!(result, Err(Error::Classifier(_))));
    }
}
