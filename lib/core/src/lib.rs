//! # threadgraph Core
//!
//! Core library for turning conversation threads into argument graphs.
//!
//! This crate provides the data model and the construction pipeline:
//!
//! - [`Post`] / [`Author`] - Source records as delivered by a parser
//! - [`ReplyIndex`] - Parent id to ordered direct replies
//! - [`Graph`] - Atom and scheme nodes in an id-indexed arena
//! - [`expand`] - Filtered depth-first expansion of the reply tree
//! - [`prune`] - Depth-based branch removal
//! - [`Pipeline`] - Per-conversation orchestration up to a [`GraphSink`]
//!
//! ## Example
//!
//! ```rust
//! use threadgraph_core::{Post, ReplyIndex, Graph, AtomNode, TextConfig, Participants, expand, prune};
//!
//! let posts = vec![
//!     Post::new("1").with_text("Cats are better than dogs"),
//!     Post::new("2").with_text("@op No way").replying_to("1"),
//! ];
//!
//! let mut graph = Graph::new();
//! let root = graph.add_node(AtomNode::new("1", "Cats are better than dogs")).unwrap();
//! graph.set_major_claim(root).unwrap();
//!
//! let index = ReplyIndex::build(&posts);
//! expand(&mut graph, root, &index, &Participants::new(), &TextConfig::default(), None).unwrap();
//! prune(&mut graph, 0, None).unwrap();
//!
//! assert_eq!(graph.atom("2").unwrap().text, "No way");
//! ```

pub mod config;
pub mod entailment;
pub mod error;
pub mod expand;
pub mod filter;
pub mod graph;
pub mod participant;
pub mod pipeline;
pub mod post;
pub mod prune;
pub mod reply_index;

/// Text normalization
///
/// Strips leading mentions and short links, collapses whitespace.
pub mod text;

pub use config::{Bounds, GraphConfig, PipelineConfig, TextConfig};
pub use entailment::{Entailment, EntailmentClassifier, EntailmentRequest};
pub use error::{Error, Result};
pub use expand::{expand, ExpansionReport};
pub use filter::{Rejection, ReplyFilter};
pub use graph::{AtomNode, Edge, EdgeId, Graph, Node, NodeId, SchemeNode, SchemeType};
pub use participant::{build_participants, Participant, Participants};
pub use pipeline::{BatchReport, Conversation, ConversationOutcome, GraphSink, Pipeline, Stage};
pub use post::{Author, Metrics, Post, Reference, ReferenceKind};
pub use prune::{prune, PruneReport};
pub use reply_index::ReplyIndex;
pub use text::normalize;
