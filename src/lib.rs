//! # threadgraph
//!
//! Turns conversation threads from Twitter and Hacker News into argument
//! graphs: every post becomes an atom node, every reply relation a scheme
//! node that an entailment service may label as support or attack.
//!
//! ## Quick Start
//!
//! ### As a Command
//!
//! ```bash
//! threadgraph twitter tweets.jsonl data/twitter --min-interactions 1 --max-depth 5
//! threadgraph hn items.jsonl data/hn --parallel
//! threadgraph annotate export data/twitter --pattern "**/*.json"
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use threadgraph::prelude::*;
//! use std::path::Path;
//!
//! let batch = threadgraph::twitter::load(Path::new("tweets.jsonl")).unwrap();
//! let config = PipelineConfig::default();
//! let layout = OutputLayout::prepare("data/twitter", &config).unwrap();
//!
//! let pipeline = Pipeline::new(&config, &layout).unwrap();
//! let report = pipeline.run(&batch.conversations(), false);
//! println!("stored {} graphs", report.serialized);
//! ```
//!
//! ## Crate Structure
//!
//! - `threadgraph-core` - Posts, graph model, expansion, pruning, pipeline
//! - `threadgraph-sources` - Twitter and Hacker News dump parsers
//! - `threadgraph-storage` - Graph documents, output layout, rendering, annotation
//! - `threadgraph-api` - gRPC entailment client

// Re-export core types
pub use threadgraph_core::{
    config, expand, normalize, prune, AtomNode, Author, BatchReport, Bounds, Conversation,
    ConversationOutcome, Entailment, EntailmentClassifier, EntailmentRequest, Error, Graph,
    GraphConfig, GraphSink, Metrics, Node, NodeId, Participant, Pipeline, PipelineConfig, Post,
    ReplyIndex, Result, SchemeNode, SchemeType, TextConfig,
};

// Re-export sources
pub use threadgraph_sources::{hn, twitter, SourceBatch};

// Re-export storage
pub use threadgraph_storage::{annotation, format, render, AnnotationSet, OutputLayout};

// Re-export API
pub use threadgraph_api::{connect_classifier, GrpcEntailmentClassifier};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AnnotationSet, AtomNode, Author, Bounds, Conversation, EntailmentClassifier, Error, Graph,
        GraphConfig, GraphSink, GrpcEntailmentClassifier, OutputLayout, Pipeline, PipelineConfig,
        Post, Result, SchemeNode, SchemeType, SourceBatch, TextConfig,
    };
}
