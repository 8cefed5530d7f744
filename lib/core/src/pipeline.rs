// Per-conversation graph assembly: index, expand, prune, size gate, sink
use crate::config::PipelineConfig;
use crate::entailment::EntailmentClassifier;
use crate::error::{Error, Result};
use crate::expand::{atom_from_post, expand, ExpansionReport};
use crate::graph::Graph;
use crate::participant::build_participants;
use crate::post::{Author, Post};
use crate::prune::{prune, PruneReport};
use crate::reply_index::ReplyIndex;
use crate::text::normalize;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Processing stages of one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetched,
    Indexed,
    Expanded,
    Pruned,
    SizeChecked,
    Serialized,
    Discarded,
}

/// Posts and authors of a single conversation, borrowed from a source batch
#[derive(Debug, Clone)]
pub struct Conversation<'a> {
    pub root_id: &'a str,
    pub posts: Vec<&'a Post>,
    pub authors: Vec<&'a Author>,
}

/// Destination of accepted graphs
pub trait GraphSink: Send + Sync {
    /// Persist the graph and return where it was stored
    fn store(&self, graph: &Graph) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub expansion: ExpansionReport,
    pub pruning: PruneReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    Serialized { root_id: String, atoms: usize, path: PathBuf },
    Discarded { root_id: String, atoms: usize },
}

impl ConversationOutcome {
    pub fn stage(&self) -> Stage {
        match self {
            ConversationOutcome::Serialized { .. } => Stage::Serialized,
            ConversationOutcome::Discarded { .. } => Stage::Discarded,
        }
    }
}

/// Totals of a batch run; one failing conversation never stops the others
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub serialized: usize,
    pub discarded: usize,
    /// `(root id, error message)`
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn record(&mut self, root_id: &str, outcome: &Result<ConversationOutcome>) {
        match outcome {
            Ok(ConversationOutcome::Serialized { .. }) => self.serialized += 1,
            Ok(ConversationOutcome::Discarded { .. }) => self.discarded += 1,
            Err(e) => self.failed.push((root_id.to_string(), e.to_string())),
        }
    }

    pub fn total(&self) -> usize {
        self.serialized + self.discarded + self.failed.len()
    }
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    sink: &'a dyn GraphSink,
    classifier: Option<&'a dyn EntailmentClassifier>,
}

impl<'a> Pipeline<'a> {
    /// Fails with `InvalidConfig` before any conversation is touched
    pub fn new(config: &'a PipelineConfig, sink: &'a dyn GraphSink) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink,
            classifier: None,
        })
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Option<&'a dyn EntailmentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Build and prune the graph of one conversation without storing it
    pub fn build_graph(&self, conversation: &Conversation<'_>) -> Result<(Graph, BuildReport)> {
        let text_config = &self.config.text;
        let root_id = conversation.root_id;
        debug!(root = root_id, stage = ?Stage::Fetched, posts = conversation.posts.len());

        let root_post = conversation
            .posts
            .iter()
            .copied()
            .find(|post| post.id == root_id)
            .ok_or_else(|| Error::MissingRoot(root_id.to_string()))?;

        let index = ReplyIndex::build(conversation.posts.iter().copied());
        let participants = build_participants(conversation.authors.iter().copied());
        debug!(root = root_id, stage = ?Stage::Indexed, parents = index.len(), participants = participants.len());

        let mut graph = Graph::new();
        let text = normalize(root_post.text.as_deref(), text_config.clean).unwrap_or_default();
        let root = graph.add_node(atom_from_post(root_post, text, &participants, &text_config.userdata))?;
        graph.set_major_claim(root)?;

        let expansion = expand(&mut graph, root, &index, &participants, text_config, self.classifier)?;
        debug!(
            root = root_id,
            stage = ?Stage::Expanded,
            accepted = expansion.accepted,
            rejected = expansion.rejected_total(),
            classified = expansion.classified
        );

        let depth = &self.config.graph.depth;
        let pruning = prune(&mut graph, to_usize(depth.min), depth.max.map(to_usize))?;
        debug!(root = root_id, stage = ?Stage::Pruned, removed = pruning.removed_nodes());

        Ok((graph, BuildReport { expansion, pruning }))
    }

    /// Run one conversation through every stage
    pub fn process(&self, conversation: &Conversation<'_>) -> Result<ConversationOutcome> {
        let (graph, _) = self.build_graph(conversation)?;
        let root_id = conversation.root_id.to_string();
        let atoms = graph.atom_count();

        if !self.config.graph.nodes.contains(atoms as u64) {
            debug!(root = %root_id, stage = ?Stage::Discarded, atoms, "graph size out of bounds");
            return Ok(ConversationOutcome::Discarded { root_id, atoms });
        }
        debug!(root = %root_id, stage = ?Stage::SizeChecked, atoms);

        let path = self.sink.store(&graph)?;
        info!(root = %root_id, atoms, path = %path.display(), "graph stored");
        Ok(ConversationOutcome::Serialized { root_id, atoms, path })
    }

    /// Process a batch, optionally in parallel; failures are logged and counted
    pub fn run(&self, conversations: &[Conversation<'_>], parallel: bool) -> BatchReport {
        let outcomes: Vec<(&str, Result<ConversationOutcome>)> = if parallel {
            conversations
                .par_iter()
                .map(|c| (c.root_id, self.process(c)))
                .collect()
        } else {
            conversations
                .iter()
                .map(|c| (c.root_id, self.process(c)))
                .collect()
        };

        let mut report = BatchReport::default();
        for (root_id, outcome) in &outcomes {
            if let Err(e) = outcome {
                warn!(root = %root_id, error = %e, "conversation failed");
            }
            report.record(root_id, outcome);
        }

        info!(
            serialized = report.serialized,
            discarded = report.discarded,
            failed = report.failed.len(),
            "batch finished"
        );
        report
    }
}

#[inline]
fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
