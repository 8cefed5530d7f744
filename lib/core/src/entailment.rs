//! Entailment classification of scheme nodes.
//!
//! The classifier is an external service. It receives a batch of
//! `(premise, claim)` pairs and must answer with one result per pair, in
//! request order.

use crate::error::{Error, Result};
use crate::graph::{Graph, Node, NodeId, SchemeType};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entailment {
    Entailment,
    Contradiction,
    Neither,
}

impl Entailment {
    /// Entailment supports the claim, contradiction attacks it
    pub fn scheme_type(self) -> SchemeType {
        match self {
            Entailment::Entailment => SchemeType::Support,
            Entailment::Contradiction => SchemeType::Attack,
            Entailment::Neither => SchemeType::Unclassified,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntailmentRequest {
    pub language: String,
    /// Node id -> text of every node referenced by `pairs`
    pub texts: BTreeMap<String, String>,
    /// `(premise id, claim id)`
    pub pairs: Vec<(String, String)>,
}

impl EntailmentRequest {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, premise_id: &str, premise: &str, claim_id: &str, claim: &str) {
        self.texts.insert(premise_id.to_string(), premise.to_string());
        self.texts.insert(claim_id.to_string(), claim.to_string());
        self.pairs.push((premise_id.to_string(), claim_id.to_string()));
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

pub trait EntailmentClassifier: Send + Sync {
    /// Classify every pair of the request; the result is aligned to `request.pairs`
    fn classify(&self, request: &EntailmentRequest) -> Result<Vec<Entailment>>;
}

/// Classify the given scheme nodes in a single request and store the result.
///
/// Each scheme is classified with its incoming atom as premise and its
/// outgoing atom as claim. Returns the number of schemes that received a
/// support or attack label.
pub fn classify_schemes(
    graph: &mut Graph,
    schemes: &[NodeId],
    language: &str,
    classifier: &dyn EntailmentClassifier,
) -> Result<usize> {
    let mut request = EntailmentRequest::new(language);
    let mut targets = Vec::with_capacity(schemes.len());

    for &scheme in schemes {
        let premise = graph.incoming_nodes(scheme).into_iter().find_map(|n| graph.node(n)?.as_atom());
        let claim = graph.outgoing_nodes(scheme).into_iter().find_map(|n| graph.node(n)?.as_atom());

        if let (Some(premise), Some(claim), Some(Node::Scheme(node))) = (premise, claim, graph.node(scheme)) {
            request.push(&premise.id, &premise.text, &claim.id, &claim.text);
            targets.push(node.id.clone());
        }
    }

    if request.is_empty() {
        return Ok(0);
    }

    let results = classifier.classify(&request)?;
    if results.len() != targets.len() {
        return Err(Error::Classifier(format!(
            "expected {} results, got {}",
            targets.len(),
            results.len()
        )));
    }

    let mut labeled = 0;
    for (scheme_id, result) in targets.iter().zip(results) {
        if let Some(scheme) = graph.scheme_mut(scheme_id) {
            scheme.scheme_type = result.scheme_type();
            if scheme.scheme_type != SchemeType::Unclassified {
                labeled += 1;
            }
        }
    }

    Ok(labeled)
}
