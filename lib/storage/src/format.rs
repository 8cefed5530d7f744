// JSON graph document
use crate::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use threadgraph_core::{AtomNode, Error, Graph, Node, Participant, Result, SchemeNode, SchemeType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeDocument {
    Atom {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created: Option<DateTime<Utc>>,
        updated: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participant: Option<String>,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        userdata: Map<String, Value>,
    },
    Scheme {
        #[serde(default)]
        scheme: SchemeType,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDocument {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// On-disk form of a [`Graph`].
///
/// Nodes, edges and participants are keyed by their string ids. Edge ids are
/// `"{source}->{target}"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub nodes: BTreeMap<String, NodeDocument>,
    pub edges: BTreeMap<String, EdgeDocument>,
    #[serde(default)]
    pub participants: BTreeMap<String, Participant>,
    #[serde(default)]
    pub major_claim: Option<String>,
    pub metadata: DocumentMetadata,
}

impl GraphDocument {
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|(_, node)| {
                let document = match node {
                    Node::Atom(atom) => NodeDocument::Atom {
                        text: atom.text.clone(),
                        created: atom.created,
                        updated: atom.updated,
                        participant: atom.participant.as_ref().map(|p| p.id.clone()),
                        userdata: atom.userdata.clone(),
                    },
                    Node::Scheme(scheme) => NodeDocument::Scheme {
                        scheme: scheme.scheme_type,
                    },
                };
                (node.id().to_string(), document)
            })
            .collect();

        let edges = graph
            .edges()
            .filter_map(|edge| graph.edge_endpoints(edge))
            .map(|(source, target)| {
                (
                    format!("{}->{}", source, target),
                    EdgeDocument {
                        source: source.to_string(),
                        target: target.to_string(),
                    },
                )
            })
            .collect();

        let participants = graph
            .participants()
            .map(|p| (p.id.clone(), Participant::clone(p)))
            .collect();

        let now = Utc::now();
        let created = graph.atoms().filter_map(|atom| atom.created).min().unwrap_or(now);

        Self {
            nodes,
            edges,
            participants,
            major_claim: graph.major_claim_atom().map(|atom| atom.id.clone()),
            metadata: DocumentMetadata { created, updated: now },
        }
    }

    /// Rebuild the in-memory graph; unknown participants and edge endpoints are errors
    pub fn into_graph(self) -> Result<Graph> {
        let mut graph = Graph::new();
        let participants: BTreeMap<String, Arc<Participant>> = self
            .participants
            .into_iter()
            .map(|(id, participant)| (id, Arc::new(participant)))
            .collect();

        for participant in participants.values() {
            graph.add_participant(participant.clone());
        }

        for (id, node) in self.nodes {
            match node {
                NodeDocument::Atom {
                    text,
                    created,
                    updated,
                    participant,
                    userdata,
                } => {
                    let participant = match participant {
                        Some(key) => Some(
                            participants
                                .get(&key)
                                .cloned()
                                .ok_or_else(|| Error::Parse(format!("unknown participant {}", key)))?,
                        ),
                        None => None,
                    };
                    let mut atom = AtomNode::new(id, text)
                        .with_created(created)
                        .with_participant(participant)
                        .with_userdata(userdata);
                    atom.updated = updated;
                    graph.add_node(atom)?;
                }
                NodeDocument::Scheme { scheme } => {
                    graph.add_node(SchemeNode {
                        id,
                        scheme_type: scheme,
                    })?;
                }
            }
        }

        for edge in self.edges.values() {
            let source = graph
                .node_id(&edge.source)
                .ok_or_else(|| Error::NodeNotFound(edge.source.clone()))?;
            let target = graph
                .node_id(&edge.target)
                .ok_or_else(|| Error::NodeNotFound(edge.target.clone()))?;
            graph.add_edge(source, target)?;
        }

        if let Some(key) = self.major_claim {
            let id = graph.node_id(&key).ok_or(Error::NodeNotFound(key))?;
            graph.set_major_claim(id)?;
        }

        Ok(graph)
    }
}

pub fn to_json(graph: &Graph) -> Result<String> {
    Ok(serde_json::to_string_pretty(&GraphDocument::from_graph(graph))?)
}

pub fn from_json(json: &str) -> Result<Graph> {
    serde_json::from_str::<GraphDocument>(json)?.into_graph()
}

/// Write the graph document atomically
pub fn save(graph: &Graph, path: &Path) -> Result<()> {
    write_atomic(path, to_json(graph)?.as_bytes())
}

pub fn load(path: &Path) -> Result<Graph> {
    from_json(&fs::read_to_string(path)?)
}
