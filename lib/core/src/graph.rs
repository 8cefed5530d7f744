// Argument graph: atom and scheme nodes in an id-indexed arena
use crate::error::{Error, Result};
use crate::participant::Participant;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{hash_map::Entry, BTreeMap, VecDeque};
use std::sync::Arc;

pub type NodeId = usize;
pub type EdgeId = usize;

/// Relation carried by a scheme node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeType {
    #[default]
    Unclassified,
    Support,
    Attack,
}

/// A post turned into a graph vertex
#[derive(Debug, Clone)]
pub struct AtomNode {
    pub id: String,
    pub text: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: DateTime<Utc>,
    pub participant: Option<Arc<Participant>>,
    pub userdata: Map<String, Value>,
}

impl AtomNode {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created: None,
            updated: Utc::now(),
            participant: None,
            userdata: Map::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_participant(mut self, participant: Option<Arc<Participant>>) -> Self {
        self.participant = participant;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_created(mut self, created: Option<DateTime<Utc>>) -> Self {
        self.created = created;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_userdata(mut self, userdata: Map<String, Value>) -> Self {
        self.userdata = userdata;
        self
    }
}

/// A relation between a reply (premise) and the post it answers (claim)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeNode {
    pub id: String,
    pub scheme_type: SchemeType,
}

impl SchemeNode {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scheme_type: SchemeType::Unclassified,
        }
    }

    /// Scheme linking `child` to `parent`, identified as `"{child},{parent}"`
    #[inline]
    #[must_use]
    pub fn between(child: &str, parent: &str) -> Self {
        Self::new(format!("{},{}", child, parent))
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Atom(AtomNode),
    Scheme(SchemeNode),
}

impl Node {
    #[inline]
    pub fn id(&self) -> &str {
        match self {
            Node::Atom(atom) => &atom.id,
            Node::Scheme(scheme) => &scheme.id,
        }
    }

    #[inline]
    pub fn is_atom(&self) -> bool {
        matches!(self, Node::Atom(_))
    }

    #[inline]
    pub fn as_atom(&self) -> Option<&AtomNode> {
        match self {
            Node::Atom(atom) => Some(atom),
            Node::Scheme(_) => None,
        }
    }

    #[inline]
    pub fn as_scheme(&self) -> Option<&SchemeNode> {
        match self {
            Node::Scheme(scheme) => Some(scheme),
            Node::Atom(_) => None,
        }
    }
}

impl From<AtomNode> for Node {
    fn from(atom: AtomNode) -> Self {
        Node::Atom(atom)
    }
}

impl From<SchemeNode> for Node {
    fn from(scheme: SchemeNode) -> Self {
        Node::Scheme(scheme)
    }
}

/// Directed edge between an atom and a scheme node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

/// Argument graph of one conversation.
///
/// Nodes and edges live in arenas; removed entries leave an empty slot so
/// ids stay stable and iteration follows insertion order. Edges point from
/// the premise towards the claim: `reply -> scheme -> parent`.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    slots: Vec<Option<Slot>>,
    edges: Vec<Option<Edge>>,
    index: AHashMap<String, NodeId>,
    edge_index: AHashMap<(NodeId, NodeId), EdgeId>,
    participants: BTreeMap<String, Arc<Participant>>,
    major_claim: Option<NodeId>,
    node_count: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, registering its participant
    pub fn add_node(&mut self, node: impl Into<Node>) -> Result<NodeId> {
        let node = node.into();

        if self.index.contains_key(node.id()) {
            return Err(Error::DuplicateNode(node.id().to_string()));
        }

        if let Node::Atom(AtomNode {
            participant: Some(participant),
            ..
        }) = &node
        {
            self.add_participant(participant.clone());
        }

        let id = self.slots.len();
        self.index.insert(node.id().to_string(), id);
        self.slots.push(Some(Slot {
            node,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }));
        self.node_count += 1;
        Ok(id)
    }

    pub fn add_participant(&mut self, participant: Arc<Participant>) {
        self.participants
            .entry(participant.id.clone())
            .or_insert(participant);
    }

    /// Insert an edge; it must join an atom and a scheme node
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId> {
        self.check_edge(source, target)?;

        let id = self.edges.len();
        self.edges.push(Some(Edge { id, source, target }));
        self.edge_index.insert((source, target), id);

        if let Some(slot) = self.slots[source].as_mut() {
            slot.outgoing.push(id);
        }
        if let Some(slot) = self.slots[target].as_mut() {
            slot.incoming.push(id);
        }

        Ok(id)
    }

    fn check_edge(&self, source: NodeId, target: NodeId) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidEdge {
            source_id: self.key(source).unwrap_or("?").to_string(),
            target_id: self.key(target).unwrap_or("?").to_string(),
            reason: reason.to_string(),
        };

        let (Some(from), Some(to)) = (self.node(source), self.node(target)) else {
            return Err(invalid("unknown endpoint"));
        };

        if from.is_atom() == to.is_atom() {
            return Err(invalid("edges must join an atom and a scheme node"));
        }

        if self.edge_index.contains_key(&(source, target)) {
            return Err(invalid("edge already exists"));
        }

        Ok(())
    }

    /// Link `child` to `parent` through a new scheme node.
    ///
    /// Both edges are added or neither is.
    pub fn connect(&mut self, child: NodeId, scheme: SchemeNode, parent: NodeId) -> Result<NodeId> {
        for endpoint in [child, parent] {
            match self.node(endpoint) {
                Some(node) if node.is_atom() => {}
                Some(node) => {
                    return Err(Error::InvalidEdge {
                        source_id: scheme.id.clone(),
                        target_id: node.id().to_string(),
                        reason: "schemes connect atom nodes".to_string(),
                    })
                }
                None => return Err(Error::NodeNotFound(endpoint.to_string())),
            }
        }

        if child == parent {
            return Err(Error::InvalidEdge {
                source_id: scheme.id.clone(),
                target_id: scheme.id,
                reason: "an atom cannot reply to itself".to_string(),
            });
        }

        let scheme_id = self.add_node(scheme)?;
        self.add_edge(child, scheme_id)?;
        self.add_edge(scheme_id, parent)?;
        Ok(scheme_id)
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id)?.take()?;

        for edge_id in slot.incoming.iter().chain(slot.outgoing.iter()) {
            if let Some(edge) = self.edges[*edge_id].take() {
                self.edge_index.remove(&(edge.source, edge.target));

                let other = if edge.source == id { edge.target } else { edge.source };
                if let Some(other_slot) = self.slots[other].as_mut() {
                    other_slot.incoming.retain(|e| e != edge_id);
                    other_slot.outgoing.retain(|e| e != edge_id);
                }
            }
        }

        self.index.remove(slot.node.id());
        if self.major_claim == Some(id) {
            self.major_claim = None;
        }
        self.node_count -= 1;
        Some(slot.node)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id)?.as_ref().map(|slot| &slot.node)
    }

    #[inline]
    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.node_id(key).and_then(|id| self.node(id))
    }

    fn key(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(Node::id)
    }

    pub fn atom(&self, key: &str) -> Option<&AtomNode> {
        self.get(key).and_then(Node::as_atom)
    }

    pub fn scheme(&self, key: &str) -> Option<&SchemeNode> {
        self.get(key).and_then(Node::as_scheme)
    }

    pub fn scheme_mut(&mut self, key: &str) -> Option<&mut SchemeNode> {
        let id = self.node_id(key)?;
        match self.slots[id].as_mut().map(|slot| &mut slot.node) {
            Some(Node::Scheme(scheme)) => Some(scheme),
            _ => None,
        }
    }

    /// All live nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|s| (id, &s.node)))
    }

    pub fn atoms(&self) -> impl Iterator<Item = &AtomNode> {
        self.nodes().filter_map(|(_, node)| node.as_atom())
    }

    pub fn schemes(&self) -> impl Iterator<Item = &SchemeNode> {
        self.nodes().filter_map(|(_, node)| node.as_scheme())
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().flatten()
    }

    /// `(source key, target key)` of an edge
    pub fn edge_endpoints(&self, edge: &Edge) -> Option<(&str, &str)> {
        Some((self.key(edge.source)?, self.key(edge.target)?))
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn atom_count(&self) -> usize {
        self.atoms().count()
    }

    pub fn scheme_count(&self) -> usize {
        self.schemes().count()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Nodes with an edge pointing at `id`
    pub fn incoming_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.slot(id)
            .map(|slot| slot.incoming.iter().filter_map(|e| self.edges[*e].map(|edge| edge.source)).collect())
            .unwrap_or_default()
    }

    /// Nodes `id` points at
    pub fn outgoing_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.slot(id)
            .map(|slot| slot.outgoing.iter().filter_map(|e| self.edges[*e].map(|edge| edge.target)).collect())
            .unwrap_or_default()
    }

    /// Atoms reached by following outgoing edges through scheme nodes
    pub fn outgoing_atoms(&self, id: NodeId) -> Vec<NodeId> {
        self.atom_neighbors(id, |graph, node| graph.outgoing_nodes(node))
    }

    /// Atoms replying to `id`, skipping over scheme nodes
    pub fn incoming_atoms(&self, id: NodeId) -> Vec<NodeId> {
        self.atom_neighbors(id, |graph, node| graph.incoming_nodes(node))
    }

    fn atom_neighbors<F>(&self, id: NodeId, step: F) -> Vec<NodeId>
    where
        F: Fn(&Self, NodeId) -> Vec<NodeId>,
    {
        let mut atoms = Vec::new();
        for next in step(self, id) {
            match self.node(next) {
                Some(Node::Atom(_)) => atoms.push(next),
                Some(Node::Scheme(_)) => {
                    atoms.extend(step(self, next).into_iter().filter(|n| self.is_atom(*n)))
                }
                None => {}
            }
        }
        atoms
    }

    #[inline]
    fn is_atom(&self, id: NodeId) -> bool {
        self.node(id).map(Node::is_atom).unwrap_or(false)
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id)?.as_ref()
    }

    /// Nodes nothing points at: replies without further replies
    pub fn leaf_nodes(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| match slot {
                Some(slot) if slot.incoming.is_empty() => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Number of atom-to-atom hops from `start` to `end` following outgoing
    /// edges. Scheme nodes do not count; a scheme start begins at the atoms
    /// it points to. Returns `None` when `end` is not reachable within
    /// `max_distance` hops.
    pub fn node_distance(&self, start: NodeId, end: NodeId, max_distance: Option<usize>) -> Option<usize> {
        let start_node = self.node(start)?;
        self.node(end)?;

        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
        if start_node.is_atom() {
            queue.push_back((start, 0));
        } else {
            queue.extend(self.outgoing_nodes(start).into_iter().map(|n| (n, 0)));
        }

        let mut visited = ahash::AHashSet::new();
        while let Some((current, distance)) = queue.pop_front() {
            if current == end {
                return Some(distance);
            }
            if max_distance.is_some_and(|max| distance >= max) || !visited.insert(current) {
                continue;
            }
            for next in self.outgoing_atoms(current) {
                queue.push_back((next, distance + 1));
            }
        }

        None
    }

    /// Atom hops from every atom that reaches `root` to `root`, in one
    /// breadth-first pass over incoming edges.
    pub fn atom_depths(&self, root: NodeId) -> AHashMap<NodeId, usize> {
        let mut depths = AHashMap::new();
        if self.node(root).is_none() {
            return depths;
        }

        let mut queue = VecDeque::from([(root, 0)]);
        depths.insert(root, 0);
        while let Some((current, depth)) = queue.pop_front() {
            for reply in self.incoming_atoms(current) {
                if let Entry::Vacant(entry) = depths.entry(reply) {
                    entry.insert(depth + 1);
                    queue.push_back((reply, depth + 1));
                }
            }
        }

        depths
    }

    #[inline]
    pub fn major_claim(&self) -> Option<NodeId> {
        self.major_claim
    }

    pub fn major_claim_atom(&self) -> Option<&AtomNode> {
        self.major_claim.and_then(|id| self.node(id)).and_then(Node::as_atom)
    }

    pub fn set_major_claim(&mut self, id: NodeId) -> Result<()> {
        match self.node(id) {
            Some(Node::Atom(_)) => {
                self.major_claim = Some(id);
                Ok(())
            }
            Some(node) => Err(Error::InvalidConfig(format!(
                "major claim must be an atom node, got scheme {}",
                node.id()
            ))),
            None => Err(Error::NodeNotFound(id.to_string())),
        }
    }

    pub fn participants(&self) -> impl Iterator<Item = &Arc<Participant>> {
        self.participants.values()
    }

    pub fn participant(&self, id: &str) -> Option<&Arc<Participant>> {
        self.participants.get(id)
    }

    /// Drop participants no surviving atom refers to; returns how many were dropped
    pub fn clean_participants(&mut self) -> usize {
        let referenced: ahash::AHashSet<String> = self
            .atoms()
            .filter_map(|atom| atom.participant.as_ref().map(|p| p.id.clone()))
            .collect();

        let before = self.participants.len();
        self.participants.retain(|id, _| referenced.contains(id));
        before - self.participants.len()
    }
}
