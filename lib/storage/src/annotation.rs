//! Manual scheme annotation.
//!
//! Stored graphs are exported to a single JSON file listing every premise /
//! claim pair, annotators fill in `label` with `s` (support) or `a` (attack),
//! by hand or through [`label_interactive`], and the labels are written back into the graph files. Two annotation files
//! can be compared with Cohen's kappa.

use crate::layout::CONFIG_FILE;
use crate::{format, write_atomic};
use globset::GlobBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use threadgraph_core::{Error, Node, Result, SchemeType};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeAnnotation {
    pub premise: String,
    pub claim: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphAnnotation {
    /// Major claim text, shown for context
    #[serde(default)]
    pub mc: String,
    #[serde(default)]
    pub schemes: BTreeMap<String, SchemeAnnotation>,
}

/// Annotations of many graphs, keyed by graph path relative to the input folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSet {
    #[serde(default)]
    pub graphs: BTreeMap<String, GraphAnnotation>,
}

impl AnnotationSet {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_atomic(path, serde_json::to_string_pretty(self)?.as_bytes())
    }

    pub fn scheme_count(&self) -> usize {
        self.graphs.values().map(|g| g.schemes.len()).sum()
    }
}

/// Annotator verdict for one scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    Support,
    Attack,
}

impl Label {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "s" => Some(Label::Support),
            "a" => Some(Label::Attack),
            _ => None,
        }
    }

    pub fn scheme_type(self) -> SchemeType {
        match self {
            Label::Support => SchemeType::Support,
            Label::Attack => SchemeType::Attack,
        }
    }
}

/// Graph files under `root` whose `/`-separated relative path matches the
/// glob `pattern`, sorted. `*` stays within one path component.
pub fn find_graphs(root: &Path, pattern: &str) -> Result<Vec<(String, PathBuf)>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| Error::InvalidConfig(format!("pattern {}: {}", pattern, e)))?
        .compile_matcher();
    let mut found = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if relative != CONFIG_FILE && matcher.is_match(&relative) {
            found.push((relative, entry.into_path()));
        }
    }

    found.sort();
    Ok(found)
}

/// Collect every atom-scheme-atom pair of the matching graphs
pub fn export(root: &Path, pattern: &str) -> Result<AnnotationSet> {
    let mut set = AnnotationSet::default();

    for (name, path) in find_graphs(root, pattern)? {
        let graph = format::load(&path)?;
        let mut annotation = GraphAnnotation {
            mc: graph.major_claim_atom().map(|mc| mc.text.clone()).unwrap_or_default(),
            schemes: BTreeMap::new(),
        };

        for (id, node) in graph.nodes() {
            let Node::Scheme(scheme) = node else {
                continue;
            };

            for premise in graph.incoming_nodes(id) {
                for claim in graph.outgoing_nodes(id) {
                    let (Some(Node::Atom(premise)), Some(Node::Atom(claim))) =
                        (graph.node(premise), graph.node(claim))
                    else {
                        continue;
                    };
                    annotation.schemes.insert(
                        scheme.id.clone(),
                        SchemeAnnotation {
                            premise: premise.text.clone(),
                            claim: claim.text.clone(),
                            label: String::new(),
                        },
                    );
                }
            }
        }

        set.graphs.insert(name, annotation);
    }

    info!(graphs = set.graphs.len(), pairs = set.scheme_count(), "annotations exported");
    Ok(set)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub graphs: usize,
    pub labeled: usize,
    pub skipped: usize,
}

/// Write the annotated labels back into the graph files under `root`
pub fn import(root: &Path, set: &AnnotationSet) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for (name, annotation) in &set.graphs {
        let path = root.join(name);
        let mut graph = format::load(&path)?;

        for (scheme_id, scheme) in &annotation.schemes {
            let Some(label) = Label::parse(&scheme.label) else {
                warn!(graph = %name, scheme = %scheme_id, label = %scheme.label, "label not recognized, skipping");
                report.skipped += 1;
                continue;
            };
            let Some(node) = graph.scheme_mut(scheme_id) else {
                warn!(graph = %name, scheme = %scheme_id, "scheme not found, skipping");
                report.skipped += 1;
                continue;
            };
            node.scheme_type = label.scheme_type();
            report.labeled += 1;
        }

        format::save(&graph, &path)?;
        report.graphs += 1;
    }

    info!(graphs = report.graphs, labeled = report.labeled, skipped = report.skipped, "annotations imported");
    Ok(report)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelReport {
    /// Pairs labeled in this session
    pub labeled: usize,
    /// Pairs still without a valid label
    pub remaining: usize,
}

/// Ask for a label of every pair in the annotation file at `path` that has
/// none yet.
///
/// The file is rewritten after every answer, so an interrupted session
/// resumes where it stopped. Only `s` and `a` are accepted. End of input
/// ends the session early.
pub fn label_interactive<R: BufRead, W: Write>(path: &Path, mut input: R, mut output: W) -> Result<LabelReport> {
    let mut set = AnnotationSet::load(path)?;

    let pending: Vec<(String, Vec<String>)> = set
        .graphs
        .iter()
        .map(|(name, graph)| {
            let ids = graph
                .schemes
                .iter()
                .filter(|(_, scheme)| Label::parse(&scheme.label).is_none())
                .map(|(id, _)| id.clone())
                .collect::<Vec<_>>();
            (name.clone(), ids)
        })
        .filter(|(_, ids)| !ids.is_empty())
        .collect();

    let mut report = LabelReport {
        labeled: 0,
        remaining: pending.iter().map(|(_, ids)| ids.len()).sum(),
    };

    writeln!(output, "For each pair, state whether the premise supports or attacks the claim.")?;
    writeln!(output, "The major claim is shown for context only. Progress is saved after each pair.")?;

    for (name, ids) in pending {
        let Some(graph) = set.graphs.get(&name) else {
            continue;
        };
        writeln!(output, "\n\nNow working on file '{}'", name)?;
        writeln!(output, "It has the following major claim:\n{}", graph.mc)?;

        for id in ids {
            let Some(scheme) = set.graphs.get(&name).and_then(|g| g.schemes.get(&id)) else {
                continue;
            };
            writeln!(output, "\n\nClaim: {}\nPremise: {}\n", scheme.claim, scheme.premise)?;
            write!(output, "(s)upport / (a)ttack: ")?;

            let label = loop {
                output.flush()?;
                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    writeln!(output)?;
                    info!(labeled = report.labeled, remaining = report.remaining, "labeling interrupted");
                    return Ok(report);
                }
                let answer = line.trim();
                if Label::parse(answer).is_some() {
                    break answer.to_string();
                }
                write!(output, "Only 's' and 'a' are valid. Please try again: ")?;
            };

            if let Some(scheme) = set.graphs.get_mut(&name).and_then(|g| g.schemes.get_mut(&id)) {
                scheme.label = label;
            }
            set.save(path)?;
            report.labeled += 1;
            report.remaining -= 1;
        }

        writeln!(output, "\nFinished with file '{}'", name)?;
    }

    writeln!(output, "\nAll pairs annotated, thank you!")?;
    info!(labeled = report.labeled, "labeling finished");
    Ok(report)
}

/// Inter-annotator agreement over the schemes both annotators labeled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agreement {
    pub items: usize,
    pub observed: f64,
    pub kappa: f64,
}

pub fn agreement(first: &AnnotationSet, second: &AnnotationSet) -> Result<Agreement> {
    let mut pairs: Vec<(Label, Label)> = Vec::new();

    for (name, graph) in &first.graphs {
        let Some(other) = second.graphs.get(name) else {
            continue;
        };
        for (scheme_id, scheme) in &graph.schemes {
            let labels = (
                Label::parse(&scheme.label),
                other.schemes.get(scheme_id).and_then(|s| Label::parse(&s.label)),
            );
            if let (Some(a), Some(b)) = labels {
                pairs.push((a, b));
            }
        }
    }

    if pairs.is_empty() {
        return Err(Error::InvalidConfig("no scheme is labeled in both annotation files".to_string()));
    }

    let n = pairs.len() as f64;
    let observed = pairs.iter().filter(|(a, b)| a == b).count() as f64 / n;

    let share = |pick: fn(&(Label, Label)) -> Label, label: Label| {
        pairs.iter().filter(|p| pick(p) == label).count() as f64 / n
    };
    let expected: f64 = [Label::Support, Label::Attack]
        .into_iter()
        .map(|label| share(|p| p.0, label) * share(|p| p.1, label))
        .sum();

    // Both annotators used a single label
    let kappa = if (1.0 - expected).abs() < f64::EPSILON {
        if observed >= 1.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (observed - expected) / (1.0 - expected)
    };

    Ok(Agreement {
        items: pairs.len(),
        observed,
        kappa,
    })
}
