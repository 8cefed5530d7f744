// Output folder layout and the file-backed graph sink
use crate::{format, render, write_atomic};
use std::fs;
use std::path::{Path, PathBuf};
use threadgraph_core::{Error, Graph, GraphSink, PipelineConfig, Result};
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "config.json";

/// Stores graphs as `<root>/<username?>/<major claim id>.json`
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    render: bool,
}

impl OutputLayout {
    /// Use an existing folder as is
    pub fn new<P: AsRef<Path>>(root: P, render: bool) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            render,
        }
    }

    /// Recreate `root` and record the run configuration in it.
    ///
    /// Anything left from a previous run is removed.
    pub fn prepare<P: AsRef<Path>>(root: P, config: &PipelineConfig) -> Result<Self> {
        let root = root.as_ref();

        if root.is_dir() {
            debug!(path = %root.display(), "clearing output folder");
            fs::remove_dir_all(root)?;
        }
        fs::create_dir_all(root)?;

        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&root.join(CONFIG_FILE), json.as_bytes())?;

        Ok(Self::new(root, config.graph.render))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the graph document, grouped by the major claim author's username
    pub fn graph_path(&self, graph: &Graph) -> Result<PathBuf> {
        let major_claim = graph
            .major_claim_atom()
            .ok_or_else(|| Error::NodeNotFound("major claim".to_string()))?;

        let mut path = self.root.clone();
        if let Some(username) = major_claim
            .participant
            .as_ref()
            .and_then(|p| p.username.as_deref())
            .filter(|name| !name.is_empty())
        {
            path.push(sanitize(username));
        }
        path.push(format!("{}.json", sanitize(&major_claim.id)));
        Ok(path)
    }
}

/// Keep path components inside the output folder
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

impl GraphSink for OutputLayout {
    fn store(&self, graph: &Graph) -> Result<PathBuf> {
        let path = self.graph_path(graph)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        format::save(graph, &path)?;

        if self.render {
            if let Err(e) = render::render_pdf(graph, &path) {
                warn!(path = %path.display(), error = %e, "rendering failed");
            }
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use threadgraph_core::{AtomNode, Author, Participant};

    fn graph_by(username: Option<&str>) -> Graph {
        let mut author = Author::new("u1");
        if let Some(name) = username {
            author = author.with_username(name);
        }
        let participant = Arc::new(Participant::from_author(&author));

        let mut graph = Graph::new();
        let root = graph
            .add_node(AtomNode::new("42", "Root").with_participant(Some(participant)))
            .unwrap();
        graph.set_major_claim(root).unwrap();
        graph
    }

    #[test]
    fn test_prepare_recreates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        fs::create_dir_all(out.join("stale")).unwrap();

        let layout = OutputLayout::prepare(&out, &PipelineConfig::default()).unwrap();
        assert!(!out.join("stale").exists());

        let config: PipelineConfig =
            serde_json::from_str(&fs::read_to_string(layout.root().join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_paths_grouped_by_username() {
        let layout = OutputLayout::new("/data", false);

        assert_eq!(
            layout.graph_path(&graph_by(Some("alice"))).unwrap(),
            PathBuf::from("/data/alice/42.json")
        );
        assert_eq!(layout.graph_path(&graph_by(None)).unwrap(), PathBuf::from("/data/42.json"));
        assert_eq!(
            layout.graph_path(&graph_by(Some("../etc"))).unwrap(),
            PathBuf::from("/data/_etc/42.json")
        );
    }

    #[test]
    fn test_store_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), false);

        let path = layout.store(&graph_by(Some("alice"))).unwrap();
        assert!(path.exists());
        assert_eq!(format::load(&path).unwrap().major_claim_atom().unwrap().id, "42");
        assert!(!path.with_extension("pdf").exists());
    }

    #[test]
    fn test_graph_without_major_claim_is_rejected() {
        let layout = OutputLayout::new("/data", false);
        assert!(layout.graph_path(&Graph::new()).is_err());
    }
}
