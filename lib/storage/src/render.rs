//! Graphviz rendering.
//!
//! The DOT source is built in-process; only the PDF conversion shells out to
//! the `dot` binary.

use crate::write_atomic;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use threadgraph_core::{Graph, Node, Result, SchemeType};

const LABEL_WIDTH: usize = 60;

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Break long text into lines of roughly `width` characters, joined with DOT newlines
fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + word.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }

    lines.iter().map(|l| escape(l)).collect::<Vec<_>>().join("\\n")
}

/// DOT source of the graph, edges drawn from premise to claim
pub fn to_dot(graph: &Graph) -> String {
    let major_claim = graph.major_claim();
    let mut dot = String::from("digraph {\n  rankdir=BT;\n  node [fontname=\"Helvetica\", fontsize=10];\n");

    for (id, node) in graph.nodes() {
        let line = match node {
            Node::Atom(atom) => {
                let border = if Some(id) == major_claim { ", penwidth=3" } else { "" };
                format!(
                    "  \"{}\" [label=\"{}\", shape=box, style=\"rounded,filled\", fillcolor=\"#dbeafe\"{}];\n",
                    escape(&atom.id),
                    wrap(&atom.text, LABEL_WIDTH),
                    border
                )
            }
            Node::Scheme(scheme) => {
                let (label, color) = match scheme.scheme_type {
                    SchemeType::Support => ("Support", "#bbf7d0"),
                    SchemeType::Attack => ("Attack", "#fecaca"),
                    SchemeType::Unclassified => ("?", "#e5e7eb"),
                };
                format!(
                    "  \"{}\" [label=\"{}\", shape=ellipse, style=filled, fillcolor=\"{}\"];\n",
                    escape(&scheme.id),
                    label,
                    color
                )
            }
        };
        dot.push_str(&line);
    }

    for edge in graph.edges() {
        if let Some((source, target)) = graph.edge_endpoints(edge) {
            dot.push_str(&format!("  \"{}\" -> \"{}\";\n", escape(source), escape(target)));
        }
    }

    dot.push_str("}\n");
    dot
}

/// Write `<stem>.dot` next to `path` and convert it to `<stem>.pdf` with `dot -Tpdf`
pub fn render_pdf(graph: &Graph, path: &Path) -> Result<PathBuf> {
    let dot_path = path.with_extension("dot");
    let pdf_path = path.with_extension("pdf");
    write_atomic(&dot_path, to_dot(graph).as_bytes())?;

    let output = Command::new("dot")
        .arg("-Tpdf")
        .arg("-o")
        .arg(&pdf_path)
        .arg(&dot_path)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("dot exited with {}: {}", output.status, stderr.trim()),
        )
        .into());
    }

    Ok(pdf_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadgraph_core::{AtomNode, SchemeNode};

    #[test]
    fn test_dot_contains_nodes_and_edges() {
        let mut graph = Graph::new();
        let root = graph.add_node(AtomNode::new("1", "Say \"hi\"")).unwrap();
        graph.set_major_claim(root).unwrap();
        let reply = graph.add_node(AtomNode::new("2", "No")).unwrap();
        graph.connect(reply, SchemeNode::between("2", "1"), root).unwrap();
        graph.scheme_mut("2,1").unwrap().scheme_type = SchemeType::Support;

        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("Say \\\"hi\\\""));
        assert!(dot.contains("penwidth=3"));
        assert!(dot.contains("label=\"Support\""));
        assert!(dot.contains("\"2\" -> \"2,1\";"));
        assert!(dot.contains("\"2,1\" -> \"1\";"));
    }

    #[test]
    fn test_dot_one_statement_per_line() {
        let mut graph = Graph::new();
        let root = graph.add_node(AtomNode::new("1", "Root")).unwrap();
        graph.set_major_claim(root).unwrap();
        for id in ["2", "3"] {
            let reply = graph.add_node(AtomNode::new(id, "Reply")).unwrap();
            graph.connect(reply, SchemeNode::between(id, "1"), root).unwrap();
        }

        let dot = to_dot(&graph);
        let statements: Vec<&str> = dot.lines().skip(3).filter(|l| *l != "}").collect();
        assert_eq!(statements.len(), graph.node_count() + graph.edge_count());
        assert!(statements.iter().all(|l| l.starts_with("  \"") && l.ends_with(';')));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_wrap_breaks_long_text() {
        let text = "word ".repeat(40);
        let wrapped = wrap(&text, 20);
        assert!(wrapped.contains("\\n"));
        assert!(wrapped.split("\\n").all(|line| line.chars().count() <= 24));
    }
}
