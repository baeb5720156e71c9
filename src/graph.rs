//! Tainted-tree walk and its Graphviz rendering.
//!
//! A node is tainted when a conflict exists anywhere beneath it along edges
//! that ship with it. Taint does not flow out of a development-only subtree
//! unless the tree is a source distribution.

use std::fmt::Write;

use serde::Serialize;

use crate::analyze::is_conflict;
use crate::manifest::ManifestNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaintNode {
    pub id: String,
    pub name: String,
    pub tainted: bool,
    /// Inside a development-only subtree.
    pub development: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaintEdge {
    pub from: String,
    pub to: String,
    pub tainted: bool,
    /// A development edge outside a source distribution.
    pub development: bool,
}

/// Nodes in post-order (the root is last) and edges in emission order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaintGraph {
    pub nodes: Vec<TaintNode>,
    pub edges: Vec<TaintEdge>,
}

impl TaintGraph {
    pub fn root(&self) -> Option<&TaintNode> {
        self.nodes.last()
    }

    pub fn is_tainted(&self) -> bool {
        self.root().is_some_and(|root| root.tainted)
    }
}

pub fn tainted_walk(tree: &ManifestNode, is_source_dist: bool) -> TaintGraph {
    let mut walker = Walker {
        is_source_dist,
        next_id: 0,
        graph: TaintGraph::default(),
    };
    walker.visit(tree, false);
    walker.graph
}

struct Walker {
    is_source_dist: bool,
    next_id: usize,
    graph: TaintGraph,
}

impl Walker {
    fn visit(&mut self, node: &ManifestNode, is_dev: bool) -> (String, bool) {
        let mut tainted = false;
        let mut children = Vec::new();

        for dep in &node.dependencies {
            let (id, dep_tainted) = self.visit(dep, is_dev);
            tainted |= dep_tainted && !is_dev;
            children.push((id, dep, dep_tainted, false));
        }
        for dep in &node.development_dependencies {
            let (id, dep_tainted) = self.visit(dep, is_dev || !self.is_source_dist);
            tainted |= dep_tainted && self.is_source_dist;
            children.push((id, dep, dep_tainted, !self.is_source_dist));
        }

        let id = format!("A{}", self.next_id);
        self.next_id += 1;

        tainted |= node
            .selected_dependencies(self.is_source_dist)
            .any(|dep| is_conflict(node, dep));

        self.graph.nodes.push(TaintNode {
            id: id.clone(),
            name: node.display_name(),
            tainted,
            development: is_dev,
        });

        for (child_id, dep, dep_tainted, development) in children {
            self.graph.edges.push(TaintEdge {
                from: id.clone(),
                to: child_id,
                tainted: !is_dev && (dep_tainted || is_conflict(node, dep)),
                development,
            });
        }

        (id, tainted)
    }
}

/// Renders the graph as Graphviz DOT. Tainted nodes outside development
/// subtrees are filled pink; development edges are dashed, tainted ones red.
pub fn render_dot(graph: &TaintGraph) -> String {
    let mut out = String::from("// License dependency diagram\ndigraph {\n");

    for node in &graph.nodes {
        let _ = write!(out, "\t{} [label={}", node.id, quote(&node.name));
        if node.tainted && !node.development {
            out.push_str(" fillcolor=pink style=filled");
        }
        out.push_str("]\n");
    }

    for edge in &graph.edges {
        let _ = write!(out, "\t{} -> {}", edge.from, edge.to);
        if edge.development {
            out.push_str(" [style=dashed]");
        } else if edge.tainted {
            out.push_str(" [color=red]");
        }
        out.push('\n');
    }

    out.push_str("}\n");
    out
}

fn quote(label: &str) -> String {
    format!("\"{}\"", label.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::load_str;
    use std::path::Path;

    fn graph(text: &str, is_source_dist: bool) -> TaintGraph {
        let tree = load_str(text, "foo", Path::new(".")).unwrap();
        tainted_walk(&tree, is_source_dist)
    }

    /// False when the first emitted edge is red.
    fn is_compatible(text: &str, is_source_dist: bool) -> bool {
        let graph = graph(text, is_source_dist);
        let edge = &graph.edges[0];
        edge.development || !edge.tainted
    }

    #[test]
    fn test_first_edge_taint() {
        assert!(!is_compatible("dependencies: [{}]", false));
        assert!(is_compatible("development-dependencies: [{}]", false));
        assert!(!is_compatible("development-dependencies: [{}]", true));
        assert!(!is_compatible("dependencies: [{dependencies: [{}]}]", false));
        assert!(!is_compatible("development-dependencies: [{dependencies: [{}]}]", true));
    }

    #[test]
    fn test_ids_are_post_order() {
        let g = graph("name: app\ndependencies:\n  - {name: a}\n  - {name: b}\n", false);
        let ids: Vec<_> = g.nodes.iter().map(|n| (n.id.as_str(), n.name.as_str())).collect();
        assert_eq!(ids, vec![("A0", "a"), ("A1", "b"), ("A2", "app")]);
        assert_eq!(g.root().map(|n| n.id.as_str()), Some("A2"));
    }

    #[test]
    fn test_deep_conflict_taints_ancestors() {
        let text = "\
license: MIT
dependencies:
  - license: MIT
    dependencies:
      - license: AllRightsReserved
";
        let g = graph(text, false);
        assert!(g.nodes.iter().filter(|n| n.id != "A0").all(|n| n.tainted));
        assert!(g.is_tainted());
    }

    #[test]
    fn test_taint_stops_at_development_boundary() {
        let text = "\
license: MIT
development-dependencies:
  - license: MIT
    dependencies:
      - license: AllRightsReserved
";
        let g = graph(text, false);
        assert!(!g.is_tainted());
        // The inner node is tainted but sits in a development subtree.
        assert!(g.nodes[1].tainted && g.nodes[1].development);
        assert!(g.edges.iter().all(|e| e.development || !e.tainted));

        assert!(graph(text, true).is_tainted());
    }

    #[test]
    fn test_clean_tree() {
        let g = graph("license: MIT\ndependencies:\n  - {license: Zlib}\n", false);
        assert!(!g.is_tainted());
    }

    #[test]
    fn test_render_dot() {
        let text = "\
name: app
license: MIT
dependencies:
  - {name: foss, license: GPL-3.0}
development-dependencies:
  - {name: tools, license: MIT}
";
        let dot = render_dot(&graph(text, false));
        assert_eq!(
            dot,
            "// License dependency diagram\ndigraph {\n\
             \tA0 [label=\"foss\"]\n\
             \tA1 [label=\"tools\"]\n\
             \tA2 [label=\"app\" fillcolor=pink style=filled]\n\
             \tA2 -> A0 [color=red]\n\
             \tA2 -> A1 [style=dashed]\n\
             }\n"
        );
    }

    #[test]
    fn test_empty_tree_renders() {
        let dot = render_dot(&graph("", false));
        assert!(dot.contains("A0 [label=\".\"]"));
    }
}
