use std::collections::hash_map::Entry;
use std::fmt::{self, Display, Formatter, Write};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cache::Cache;
use crate::request::AnyRequest;

/// Identifies a canonical request in the dependency graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct NodeId(usize);

impl NodeId {
    #[cfg(test)]
    pub fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Every request an evaluator has seen, together with the requests each one
/// asked for during its most recent uncached evaluation.
///
/// Nodes live in an arena and refer to each other by index, so cycles are
/// ordinary back edges.
#[derive(Default)]
pub(crate) struct DependencyGraph {
    /// The nodes, in order of first appearance.
    nodes: Vec<Node>,
    /// Maps from any copy of a request to its canonical node.
    index: FxHashMap<AnyRequest, NodeId>,
}

/// A node in the dependency graph.
struct Node {
    /// The canonical copy of the request.
    request: AnyRequest,
    /// The requests this one depends on, in the order they were evaluated.
    edges: Vec<NodeId>,
}

impl DependencyGraph {
    /// Resolve a request to its canonical node, adding a node without edges if
    /// the request is new.
    pub fn canonicalize(&mut self, request: AnyRequest) -> NodeId {
        match self.index.entry(request) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = NodeId(self.nodes.len());
                self.nodes.push(Node { request: entry.key().clone(), edges: Vec::new() });
                entry.insert(id);
                id
            }
        }
    }

    /// Find the canonical node of a request without adding it.
    pub fn find(&self, request: &AnyRequest) -> Option<NodeId> {
        self.index.get(request).copied()
    }

    /// The canonical request of a node.
    pub fn request(&self, id: NodeId) -> &AnyRequest {
        &self.nodes[id.0].request
    }

    /// The dependencies of a node.
    pub fn edges(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].edges
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.0].edges.push(to);
    }

    pub fn clear_edges(&mut self, id: NodeId) {
        self.nodes[id.0].edges.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    /// Render the dependencies of `root` as an indented tree.
    ///
    /// A node is expanded only the first time it is reached. Later
    /// occurrences are marked as a cyclic dependency if the node is an
    /// ancestor of itself on the printed path and as elided otherwise. Nodes
    /// in `highlight` are marked with `*`.
    pub fn print_tree(
        &self,
        cache: &Cache,
        root: NodeId,
        highlight: &[NodeId],
        out: &mut dyn Write,
    ) -> fmt::Result {
        TreePrinter {
            graph: self,
            cache,
            highlight,
            visited: FxHashSet::default(),
            path: Vec::new(),
            prefix: String::new(),
        }
        .print(root, true, out)
    }

    /// Render the whole graph in GraphViz format.
    ///
    /// Nodes are numbered in order of their display strings so that the
    /// output is deterministic.
    pub fn print_graphviz(&self, cache: &Cache, out: &mut dyn Write) -> fmt::Result {
        let mut order: Vec<(String, NodeId)> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.request.to_string(), NodeId(i)))
            .collect();
        order.sort();

        let names: FxHashMap<NodeId, usize> =
            order.iter().enumerate().map(|(i, &(_, id))| (id, i)).collect();

        writeln!(out, "digraph Dependencies {{")?;

        for (_, source) in &order {
            for target in self.edges(*source) {
                writeln!(out, "  request_{} -> request_{};", names[source], names[target])?;
            }
        }

        writeln!(out)?;

        for (i, (label, id)) in order.iter().enumerate() {
            write!(out, "  request_{i} [label=\"{}", Escaped(label))?;
            if let Some(value) = cache.get(*id) {
                write!(out, " -> {}", Escaped(&value.to_string()))?;
            }
            let zone = self.request(*id).tag().zone();
            let color = COLORS[zone.0 as usize % COLORS.len()];
            writeln!(out, "\", style=filled, fillcolor=\"{color}\"];")?;
        }

        writeln!(out, "}}")
    }
}

/// Fill colors for graph nodes, picked by zone.
const COLORS: [&str; 10] = [
    "aquamarine",
    "blueviolet",
    "brown",
    "burlywood",
    "cadetblue",
    "chartreuse",
    "chocolate",
    "coral",
    "cornflowerblue",
    "crimson",
];

/// State for printing a dependency tree.
struct TreePrinter<'a> {
    graph: &'a DependencyGraph,
    cache: &'a Cache,
    highlight: &'a [NodeId],
    /// Every node printed so far.
    visited: FxHashSet<NodeId>,
    /// The ancestors of the node being printed.
    path: Vec<NodeId>,
    /// The indentation of the node being printed.
    prefix: String,
}

impl TreePrinter<'_> {
    fn print(&mut self, node: NodeId, last: bool, out: &mut dyn Write) -> fmt::Result {
        let graph = self.graph;
        let marker = if self.highlight.contains(&node) { "*" } else { "" };
        write!(out, "{}`-- {marker}{}", self.prefix, graph.request(node))?;

        if let Some(value) = self.cache.get(node) {
            write!(out, " -> {value}")?;
        }

        if !self.visited.insert(node) {
            return if self.path.contains(&node) {
                writeln!(out, " (cyclic dependency)")
            } else {
                writeln!(out, " (elided)")
            };
        }

        writeln!(out)?;

        let edges = graph.edges(node);
        self.prefix.push_str(if last { "    " } else { "|   " });
        self.path.push(node);

        for (i, &child) in edges.iter().enumerate() {
            self.print(child, i + 1 == edges.len(), out)?;
        }

        self.path.pop();
        self.prefix.truncate(self.prefix.len() - 4);

        Ok(())
    }
}

/// Escapes a label for a quoted GraphViz string.
struct Escaped<'a>(&'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}
