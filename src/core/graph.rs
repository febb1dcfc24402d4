//! Generic directed graph keyed by vertex id.
//!
//! `Graph` wraps petgraph's `DiGraph` with an id → index map so vertices can
//! be found by their domain key. It performs no cycle detection; callers
//! validate with [`crate::core::topo::topological_sort`] once the graph is
//! built.

use crate::error::{Error, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

/// Identity and metadata of a graph vertex.
pub trait Vertex {
    fn vertex_id(&self) -> &str;

    fn metadata(&self) -> &BTreeMap<String, String>;

    /// Merge `metadata` into the vertex, overwriting existing keys.
    fn merge_metadata(&mut self, metadata: BTreeMap<String, String>);
}

/// Opaque handle to a vertex of one particular [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexRef(NodeIndex);

impl VertexRef {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

impl std::fmt::Display for VertexRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

pub struct Graph<V: Vertex> {
    graph: DiGraph<V, ()>,
    index: HashMap<String, NodeIndex>,
}

impl<V: Vertex> Graph<V> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add a vertex. A vertex whose id is already present is not added
    /// again; the existing handle is returned.
    pub fn add(&mut self, vertex: V) -> VertexRef {
        if let Some(&index) = self.index.get(vertex.vertex_id()) {
            return VertexRef(index);
        }

        let id = vertex.vertex_id().to_string();
        let index = self.graph.add_node(vertex);
        self.index.insert(id, index);
        VertexRef(index)
    }

    /// Add the edge `source → target`. Repeated edges collapse into one.
    pub fn connect(&mut self, source: VertexRef, target: VertexRef) -> Result<()> {
        self.check(source)?;
        self.check(target)?;
        self.graph.update_edge(source.0, target.0, ());
        Ok(())
    }

    pub fn contains(&self, vertex: VertexRef) -> bool {
        self.graph.node_weight(vertex.0).is_some()
    }

    fn check(&self, vertex: VertexRef) -> Result<()> {
        if self.contains(vertex) {
            Ok(())
        } else {
            Err(Error::VertexTypeMismatch(format!(
                "handle {} is not a vertex of this graph",
                vertex
            )))
        }
    }

    pub fn get(&self, vertex: VertexRef) -> Option<&V> {
        self.graph.node_weight(vertex.0)
    }

    pub fn get_mut(&mut self, vertex: VertexRef) -> Option<&mut V> {
        self.graph.node_weight_mut(vertex.0)
    }

    pub fn find(&self, id: &str) -> Option<VertexRef> {
        self.index.get(id).copied().map(VertexRef)
    }

    /// All vertex handles, in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexRef> + '_ {
        self.graph.node_indices().map(VertexRef)
    }

    /// All edges as `(source, target)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (VertexRef, VertexRef)> + '_ {
        self.graph
            .raw_edges()
            .iter()
            .map(|edge| (VertexRef(edge.source()), VertexRef(edge.target())))
    }

    /// Vertices with an edge into `vertex`.
    pub fn immediate_ancestors(&self, vertex: VertexRef) -> Vec<VertexRef> {
        self.neighbors(vertex, Direction::Incoming)
    }

    /// Vertices with an edge out of `vertex`.
    pub fn immediate_descendants(&self, vertex: VertexRef) -> Vec<VertexRef> {
        self.neighbors(vertex, Direction::Outgoing)
    }

    fn neighbors(&self, vertex: VertexRef, direction: Direction) -> Vec<VertexRef> {
        if !self.contains(vertex) {
            return Vec::new();
        }
        // petgraph walks adjacency lists newest-first
        let mut found: Vec<VertexRef> = self
            .graph
            .neighbors_directed(vertex.0, direction)
            .map(VertexRef)
            .collect();
        found.sort();
        found
    }

    pub fn has_edge(&self, source: VertexRef, target: VertexRef) -> bool {
        self.contains(source)
            && self.contains(target)
            && self.graph.find_edge(source.0, target.0).is_some()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

impl<V: Vertex> Default for Graph<V> {
    fn default() -> Self {
        Self::new()
    }
}
