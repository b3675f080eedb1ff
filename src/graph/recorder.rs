//! Concurrency-safe recorder for the crawl's link graph
//!
//! Fetch completions arrive from many tasks at once. Every mutation runs the
//! whole lookup-or-create-and-mutate sequence under one lock, and nothing
//! inside the lock awaits or does I/O.

use crate::graph::node::{FetchError, Node, NodeId, NodeView, ResponseData};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

/// Arena of nodes keyed by normalized URL, plus the directed link edges
///
/// Nodes are never removed, so a `NodeIndex` (and the `NodeId` derived from
/// it) is stable for the lifetime of the graph.
#[derive(Debug, Default)]
struct LinkGraph {
    index: HashMap<String, NodeIndex>,
    graph: DiGraph<Node, ()>,
}

impl LinkGraph {
    fn lookup_or_insert(&mut self, url: &Url) -> NodeIndex {
        if let Some(&idx) = self.index.get(url.as_str()) {
            debug_assert_eq!(
                self.graph[idx].url.as_str(),
                url.as_str(),
                "node key maps to a node with a different URL"
            );
            return idx;
        }

        let id = NodeId(self.graph.node_count());
        let idx = self.graph.add_node(Node::discovered(id, url.clone()));
        debug_assert_eq!(idx.index(), id.0, "node ids must be dense");
        self.index.insert(url.as_str().to_string(), idx);
        idx
    }

    fn view(&self, idx: NodeIndex) -> NodeView {
        let node = &self.graph[idx];
        let response = node.response();
        NodeView {
            id: node.id(),
            url: node.url().to_string(),
            state: node.state(),
            status_code: response.map(|r| r.status_code),
            content_type: response.and_then(|r| r.content_type()).map(str::to_string),
            content_length: response.and_then(|r| r.content_length),
            fetch_duration: response.map(|r| r.fetch_duration),
            error: node.error().map(|e| e.to_string()),
            links_out: self.graph.neighbors_directed(idx, Direction::Outgoing).count(),
            links_in: self.graph.neighbors_directed(idx, Direction::Incoming).count(),
        }
    }
}

/// Records fetched pages and the links between them
#[derive(Debug, Default)]
pub struct Recorder {
    inner: Mutex<LinkGraph>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while holding the lock cannot leave the graph half-edited, since
    /// every mutation is a single insert or field assignment.
    fn graph(&self) -> MutexGuard<'_, LinkGraph> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the result of fetching `url`
    ///
    /// Creates the node if this is the first sighting. A response is attached
    /// only while the node has none, so the first successful response wins.
    /// Returns the node as it stands after the call.
    pub fn record_response(
        &self,
        url: &Url,
        response: Option<ResponseData>,
        error: Option<FetchError>,
    ) -> Node {
        let mut g = self.graph();
        let idx = g.lookup_or_insert(url);
        let node = &mut g.graph[idx];
        if node.record(response, error) {
            tracing::debug!("Recorded response for {} ({})", url, node.state());
        } else {
            tracing::trace!("Response for {} already recorded, keeping the first", url);
        }
        node.clone()
    }

    /// Records that `parent`'s document links to `child`
    ///
    /// Creates the child node on first sighting and adds the edge unless it
    /// already exists or would be a self link. Returns the child node.
    pub fn record_link(&self, parent: &Node, child: &Url) -> Node {
        let mut g = self.graph();
        let parent_idx = g.lookup_or_insert(&parent.url);
        debug_assert_eq!(
            parent_idx.index(),
            parent.id.0,
            "parent node was not issued by this recorder"
        );
        let child_idx = g.lookup_or_insert(child);
        if parent_idx != child_idx {
            g.graph.update_edge(parent_idx, child_idx, ());
            tracing::trace!("Recorded link {} --> {}", parent.url, child);
        }
        g.graph[child_idx].clone()
    }

    /// Returns every node, newest first
    pub fn nodes(&self) -> Vec<Node> {
        let g = self.graph();
        g.graph
            .node_indices()
            .rev()
            .map(|idx| g.graph[idx].clone())
            .collect()
    }

    /// Returns a display view of every node, newest first
    pub fn node_views(&self) -> Vec<NodeView> {
        let g = self.graph();
        g.graph.node_indices().rev().map(|idx| g.view(idx)).collect()
    }

    /// Looks up the node recorded for `url`
    pub fn node(&self, url: &Url) -> Option<Node> {
        let g = self.graph();
        g.index.get(url.as_str()).map(|&idx| g.graph[idx].clone())
    }

    pub fn node_count(&self) -> usize {
        self.graph().graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph().graph.edge_count()
    }

    /// Returns all edges as (parent, child) pairs in ascending order
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let g = self.graph();
        let mut edges: Vec<_> = g
            .graph
            .edge_references()
            .map(|e| (NodeId(e.source().index()), NodeId(e.target().index())))
            .collect();
        edges.sort();
        edges
    }

    /// Returns true if the document at `parent` links to `child`
    pub fn has_edge(&self, parent: &Url, child: &Url) -> bool {
        let g = self.graph();
        match (g.index.get(parent.as_str()), g.index.get(child.as_str())) {
            (Some(&p), Some(&c)) => g.graph.contains_edge(p, c),
            _ => false,
        }
    }

    /// Returns the URLs linked from `url`, in ascending node order
    pub fn links_from(&self, url: &Url) -> Vec<Url> {
        let g = self.graph();
        let Some(&idx) = g.index.get(url.as_str()) else {
            return Vec::new();
        };
        let mut children: Vec<NodeIndex> = g
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        children.sort();
        children
            .into_iter()
            .map(|child| g.graph[child].url.clone())
            .collect()
    }
}
