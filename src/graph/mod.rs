//! Link graph module
//!
//! This module records what the crawl has seen:
//! - `Node`: one per distinct normalized URL, with its fetch result
//! - `Recorder`: the concurrency-safe store of nodes and link edges

mod node;
mod recorder;

pub use node::{FetchError, Node, NodeId, NodeState, NodeView, ResponseData};
pub use recorder::Recorder;
