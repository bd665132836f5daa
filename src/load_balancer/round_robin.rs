//! Round-robin selection over a fixed node list.

use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::endpoint::EndpointInfo;

/// Round-robin selector.
/// Owns its nodes and a cursor that always stays in `[0, len)`.
#[derive(Debug, Default)]
pub struct RoundRobin {
    nodes: Vec<EndpointInfo>,
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new(nodes: Vec<EndpointInfo>) -> Self {
        if nodes.is_empty() {
            tracing::warn!("Round-robin selector created without any valid endpoint");
        }
        Self {
            nodes,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Return the node under the cursor and advance it.
    ///
    /// Returns `None` when the selector holds no nodes.
    pub fn next(&self) -> Option<EndpointInfo> {
        let len = self.nodes.len();
        if len == 0 {
            return None;
        }

        // The update closure never returns None, so this is always Ok.
        let current = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
        {
            Ok(prev) | Err(prev) => prev,
        };

        Some(self.nodes[current].clone())
    }

    pub fn nodes(&self) -> &[EndpointInfo] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
