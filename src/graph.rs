//! Advisory channel-graph lookups.
//!
//! The next-hop label only feeds logging and the decision request. Lookups
//! are bounded by a timeout and every failure degrades to
//! [`UNKNOWN_NEXT_HOP`].

use std::{error::Error, time::Duration};

use async_trait::async_trait;
use log::debug;
use tokio::time::timeout;

use crate::model::{NodeId, ShortChannelId};

/// Label used when the next hop cannot be resolved.
pub const UNKNOWN_NEXT_HOP: &str = "<unknown>";

/// Error type returned by [`ChannelGraph`] implementations.
pub type GraphError = Box<dyn Error + Send + Sync>;

/// One direction of a channel as reported by the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelEdge {
    /// Node the edge originates from.
    pub source: NodeId,
    /// Node the edge points to.
    pub destination: NodeId,
}

impl ChannelEdge {
    /// The endpoint opposite `local`, if `local` is on this edge.
    #[must_use]
    pub fn counterparty(&self, local: &NodeId) -> Option<NodeId> {
        if self.source == *local {
            Some(self.destination)
        } else if self.destination == *local {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Source of channel descriptors keyed by short channel id.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ChannelGraph: Send + Sync + 'static {
    /// All known edges of the channel `short_channel_id`.
    ///
    /// # Errors
    ///
    /// Errors are logged and otherwise ignored.
    async fn channels(&self, short_channel_id: ShortChannelId) -> Result<Vec<ChannelEdge>, GraphError>;
}

/// Graph that knows no channels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGraph;

#[async_trait]
impl ChannelGraph for NoGraph {
    async fn channels(&self, _short_channel_id: ShortChannelId) -> Result<Vec<ChannelEdge>, GraphError> {
        Ok(Vec::new())
    }
}

/// Resolve the peer on the far side of `short_channel_id` from `local`.
///
/// Returns [`UNKNOWN_NEXT_HOP`] when the lookup fails, times out, or finds no
/// edge touching `local`.
pub async fn next_hop_label<G>(
    graph: &G,
    local: &NodeId,
    short_channel_id: ShortChannelId,
    limit: Duration,
) -> String
where
    G: ChannelGraph + ?Sized,
{
    let edges = match timeout(limit, graph.channels(short_channel_id)).await {
        Ok(Ok(edges)) => edges,
        Ok(Err(e)) => {
            debug!("graph lookup failed: short_channel_id={short_channel_id}, error={e}");
            return UNKNOWN_NEXT_HOP.to_owned();
        }
        Err(_) => {
            debug!("graph lookup timed out: short_channel_id={short_channel_id}, limit={limit:?}");
            return UNKNOWN_NEXT_HOP.to_owned();
        }
    };
    edges
        .iter()
        .find_map(|edge| edge.counterparty(local))
        .map_or_else(|| UNKNOWN_NEXT_HOP.to_owned(), |peer| peer.to_string())
}
