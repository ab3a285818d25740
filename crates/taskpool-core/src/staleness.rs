//! Generation tokens for discarding stale async results.
//!
//! There is no request cancellation. Every request carries the token that
//! was current for its stream when it was issued; a response is merged only
//! if that token is still the stream's latest. Issuing a new token therefore
//! supersedes everything in flight on the same stream.

use crate::model::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A logical request stream. Tokens from different streams never compete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "stream", content = "task", rename_all = "kebab-case")]
pub enum Stream {
    Me,
    Projects,
    InviteLinks,
    Capabilities,
    Members,
    TaskTypes,
    WorkSessions,
    MeMetrics,
    OrgMetricsOverview,
    OrgMetricsProjectTasks,
    /// Fan-out refresh of member tasks and task types; superseded by a
    /// project switch.
    MemberRefresh,
    /// Debounced text search.
    Search,
    /// One claim attempt per task.
    Claim(TaskId),
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim(task) => write!(f, "claim/{task}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Identity of one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub stream: Stream,
    pub generation: u64,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.stream, self.generation)
    }
}

/// Latest issued generation per stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generations {
    latest: BTreeMap<Stream, u64>,
}

impl Generations {
    /// Issue a new token for `stream`, superseding all earlier ones.
    pub fn next(&mut self, stream: Stream) -> Token {
        let generation = self.latest.entry(stream).or_insert(0);
        *generation = generation.saturating_add(1);
        Token {
            stream,
            generation: *generation,
        }
    }

    #[must_use]
    pub fn is_current(&self, token: &Token) -> bool {
        self.latest.get(&token.stream) == Some(&token.generation)
    }

    /// Latest generation issued on `stream`, if any.
    #[must_use]
    pub fn current(&self, stream: Stream) -> Option<Token> {
        self.latest.get(&stream).map(|generation| Token {
            stream,
            generation: *generation,
        })
    }

    /// Supersede every stream at once (session reset). Counters keep
    /// increasing; nothing issued before this call is current afterwards.
    pub fn supersede_all(&mut self) {
        for generation in self.latest.values_mut() {
            *generation = generation.saturating_add(1);
        }
    }
}
