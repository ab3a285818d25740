//! The four-state lattice every server-backed field lives in.
//!
//! Valid transitions:
//! - `not-asked -> loading`
//! - `loading -> loaded`
//! - `loading -> failed`
//! - `loaded -> loading` (explicit new request)
//! - `failed -> loading` (explicit new request)
//!
//! A resource never falls back to `not-asked` on its own. The one explicit
//! exception is [`Slot::restore`], used when a request is refused with 403
//! and the pre-request value is put back.

use crate::error::ApiError;
use crate::model::ProjectId;
use crate::staleness::Token;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "kebab-case")]
pub enum Resource<T> {
    NotAsked,
    Loading,
    Loaded(T),
    Failed(ApiError),
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self::NotAsked
    }
}

/// Payload-free projection of a [`Resource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoarseState {
    #[default]
    NotAsked,
    Loading,
    Loaded,
    Failed,
}

impl CoarseState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::NotAsked => "not-asked",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }

    /// Validate whether a transition from self to `target` is allowed.
    pub fn can_transition_to(self, target: Self) -> Result<(), TransitionError> {
        let allowed = matches!(
            (self, target),
            (Self::NotAsked | Self::Loaded | Self::Failed, Self::Loading)
                | (Self::Loading, Self::Loaded | Self::Failed)
        );
        if allowed {
            Ok(())
        } else {
            Err(TransitionError {
                from: self,
                to: target,
            })
        }
    }
}

impl fmt::Display for CoarseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a resource transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource transition {from} -> {to}")]
pub struct TransitionError {
    pub from: CoarseState,
    pub to: CoarseState,
}

impl<T> Resource<T> {
    #[must_use]
    pub const fn coarse(&self) -> CoarseState {
        match self {
            Self::NotAsked => CoarseState::NotAsked,
            Self::Loading => CoarseState::Loading,
            Self::Loaded(_) => CoarseState::Loaded,
            Self::Failed(_) => CoarseState::Failed,
        }
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Start a new request.
    pub fn begin(self) -> Result<Self, TransitionError> {
        self.coarse().can_transition_to(CoarseState::Loading)?;
        Ok(Self::Loading)
    }

    /// Merge a fetch outcome into a `Loading` resource.
    ///
    /// Stale responses must already have been rejected by the caller.
    pub fn resolve(self, outcome: Result<T, ApiError>) -> Result<Self, TransitionError> {
        let next = match outcome {
            Ok(value) => Self::Loaded(value),
            Err(err) => Self::Failed(err),
        };
        self.coarse().can_transition_to(next.coarse())?;
        Ok(next)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resource<U> {
        match self {
            Self::NotAsked => Resource::NotAsked,
            Self::Loading => Resource::Loading,
            Self::Loaded(value) => Resource::Loaded(f(value)),
            Self::Failed(err) => Resource::Failed(err),
        }
    }
}

/// Which slice of the server a cached resource was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "scope", content = "value", rename_all = "kebab-case")]
pub enum Scope {
    #[default]
    Global,
    Project(ProjectId),
    Projects(Vec<ProjectId>),
}

/// A [`Resource`] field plus the bookkeeping the dispatcher needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot<T> {
    pub resource: Resource<T>,
    pub scope: Scope,
    in_flight: Option<Token>,
    /// Value and scope to put back if the request is refused.
    fallback: Option<(Scope, Resource<T>)>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            resource: Resource::NotAsked,
            scope: Scope::Global,
            in_flight: None,
            fallback: None,
        }
    }
}

impl<T: Clone> Slot<T> {
    /// Move to `Loading` for `scope`, remembering the request token and the
    /// value (with the scope it was fetched for) to restore if the request
    /// is refused.
    #[must_use]
    pub fn begin(self, scope: Scope, token: Token) -> Self {
        let fallback = match &self.resource {
            Resource::Loaded(_) => Some((self.scope.clone(), self.resource.clone())),
            Resource::Loading => self.fallback.clone(),
            Resource::NotAsked | Resource::Failed(_) => {
                Some((self.scope.clone(), Resource::NotAsked))
            }
        };
        let resource = match self.resource {
            Resource::Loading => Resource::Loading,
            other => other.begin().unwrap_or(Resource::Loading),
        };
        Self {
            resource,
            scope,
            in_flight: Some(token),
            fallback,
        }
    }

    /// True when `token` is the request this slot is waiting on.
    #[must_use]
    pub fn awaits(&self, token: &Token) -> bool {
        self.in_flight.as_ref() == Some(token)
    }

    #[must_use]
    pub const fn in_flight(&self) -> Option<&Token> {
        self.in_flight.as_ref()
    }

    /// True when a refused request would put a loaded value back.
    #[must_use]
    pub const fn restores_loaded(&self) -> bool {
        matches!(self.fallback, Some((_, Resource::Loaded(_))))
    }

    /// Apply the response to the awaited request.
    #[must_use]
    pub fn settle(self, outcome: Result<T, ApiError>) -> Self {
        let resource = match self.resource.clone().resolve(outcome.clone()) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(%err, "settling a slot that was not loading");
                match outcome {
                    Ok(value) => Resource::Loaded(value),
                    Err(api) => Resource::Failed(api),
                }
            }
        };
        Self {
            resource,
            scope: self.scope,
            in_flight: None,
            fallback: None,
        }
    }

    /// Put back the pre-request value and its scope (403 handling).
    #[must_use]
    pub fn restore(self) -> Self {
        let (scope, resource) = self
            .fallback
            .unwrap_or((self.scope, Resource::NotAsked));
        Self {
            resource,
            scope,
            in_flight: None,
            fallback: None,
        }
    }

    /// Directly commit a value without a round trip (empty fan-out).
    #[must_use]
    pub fn commit(self, scope: Scope, value: T) -> Self {
        Self {
            resource: Resource::Loaded(value),
            scope,
            in_flight: None,
            fallback: None,
        }
    }

    /// Mark as failed outside a settle (fan-out branch failure).
    #[must_use]
    pub fn fail(self, err: ApiError) -> Self {
        Self {
            resource: Resource::Failed(err),
            scope: self.scope,
            in_flight: None,
            fallback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pid;
    use crate::staleness::{Generations, Stream};

    #[test]
    fn lattice_accepts_documented_transitions() {
        use CoarseState::*;
        for (from, to) in [
            (NotAsked, Loading),
            (Loading, Loaded),
            (Loading, Failed),
            (Loaded, Loading),
            (Failed, Loading),
        ] {
            assert!(from.can_transition_to(to).is_ok(), "{from} -> {to}");
        }
    }

    #[test]
    fn lattice_rejects_silent_reverts() {
        use CoarseState::*;
        for (from, to) in [
            (Loaded, NotAsked),
            (Failed, NotAsked),
            (Loading, NotAsked),
            (NotAsked, Loaded),
            (Loaded, Loaded),
            (Loading, Loading),
        ] {
            assert!(from.can_transition_to(to).is_err(), "{from} -> {to}");
        }
    }

    #[test]
    fn resolve_replaces_loading() {
        let loaded = Resource::<u32>::Loading.resolve(Ok(4)).expect("resolve");
        assert_eq!(loaded, Resource::Loaded(4));

        let failed = Resource::<u32>::Loading
            .resolve(Err(ApiError::new(500, "boom")))
            .expect("resolve");
        assert_eq!(failed.coarse(), CoarseState::Failed);
    }

    #[test]
    fn resolve_without_request_is_rejected() {
        let err = Resource::<u32>::NotAsked.resolve(Ok(1)).unwrap_err();
        assert_eq!(err.from, CoarseState::NotAsked);
        assert_eq!(err.to, CoarseState::Loaded);
    }

    #[test]
    fn slot_tracks_in_flight_token() {
        let mut generations = Generations::default();
        let token = generations.next(Stream::Projects);
        let slot = Slot::<u32>::default().begin(Scope::Global, token);
        assert!(slot.awaits(&token));
        assert!(slot.resource.is_loading());

        let slot = slot.settle(Ok(9));
        assert_eq!(slot.resource, Resource::Loaded(9));
        assert!(!slot.awaits(&token), "settled slot must not accept duplicates");
    }

    #[test]
    fn restore_puts_back_previous_loaded_value() {
        let mut generations = Generations::default();
        let first = generations.next(Stream::Members);
        let slot = Slot::<u32>::default()
            .begin(Scope::Project(pid(1)), first)
            .settle(Ok(3));

        let second = generations.next(Stream::Members);
        let refused = slot.begin(Scope::Project(pid(1)), second).restore();
        assert_eq!(refused.resource, Resource::Loaded(3));
    }

    #[test]
    fn restore_puts_back_the_scope_the_value_was_fetched_for() {
        let mut generations = Generations::default();
        let first = generations.next(Stream::Members);
        let slot = Slot::<u32>::default()
            .begin(Scope::Project(pid(1)), first)
            .settle(Ok(3));

        let second = generations.next(Stream::Members);
        let refused = slot.begin(Scope::Project(pid(2)), second).restore();
        assert_eq!(refused.resource, Resource::Loaded(3));
        assert_eq!(refused.scope, Scope::Project(pid(1)));
    }

    #[test]
    fn restore_after_failure_goes_back_to_not_asked() {
        let mut generations = Generations::default();
        let token = generations.next(Stream::Members);
        let slot = Slot::<u32> {
            resource: Resource::Failed(ApiError::new(500, "x")),
            ..Slot::default()
        };
        let refused = slot.begin(Scope::Global, token).restore();
        assert_eq!(refused.resource, Resource::NotAsked);
    }

    #[test]
    fn superseding_begin_keeps_original_fallback() {
        let mut generations = Generations::default();
        let t1 = generations.next(Stream::Members);
        let t2 = generations.next(Stream::Members);
        let slot = Slot::<u32> {
            resource: Resource::Loaded(1),
            ..Slot::default()
        }
        .begin(Scope::Project(pid(1)), t1)
        .begin(Scope::Project(pid(2)), t2);
        assert!(slot.awaits(&t2));
        let restored = slot.restore();
        assert_eq!(restored.resource, Resource::Loaded(1));
        assert_eq!(restored.scope, Scope::Global);
    }
}
