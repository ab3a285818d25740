//! Folding fetch replies back into the model.
//!
//! Callers have already checked that the token is the current one for its
//! stream and handled 401. What remains is matching the reply to the slot
//! that awaits it, applying the lattice merge, and the 403 policy.

use super::model::Model;
use super::msg::Reply;
use crate::error::ApiError;
use crate::join::{FanInJoin, JoinProgress};
use crate::model::{ProjectId, Task, User};
use crate::resource::Slot;
use crate::staleness::{Stream, Token};
use std::mem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Progress {
    /// A resource settled as loaded.
    Success,
    /// A resource settled as failed.
    Failure,
    /// A fan-out branch merged; the aggregate is still loading.
    Pending,
    /// No slot awaited this reply (duplicate or superseded).
    Stale,
    Claimed(Task),
    ClaimRejected(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Applied {
    pub progress: Progress,
    /// A 403 to surface as a notification.
    pub forbidden: Option<ApiError>,
}

impl Applied {
    const fn plain(progress: Progress) -> Self {
        Self {
            progress,
            forbidden: None,
        }
    }
}

pub(super) fn apply(mut model: Model, token: Token, reply: Reply) -> (Model, Applied) {
    let applied = match reply {
        Reply::Me(result) => session(&mut model.core.me, &token, result),
        Reply::Projects(result) => settle(&mut model.core.projects, &token, result),
        Reply::Capabilities(result) => settle(&mut model.core.capabilities, &token, result),
        Reply::InviteLinks(result) => settle(&mut model.admin.invite_links, &token, result),
        Reply::Members(result) => settle(&mut model.admin.members, &token, result),
        Reply::TaskTypes(result) => settle(&mut model.admin.task_types, &token, result),
        Reply::OrgMetricsOverview(result) => {
            settle(&mut model.admin.org_overview, &token, result)
        }
        Reply::OrgMetricsProjectTasks(result) => {
            settle(&mut model.admin.project_task_metrics, &token, result)
        }
        Reply::WorkSessions(result) => settle(&mut model.member.work_sessions, &token, result),
        Reply::MeMetrics(result) => settle(&mut model.member.me_metrics, &token, result),
        Reply::SearchTasks(result) => settle(&mut model.member.search.results, &token, result),
        Reply::ProjectTasks { project, result } => branch(
            &mut model.member.tasks,
            &mut model.member.tasks_join,
            &token,
            project,
            result,
        ),
        Reply::ProjectTaskTypes { project, result } => branch(
            &mut model.member.task_types,
            &mut model.member.task_types_join,
            &token,
            project,
            result,
        ),
        Reply::ClaimTask(result) => claim(&mut model, &token, result),
    };
    (model, applied)
}

/// Single-resource merge. 403 puts back the pre-request value.
fn settle<T: Clone>(slot: &mut Slot<T>, token: &Token, result: Result<T, ApiError>) -> Applied {
    if !slot.awaits(token) {
        tracing::debug!(%token, "no slot awaits reply, discarded");
        return Applied::plain(Progress::Stale);
    }
    let current = mem::take(slot);
    match result {
        Ok(value) => {
            *slot = current.settle(Ok(value));
            Applied::plain(Progress::Success)
        }
        Err(err) if err.is_forbidden() => {
            tracing::warn!(%token, %err, "request forbidden, previous value restored");
            *slot = current.restore();
            Applied {
                progress: Progress::Failure,
                forbidden: Some(err),
            }
        }
        Err(err) => {
            tracing::debug!(%token, %err, "request failed");
            *slot = current.settle(Err(err));
            Applied::plain(Progress::Failure)
        }
    }
}

/// The session check. A 403 with no signed-in user to put back leaves the
/// session failed, so protected routes fall back to login instead of
/// waiting on a user that will never load.
fn session(slot: &mut Slot<User>, token: &Token, result: Result<User, ApiError>) -> Applied {
    match result {
        Err(err) if err.is_forbidden() && !slot.restores_loaded() => {
            if !slot.awaits(token) {
                return Applied::plain(Progress::Stale);
            }
            tracing::warn!(%token, %err, "session check forbidden, treated as signed out");
            *slot = mem::take(slot).settle(Err(err.clone()));
            Applied {
                progress: Progress::Failure,
                forbidden: Some(err),
            }
        }
        other => settle(slot, token, other),
    }
}

/// One branch of the member fan-out. A 403 branch counts as resolved with
/// no items.
fn branch<T: Clone>(
    slot: &mut Slot<Vec<T>>,
    join: &mut Option<FanInJoin<ProjectId, T>>,
    token: &Token,
    project: ProjectId,
    result: Result<Vec<T>, ApiError>,
) -> Applied {
    let Some(active) = join.as_mut().filter(|active| active.token() == token) else {
        tracing::debug!(%token, %project, "branch for a finished fan-out discarded");
        return Applied::plain(Progress::Stale);
    };
    if !slot.awaits(token) {
        return Applied::plain(Progress::Stale);
    }

    let (result, forbidden) = match result {
        Err(err) if err.is_forbidden() => {
            tracing::warn!(%token, %project, "branch forbidden, resolved empty");
            (Ok(Vec::new()), Some(err))
        }
        other => (other, None),
    };

    let progress = match active.accept(&project, result) {
        JoinProgress::Pending { remaining } => {
            tracing::debug!(%token, %project, remaining, "branch merged");
            Progress::Pending
        }
        JoinProgress::Complete(items) => {
            tracing::debug!(%token, items = items.len(), "fan-out complete");
            *slot = mem::take(slot).settle(Ok(items));
            *join = None;
            Progress::Success
        }
        JoinProgress::Failed(err) => {
            tracing::debug!(%token, %project, %err, "branch failed, aggregate failed");
            *slot = mem::take(slot).settle(Err(err));
            *join = None;
            Progress::Failure
        }
        JoinProgress::Ignored => Progress::Stale,
    };
    Applied { progress, forbidden }
}

fn claim(model: &mut Model, token: &Token, result: Result<Task, ApiError>) -> Applied {
    let Stream::Claim(task) = token.stream else {
        return Applied::plain(Progress::Stale);
    };
    if model.member.claims.get(&task) != Some(token) {
        tracing::debug!(%token, "duplicate claim reply discarded");
        return Applied::plain(Progress::Stale);
    }
    model.member.claims.remove(&task);
    match result {
        Ok(claimed) => Applied::plain(Progress::Claimed(claimed)),
        Err(err) if err.is_forbidden() => Applied {
            progress: Progress::Failure,
            forbidden: Some(err),
        },
        Err(err) => Applied::plain(Progress::ClaimRejected(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pid;
    use crate::resource::{Resource, Scope};
    use crate::staleness::Generations;

    #[test]
    fn settle_ignores_slot_not_awaiting() {
        let mut slot = Slot::<u32>::default();
        let mut generations = Generations::default();
        let token = generations.next(Stream::Members);
        let applied = settle(&mut slot, &token, Ok(1));
        assert_eq!(applied.progress, Progress::Stale);
        assert_eq!(slot.resource, Resource::NotAsked);
    }

    #[test]
    fn forbidden_restores_and_reports() {
        let mut generations = Generations::default();
        let token = generations.next(Stream::Members);
        let mut slot = Slot::<u32>::default().begin(Scope::Global, token);
        let applied = settle(&mut slot, &token, Err(ApiError::new(403, "no")));
        assert_eq!(slot.resource, Resource::NotAsked);
        assert!(applied.forbidden.is_some());
    }

    #[test]
    fn forbidden_session_check_fails_instead_of_restoring() {
        let mut generations = Generations::default();
        let token = generations.next(Stream::Me);
        let mut slot = Slot::<User>::default().begin(Scope::Global, token);
        let applied = session(&mut slot, &token, Err(ApiError::new(403, "no")));
        assert_eq!(applied.progress, Progress::Failure);
        assert!(matches!(slot.resource, Resource::Failed(_)));
    }

    #[test]
    fn forbidden_branch_resolves_empty() {
        let mut generations = Generations::default();
        let token = generations.next(Stream::MemberRefresh);
        let keys = [pid(1), pid(2)];
        let mut slot = Slot::<Vec<u32>>::default().begin(Scope::Projects(keys.to_vec()), token);
        let mut join = Some(FanInJoin::new(token, keys));

        let first = branch(&mut slot, &mut join, &token, pid(1), Err(ApiError::new(403, "x")));
        assert_eq!(first.progress, Progress::Pending);
        assert!(first.forbidden.is_some());

        let second = branch(&mut slot, &mut join, &token, pid(2), Ok(vec![5]));
        assert_eq!(second.progress, Progress::Success);
        assert_eq!(slot.resource, Resource::Loaded(vec![5]));
        assert!(join.is_none());
    }
}
