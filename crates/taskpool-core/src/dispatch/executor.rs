//! Command executor: move the target slot to `Loading` under a fresh token
//! and emit the fetch that will settle it.

use super::model::Model;
use super::msg::{Effect, FetchRequest};
use crate::command::Command;
use crate::join::FanInJoin;
use crate::model::ProjectId;
use crate::resource::{Scope, Slot};
use crate::staleness::{Generations, Stream};
use std::mem;

/// Execute one fetch command. Redirects are routed by the caller and are
/// ignored here.
pub(super) fn execute(mut model: Model, command: Command, effects: &mut Vec<Effect>) -> Model {
    let gens = &mut model.generations;
    match command {
        Command::FetchMe => {
            let slot = mem::take(&mut model.core.me);
            model.core.me = issue(slot, gens, Stream::Me, Scope::Global, FetchRequest::Me, effects);
        }
        Command::FetchProjects => {
            let slot = mem::take(&mut model.core.projects);
            model.core.projects = issue(
                slot,
                gens,
                Stream::Projects,
                Scope::Global,
                FetchRequest::Projects,
                effects,
            );
        }
        Command::FetchInviteLinks => {
            let slot = mem::take(&mut model.admin.invite_links);
            model.admin.invite_links = issue(
                slot,
                gens,
                Stream::InviteLinks,
                Scope::Global,
                FetchRequest::InviteLinks,
                effects,
            );
        }
        Command::FetchCapabilities => {
            let slot = mem::take(&mut model.core.capabilities);
            model.core.capabilities = issue(
                slot,
                gens,
                Stream::Capabilities,
                Scope::Global,
                FetchRequest::Capabilities,
                effects,
            );
        }
        Command::FetchMembers(project) => {
            let slot = mem::take(&mut model.admin.members);
            model.admin.members = issue(
                slot,
                gens,
                Stream::Members,
                Scope::Project(project),
                FetchRequest::Members { project },
                effects,
            );
        }
        Command::FetchTaskTypes(project) => {
            let slot = mem::take(&mut model.admin.task_types);
            model.admin.task_types = issue(
                slot,
                gens,
                Stream::TaskTypes,
                Scope::Project(project),
                FetchRequest::TaskTypes { project },
                effects,
            );
        }
        Command::FetchWorkSessions => {
            let slot = mem::take(&mut model.member.work_sessions);
            model.member.work_sessions = issue(
                slot,
                gens,
                Stream::WorkSessions,
                Scope::Global,
                FetchRequest::WorkSessions,
                effects,
            );
        }
        Command::FetchMeMetrics => {
            let slot = mem::take(&mut model.member.me_metrics);
            model.member.me_metrics = issue(
                slot,
                gens,
                Stream::MeMetrics,
                Scope::Global,
                FetchRequest::MeMetrics,
                effects,
            );
        }
        Command::FetchOrgMetricsOverview => {
            let slot = mem::take(&mut model.admin.org_overview);
            model.admin.org_overview = issue(
                slot,
                gens,
                Stream::OrgMetricsOverview,
                Scope::Global,
                FetchRequest::OrgMetricsOverview,
                effects,
            );
        }
        Command::FetchOrgMetricsProjectTasks(project) => {
            let slot = mem::take(&mut model.admin.project_task_metrics);
            model.admin.project_task_metrics = issue(
                slot,
                gens,
                Stream::OrgMetricsProjectTasks,
                Scope::Project(project),
                FetchRequest::OrgMetricsProjectTasks { project },
                effects,
            );
        }
        Command::RefreshMemberResources(keys) => {
            return refresh_member(model, keys, effects);
        }
        Command::Redirect(route) => {
            tracing::debug!(route = %crate::route::format(&route), "redirect left to the router");
        }
    }
    model
}

fn issue<T: Clone>(
    slot: Slot<T>,
    generations: &mut Generations,
    stream: Stream,
    scope: Scope,
    request: FetchRequest,
    effects: &mut Vec<Effect>,
) -> Slot<T> {
    let token = generations.next(stream);
    tracing::debug!(%token, ?request, "fetch issued");
    effects.push(Effect::Fetch { request, token });
    slot.begin(scope, token)
}

/// Start the member fan-out over `keys`. A fresh token supersedes every
/// branch of the previous fan-out; an empty key set loads immediately.
fn refresh_member(mut model: Model, keys: Vec<ProjectId>, effects: &mut Vec<Effect>) -> Model {
    let token = model.generations.next(Stream::MemberRefresh);
    let scope = Scope::Projects(keys.clone());
    let tasks_join = FanInJoin::new(token, keys.iter().copied());
    let types_join = FanInJoin::new(token, keys.iter().copied());

    let member = &mut model.member;
    if let (Some(tasks), Some(types)) = (tasks_join.immediate(), types_join.immediate()) {
        tracing::debug!(%token, "empty key set, member resources loaded without fetching");
        member.tasks = mem::take(&mut member.tasks).commit(scope.clone(), tasks);
        member.task_types = mem::take(&mut member.task_types).commit(scope, types);
        member.tasks_join = None;
        member.task_types_join = None;
        return model;
    }

    tracing::debug!(%token, keys = keys.len(), "member fan-out issued");
    for project in tasks_join.keys() {
        effects.push(Effect::Fetch {
            request: FetchRequest::ProjectTasks { project: *project },
            token,
        });
        effects.push(Effect::Fetch {
            request: FetchRequest::ProjectTaskTypes { project: *project },
            token,
        });
    }
    member.tasks = mem::take(&mut member.tasks).begin(scope.clone(), token);
    member.task_types = mem::take(&mut member.task_types).begin(scope, token);
    member.tasks_join = Some(tasks_join);
    member.task_types_join = Some(types_join);
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pid;
    use crate::resource::Resource;

    #[test]
    fn fetch_moves_slot_to_loading_and_emits_request() {
        let mut effects = Vec::new();
        let model = execute(Model::default(), Command::FetchMembers(pid(3)), &mut effects);
        assert!(model.admin.members.resource.is_loading());
        assert_eq!(model.admin.members.scope, Scope::Project(pid(3)));

        let [Effect::Fetch { request, token }] = effects.as_slice() else {
            panic!("expected one fetch, got {effects:?}");
        };
        assert_eq!(request, &FetchRequest::Members { project: pid(3) });
        assert!(model.admin.members.awaits(token));
    }

    #[test]
    fn fan_out_issues_two_fetches_per_key_under_one_token() {
        let mut effects = Vec::new();
        let model = execute(
            Model::default(),
            Command::RefreshMemberResources(vec![pid(1), pid(2)]),
            &mut effects,
        );
        assert_eq!(effects.len(), 4);
        let token = model.member.tasks.in_flight().copied().expect("in flight");
        assert!(effects.iter().all(|effect| matches!(
            effect,
            Effect::Fetch { token: t, .. } if *t == token
        )));
        assert_eq!(model.member.tasks_join.as_ref().map(FanInJoin::remaining), Some(2));
    }

    #[test]
    fn empty_fan_out_loads_without_fetching() {
        let mut effects = Vec::new();
        let model = execute(
            Model::default(),
            Command::RefreshMemberResources(Vec::new()),
            &mut effects,
        );
        assert!(effects.is_empty());
        assert_eq!(model.member.tasks.resource, Resource::Loaded(Vec::new()));
        assert_eq!(model.member.tasks.scope, Scope::Projects(Vec::new()));
    }
}
