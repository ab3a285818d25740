//! Hydration planner: `(route, snapshot) -> commands`.
//!
//! Pure and deterministic. The output is ordered: the project list first,
//! then project-independent fetches, then fetches scoped to a project. A
//! redirect is always returned alone.

use crate::command::Command;
use crate::model::ProjectId;
use crate::resource::{CoarseState, Scope};
use crate::route::{ConfigSection, MemberSection, OrgSection, Route};
use crate::snapshot::{AuthState, ResourceKey, Snapshot};

/// Compute the commands needed to hydrate `route`.
#[must_use]
pub fn plan(route: &Route, snapshot: &Snapshot) -> Vec<Command> {
    if route.is_public() {
        return plan_public(route, snapshot);
    }

    let role = match snapshot.auth {
        AuthState::Unknown => return fetch_me(snapshot),
        AuthState::Unauthed => return vec![Command::Redirect(Route::Login)],
        AuthState::Authed(role) => role,
    };

    if !route.allows(role) {
        return vec![Command::Redirect(Route::landing(role))];
    }

    if let Some(redirect) = project_redirect(route, snapshot) {
        return vec![redirect];
    }

    let mut out = Planned::new(snapshot);
    out.global(ResourceKey::Projects, Command::FetchProjects);
    plan_section(route, snapshot, &mut out);
    out.finish()
}

fn plan_public(route: &Route, snapshot: &Snapshot) -> Vec<Command> {
    match (route, snapshot.auth) {
        (Route::Login, AuthState::Unknown) => fetch_me(snapshot),
        (Route::Login, AuthState::Authed(role)) => vec![Command::Redirect(Route::landing(role))],
        _ => Vec::new(),
    }
}

fn fetch_me(snapshot: &Snapshot) -> Vec<Command> {
    if snapshot.state(ResourceKey::Me) == CoarseState::Loading {
        Vec::new()
    } else {
        vec![Command::FetchMe]
    }
}

/// A requested project missing from the loaded list sends the page back to
/// its default section on the first available project.
fn project_redirect(route: &Route, snapshot: &Snapshot) -> Option<Command> {
    let requested = route.project()?;
    let projects = snapshot.projects.as_deref()?;
    if projects.contains(&requested) {
        return None;
    }
    tracing::info!(project = %requested, "route names an unknown project");
    Some(Command::Redirect(
        route.default_section(projects.first().copied()),
    ))
}

fn plan_section(route: &Route, snapshot: &Snapshot, out: &mut Planned<'_>) {
    match route {
        Route::Config { section, project } => {
            let project = snapshot.resolve_project(*project);
            match section {
                ConfigSection::Members => {
                    out.scoped(project, ResourceKey::Members, Command::FetchMembers);
                }
                ConfigSection::Capabilities => {
                    out.global(ResourceKey::Capabilities, Command::FetchCapabilities);
                }
                ConfigSection::TaskTypes => {
                    out.global(ResourceKey::Capabilities, Command::FetchCapabilities);
                    out.scoped(project, ResourceKey::TaskTypes, Command::FetchTaskTypes);
                }
                ConfigSection::Metrics => out.scoped(
                    project,
                    ResourceKey::OrgMetricsProjectTasks,
                    Command::FetchOrgMetricsProjectTasks,
                ),
            }
        }
        Route::Org { section } => match section {
            OrgSection::Invites => out.global(ResourceKey::InviteLinks, Command::FetchInviteLinks),
            OrgSection::Projects => {}
            OrgSection::Metrics => {
                out.global(ResourceKey::OrgMetricsOverview, Command::FetchOrgMetricsOverview);
            }
        },
        Route::Member {
            section, project, ..
        } => match section {
            MemberSection::Pool | MemberSection::MyBar => {
                out.global(ResourceKey::WorkSessions, Command::FetchWorkSessions);
                out.fan_out(*project);
            }
            MemberSection::Skills => {
                out.global(ResourceKey::Capabilities, Command::FetchCapabilities);
            }
            MemberSection::Metrics => out.global(ResourceKey::MeMetrics, Command::FetchMeMetrics),
        },
        Route::Login | Route::AcceptInvite { .. } | Route::ResetPassword { .. } => {}
    }
}

/// Accumulates commands into the two ordered groups.
struct Planned<'a> {
    snapshot: &'a Snapshot,
    global: Vec<Command>,
    scoped: Vec<Command>,
}

impl<'a> Planned<'a> {
    const fn new(snapshot: &'a Snapshot) -> Self {
        Self {
            snapshot,
            global: Vec::new(),
            scoped: Vec::new(),
        }
    }

    fn global(&mut self, key: ResourceKey, command: Command) {
        if !self.snapshot.satisfied(key, &Scope::Global) && !self.global.contains(&command) {
            self.global.push(command);
        }
    }

    /// Emit once the project list has loaded and a project resolves.
    fn scoped(
        &mut self,
        project: Option<ProjectId>,
        key: ResourceKey,
        command: impl FnOnce(ProjectId) -> Command,
    ) {
        let Some(project) = project else {
            return;
        };
        if !self.snapshot.satisfied(key, &Scope::Project(project)) {
            self.scoped.push(command(project));
        }
    }

    fn fan_out(&mut self, requested: Option<ProjectId>) {
        if self.snapshot.projects.is_none() {
            return;
        }
        let keys = self.snapshot.active_projects(requested);
        if !self.snapshot.satisfied(ResourceKey::MemberTasks, &Scope::Projects(keys.clone())) {
            self.scoped.push(Command::RefreshMemberResources(keys));
        }
    }

    fn finish(mut self) -> Vec<Command> {
        self.global.append(&mut self.scoped);
        self.global
    }
}
