//! Read-only projection of the model consumed by the planner.
//!
//! A snapshot is rebuilt from scratch on every planning pass and never
//! mutated afterwards. It holds coarse states and scope keys only, so the
//! planner cannot depend on payloads.

use crate::dispatch::Model;
use crate::model::{ProjectId, Role};
use crate::resource::{CoarseState, Resource, Scope, Slot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "auth", content = "role", rename_all = "kebab-case")]
pub enum AuthState {
    /// Session not yet established either way.
    #[default]
    Unknown,
    Unauthed,
    Authed(Role),
}

/// Page-relevant resource fields, by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKey {
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
    /// Aggregate of the member fan-out (tasks and task types share a key
    /// set and a token).
    MemberTasks,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceView {
    pub state: CoarseState,
    #[serde(default)]
    pub scope: Scope,
}

impl ResourceView {
    fn of<T>(slot: &Slot<T>) -> Self {
        Self {
            state: slot.resource.coarse(),
            scope: slot.scope.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub auth: AuthState,
    /// Ids of the loaded project list; `None` until it has loaded.
    #[serde(default)]
    pub projects: Option<Vec<ProjectId>>,
    #[serde(default)]
    pub selected_project: Option<ProjectId>,
    #[serde(default)]
    pub resources: BTreeMap<ResourceKey, ResourceView>,
}

impl Snapshot {
    /// Project the model.
    #[must_use]
    pub fn of(model: &Model) -> Self {
        let core = &model.core;
        let auth = match &core.me.resource {
            Resource::NotAsked | Resource::Loading => AuthState::Unknown,
            Resource::Loaded(user) => AuthState::Authed(user.role),
            Resource::Failed(_) => AuthState::Unauthed,
        };
        let projects = core
            .projects
            .resource
            .loaded()
            .map(|list| list.iter().map(|project| project.id).collect());

        let resources = [
            (ResourceKey::Me, ResourceView::of(&core.me)),
            (ResourceKey::Projects, ResourceView::of(&core.projects)),
            (ResourceKey::Capabilities, ResourceView::of(&core.capabilities)),
            (ResourceKey::InviteLinks, ResourceView::of(&model.admin.invite_links)),
            (ResourceKey::Members, ResourceView::of(&model.admin.members)),
            (ResourceKey::TaskTypes, ResourceView::of(&model.admin.task_types)),
            (
                ResourceKey::OrgMetricsOverview,
                ResourceView::of(&model.admin.org_overview),
            ),
            (
                ResourceKey::OrgMetricsProjectTasks,
                ResourceView::of(&model.admin.project_task_metrics),
            ),
            (ResourceKey::WorkSessions, ResourceView::of(&model.member.work_sessions)),
            (ResourceKey::MeMetrics, ResourceView::of(&model.member.me_metrics)),
            (ResourceKey::MemberTasks, ResourceView::of(&model.member.tasks)),
        ]
        .into_iter()
        .collect();

        Self {
            auth,
            projects,
            selected_project: core.selected_project,
            resources,
        }
    }

    /// Coarse state and scope for `key`; absent entries read as not asked.
    #[must_use]
    pub fn view(&self, key: ResourceKey) -> ResourceView {
        self.resources.get(&key).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn state(&self, key: ResourceKey) -> CoarseState {
        self.resources
            .get(&key)
            .map_or(CoarseState::NotAsked, |view| view.state)
    }

    /// True when a fetch of `key` for `scope` would duplicate work already
    /// done or in flight.
    #[must_use]
    pub fn satisfied(&self, key: ResourceKey, scope: &Scope) -> bool {
        let view = self.view(key);
        matches!(view.state, CoarseState::Loading | CoarseState::Loaded) && view.scope == *scope
    }

    /// The project a single-project page should use: the requested one,
    /// else the selection, else the first loaded project.
    #[must_use]
    pub fn resolve_project(&self, requested: Option<ProjectId>) -> Option<ProjectId> {
        let projects = self.projects.as_deref()?;
        requested
            .or(self.selected_project)
            .filter(|project| projects.contains(project))
            .or_else(|| projects.first().copied())
    }

    /// Key set for the member fan-out.
    #[must_use]
    pub fn active_projects(&self, requested: Option<ProjectId>) -> Vec<ProjectId> {
        let Some(projects) = self.projects.as_deref() else {
            return Vec::new();
        };
        match requested {
            Some(project) if projects.contains(&project) => vec![project],
            _ => projects.to_vec(),
        }
    }

    #[must_use]
    pub fn has_project(&self, project: ProjectId) -> bool {
        self.projects
            .as_deref()
            .is_some_and(|projects| projects.contains(&project))
    }

    /// Same snapshot with every loaded payload except the session marked
    /// as not asked. Used by an explicit refresh.
    #[must_use]
    pub fn forget_loaded(mut self) -> Self {
        for (key, view) in &mut self.resources {
            if *key != ResourceKey::Me && view.state == CoarseState::Loaded {
                view.state = CoarseState::NotAsked;
            }
        }
        self
    }

    /// Builder-style setter, mostly for tests and scripted snapshots.
    #[must_use]
    pub fn with(mut self, key: ResourceKey, state: CoarseState, scope: Scope) -> Self {
        self.resources.insert(key, ResourceView { state, scope });
        self
    }
}
