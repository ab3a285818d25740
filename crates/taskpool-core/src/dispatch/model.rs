//! The application model, split into independently owned partitions.

use super::msg::Dialog;
use crate::config::{AppConfig, Locale, Theme};
use crate::error::ApiError;
use crate::gesture::DragMachine;
use crate::join::FanInJoin;
use crate::model::{
    Capability, InviteLink, Member, MeMetrics, OrgMetricsOverview, Project, ProjectId,
    ProjectTaskMetrics, Task, TaskId, TaskType, User, WorkSession,
};
use crate::resource::Slot;
use crate::route::Route;
use crate::staleness::{Generations, Token};
use crate::toast::Toasts;
use std::collections::BTreeMap;

/// Session and data shared by every page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoreState {
    pub me: Slot<User>,
    pub projects: Slot<Vec<Project>>,
    pub capabilities: Slot<Vec<Capability>>,
    pub selected_project: Option<ProjectId>,
}

/// Admin pages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminState {
    pub invite_links: Slot<Vec<InviteLink>>,
    pub members: Slot<Vec<Member>>,
    pub task_types: Slot<Vec<TaskType>>,
    pub org_overview: Slot<OrgMetricsOverview>,
    pub project_task_metrics: Slot<Vec<ProjectTaskMetrics>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchState {
    pub query: String,
    pub results: Slot<Vec<Task>>,
}

/// Member pages: the pool fan-out, work sessions and search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberState {
    pub tasks: Slot<Vec<Task>>,
    pub task_types: Slot<Vec<TaskType>>,
    pub tasks_join: Option<FanInJoin<ProjectId, Task>>,
    pub task_types_join: Option<FanInJoin<ProjectId, TaskType>>,
    pub work_sessions: Slot<Vec<WorkSession>>,
    pub me_metrics: Slot<MeMetrics>,
    pub search: SearchState,
    /// Claim attempts awaiting a reply.
    pub claims: BTreeMap<TaskId, Token>,
}

/// Page-local presentation state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UiState {
    pub toasts: Toasts,
    pub drag: DragMachine,
    pub dialog: Option<Dialog>,
    pub theme: Theme,
    pub locale: Locale,
}

impl UiState {
    /// Drop everything transient, keeping preferences. The drag session
    /// counter and the toast tick survive so late measurements and ticks
    /// addressed to the old state stay recognizable.
    #[must_use]
    pub fn cleared(self) -> Self {
        Self {
            toasts: self.toasts.cleared(),
            drag: self.drag.cancelled(),
            dialog: None,
            theme: self.theme,
            locale: self.locale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Model {
    pub route: Route,
    pub config: AppConfig,
    pub generations: Generations,
    pub core: CoreState,
    pub admin: AdminState,
    pub member: MemberState,
    pub ui: UiState,
}

impl Model {
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let ui = UiState {
            theme: config.theme,
            locale: config.locale,
            ..UiState::default()
        };
        Self {
            config,
            ui,
            ..Self::default()
        }
    }

    /// Session expired: forget every loaded resource and all page-local
    /// state. Streams are superseded so nothing in flight can land.
    #[must_use]
    pub fn reset_session(self, cause: ApiError) -> Self {
        let mut generations = self.generations;
        generations.supersede_all();
        Self {
            route: Route::Login,
            config: self.config,
            generations,
            core: CoreState {
                me: Slot::default().fail(cause),
                ..CoreState::default()
            },
            admin: AdminState::default(),
            member: MemberState::default(),
            ui: self.ui.cleared(),
        }
    }

    /// Loaded user, if the session is established.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.core.me.resource.loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::{DragEvent, DragOutput, Point};
    use crate::resource::Resource;
    use crate::staleness::Stream;
    use crate::toast::ToastLevel;

    #[test]
    fn new_copies_preferences_into_ui() {
        let config = AppConfig {
            theme: Theme::Dark,
            locale: Locale::De,
            ..AppConfig::default()
        };
        let model = Model::new(config);
        assert_eq!(model.ui.theme, Theme::Dark);
        assert_eq!(model.ui.locale, Locale::De);
    }

    #[test]
    fn reset_clears_transient_state_and_supersedes_streams() {
        let mut model = Model::new(AppConfig::default());
        let token = model.generations.next(Stream::Projects);
        model.core.projects = model.core.projects.begin(crate::resource::Scope::Global, token);
        model.ui.dialog = Some(Dialog::CreateProject);
        let (toasts, _, _) = model.ui.toasts.show(ToastLevel::Info, "hi", 0, 1000, 250);
        model.ui.toasts = toasts;
        model.ui.theme = Theme::Light;

        let reset = model.reset_session(ApiError::new(401, "expired"));
        assert_eq!(reset.route, Route::Login);
        assert!(!reset.generations.is_current(&token));
        assert_eq!(reset.core.projects.resource, Resource::NotAsked);
        assert!(matches!(reset.core.me.resource, Resource::Failed(_)));
        assert_eq!(reset.ui.dialog, None);
        assert!(reset.ui.toasts.items().is_empty());
        assert_eq!(reset.ui.theme, Theme::Light);
    }

    #[test]
    fn reset_keeps_drag_session_counter() {
        let mut model = Model::new(AppConfig::default());
        let (drag, output) = model.ui.drag.handle(DragEvent::PointerDown {
            task: TaskId(1),
            at: Point { x: 0, y: 0 },
        });
        let Some(DragOutput::Measure(before)) = output else {
            panic!("expected measurement request");
        };
        model.ui.drag = drag;

        let reset = model.reset_session(ApiError::new(401, "expired"));
        assert!(reset.ui.drag.is_idle());
        let (_, output) = reset.ui.drag.handle(DragEvent::PointerDown {
            task: TaskId(2),
            at: Point { x: 0, y: 0 },
        });
        let Some(DragOutput::Measure(after)) = output else {
            panic!("expected measurement request");
        };
        assert_ne!(before, after);
    }

    #[test]
    fn reset_keeps_pending_toast_tick() {
        let mut model = Model::new(AppConfig::default());
        let (toasts, _, tick) = model.ui.toasts.show(ToastLevel::Error, "boom", 0, 1000, 250);
        assert!(tick.is_some());
        model.ui.toasts = toasts;

        let reset = model.reset_session(ApiError::new(401, "expired"));
        assert!(reset.ui.toasts.items().is_empty());
        let (_, _, tick) = reset.ui.toasts.show(ToastLevel::Info, "again", 10, 1000, 250);
        assert_eq!(tick, None, "the host still owes the earlier tick");
    }
}
