//! Messages in, effects out.

use crate::Millis;
use crate::error::ApiError;
use crate::gesture::{DragEvent, DragSession};
use crate::model::{
    Capability, InviteLink, Member, MeMetrics, OrgMetricsOverview, Project, ProjectId,
    ProjectTaskMetrics, Task, TaskId, TaskType, User, WorkSession,
};
use crate::route::{Location, Route};
use crate::staleness::Token;
use crate::toast::ToastId;
use serde::{Deserialize, Serialize};

/// Everything the dispatcher reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "kebab-case")]
pub enum Msg {
    /// Browser location changed (initial load, back/forward).
    UrlChanged { location: Location },
    /// In-app navigation; pushes a history entry.
    Navigate { route: Route },
    SelectProject { project: ProjectId },
    /// A fetch completed.
    Response { token: Token, reply: Reply },
    SearchInput { text: String },
    /// The debounce timer for `token` fired.
    SearchDebounced { token: Token },
    Drag { event: DragEvent },
    ToastTick,
    DismissToast { id: ToastId },
    OpenDialog { dialog: Dialog },
    CloseDialog,
    /// Reload everything the current page shows.
    Refresh,
}

/// Modal dialogs; page-local state cleared on session reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dialog", rename_all = "kebab-case")]
pub enum Dialog {
    CreateProject,
    CreateCapability,
    CreateTaskType { project: ProjectId },
    CreateTask { project: ProjectId },
    InviteMember,
    ReleaseTask { task: TaskId },
}

/// One external fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "fetch", rename_all = "kebab-case")]
pub enum FetchRequest {
    Me,
    Projects,
    InviteLinks,
    Capabilities,
    Members { project: ProjectId },
    TaskTypes { project: ProjectId },
    WorkSessions,
    MeMetrics,
    OrgMetricsOverview,
    OrgMetricsProjectTasks { project: ProjectId },
    ProjectTasks { project: ProjectId },
    ProjectTaskTypes { project: ProjectId },
    SearchTasks { query: String },
    ClaimTask { task: TaskId },
}

/// Typed result of a [`FetchRequest`], one variant per request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", content = "result", rename_all = "kebab-case")]
pub enum Reply {
    Me(Result<User, ApiError>),
    Projects(Result<Vec<Project>, ApiError>),
    InviteLinks(Result<Vec<InviteLink>, ApiError>),
    Capabilities(Result<Vec<Capability>, ApiError>),
    Members(Result<Vec<Member>, ApiError>),
    TaskTypes(Result<Vec<TaskType>, ApiError>),
    WorkSessions(Result<Vec<WorkSession>, ApiError>),
    MeMetrics(Result<MeMetrics, ApiError>),
    OrgMetricsOverview(Result<OrgMetricsOverview, ApiError>),
    OrgMetricsProjectTasks(Result<Vec<ProjectTaskMetrics>, ApiError>),
    ProjectTasks {
        project: ProjectId,
        result: Result<Vec<Task>, ApiError>,
    },
    ProjectTaskTypes {
        project: ProjectId,
        result: Result<Vec<TaskType>, ApiError>,
    },
    SearchTasks(Result<Vec<Task>, ApiError>),
    ClaimTask(Result<Task, ApiError>),
}

impl Reply {
    /// The error carried by a failed reply.
    #[must_use]
    pub const fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Me(Err(err))
            | Self::Projects(Err(err))
            | Self::InviteLinks(Err(err))
            | Self::Capabilities(Err(err))
            | Self::Members(Err(err))
            | Self::TaskTypes(Err(err))
            | Self::WorkSessions(Err(err))
            | Self::MeMetrics(Err(err))
            | Self::OrgMetricsOverview(Err(err))
            | Self::OrgMetricsProjectTasks(Err(err))
            | Self::ProjectTasks { result: Err(err), .. }
            | Self::ProjectTaskTypes { result: Err(err), .. }
            | Self::SearchTasks(Err(err))
            | Self::ClaimTask(Err(err)) => Some(err),
            _ => None,
        }
    }
}

/// Requests to the host: network, history, document and timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "kebab-case")]
pub enum Effect {
    Fetch { request: FetchRequest, token: Token },
    PushUrl { url: String },
    ReplaceUrl { url: String },
    SetTitle { title: String },
    ScheduleDebounce { token: Token, delay_ms: Millis },
    ScheduleToastTick { delay_ms: Millis },
    MeasureDropTarget { session: DragSession },
}

impl Effect {
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}
