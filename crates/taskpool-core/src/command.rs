//! Planner output: data-only intents, executed by the dispatcher.

use crate::model::ProjectId;
use crate::route::Route;
use crate::snapshot::ResourceKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "arg", rename_all = "kebab-case")]
pub enum Command {
    FetchMe,
    FetchProjects,
    FetchInviteLinks,
    FetchCapabilities,
    FetchMembers(ProjectId),
    FetchTaskTypes(ProjectId),
    FetchWorkSessions,
    FetchMeMetrics,
    FetchOrgMetricsOverview,
    FetchOrgMetricsProjectTasks(ProjectId),
    /// Fan-out of per-project task and task type fetches over the given
    /// active key set, in issue order.
    RefreshMemberResources(Vec<ProjectId>),
    Redirect(Route),
}

impl Command {
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect(_))
    }

    /// The snapshot entry this command loads, if it is a fetch.
    #[must_use]
    pub const fn resource(&self) -> Option<ResourceKey> {
        Some(match self {
            Self::FetchMe => ResourceKey::Me,
            Self::FetchProjects => ResourceKey::Projects,
            Self::FetchInviteLinks => ResourceKey::InviteLinks,
            Self::FetchCapabilities => ResourceKey::Capabilities,
            Self::FetchMembers(_) => ResourceKey::Members,
            Self::FetchTaskTypes(_) => ResourceKey::TaskTypes,
            Self::FetchWorkSessions => ResourceKey::WorkSessions,
            Self::FetchMeMetrics => ResourceKey::MeMetrics,
            Self::FetchOrgMetricsOverview => ResourceKey::OrgMetricsOverview,
            Self::FetchOrgMetricsProjectTasks(_) => ResourceKey::OrgMetricsProjectTasks,
            Self::RefreshMemberResources(_) => ResourceKey::MemberTasks,
            Self::Redirect(_) => return None,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchMembers(p) => write!(f, "FetchMembers({p})"),
            Self::FetchTaskTypes(p) => write!(f, "FetchTaskTypes({p})"),
            Self::FetchOrgMetricsProjectTasks(p) => write!(f, "FetchOrgMetricsProjectTasks({p})"),
            Self::RefreshMemberResources(keys) => {
                let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
                write!(f, "RefreshMemberResources([{}])", keys.join(", "))
            }
            Self::Redirect(route) => write!(f, "Redirect({})", crate::route::format(route)),
            other => write!(f, "{other:?}"),
        }
    }
}
