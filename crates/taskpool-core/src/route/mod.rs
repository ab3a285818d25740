//! Typed routes: where the user is, independent of any loaded data.
//!
//! [`codec`] turns locations into routes and back; [`slug`] holds the
//! section tables the codec reads.

pub mod codec;
pub mod slug;

use crate::model::{ProjectId, Role};
use serde::{Deserialize, Serialize};

pub use codec::{Location, ParseResult, format, parse};
pub use slug::Section;

/// Admin pages scoped to one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigSection {
    Members,
    Capabilities,
    TaskTypes,
    Metrics,
}

/// Organisation-wide admin pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrgSection {
    Invites,
    Projects,
    Metrics,
}

/// Pages available to every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberSection {
    Pool,
    MyBar,
    Skills,
    Metrics,
}

/// Presentation of the member task pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Pool,
    List,
    Cards,
}

/// A navigational key. Carries no loaded data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "kebab-case")]
pub enum Route {
    #[default]
    Login,
    AcceptInvite {
        token: String,
    },
    ResetPassword {
        token: String,
    },
    Config {
        section: ConfigSection,
        project: Option<ProjectId>,
    },
    Org {
        section: OrgSection,
    },
    Member {
        section: MemberSection,
        project: Option<ProjectId>,
        view: Option<ViewMode>,
    },
}

impl Route {
    /// Where an authenticated user lands when their route is not allowed.
    #[must_use]
    pub const fn landing(role: Role) -> Self {
        match role {
            Role::Admin => Self::Config {
                section: ConfigSection::Members,
                project: None,
            },
            Role::Member => Self::Member {
                section: MemberSection::Pool,
                project: None,
                view: None,
            },
        }
    }

    /// Public routes never require an authenticated session.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(
            self,
            Self::Login | Self::AcceptInvite { .. } | Self::ResetPassword { .. }
        )
    }

    /// Section access rule: config and org pages are admin-only.
    #[must_use]
    pub const fn allows(&self, role: Role) -> bool {
        match self {
            Self::Config { .. } | Self::Org { .. } => matches!(role, Role::Admin),
            Self::Member { .. }
            | Self::Login
            | Self::AcceptInvite { .. }
            | Self::ResetPassword { .. } => true,
        }
    }

    /// Project carried in the URL, if any.
    #[must_use]
    pub const fn project(&self) -> Option<ProjectId> {
        match self {
            Self::Config { project, .. } | Self::Member { project, .. } => *project,
            _ => None,
        }
    }

    /// Same route with a different project; routes without a project slot
    /// are returned unchanged.
    #[must_use]
    pub fn with_project(self, project: Option<ProjectId>) -> Self {
        match self {
            Self::Config { section, .. } => Self::Config { section, project },
            Self::Member { section, view, .. } => Self::Member {
                section,
                project,
                view,
            },
            other => other,
        }
    }

    /// The route's default section, keeping its kind, with `project`.
    #[must_use]
    pub fn default_section(&self, project: Option<ProjectId>) -> Self {
        match self {
            Self::Config { .. } => Self::Config {
                section: ConfigSection::DEFAULT,
                project,
            },
            Self::Member { view, .. } => Self::Member {
                section: MemberSection::DEFAULT,
                project,
                view: *view,
            },
            other => other.clone(),
        }
    }

    /// Document title written on every route change.
    #[must_use]
    pub fn title(&self) -> String {
        let page = match self {
            Self::Login => "Sign in",
            Self::AcceptInvite { .. } => "Accept invite",
            Self::ResetPassword { .. } => "Reset password",
            Self::Config { section, .. } => match section {
                ConfigSection::Members => "Members",
                ConfigSection::Capabilities => "Capabilities",
                ConfigSection::TaskTypes => "Task types",
                ConfigSection::Metrics => "Project metrics",
            },
            Self::Org { section } => match section {
                OrgSection::Invites => "Invites",
                OrgSection::Projects => "Projects",
                OrgSection::Metrics => "Organisation metrics",
            },
            Self::Member { section, .. } => match section {
                MemberSection::Pool => "Pool",
                MemberSection::MyBar => "My bar",
                MemberSection::Skills => "Skills",
                MemberSection::Metrics => "My metrics",
            },
        };
        format!("{page} · taskpool")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pid;

    #[test]
    fn landing_depends_on_role() {
        assert!(matches!(Route::landing(Role::Admin), Route::Config { .. }));
        assert!(matches!(Route::landing(Role::Member), Route::Member { .. }));
    }

    #[test]
    fn admin_sections_reject_members() {
        let config = Route::Config {
            section: ConfigSection::Members,
            project: None,
        };
        assert!(config.allows(Role::Admin));
        assert!(!config.allows(Role::Member));
        assert!(!Route::Org { section: OrgSection::Invites }.allows(Role::Member));
        assert!(Route::landing(Role::Member).allows(Role::Member));
    }

    #[test]
    fn public_and_member_routes_allow_every_role() {
        assert_eq!(Route::default(), Route::Login);
        for role in [Role::Admin, Role::Member] {
            assert!(Route::Login.allows(role));
            assert!(Route::ResetPassword {
                token: "t".to_string()
            }
            .allows(role));
            assert!(Route::landing(Role::Member).allows(role));
        }
    }

    #[test]
    fn with_project_ignores_routes_without_project() {
        let org = Route::Org {
            section: OrgSection::Projects,
        };
        assert_eq!(org.clone().with_project(Some(pid(2))), org);

        let member = Route::Member {
            section: MemberSection::MyBar,
            project: None,
            view: Some(ViewMode::Cards),
        };
        assert_eq!(
            member.with_project(Some(pid(2))).project(),
            Some(pid(2))
        );
    }

    #[test]
    fn default_section_keeps_route_kind() {
        let route = Route::Config {
            section: ConfigSection::Metrics,
            project: Some(pid(99)),
        };
        assert_eq!(
            route.default_section(Some(pid(1))),
            Route::Config {
                section: ConfigSection::Members,
                project: Some(pid(1)),
            }
        );
    }

    #[test]
    fn titles_name_the_page() {
        assert_eq!(Route::Login.title(), "Sign in · taskpool");
    }
}
