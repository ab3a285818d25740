//! Seeded fixture backend answering every [`FetchRequest`].

use serde::{Deserialize, Serialize};
use taskpool_core::dispatch::{FetchRequest, Reply};
use taskpool_core::error::ApiError;
use taskpool_core::model::{
    Capability, CapabilityId, InviteLink, Member, MeMetrics, OrgMetricsOverview, Project,
    ProjectId, ProjectTaskMetrics, Role, Task, TaskId, TaskStatus, TaskType, TaskTypeId, User,
    UserId, WorkSession,
};

use crate::rng::DeterministicRng;

const WORDS: [&str; 8] = [
    "deploy", "review", "migrate", "audit", "refactor", "triage", "document", "benchmark",
];
const OBJECTS: [&str; 6] = ["api", "billing", "dashboard", "importer", "search", "webhooks"];
const TYPE_NAMES: [&str; 3] = ["bug", "feature", "chore"];
const CAPABILITIES: [&str; 3] = ["frontend", "backend", "ops"];

/// Shape of the generated world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Upper bound on projects; a seed may generate none.
    pub max_projects: u64,
    pub max_tasks_per_project: u64,
    /// Percent chance that an authenticated request finds the session
    /// expired; every later request then answers 401.
    pub session_expiry_percent: u8,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_projects: 4,
            max_tasks_per_project: 5,
            session_expiry_percent: 0,
        }
    }
}

/// In-memory server state. Claims mutate it; everything else is read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureBackend {
    me: User,
    projects: Vec<Project>,
    capabilities: Vec<Capability>,
    task_types: Vec<TaskType>,
    tasks: Vec<Task>,
    members: Vec<(ProjectId, Member)>,
    invite_links: Vec<InviteLink>,
    expiry_percent: u8,
    expired: bool,
}

impl FixtureBackend {
    /// Generate a world from the seed stream.
    #[must_use]
    pub fn generate(config: WorldConfig, rng: &mut DeterministicRng) -> Self {
        let role = if rng.hit_rate_percent(50) {
            Role::Admin
        } else {
            Role::Member
        };
        let me = User {
            id: UserId(1),
            email: "me@taskpool.test".to_string(),
            role,
        };

        let capabilities = CAPABILITIES
            .iter()
            .zip(1u64..)
            .map(|(name, id)| Capability {
                id: CapabilityId(id),
                name: (*name).to_string(),
            })
            .collect::<Vec<_>>();

        let project_count = rng.next_bounded(config.max_projects.saturating_add(1));
        let mut projects = Vec::new();
        let mut task_types = Vec::new();
        let mut tasks = Vec::new();
        let mut members = Vec::new();

        for p in 1..=project_count {
            let Some(project) = ProjectId::new(p) else {
                continue;
            };
            projects.push(Project {
                id: project,
                name: format!("Project {p}"),
            });

            let type_count = rng.next_bounded(TYPE_NAMES.len() as u64) + 1;
            let types: Vec<TaskType> = (0..type_count)
                .map(|k| TaskType {
                    id: TaskTypeId(p * 10 + k),
                    project_id: project,
                    name: TYPE_NAMES
                        .get(usize::try_from(k).unwrap_or(0))
                        .copied()
                        .unwrap_or("misc")
                        .to_string(),
                    capability_id: rng
                        .pick(&capabilities)
                        .map(|capability| capability.id)
                        .filter(|_| k > 0),
                })
                .collect();

            let task_count = rng.next_bounded(config.max_tasks_per_project.saturating_add(1));
            for k in 0..task_count {
                let verb = rng.pick(&WORDS).copied().unwrap_or("fix");
                let object = rng.pick(&OBJECTS).copied().unwrap_or("thing");
                let task_type = rng.pick(&types).map_or(TaskTypeId(p * 10), |t| t.id);
                let claimed = rng.hit_rate_percent(20);
                tasks.push(Task {
                    id: TaskId(p * 100 + k),
                    project_id: project,
                    task_type_id: task_type,
                    title: format!("{verb} {object}"),
                    status: if claimed {
                        TaskStatus::Claimed
                    } else {
                        TaskStatus::Available
                    },
                    claimed_by: claimed.then_some(UserId(2)),
                });
            }
            task_types.extend(types);

            members.push((
                project,
                Member {
                    user_id: me.id,
                    email: me.email.clone(),
                    role,
                },
            ));
            if rng.hit_rate_percent(60) {
                members.push((
                    project,
                    Member {
                        user_id: UserId(2),
                        email: "teammate@taskpool.test".to_string(),
                        role: Role::Member,
                    },
                ));
            }
        }

        let invite_links = (0..rng.next_bounded(3))
            .map(|n| InviteLink {
                token: format!("inv-{n}"),
                email: format!("new{n}@taskpool.test"),
                created_at_ms: n * 1_000,
            })
            .collect();

        Self {
            me,
            projects,
            capabilities,
            task_types,
            tasks,
            members,
            invite_links,
            expiry_percent: config.session_expiry_percent,
            expired: false,
        }
    }

    #[must_use]
    pub const fn me(&self) -> &User {
        &self.me
    }

    #[must_use]
    pub fn project_ids(&self) -> Vec<ProjectId> {
        self.projects.iter().map(|project| project.id).collect()
    }

    #[must_use]
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|task| task.id).collect()
    }

    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.expired
    }

    /// Tasks of one project, in id order.
    #[must_use]
    pub fn tasks_of(&self, project: ProjectId) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| task.project_id == project)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn task_types_of(&self, project: ProjectId) -> Vec<TaskType> {
        self.task_types
            .iter()
            .filter(|task_type| task_type.project_id == project)
            .cloned()
            .collect()
    }

    /// Case-insensitive title match across every project.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<Task> {
        let needle = query.trim().to_lowercase();
        self.tasks
            .iter()
            .filter(|task| task.title.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Answer a request the moment it reaches the server.
    pub fn answer(&mut self, request: &FetchRequest, rng: &mut DeterministicRng) -> Reply {
        if !self.expired
            && *request != FetchRequest::Me
            && rng.hit_rate_percent(self.expiry_percent)
        {
            tracing::debug!(?request, "fixture session expired");
            self.expired = true;
        }
        match request {
            FetchRequest::Me => Reply::Me(self.authed().map(|()| self.me.clone())),
            FetchRequest::Projects => Reply::Projects(self.authed().map(|()| self.projects.clone())),
            FetchRequest::InviteLinks => {
                Reply::InviteLinks(self.admin_only().map(|()| self.invite_links.clone()))
            }
            FetchRequest::Capabilities => {
                Reply::Capabilities(self.authed().map(|()| self.capabilities.clone()))
            }
            FetchRequest::Members { project } => Reply::Members(self.admin_only().map(|()| {
                self.members
                    .iter()
                    .filter(|(owner, _)| owner == project)
                    .map(|(_, member)| member.clone())
                    .collect()
            })),
            FetchRequest::TaskTypes { project } => {
                Reply::TaskTypes(self.authed().map(|()| self.task_types_of(*project)))
            }
            FetchRequest::WorkSessions => Reply::WorkSessions(self.authed().map(|()| {
                self.tasks
                    .iter()
                    .filter(|task| task.claimed_by == Some(self.me.id))
                    .map(|task| WorkSession {
                        task_id: task.id,
                        started_at_ms: task.id.0 * 10,
                    })
                    .collect()
            })),
            FetchRequest::MeMetrics => Reply::MeMetrics(self.authed().map(|()| MeMetrics {
                claimed: self.count(|task| task.claimed_by == Some(self.me.id)),
                completed: 0,
                released: 0,
            })),
            FetchRequest::OrgMetricsOverview => {
                Reply::OrgMetricsOverview(self.admin_only().map(|()| OrgMetricsOverview {
                    open_tasks: self.count(|task| task.status == TaskStatus::Available),
                    claimed_tasks: self.count(|task| task.status == TaskStatus::Claimed),
                    completed_last_week: self.count(|task| task.status == TaskStatus::Done),
                }))
            }
            FetchRequest::OrgMetricsProjectTasks { project } => {
                Reply::OrgMetricsProjectTasks(self.admin_only().map(|()| {
                    let of = |status| {
                        self.count(|task| task.project_id == *project && task.status == status)
                    };
                    vec![ProjectTaskMetrics {
                        project_id: *project,
                        open_tasks: of(TaskStatus::Available),
                        claimed_tasks: of(TaskStatus::Claimed),
                        completed_tasks: of(TaskStatus::Done),
                    }]
                }))
            }
            FetchRequest::ProjectTasks { project } => Reply::ProjectTasks {
                project: *project,
                result: self.authed().map(|()| self.tasks_of(*project)),
            },
            FetchRequest::ProjectTaskTypes { project } => Reply::ProjectTaskTypes {
                project: *project,
                result: self.authed().map(|()| self.task_types_of(*project)),
            },
            FetchRequest::SearchTasks { query } => {
                Reply::SearchTasks(self.authed().map(|()| self.search(query)))
            }
            FetchRequest::ClaimTask { task } => {
                Reply::ClaimTask(self.authed().and_then(|()| self.claim(*task)))
            }
        }
    }

    fn authed(&self) -> Result<(), ApiError> {
        if self.expired {
            Err(ApiError::new(401, "session expired"))
        } else {
            Ok(())
        }
    }

    fn admin_only(&self) -> Result<(), ApiError> {
        self.authed()?;
        if self.me.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::new(403, "admin only"))
        }
    }

    fn claim(&mut self, id: TaskId) -> Result<Task, ApiError> {
        let me = self.me.id;
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| ApiError::new(404, "task not found"))?;
        if task.status != TaskStatus::Available {
            return Err(ApiError::new(409, "task already claimed"));
        }
        task.status = TaskStatus::Claimed;
        task.claimed_by = Some(me);
        Ok(task.clone())
    }

    fn count(&self, pred: impl Fn(&Task) -> bool) -> u32 {
        u32::try_from(self.tasks.iter().filter(|task| pred(task)).count()).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(seed: u64) -> (FixtureBackend, DeterministicRng) {
        let mut rng = DeterministicRng::new(seed);
        (FixtureBackend::generate(WorldConfig::default(), &mut rng), rng)
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(world(17).0, world(17).0);
    }

    #[test]
    fn tasks_are_grouped_by_project_in_id_order() {
        for seed in 0..20 {
            let (backend, _) = world(seed);
            for project in backend.project_ids() {
                let tasks = backend.tasks_of(project);
                assert!(tasks.iter().all(|task| task.project_id == project));
                assert!(tasks.windows(2).all(|pair| pair[0].id < pair[1].id));
            }
        }
    }

    #[test]
    fn search_is_case_insensitive_and_trimmed() {
        let (backend, _) = (0..50)
            .map(world)
            .find(|(backend, _)| !backend.task_ids().is_empty())
            .expect("some seed generates tasks");
        let title = backend.tasks[0].title.clone();
        let hits = backend.search(&format!("  {}  ", title.to_uppercase()));
        assert!(hits.iter().any(|task| task.id == backend.tasks[0].id));
    }

    #[test]
    fn claim_twice_conflicts() {
        let (mut backend, mut rng) = (0..50)
            .map(world)
            .find(|(backend, _)| {
                backend
                    .tasks
                    .iter()
                    .any(|task| task.status == TaskStatus::Available)
            })
            .expect("some seed generates an available task");
        let id = backend
            .tasks
            .iter()
            .find(|task| task.status == TaskStatus::Available)
            .map(|task| task.id)
            .expect("available task");

        let first = backend.answer(&FetchRequest::ClaimTask { task: id }, &mut rng);
        let Reply::ClaimTask(Ok(task)) = first else {
            panic!("expected claim to succeed, got {first:?}");
        };
        assert_eq!(task.claimed_by, Some(UserId(1)));

        let second = backend.answer(&FetchRequest::ClaimTask { task: id }, &mut rng);
        assert_eq!(second.error().map(|err| err.status), Some(409));
    }

    #[test]
    fn member_gets_forbidden_on_admin_resources() {
        let (mut backend, mut rng) = (0..50)
            .map(world)
            .find(|(backend, _)| backend.me.role == Role::Member)
            .expect("some seed generates a member");
        let reply = backend.answer(&FetchRequest::InviteLinks, &mut rng);
        assert_eq!(reply.error().map(|err| err.status), Some(403));
    }

    #[test]
    fn expiry_answers_401_from_then_on() {
        let mut rng = DeterministicRng::new(3);
        let config = WorldConfig {
            session_expiry_percent: 100,
            ..WorldConfig::default()
        };
        let mut backend = FixtureBackend::generate(config, &mut rng);
        let reply = backend.answer(&FetchRequest::Projects, &mut rng);
        assert_eq!(reply.error().map(|err| err.status), Some(401));
        assert!(backend.is_expired());
        let me = backend.answer(&FetchRequest::Me, &mut rng);
        assert_eq!(me.error().map(|err| err.status), Some(401));
    }
}
