use taskpool_core::dispatch::Model;
use taskpool_core::model::{ProjectId, TaskId};
use taskpool_core::plan;
use taskpool_core::resource::{Scope, Slot};
use taskpool_core::route::{self, Location, ParseResult};
use taskpool_core::snapshot::Snapshot;

use crate::SimulationResult;
use crate::backend::FixtureBackend;

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    pub passed: bool,
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Failures accumulate.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Violations ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A loaded fan-out is not the key-ordered union of its branches.
    FanIn {
        resource: &'static str,
        keys: Vec<ProjectId>,
        /// Ids the backend holds for `keys`, in key order.
        expected: Vec<u64>,
        actual: Vec<u64>,
    },

    /// Loaded search results belong to some query other than the latest.
    Search {
        query: String,
        expected: Vec<TaskId>,
        actual: Vec<TaskId>,
    },

    /// Replies or timers still outstanding after the drain.
    NotQuiescent {
        pending_replies: usize,
        pending_timers: usize,
    },

    /// Planning the settled model still asks for work.
    Unsettled { route: String, commands: Vec<String> },

    /// A slot, join or claim is still waiting for a reply.
    StillLoading { what: String },

    /// The address bar does not parse to the model's route.
    AddressBar { url: String, route: String },
}

// ── Oracle ───────────────────────────────────────────────────────────────────

/// Invariants a drained run must satisfy.
///
/// 1. **Quiescence**: nothing in flight once the drain stops.
/// 2. **Settled plan**: `plan(route, snapshot)` is empty.
/// 3. **Idle slots**: no resource is loading, no join or claim is open.
/// 4. **Fan-in**: loaded member tasks and task types equal the backend's
///    per-project lists concatenated in key order.
/// 5. **Latest search wins**: loaded results match the current query.
/// 6. **Address bar**: the URL parses to exactly the model's route.
pub struct Oracle;

impl Oracle {
    #[must_use]
    pub fn check_all(result: &SimulationResult) -> OracleResult {
        Self::check_quiescent(result)
            .merge(Self::check_settled(&result.model))
            .merge(Self::check_idle(&result.model))
            .merge(Self::check_fan_in(&result.model, &result.backend))
            .merge(Self::check_search(&result.model, &result.backend))
            .merge(Self::check_address_bar(&result.url, &result.model))
    }

    #[must_use]
    pub fn check_quiescent(result: &SimulationResult) -> OracleResult {
        if result.pending_replies == 0 && result.pending_timers == 0 {
            return OracleResult::pass();
        }
        OracleResult::from_violations(vec![InvariantViolation::NotQuiescent {
            pending_replies: result.pending_replies,
            pending_timers: result.pending_timers,
        }])
    }

    #[must_use]
    pub fn check_settled(model: &Model) -> OracleResult {
        let commands = plan(&model.route, &Snapshot::of(model));
        if commands.is_empty() {
            return OracleResult::pass();
        }
        OracleResult::from_violations(vec![InvariantViolation::Unsettled {
            route: route::format(&model.route),
            commands: commands.iter().map(ToString::to_string).collect(),
        }])
    }

    #[must_use]
    pub fn check_idle(model: &Model) -> OracleResult {
        let mut loading = Vec::new();
        let mut note = |what: &str, busy: bool| {
            if busy {
                loading.push(InvariantViolation::StillLoading {
                    what: what.to_string(),
                });
            }
        };
        note("me", busy(&model.core.me));
        note("projects", busy(&model.core.projects));
        note("capabilities", busy(&model.core.capabilities));
        note("invite-links", busy(&model.admin.invite_links));
        note("members", busy(&model.admin.members));
        note("task-types", busy(&model.admin.task_types));
        note("org-metrics-overview", busy(&model.admin.org_overview));
        note("org-metrics-project-tasks", busy(&model.admin.project_task_metrics));
        note("member-tasks", busy(&model.member.tasks));
        note("member-task-types", busy(&model.member.task_types));
        note("work-sessions", busy(&model.member.work_sessions));
        note("me-metrics", busy(&model.member.me_metrics));
        note("search-results", busy(&model.member.search.results));
        note("tasks-join", model.member.tasks_join.is_some());
        note("task-types-join", model.member.task_types_join.is_some());
        note("claims", !model.member.claims.is_empty());
        OracleResult::from_violations(loading)
    }

    #[must_use]
    pub fn check_fan_in(model: &Model, backend: &FixtureBackend) -> OracleResult {
        let mut violations = Vec::new();

        if let (Some(tasks), Scope::Projects(keys)) =
            (model.member.tasks.resource.loaded(), &model.member.tasks.scope)
        {
            let expected = keys
                .iter()
                .flat_map(|key| backend.tasks_of(*key))
                .map(|task| task.id.0)
                .collect::<Vec<_>>();
            let actual = tasks.iter().map(|task| task.id.0).collect::<Vec<_>>();
            if expected != actual {
                violations.push(InvariantViolation::FanIn {
                    resource: "member-tasks",
                    keys: keys.clone(),
                    expected,
                    actual,
                });
            }
        }

        if let (Some(types), Scope::Projects(keys)) = (
            model.member.task_types.resource.loaded(),
            &model.member.task_types.scope,
        ) {
            let expected = keys
                .iter()
                .flat_map(|key| backend.task_types_of(*key))
                .map(|task_type| task_type.id.0)
                .collect::<Vec<_>>();
            let actual = types.iter().map(|task_type| task_type.id.0).collect::<Vec<_>>();
            if expected != actual {
                violations.push(InvariantViolation::FanIn {
                    resource: "member-task-types",
                    keys: keys.clone(),
                    expected,
                    actual,
                });
            }
        }

        OracleResult::from_violations(violations)
    }

    /// Compared by id: a claim after the search may change a status.
    #[must_use]
    pub fn check_search(model: &Model, backend: &FixtureBackend) -> OracleResult {
        let search = &model.member.search;
        let Some(results) = search.results.resource.loaded() else {
            return OracleResult::pass();
        };
        let query = search.query.trim();
        let expected: Vec<TaskId> = if query.is_empty() {
            Vec::new()
        } else {
            backend.search(query).iter().map(|task| task.id).collect()
        };
        let actual: Vec<TaskId> = results.iter().map(|task| task.id).collect();
        if expected == actual {
            return OracleResult::pass();
        }
        OracleResult::from_violations(vec![InvariantViolation::Search {
            query: search.query.clone(),
            expected,
            actual,
        }])
    }

    #[must_use]
    pub fn check_address_bar(url: &str, model: &Model) -> OracleResult {
        if route::parse(&Location::parse_url(url)) == ParseResult::Parsed(model.route.clone()) {
            return OracleResult::pass();
        }
        OracleResult::from_violations(vec![InvariantViolation::AddressBar {
            url: url.to_string(),
            route: route::format(&model.route),
        }])
    }
}

const fn busy<T>(slot: &Slot<T>) -> bool {
    slot.resource.is_loading()
}
