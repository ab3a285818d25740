//! End-to-end dispatcher scenarios: boot on a URL, answer fetches in a
//! chosen order, and check the model after each step.

use taskpool_core::command::Command;
use taskpool_core::config::AppConfig;
use taskpool_core::dispatch::{self, Effect, FetchRequest, Model, Msg, Reply};
use taskpool_core::error::ApiError;
use taskpool_core::gesture::{DragEvent, DragSession, DragState, Point, Rect};
use taskpool_core::model::{
    Member, Project, ProjectId, Role, Task, TaskId, TaskStatus, TaskTypeId, User, UserId,
};
use taskpool_core::resource::{Resource, Scope};
use taskpool_core::route::{ConfigSection, Location, MemberSection, OrgSection, Route};
use taskpool_core::snapshot::Snapshot;
use taskpool_core::staleness::Token;
use taskpool_core::toast::ToastLevel;

struct Harness {
    model: Model,
    pending: Vec<(FetchRequest, Token)>,
    effects: Vec<Effect>,
    now: u64,
}

impl Harness {
    fn boot(url: &str) -> Self {
        Self::boot_with(AppConfig::default(), url)
    }

    fn boot_with(config: AppConfig, url: &str) -> Self {
        let (model, effects) = dispatch::init(Model::new(config), &Location::parse_url(url));
        let mut harness = Self {
            model,
            pending: Vec::new(),
            effects: Vec::new(),
            now: 0,
        };
        harness.absorb(effects);
        harness
    }

    fn absorb(&mut self, effects: Vec<Effect>) {
        for effect in &effects {
            if let Effect::Fetch { request, token } = effect {
                self.pending.push((request.clone(), *token));
            }
        }
        self.effects = effects;
    }

    fn send(&mut self, msg: Msg) {
        self.now += 10;
        let model = std::mem::take(&mut self.model);
        let (model, effects) = dispatch::update(model, msg, self.now);
        self.model = model;
        self.absorb(effects);
    }

    /// Remove the pending fetch for `request` and answer it.
    fn answer(&mut self, request: &FetchRequest, reply: Reply) {
        let index = self
            .pending
            .iter()
            .position(|(r, _)| r == request)
            .unwrap_or_else(|| panic!("no pending {request:?} in {:?}", self.pending));
        let (_, token) = self.pending.remove(index);
        self.send(Msg::Response { token, reply });
    }

    fn token_for(&self, request: &FetchRequest) -> Token {
        self.pending
            .iter()
            .find(|(r, _)| r == request)
            .map(|(_, token)| *token)
            .unwrap_or_else(|| panic!("no pending {request:?}"))
    }

    /// Answer with the token of a fetch still pending, even if superseded.
    fn answer_token(&mut self, token: Token, reply: Reply) {
        self.pending.retain(|(_, pending)| *pending != token);
        self.send(Msg::Response { token, reply });
    }

    fn issued(&self) -> Vec<FetchRequest> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Fetch { request, .. } => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn sign_in(&mut self, role: Role) {
        self.answer(
            &FetchRequest::Me,
            Reply::Me(Ok(User {
                id: UserId(1),
                email: "sam@example.com".to_string(),
                role,
            })),
        );
    }

    fn load_projects(&mut self, ids: &[u64]) {
        let projects = ids
            .iter()
            .map(|id| Project {
                id: pid(*id),
                name: format!("project {id}"),
            })
            .collect();
        self.answer(&FetchRequest::Projects, Reply::Projects(Ok(projects)));
    }
}

fn pid(raw: u64) -> ProjectId {
    ProjectId::new(raw).expect("project ids are positive")
}

fn member(id: u64) -> Member {
    Member {
        user_id: UserId(id),
        email: format!("user{id}@example.com"),
        role: Role::Member,
    }
}

/// Press on `task` and report the drag session the measurement belongs to.
fn press(h: &mut Harness, task: u64) -> DragSession {
    h.send(Msg::Drag {
        event: DragEvent::PointerDown {
            task: TaskId(task),
            at: Point { x: 5, y: 5 },
        },
    });
    let Some(Effect::MeasureDropTarget { session }) = h.effects.first().cloned() else {
        panic!("expected measurement request");
    };
    session
}

fn task(id: u64, project: u64) -> Task {
    Task {
        id: TaskId(id),
        project_id: pid(project),
        task_type_id: TaskTypeId(1),
        title: format!("task {id}"),
        status: TaskStatus::Available,
        claimed_by: None,
    }
}

#[test]
fn project_list_resolves_before_project_scoped_fetch() {
    let mut h = Harness::boot("/config/members?project=3");
    h.sign_in(Role::Admin);
    assert_eq!(h.issued(), vec![FetchRequest::Projects]);

    let snapshot = Snapshot::of(&h.model);
    assert_eq!(
        taskpool_core::plan(&h.model.route, &snapshot),
        Vec::<Command>::new(),
        "projects in flight, nothing else to plan"
    );

    h.load_projects(&[1, 3]);
    assert_eq!(
        h.issued(),
        vec![FetchRequest::Members {
            project: pid(3)
        }]
    );
}

#[test]
fn unknown_project_redirects_to_first_project() {
    let mut h = Harness::boot("/config/members?project=99");
    h.sign_in(Role::Admin);
    h.load_projects(&[4, 5]);

    assert_eq!(
        h.model.route,
        Route::Config {
            section: ConfigSection::Members,
            project: Some(pid(4)),
        }
    );
    assert!(h.effects.contains(&Effect::ReplaceUrl {
        url: "/config/members?project=4".to_string()
    }));
    assert_eq!(
        h.issued(),
        vec![FetchRequest::Members {
            project: pid(4)
        }]
    );
}

#[test]
fn fan_in_waits_for_every_branch_and_orders_by_key() {
    let mut h = Harness::boot("/app/pool");
    h.sign_in(Role::Member);
    h.load_projects(&[1, 2]);
    assert!(h.model.member.tasks.resource.is_loading());

    for project in [1, 2] {
        h.answer(
            &FetchRequest::ProjectTaskTypes {
                project: pid(project),
            },
            Reply::ProjectTaskTypes {
                project: pid(project),
                result: Ok(Vec::new()),
            },
        );
    }

    h.answer(
        &FetchRequest::ProjectTasks {
            project: pid(2),
        },
        Reply::ProjectTasks {
            project: pid(2),
            result: Ok(vec![task(20, 2), task(21, 2)]),
        },
    );
    assert!(h.model.member.tasks.resource.is_loading());

    h.answer(
        &FetchRequest::ProjectTasks {
            project: pid(1),
        },
        Reply::ProjectTasks {
            project: pid(1),
            result: Ok(vec![task(10, 1)]),
        },
    );
    assert_eq!(
        h.model.member.tasks.resource,
        Resource::Loaded(vec![task(10, 1), task(20, 2), task(21, 2)])
    );
    assert_eq!(
        h.model.member.tasks.scope,
        Scope::Projects(vec![pid(1), pid(2)])
    );
}

#[test]
fn project_switch_discards_in_flight_branches() {
    let mut h = Harness::boot("/app/pool");
    h.sign_in(Role::Member);
    h.load_projects(&[1, 2]);
    let old = h.token_for(&FetchRequest::ProjectTasks {
        project: pid(1),
    });

    h.send(Msg::SelectProject {
        project: pid(2),
    });
    assert_eq!(h.model.route.project(), Some(pid(2)));
    assert!(h.effects.contains(&Effect::PushUrl {
        url: "/app/pool?project=2".to_string()
    }));

    h.send(Msg::Response {
        token: old,
        reply: Reply::ProjectTasks {
            project: pid(1),
            result: Ok(vec![task(10, 1)]),
        },
    });
    assert!(h.model.member.tasks.resource.is_loading());
    assert!(h.effects.is_empty(), "stale branch has no effect");

    let fresh = h
        .pending
        .iter()
        .rev()
        .find(|(r, _)| {
            *r == FetchRequest::ProjectTasks {
                project: pid(2),
            }
        })
        .map(|(_, token)| *token)
        .expect("fresh branch issued");
    assert_ne!(fresh, old);
    h.send(Msg::Response {
        token: fresh,
        reply: Reply::ProjectTasks {
            project: pid(2),
            result: Ok(vec![task(20, 2)]),
        },
    });
    assert_eq!(h.model.member.tasks.resource, Resource::Loaded(vec![task(20, 2)]));
}

#[test]
fn superseded_search_response_is_discarded() {
    let mut h = Harness::boot("/app/pool");
    h.send(Msg::SearchInput {
        text: "deploy".to_string(),
    });
    let Some(Effect::ScheduleDebounce { token: first, .. }) = h.effects.first().cloned() else {
        panic!("expected debounce");
    };
    h.send(Msg::SearchDebounced { token: first });
    assert_eq!(
        h.issued(),
        vec![FetchRequest::SearchTasks {
            query: "deploy".to_string()
        }]
    );

    h.send(Msg::SearchInput {
        text: "deploy prod".to_string(),
    });
    let Some(Effect::ScheduleDebounce { token: second, .. }) = h.effects.first().cloned() else {
        panic!("expected debounce");
    };
    assert!(second.generation > first.generation);
    h.send(Msg::SearchDebounced { token: second });

    h.send(Msg::Response {
        token: first,
        reply: Reply::SearchTasks(Ok(vec![task(1, 1)])),
    });
    assert!(h.model.member.search.results.resource.is_loading());

    h.send(Msg::Response {
        token: second,
        reply: Reply::SearchTasks(Ok(vec![task(2, 1)])),
    });
    assert_eq!(
        h.model.member.search.results.resource,
        Resource::Loaded(vec![task(2, 1)])
    );

    h.send(Msg::Response {
        token: first,
        reply: Reply::SearchTasks(Ok(vec![task(1, 1)])),
    });
    assert_eq!(
        h.model.member.search.results.resource,
        Resource::Loaded(vec![task(2, 1)]),
        "late older response must not overwrite"
    );
}

#[test]
fn forbidden_restores_and_toasts() {
    let mut h = Harness::boot("/config/capabilities");
    h.sign_in(Role::Admin);
    h.load_projects(&[1]);
    h.answer(
        &FetchRequest::Capabilities,
        Reply::Capabilities(Err(ApiError::new(403, ""))),
    );
    assert_eq!(h.model.core.capabilities.resource, Resource::NotAsked);
    let toasts = h.model.ui.toasts.items();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
    assert!(h.effects.contains(&Effect::ScheduleToastTick { delay_ms: 250 }));
}

#[test]
fn unauthorized_mid_session_clears_everything() {
    let mut h = Harness::boot("/app/pool");
    h.sign_in(Role::Member);
    h.load_projects(&[1]);
    h.send(Msg::Drag {
        event: DragEvent::PointerDown {
            task: TaskId(5),
            at: Point { x: 0, y: 0 },
        },
    });
    assert!(!h.model.ui.drag.is_idle());

    h.answer(
        &FetchRequest::WorkSessions,
        Reply::WorkSessions(Err(ApiError::new(401, "expired"))),
    );
    assert_eq!(h.model.route, Route::Login);
    assert!(h.model.ui.drag.is_idle());
    assert_eq!(h.model.member.tasks.resource, Resource::NotAsked);
    assert!(h.effects.contains(&Effect::ReplaceUrl {
        url: "/".to_string()
    }));

    let stale = h.token_for(&FetchRequest::ProjectTasks {
        project: pid(1),
    });
    h.send(Msg::Response {
        token: stale,
        reply: Reply::ProjectTasks {
            project: pid(1),
            result: Ok(vec![task(1, 1)]),
        },
    });
    assert_eq!(h.model.member.tasks.resource, Resource::NotAsked);
}

#[test]
fn drag_to_claim_refreshes_member_resources() {
    let mut h = Harness::boot("/app/my-bar");
    h.sign_in(Role::Member);
    h.load_projects(&[1]);
    assert_eq!(
        h.model.route,
        Route::Member {
            section: MemberSection::MyBar,
            project: None,
            view: None,
        }
    );

    h.send(Msg::Drag {
        event: DragEvent::PointerDown {
            task: TaskId(9),
            at: Point { x: 5, y: 5 },
        },
    });
    let Some(Effect::MeasureDropTarget { session }) = h.effects.first().cloned() else {
        panic!("expected measurement request");
    };
    let target = Rect {
        x: 100,
        y: 100,
        width: 40,
        height: 40,
    };
    h.send(Msg::Drag {
        event: DragEvent::RectMeasured {
            session,
            rect: Some(target),
        },
    });
    h.send(Msg::Drag {
        event: DragEvent::PointerUp {
            at: Point { x: 110, y: 110 },
        },
    });
    assert_eq!(
        h.issued(),
        vec![FetchRequest::ClaimTask { task: TaskId(9) }]
    );

    h.answer(
        &FetchRequest::ClaimTask { task: TaskId(9) },
        Reply::ClaimTask(Ok(task(9, 1))),
    );
    assert_eq!(h.model.ui.toasts.items()[0].level, ToastLevel::Info);
    let issued = h.issued();
    assert!(issued.contains(&FetchRequest::WorkSessions));
    assert!(issued.contains(&FetchRequest::ProjectTasks {
        project: pid(1)
    }));
}

#[test]
fn member_is_sent_away_from_admin_pages() {
    let mut h = Harness::boot("/org/invites");
    h.sign_in(Role::Member);
    assert_eq!(h.model.route, Route::landing(Role::Member));
    assert!(h.effects.contains(&Effect::ReplaceUrl {
        url: "/app/pool".to_string()
    }));
}

#[test]
fn redirect_limit_stops_hydration() {
    let config = AppConfig {
        max_redirects: 0,
        ..AppConfig::default()
    };
    let mut h = Harness::boot_with(config, "/org/invites");
    h.sign_in(Role::Member);
    assert_eq!(
        h.model.route,
        Route::Org {
            section: OrgSection::Invites
        },
        "redirect beyond the limit is not followed"
    );
    assert!(h.issued().is_empty());
    assert!(
        !h.effects
            .iter()
            .any(|effect| matches!(effect, Effect::ReplaceUrl { .. })),
        "no address rewrite once the limit is reached"
    );
}

#[test]
fn forbidden_after_project_switch_restores_previous_scope() {
    let mut h = Harness::boot("/config/members?project=1");
    h.sign_in(Role::Admin);
    h.load_projects(&[1, 2]);
    h.answer(
        &FetchRequest::Members { project: pid(1) },
        Reply::Members(Ok(vec![member(10)])),
    );

    h.send(Msg::SelectProject { project: pid(2) });
    assert_eq!(h.issued(), vec![FetchRequest::Members { project: pid(2) }]);
    h.answer(
        &FetchRequest::Members { project: pid(2) },
        Reply::Members(Err(ApiError::new(403, "not a project admin"))),
    );

    let members = &h.model.admin.members;
    assert_eq!(members.resource, Resource::Loaded(vec![member(10)]));
    assert_eq!(members.scope, Scope::Project(pid(1)));
    assert_eq!(h.model.ui.toasts.items()[0].level, ToastLevel::Error);

    let snapshot = Snapshot::of(&h.model);
    assert_eq!(
        taskpool_core::plan(&h.model.route, &snapshot),
        vec![Command::FetchMembers(pid(2))],
        "project 1's members do not satisfy project 2"
    );
}

#[test]
fn single_resource_project_switch_discards_old_reply() {
    let mut h = Harness::boot("/config/members?project=1");
    h.sign_in(Role::Admin);
    h.load_projects(&[1, 2]);
    let old = h.token_for(&FetchRequest::Members { project: pid(1) });

    h.send(Msg::SelectProject { project: pid(2) });
    assert_eq!(h.issued(), vec![FetchRequest::Members { project: pid(2) }]);

    h.answer_token(old, Reply::Members(Ok(vec![member(10)])));
    assert!(h.model.admin.members.resource.is_loading());
    assert!(h.effects.is_empty(), "stale reply has no effect");

    h.answer(
        &FetchRequest::Members { project: pid(2) },
        Reply::Members(Ok(vec![member(20)])),
    );
    assert_eq!(
        h.model.admin.members.resource,
        Resource::Loaded(vec![member(20)])
    );
    assert_eq!(h.model.admin.members.scope, Scope::Project(pid(2)));
}

#[test]
fn forbidden_session_check_falls_back_to_login() {
    let mut h = Harness::boot("/app/pool");
    h.answer(&FetchRequest::Me, Reply::Me(Err(ApiError::new(403, ""))));

    assert_eq!(h.model.route, Route::Login);
    assert!(h.effects.contains(&Effect::ReplaceUrl {
        url: "/".to_string()
    }));
    assert!(h.issued().is_empty(), "no retry loop on the session check");
    assert!(h.pending.is_empty());
}

#[test]
fn measurement_from_before_session_reset_is_ignored() {
    let mut h = Harness::boot("/app/pool");
    h.sign_in(Role::Member);
    h.load_projects(&[1]);
    let before = press(&mut h, 5);

    h.answer(
        &FetchRequest::WorkSessions,
        Reply::WorkSessions(Err(ApiError::new(401, "expired"))),
    );
    let after = press(&mut h, 6);
    assert_ne!(before, after);

    h.send(Msg::Drag {
        event: DragEvent::RectMeasured {
            session: before,
            rect: Some(Rect {
                x: 0,
                y: 0,
                width: 40,
                height: 40,
            }),
        },
    });
    assert!(matches!(
        h.model.ui.drag.state(),
        DragState::PendingRect { session, .. } if *session == after
    ));
}

#[test]
fn claim_reply_off_member_pages_skips_fan_out() {
    let mut h = Harness::boot("/app/my-bar");
    h.sign_in(Role::Admin);
    h.load_projects(&[1]);
    let session = press(&mut h, 9);
    h.send(Msg::Drag {
        event: DragEvent::RectMeasured {
            session,
            rect: Some(Rect {
                x: 0,
                y: 0,
                width: 40,
                height: 40,
            }),
        },
    });
    h.send(Msg::Drag {
        event: DragEvent::PointerUp {
            at: Point { x: 10, y: 10 },
        },
    });
    assert_eq!(h.issued(), vec![FetchRequest::ClaimTask { task: TaskId(9) }]);

    h.send(Msg::Navigate {
        route: Route::Org {
            section: OrgSection::Invites,
        },
    });
    h.answer(
        &FetchRequest::ClaimTask { task: TaskId(9) },
        Reply::ClaimTask(Ok(task(9, 1))),
    );
    let issued = h.issued();
    assert!(issued.contains(&FetchRequest::WorkSessions));
    assert!(
        !issued
            .iter()
            .any(|request| matches!(request, FetchRequest::ProjectTasks { .. })),
        "no pool fan-out outside member pages"
    );
}
