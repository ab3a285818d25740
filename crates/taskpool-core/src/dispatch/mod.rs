//! Update dispatcher: `update(model, msg, now) -> (model, effects)`.
//!
//! The model is moved in and a new one handed back, so there is exactly one
//! coherent model per dispatch step. All I/O is described by [`Effect`]s
//! for the host to perform; results come back as [`Msg::Response`].
//!
//! Hydration runs after every route change and after every response that
//! loaded something. Failures do not trigger a re-plan: a failing fetch is
//! retried on the next navigation, never in a loop.

mod apply;
mod executor;
mod model;
mod msg;

pub use model::{AdminState, CoreState, MemberState, Model, SearchState, UiState};
pub use msg::{Dialog, Effect, FetchRequest, Msg, Reply};

use crate::Millis;
use crate::command::Command;
use crate::error::{ApiError, ErrorCode};
use crate::gesture::{DragEvent, DragOutput};
use crate::model::ProjectId;
use crate::plan::plan;
use crate::resource::{Resource, Scope};
use crate::route::{self, Location, ParseResult, Route};
use crate::snapshot::Snapshot;
use crate::staleness::{Stream, Token};
use crate::toast::ToastLevel;
use apply::{Applied, Progress};
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum History {
    /// The address bar already shows the location.
    Keep,
    Push,
    Replace,
}

/// Process one message.
#[must_use]
pub fn update(model: Model, msg: Msg, now: Millis) -> (Model, Vec<Effect>) {
    let mut effects = Vec::new();
    let model = match msg {
        Msg::UrlChanged { location } => url_changed(model, &location, &mut effects),
        Msg::Navigate { route } => {
            let model = enter_route(model, route, History::Push, &mut effects);
            hydrate(model, &mut effects)
        }
        Msg::SelectProject { project } => select_project(model, project, &mut effects),
        Msg::Response { token, reply } => response(model, token, reply, now, &mut effects),
        Msg::SearchInput { text } => search_input(model, text, &mut effects),
        Msg::SearchDebounced { token } => search_debounced(model, token, &mut effects),
        Msg::Drag { event } => drag(model, event, &mut effects),
        Msg::ToastTick => {
            let (toasts, tick) = model.ui.toasts.tick(now, model.config.toast_tick_ms);
            if let Some(tick) = tick {
                effects.push(Effect::ScheduleToastTick {
                    delay_ms: tick.delay_ms,
                });
            }
            Model {
                ui: UiState { toasts, ..model.ui },
                ..model
            }
        }
        Msg::DismissToast { id } => Model {
            ui: UiState {
                toasts: model.ui.toasts.dismiss(id),
                ..model.ui
            },
            ..model
        },
        Msg::OpenDialog { dialog } => Model {
            ui: UiState {
                dialog: Some(dialog),
                ..model.ui
            },
            ..model
        },
        Msg::CloseDialog => Model {
            ui: UiState {
                dialog: None,
                ..model.ui
            },
            ..model
        },
        Msg::Refresh => refresh(model, &mut effects),
    };
    (model, effects)
}

/// Boot the model on the initial location.
#[must_use]
pub fn init(model: Model, location: &Location) -> (Model, Vec<Effect>) {
    update(
        model,
        Msg::UrlChanged {
            location: location.clone(),
        },
        0,
    )
}

fn url_changed(model: Model, location: &Location, effects: &mut Vec<Effect>) -> Model {
    let model = match route::parse(location) {
        ParseResult::Parsed(route) => enter_route(model, route, History::Keep, effects),
        ParseResult::Redirect(route) => {
            tracing::info!(
                path = %location.path,
                to = %route::format(&route),
                "non-canonical location normalized"
            );
            enter_route(model, route, History::Replace, effects)
        }
    };
    hydrate(model, effects)
}

/// Switch the current route and write the URL and title.
fn enter_route(model: Model, route: Route, history: History, effects: &mut Vec<Effect>) -> Model {
    let url = route::format(&route);
    match history {
        History::Keep => {}
        History::Push if route == model.route => {}
        History::Push => effects.push(Effect::PushUrl { url }),
        History::Replace => effects.push(Effect::ReplaceUrl { url }),
    }
    effects.push(Effect::SetTitle {
        title: route.title(),
    });

    let page_changed = mem::discriminant(&route) != mem::discriminant(&model.route);
    let ui = if page_changed {
        UiState {
            dialog: None,
            drag: model.ui.drag.cancelled(),
            ..model.ui
        }
    } else {
        model.ui
    };
    let core = CoreState {
        selected_project: route.project().or(model.core.selected_project),
        ..model.core
    };
    Model {
        route,
        core,
        ui,
        ..model
    }
}

/// Plan and execute until the route is stable, following redirects up to
/// `config.max_redirects` times.
fn hydrate(mut model: Model, effects: &mut Vec<Effect>) -> Model {
    let mut redirects = 0;
    loop {
        let snapshot = Snapshot::of(&model);
        let commands = plan(&model.route, &snapshot);

        if let Some(Command::Redirect(target)) = commands.iter().find(|c| c.is_redirect()) {
            if redirects >= model.config.max_redirects {
                tracing::warn!(
                    code = ErrorCode::RedirectLimitReached.code(),
                    route = %route::format(&model.route),
                    redirects,
                    "redirect limit reached, hydration stopped"
                );
                return model;
            }
            redirects += 1;
            tracing::info!(
                from = %route::format(&model.route),
                to = %route::format(target),
                "redirect"
            );
            let target = target.clone();
            model = enter_route(model, target, History::Replace, effects);
            continue;
        }

        for command in commands {
            model = executor::execute(model, command, effects);
        }
        return model;
    }
}

fn select_project(model: Model, project: ProjectId, effects: &mut Vec<Effect>) -> Model {
    match model.route {
        Route::Config { .. } | Route::Member { .. } => {
            tracing::debug!(%project, "project switch");
            let route = model.route.clone().with_project(Some(project));
            let model = enter_route(model, route, History::Push, effects);
            hydrate(model, effects)
        }
        _ => Model {
            core: CoreState {
                selected_project: Some(project),
                ..model.core
            },
            ..model
        },
    }
}

fn response(
    model: Model,
    token: Token,
    reply: Reply,
    now: Millis,
    effects: &mut Vec<Effect>,
) -> Model {
    if !model.generations.is_current(&token) {
        tracing::debug!(%token, "stale response discarded");
        return model;
    }

    if let Some(err) = reply.error().filter(|err| err.is_auth_required()) {
        return session_expired(model, err.clone(), effects);
    }

    let settles_me = matches!(reply, Reply::Me(_));
    let (model, Applied { progress, forbidden }) = apply::apply(model, token, reply);

    let model = match forbidden {
        Some(err) => notify(model, ToastLevel::Error, forbidden_text(&err), now, effects),
        None => model,
    };

    match progress {
        Progress::Success => hydrate(model, effects),
        // A failed session check decides the auth state; re-plan so a
        // protected page falls back to login.
        Progress::Failure if settles_me && matches!(model.core.me.resource, Resource::Failed(_)) => {
            hydrate(model, effects)
        }
        Progress::Claimed(task) => {
            tracing::info!(task = %task.id, "task claimed");
            let model = notify(
                model,
                ToastLevel::Info,
                format!("Claimed \u{201c}{}\u{201d}", task.title),
                now,
                effects,
            );
            let model = executor::execute(model, Command::FetchWorkSessions, effects);
            if let Route::Member { project, .. } = model.route {
                let keys = Snapshot::of(&model).active_projects(project);
                executor::execute(model, Command::RefreshMemberResources(keys), effects)
            } else {
                model
            }
        }
        Progress::ClaimRejected(err) => {
            tracing::warn!(%token, %err, "claim rejected");
            notify(model, ToastLevel::Error, err.message, now, effects)
        }
        Progress::Failure | Progress::Pending | Progress::Stale => model,
    }
}

/// 401: supersede everything in flight, clear the session and page-local
/// state, and land on the login page without an error.
fn session_expired(model: Model, err: ApiError, effects: &mut Vec<Effect>) -> Model {
    tracing::warn!(
        code = ErrorCode::SessionExpired.code(),
        route = %route::format(&model.route),
        "session expired, resetting to login"
    );
    let model = model.reset_session(err);
    effects.push(Effect::ReplaceUrl {
        url: route::format(&Route::Login),
    });
    effects.push(Effect::SetTitle {
        title: Route::Login.title(),
    });
    hydrate(model, effects)
}

fn forbidden_text(err: &ApiError) -> String {
    if err.message.is_empty() {
        "You don't have permission to do that".to_string()
    } else {
        format!("Not allowed: {}", err.message)
    }
}

fn notify(
    model: Model,
    level: ToastLevel,
    text: impl Into<String>,
    now: Millis,
    effects: &mut Vec<Effect>,
) -> Model {
    let (toasts, _, tick) = model.ui.toasts.show(
        level,
        text,
        now,
        model.config.toast_duration_ms,
        model.config.toast_tick_ms,
    );
    if let Some(tick) = tick {
        effects.push(Effect::ScheduleToastTick {
            delay_ms: tick.delay_ms,
        });
    }
    Model {
        ui: UiState { toasts, ..model.ui },
        ..model
    }
}

fn search_input(mut model: Model, text: String, effects: &mut Vec<Effect>) -> Model {
    let token = model.generations.next(Stream::Search);
    effects.push(Effect::ScheduleDebounce {
        token,
        delay_ms: model.config.search_debounce_ms,
    });
    Model {
        member: MemberState {
            search: SearchState {
                query: text,
                ..model.member.search
            },
            ..model.member
        },
        ..model
    }
}

fn search_debounced(model: Model, token: Token, effects: &mut Vec<Effect>) -> Model {
    if !model.generations.is_current(&token) {
        tracing::debug!(%token, "superseded debounce ignored");
        return model;
    }
    let query = model.member.search.query.trim().to_string();
    let results = if query.is_empty() {
        model.member.search.results.commit(Scope::Global, Vec::new())
    } else {
        effects.push(Effect::Fetch {
            request: FetchRequest::SearchTasks { query },
            token,
        });
        model.member.search.results.begin(Scope::Global, token)
    };
    Model {
        member: MemberState {
            search: SearchState {
                results,
                ..model.member.search
            },
            ..model.member
        },
        ..model
    }
}

fn drag(mut model: Model, event: DragEvent, effects: &mut Vec<Effect>) -> Model {
    let (drag, output) = model.ui.drag.handle(event);
    model.ui.drag = drag;
    match output {
        Some(DragOutput::Measure(session)) => {
            effects.push(Effect::MeasureDropTarget { session });
        }
        Some(DragOutput::Claim(task)) => {
            let token = model.generations.next(Stream::Claim(task));
            tracing::debug!(%token, "claim issued");
            model.member.claims.insert(task, token);
            effects.push(Effect::Fetch {
                request: FetchRequest::ClaimTask { task },
                token,
            });
        }
        None => {}
    }
    model
}

/// Re-fetch everything the page shows, ignoring what is already loaded.
fn refresh(mut model: Model, effects: &mut Vec<Effect>) -> Model {
    let snapshot = Snapshot::of(&model).forget_loaded();
    let commands = plan(&model.route, &snapshot);
    if commands.iter().any(Command::is_redirect) {
        return hydrate(model, effects);
    }
    for command in commands {
        model = executor::execute(model, command, effects);
    }
    model
}
