//! `tp replay`: drive the dispatcher from a scripted session.
//!
//! A script names a start URL and a list of steps. `send` steps dispatch a
//! message as-is; `respond` steps answer the most recent outstanding fetch
//! with an equal request, so scripts never spell out tokens; `url` steps
//! simulate back/forward or a typed address.
//!
//! ```json
//! {
//!   "start": "/app/pool",
//!   "steps": [
//!     { "step": "respond", "request": { "fetch": "me" },
//!       "reply": { "reply": "me", "result": { "Ok": { ... } } } },
//!     { "step": "send", "at": 500, "msg": { "msg": "refresh" } }
//!   ]
//! }
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde::{Deserialize, Serialize};
use taskpool_core::Millis;
use taskpool_core::config::AppConfig;
use taskpool_core::dispatch::{self, Effect, FetchRequest, Model, Msg, Reply};
use taskpool_core::error::ErrorCode;
use taskpool_core::route::{self, Location, Route};
use taskpool_core::snapshot::Snapshot;
use taskpool_core::staleness::Token;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Script JSON file.
    pub script: PathBuf,

    /// Print only the final state, not every step's effects.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Script {
    #[serde(default = "default_start")]
    start: String,
    #[serde(default)]
    steps: Vec<Step>,
}

fn default_start() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
enum Step {
    Send {
        #[serde(default)]
        at: Millis,
        msg: Msg,
    },
    Respond {
        #[serde(default)]
        at: Millis,
        request: FetchRequest,
        reply: Reply,
    },
    Url {
        #[serde(default)]
        at: Millis,
        url: String,
    },
}

#[derive(Debug, Serialize)]
struct StepOutput {
    index: usize,
    at: Millis,
    input: String,
    effects: Vec<Effect>,
}

#[derive(Debug, Serialize)]
struct ReplayOutput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    steps: Vec<StepOutput>,
    route: Route,
    url: String,
    title: String,
    /// Fetches issued but never answered by the script.
    outstanding: Vec<FetchRequest>,
    toasts: Vec<String>,
    snapshot: Snapshot,
}

/// Host state the script drives: the model, the address bar and the
/// fetches waiting for an answer.
struct Session {
    model: Model,
    url: String,
    title: String,
    outstanding: Vec<(FetchRequest, Token)>,
}

impl Session {
    fn start(config: AppConfig, start: &str) -> (Self, Vec<Effect>) {
        let (model, effects) = dispatch::init(Model::new(config), &Location::parse_url(start));
        let mut session = Self {
            model,
            url: start.to_string(),
            title: String::new(),
            outstanding: Vec::new(),
        };
        session.absorb(&effects);
        (session, effects)
    }

    fn dispatch(&mut self, msg: Msg, at: Millis) -> Vec<Effect> {
        let model = std::mem::take(&mut self.model);
        let (model, effects) = dispatch::update(model, msg, at);
        self.model = model;
        self.absorb(&effects);
        effects
    }

    /// Track what the host would do with each effect.
    fn absorb(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Fetch { request, token } => {
                    self.outstanding.push((request.clone(), *token));
                }
                Effect::PushUrl { url } | Effect::ReplaceUrl { url } => self.url.clone_from(url),
                Effect::SetTitle { title } => self.title.clone_from(title),
                Effect::ScheduleDebounce { .. }
                | Effect::ScheduleToastTick { .. }
                | Effect::MeasureDropTarget { .. } => {}
            }
        }
    }

    /// Remove and return the token of the latest fetch for `request`.
    fn take_outstanding(&mut self, request: &FetchRequest) -> Option<Token> {
        let index = self
            .outstanding
            .iter()
            .rposition(|(pending, _)| pending == request)?;
        Some(self.outstanding.remove(index).1)
    }
}

pub fn run_replay(
    args: &ReplayArgs,
    config: AppConfig,
    output: OutputMode,
) -> Result<()> {
    let script = load_script(&args.script)?;
    let mut out = replay(config, &script)?;
    if args.summary {
        out.steps.clear();
    }
    render_mode(output, &out, render_text, render_pretty)
}

fn load_script(path: &Path) -> Result<Script> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("script {}", path.display()))
        .context(ErrorCode::ScriptParseError)
}

fn replay(config: AppConfig, script: &Script) -> Result<ReplayOutput> {
    let (mut session, effects) = Session::start(config, &script.start);
    let mut steps = vec![StepOutput {
        index: 0,
        at: 0,
        input: format!("start {}", script.start),
        effects,
    }];

    for (offset, step) in script.steps.iter().enumerate() {
        let index = offset + 1;
        let (at, input, effects) = match step.clone() {
            Step::Send { at, msg } => {
                let input = format!("send {}", msg_label(&msg));
                (at, input, session.dispatch(msg, at))
            }
            Step::Respond { at, request, reply } => {
                let token = session
                    .take_outstanding(&request)
                    .ok_or_else(|| anyhow!("step {index}: no outstanding fetch for {request:?}"))
                    .context(ErrorCode::ScriptParseError)?;
                let input = format!("respond {token}");
                (at, input, session.dispatch(Msg::Response { token, reply }, at))
            }
            Step::Url { at, url } => {
                let msg = Msg::UrlChanged {
                    location: Location::parse_url(&url),
                };
                session.url.clone_from(&url);
                (at, format!("url {url}"), session.dispatch(msg, at))
            }
        };
        tracing::debug!(index, at, effects = effects.len(), "replayed step");
        steps.push(StepOutput {
            index,
            at,
            input,
            effects,
        });
    }

    let model = &session.model;
    Ok(ReplayOutput {
        steps,
        route: model.route.clone(),
        url: session.url,
        title: session.title,
        outstanding: session
            .outstanding
            .into_iter()
            .map(|(request, _)| request)
            .collect(),
        toasts: model
            .ui
            .toasts
            .items()
            .iter()
            .map(|toast| toast.text.clone())
            .collect(),
        snapshot: Snapshot::of(model),
    })
}

/// The serde tag of a message, e.g. `navigate`.
fn msg_label(msg: &Msg) -> String {
    serde_json::to_value(msg)
        .ok()
        .and_then(|value| value.get("msg").and_then(|tag| tag.as_str().map(str::to_string)))
        .unwrap_or_else(|| "message".to_string())
}

fn effect_label(effect: &Effect) -> String {
    match effect {
        Effect::Fetch { request, token } => format!("fetch {request:?} as {token}"),
        Effect::PushUrl { url } => format!("push {url}"),
        Effect::ReplaceUrl { url } => format!("replace {url}"),
        Effect::SetTitle { title } => format!("title {title:?}"),
        Effect::ScheduleDebounce { token, delay_ms } => {
            format!("debounce {token} in {delay_ms}ms")
        }
        Effect::ScheduleToastTick { delay_ms } => format!("toast tick in {delay_ms}ms"),
        Effect::MeasureDropTarget { .. } => "measure drop target".to_string(),
    }
}

fn render_text(out: &ReplayOutput, w: &mut dyn Write) -> io::Result<()> {
    for step in &out.steps {
        writeln!(w, "step index={} at={} input={:?}", step.index, step.at, step.input)?;
        for effect in &step.effects {
            writeln!(w, "  effect {}", effect_label(effect))?;
        }
    }
    writeln!(
        w,
        "final route={} url={} outstanding={} toasts={}",
        route::format(&out.route),
        out.url,
        out.outstanding.len(),
        out.toasts.len()
    )
}

fn render_pretty(out: &ReplayOutput, w: &mut dyn Write) -> io::Result<()> {
    if !out.steps.is_empty() {
        pretty_section(w, "Steps")?;
        for step in &out.steps {
            writeln!(w, "[{:>3}] t={:<6} {}", step.index, step.at, step.input)?;
            for effect in &step.effects {
                writeln!(w, "        -> {}", effect_label(effect))?;
            }
        }
        writeln!(w)?;
    }
    pretty_section(w, "Final state")?;
    pretty_kv(w, "Route", route::format(&out.route))?;
    pretty_kv(w, "Address", &out.url)?;
    pretty_kv(w, "Title", &out.title)?;
    pretty_kv(w, "Outstanding", out.outstanding.len().to_string())?;
    for toast in &out.toasts {
        pretty_kv(w, "Toast", toast)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskpool_core::model::{Role, User, UserId};
    use taskpool_core::snapshot::AuthState;

    fn script(json: &str) -> Script {
        serde_json::from_str(json).expect("script")
    }

    fn me_reply(role: Role) -> Reply {
        Reply::Me(Ok(User {
            id: UserId(1),
            email: "ada@example.com".to_string(),
            role,
        }))
    }

    #[test]
    fn start_fetches_me() {
        let out = replay(AppConfig::default(), &script(r#"{"start": "/app/pool"}"#))
            .expect("replay");
        assert_eq!(out.outstanding, vec![FetchRequest::Me]);
        assert_eq!(out.snapshot.auth, AuthState::Unknown);
    }

    #[test]
    fn respond_matches_outstanding_request() {
        let mut parsed = script(r#"{"start": "/app/pool"}"#);
        parsed.steps.push(Step::Respond {
            at: 10,
            request: FetchRequest::Me,
            reply: me_reply(Role::Member),
        });
        let out = replay(AppConfig::default(), &parsed).expect("replay");
        assert_eq!(out.snapshot.auth, AuthState::Authed(Role::Member));
        assert!(!out.outstanding.contains(&FetchRequest::Me));
        assert!(out.outstanding.contains(&FetchRequest::Projects));
    }

    #[test]
    fn unmatched_respond_is_a_script_error() {
        let mut parsed = script(r#"{"start": "/"}"#);
        parsed.steps.push(Step::Respond {
            at: 0,
            request: FetchRequest::Projects,
            reply: Reply::Projects(Ok(Vec::new())),
        });
        let err = replay(AppConfig::default(), &parsed).expect_err("no fetch");
        assert_eq!(
            err.downcast_ref::<ErrorCode>(),
            Some(&ErrorCode::ScriptParseError)
        );
    }

    #[test]
    fn url_step_updates_address_bar() {
        let parsed = script(
            r#"{"start": "/", "steps": [{"step": "url", "at": 5, "url": "/org/invites"}]}"#,
        );
        let out = replay(AppConfig::default(), &parsed).expect("replay");
        assert_eq!(out.url, "/org/invites");
        assert_eq!(out.steps.len(), 2);
    }

    #[test]
    fn send_step_accepts_tagged_message() {
        let parsed = script(r#"{"steps": [{"step": "send", "msg": {"msg": "refresh"}}]}"#);
        let out = replay(AppConfig::default(), &parsed).expect("replay");
        assert_eq!(out.steps[1].input, "send refresh");
    }

    #[test]
    fn unknown_script_fields_are_rejected() {
        assert!(serde_json::from_str::<Script>(r#"{"begin": "/"}"#).is_err());
    }
}
