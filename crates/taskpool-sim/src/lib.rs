//! taskpool-sim: deterministic simulation of the sync engine.
//!
//! A seeded [`Simulator`] plays a scripted user against a
//! [`backend::FixtureBackend`], routing every fetch through a
//! [`network::SimulatedNetwork`] that delays, duplicates and reorders
//! replies. Timers (search debounce, toast ticks, drop-target measurement)
//! run on a simulated clock. After the script the run drains until nothing
//! is in flight, and [`oracle::Oracle`] checks the settled model.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for return types.
//! - **Logging**: `tracing` macros; a run logs at `debug`, never above.

pub mod backend;
pub mod campaign;
pub mod network;
pub mod oracle;
pub mod rng;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU64;
use taskpool_core::Millis;
use taskpool_core::config::AppConfig;
use taskpool_core::dispatch::{self, Dialog, Effect, FetchRequest, Model, Msg, Reply};
use taskpool_core::gesture::{DragEvent, DragSession, Point, Rect};
use taskpool_core::model::{ProjectId, TaskId};
use taskpool_core::route::{ConfigSection, Location, MemberSection, OrgSection, Route, ViewMode};
use taskpool_core::staleness::Token;

use crate::backend::{FixtureBackend, WorldConfig};
use crate::network::{FaultConfig, SimulatedNetwork};
use crate::rng::DeterministicRng;

/// Where the drop zone sits on the simulated screen.
pub const DROP_TARGET: Rect = Rect {
    x: 600,
    y: 0,
    width: 300,
    height: 800,
};
const INSIDE: Point = Point { x: 700, y: 120 };
const OUTSIDE: Point = Point { x: 40, y: 40 };

/// Locations a run may boot from or the user may type in.
const ENTRY_URLS: [&str; 9] = [
    "/",
    "/app/pool",
    "/app/my-bar?view=cards",
    "/config/members?project=2",
    "/config/members?project=99",
    "/org/invites",
    "/#/admin/capabilities",
    "/config/task-types?project=abc",
    "/nowhere",
];

const QUERIES: [&str; 8] = ["", "  ", "dep", "deploy", "review api", "AUDIT", "zzz", "search"];

/// Hard stop for the drain phase; a run that has not settled by then is
/// reported as non-quiescent.
const DRAIN_LIMIT_ROUNDS: u64 = 10_000;

/// Parameters for one seeded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: u64,
    /// Rounds of scripted user activity before draining.
    pub rounds: u64,
    /// Simulated milliseconds per round.
    pub round_ms: Millis,
    /// Percent chance of a user action in each round.
    pub action_rate_percent: u8,
    pub fault: FaultConfig,
    pub world: WorldConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            rounds: 60,
            round_ms: 50,
            action_rate_percent: 40,
            fault: FaultConfig::default(),
            world: WorldConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// # Errors
    ///
    /// Returns an error when rounds or round length is zero.
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            bail!("rounds must be > 0");
        }
        if self.round_ms == 0 {
            bail!("round_ms must be > 0");
        }
        Ok(())
    }
}

/// One entry in the run trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub round: u64,
    pub now: Millis,
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TraceEventKind {
    /// A message dispatched on behalf of the user.
    Action { msg: Msg },
    /// A fetch left the host.
    Fetch { request: FetchRequest, token: Token },
    /// A reply reached `update`; `stale` when its token was superseded.
    Delivered { token: Token, stale: bool },
    Duplicated { token: Token },
    Reordered { count: usize },
    /// A scheduled timer fired.
    Timer { msg: Msg },
    /// The address bar changed.
    Url { url: String },
}

/// Counters collected during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulationStats {
    pub actions: u64,
    pub fetches: u64,
    pub delivered: u64,
    pub stale_deliveries: u64,
    pub duplicated: u64,
    pub reordered_batches: u64,
    pub timers_fired: u64,
    pub drain_rounds: u64,
}

/// Everything the oracle needs from a finished run.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub seed: u64,
    pub model: Model,
    pub backend: FixtureBackend,
    /// Address bar at the end of the run.
    pub url: String,
    pub trace: Vec<TraceEvent>,
    pub stats: SimulationStats,
    pub pending_replies: usize,
    pub pending_timers: usize,
    /// Some reply arrived stale, duplicated or out of order.
    pub interesting_state_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Timer {
    due: Millis,
    seq: u64,
    msg: Msg,
}

type Envelope = (Token, Reply);

/// Host, network and user for one seed.
#[derive(Debug)]
pub struct Simulator {
    config: SimulationConfig,
    rng: DeterministicRng,
    model: Model,
    backend: FixtureBackend,
    network: SimulatedNetwork<Envelope>,
    timers: Vec<Timer>,
    timer_seq: u64,
    history: Vec<String>,
    round: u64,
    now: Millis,
    trace: Vec<TraceEvent>,
    stats: SimulationStats,
}

impl Simulator {
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = DeterministicRng::new(config.seed);
        let backend = FixtureBackend::generate(config.world, &mut rng);
        Ok(Self {
            config,
            rng,
            model: Model::new(AppConfig::default()),
            backend,
            network: SimulatedNetwork::new(config.fault),
            timers: Vec::new(),
            timer_seq: 0,
            history: Vec::new(),
            round: 0,
            now: 0,
            trace: Vec::new(),
            stats: SimulationStats::default(),
        })
    }

    /// Boot, play the script, then drain until nothing is in flight.
    #[must_use]
    pub fn run(mut self) -> SimulationResult {
        let entry = self
            .rng
            .pick(&ENTRY_URLS)
            .copied()
            .unwrap_or("/")
            .to_string();
        tracing::debug!(seed = self.config.seed, %entry, "simulation boot");
        self.history.push(entry.clone());
        self.trace(TraceEventKind::Url { url: entry.clone() });
        let (model, effects) = dispatch::init(
            std::mem::take(&mut self.model),
            &Location::parse_url(&entry),
        );
        self.model = model;
        self.perform(effects);

        for round in 0..self.config.rounds {
            self.step(round);
            if self.rng.hit_rate_percent(self.config.action_rate_percent) {
                self.act();
            }
        }

        let mut round = self.config.rounds;
        while !self.is_quiescent() && self.stats.drain_rounds < DRAIN_LIMIT_ROUNDS {
            self.step(round);
            round += 1;
            self.stats.drain_rounds += 1;
        }

        let stats = self.stats;
        tracing::debug!(seed = self.config.seed, ?stats, "simulation finished");
        SimulationResult {
            seed: self.config.seed,
            url: self.history.last().cloned().unwrap_or_default(),
            pending_replies: self.network.pending_len(),
            pending_timers: self.timers.len(),
            interesting_state_reached: stats.stale_deliveries > 0
                || stats.duplicated > 0
                || stats.reordered_batches > 0,
            model: self.model,
            backend: self.backend,
            trace: self.trace,
            stats,
        }
    }

    fn is_quiescent(&self) -> bool {
        self.network.is_empty() && self.timers.is_empty()
    }

    /// Advance the clock one round: fire due timers, then deliver replies.
    fn step(&mut self, round: u64) {
        self.round = round;
        self.now = round.saturating_mul(self.config.round_ms);

        self.timers.sort_by_key(|timer| (timer.due, timer.seq));
        let split = self.timers.partition_point(|timer| timer.due <= self.now);
        let due: Vec<Timer> = self.timers.drain(..split).collect();
        for timer in due {
            self.stats.timers_fired += 1;
            self.trace(TraceEventKind::Timer {
                msg: timer.msg.clone(),
            });
            self.dispatch(timer.msg);
        }

        let outcome = self.network.deliver_ready(round, &mut self.rng);
        if outcome.reordered {
            self.stats.reordered_batches += 1;
            self.trace(TraceEventKind::Reordered {
                count: outcome.delivered.len(),
            });
        }
        for (token, reply) in outcome.delivered {
            let stale = !self.model.generations.is_current(&token);
            self.stats.delivered += 1;
            if stale {
                self.stats.stale_deliveries += 1;
            }
            self.trace(TraceEventKind::Delivered { token, stale });
            self.dispatch(Msg::Response { token, reply });
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let (model, effects) = dispatch::update(std::mem::take(&mut self.model), msg, self.now);
        self.model = model;
        self.perform(effects);
    }

    /// Play the host: fetches go to the backend and back over the network,
    /// timers onto the clock, URLs into the history stack.
    fn perform(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Fetch { request, token } => {
                    self.stats.fetches += 1;
                    self.trace(TraceEventKind::Fetch {
                        request: request.clone(),
                        token,
                    });
                    let reply = self.backend.answer(&request, &mut self.rng);
                    let outcome = self.network.send((token, reply), self.round, &mut self.rng);
                    if outcome.duplicated {
                        self.stats.duplicated += 1;
                        self.trace(TraceEventKind::Duplicated { token });
                    }
                }
                Effect::PushUrl { url } => {
                    self.trace(TraceEventKind::Url { url: url.clone() });
                    self.history.push(url);
                }
                Effect::ReplaceUrl { url } => {
                    self.trace(TraceEventKind::Url { url: url.clone() });
                    self.history.pop();
                    self.history.push(url);
                }
                Effect::SetTitle { .. } => {}
                Effect::ScheduleDebounce { token, delay_ms } => {
                    self.schedule(delay_ms, Msg::SearchDebounced { token });
                }
                Effect::ScheduleToastTick { delay_ms } => self.schedule(delay_ms, Msg::ToastTick),
                Effect::MeasureDropTarget { session } => self.measure(session),
            }
        }
    }

    fn schedule(&mut self, delay_ms: Millis, msg: Msg) {
        self.timer_seq += 1;
        self.timers.push(Timer {
            due: self.now.saturating_add(delay_ms),
            seq: self.timer_seq,
            msg,
        });
    }

    /// Layout answers a round or two later; now and then the target is
    /// not mounted.
    fn measure(&mut self, session: DragSession) {
        let rect = if self.rng.hit_rate_percent(10) {
            None
        } else {
            Some(DROP_TARGET)
        };
        let delay = self.rng.next_bounded(3).saturating_mul(self.config.round_ms);
        self.schedule(
            delay,
            Msg::Drag {
                event: DragEvent::RectMeasured { session, rect },
            },
        );
    }

    fn user(&mut self, msg: Msg) {
        self.stats.actions += 1;
        self.trace(TraceEventKind::Action { msg: msg.clone() });
        self.dispatch(msg);
    }

    fn act(&mut self) {
        match self.rng.next_bounded(10) {
            0 | 1 => {
                let route = self.random_route();
                self.user(Msg::Navigate { route });
            }
            2 => {
                let project = self.random_project();
                self.user(Msg::SelectProject { project });
            }
            3 | 4 => {
                let text = self.rng.pick(&QUERIES).copied().unwrap_or("").to_string();
                self.user(Msg::SearchInput { text });
            }
            5 | 6 => self.drag(),
            7 => self.back(),
            8 => {
                let url = self.rng.pick(&ENTRY_URLS).copied().unwrap_or("/").to_string();
                self.trace(TraceEventKind::Url { url: url.clone() });
                self.history.push(url.clone());
                self.user(Msg::UrlChanged {
                    location: Location::parse_url(&url),
                });
            }
            _ => {
                if self.rng.hit_rate_percent(50) {
                    self.user(Msg::Refresh);
                } else if self.model.ui.dialog.is_some() {
                    self.user(Msg::CloseDialog);
                } else {
                    self.user(Msg::OpenDialog {
                        dialog: Dialog::InviteMember,
                    });
                }
            }
        }
    }

    /// Pick up a task and schedule how the gesture ends.
    fn drag(&mut self) {
        let loaded: Vec<TaskId> = self
            .model
            .member
            .tasks
            .resource
            .loaded()
            .map(|tasks| tasks.iter().map(|task| task.id).collect())
            .unwrap_or_default();
        let candidates = if loaded.is_empty() {
            self.backend.task_ids()
        } else {
            loaded
        };
        let Some(task) = self.rng.pick(&candidates).copied() else {
            return;
        };

        self.user(Msg::Drag {
            event: DragEvent::PointerDown { task, at: OUTSIDE },
        });

        let lift = self.rng.next_bounded(4).saturating_mul(self.config.round_ms);
        let ending = match self.rng.next_bounded(4) {
            0 => DragEvent::PointerCancel,
            1 => DragEvent::PointerUp { at: OUTSIDE },
            _ => DragEvent::PointerUp { at: INSIDE },
        };
        self.schedule(
            lift,
            Msg::Drag {
                event: DragEvent::PointerMove { at: INSIDE },
            },
        );
        self.schedule(lift.saturating_add(self.config.round_ms), Msg::Drag { event: ending });
    }

    fn back(&mut self) {
        if self.history.len() < 2 {
            return;
        }
        self.history.pop();
        let url = self.history.last().cloned().unwrap_or_default();
        self.trace(TraceEventKind::Url { url: url.clone() });
        self.user(Msg::UrlChanged {
            location: Location::parse_url(&url),
        });
    }

    /// Projects one past the world's range exercise the unknown-project
    /// redirect.
    fn random_project(&mut self) -> ProjectId {
        let known = u64::try_from(self.backend.project_ids().len()).unwrap_or(0);
        ProjectId::from(NonZeroU64::MIN.saturating_add(self.rng.next_bounded(known.saturating_add(1))))
    }

    fn random_route(&mut self) -> Route {
        let project = if self.rng.hit_rate_percent(50) {
            Some(self.random_project())
        } else {
            None
        };
        match self.rng.next_bounded(12) {
            0 => Route::Login,
            1 => Route::Config {
                section: ConfigSection::Members,
                project,
            },
            2 => Route::Config {
                section: ConfigSection::TaskTypes,
                project,
            },
            3 => Route::Config {
                section: ConfigSection::Capabilities,
                project,
            },
            4 => Route::Config {
                section: ConfigSection::Metrics,
                project,
            },
            5 => Route::Org {
                section: OrgSection::Invites,
            },
            6 => Route::Org {
                section: OrgSection::Metrics,
            },
            7 => Route::Member {
                section: MemberSection::MyBar,
                project,
                view: Some(ViewMode::Cards),
            },
            8 => Route::Member {
                section: MemberSection::Skills,
                project,
                view: None,
            },
            9 => Route::Member {
                section: MemberSection::Metrics,
                project,
                view: None,
            },
            _ => Route::Member {
                section: MemberSection::Pool,
                project,
                view: None,
            },
        }
    }

    fn trace(&mut self, kind: TraceEventKind) {
        self.trace.push(TraceEvent {
            round: self.round,
            now: self.now,
            kind,
        });
    }
}
