//! Drag-to-claim gesture.
//!
//! ```text
//! Idle --down--> PendingRect --measured--> Dragging --up over target--> Idle (claim)
//!                     |                        |
//!                     +--up/cancel--> Idle     +--up elsewhere/cancel--> Idle
//! ```
//!
//! The drop target's rect is measured asynchronously. Each press opens a new
//! drag session; a measurement tagged with any other session is stale and
//! dropped, which covers the "released before the rect arrived" race.

use crate::model::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DragSession(pub u64);

impl fmt::Display for DragSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drag-{}", self.0)
    }
}

/// Pointer position in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[must_use]
    pub const fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x.saturating_add(self.width)
            && point.y < self.y.saturating_add(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DragEvent {
    PointerDown { task: TaskId, at: Point },
    PointerMove { at: Point },
    PointerUp { at: Point },
    PointerCancel,
    /// Geometry answer; `rect` is `None` when the target is not mounted.
    RectMeasured { session: DragSession, rect: Option<Rect> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    PendingRect {
        session: DragSession,
        task: TaskId,
        pointer: Point,
    },
    Dragging {
        session: DragSession,
        task: TaskId,
        pointer: Point,
        target: Rect,
        over_target: bool,
    },
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutput {
    Measure(DragSession),
    Claim(TaskId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DragMachine {
    state: DragState,
    last_session: u64,
}

impl DragMachine {
    #[must_use]
    pub const fn state(&self) -> &DragState {
        &self.state
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, DragState::Idle)
    }

    /// Back to idle without touching the session counter.
    #[must_use]
    pub const fn cancelled(self) -> Self {
        Self {
            state: DragState::Idle,
            last_session: self.last_session,
        }
    }

    #[must_use]
    pub fn handle(self, event: DragEvent) -> (Self, Option<DragOutput>) {
        let with = |state| {
            (
                Self {
                    state,
                    last_session: self.last_session,
                },
                None,
            )
        };

        match (self.state, event) {
            (DragState::Idle, DragEvent::PointerDown { task, at }) => {
                let session = DragSession(self.last_session.saturating_add(1));
                (
                    Self {
                        state: DragState::PendingRect {
                            session,
                            task,
                            pointer: at,
                        },
                        last_session: session.0,
                    },
                    Some(DragOutput::Measure(session)),
                )
            }
            (DragState::PendingRect { session, task, .. }, DragEvent::PointerMove { at }) => {
                with(DragState::PendingRect {
                    session,
                    task,
                    pointer: at,
                })
            }
            (
                DragState::PendingRect {
                    session,
                    task,
                    pointer,
                },
                DragEvent::RectMeasured {
                    session: measured,
                    rect,
                },
            ) if measured == session => match rect {
                Some(target) => with(DragState::Dragging {
                    session,
                    task,
                    pointer,
                    target,
                    over_target: target.contains(pointer),
                }),
                None => {
                    tracing::debug!(%session, "drop target not mounted");
                    with(DragState::Idle)
                }
            },
            (
                DragState::Dragging {
                    session,
                    task,
                    target,
                    ..
                },
                DragEvent::PointerMove { at },
            ) => with(DragState::Dragging {
                session,
                task,
                pointer: at,
                target,
                over_target: target.contains(at),
            }),
            (DragState::Dragging { task, target, .. }, DragEvent::PointerUp { at }) => {
                let (next, _) = with(DragState::Idle);
                let output = target.contains(at).then_some(DragOutput::Claim(task));
                (next, output)
            }
            (
                DragState::PendingRect { .. } | DragState::Dragging { .. },
                DragEvent::PointerUp { .. } | DragEvent::PointerCancel,
            ) => with(DragState::Idle),
            (_, DragEvent::RectMeasured { session, .. }) => {
                tracing::debug!(%session, "stale drop target measurement discarded");
                (self, None)
            }
            _ => (self, None),
        }
    }
}
