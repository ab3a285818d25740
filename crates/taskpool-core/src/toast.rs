//! Transient notifications with independent countdowns.
//!
//! All toasts share one periodic tick. The tick is scheduled when the first
//! toast appears and reschedules itself only while at least one toast is
//! still counting down, so an empty stack leaves no timer behind.

use crate::Millis;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastId(pub u64);

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "toast-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: ToastId,
    pub level: ToastLevel,
    pub text: String,
    pub remaining_ms: Millis,
}

/// Ask the host to deliver a tick after `delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickRequest {
    pub delay_ms: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Toasts {
    items: Vec<Toast>,
    last_id: u64,
    ticking: bool,
    last_tick: Millis,
}

impl Toasts {
    #[must_use]
    pub fn items(&self) -> &[Toast] {
        &self.items
    }

    #[must_use]
    pub const fn is_ticking(&self) -> bool {
        self.ticking
    }

    /// Add a toast. Existing toasts keep their own countdowns.
    #[must_use]
    pub fn show(
        mut self,
        level: ToastLevel,
        text: impl Into<String>,
        now: Millis,
        duration_ms: Millis,
        tick_ms: Millis,
    ) -> (Self, ToastId, Option<TickRequest>) {
        if self.ticking {
            self.advance(now);
        }
        self.last_id = self.last_id.saturating_add(1);
        let id = ToastId(self.last_id);
        self.items.push(Toast {
            id,
            level,
            text: text.into(),
            remaining_ms: duration_ms,
        });

        let schedule = if self.ticking {
            None
        } else {
            self.ticking = true;
            self.last_tick = now;
            Some(TickRequest { delay_ms: tick_ms })
        };
        (self, id, schedule)
    }

    /// Shared tick: count every toast down by the elapsed time, drop the
    /// expired ones, and reschedule while anything remains.
    #[must_use]
    pub fn tick(mut self, now: Millis, tick_ms: Millis) -> (Self, Option<TickRequest>) {
        if !self.ticking {
            return (self, None);
        }
        self.advance(now);
        if self.items.is_empty() {
            self.ticking = false;
            (self, None)
        } else {
            (self, Some(TickRequest { delay_ms: tick_ms }))
        }
    }

    /// Explicit dismissal; a running tick stops on its own once the stack
    /// is empty.
    #[must_use]
    pub fn dismiss(mut self, id: ToastId) -> Self {
        self.items.retain(|toast| toast.id != id);
        self
    }

    /// Drop every toast. The id counter and any running tick are kept: the
    /// host still delivers the tick it was asked for, which then stops.
    #[must_use]
    pub fn cleared(self) -> Self {
        Self {
            items: Vec::new(),
            ..self
        }
    }

    fn advance(&mut self, now: Millis) {
        let elapsed = now.saturating_sub(self.last_tick);
        self.last_tick = now;
        for toast in &mut self.items {
            toast.remaining_ms = toast.remaining_ms.saturating_sub(elapsed);
        }
        self.items.retain(|toast| toast.remaining_ms > 0);
    }
}
