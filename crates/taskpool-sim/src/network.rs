use serde::{Deserialize, Serialize};

use crate::rng::DeterministicRng;

/// Fault injection for simulated response delivery.
///
/// Nothing is dropped: the engine has no request timeouts, so a lost reply
/// would leave its slot loading forever and prove nothing about ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Maximum delivery delay in rounds.
    pub max_delay_rounds: u8,
    /// Percentage of replies delivered twice.
    pub duplicate_rate_percent: u8,
    /// Percentage chance of shuffling the replies ready in one round.
    pub reorder_rate_percent: u8,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            max_delay_rounds: 4,
            duplicate_rate_percent: 5,
            reorder_rate_percent: 30,
        }
    }
}

impl FaultConfig {
    /// In-order, exactly-once, next-round delivery.
    #[must_use]
    pub const fn reliable() -> Self {
        Self {
            max_delay_rounds: 0,
            duplicate_rate_percent: 0,
            reorder_rate_percent: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending<M> {
    deliver_at_round: u64,
    message: M,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    pub duplicated: bool,
    pub delay_rounds: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverOutcome<M> {
    pub delivered: Vec<M>,
    /// Whether the ready batch was shuffled.
    pub reordered: bool,
}

/// Deterministic delay/duplicate/reorder queue between host and backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedNetwork<M> {
    pending: Vec<Pending<M>>,
    fault: FaultConfig,
}

impl<M: Clone> SimulatedNetwork<M> {
    #[must_use]
    pub const fn new(fault: FaultConfig) -> Self {
        Self {
            pending: Vec::new(),
            fault,
        }
    }

    #[must_use]
    pub const fn fault_config(&self) -> FaultConfig {
        self.fault
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue a reply; it becomes ready between one and `max_delay + 1`
    /// rounds later. A duplicate lands no earlier than the original.
    pub fn send(&mut self, message: M, round: u64, rng: &mut DeterministicRng) -> SendOutcome {
        let delay_bound = u64::from(self.fault.max_delay_rounds).saturating_add(1);
        let delay = u8::try_from(rng.next_bounded(delay_bound)).unwrap_or(self.fault.max_delay_rounds);
        let deliver_at_round = round.saturating_add(1).saturating_add(u64::from(delay));

        let duplicated = rng.hit_rate_percent(self.fault.duplicate_rate_percent);
        if duplicated {
            let lag = rng.next_bounded(delay_bound);
            self.pending.push(Pending {
                deliver_at_round: deliver_at_round.saturating_add(lag),
                message: message.clone(),
            });
        }
        self.pending.push(Pending {
            deliver_at_round,
            message,
        });

        SendOutcome {
            duplicated,
            delay_rounds: delay,
        }
    }

    /// Take every reply whose round has come, in send order unless the
    /// reorder fault shuffles them.
    pub fn deliver_ready(&mut self, round: u64, rng: &mut DeterministicRng) -> DeliverOutcome<M> {
        let (ready, future): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.deliver_at_round <= round);
        self.pending = future;

        let mut delivered: Vec<M> = ready.into_iter().map(|pending| pending.message).collect();
        let reordered = delivered.len() > 1 && rng.hit_rate_percent(self.fault.reorder_rate_percent);
        if reordered {
            for i in (1..delivered.len()).rev() {
                let bound = u64::try_from(i + 1).unwrap_or(u64::MAX);
                let j = usize::try_from(rng.next_bounded(bound)).unwrap_or(0);
                delivered.swap(i, j);
            }
        }

        DeliverOutcome {
            delivered,
            reordered,
        }
    }
}
