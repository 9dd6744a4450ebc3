//! Rate limiter — three simultaneous rolling budgets guarding the bus.
//!
//! Admission requires all of: the global per-second budget, the entity's
//! per-second budget, and the entity's cooldown since its last admitted
//! send. The test-and-update runs as a single critical section so it is
//! atomic with respect to concurrent senders; it never suspends.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rvcbridge_domain::error::ErrorCode;

/// The rolling window every rate budget is measured over.
const WINDOW: Duration = Duration::from_secs(1);

/// Why a command was not admitted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimitError {
    /// The process-wide budget is exhausted.
    #[error("global rate limit exceeded ({limit} commands/sec)")]
    GlobalRate { limit: usize },

    /// The entity's own budget is exhausted.
    #[error("entity rate limit exceeded ({limit} commands/sec)")]
    EntityRate { limit: usize },

    /// The entity's cooldown has not elapsed.
    #[error("entity cooldown active ({remaining_ms} ms remaining)")]
    Cooldown { remaining_ms: u64 },
}

impl RateLimitError {
    /// The stable feedback code for this rejection.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::GlobalRate { .. } | Self::EntityRate { .. } => ErrorCode::RateExceeded,
            Self::Cooldown { .. } => ErrorCode::CooldownActive,
        }
    }
}

#[derive(Debug, Default)]
struct EntityState {
    recent: VecDeque<Instant>,
    last_admitted: Option<Instant>,
}

#[derive(Debug, Default)]
struct State {
    global: VecDeque<Instant>,
    entities: HashMap<String, EntityState>,
}

/// The three-budget rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    global_rate: usize,
    entity_rate: usize,
    cooldown: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    /// Create a limiter with the given budgets. A cooldown of zero
    /// disables the cooldown test.
    #[must_use]
    pub fn new(global_rate: usize, entity_rate: usize, cooldown: Duration) -> Self {
        Self {
            global_rate,
            entity_rate,
            cooldown,
            state: Mutex::new(State::default()),
        }
    }

    /// Admit or reject a send for `entity_id` happening now.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError`] when any of the three budgets rejects
    /// the command; state is only updated on admission.
    pub fn admit(&self, entity_id: &str) -> Result<(), RateLimitError> {
        self.admit_at(entity_id, Instant::now())
    }

    /// [`admit`](Self::admit) with an explicit clock, the deterministic
    /// entry point.
    ///
    /// # Errors
    ///
    /// See [`admit`](Self::admit).
    pub fn admit_at(&self, entity_id: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut state = self.state.lock().expect("rate limiter lock poisoned");

        prune(&mut state.global, now);
        if state.global.len() >= self.global_rate {
            return Err(RateLimitError::GlobalRate {
                limit: self.global_rate,
            });
        }

        let entity = state.entities.entry(entity_id.to_string()).or_default();
        prune(&mut entity.recent, now);
        if entity.recent.len() >= self.entity_rate {
            return Err(RateLimitError::EntityRate {
                limit: self.entity_rate,
            });
        }

        if !self.cooldown.is_zero() {
            if let Some(last) = entity.last_admitted {
                let elapsed = now.saturating_duration_since(last);
                if elapsed < self.cooldown {
                    let remaining = self.cooldown - elapsed;
                    return Err(RateLimitError::Cooldown {
                        remaining_ms: remaining.as_millis() as u64,
                    });
                }
            }
        }

        entity.recent.push_back(now);
        entity.last_admitted = Some(now);
        state.global.push_back(now);
        Ok(())
    }
}

/// Drop timestamps older than the rolling window.
fn prune(deque: &mut VecDeque<Instant>, now: Instant) {
    while let Some(&front) = deque.front() {
        if now.saturating_duration_since(front) >= WINDOW {
            deque.pop_front();
        } else {
            break;
        }
    }
}
