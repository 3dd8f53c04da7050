//! SimulatedQueue - ランダムな遅延と結果を返すテスト用 Queue
//!
//! Stands in for a real broker during development. Each poll sleeps for a
//! random time (capped by the poll timeout) and then draws one of the four
//! poll outcomes according to [`OutcomeWeights`]. Messages are one of the
//! three fixture events.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::domain::codec::encode_envelope;
use crate::ports::{PollOutcome, Queue};
use crate::typed::event::{AccountCreated, Event, UserAdded, UserDeleted};

pub const TRANSIENT_REASON: &str = "Polling error. At lunch, please try again later";
pub const FATAL_REASON: &str =
    "Encountered an unexpected error. Probably Mas Hachnasa got me this time.";

const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(2000);
const ENVELOPE_VERSION: &str = "1.0";

/// Relative weights of the four poll outcomes.
///
/// The default mirrors the reference fixture: six equally likely draws, three
/// of which are messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutcomeWeights {
    pub message: u32,
    pub empty: u32,
    pub transient: u32,
    pub fatal: u32,
}

impl Default for OutcomeWeights {
    fn default() -> Self {
        Self {
            message: 3,
            empty: 1,
            transient: 1,
            fatal: 1,
        }
    }
}

impl OutcomeWeights {
    pub fn only_messages() -> Self {
        Self {
            message: 1,
            empty: 0,
            transient: 0,
            fatal: 0,
        }
    }

    fn as_array(&self) -> [u32; 4] {
        [self.message, self.empty, self.transient, self.fatal]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid outcome weights {0:?}: at least one weight must be non-zero")]
    InvalidWeights(OutcomeWeights),
}

pub struct SimulatedQueue {
    rng: Mutex<StdRng>,
    weights: OutcomeWeights,
    dist: WeightedIndex<u32>,
    max_delay: Duration,
}

impl SimulatedQueue {
    /// Default weights, entropy-seeded.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic sequence of outcomes and delays.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        let weights = OutcomeWeights::default();
        Self {
            rng: Mutex::new(rng),
            dist: WeightedIndex::new(weights.as_array())
                .unwrap_or_else(|_| unreachable!("default weights are non-zero")),
            weights,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_weights(mut self, weights: OutcomeWeights) -> Result<Self, SimulationError> {
        self.dist = WeightedIndex::new(weights.as_array())
            .map_err(|_| SimulationError::InvalidWeights(weights))?;
        self.weights = weights;
        Ok(self)
    }

    /// Upper bound of the simulated wait. The wait is also capped by the poll timeout.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn weights(&self) -> OutcomeWeights {
        self.weights
    }

    fn draw(&self, rng: &mut StdRng) -> PollOutcome {
        match self.dist.sample(&mut *rng) {
            0 => random_message(rng),
            1 => PollOutcome::Empty,
            2 => PollOutcome::TransientFailure(TRANSIENT_REASON.to_string()),
            _ => PollOutcome::FatalFailure(FATAL_REASON.to_string()),
        }
    }
}

impl Default for SimulatedQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn random_message(rng: &mut StdRng) -> PollOutcome {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let envelope = match rng.gen_range(0..3) {
        0 => AccountCreated {
            id: rng.gen_range(1000..=9999),
        }
        .into_envelope(ENVELOPE_VERSION, &timestamp),
        1 => UserAdded {
            username: format!("user_{}", rng.gen_range(1..=100)),
        }
        .into_envelope(ENVELOPE_VERSION, &timestamp),
        _ => UserDeleted {
            username: format!("user_{}", rng.gen_range(1..=100)),
        }
        .into_envelope(ENVELOPE_VERSION, &timestamp),
    };

    match envelope.and_then(|env| encode_envelope(&env)) {
        Ok(bytes) => PollOutcome::Message(bytes),
        Err(e) => PollOutcome::FatalFailure(format!("encode simulated event: {e}")),
    }
}

/// Upper bound of the simulated delay in millis. Saturates at `u64::MAX`.
fn delay_cap_ms(max_delay: Duration, timeout: Duration) -> u64 {
    u64::try_from(max_delay.min(timeout).as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl Queue for SimulatedQueue {
    async fn poll(&self, timeout: Duration) -> PollOutcome {
        // rng の lock は await を跨がない
        let (delay, outcome) = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let cap = delay_cap_ms(self.max_delay, timeout);
            let delay = Duration::from_millis(rng.gen_range(0..=cap));
            (delay, self.draw(&mut rng))
        };
        tokio::time::sleep(delay).await;
        outcome
    }
}
