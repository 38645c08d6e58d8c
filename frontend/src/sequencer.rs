//! Reveal Sequencer: the timed phase machine behind a visible reveal.
//!
//! ```text
//! Idle -> Requesting -> Animating -> Settled -> [Revealing] -> Summarized -> Idle
//!            |                                                     (dismiss)
//!            +-> Idle (fetch failed)
//! ```
//!
//! Every phase change is published to subscribers as a [`PhaseDescriptor`].
//! The sequencer owns the only timers in the engine: one task per session
//! that sleeps through the remaining phases. Each step re-checks the session
//! id and the disposed flag under the lock before it applies, and
//! [`RevealSequencer::dispose`] aborts the task, so nothing fires after
//! teardown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use shared::TurnOutcome;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Result, RevealError};
use crate::guard::Admission;
use crate::store::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Requesting,
    Animating,
    Settled,
    Revealing,
    Summarized,
}

impl Phase {
    /// Active phases block new turns. `Summarized` is terminal.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Phase::Requesting | Phase::Animating | Phase::Settled | Phase::Revealing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Easing {
    Linear,
    /// `1 - (1 - t)^4`: fast start, long deceleration.
    EaseOut,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOut => 1.0 - (1.0 - t).powi(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Target {
    None,
    /// Wheel travel between two unwrapped angles.
    Rotation { from: f64, to: f64 },
    /// The chosen card and the reward printed on it.
    Slot { index: usize, reward: TurnOutcome },
    /// Unselected cards with their would-have-been rewards.
    Ghosts { slots: Vec<(usize, TurnOutcome)> },
    Summary { outcome: TurnOutcome },
}

/// What a presentation layer renders for one phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDescriptor {
    pub session: u64,
    pub phase: Phase,
    pub target: Target,
    pub progress_duration_ms: u64,
    pub easing: Easing,
}

impl PhaseDescriptor {
    /// Interpolated wheel angle `elapsed` into this phase.
    pub fn rotation_at(&self, elapsed: Duration) -> Option<f64> {
        match self.target {
            Target::Rotation { from, to } => {
                let t = if self.progress_duration_ms == 0 {
                    1.0
                } else {
                    elapsed.as_millis() as f64 / self.progress_duration_ms as f64
                };
                Some(from + (to - from) * self.easing.apply(t))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTimings {
    pub animate: Duration,
    pub easing: Easing,
    /// Settled -> Revealing, card draws only.
    pub ghost_delay: Duration,
    /// Settled (or Revealing) -> Summarized.
    pub summary_delay: Duration,
}

impl RevealTimings {
    pub fn wheel(spin: Duration, summary_delay: Duration) -> Self {
        Self {
            animate: spin,
            easing: Easing::EaseOut,
            ghost_delay: Duration::ZERO,
            summary_delay,
        }
    }

    pub fn cards(flip: Duration, ghost_delay: Duration, summary_delay: Duration) -> Self {
        Self {
            animate: flip,
            easing: Easing::Linear,
            ghost_delay,
            summary_delay,
        }
    }
}

/// The committed outcome and where it must be shown.
#[derive(Debug, Clone)]
pub enum RevealPlan {
    Wheel {
        outcome: TurnOutcome,
        from: f64,
        to: f64,
    },
    Cards {
        outcome: TurnOutcome,
        chosen_slot: usize,
        total_slots: usize,
        ghosts: Vec<(usize, TurnOutcome)>,
    },
}

impl RevealPlan {
    fn outcome(&self) -> &TurnOutcome {
        match self {
            RevealPlan::Wheel { outcome, .. } | RevealPlan::Cards { outcome, .. } => outcome,
        }
    }
}

/// Reveal Session State as seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session: u64,
    pub phase: Phase,
    pub rotation: f64,
    pub flipped: Vec<bool>,
    pub committed: Option<TurnOutcome>,
    pub disposed: bool,
}

#[derive(Debug)]
struct Step {
    delay: Duration,
    phase: Phase,
    target: Target,
    duration_ms: u64,
}

#[derive(Debug)]
struct SequencerState {
    session: u64,
    phase: Phase,
    rotation: f64,
    flipped: Vec<bool>,
    committed: Option<TurnOutcome>,
    disposed: bool,
    timer: Option<JoinHandle<()>>,
    admission: Option<Admission>,
    settled: Option<oneshot::Sender<()>>,
    listeners: Vec<mpsc::UnboundedSender<PhaseDescriptor>>,
    easing: Easing,
}

impl SequencerState {
    fn enter(&mut self, phase: Phase, target: Target, duration_ms: u64) {
        debug!(session = self.session, from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
        let descriptor = PhaseDescriptor {
            session: self.session,
            phase,
            target,
            progress_duration_ms: duration_ms,
            easing: self.easing,
        };
        self.listeners
            .retain(|listener| listener.send(descriptor.clone()).is_ok());
    }

    fn clear_session(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.admission = None;
        self.settled = None;
        self.committed = None;
        self.flipped.clear();
    }
}

#[derive(Debug, Clone)]
pub struct RevealSequencer {
    timings: RevealTimings,
    state: Arc<Mutex<SequencerState>>,
}

impl RevealSequencer {
    pub fn new(timings: RevealTimings) -> Self {
        Self::with_rotation(timings, 0.0)
    }

    /// A sequencer whose wheel already rests at `rotation` degrees.
    pub fn with_rotation(timings: RevealTimings, rotation: f64) -> Self {
        Self {
            timings,
            state: Arc::new(Mutex::new(SequencerState {
                session: 0,
                phase: Phase::Idle,
                rotation,
                flipped: Vec::new(),
                committed: None,
                disposed: false,
                timer: None,
                admission: None,
                settled: None,
                listeners: Vec::new(),
                easing: Easing::Linear,
            })),
        }
    }

    pub fn timings(&self) -> RevealTimings {
        self.timings
    }

    /// Receives every descriptor published from now on. The channel closes
    /// when the sequencer is disposed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PhaseDescriptor> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        if !state.disposed {
            state.listeners.push(tx);
        }
        rx
    }

    pub fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    /// Unwrapped angle the wheel currently rests at.
    pub fn resting_angle(&self) -> f64 {
        lock(&self.state).rotation
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.state).disposed
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = lock(&self.state);
        SessionSnapshot {
            session: state.session,
            phase: state.phase,
            rotation: state.rotation,
            flipped: state.flipped.clone(),
            committed: state.committed.clone(),
            disposed: state.disposed,
        }
    }

    /// Opens a new session in `Requesting`. Any finished session still
    /// showing its summary is reset.
    pub fn begin(&self) -> Result<u64> {
        let mut state = lock(&self.state);
        if state.disposed {
            return Err(RevealError::SessionDisposed);
        }
        if state.phase.is_active() {
            return Err(RevealError::AlreadyInProgress);
        }
        state.clear_session();
        state.session += 1;
        state.easing = Easing::Linear;
        state.enter(Phase::Requesting, Target::None, 0);
        Ok(state.session)
    }

    /// Abandons a session still in `Requesting`. No animation is started.
    pub fn fail(&self, session: u64) {
        let mut state = lock(&self.state);
        if state.disposed || state.session != session || state.phase != Phase::Requesting {
            return;
        }
        state.clear_session();
        state.enter(Phase::Idle, Target::None, 0);
    }

    /// Starts the reveal of a committed outcome. The sequencer holds the
    /// admission until the session is summarized or disposed. The returned
    /// receiver resolves when the reveal reaches `Settled`, and errors if the
    /// session is torn down first.
    pub fn play(
        &self,
        session: u64,
        plan: RevealPlan,
        admission: Admission,
    ) -> Result<oneshot::Receiver<()>> {
        let mut state = lock(&self.state);
        if state.disposed || state.session != session || state.phase != Phase::Requesting {
            return Err(RevealError::SessionDisposed);
        }

        let (settled_tx, settled_rx) = oneshot::channel();
        let timings = self.timings;
        let animate_ms = timings.animate.as_millis() as u64;
        let outcome = plan.outcome().clone();

        let (animating, mut steps) = match plan {
            RevealPlan::Wheel { from, to, .. } => {
                let steps = vec![Step {
                    delay: timings.animate,
                    phase: Phase::Settled,
                    target: Target::Rotation { from: to, to },
                    duration_ms: 0,
                }];
                (Target::Rotation { from, to }, steps)
            }
            RevealPlan::Cards { chosen_slot, total_slots, ghosts, outcome } => {
                state.flipped = vec![false; total_slots];
                let slot = Target::Slot { index: chosen_slot, reward: outcome };
                let mut steps = vec![Step {
                    delay: timings.animate,
                    phase: Phase::Settled,
                    target: slot.clone(),
                    duration_ms: 0,
                }];
                if !ghosts.is_empty() {
                    steps.push(Step {
                        delay: timings.ghost_delay,
                        phase: Phase::Revealing,
                        target: Target::Ghosts { slots: ghosts },
                        duration_ms: animate_ms,
                    });
                }
                (slot, steps)
            }
        };
        steps.push(Step {
            delay: timings.summary_delay,
            phase: Phase::Summarized,
            target: Target::Summary { outcome: outcome.clone() },
            duration_ms: 0,
        });

        info!(session, outcome_id = %outcome.outcome_id, reward = outcome.reward_amount, "reveal started");
        state.committed = Some(outcome);
        state.admission = Some(admission);
        state.settled = Some(settled_tx);
        state.easing = timings.easing;
        state.enter(Phase::Animating, animating, animate_ms);

        let shared = Arc::clone(&self.state);
        state.timer = Some(tokio::spawn(async move {
            for step in steps {
                tokio::time::sleep(step.delay).await;
                if !Self::advance(&shared, session, step) {
                    return;
                }
            }
        }));

        Ok(settled_rx)
    }

    fn advance(shared: &Mutex<SequencerState>, session: u64, step: Step) -> bool {
        let mut state = lock(shared);
        if state.disposed || state.session != session {
            return false;
        }
        match (&step.phase, &step.target) {
            (Phase::Settled, Target::Rotation { to, .. }) => state.rotation = *to,
            (Phase::Settled, Target::Slot { index, .. }) => {
                if let Some(flag) = state.flipped.get_mut(*index) {
                    *flag = true;
                }
            }
            (Phase::Revealing, _) => state.flipped.iter_mut().for_each(|flag| *flag = true),
            _ => {}
        }
        if step.phase == Phase::Settled {
            if let Some(settled) = state.settled.take() {
                let _ = settled.send(());
            }
        }
        if step.phase == Phase::Summarized {
            // ends the turn; the task finishes right after this step
            state.admission = None;
            state.timer = None;
        }
        if step.phase == Phase::Revealing {
            state.easing = Easing::Linear;
        }
        state.enter(step.phase, step.target, step.duration_ms);
        true
    }

    /// Closes the reward summary: `Summarized` -> `Idle`, clearing session
    /// state. Returns false in any other phase.
    pub fn dismiss(&self) -> bool {
        let mut state = lock(&self.state);
        if state.disposed || state.phase != Phase::Summarized {
            return false;
        }
        state.clear_session();
        state.enter(Phase::Idle, Target::None, 0);
        true
    }

    /// Tears the sequencer down. Pending timers are cancelled, the held
    /// admission is released and subscribers are disconnected; no further
    /// phase change is ever published.
    pub fn dispose(&self) {
        let mut state = lock(&self.state);
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.clear_session();
        state.listeners.clear();
        debug!(session = state.session, phase = ?state.phase, "sequencer disposed");
    }
}
