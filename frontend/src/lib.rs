//! Client-side reward reveal engine.
//!
//! A turn flows through four pieces: the [`guard::TurnGuard`] admits it, the
//! [`client::OutcomeClient`] fetches the authoritative outcome, a mapper turns
//! that outcome into a presentation target and the
//! [`sequencer::RevealSequencer`] times the visible reveal. Afterwards the
//! [`reconciler::SessionReconciler`] refreshes budget and totals from the
//! authority. [`games`] wires these together for the wheel and card variants.

pub mod client;
pub mod config;
pub mod error;
pub mod games;
pub mod guard;
pub mod mapper;
pub mod reconciler;
pub mod sequencer;
pub mod store;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use client::{HttpOutcomeClient, OutcomeClient};
pub use config::EngineConfig;
pub use error::{ClientError, Rejection, Result, RevealError};
pub use games::{CardGame, TurnReport, WheelGame};
pub use sequencer::{Easing, Phase, PhaseDescriptor, Target};
