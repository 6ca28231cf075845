//! # Parley Collaboration Crate
//!
//! Stages a simulated multi-agent response as a timer-driven state machine:
//! `Closed → Solo → Tandem → Team → Closed`, with a rolling log of status
//! lines while the run is live. Observers read snapshots of the run and
//! never mutate it.
//!
//! ```rust
//! use parley_collaboration::{CollaborationScheduler, Phase};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scheduler = CollaborationScheduler::default();
//! let run = scheduler.start_processing().unwrap();
//! assert_eq!(run.phase, Phase::Solo);
//!
//! let stopped = scheduler.stop_processing();
//! assert_eq!(stopped.phase, Phase::Closed);
//! # }
//! ```

pub mod agents;
pub mod error;
pub mod run;
pub mod scheduler;

pub use agents::{Participant, PARTICIPANT_POOL};
pub use error::{CollaborationError, CollaborationResult};
pub use run::{CollaborationRun, InputState, Phase};
pub use scheduler::{CollaborationScheduler, CollaborationTiming};
