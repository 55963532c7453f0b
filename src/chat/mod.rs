//! The two-phase conversation core: collection, confirmation-gated
//! transition, and retrieval-augmented answering.

pub mod collect;
pub mod orchestrator;
pub mod prompts;
pub mod qa;
pub mod session;
pub mod state;

pub use collect::{CollectOutcome, CollectStage};
pub use orchestrator::{ConversationOrchestrator, TurnOutput};
pub use qa::QaStage;
pub use session::{SessionManager, SessionStatus};
pub use state::{ChatPhase, ConversationTurn, TurnRole};
