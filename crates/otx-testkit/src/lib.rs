//! Test-only scaffolding shared across scenario tests: a deterministic paper
//! broker, a small end-to-end orchestrator wiring strategy/risk/execution
//! together, and outbox-recovery helpers for crash/restart scenarios.

mod recovery;

pub use recovery::{recover_outbox_against_broker, FakeBroker, OutboxEntry, RecoveryReport};

pub mod orchestrator;
pub mod paper_broker;

pub use orchestrator::{Orchestrator, OrchestratorBar, OrchestratorConfig, OrchestratorReport};
pub use paper_broker::PaperBroker as OrchestratorPaperBroker;
