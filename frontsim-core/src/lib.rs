//! # frontsim core
//!
//! Deterministic execution and Nation AI engine for a tick-driven territorial
//! conquest game.
//!
//! Everything that happens in a match is an [`Execution`]: a donation, a
//! nuclear strike, or the whole brain of an AI Nation. The scheduler admits
//! executions, ticks them in registration order and drops them once they go
//! inactive. The world itself (tiles, combat, units) stays behind the
//! collaborator traits in [`game`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  enqueue   ┌────────────────┐  mutate   ┌─────────────┐
//! │ NationExec.  │──────────▶│  Executions    │─────────▶│  dyn Game   │
//! │ (behaviors)  │            │ (tick/init)    │           │ (world)     │
//! └──────┬───────┘            └────────────────┘           └──────┬──────┘
//!        │                         read                          │
//!        └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Execution`] | Lifecycle contract every action implements |
//! | [`NationExecution`] | One AI Nation: spawn, then a gated decision pipeline |
//! | [`MirvExecution`] | Multi-warhead strike state machine |
//! | [`DonateGoldExecution`] / [`DonateTroopsExecution`] | Transfers that buy goodwill |
//! | [`PseudoRandom`] | Seeded stream behind every random decision |
//! | [`Config`] | Game rules and difficulty tables |
//! | [`testing::SandboxGame`] | In-memory world with a scheduler, for tests and the driver |
//!
//! ## Determinism
//!
//! All randomness comes from per-entity [`PseudoRandom`] streams seeded from
//! stable identities (player ids, game id, tick). Nothing iterates a hash map
//! to make a decision. Replaying the same inputs yields the same world.

pub mod config;
pub mod execution;
pub mod game;
pub mod geometry;
pub mod nation;
pub mod random;
pub mod testing;

pub use config::{Config, Difficulty, GameConfig, GameMode, GameType};
pub use execution::{
    BotExecution, DonateGoldExecution, DonateTroopsExecution, Execution, MirvExecution, NationExecution,
    NukeExecution,
};
pub use game::{Game, GameMap, Owner, Player, PlayerId, PlayerInfo, PlayerKind, TileRef, Unit, UnitType};
pub use random::PseudoRandom;

#[cfg(test)]
#[path = "scenario_tests.rs"]
mod scenario_tests;
