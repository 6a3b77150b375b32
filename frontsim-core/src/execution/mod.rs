//! Tick-scheduled game actions.
//!
//! An [`Execution`] is constructed with its static parameters, admitted by the
//! scheduler through [`Execution::init`], then advanced once per tick through
//! [`Execution::tick`] until [`Execution::is_active`] returns false. Inactive
//! executions are dropped and never advanced again.
//!
//! Precondition failures are logged with `log::warn!` and resolved by
//! deactivating; nothing here returns an error to the scheduler.

mod actions;
mod bot;
mod donate;
mod mirv;
mod nation;
mod nuke;

pub use actions::{
    AllianceExtensionExecution, AllianceRequestExecution, AllianceRequestReplyExecution, AttackExecution,
    BreakAllianceExecution, ConstructionExecution, EmbargoAction, EmbargoExecution, EmojiExecution, SpawnExecution,
    TransportShipExecution,
};
pub use bot::BotExecution;
pub use donate::{gold_relation_delta, troop_relation_bonus, DonateGoldExecution, DonateTroopsExecution};
pub use mirv::{select_destinations, MirvExecution, MIRV_MIN_SPREAD, MIRV_RANGE, MIRV_WARHEADS};
pub use nation::{NationBehaviors, NationExecution, NationPhase};
pub use nuke::NukeExecution;

use crate::game::{Game, Tick};

/// A stateful action driven by the scheduler.
pub trait Execution {
    /// Called once when the scheduler admits the execution.
    fn init(&mut self, game: &mut dyn Game, ticks: Tick);

    /// One discrete step of work. Panics if called before `init`.
    fn tick(&mut self, game: &mut dyn Game, ticks: Tick);

    fn is_active(&self) -> bool;

    /// Whether the scheduler may run this during the spawn phase.
    fn active_during_spawn_phase(&self) -> bool;

    fn name(&self) -> &'static str;
}
