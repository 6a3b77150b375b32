//! Nation AI behavior modules.
//!
//! Each module owns its own cross-tick state and is constructed once per
//! Nation when it leaves the spawn phase. Collaborating modules are passed in
//! by `&mut` at the call site rather than stored, so the orchestrating
//! [`NationExecution`](crate::execution::NationExecution) remains the sole
//! owner of all of them.
//!
//! | Module | Decides |
//! |--------|---------|
//! | [`emoji`] | chatter, replies to emojis and MIRV impacts |
//! | [`alliance`] | accepting, requesting, extending and betraying alliances |
//! | [`mirv`] | counter-strikes, victory denial, steamroll stops |
//! | [`nuke`] | atom and hydrogen bomb targeting |
//! | [`warship`] | retaliation for lost ships and fleet counter-measures |
//! | [`attack`] | land and naval attacks, shared with bots |
//! | [`structures`] | where and what to build |

pub mod alliance;
pub mod attack;
pub mod emoji;
pub mod mirv;
pub mod nuke;
pub mod structures;
pub mod warship;

pub use alliance::AllianceBehavior;
pub use attack::AttackBehavior;
pub use emoji::{respond_to_emoji, respond_to_mirv, EmojiBehavior};
pub use mirv::MirvBehavior;
pub use nuke::NukeBehavior;
pub use structures::StructureBehavior;
pub use warship::WarshipBehavior;

use crate::config::Difficulty;
use crate::game::{Game, PlayerId};
use crate::random::PseudoRandom;
use std::cmp::Reverse;

/// What a behavior needs to make a decision: the world, the owning Nation's
/// random stream and whose behalf it acts on.
pub struct AiContext<'a> {
    pub game: &'a mut dyn Game,
    pub random: &'a mut PseudoRandom,
    pub player: PlayerId,
}

impl<'a> AiContext<'a> {
    pub fn new(game: &'a mut dyn Game, random: &'a mut PseudoRandom, player: PlayerId) -> Self {
        Self { game, random, player }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.game.config().difficulty()
    }

    pub fn is_team_game(&self) -> bool {
        self.game.config().is_team_game()
    }
}

/// Alive players, most tiles first. Ties keep registration order.
pub(crate) fn players_by_tiles(game: &dyn Game) -> Vec<PlayerId> {
    let mut players = game.players();
    players.sort_by_key(|&p| Reverse(game.player(p).num_tiles_owned()));
    players
}

/// Land that can still be held: total land minus irradiated tiles.
pub(crate) fn land_without_fallout(game: &dyn Game) -> usize {
    game.num_land_tiles().saturating_sub(game.num_tiles_with_fallout())
}
