//! Alliance diplomacy.
//!
//! One decision function answers both "accept this request?" and "send a
//! request?". It is a chain of gates that short-circuit on the first verdict;
//! the PRNG is only drawn by the gates actually reached, so the same inputs
//! and stream always walk the same path.

use super::emoji::{self, EmojiBehavior};
use super::AiContext;
use crate::config::Difficulty;
use crate::execution::{AllianceExtensionExecution, AllianceRequestExecution, AllianceRequestReplyExecution, BreakAllianceExecution};
use crate::game::{EmojiRecipient, PlayerId, PlayerKind, Relation};

#[derive(Debug, Default)]
pub struct AllianceBehavior;

impl AllianceBehavior {
    pub fn new() -> Self {
        Self
    }

    /// Answer every pending request addressed to us.
    pub fn handle_alliance_requests(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) {
        let requests = ctx.game.player(ctx.player).incoming_alliance_requests();
        for requestor in requests {
            let accept = self.get_alliance_decision(ctx, emoji, requestor, true);
            log::debug!("{:?} answers alliance request from {:?}: {}", ctx.player, requestor, accept);
            ctx.game.add_execution(Box::new(AllianceRequestReplyExecution::new(
                requestor, ctx.player, accept,
            )));
        }
    }

    /// Agree to extend alliances the other side already asked to extend.
    pub fn handle_alliance_extension_requests(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) {
        let alliances = ctx.game.player(ctx.player).alliances();
        for alliance in alliances {
            if !alliance.only_one_agreed_to_extend {
                continue;
            }
            if !self.get_alliance_decision(ctx, emoji, alliance.other, true) {
                continue;
            }
            ctx.game
                .add_execution(Box::new(AllianceExtensionExecution::new(ctx.player, alliance.other)));
        }
    }

    /// Court hostile neighbours. Only Easy Nations bother with bots.
    pub fn maybe_send_alliance_requests(
        &mut self,
        ctx: &mut AiContext<'_>,
        emoji: &mut EmojiBehavior,
        bordering_enemies: &[PlayerId],
    ) {
        let easy = ctx.difficulty() == Difficulty::Easy;
        for &enemy in bordering_enemies {
            if !ctx.random.chance(30) {
                continue;
            }
            let acceptable = easy || ctx.game.player(enemy).kind() != PlayerKind::Bot;
            if !acceptable || !ctx.game.can_send_alliance_request(ctx.player, enemy) {
                continue;
            }
            if self.get_alliance_decision(ctx, emoji, enemy, false) {
                ctx.game
                    .add_execution(Box::new(AllianceRequestExecution::new(ctx.player, enemy)));
            }
        }
    }

    /// Walk the ten gates for `other`.
    pub fn get_alliance_decision(
        &mut self,
        ctx: &mut AiContext<'_>,
        emoji: &mut EmojiBehavior,
        other: PlayerId,
        is_response: bool,
    ) -> bool {
        let to_other = EmojiRecipient::Player(other);

        if self.is_confused(ctx) {
            return ctx.random.chance(2);
        }
        if ctx.game.player(other).is_traitor() && ctx.random.next_int(0, 100) >= 10 {
            if is_response && ctx.random.chance(3) {
                emoji.send_emoji(ctx, to_other, emoji::CONFUSED);
            }
            return false;
        }
        if self.has_too_many_alliances(ctx, other) {
            return false;
        }
        if self.is_threat(ctx, other) {
            if !is_response && ctx.random.chance(6) {
                emoji.send_emoji(ctx, to_other, emoji::SCARED_OF_THREAT);
            }
            if is_response && ctx.random.chance(6) {
                emoji.send_emoji(ctx, to_other, emoji::LOVE);
            }
            return true;
        }
        if self.should_reject_in_team_game(ctx) {
            return false;
        }
        if ctx.game.player(ctx.player).relation(other) < Relation::Neutral {
            if is_response && ctx.random.chance(3) {
                emoji.send_emoji(ctx, to_other, emoji::CONFUSED);
            }
            return false;
        }
        if self.is_friendly_partner(ctx, other) {
            if ctx.random.chance(3) {
                emoji.send_emoji(ctx, to_other, emoji::HANDSHAKE);
            }
            return true;
        }
        if self.already_enough_alliances(ctx, other) {
            return false;
        }
        if self.is_early_game(ctx) {
            return true;
        }
        self.is_similarly_strong(ctx, other)
    }

    fn is_confused(&self, ctx: &mut AiContext<'_>) -> bool {
        match ctx.difficulty() {
            Difficulty::Easy => ctx.random.chance(10),
            Difficulty::Medium => ctx.random.chance(20),
            Difficulty::Hard => ctx.random.chance(40),
            Difficulty::Impossible => false,
        }
    }

    /// Keeps enough unallied players around to stop a runaway leader.
    fn has_too_many_alliances(&self, ctx: &AiContext<'_>, other: PlayerId) -> bool {
        match ctx.difficulty() {
            Difficulty::Easy | Difficulty::Medium => false,
            Difficulty::Hard | Difficulty::Impossible => {
                let total = ctx.game.players().len() as f64;
                ctx.game.player(other).alliances().len() as f64 >= total * 0.5
            }
        }
    }

    fn is_threat(&self, ctx: &AiContext<'_>, other: PlayerId) -> bool {
        let game = &*ctx.game;
        let (me, them) = (game.player(ctx.player), game.player(other));
        let (my_max, their_max) = (game.max_troops(ctx.player), game.max_troops(other));
        match ctx.difficulty() {
            Difficulty::Easy => false,
            Difficulty::Medium => them.troops() > me.troops() * 2.5,
            Difficulty::Hard => them.troops() > me.troops() && their_max > my_max * 2.0,
            Difficulty::Impossible => {
                let more_troops = them.troops() > me.troops() * 1.5;
                let stronger = them.troops() > me.troops();
                let more_max = stronger && their_max > my_max * 1.5;
                let more_tiles = stronger && them.num_tiles_owned() as f64 > me.num_tiles_owned() as f64 * 1.5;
                more_troops || more_max || more_tiles
            }
        }
    }

    fn should_reject_in_team_game(&self, ctx: &mut AiContext<'_>) -> bool {
        if !ctx.is_team_game() {
            return false;
        }
        match ctx.difficulty() {
            Difficulty::Easy => false,
            Difficulty::Medium => ctx.random.next_int(0, 100) < 20,
            Difficulty::Hard => ctx.random.next_int(0, 100) < 40,
            Difficulty::Impossible => ctx.random.next_int(0, 100) < 60,
        }
    }

    fn is_friendly_partner(&self, ctx: &mut AiContext<'_>, other: PlayerId) -> bool {
        let friendly = ctx.game.player(ctx.player).relation(other) == Relation::Friendly;
        match ctx.difficulty() {
            Difficulty::Easy | Difficulty::Medium => friendly,
            Difficulty::Hard => friendly && ctx.random.next_int(0, 100) >= 17,
            Difficulty::Impossible => friendly && ctx.random.next_int(0, 100) >= 33,
        }
    }

    fn already_enough_alliances(&self, ctx: &mut AiContext<'_>, other: PlayerId) -> bool {
        let alliances = ctx.game.player(ctx.player).alliances().len() as i64;
        match ctx.difficulty() {
            Difficulty::Easy => false,
            Difficulty::Medium => alliances >= ctx.random.next_int(5, 8),
            difficulty @ (Difficulty::Hard | Difficulty::Impossible) => {
                let game = &*ctx.game;
                let me = game.player(ctx.player);
                let bordering: Vec<PlayerId> = me
                    .neighbors()
                    .into_iter()
                    .filter(|&n| game.player(n).kind() != PlayerKind::Bot)
                    .collect();
                let friends = bordering.iter().filter(|&&n| me.is_friendly(game.player(n))).count();
                if bordering.len() >= 3 && bordering.contains(&other) {
                    return bordering.len() <= friends + 1;
                }
                if difficulty == Difficulty::Hard {
                    alliances >= ctx.random.next_int(3, 6)
                } else {
                    alliances >= ctx.random.next_int(2, 5)
                }
            }
        }
    }

    fn is_early_game(&self, ctx: &mut AiContext<'_>) -> bool {
        let spawn = ctx.game.config().num_spawn_phase_turns();
        let ticks = ctx.game.ticks();
        let (window, reject_below) = match ctx.difficulty() {
            Difficulty::Easy => (3000, 10),
            Difficulty::Medium => (1800, 30),
            Difficulty::Hard => (1800, 50),
            Difficulty::Impossible => (600, 70),
        };
        ticks < window + spawn && ctx.random.next_int(0, 100) >= reject_below
    }

    fn is_similarly_strong(&self, ctx: &mut AiContext<'_>, other: PlayerId) -> bool {
        let (lo, hi) = match ctx.difficulty() {
            Difficulty::Easy => (60, 70),
            Difficulty::Medium => (70, 80),
            Difficulty::Hard => (75, 85),
            Difficulty::Impossible => (80, 90),
        };
        let ratio = ctx.random.next_int(lo, hi) as f64 / 100.0;
        let game = &*ctx.game;
        game.player(other).troops() > game.player(ctx.player).troops() * ratio
    }

    /// Decide whether to stab `ally` in the back. Queues the break and returns
    /// true when betraying.
    pub fn maybe_betray(&mut self, ctx: &mut AiContext<'_>, ally: PlayerId, bordering_count: usize) -> bool {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        if !me.is_allied_with(ally) {
            return false;
        }
        let them = game.player(ally);
        let difficulty = ctx.difficulty();
        let smart = matches!(difficulty, Difficulty::Hard | Difficulty::Impossible);

        let collapsed = smart
            && them.troops() + them.outgoing_attack_troops() < game.max_troops(ally) * 0.2
            && them.troops() < me.troops();
        let crushed = !smart && me.troops() >= them.troops() * 10.0;
        let weak_traitor = difficulty != Difficulty::Easy && them.is_traitor() && them.troops() < me.troops() * 1.2;
        let sole_neighbour =
            difficulty != Difficulty::Easy && bordering_count == 1 && them.troops() * 3.0 < me.troops();

        if collapsed || crushed || weak_traitor || sole_neighbour {
            log::info!("{:?} betrays {:?}", ctx.player, ally);
            ctx.game
                .add_execution(Box::new(BreakAllianceExecution::new(ctx.player, ally)));
            return true;
        }
        false
    }
}
