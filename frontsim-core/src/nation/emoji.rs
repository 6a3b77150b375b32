//! Emoji tables and the Nation's chatter.
//!
//! Emojis are cosmetic but they are still decided with the Nation's PRNG, so
//! every client sends the same ones on the same ticks.

use super::{players_by_tiles, AiContext};
use crate::config::Difficulty;
use crate::execution::EmojiExecution;
use crate::game::{EmojiRecipient, Game, PlayerId, PlayerKind, Relation, Team, Tick};
use crate::random::PseudoRandom;
use rustc_hash::FxHashMap;

pub type EmojiTable = &'static [&'static str];

pub const ASSIST_ACCEPT: EmojiTable = &["👍", "🤝", "🎯"];
pub const ASSIST_RELATION_TOO_LOW: EmojiTable = &["🥱", "🤦‍♂️"];
pub const ASSIST_TARGET_ME: EmojiTable = &["🥺", "💀"];
pub const ASSIST_TARGET_ALLY: EmojiTable = &["🕊️", "👎"];
pub const AGGRESSIVE_ATTACK: EmojiTable = &["😈"];
pub const ATTACK: EmojiTable = &["😡"];
pub const WARSHIP_RETALIATION: EmojiTable = &["⛵"];
pub const NUKE: EmojiTable = &["☢️", "💥"];
pub const GOT_INSULTED: EmojiTable = &["🖕", "😡", "🤡", "😞", "😭"];
pub const LOVE: EmojiTable = &["❤️", "😊", "🥰"];
pub const CONFUSED: EmojiTable = &["❓", "🤡"];
pub const BRAG: EmojiTable = &["👑", "🥇", "💪"];
pub const CHARM_ALLIES: EmojiTable = &["🤝", "😇", "💪"];
pub const CLOWN: EmojiTable = &["🤡", "🤦‍♂️"];
pub const RAT: EmojiTable = &["🐀"];
pub const OVERWHELMED: EmojiTable = &["💀", "🆘", "😱", "🥺", "😭", "😞", "🫡", "👋"];
pub const CONGRATULATE: EmojiTable = &["👏"];
pub const SCARED_OF_THREAT: EmojiTable = &["🙏", "🥺"];
pub const BORED: EmojiTable = &["🥱"];
pub const HANDSHAKE: EmojiTable = &["🤝"];
pub const DONATION_OK: EmojiTable = &["👍"];
pub const DONATION_TOO_SMALL: EmojiTable = &["❓", "🥱"];

const INSULT: &str = "🖕";
const CLOWN_FACE: &str = "🤡";
const FRIENDLY_GESTURES: &[&str] = &["🕊️", "🏳️", "❤️", "🥰", "👏"];

/// Minimum ticks between rate-limited emojis to the same player.
const EMOJI_INTERVAL: Tick = 300;

/// Per-Nation emoji state.
#[derive(Debug, Default)]
pub struct EmojiBehavior {
    last_emoji_sent: FxHashMap<PlayerId, Tick>,
    game_over: bool,
}

impl EmojiBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flavour emojis, each behind its own dice roll.
    pub fn maybe_send_casual_emoji(&mut self, ctx: &mut AiContext<'_>) {
        self.check_overwhelmed_by_attacks(ctx);
        self.check_very_small_attack(ctx);
        self.congratulate_winner(ctx);
        self.brag(ctx);
        self.charm_allies(ctx);
        self.annoy_traitors(ctx);
        self.find_rat(ctx);
    }

    fn check_overwhelmed_by_attacks(&mut self, ctx: &mut AiContext<'_>) {
        if !ctx.random.chance(16) {
            return;
        }
        let me = ctx.game.player(ctx.player);
        let incoming = me.incoming_attacks();
        if incoming.is_empty() {
            return;
        }
        if me.incoming_attack_troops() >= me.troops() * 3.0 {
            self.send_emoji(ctx, EmojiRecipient::AllPlayers, OVERWHELMED);
        }
    }

    fn check_very_small_attack(&mut self, ctx: &mut AiContext<'_>) {
        if !ctx.random.chance(8) {
            return;
        }
        let me = ctx.game.player(ctx.player);
        let ours = me.troops();
        if ours <= 0.0 {
            return;
        }
        let small: Vec<PlayerId> = me
            .incoming_attacks()
            .iter()
            .filter(|a| ctx.game.player(a.attacker).kind() == PlayerKind::Human && a.troops < ours * 0.1)
            .map(|a| a.attacker)
            .collect();
        for attacker in small {
            let table = if ctx.random.chance(2) { CONFUSED } else { BORED };
            self.maybe_send_emoji(ctx, EmojiRecipient::Player(attacker), table);
        }
    }

    fn congratulate_winner(&mut self, ctx: &mut AiContext<'_>) {
        if self.game_over {
            return;
        }
        let game = &*ctx.game;
        let percent_to_win = game.config().percentage_tiles_owned_to_win();
        let land = (game.num_land_tiles() - game.num_tiles_with_fallout()) as f64;

        if game.config().is_team_game() {
            let mut team_tiles: Vec<(Team, usize)> = Vec::new();
            for id in game.players() {
                let p = game.player(id);
                let Some(team) = p.team() else { continue };
                match team_tiles.iter_mut().find(|(t, _)| *t == team) {
                    Some((_, n)) => *n += p.num_tiles_owned(),
                    None => team_tiles.push((team, p.num_tiles_owned())),
                }
            }
            team_tiles.sort_by_key(|&(_, n)| std::cmp::Reverse(n));
            let Some(&(winning_team, tiles)) = team_tiles.first() else {
                return;
            };
            if (tiles as f64 / land) * 100.0 < percent_to_win {
                return;
            }
            self.game_over = true;
            if Some(winning_team) == game.player(ctx.player).team() {
                return;
            }
            self.send_emoji(ctx, EmojiRecipient::AllPlayers, CONGRATULATE);
        } else {
            let sorted = players_by_tiles(game);
            let Some(&first) = sorted.first() else { return };
            if (game.player(first).num_tiles_owned() as f64 / land) * 100.0 < percent_to_win {
                return;
            }
            self.game_over = true;
            if game.player(first).kind() != PlayerKind::Human {
                return;
            }
            let largest_nation = sorted
                .iter()
                .copied()
                .find(|&p| game.player(p).kind() == PlayerKind::Nation);
            if largest_nation != Some(ctx.player) {
                return;
            }
            log::info!("{:?} congratulates {:?}", ctx.player, first);
            self.send_emoji(ctx, EmojiRecipient::Player(first), CONGRATULATE);
        }
    }

    fn brag(&mut self, ctx: &mut AiContext<'_>) {
        if self.game_over || !ctx.random.chance(300) {
            return;
        }
        if players_by_tiles(&*ctx.game).first() == Some(&ctx.player) {
            self.send_emoji(ctx, EmojiRecipient::AllPlayers, BRAG);
        }
    }

    fn charm_allies(&mut self, ctx: &mut AiContext<'_>) {
        if !ctx.random.chance(250) {
            return;
        }
        let game = &*ctx.game;
        let human_allies: Vec<PlayerId> = game
            .player(ctx.player)
            .allies()
            .into_iter()
            .filter(|&p| game.player(p).kind() == PlayerKind::Human)
            .collect();
        let Some(&ally) = ctx.random.rand_element(&human_allies) else {
            return;
        };
        let table = if ctx.random.chance(3) { LOVE } else { CHARM_ALLIES };
        self.send_emoji(ctx, EmojiRecipient::Player(ally), table);
    }

    fn annoy_traitors(&mut self, ctx: &mut AiContext<'_>) {
        if !ctx.random.chance(40) {
            return;
        }
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let traitors: Vec<PlayerId> = game
            .players()
            .into_iter()
            .filter(|&id| {
                let p = game.player(id);
                p.kind() == PlayerKind::Human && !p.is_friendly(me) && p.is_traitor()
            })
            .collect();
        if let Some(&traitor) = ctx.random.rand_element(&traitors) {
            self.send_emoji(ctx, EmojiRecipient::Player(traitor), CLOWN);
        }
    }

    fn find_rat(&mut self, ctx: &mut AiContext<'_>) {
        if ctx.game.ticks() < 6000 || !ctx.random.chance(10_000) {
            return;
        }
        let game = &*ctx.game;
        let threshold = game.num_land_tiles() as f64 * 0.01;
        let small: Vec<PlayerId> = game
            .players()
            .into_iter()
            .filter(|&id| {
                let p = game.player(id);
                let tiles = p.num_tiles_owned();
                p.kind() == PlayerKind::Human && (tiles as f64) < threshold && tiles > 0
            })
            .collect();
        if let Some(&rat) = ctx.random.rand_element(&small) {
            self.send_emoji(ctx, EmojiRecipient::Player(rat), RAT);
        }
    }

    /// Rate-limited send. Only humans ever receive these.
    pub fn maybe_send_emoji(&mut self, ctx: &mut AiContext<'_>, recipient: EmojiRecipient, table: EmojiTable) {
        if !self.should_send_emoji(ctx, recipient, true) {
            return;
        }
        self.send_emoji(ctx, recipient, table);
    }

    /// Aggressive face when attacking a friend, angry face when retaliating.
    pub fn maybe_send_attack_emoji(&mut self, ctx: &mut AiContext<'_>, target: PlayerId) {
        let recipient = EmojiRecipient::Player(target);
        if !self.should_send_emoji(ctx, recipient, true) {
            return;
        }
        if ctx.game.player(ctx.player).relation(target) >= Relation::Neutral {
            if ctx.random.chance(2) {
                self.send_emoji(ctx, recipient, AGGRESSIVE_ATTACK);
            }
        } else if ctx.random.chance(4) {
            self.send_emoji(ctx, recipient, ATTACK);
        }
    }

    pub fn send_emoji(&mut self, ctx: &mut AiContext<'_>, recipient: EmojiRecipient, table: EmojiTable) {
        if !self.should_send_emoji(ctx, recipient, false) {
            return;
        }
        if !ctx.game.can_send_emoji(ctx.player, recipient) {
            return;
        }
        if let Some(&emoji) = ctx.random.rand_element(table) {
            ctx.game
                .add_execution(Box::new(EmojiExecution::new(ctx.player, recipient, emoji)));
        }
    }

    fn should_send_emoji(&mut self, ctx: &AiContext<'_>, recipient: EmojiRecipient, limit_by_time: bool) -> bool {
        let EmojiRecipient::Player(other) = recipient else {
            return true;
        };
        if ctx.game.player(ctx.player).kind() == PlayerKind::Bot {
            return false;
        }
        if ctx.game.player(other).kind() != PlayerKind::Human {
            return false;
        }
        if limit_by_time {
            let now = ctx.game.ticks();
            if let Some(&last) = self.last_emoji_sent.get(&other) {
                if now.saturating_sub(last) <= EMOJI_INTERVAL {
                    return false;
                }
            }
            self.last_emoji_sent.insert(other, now);
        }
        true
    }
}

/// A Nation's reaction to an emoji it received.
///
/// Insults cost 100 relation, clowns cost 10, friendly gestures earn 15 on
/// Easy. Each gets a reply.
pub fn respond_to_emoji(
    game: &mut dyn Game,
    random: &mut PseudoRandom,
    sender: PlayerId,
    recipient: EmojiRecipient,
    emoji: &str,
) {
    let EmojiRecipient::Player(recipient) = recipient else {
        return;
    };
    if game.player(recipient).kind() != PlayerKind::Nation {
        return;
    }
    let reply_to = EmojiRecipient::Player(sender);
    if !game.can_send_emoji(recipient, reply_to) {
        return;
    }

    let reply = if emoji == INSULT {
        game.update_relation(recipient, sender, -100);
        random.rand_element(GOT_INSULTED)
    } else if emoji == CLOWN_FACE {
        game.update_relation(recipient, sender, -10);
        random.rand_element(CONFUSED)
    } else if FRIENDLY_GESTURES.contains(&emoji) {
        if game.config().difficulty() == Difficulty::Easy {
            game.update_relation(recipient, sender, 15);
        }
        if game.player(sender).relation(recipient) >= Relation::Neutral {
            random.rand_element(LOVE)
        } else {
            random.rand_element(CONFUSED)
        }
    } else {
        None
    };

    if let Some(&reply) = reply {
        game.add_execution(Box::new(EmojiExecution::new(recipient, reply_to, reply)));
    }
}

/// A player under a MIRV occasionally tells everyone how it feels about that.
pub fn respond_to_mirv(game: &mut dyn Game, random: &mut PseudoRandom, target: PlayerId) {
    if !random.chance(8) {
        return;
    }
    if !game.can_send_emoji(target, EmojiRecipient::AllPlayers) {
        return;
    }
    if let Some(&emoji) = random.rand_element(OVERWHELMED) {
        game.add_execution(Box::new(EmojiExecution::new(target, EmojiRecipient::AllPlayers, emoji)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::PlayerInfo;
    use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

    fn village(difficulty: Difficulty) -> SandboxGame {
        GameBuilder::new()
            .with_map(SandboxMap::land(30, 10))
            .with_config(GameConfig {
                difficulty,
                ..Default::default()
            })
            .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation))
            .with_player(PlayerInfo::new("h", "Human", PlayerKind::Human))
            .with_player(PlayerInfo::new("b", "Bot", PlayerKind::Bot))
            .with_square(PlayerId(0), 0, 0, 10)
            .with_square(PlayerId(1), 10, 0, 10)
            .with_square(PlayerId(2), 20, 0, 10)
            .at_tick(1_000)
            .build()
    }

    /// Emojis the Nation sent once everything queued has run.
    fn replies(game: &mut SandboxGame) -> Vec<String> {
        game.run(2);
        game.emoji_log()
            .iter()
            .filter(|e| e.sender == PlayerId(0))
            .map(|e| e.emoji.clone())
            .collect()
    }

    fn receive(game: &mut SandboxGame, emoji: &str) {
        let mut random = PseudoRandom::new(1);
        respond_to_emoji(game, &mut random, PlayerId(1), EmojiRecipient::Player(PlayerId(0)), emoji);
    }

    fn relation(game: &SandboxGame) -> i32 {
        game.sandbox_player(PlayerId(0)).relation_score(PlayerId(1))
    }

    #[test]
    fn insults_hurt_and_get_an_answer() {
        let mut game = village(Difficulty::Medium);
        receive(&mut game, INSULT);
        assert_eq!(relation(&game), -100);
        let sent = replies(&mut game);
        assert_eq!(sent.len(), 1);
        assert!(GOT_INSULTED.contains(&sent[0].as_str()));
    }

    #[test]
    fn clowns_are_confusing() {
        let mut game = village(Difficulty::Medium);
        receive(&mut game, CLOWN_FACE);
        assert_eq!(relation(&game), -10);
        assert!(CONFUSED.contains(&replies(&mut game)[0].as_str()));
    }

    #[test]
    fn only_easy_nations_are_won_over_by_gestures() {
        let mut easy = village(Difficulty::Easy);
        receive(&mut easy, "🕊️");
        assert_eq!(relation(&easy), 15);
        assert!(LOVE.contains(&replies(&mut easy)[0].as_str()));

        let mut hard = village(Difficulty::Hard);
        receive(&mut hard, "🕊️");
        assert_eq!(relation(&hard), 0);
        assert_eq!(replies(&mut hard).len(), 1);
    }

    #[test]
    fn other_emojis_are_ignored() {
        let mut game = village(Difficulty::Easy);
        receive(&mut game, "🍕");
        assert_eq!(relation(&game), 0);
        assert!(replies(&mut game).is_empty());
    }

    #[test]
    fn bots_do_not_take_offence() {
        let mut game = village(Difficulty::Medium);
        let mut random = PseudoRandom::new(1);
        respond_to_emoji(&mut game, &mut random, PlayerId(1), EmojiRecipient::Player(PlayerId(2)), INSULT);
        assert_eq!(game.sandbox_player(PlayerId(2)).relation_score(PlayerId(1)), 0);
        game.run(2);
        assert!(game.emoji_log().is_empty());
    }

    #[test]
    fn chatter_is_rate_limited_per_player() {
        let mut game = village(Difficulty::Medium);
        let mut random = PseudoRandom::new(1);
        let mut behavior = EmojiBehavior::new();
        let to_human = EmojiRecipient::Player(PlayerId(1));
        {
            let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
            behavior.maybe_send_emoji(&mut ctx, to_human, HANDSHAKE);
            behavior.maybe_send_emoji(&mut ctx, to_human, HANDSHAKE);
        }
        assert_eq!(replies(&mut game).len(), 1);

        game.set_ticks(game.ticks() + EMOJI_INTERVAL + 1);
        {
            let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
            behavior.maybe_send_emoji(&mut ctx, to_human, HANDSHAKE);
        }
        assert_eq!(replies(&mut game).len(), 2);
    }

    #[test]
    fn only_humans_hear_from_nations() {
        let mut game = village(Difficulty::Medium);
        let mut random = PseudoRandom::new(1);
        let mut behavior = EmojiBehavior::new();
        {
            let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
            behavior.send_emoji(&mut ctx, EmojiRecipient::Player(PlayerId(2)), HANDSHAKE);
        }
        assert!(replies(&mut game).is_empty());
    }

    #[test]
    fn mirv_targets_complain_to_everyone() {
        let mut game = village(Difficulty::Medium);
        assert_eq!(game.player(PlayerId(1)).kind(), PlayerKind::Human);
        for seed in 0..64 {
            respond_to_mirv(&mut game, &mut PseudoRandom::new(seed), PlayerId(1));
        }
        game.run(2);
        // Only the first queued complaint gets past the world's cooldown.
        let sent: Vec<_> = game.emoji_log().iter().filter(|e| e.sender == PlayerId(1)).collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, EmojiRecipient::AllPlayers);
        assert!(OVERWHELMED.contains(&sent[0].emoji.as_str()));
    }

    #[test]
    fn tables_are_never_empty() {
        let tables = [
            ASSIST_ACCEPT,
            ASSIST_RELATION_TOO_LOW,
            ASSIST_TARGET_ME,
            ASSIST_TARGET_ALLY,
            AGGRESSIVE_ATTACK,
            ATTACK,
            WARSHIP_RETALIATION,
            NUKE,
            GOT_INSULTED,
            LOVE,
            CONFUSED,
            BRAG,
            CHARM_ALLIES,
            CLOWN,
            RAT,
            OVERWHELMED,
            CONGRATULATE,
            SCARED_OF_THREAT,
            BORED,
            HANDSHAKE,
            DONATION_OK,
            DONATION_TOO_SMALL,
        ];
        assert!(tables.iter().all(|t| !t.is_empty()));
    }
}
