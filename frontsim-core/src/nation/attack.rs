//! Land and naval attacks.
//!
//! Shared by Nations and bots. A Nation walks a difficulty-ordered list of
//! [`AttackStrategy`] values every gated tick and stops at the first one that
//! commits troops; bots only use [`AttackBehavior::attack_random_target`].
//!
//! Sizing rules:
//!
//! | Target | Troops |
//! |--------|--------|
//! | player over land | everything above `max_troops * reserve_ratio` |
//! | unclaimed land | everything above `max_troops * expand_ratio` |
//! | bot (Nation attacker) | `bot_troops * 4`, capped by the above, 0 if the cap is below `bot_troops * 2` |
//! | over water | a fifth of current troops, same bot cap |

use super::alliance::AllianceBehavior;
use super::emoji::{self, EmojiBehavior};
use super::AiContext;
use crate::config::Difficulty;
use crate::execution::{AttackExecution, TransportShipExecution};
use crate::game::{EmojiRecipient, Owner, PlayerId, PlayerKind, Relation, TileRef};
use crate::geometry::{bounding_box, closest_two_tiles};
use std::cmp::Ordering;
use tracing::instrument;

/// One way of picking a target. Each returns true when it attacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackStrategy {
    /// Hit back at the largest incoming attacker.
    Retaliate,
    /// Attack bordering bots in parallel, thinnest first.
    Bots,
    /// Join an ally's war.
    Assist,
    /// Attack a bordering traitor that is not much stronger.
    Traitor,
    /// Attack a disconnected neighbour.
    Afk,
    /// Break an alliance with a weak ally and attack it.
    Betray,
    /// Reclaim irradiated no-man's-land.
    Nuked,
    /// Pile onto a weaker neighbour that is already under heavy attack.
    Victim,
    /// Attack the most hated player.
    Hated,
    /// Attack the weakest bordering enemy.
    Weakest,
    /// Cross water to the nearest enemy when nobody borders us.
    Island,
}

impl AttackStrategy {
    /// Easy Nations get the dumbest order, Impossible the smartest.
    pub fn order(difficulty: Difficulty) -> &'static [AttackStrategy] {
        use AttackStrategy::*;
        match difficulty {
            Difficulty::Easy => &[Nuked, Bots, Retaliate, Assist, Betray, Hated, Weakest],
            Difficulty::Medium => &[Bots, Nuked, Retaliate, Assist, Betray, Hated, Afk, Traitor, Weakest, Island],
            Difficulty::Hard => &[
                Bots, Retaliate, Assist, Betray, Nuked, Traitor, Afk, Hated, Victim, Weakest, Island,
            ],
            Difficulty::Impossible => &[
                Retaliate, Bots, Assist, Traitor, Afk, Betray, Nuked, Victim, Hated, Weakest, Island,
            ],
        }
    }
}

fn bot_attack_max_parallelism(ctx: &mut AiContext<'_>) -> usize {
    match ctx.difficulty() {
        Difficulty::Easy => 1,
        Difficulty::Medium => {
            if ctx.random.chance(2) {
                1
            } else {
                2
            }
        }
        Difficulty::Hard => 3,
        Difficulty::Impossible => 100,
    }
}

#[derive(Debug, Clone)]
pub struct AttackBehavior {
    trigger_ratio: f64,
    reserve_ratio: f64,
    expand_ratio: f64,
    /// Troops committed against bots during the current `Bots` strategy.
    bot_attack_troops_sent: f64,
}

impl AttackBehavior {
    pub fn new(trigger_ratio: f64, reserve_ratio: f64, expand_ratio: f64) -> Self {
        Self {
            trigger_ratio,
            reserve_ratio,
            expand_ratio,
            bot_attack_troops_sent: 0.0,
        }
    }

    fn troop_ratio(&self, ctx: &AiContext<'_>) -> f64 {
        let max = ctx.game.max_troops(ctx.player);
        if max <= 0.0 {
            return 0.0;
        }
        ctx.game.player(ctx.player).troops() / max
    }

    fn has_reserve_ratio_troops(&self, ctx: &AiContext<'_>) -> bool {
        self.troop_ratio(ctx) >= self.reserve_ratio
    }

    fn has_trigger_ratio_troops(&self, ctx: &AiContext<'_>) -> bool {
        self.troop_ratio(ctx) >= self.trigger_ratio
    }

    /// A Nation's main attack decision for a gated tick.
    #[instrument(skip_all, name = "maybe_attack")]
    pub fn maybe_attack(
        &mut self,
        ctx: &mut AiContext<'_>,
        alliance: &mut AllianceBehavior,
        emoji: &mut EmojiBehavior,
    ) {
        if self.borders_unclaimed_land(ctx) {
            self.send_attack(ctx, Some(&mut *emoji), Owner::TerraNullius, false);
            return;
        }

        let (friends, enemies) = self.bordering_players(ctx);
        if enemies.is_empty() {
            if ctx.random.chance(10) {
                self.send_random_boat_attack(ctx, emoji);
                return;
            }
        } else if ctx.random.chance(20) {
            alliance.maybe_send_alliance_requests(ctx, emoji, &enemies);
        }

        self.attack_best_target(ctx, alliance, emoji, &friends, &enemies);
    }

    /// Neighbouring players split into friendly and hostile, weakest first.
    fn bordering_players(&self, ctx: &AiContext<'_>) -> (Vec<PlayerId>, Vec<PlayerId>) {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let mut neighbors = me.neighbors();
        neighbors.sort_by(|&a, &b| {
            game.player(a)
                .troops()
                .partial_cmp(&game.player(b).troops())
                .unwrap_or(Ordering::Equal)
        });
        neighbors.into_iter().partition(|&n| me.is_friendly(game.player(n)))
    }

    pub fn borders_unclaimed_land(&self, ctx: &AiContext<'_>) -> bool {
        let game = &*ctx.game;
        game.player(ctx.player).border_tiles().iter().any(|&tile| {
            game.neighbors(tile)
                .into_iter()
                .any(|n| game.is_land(n) && !game.has_owner(n) && !game.has_fallout(n))
        })
    }

    /// `friends` and `enemies` must be sorted by ascending troops.
    pub fn attack_best_target(
        &mut self,
        ctx: &mut AiContext<'_>,
        alliance: &mut AllianceBehavior,
        emoji: &mut EmojiBehavior,
        friends: &[PlayerId],
        enemies: &[PlayerId],
    ) {
        if !self.has_reserve_ratio_troops(ctx) {
            return;
        }
        if !self.has_trigger_ratio_troops(ctx) && !ctx.random.chance(10) {
            return;
        }
        for &strategy in AttackStrategy::order(ctx.difficulty()) {
            if self.run_strategy(ctx, alliance, emoji, strategy, friends, enemies) {
                log::trace!("{:?} attacks via {:?}", ctx.player, strategy);
                return;
            }
        }
    }

    fn run_strategy(
        &mut self,
        ctx: &mut AiContext<'_>,
        alliance: &mut AllianceBehavior,
        emoji: &mut EmojiBehavior,
        strategy: AttackStrategy,
        friends: &[PlayerId],
        enemies: &[PlayerId],
    ) -> bool {
        let target = match strategy {
            AttackStrategy::Retaliate => match self.find_incoming_attack_player(ctx) {
                Some(attacker) => {
                    self.send_attack(ctx, Some(&mut *emoji), attacker.into(), true);
                    return true;
                }
                None => None,
            },
            AttackStrategy::Bots => return self.attack_bots(ctx, emoji),
            AttackStrategy::Assist => return self.assist_allies(ctx, emoji),
            AttackStrategy::Traitor => self.find_weakest_traitor(ctx, enemies),
            AttackStrategy::Afk => enemies
                .iter()
                .copied()
                .find(|&e| ctx.game.player(e).is_disconnected()),
            AttackStrategy::Betray => {
                let bordering = friends.len() + enemies.len();
                for &friend in friends {
                    if alliance.maybe_betray(ctx, friend, bordering) {
                        self.send_attack(ctx, Some(&mut *emoji), friend.into(), true);
                        return true;
                    }
                }
                None
            }
            AttackStrategy::Nuked => {
                if self.is_bordering_nuked_territory(ctx) {
                    self.send_attack(ctx, Some(&mut *emoji), Owner::TerraNullius, false);
                    return true;
                }
                None
            }
            AttackStrategy::Victim => self.find_weakest_victim(ctx, enemies),
            AttackStrategy::Hated => self.find_most_hated(ctx),
            AttackStrategy::Weakest => enemies.first().copied(),
            AttackStrategy::Island if enemies.is_empty() => self.find_nearest_island_enemy(ctx),
            AttackStrategy::Island => None,
        };
        match target {
            Some(target) => {
                self.send_attack(ctx, Some(&mut *emoji), target.into(), false);
                true
            }
            None => false,
        }
    }

    /// Largest incoming attacker. Non-bots ignore attacks from bots.
    pub fn find_incoming_attack_player(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let i_am_bot = me.kind() == PlayerKind::Bot;
        let mut largest: Option<(PlayerId, f64)> = None;
        for attack in me.incoming_attacks() {
            if !i_am_bot && game.player(attack.attacker).kind() == PlayerKind::Bot {
                continue;
            }
            if attack.troops <= largest.map_or(0.0, |(_, t)| t) {
                continue;
            }
            largest = Some((attack.attacker, attack.troops));
        }
        largest.map(|(p, _)| p)
    }

    /// Attack bordering bots in parallel, thinnest (troops per tile) first.
    fn attack_bots(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) -> bool {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let density = |p: PlayerId| {
            let player = game.player(p);
            player.troops() / player.num_tiles_owned().max(1) as f64
        };
        let mut bots: Vec<PlayerId> = me
            .neighbors()
            .into_iter()
            .filter(|&n| {
                let other = game.player(n);
                !me.is_friendly(other) && other.kind() == PlayerKind::Bot
            })
            .collect();
        if bots.is_empty() {
            return false;
        }
        bots.sort_by(|&a, &b| density(a).partial_cmp(&density(b)).unwrap_or(Ordering::Equal));

        self.bot_attack_troops_sent = 0.0;
        let parallelism = bot_attack_max_parallelism(ctx);
        for bot in bots.into_iter().take(parallelism) {
            self.send_attack(ctx, Some(&mut *emoji), bot.into(), false);
        }
        self.bot_attack_troops_sent > 0.0
    }

    fn assist_allies(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) -> bool {
        let allies = ctx.game.player(ctx.player).allies();
        for ally in allies {
            let targets = ctx.game.player(ally).targets();
            if targets.is_empty() {
                continue;
            }
            let to_ally = EmojiRecipient::Player(ally);
            if ctx.game.player(ctx.player).relation(ally) < Relation::Friendly {
                emoji.send_emoji(ctx, to_ally, emoji::ASSIST_RELATION_TOO_LOW);
                continue;
            }
            for target in targets {
                if target == ctx.player {
                    emoji.send_emoji(ctx, to_ally, emoji::ASSIST_TARGET_ME);
                    continue;
                }
                if ctx.game.is_friendly(ctx.player, target) {
                    emoji.send_emoji(ctx, to_ally, emoji::ASSIST_TARGET_ALLY);
                    continue;
                }
                // Helping out spends some goodwill.
                ctx.game.update_relation(ctx.player, ally, -20);
                self.send_attack(ctx, Some(&mut *emoji), target.into(), false);
                emoji.send_emoji(ctx, to_ally, emoji::ASSIST_ACCEPT);
                return true;
            }
        }
        false
    }

    /// First traitor with at most 20% more troops than us.
    fn find_weakest_traitor(&self, ctx: &AiContext<'_>, enemies: &[PlayerId]) -> Option<PlayerId> {
        let my_troops = ctx.game.player(ctx.player).troops();
        enemies.iter().copied().find(|&e| {
            let enemy = ctx.game.player(e);
            enemy.is_traitor() && enemy.troops() * 1.2 < my_troops
        })
    }

    /// First weaker enemy facing incoming attacks worth half its troops.
    fn find_weakest_victim(&self, ctx: &AiContext<'_>, enemies: &[PlayerId]) -> Option<PlayerId> {
        let my_troops = ctx.game.player(ctx.player).troops();
        enemies.iter().copied().find(|&e| {
            let enemy = ctx.game.player(e);
            enemy.troops() < my_troops && enemy.incoming_attack_troops() > enemy.troops() * 0.5
        })
    }

    fn find_most_hated(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        me.all_relations_sorted()
            .into_iter()
            .filter(|&(_, relation)| relation == Relation::Hostile)
            .map(|(p, _)| p)
            .find(|&p| game.has_player(p) && !me.is_friendly(game.player(p)))
    }

    fn is_bordering_nuked_territory(&self, ctx: &AiContext<'_>) -> bool {
        let game = &*ctx.game;
        game.player(ctx.player).border_tiles().iter().any(|&tile| {
            game.neighbors(tile)
                .into_iter()
                .any(|n| game.is_land(n) && !game.has_owner(n) && game.has_fallout(n))
        })
    }

    /// Nearest (sometimes second nearest) enemy we could reach by boat that
    /// is not more than twice our size.
    fn find_nearest_island_enemy(&self, ctx: &mut AiContext<'_>) -> Option<PlayerId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let my_center = bounding_box(game, me.border_tiles())?.center();
        let my_center = game.ref_at(my_center.x, my_center.y);

        let mut candidates: Vec<(PlayerId, u32)> = game
            .players()
            .into_iter()
            .filter(|&p| {
                let other = game.player(p);
                p != ctx.player
                    && other.is_alive()
                    && !other.border_tiles().is_empty()
                    && !me.is_friendly(other)
                    && other.troops() <= me.troops() * 2.0
            })
            .filter_map(|p| {
                let center = bounding_box(game, game.player(p).border_tiles())?.center();
                Some((p, game.manhattan_dist(my_center, game.ref_at(center.x, center.y))))
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by_key(|&(_, d)| d);
        // The runner-up sometimes, so boats don't keep meeting the same warship.
        if candidates.len() > 1 && ctx.random.chance(2) {
            return Some(candidates[1].0);
        }
        Some(candidates[0].0)
    }

    /// A bot's whole attack logic.
    pub fn attack_random_target(&mut self, ctx: &mut AiContext<'_>) {
        if !self.has_trigger_ratio_troops(ctx) {
            return;
        }
        if let Some(attacker) = self.find_incoming_attack_player(ctx) {
            self.send_attack(ctx, None, attacker.into(), true);
            return;
        }
        if let Some(traitor) = self.neighbor_traitor_to_attack(ctx) {
            if ctx.random.chance(3) {
                self.send_attack(ctx, None, traitor.into(), false);
                return;
            }
        }
        let mut neighbors = ctx.game.player(ctx.player).neighbors();
        ctx.random.shuffle(&mut neighbors);
        for neighbor in neighbors {
            if ctx.game.is_friendly(ctx.player, neighbor) {
                continue;
            }
            let kind = ctx.game.player(neighbor).kind();
            if matches!(kind, PlayerKind::Nation | PlayerKind::Human) && ctx.random.chance(2) {
                continue;
            }
            self.send_attack(ctx, None, neighbor.into(), false);
            return;
        }
    }

    pub fn neighbor_traitor_to_attack(&self, ctx: &mut AiContext<'_>) -> Option<PlayerId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let traitors: Vec<PlayerId> = me
            .neighbors()
            .into_iter()
            .filter(|&n| {
                let other = game.player(n);
                !me.is_friendly(other) && other.is_traitor()
            })
            .collect();
        ctx.random.rand_element(&traitors).copied()
    }

    /// Half of current troops at `target`, no questions asked.
    pub fn force_send_attack(&mut self, ctx: &mut AiContext<'_>, target: Owner) {
        let troops = ctx.game.player(ctx.player).troops() / 2.0;
        ctx.game
            .add_execution(Box::new(AttackExecution::new(ctx.player, target, troops)));
    }

    /// Attack over land when sharing a border, otherwise by boat.
    pub fn send_attack(&mut self, ctx: &mut AiContext<'_>, emoji: Option<&mut EmojiBehavior>, target: Owner, force: bool) {
        if !force && !self.should_attack(ctx, target) {
            return;
        }
        if ctx.game.player(ctx.player).shares_border_with(target) {
            self.send_land_attack(ctx, emoji, target);
        } else if let Owner::Player(target) = target {
            self.send_boat_attack(ctx, emoji, target);
        }
    }

    /// Easy and Medium Nations sometimes spare humans.
    pub fn should_attack(&self, ctx: &mut AiContext<'_>, target: Owner) -> bool {
        let Owner::Player(other) = target else {
            return true;
        };
        let game = &*ctx.game;
        let them = game.player(other);
        if them.kind() != PlayerKind::Human
            || them.is_traitor()
            || game.player(ctx.player).kind() == PlayerKind::Bot
        {
            return true;
        }
        match ctx.difficulty() {
            Difficulty::Easy => !ctx.random.chance(2),
            Difficulty::Medium => !ctx.random.chance(4),
            Difficulty::Hard | Difficulty::Impossible => true,
        }
    }

    fn send_land_attack(&mut self, ctx: &mut AiContext<'_>, emoji: Option<&mut EmojiBehavior>, target: Owner) {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let ratio = if target.is_player() { self.reserve_ratio } else { self.expand_ratio };
        let keep = game.max_troops(ctx.player) * ratio;

        let bot_target = target
            .player()
            .filter(|&p| game.player(p).kind() == PlayerKind::Bot && me.kind() != PlayerKind::Bot);
        let troops = match bot_target {
            Some(bot) => {
                let available = me.troops() - keep - self.bot_attack_troops_sent;
                self.calculate_bot_attack_troops(ctx, bot, available)
            }
            None => me.troops() - keep,
        };
        if troops < 1.0 {
            return;
        }
        self.announce_attack(ctx, emoji, target);
        log::debug!("{:?} attacks {:?} with {:.0} troops", ctx.player, target, troops);
        ctx.game
            .add_execution(Box::new(AttackExecution::new(ctx.player, target, troops)));
    }

    fn send_boat_attack(&mut self, ctx: &mut AiContext<'_>, emoji: Option<&mut EmojiBehavior>, target: PlayerId) {
        let game = &*ctx.game;
        let shore = |p: PlayerId| -> Vec<TileRef> {
            game.player(p)
                .border_tiles()
                .iter()
                .copied()
                .filter(|&t| game.is_ocean_shore(t))
                .collect()
        };
        let Some((_, dst)) = closest_two_tiles(game, &shore(ctx.player), &shore(target)) else {
            return;
        };
        let fifth = game.player(ctx.player).troops() / 5.0;
        let troops = if game.player(target).kind() == PlayerKind::Bot {
            self.calculate_bot_attack_troops(ctx, target, fifth)
        } else {
            fifth
        };
        if troops < 1.0 {
            return;
        }
        self.announce_attack(ctx, emoji, Owner::Player(target));
        log::debug!("{:?} ships {:.0} troops towards {:?}", ctx.player, troops, target);
        ctx.game.add_execution(Box::new(TransportShipExecution::new(
            ctx.player,
            Owner::Player(target),
            dst,
            troops,
            None,
        )));
    }

    /// Naval raid at a random reachable shore when nobody borders us.
    fn send_random_boat_attack(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) {
        let shore: Vec<TileRef> = {
            let game = &*ctx.game;
            game.player(ctx.player)
                .border_tiles()
                .iter()
                .copied()
                .filter(|&t| game.is_ocean_shore(t))
                .collect()
        };
        let Some(&src) = ctx.random.rand_element(&shore) else {
            return;
        };
        let Some(dst) = self.random_boat_target(ctx, src) else {
            return;
        };
        let target = ctx.game.owner(dst);
        if !self.should_attack(ctx, target) {
            return;
        }
        let troops = ctx.game.player(ctx.player).troops() / 5.0;
        if troops < 1.0 {
            return;
        }
        self.announce_attack(ctx, Some(emoji), target);
        ctx.game.add_execution(Box::new(TransportShipExecution::new(
            ctx.player,
            target,
            dst,
            troops,
            Some(src),
        )));
    }

    /// Foreign or unclaimed shore land within 150 tiles of `src`.
    fn random_boat_target(&self, ctx: &mut AiContext<'_>, src: TileRef) -> Option<TileRef> {
        const RADIUS: i64 = 150;
        let (cx, cy) = (ctx.game.x(src) as i64, ctx.game.y(src) as i64);
        for _ in 0..50 {
            let x = ctx.random.next_int(cx - RADIUS, cx + RADIUS) as i32;
            let y = ctx.random.next_int(cy - RADIUS, cy + RADIUS) as i32;
            if !ctx.game.is_valid_coord(x, y) {
                continue;
            }
            let tile = ctx.game.ref_at(x, y);
            if !ctx.game.is_ocean_shore(tile) {
                continue;
            }
            match ctx.game.owner(tile) {
                Owner::Player(p) if p == ctx.player || ctx.game.is_friendly(ctx.player, p) => continue,
                _ => return Some(tile),
            }
        }
        None
    }

    fn announce_attack(&self, ctx: &mut AiContext<'_>, emoji: Option<&mut EmojiBehavior>, target: Owner) {
        let (Some(emoji), Owner::Player(target)) = (emoji, target) else {
            return;
        };
        if ctx.game.player(ctx.player).kind() == PlayerKind::Nation {
            emoji.maybe_send_attack_emoji(ctx, target);
        }
    }

    /// Four times the bot's troops is enough to wipe it out.
    fn calculate_bot_attack_troops(&mut self, ctx: &AiContext<'_>, bot: PlayerId, max_troops: f64) -> f64 {
        if ctx.difficulty() == Difficulty::Easy {
            self.bot_attack_troops_sent += max_troops;
            return max_troops;
        }
        let bot_troops = ctx.game.player(bot).troops();
        let mut troops = bot_troops * 4.0;
        if troops > max_troops {
            troops = if max_troops < bot_troops * 2.0 { 0.0 } else { max_troops };
        }
        self.bot_attack_troops_sent += troops;
        troops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::{Game, PlayerInfo};
    use crate::random::PseudoRandom;
    use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

    /// Nation 0 in the middle, human 1 to the east, bot 2 to the west.
    fn frontier(difficulty: Difficulty) -> SandboxGame {
        let mut game = GameBuilder::new()
            .with_map(SandboxMap::land(60, 20))
            .with_config(GameConfig {
                difficulty,
                ..Default::default()
            })
            .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation))
            .with_player(PlayerInfo::new("h", "Human", PlayerKind::Human))
            .with_player(PlayerInfo::new("b", "Bot", PlayerKind::Bot))
            .with_square(PlayerId(0), 20, 0, 20)
            .with_square(PlayerId(1), 40, 0, 20)
            .with_square(PlayerId(2), 0, 0, 20)
            .with_troops(PlayerId(1), 200_000.0)
            .with_troops(PlayerId(2), 50_000.0)
            .at_tick(1_000)
            .build();
        let max = game.max_troops(PlayerId(0));
        game.set_troops(PlayerId(0), max);
        game
    }

    fn launch(game: &mut SandboxGame, attacker: PlayerId, target: PlayerId, troops: f64) {
        game.add_execution(Box::new(AttackExecution::new(attacker, target.into(), troops)));
        game.run(2);
    }

    #[test]
    fn retaliates_against_the_largest_attacker() {
        let mut game = frontier(Difficulty::Medium);
        launch(&mut game, PlayerId(1), PlayerId(0), 150_000.0);
        let mut random = PseudoRandom::new(0);
        let ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
        assert_eq!(AttackBehavior::new(0.5, 0.3, 0.1).find_incoming_attack_player(&ctx), Some(PlayerId(1)));
    }

    #[test]
    fn nations_shrug_off_bot_attacks() {
        let mut game = frontier(Difficulty::Medium);
        launch(&mut game, PlayerId(2), PlayerId(0), 40_000.0);
        let mut random = PseudoRandom::new(0);
        let ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
        assert_eq!(AttackBehavior::new(0.5, 0.3, 0.1).find_incoming_attack_player(&ctx), None);
    }

    #[test]
    fn bots_hit_back_at_anyone() {
        let mut game = frontier(Difficulty::Medium);
        launch(&mut game, PlayerId(0), PlayerId(2), 10_000.0);
        let mut random = PseudoRandom::new(0);
        let ctx = AiContext::new(&mut game, &mut random, PlayerId(2));
        assert_eq!(AttackBehavior::new(0.5, 0.3, 0.1).find_incoming_attack_player(&ctx), Some(PlayerId(0)));
    }

    #[test]
    fn hard_nations_never_spare_humans() {
        let mut game = frontier(Difficulty::Hard);
        let mut random = PseudoRandom::new(0);
        let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
        let behavior = AttackBehavior::new(0.5, 0.3, 0.1);
        assert!((0..100).all(|_| behavior.should_attack(&mut ctx, Owner::Player(PlayerId(1)))));
    }

    #[test]
    fn easy_nations_sometimes_spare_humans() {
        let mut game = frontier(Difficulty::Easy);
        let mut random = PseudoRandom::new(0);
        let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
        let behavior = AttackBehavior::new(0.5, 0.3, 0.1);
        let spared = (0..100)
            .filter(|_| !behavior.should_attack(&mut ctx, Owner::Player(PlayerId(1))))
            .count();
        assert!((20..80).contains(&spared), "spared {spared} of 100");
        assert!(behavior.should_attack(&mut ctx, Owner::Player(PlayerId(2))));
        assert!(behavior.should_attack(&mut ctx, Owner::TerraNullius));
    }

    #[test]
    fn expands_into_open_land_first() {
        let mut game = GameBuilder::new()
            .with_map(SandboxMap::land(40, 40))
            .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation))
            .with_square(PlayerId(0), 15, 15, 5)
            .at_tick(1_000)
            .build();
        let max = game.max_troops(PlayerId(0));
        game.set_troops(PlayerId(0), max);
        let before = game.player(PlayerId(0)).num_tiles_owned();
        let mut random = PseudoRandom::new(0);
        {
            let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
            assert!(AttackBehavior::new(0.5, 0.3, 0.1).borders_unclaimed_land(&ctx));
            AttackBehavior::new(0.5, 0.3, 0.1).maybe_attack(
                &mut ctx,
                &mut AllianceBehavior::new(),
                &mut EmojiBehavior::new(),
            );
        }
        game.run(20);
        assert!(game.player(PlayerId(0)).num_tiles_owned() > before);
    }

    #[test]
    fn bot_raids_are_sized_to_win() {
        let mut game = frontier(Difficulty::Medium);
        game.set_troops(PlayerId(2), 10_000.0);
        let troops_before = game.player(PlayerId(0)).troops();
        let mut random = PseudoRandom::new(0);
        {
            let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
            let mut behavior = AttackBehavior::new(0.5, 0.3, 0.1);
            behavior.send_attack(&mut ctx, None, Owner::Player(PlayerId(2)), false);
        }
        game.run(2);
        // Four times the bot's garrison, minus one round of fighting.
        let committed = game.player(PlayerId(0)).outgoing_attacks()[0].troops;
        assert!((39_000.0..=40_000.0).contains(&committed), "committed {committed}");
        assert!(game.player(PlayerId(0)).troops() < troops_before);
    }

    #[test]
    fn every_difficulty_has_a_strategy_order() {
        for d in Difficulty::ALL {
            let order = AttackStrategy::order(d);
            assert!(order.contains(&AttackStrategy::Retaliate));
            assert!(order.contains(&AttackStrategy::Weakest));
        }
    }

    #[test]
    fn only_impossible_retaliates_first() {
        assert_eq!(AttackStrategy::order(Difficulty::Impossible)[0], AttackStrategy::Retaliate);
        assert_eq!(AttackStrategy::order(Difficulty::Easy)[0], AttackStrategy::Nuked);
        assert!(!AttackStrategy::order(Difficulty::Easy).contains(&AttackStrategy::Island));
    }
}
