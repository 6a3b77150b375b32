//! Naval retaliation and fleet counter-measures.

use super::emoji::{self, EmojiBehavior};
use super::AiContext;
use crate::config::Difficulty;
use crate::execution::ConstructionExecution;
use crate::game::{EmojiRecipient, PlayerId, PlayerKind, Team, TileRef, UnitId, UnitType};
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Own warships beyond which a Nation stops building more.
const MAX_OWN_WARSHIPS: usize = 10;

#[derive(Debug, Default)]
pub struct WarshipBehavior {
    tracked_transport_ships: BTreeSet<UnitId>,
    tracked_trade_ships: BTreeSet<UnitId>,
}

impl WarshipBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occasionally puts a first warship to sea next to one of our ports.
    pub fn maybe_spawn_warship(&mut self, ctx: &mut AiContext<'_>) -> bool {
        if !ctx.random.chance(50) {
            return false;
        }
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let ports = me.units(&[UnitType::Port]);
        if ports.is_empty()
            || !me.units(&[UnitType::Warship]).is_empty()
            || me.gold() <= game.unit_cost(UnitType::Warship, ctx.player)
        {
            return false;
        }
        let Some(port) = ctx.random.rand_element(&ports).copied() else {
            return false;
        };
        let Some(port_tile) = ctx.game.unit(port).map(|u| u.tile()) else {
            return false;
        };
        let Some(tile) = self.random_ocean_tile(ctx, port_tile) else {
            return false;
        };
        if ctx.game.can_build(ctx.player, UnitType::Warship, tile).is_err() {
            return false;
        }
        log::debug!("{:?} puts a warship to sea", ctx.player);
        ctx.game
            .add_execution(Box::new(ConstructionExecution::new(ctx.player, UnitType::Warship, tile)));
        true
    }

    fn random_ocean_tile(&self, ctx: &mut AiContext<'_>, near: TileRef) -> Option<TileRef> {
        const RADIUS: i64 = 250;
        let (cx, cy) = (ctx.game.x(near) as i64, ctx.game.y(near) as i64);
        for _ in 0..50 {
            let x = ctx.random.next_int(cx - RADIUS, cx + RADIUS) as i32;
            let y = ctx.random.next_int(cy - RADIUS, cy + RADIUS) as i32;
            if !ctx.game.is_valid_coord(x, y) {
                continue;
            }
            let tile = ctx.game.ref_at(x, y);
            if ctx.game.is_ocean(tile) {
                return Some(tile);
            }
        }
        None
    }

    /// Runs every tick. Notices lost ships and answers with a warship.
    pub fn track_ships_and_retaliate(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) {
        self.track_transport_ships(ctx, emoji);
        self.track_trade_ships(ctx, emoji);
    }

    fn track_transport_ships(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) {
        let owned = ctx.game.player(ctx.player).units(&[UnitType::TransportShip]);
        self.tracked_transport_ships.extend(owned);

        let mut losses: Vec<(TileRef, PlayerId)> = Vec::new();
        self.tracked_transport_ships.retain(|&id| {
            let Some(ship) = ctx.game.unit(id) else {
                return false;
            };
            if ship.is_active() {
                return true;
            }
            // Arrival and retreat also deactivate a ship; only a named destroyer counts.
            if ship.was_destroyed_by_enemy() {
                if let Some(destroyer) = ship.destroyer() {
                    losses.push((ship.tile(), destroyer));
                }
            }
            false
        });
        for (tile, enemy) in losses {
            self.maybe_retaliate_with_warship(ctx, emoji, tile, enemy);
        }
    }

    fn track_trade_ships(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) {
        let owned = ctx.game.player(ctx.player).units(&[UnitType::TradeShip]);
        self.tracked_trade_ships.extend(owned);

        let mut captured: Vec<(TileRef, PlayerId)> = Vec::new();
        self.tracked_trade_ships.retain(|&id| {
            let Some(ship) = ctx.game.unit(id) else {
                return false;
            };
            if !ship.is_active() {
                return false;
            }
            if ship.owner() != ctx.player {
                captured.push((ship.tile(), ship.owner()));
                return false;
            }
            true
        });
        for (tile, enemy) in captured {
            self.maybe_retaliate_with_warship(ctx, emoji, tile, enemy);
        }
    }

    fn maybe_retaliate_with_warship(
        &mut self,
        ctx: &mut AiContext<'_>,
        emoji: &mut EmojiBehavior,
        tile: TileRef,
        enemy: PlayerId,
    ) {
        if ctx.game.player(ctx.player).units(&[UnitType::Warship]).len() >= MAX_OWN_WARSHIPS {
            return;
        }
        let retaliate = match ctx.difficulty() {
            Difficulty::Easy => false,
            Difficulty::Medium => ctx.random.next_int(0, 100) < 15,
            Difficulty::Hard => ctx.random.next_int(0, 100) < 50,
            Difficulty::Impossible => ctx.random.next_int(0, 100) < 80,
        };
        if !retaliate || ctx.game.can_build(ctx.player, UnitType::Warship, tile).is_err() {
            return;
        }
        log::debug!("{:?} retaliates against {:?} with a warship", ctx.player, enemy);
        ctx.game
            .add_execution(Box::new(ConstructionExecution::new(ctx.player, UnitType::Warship, tile)));
        emoji.maybe_send_emoji(ctx, EmojiRecipient::Player(enemy), emoji::WARSHIP_RETALIATION);
    }

    /// Rich Nations on Hard and Impossible answer a fleet that tries to own
    /// the sea with a warship of their own.
    pub fn counter_warship_infestation(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) {
        if !self.should_counter_warship_infestation(ctx) {
            return;
        }
        let my_team = ctx.game.player(ctx.player).team();
        if !self.is_rich_player(ctx, my_team) {
            return;
        }
        let target = match my_team {
            Some(_) => self.find_team_game_warship_target(ctx),
            None => self.find_free_for_all_warship_target(ctx),
        };
        let Some(warship) = target else { return };
        let Some(tile) = ctx.game.unit(warship).map(|u| u.tile()) else {
            return;
        };
        if ctx.game.can_build(ctx.player, UnitType::Warship, tile).is_err() {
            return;
        }
        log::info!("{:?} counters a warship infestation", ctx.player);
        ctx.game
            .add_execution(Box::new(ConstructionExecution::new(ctx.player, UnitType::Warship, tile)));
        emoji.send_emoji(ctx, EmojiRecipient::AllPlayers, emoji::WARSHIP_RETALIATION);
    }

    fn should_counter_warship_infestation(&self, ctx: &AiContext<'_>) -> bool {
        if !matches!(ctx.difficulty(), Difficulty::Hard | Difficulty::Impossible) {
            return false;
        }
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        game.unit_count(UnitType::Warship) > 10
            && game.unit_cost(UnitType::Warship, ctx.player) <= me.gold()
            && !me.units(&[UnitType::Port]).is_empty()
            && me.units(&[UnitType::Warship]).len() < MAX_OWN_WARSHIPS
    }

    /// Among the three richest non-human players (own team only in team games).
    fn is_rich_player(&self, ctx: &AiContext<'_>, my_team: Option<Team>) -> bool {
        let game = &*ctx.game;
        let mut candidates: Vec<PlayerId> = game
            .players()
            .into_iter()
            .filter(|&p| {
                let player = game.player(p);
                player.kind() != PlayerKind::Human && (my_team.is_none() || player.team() == my_team)
            })
            .collect();
        candidates.sort_by_key(|&p| Reverse(game.player(p).gold()));
        candidates.iter().take(3).any(|&p| p == ctx.player)
    }

    fn find_team_game_warship_target(&self, ctx: &mut AiContext<'_>) -> Option<UnitId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let mut teams: Vec<(Team, usize, Vec<PlayerId>)> = Vec::new();
        for p in game.players() {
            let player = game.player(p);
            if p == ctx.player || me.is_friendly(player) {
                continue;
            }
            let Some(team) = player.team() else { continue };
            let count = player.units(&[UnitType::Warship]).len();
            match teams.iter_mut().find(|(t, _, _)| *t == team) {
                Some((_, total, members)) => {
                    *total += count;
                    members.push(p);
                }
                None => teams.push((team, count, vec![p])),
            }
        }

        for (_, total, members) in &teams {
            if *total <= 15 {
                continue;
            }
            let mut most: Option<(PlayerId, usize)> = None;
            for &m in members {
                let count = game.player(m).units(&[UnitType::Warship]).len();
                if count > most.map_or(0, |(_, c)| c) {
                    most = Some((m, count));
                }
            }
            if let Some((player, count)) = most {
                if count > 3 {
                    let warships = game.player(player).units(&[UnitType::Warship]);
                    return ctx.random.rand_element(&warships).copied();
                }
            }
        }
        None
    }

    fn find_free_for_all_warship_target(&self, ctx: &mut AiContext<'_>) -> Option<UnitId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let fleet = game
            .players()
            .into_iter()
            .filter(|&p| p != ctx.player && !me.is_friendly(game.player(p)))
            .map(|p| game.player(p).units(&[UnitType::Warship]))
            .find(|warships| warships.len() > 10)?;
        ctx.random.rand_element(&fleet).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::{Game, GameMap, PlayerInfo};
    use crate::random::PseudoRandom;
    use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

    /// Nation with a port on the west coast, a human to the south, open sea east.
    fn harbour(difficulty: Difficulty) -> SandboxGame {
        GameBuilder::new()
            .with_map(SandboxMap::coast(60, 40, 30))
            .with_config(GameConfig {
                difficulty,
                ..Default::default()
            })
            .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation))
            .with_player(PlayerInfo::new("h", "Human", PlayerKind::Human))
            .with_square(PlayerId(0), 0, 0, 30)
            .with_square(PlayerId(1), 0, 30, 10)
            .with_unit(PlayerId(0), UnitType::Port, 29, 10)
            .with_gold(PlayerId(0), 10_000_000)
            .at_tick(1_000)
            .build()
    }

    fn own_warships(game: &SandboxGame) -> usize {
        game.player(PlayerId(0)).units(&[UnitType::Warship]).len()
    }

    fn enemy_fleet(game: &mut SandboxGame, size: i32) {
        for i in 0..size {
            let tile = game.ref_at(35 + i, 5);
            game.place_unit(PlayerId(1), UnitType::Warship, tile);
        }
    }

    fn counter(game: &mut SandboxGame, seed: u64) {
        let mut random = PseudoRandom::new(seed);
        let mut ctx = AiContext::new(game, &mut random, PlayerId(0));
        WarshipBehavior::new().counter_warship_infestation(&mut ctx, &mut EmojiBehavior::new());
    }

    /// Builds a transport, has the human sink it and lets the Nation notice.
    /// Returns whether a warship was built in answer.
    fn lose_a_transport(difficulty: Difficulty, seed: u64) -> bool {
        let mut game = harbour(difficulty);
        let ship = game.place_unit(PlayerId(0), UnitType::TransportShip, game.ref_at(31, 20));
        let mut random = PseudoRandom::new(seed);
        let mut warships = WarshipBehavior::new();
        let mut emoji = EmojiBehavior::new();
        warships.track_ships_and_retaliate(&mut AiContext::new(&mut game, &mut random, PlayerId(0)), &mut emoji);
        game.delete_unit(ship, Some(PlayerId(1)));
        warships.track_ships_and_retaliate(&mut AiContext::new(&mut game, &mut random, PlayerId(0)), &mut emoji);
        game.run(2);
        own_warships(&game) > 0
    }

    #[test]
    fn hard_nations_counter_a_large_fleet() {
        let mut game = harbour(Difficulty::Hard);
        enemy_fleet(&mut game, 11);
        counter(&mut game, 3);
        game.run(2);
        assert_eq!(own_warships(&game), 1);
    }

    #[test]
    fn ten_warships_are_not_an_infestation() {
        let mut game = harbour(Difficulty::Impossible);
        enemy_fleet(&mut game, 10);
        counter(&mut game, 3);
        game.run(2);
        assert_eq!(own_warships(&game), 0);
    }

    #[test]
    fn medium_nations_ignore_fleets() {
        let mut game = harbour(Difficulty::Medium);
        enemy_fleet(&mut game, 12);
        counter(&mut game, 3);
        game.run(2);
        assert_eq!(own_warships(&game), 0);
    }

    #[test]
    fn no_port_no_counter() {
        let mut game = harbour(Difficulty::Hard);
        let port = game.player(PlayerId(0)).units(&[UnitType::Port])[0];
        game.delete_unit(port, None);
        enemy_fleet(&mut game, 11);
        counter(&mut game, 3);
        game.run(2);
        assert_eq!(own_warships(&game), 0);
    }

    #[test]
    fn sunk_transports_are_avenged_by_hard_nations() {
        let answered = (0..20).filter(|&seed| lose_a_transport(Difficulty::Impossible, seed)).count();
        assert!(answered >= 10, "only {answered} of 20");
    }

    #[test]
    fn easy_nations_never_avenge() {
        assert!((0..20).all(|seed| !lose_a_transport(Difficulty::Easy, seed)));
    }

    #[test]
    fn first_warship_needs_a_port() {
        let mut game = harbour(Difficulty::Medium);
        let port = game.player(PlayerId(0)).units(&[UnitType::Port])[0];
        game.delete_unit(port, None);
        let mut random = PseudoRandom::new(0);
        let mut behavior = WarshipBehavior::new();
        let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
        assert!((0..200).all(|_| !behavior.maybe_spawn_warship(&mut ctx)));
    }

    #[test]
    fn first_warship_eventually_sails() {
        let mut game = harbour(Difficulty::Medium);
        let mut random = PseudoRandom::new(0);
        let mut behavior = WarshipBehavior::new();
        let mut ctx = AiContext::new(&mut game, &mut random, PlayerId(0));
        assert!((0..2_000).any(|_| behavior.maybe_spawn_warship(&mut ctx)));
        game.run(2);
        assert_eq!(own_warships(&game), 1);
    }
}
