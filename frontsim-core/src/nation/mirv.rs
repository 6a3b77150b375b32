//! When a Nation spends its MIRV.

use super::emoji::{self, respond_to_mirv, EmojiBehavior};
use super::AiContext;
use crate::config::Difficulty;
use crate::execution::MirvExecution;
use crate::game::{EmojiRecipient, Game, Owner, PlayerId, PlayerKind, UnitType};
use crate::geometry::calculate_territory_center;
use std::cmp::Reverse;

fn hesitation_odds(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 2,
        Difficulty::Medium => 9,
        Difficulty::Hard => 8,
        Difficulty::Impossible => 16,
    }
}

fn victory_denial_team_threshold(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.9,
        Difficulty::Medium | Difficulty::Hard => 0.7,
        Difficulty::Impossible => 0.6,
    }
}

fn victory_denial_individual_threshold(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.75,
        Difficulty::Medium | Difficulty::Hard => 0.55,
        Difficulty::Impossible => 0.4,
    }
}

fn steamroll_city_gap_multiplier(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 1.5,
        Difficulty::Medium => 1.3,
        Difficulty::Hard => 1.2,
        Difficulty::Impossible => 1.15,
    }
}

/// The leader needs strictly more cities than this.
pub fn steamroll_min_leader_cities(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 15,
        Difficulty::Medium | Difficulty::Hard => 10,
        Difficulty::Impossible => 8,
    }
}

#[derive(Debug, Default)]
pub struct MirvBehavior;

impl MirvBehavior {
    pub fn new() -> Self {
        Self
    }

    /// Fire a MIRV if a trigger applies. Returns true when a trigger picked
    /// a target, whether or not the launch went through.
    pub fn consider_mirv(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior) -> bool {
        let me = ctx.game.player(ctx.player);
        if me.units(&[UnitType::MissileSilo]).is_empty() {
            return false;
        }
        if me.gold() < ctx.game.unit_cost(UnitType::Mirv, ctx.player) {
            return false;
        }
        let odds = hesitation_odds(ctx.difficulty());
        if ctx.random.chance(odds) {
            return false;
        }

        let target = self
            .select_counter_mirv_target(ctx)
            .or_else(|| self.select_victory_denial_target(ctx))
            .or_else(|| self.select_steamroll_stop_target(ctx));
        match target {
            Some(enemy) => {
                self.maybe_send_mirv(ctx, emoji, enemy);
                true
            }
            None => false,
        }
    }

    /// Not us, not a bot, not a teammate.
    fn valid_targets(&self, ctx: &AiContext<'_>) -> Vec<PlayerId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        game.players()
            .into_iter()
            .filter(|&p| {
                let other = game.player(p);
                p != ctx.player && other.kind() != PlayerKind::Bot && !me.is_on_same_team(other)
            })
            .collect()
    }

    /// Largest player with a MIRV in flight towards our land.
    fn select_counter_mirv_target(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        let mut attackers: Vec<PlayerId> = self
            .valid_targets(ctx)
            .into_iter()
            .filter(|&p| is_inbound_mirv_from(&*ctx.game, p, ctx.player))
            .collect();
        attackers.sort_by_key(|&p| Reverse(ctx.game.player(p).num_tiles_owned()));
        attackers.first().copied()
    }

    fn select_victory_denial_target(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        let game = &*ctx.game;
        let total_land = game.num_land_tiles() as f64;
        if total_land == 0.0 {
            return None;
        }
        let difficulty = ctx.difficulty();
        let mut best: Option<(PlayerId, f64)> = None;

        for p in self.valid_targets(ctx) {
            let player = game.player(p);
            let severity = match player.team() {
                Some(team) => {
                    let members: Vec<PlayerId> = game
                        .players()
                        .into_iter()
                        .filter(|&m| game.player(m).team() == Some(team))
                        .collect();
                    let team_tiles: usize = members.iter().map(|&m| game.player(m).num_tiles_owned()).sum();
                    let share = team_tiles as f64 / total_land;
                    // Only the largest member stands for the team; first one wins ties.
                    let mut largest: Option<(PlayerId, usize)> = None;
                    for &m in &members {
                        let tiles = game.player(m).num_tiles_owned();
                        if largest.map_or(true, |(_, t)| tiles > t) {
                            largest = Some((m, tiles));
                        }
                    }
                    if share >= victory_denial_team_threshold(difficulty) && largest.map(|(m, _)| m) == Some(p) {
                        share
                    } else {
                        0.0
                    }
                }
                None => {
                    let share = player.num_tiles_owned() as f64 / total_land;
                    if share >= victory_denial_individual_threshold(difficulty) {
                        share
                    } else {
                        0.0
                    }
                }
            };
            if severity > 0.0 && best.map_or(true, |(_, s)| severity > s) {
                best = Some((p, severity));
            }
        }
        best.map(|(p, _)| p)
    }

    fn select_steamroll_stop_target(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        let valid = self.valid_targets(ctx);
        if valid.is_empty() {
            return None;
        }
        let game = &*ctx.game;
        let difficulty = ctx.difficulty();
        let mut by_cities: Vec<(PlayerId, u32)> = game
            .players()
            .into_iter()
            .map(|p| (p, game.player(p).unit_count(UnitType::City)))
            .collect();
        by_cities.sort_by_key(|&(_, c)| Reverse(c));
        if by_cities.len() < 2 {
            return None;
        }
        let (leader, cities) = by_cities[0];
        if cities <= steamroll_min_leader_cities(difficulty) {
            return None;
        }
        let threshold = by_cities[1].1 as f64 * steamroll_city_gap_multiplier(difficulty);
        if cities as f64 >= threshold && valid.contains(&leader) {
            Some(leader)
        } else {
            None
        }
    }

    fn maybe_send_mirv(&mut self, ctx: &mut AiContext<'_>, emoji: &mut EmojiBehavior, enemy: PlayerId) {
        emoji.maybe_send_attack_emoji(ctx, enemy);

        let Some(center) = calculate_territory_center(&*ctx.game, enemy) else {
            return;
        };
        if let Err(reason) = ctx.game.can_build(ctx.player, UnitType::Mirv, center) {
            log::debug!("{:?} cannot MIRV {:?}: {}", ctx.player, enemy, reason);
            return;
        }
        log::info!("{:?} launches a MIRV at {:?}", ctx.player, enemy);
        ctx.game.add_execution(Box::new(MirvExecution::new(ctx.player, center)));
        emoji.send_emoji(ctx, EmojiRecipient::AllPlayers, emoji::NUKE);
        respond_to_mirv(ctx.game, ctx.random, enemy);
    }
}

/// Does `attacker` have a MIRV aimed at land `defender` currently holds?
fn is_inbound_mirv_from(game: &dyn Game, attacker: PlayerId, defender: PlayerId) -> bool {
    game.player(attacker).units(&[UnitType::Mirv]).into_iter().any(|id| {
        game.unit(id)
            .and_then(|u| u.target_tile())
            .is_some_and(|dst| game.owner(dst) == Owner::Player(defender))
    })
}

#[cfg(test)]
#[path = "mirv_tests.rs"]
mod tests;
