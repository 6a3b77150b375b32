//! Where and what a Nation builds.
//!
//! Structure types are tried in a fixed order and the first successful
//! placement ends the turn. A type is only considered once the Nation's gold
//! covers its perceived cost, the real price times a multiplier that grows
//! with the number already owned.

use super::warship::WarshipBehavior;
use super::AiContext;
use crate::execution::ConstructionExecution;
use crate::game::{Game, Owner, PlayerId, Relation, TileRef, UnitType};
use crate::geometry::{closest_tile, rand_territory_tiles};
use std::collections::BTreeSet;

const CANDIDATE_TILES: usize = 25;
const PROTECTED_BY_SAM: [UnitType; 4] = [UnitType::City, UnitType::Factory, UnitType::MissileSilo, UnitType::Port];

#[derive(Debug, Default)]
pub struct StructureBehavior;

impl StructureBehavior {
    pub fn new() -> Self {
        Self
    }

    /// Build at most one thing this turn.
    pub fn handle_units(&mut self, ctx: &mut AiContext<'_>, warship: &mut WarshipBehavior) -> bool {
        let coastal = {
            let game = &*ctx.game;
            game.player(ctx.player)
                .border_tiles()
                .iter()
                .any(|&t| game.is_ocean_shore(t))
        };
        let team_game = ctx.is_team_game();

        self.maybe_spawn_structure(ctx, UnitType::City, |n| n)
            || self.maybe_spawn_structure(ctx, UnitType::Port, |n| n)
            || warship.maybe_spawn_warship(ctx)
            || self.maybe_spawn_structure(ctx, UnitType::Factory, |n| if coastal { n * 3 } else { n })
            || self.maybe_spawn_structure(ctx, UnitType::DefensePost, |n| (n + 2).pow(2))
            || self.maybe_spawn_structure(ctx, UnitType::SamLauncher, |n| if team_game { n } else { n.pow(2) })
            || self.maybe_spawn_structure(ctx, UnitType::MissileSilo, |n| n.pow(2))
    }

    fn maybe_spawn_structure(&mut self, ctx: &mut AiContext<'_>, kind: UnitType, multiplier: impl Fn(u64) -> u64) -> bool {
        let owned = ctx.game.player(ctx.player).units_owned(kind) as u64;
        let perceived = ctx
            .game
            .unit_cost(kind, ctx.player)
            .saturating_mul(multiplier(owned + 1));
        if ctx.game.player(ctx.player).gold() < perceived {
            return false;
        }
        let Some(tile) = self.structure_spawn_tile(ctx, kind) else {
            return false;
        };
        if ctx.game.can_build(ctx.player, kind, tile).is_err() {
            return false;
        }
        log::debug!("{:?} builds {:?} at {:?}", ctx.player, kind, tile);
        ctx.game
            .add_execution(Box::new(ConstructionExecution::new(ctx.player, kind, tile)));
        true
    }

    /// Best buildable candidate by the type's value function.
    fn structure_spawn_tile(&mut self, ctx: &mut AiContext<'_>, kind: UnitType) -> Option<TileRef> {
        let tiles = if kind == UnitType::Port {
            self.rand_coastal_tiles(ctx, CANDIDATE_TILES)
        } else {
            rand_territory_tiles(ctx.random, &*ctx.game, ctx.player, CANDIDATE_TILES)
        };
        let game = &*ctx.game;
        let mut best: Option<(TileRef, f64)> = None;
        for tile in tiles {
            let value = structure_spawn_tile_value(game, ctx.player, kind, tile);
            if best.is_some_and(|(_, v)| value <= v) {
                continue;
            }
            if game.can_build(ctx.player, kind, tile).is_err() {
                continue;
            }
            best = Some((tile, value));
        }
        best.map(|(t, _)| t)
    }

    fn rand_coastal_tiles(&self, ctx: &mut AiContext<'_>, count: usize) -> Vec<TileRef> {
        let mut shore: Vec<TileRef> = {
            let game = &*ctx.game;
            game.player(ctx.player)
                .border_tiles()
                .iter()
                .copied()
                .filter(|&t| game.is_ocean_shore(t))
                .collect()
        };
        if shore.len() > count {
            ctx.random.shuffle(&mut shore);
            shore.truncate(count);
        }
        shore
    }
}

/// Score of building `kind` at `tile` for `player`. Higher is better.
///
/// Borders are kept at arm's length of an atom bomb, structures of one type
/// twice that from each other.
pub fn structure_spawn_tile_value(game: &dyn Game, player: PlayerId, kind: UnitType, tile: TileRef) -> f64 {
    let border_spacing = game
        .config()
        .nuke_magnitude(UnitType::AtomBomb)
        .map_or(30, |m| m.outer) as f64;
    let structure_spacing = border_spacing * 2.0;
    let me = game.player(player);
    let elevation = game.magnitude(tile) as f64;

    let nearest_border = closest_tile(game, me.border_tiles(), tile);
    let border_dist = nearest_border.map_or(0.0, |(_, d)| d as f64);
    let same_type_spacing = |k: UnitType| -> f64 {
        let others: Vec<TileRef> = me
            .units(&[k])
            .into_iter()
            .filter_map(|id| game.unit(id).map(|u| u.tile()))
            .filter(|&t| t != tile)
            .collect();
        closest_tile(game, &others, tile).map_or(structure_spacing, |(_, d)| (d as f64).min(structure_spacing))
    };

    match kind {
        UnitType::City | UnitType::Factory | UnitType::MissileSilo => {
            elevation + border_dist.min(border_spacing) + same_type_spacing(kind)
        }
        UnitType::Port => same_type_spacing(UnitType::Port),
        UnitType::DefensePost => {
            let mut value = elevation + (border_spacing - (border_spacing - border_dist).abs()).max(0.0);
            // Posts face the neighbours we trust least.
            if let Some((border_tile, _)) = nearest_border {
                let neighbours: BTreeSet<PlayerId> = game
                    .neighbors(border_tile)
                    .into_iter()
                    .filter_map(|n| match game.owner(n) {
                        Owner::Player(p) if p != player => Some(p),
                        _ => None,
                    })
                    .collect();
                for other in neighbours {
                    let distrust = Relation::Friendly as i32 - me.relation(other) as i32;
                    value += border_spacing * distrust as f64;
                }
            }
            value + same_type_spacing(kind)
        }
        UnitType::SamLauncher => {
            let sam_range2 = (game.config().default_sam_range as u64).pow(2);
            let protected = me
                .units(&PROTECTED_BY_SAM)
                .into_iter()
                .filter_map(|id| game.unit(id))
                .filter(|u| game.euclidean_dist_squared(tile, u.tile()) <= sam_range2)
                .count();
            elevation
                + border_dist.min(border_spacing)
                + same_type_spacing(kind)
                + structure_spacing * protected as f64
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMap, PlayerInfo, PlayerKind};
    use crate::testing::{GameBuilder, SandboxMap};

    #[test]
    fn inland_city_beats_border_city() {
        let game = GameBuilder::new()
            .with_map(SandboxMap::land(60, 60))
            .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation))
            .with_square(PlayerId(0), 0, 0, 50)
            .build();
        // Our border runs along x = 49 and y = 49.
        let border = game.ref_at(48, 20);
        let inland = game.ref_at(10, 20);
        let at_border = structure_spawn_tile_value(&game, PlayerId(0), UnitType::City, border);
        let deep = structure_spawn_tile_value(&game, PlayerId(0), UnitType::City, inland);
        assert!(deep > at_border);
    }

    #[test]
    fn defense_posts_prefer_hostile_fronts() {
        let mut game = GameBuilder::new()
            .with_map(SandboxMap::land(40, 20))
            .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation))
            .with_player(PlayerInfo::new("h", "Human", PlayerKind::Human))
            .with_square(PlayerId(0), 0, 0, 20)
            .with_square(PlayerId(1), 20, 0, 20)
            .build();
        let tile = game.ref_at(15, 10);
        let neutral = structure_spawn_tile_value(&game, PlayerId(0), UnitType::DefensePost, tile);
        game.set_relation(PlayerId(0), PlayerId(1), -90);
        let hostile = structure_spawn_tile_value(&game, PlayerId(0), UnitType::DefensePost, tile);
        assert!(hostile > neutral);
    }
}
