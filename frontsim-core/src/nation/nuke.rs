//! Atom and hydrogen bomb targeting.

use super::attack::AttackBehavior;
use super::emoji::{self, EmojiBehavior};
use super::{players_by_tiles, land_without_fallout, AiContext};
use crate::config::Difficulty;
use crate::execution::NukeExecution;
use crate::game::{EmojiRecipient, Gold, Owner, PlayerId, PlayerKind, Relation, Team, Tick, TileRef, UnitId, UnitType};
use crate::geometry::{bounding_box_tiles, closest_two_tiles, rand_territory_tiles, trajectory, trajectory_tiles};
use std::collections::{BTreeSet, VecDeque};
use tracing::instrument;

/// Strikes older than this no longer repel new ones.
const RECENT_NUKE_MAX_AGE: Tick = 600;
const RECENT_NUKE_PENALTY: f64 = 1_000_000.0;
const TARGET_STRUCTURES: [UnitType; 6] = [
    UnitType::City,
    UnitType::DefensePost,
    UnitType::MissileSilo,
    UnitType::Port,
    UnitType::SamLauncher,
    UnitType::Factory,
];

fn structure_value(kind: UnitType) -> f64 {
    match kind {
        UnitType::City => 25_000.0,
        UnitType::DefensePost => 5_000.0,
        UnitType::MissileSilo => 50_000.0,
        UnitType::Port | UnitType::Factory => 15_000.0,
        _ => 0.0,
    }
}

/// How far ahead of us the crown must be before we spend bombs on it.
fn crown_lead_threshold(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 0.4,
        Difficulty::Medium => 0.3,
        Difficulty::Hard => 0.2,
        Difficulty::Impossible => 0.1,
    }
}

#[derive(Debug, Clone)]
pub struct NukeBehavior {
    recent_nukes: VecDeque<(Tick, TileRef, UnitType)>,
    atom_bombs_launched: u32,
    atom_bomb_perceived_cost: Gold,
    hydrogen_bombs_launched: u32,
    hydrogen_bomb_perceived_cost: Gold,
    /// A third of Nations only ever throw hydrogen bombs.
    is_hydro_nation: bool,
}

impl NukeBehavior {
    pub fn new(ctx: &mut AiContext<'_>) -> Self {
        let atom_bomb_perceived_cost = ctx.game.unit_cost(UnitType::AtomBomb, ctx.player);
        let hydrogen_bomb_perceived_cost = ctx.game.unit_cost(UnitType::HydrogenBomb, ctx.player);
        Self {
            recent_nukes: VecDeque::new(),
            atom_bombs_launched: 0,
            atom_bomb_perceived_cost,
            hydrogen_bombs_launched: 0,
            hydrogen_bomb_perceived_cost,
            is_hydro_nation: ctx.random.chance(3),
        }
    }

    pub fn is_hydro_nation(&self) -> bool {
        self.is_hydro_nation
    }

    pub fn bombs_launched(&self) -> (u32, u32) {
        (self.atom_bombs_launched, self.hydrogen_bombs_launched)
    }

    #[instrument(skip_all, name = "maybe_send_nuke")]
    pub fn maybe_send_nuke(&mut self, ctx: &mut AiContext<'_>, attack: &mut AttackBehavior, emoji: &mut EmojiBehavior) {
        let Some(target) = self.find_best_nuke_target(ctx, attack) else {
            return;
        };
        let silos = ctx.game.player(ctx.player).units(&[UnitType::MissileSilo]);
        if silos.is_empty() {
            return;
        }
        {
            let game = &*ctx.game;
            let them = game.player(target);
            // Bots are not worth a bomb.
            if them.kind() == PlayerKind::Bot || game.player(ctx.player).is_on_same_team(them) {
                return;
            }
        }
        if !attack.should_attack(ctx, Owner::Player(target)) {
            return;
        }

        let gold = ctx.game.player(ctx.player).gold();
        let kind = if gold >= self.perceived_cost(ctx, UnitType::HydrogenBomb) {
            UnitType::HydrogenBomb
        } else if !self.is_hydro_nation && gold >= self.perceived_cost(ctx, UnitType::AtomBomb) {
            UnitType::AtomBomb
        } else {
            return;
        };
        let Some(magnitude) = ctx.game.config().nuke_magnitude(kind) else {
            return;
        };
        let range = magnitude.outer as i32;

        let structures = ctx.game.player(target).units(&TARGET_STRUCTURES);
        let difficulty = ctx.difficulty();
        let sample = if difficulty == Difficulty::Impossible { 30 } else { 10 };
        let mut candidates = rand_territory_tiles(ctx.random, &*ctx.game, target, sample);
        candidates.extend(structures.iter().filter_map(|&u| ctx.game.unit(u).map(|u| u.tile())));

        self.remove_old_nuke_events(ctx.game.ticks());

        let game = &*ctx.game;
        let mut seen = BTreeSet::new();
        let mut best: Option<TileRef> = None;
        // -1 so plain land without structures still qualifies.
        let mut best_value = -1.0;
        'candidates: for tile in candidates {
            if !seen.insert(tile) {
                continue;
            }
            let zone = bounding_box_tiles(game, tile, range)
                .into_iter()
                .chain(bounding_box_tiles(game, tile, range / 2));
            for t in zone {
                if !self.is_valid_nuke_tile(ctx, t, target) {
                    continue 'candidates;
                }
            }
            let Ok(spawn) = game.can_build(ctx.player, kind, tile) else {
                continue;
            };
            if ctx.is_team_game() && difficulty != Difficulty::Easy && self.is_teammate_already_nuking(ctx, tile, kind) {
                continue;
            }
            if matches!(difficulty, Difficulty::Hard | Difficulty::Impossible)
                && self.is_trajectory_interceptable_by_sam(ctx, spawn, tile)
            {
                continue;
            }
            let value = self.nuke_tile_score(ctx, tile, &silos, &structures, kind);
            if value > best_value {
                best = Some(tile);
                best_value = value;
            }
        }
        if let Some(tile) = best {
            self.send_nuke(ctx, emoji, tile, kind, target);
        }
    }

    /// Who deserves a bomb most, in priority order.
    pub fn find_best_nuke_target(&self, ctx: &mut AiContext<'_>, attack: &AttackBehavior) -> Option<PlayerId> {
        if let Some(attacker) = attack.find_incoming_attack_player(ctx) {
            return Some(attacker);
        }
        if let Some(crown) = self.find_runaway_crown(ctx) {
            return Some(crown);
        }
        if let Some(target) = self.find_ally_target(ctx) {
            return Some(target);
        }
        if let Some(hated) = self.find_most_hated_worthy(ctx) {
            return Some(hated);
        }
        if let Some(crown) = self.find_ffa_crown_target(ctx) {
            return Some(crown);
        }
        self.find_strongest_team_target(ctx)
    }

    /// Impossible FFA only: a crown holding more than half the land.
    fn find_runaway_crown(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        if ctx.difficulty() != Difficulty::Impossible || ctx.is_team_game() {
            return None;
        }
        let game = &*ctx.game;
        let land = land_without_fallout(game);
        if land == 0 {
            return None;
        }
        let crown = *players_by_tiles(game).first()?;
        if crown == ctx.player || game.is_friendly(ctx.player, crown) {
            return None;
        }
        let share = game.player(crown).num_tiles_owned() as f64 / land as f64;
        (share > 0.5).then_some(crown)
    }

    /// First hostile target of a Friendly ally.
    fn find_ally_target(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        for ally in me.allies() {
            if me.relation(ally) < Relation::Friendly {
                continue;
            }
            let found = game
                .player(ally)
                .targets()
                .into_iter()
                .find(|&t| t != ctx.player && !game.is_friendly(ctx.player, t));
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Most hated player, unless they are too small to need a bomb.
    fn find_most_hated_worthy(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        let my_max = game.max_troops(ctx.player);
        me.all_relations_sorted()
            .into_iter()
            .filter(|&(p, relation)| relation == Relation::Hostile && game.has_player(p))
            .map(|(p, _)| p)
            .find(|&p| !game.is_friendly(ctx.player, p) && my_max < game.max_troops(p) * 2.0)
    }

    fn find_ffa_crown_target(&self, ctx: &AiContext<'_>) -> Option<PlayerId> {
        if ctx.is_team_game() {
            return None;
        }
        let game = &*ctx.game;
        let ranked = players_by_tiles(game);
        if ranked.len() <= 1 {
            return None;
        }
        let first = ranked[0];
        let difficulty = ctx.difficulty();
        // Wearing the crown ourselves, Impossible goes after the runner-up.
        if difficulty == Difficulty::Impossible && first == ctx.player {
            let second = ranked[1];
            if !game.is_friendly(ctx.player, second) {
                return Some(second);
            }
        }
        if first == ctx.player || game.is_friendly(ctx.player, first) {
            return None;
        }
        let land = land_without_fallout(game);
        if land == 0 {
            return None;
        }
        let first_share = game.player(first).num_tiles_owned() as f64 / land as f64;
        let my_share = game.player(ctx.player).num_tiles_owned() as f64 / land as f64;
        (first_share - my_share > crown_lead_threshold(difficulty)).then_some(first)
    }

    /// A member of the largest enemy team by tiles.
    fn find_strongest_team_target(&self, ctx: &mut AiContext<'_>) -> Option<PlayerId> {
        if !ctx.is_team_game() {
            return None;
        }
        let game = &*ctx.game;
        let players = game.players();
        if players.len() <= 1 {
            return None;
        }
        let mut teams: Vec<(Team, usize, Vec<PlayerId>)> = Vec::new();
        for p in players {
            let player = game.player(p);
            let Some(team) = player.team() else { continue };
            match teams.iter_mut().find(|(t, _, _)| *t == team) {
                Some((_, tiles, members)) => {
                    *tiles += player.num_tiles_owned();
                    members.push(p);
                }
                None => teams.push((team, player.num_tiles_owned(), vec![p])),
            }
        }
        teams.sort_by(|a, b| b.1.cmp(&a.1));
        let my_team = game.player(ctx.player).team();
        let strongest = match teams.first() {
            Some((team, _, _)) if Some(*team) == my_team => teams.get(1)?,
            Some(entry) => entry,
            None => return None,
        };
        let valid: Vec<PlayerId> = strongest
            .2
            .iter()
            .copied()
            .filter(|&p| !game.is_friendly(ctx.player, p))
            .collect();
        if valid.is_empty() {
            return None;
        }
        if ctx.random.chance(2) {
            let mut strongest_member = valid[0];
            for &p in &valid[1..] {
                if game.max_troops(p) >= game.max_troops(strongest_member) {
                    strongest_member = p;
                }
            }
            Some(strongest_member)
        } else {
            ctx.random.rand_element(&valid).copied()
        }
    }

    /// Price we pretend a bomb costs while saving for a MIRV.
    fn perceived_cost(&self, ctx: &AiContext<'_>, kind: UnitType) -> Gold {
        let game = &*ctx.game;
        let real = game.unit_cost(kind, ctx.player);
        let me = game.player(ctx.player);
        let rich = game.unit_cost(UnitType::Mirv, ctx.player) + game.unit_cost(UnitType::HydrogenBomb, ctx.player);
        if ctx.is_team_game() || me.gold() > rich {
            return real;
        }
        // About to be overrun: go all in.
        let under_heavy_attack = me.incoming_attack_troops() >= me.troops() * 2.0;
        if matches!(ctx.difficulty(), Difficulty::Hard | Difficulty::Impossible) && under_heavy_attack {
            return real;
        }
        match kind {
            UnitType::AtomBomb => self.atom_bomb_perceived_cost,
            _ => self.hydrogen_bomb_perceived_cost,
        }
    }

    fn remove_old_nuke_events(&mut self, now: Tick) {
        while let Some(&(tick, _, _)) = self.recent_nukes.front() {
            if tick + RECENT_NUKE_MAX_AGE >= now {
                break;
            }
            self.recent_nukes.pop_front();
        }
    }

    /// Easy and Medium only hit the target's own land. Hard and Impossible
    /// accept unclaimed land and, in team games, any unfriendly owner.
    fn is_valid_nuke_tile(&self, ctx: &AiContext<'_>, tile: TileRef, target: PlayerId) -> bool {
        let owner = ctx.game.owner(tile);
        if owner == Owner::Player(target) {
            return true;
        }
        if !matches!(ctx.difficulty(), Difficulty::Hard | Difficulty::Impossible) {
            return false;
        }
        match owner {
            Owner::TerraNullius => true,
            Owner::Player(p) => ctx.is_team_game() && !ctx.game.is_friendly(ctx.player, p),
        }
    }

    fn is_teammate_already_nuking(&self, ctx: &AiContext<'_>, tile: TileRef, kind: UnitType) -> bool {
        let game = &*ctx.game;
        let inner = |k: UnitType| game.config().nuke_magnitude(k).map_or(0, |m| m.inner) as u64;
        let ours = inner(kind);
        game.units(&[UnitType::AtomBomb, UnitType::HydrogenBomb])
            .into_iter()
            .filter_map(|id| game.unit(id))
            .filter(|nuke| nuke.owner() != ctx.player && game.is_friendly(ctx.player, nuke.owner()))
            .any(|nuke| {
                let Some(dst) = nuke.target_tile() else {
                    return false;
                };
                let reach = ours + inner(nuke.kind());
                game.euclidean_dist_squared(tile, dst) <= reach * reach
            })
    }

    /// Whether any hostile SAM could reach the missile on its way.
    ///
    /// Past the targetable range around launch and impact the missile is out
    /// of reach, so that middle stretch is skipped.
    fn is_trajectory_interceptable_by_sam(&self, ctx: &AiContext<'_>, spawn: TileRef, target: TileRef) -> bool {
        let game = &*ctx.game;
        let path = trajectory(game, spawn, target, true);
        let tiles = trajectory_tiles(game, &path);
        if tiles.is_empty() {
            return false;
        }
        let range2 = (game.config().nuke_targetable_range as u64).pow(2);

        let mut untargetable: Option<(usize, usize)> = None;
        let mut start = None;
        for (i, &t) in tiles.iter().enumerate() {
            match start {
                None => {
                    if game.euclidean_dist_squared(t, spawn) > range2 {
                        if game.euclidean_dist_squared(t, target) < range2 {
                            // Launch and impact ranges overlap.
                            break;
                        }
                        start = Some(i);
                    }
                }
                Some(s) => {
                    if game.euclidean_dist_squared(t, target) < range2 {
                        untargetable = Some((s, i));
                        break;
                    }
                }
            }
        }

        let max_range = game.config().max_sam_range as f64;
        tiles
            .iter()
            .enumerate()
            .filter(|&(i, _)| untargetable.map_or(true, |(s, e)| i < s || i >= e))
            .any(|(_, &t)| {
                game.nearby_units(t, max_range, &[UnitType::SamLauncher])
                    .into_iter()
                    .any(|sam| {
                        let Some(unit) = game.unit(sam.unit) else {
                            return false;
                        };
                        let owner = unit.owner();
                        if owner == ctx.player || game.is_friendly(ctx.player, owner) {
                            return false;
                        }
                        let range = game.config().sam_range(unit.level());
                        sam.dist_squared as f64 <= range * range
                    })
            })
    }

    fn nuke_tile_score(
        &self,
        ctx: &AiContext<'_>,
        tile: TileRef,
        silos: &[UnitId],
        structures: &[UnitId],
        kind: UnitType,
    ) -> f64 {
        let game = &*ctx.game;
        let config = game.config();
        let inner = config.nuke_magnitude(kind).map_or(0, |m| m.inner) as u64;
        let difficulty = ctx.difficulty();
        let units: Vec<_> = structures.iter().filter_map(|&id| game.unit(id)).collect();

        let mut value: f64 = units
            .iter()
            .filter(|u| game.euclidean_dist_squared(tile, u.tile()) <= inner * inner)
            .map(|u| structure_value(u.kind()) * u.level() as f64)
            .sum();

        // Medium uses a crude local check instead of tracing trajectories.
        if difficulty == Difficulty::Medium
            && units
                .iter()
                .any(|u| u.kind() == UnitType::SamLauncher && game.euclidean_dist_squared(tile, u.tile()) <= 50 * 50)
        {
            return -1.0;
        }

        if difficulty == Difficulty::Impossible && kind == UnitType::HydrogenBomb {
            let outer = config.nuke_magnitude(UnitType::HydrogenBomb).map_or(0, |m| m.outer) as f64;
            for sam in game.nearby_units(tile, outer, &[UnitType::SamLauncher]) {
                let Some(unit) = game.unit(sam.unit) else { continue };
                let level = unit.level();
                if level >= 5 {
                    continue;
                }
                // A SAM we outrange dies without getting a shot off.
                if (sam.dist_squared as f64).sqrt() > config.sam_range(level) {
                    value += 100_000.0 * level as f64;
                }
            }
        }

        let silo_tiles: Vec<TileRef> = silos.iter().filter_map(|&id| game.unit(id).map(|u| u.tile())).collect();
        if let Some((closest_silo, _)) = closest_two_tiles(game, &silo_tiles, &[tile]) {
            let distance = (game.euclidean_dist_squared(tile, closest_silo) as f64).sqrt();
            value = (value * 0.2).max(value - distance * 30.0);
        }

        for &(_, recent, recent_kind) in &self.recent_nukes {
            let r = config.nuke_magnitude(recent_kind).map_or(0, |m| m.inner) as u64;
            if game.euclidean_dist_squared(tile, recent) <= r * r {
                value -= RECENT_NUKE_PENALTY;
            }
        }
        value
    }

    fn send_nuke(
        &mut self,
        ctx: &mut AiContext<'_>,
        emoji: &mut EmojiBehavior,
        tile: TileRef,
        kind: UnitType,
        target: PlayerId,
    ) {
        self.recent_nukes.push_back((ctx.game.ticks(), tile, kind));
        match kind {
            UnitType::AtomBomb => {
                self.atom_bombs_launched += 1;
                self.atom_bomb_perceived_cost = self.atom_bomb_perceived_cost * 125 / 100;
            }
            _ => {
                self.hydrogen_bombs_launched += 1;
                self.hydrogen_bomb_perceived_cost = self.hydrogen_bomb_perceived_cost * 115 / 100;
            }
        }
        log::info!("{:?} launches {:?} at {:?} ({:?})", ctx.player, kind, target, tile);
        ctx.game
            .add_execution(Box::new(NukeExecution::new(kind, ctx.player, tile)));
        emoji.maybe_send_emoji(ctx, EmojiRecipient::Player(target), emoji::NUKE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::{Game, PlayerInfo};
    use crate::random::PseudoRandom;
    use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

    /// Hard Nation with a silo on the left, invaded by `kind` from the right.
    fn invaded_by(kind: PlayerKind) -> SandboxGame {
        let mut builder = GameBuilder::new()
            .with_map(SandboxMap::land(200, 40))
            .with_config(GameConfig {
                difficulty: Difficulty::Hard,
                ..Default::default()
            })
            .with_player(PlayerInfo::new("n", "Nation", PlayerKind::Nation))
            .with_player(PlayerInfo::new("e", "Enemy", kind))
            .with_square(PlayerId(0), 0, 0, 40)
            .with_unit(PlayerId(0), UnitType::MissileSilo, 5, 5)
            .with_troops(PlayerId(0), 100_000.0)
            .with_gold(PlayerId(0), 1_000_000)
            .with_troops(PlayerId(1), 200_000.0)
            .at_tick(5_000);
        for x in 40..160 {
            for y in 0..40 {
                builder = builder.with_tile(PlayerId(1), x, y);
            }
        }
        let mut game = builder.build();
        game.start_attack(PlayerId(1), Owner::Player(PlayerId(0)), 50_000.0, None)
            .unwrap();
        game
    }

    fn consider(game: &mut SandboxGame, seed: u64) -> NukeBehavior {
        let mut random = PseudoRandom::new(seed);
        let mut ctx = AiContext::new(game, &mut random, PlayerId(0));
        let mut nuke = NukeBehavior::new(&mut ctx);
        let mut attack = AttackBehavior::new(0.5, 0.3, 0.1);
        nuke.maybe_send_nuke(&mut ctx, &mut attack, &mut EmojiBehavior::new());
        nuke
    }

    #[test]
    fn answers_an_invasion_with_an_atom_bomb() {
        let mut fired = 0;
        for seed in 0..30 {
            let mut game = invaded_by(PlayerKind::Human);
            let nuke = consider(&mut game, seed);
            if nuke.is_hydro_nation() {
                // A hydrogen bomb is out of reach on this budget.
                assert_eq!(nuke.bombs_launched(), (0, 0));
                continue;
            }
            assert_eq!(nuke.bombs_launched(), (1, 0));
            fired += 1;

            game.run(3);
            let launch = game.bomb_log()[0];
            assert_eq!(launch.player, PlayerId(0));
            assert_eq!(launch.kind, UnitType::AtomBomb);
            assert_eq!(launch.target, Owner::Player(PlayerId(1)));
        }
        assert!(fired >= 10, "only {fired} launches");
    }

    #[test]
    fn bots_are_not_worth_a_bomb() {
        for seed in 0..30 {
            let mut game = invaded_by(PlayerKind::Bot);
            assert_eq!(consider(&mut game, seed).bombs_launched(), (0, 0));
        }
    }

    #[test]
    fn crown_threshold_shrinks_with_difficulty() {
        let thresholds: Vec<f64> = Difficulty::ALL.iter().map(|&d| crown_lead_threshold(d)).collect();
        assert!(thresholds.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn silos_are_the_juiciest_structure() {
        let best = TARGET_STRUCTURES
            .iter()
            .copied()
            .max_by(|a, b| structure_value(*a).total_cmp(&structure_value(*b)));
        assert_eq!(best, Some(UnitType::MissileSilo));
        assert_eq!(structure_value(UnitType::SamLauncher), 0.0);
    }
}
