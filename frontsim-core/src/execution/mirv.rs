//! Multi-warhead strike.
//!
//! The MIRV flies an arc to a separation point north of its target, then
//! splits into up to [`MIRV_WARHEADS`] independent [`NukeExecution`]s spread
//! over the defender's land.

use super::{Execution, NukeExecution};
use crate::game::{Game, GameMap, Owner, PlayerId, Tick, TileRef, UnitId, UnitParams, UnitType};
use crate::geometry::trajectory;
use crate::random::{simple_hash, PseudoRandom};
use game_pathfinding::{ParabolaPath, Step};

/// Radius around the aim point that warheads may land in.
pub const MIRV_RANGE: i64 = 1500;
/// Minimum Manhattan distance between any two warhead targets.
pub const MIRV_MIN_SPREAD: u32 = 55;
pub const MIRV_WARHEADS: usize = 350;

const ATTEMPTS_PER_WARHEAD: usize = 100;
const TOTAL_ATTEMPTS: usize = 1000;

/// Where the warheads go. `dst` is always included and, being at distance
/// zero, comes last: the result is ordered outermost first.
///
/// Sampling is best effort: a small or fragmented defender gets fewer than
/// [`MIRV_WARHEADS`] targets.
pub fn select_destinations<M: GameMap + ?Sized>(
    map: &M,
    owner_of: impl Fn(TileRef) -> Owner,
    random: &mut PseudoRandom,
    dst: TileRef,
    defender: Owner,
) -> Vec<TileRef> {
    let (base_x, base_y) = (map.x(dst) as i64, map.y(dst) as i64);
    let range2 = MIRV_RANGE * MIRV_RANGE;
    let mut targets = vec![dst];

    'slots: for _ in 0..TOTAL_ATTEMPTS {
        if targets.len() >= MIRV_WARHEADS {
            break;
        }
        for _ in 0..ATTEMPTS_PER_WARHEAD {
            // Two independent draws per candidate rather than one draw scrambled into two coordinates.
            let x = (random.next_f64() * (MIRV_RANGE * 2) as f64 - MIRV_RANGE as f64 + base_x as f64).round() as i64;
            let y = (random.next_f64() * (MIRV_RANGE * 2) as f64 - MIRV_RANGE as f64 + base_y as f64).round() as i64;
            if !map.is_valid_coord(x as i32, y as i32) {
                continue;
            }
            let tile = map.ref_at(x as i32, y as i32);
            if !map.is_land(tile) {
                continue;
            }
            if (x - base_x).pow(2) + (y - base_y).pow(2) > range2 {
                continue;
            }
            if owner_of(tile) != defender {
                continue;
            }
            if targets.iter().any(|&t| map.manhattan_dist(t, tile) < MIRV_MIN_SPREAD) {
                continue;
            }
            targets.push(tile);
            continue 'slots;
        }
    }

    targets.sort_by_key(|&t| std::cmp::Reverse(map.manhattan_dist(t, dst)));
    targets
}

#[derive(Debug)]
enum MirvState {
    Uninitialized,
    Launching {
        random: PseudoRandom,
        defender: Owner,
    },
    Flying {
        random: PseudoRandom,
        defender: Owner,
        unit: UnitId,
        path: ParabolaPath,
    },
    Terminal,
}

#[derive(Debug)]
pub struct MirvExecution {
    player: PlayerId,
    dst: TileRef,
    speed: f64,
    state: MirvState,
}

impl MirvExecution {
    pub fn new(player: PlayerId, dst: TileRef) -> Self {
        Self {
            player,
            dst,
            speed: 0.0,
            state: MirvState::Uninitialized,
        }
    }

    /// The MIRV unit while it is in the air.
    pub fn unit(&self) -> Option<UnitId> {
        match &self.state {
            MirvState::Flying { unit, .. } => Some(*unit),
            _ => None,
        }
    }

    fn launch(&mut self, game: &mut dyn Game, random: PseudoRandom, defender: Owner) -> MirvState {
        if let Owner::Player(target) = defender {
            if game.player(self.player).is_allied_with(target) {
                if let Err(e) = game.break_alliance(self.player, target) {
                    log::warn!("MIRV betrayal of {:?} failed: {}", target, e);
                }
            }
            if target != self.player {
                game.update_relation(target, self.player, -100);
            }
        }

        let spawn = match game.can_build(self.player, UnitType::Mirv, self.dst) {
            Ok(spawn) => spawn,
            Err(e) => {
                log::warn!("cannot build MIRV: {}", e);
                return MirvState::Terminal;
            }
        };
        let params = UnitParams {
            target_tile: Some(self.dst),
            under_construction: false,
        };
        let unit = match game.build_unit(self.player, UnitType::Mirv, spawn, params) {
            Ok(unit) => unit,
            Err(e) => {
                log::warn!("cannot build MIRV: {}", e);
                return MirvState::Terminal;
            }
        };
        game.record_bomb_launch(self.player, defender, UnitType::Mirv);

        let x = (game.x(spawn) + game.x(self.dst)) / 2;
        let y = ((game.y(self.dst) - 500).max(0) + 50).min(game.height() as i32 - 1);
        let separation = game.ref_at(x, y);
        log::info!("{:?} MIRV inbound on {:?}", self.player, defender);

        MirvState::Flying {
            random,
            defender,
            unit,
            path: trajectory(&*game, spawn, separation, true),
        }
    }

    fn separate(&self, game: &mut dyn Game, random: &mut PseudoRandom, defender: Owner, unit: UnitId) {
        let Some(src) = game.unit(unit).map(|u| u.tile()) else {
            return;
        };
        let destinations = {
            let world = &*game;
            select_destinations(world, |t| world.owner(t), random, self.dst, defender)
        };
        log::debug!("MIRV of {:?} separates into {} warheads", self.player, destinations.len());
        for (i, dst) in destinations.into_iter().enumerate() {
            let speed = 15.0 + ((i as f64 / MIRV_WARHEADS as f64) * 5.0).floor();
            let wait = random.next_int(0, 15) as Tick;
            game.add_execution(Box::new(
                NukeExecution::new(UnitType::MirvWarhead, self.player, dst)
                    .from_tile(src)
                    .with_speed(speed)
                    .with_wait(wait),
            ));
        }
        game.delete_unit(unit, None);
    }
}

impl Execution for MirvExecution {
    fn init(&mut self, game: &mut dyn Game, ticks: Tick) {
        let seed = ticks.wrapping_add(simple_hash(&game.player(self.player).info().id));
        self.speed = game.config().nuke_speed;
        self.state = MirvState::Launching {
            random: PseudoRandom::new(seed),
            defender: game.owner(self.dst),
        };
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        match std::mem::replace(&mut self.state, MirvState::Terminal) {
            MirvState::Uninitialized => panic!("MirvExecution ticked before init"),
            MirvState::Launching { random, defender } => {
                self.state = self.launch(game, random, defender);
            }
            MirvState::Flying {
                mut random,
                defender,
                unit,
                mut path,
            } => {
                if !game.unit(unit).is_some_and(|u| u.is_active()) {
                    log::debug!("MIRV of {:?} was shot down", self.player);
                    return;
                }
                match path.advance(self.speed) {
                    Step::Arrived => self.separate(game, &mut random, defender, unit),
                    Step::Moved { x, y } => {
                        if game.is_valid_coord(x, y) {
                            let tile = game.ref_at(x, y);
                            game.move_unit(unit, tile);
                        }
                        self.state = MirvState::Flying {
                            random,
                            defender,
                            unit,
                            path,
                        };
                    }
                }
            }
            MirvState::Terminal => {}
        }
    }

    fn is_active(&self) -> bool {
        !matches!(self.state, MirvState::Terminal)
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "MirvExecution"
    }
}

#[cfg(test)]
#[path = "mirv_tests.rs"]
mod tests;
