//! Single-warhead strike: atom bomb, hydrogen bomb or one MIRV warhead.

use super::Execution;
use crate::game::{Game, Owner, PlayerId, Tick, TileRef, UnitId, UnitParams, UnitType};
use crate::geometry::{compute_nuke_blast_counts, trajectory};
use game_pathfinding::{ParabolaPath, Step};

#[derive(Debug)]
enum NukeState {
    Uninitialized,
    Waiting(Tick),
    Flying { unit: UnitId, path: ParabolaPath },
    Terminal,
}

#[derive(Debug)]
pub struct NukeExecution {
    kind: UnitType,
    owner: PlayerId,
    dst: TileRef,
    src: Option<TileRef>,
    speed: Option<f64>,
    wait_ticks: Tick,
    state: NukeState,
}

impl NukeExecution {
    pub fn new(kind: UnitType, owner: PlayerId, dst: TileRef) -> Self {
        Self {
            kind,
            owner,
            dst,
            src: None,
            speed: None,
            wait_ticks: 0,
            state: NukeState::Uninitialized,
        }
    }

    /// Launch from `src` instead of the nearest silo.
    pub fn from_tile(mut self, src: TileRef) -> Self {
        self.src = Some(src);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Hold the launch for `ticks` ticks after admission.
    pub fn with_wait(mut self, ticks: Tick) -> Self {
        self.wait_ticks = ticks;
        self
    }

    pub fn target(&self) -> TileRef {
        self.dst
    }

    /// The defender learns of the launch at once. Allies that would lose too
    /// much land stop being allies.
    fn declare(&self, game: &mut dyn Game) {
        let Owner::Player(target) = game.owner(self.dst) else {
            return;
        };
        if target == self.owner {
            return;
        }
        game.update_relation(target, self.owner, -100);

        let Some(magnitude) = game.config().nuke_magnitude(self.kind) else {
            return;
        };
        let threshold = game.config().nuke_alliance_break_threshold;
        let allies = game.player(self.owner).allies();
        let counts = compute_nuke_blast_counts(&*game, self.dst, magnitude);
        for ally in allies {
            if counts.get(&ally).is_some_and(|&c| c > threshold) {
                log::info!("{:?} nukes ally {:?}, alliance broken", self.owner, ally);
                if let Err(e) = game.break_alliance(self.owner, ally) {
                    log::warn!("cannot break alliance with {:?}: {}", ally, e);
                }
            }
        }
    }

    fn spawn(&self, game: &mut dyn Game) -> NukeState {
        let spawn = match self.src {
            Some(src) => src,
            None => match game.can_build(self.owner, self.kind, self.dst) {
                Ok(spawn) => spawn,
                Err(e) => {
                    log::warn!("cannot launch {:?}: {}", self.kind, e);
                    return NukeState::Terminal;
                }
            },
        };
        let params = UnitParams {
            target_tile: Some(self.dst),
            under_construction: false,
        };
        let unit = match game.build_unit(self.owner, self.kind, spawn, params) {
            Ok(unit) => unit,
            Err(e) => {
                log::warn!("cannot launch {:?}: {}", self.kind, e);
                return NukeState::Terminal;
            }
        };
        if self.kind != UnitType::MirvWarhead {
            let target = game.owner(self.dst);
            game.record_bomb_launch(self.owner, target, self.kind);
        }
        let path = trajectory(&*game, spawn, self.dst, self.kind != UnitType::MirvWarhead);
        NukeState::Flying { unit, path }
    }
}

impl Execution for NukeExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !game.has_player(self.owner) {
            log::warn!("NukeExecution: unknown owner {:?}", self.owner);
            self.state = NukeState::Terminal;
            return;
        }
        if self.speed.is_none() {
            self.speed = Some(game.config().nuke_speed);
        }
        if matches!(self.kind, UnitType::AtomBomb | UnitType::HydrogenBomb) {
            self.declare(game);
        }
        self.state = NukeState::Waiting(self.wait_ticks);
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        match std::mem::replace(&mut self.state, NukeState::Terminal) {
            NukeState::Uninitialized => panic!("NukeExecution ticked before init"),
            NukeState::Waiting(left) if left > 0 => self.state = NukeState::Waiting(left - 1),
            NukeState::Waiting(_) => self.state = self.spawn(game),
            NukeState::Flying { unit, mut path } => {
                if !game.unit(unit).is_some_and(|u| u.is_active()) {
                    log::debug!("{:?} of {:?} was intercepted", self.kind, self.owner);
                    return;
                }
                let speed = self.speed.unwrap_or(game.config().nuke_speed);
                match path.advance(speed) {
                    Step::Arrived => {
                        game.move_unit(unit, self.dst);
                        game.detonate_nuke(unit);
                    }
                    Step::Moved { x, y } => {
                        if game.is_valid_coord(x, y) {
                            let tile = game.ref_at(x, y);
                            game.move_unit(unit, tile);
                        }
                        self.state = NukeState::Flying { unit, path };
                    }
                }
            }
            NukeState::Terminal => {}
        }
    }

    fn is_active(&self) -> bool {
        !matches!(self.state, NukeState::Terminal)
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "NukeExecution"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMap, PlayerInfo, PlayerKind, Relation};
    use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

    /// Silo owner on the left, a block of defender land on the right.
    fn range() -> SandboxGame {
        GameBuilder::new()
            .with_map(SandboxMap::land(120, 60))
            .with_player(PlayerInfo::new("atk", "Attacker", PlayerKind::Nation))
            .with_player(PlayerInfo::new("def", "Defender", PlayerKind::Human))
            .with_square(PlayerId(0), 0, 0, 20)
            .with_square(PlayerId(1), 60, 0, 40)
            .with_unit(PlayerId(0), UnitType::MissileSilo, 5, 5)
            .with_gold(PlayerId(0), 10_000_000)
            .at_tick(1_000)
            .build()
    }

    fn atom_bomb(game: &SandboxGame) -> NukeExecution {
        NukeExecution::new(UnitType::AtomBomb, PlayerId(0), game.ref_at(80, 20))
    }

    #[test]
    fn atom_bomb_lands_and_irradiates() {
        let mut game = range();
        let dst = game.ref_at(80, 20);
        let exec = atom_bomb(&game);
        game.add_execution(Box::new(exec));
        game.run(100);

        assert_eq!(game.bomb_log().len(), 1);
        assert_eq!(game.bomb_log()[0].kind, UnitType::AtomBomb);
        assert_eq!(game.bomb_log()[0].target, Owner::Player(PlayerId(1)));
        assert!(game.has_fallout(dst));
        assert_eq!(game.owner(dst), Owner::TerraNullius);
        assert!(game.units(&[UnitType::AtomBomb]).is_empty());
        assert_eq!(game.num_executions(), 0);
        assert_eq!(game.player(PlayerId(1)).relation(PlayerId(0)), Relation::Hostile);
    }

    #[test]
    fn defender_hears_of_it_before_launch() {
        let mut game = range();
        let exec = atom_bomb(&game).with_wait(10);
        game.add_execution(Box::new(exec));
        game.run(5);
        assert!(game.bomb_log().is_empty());
        assert_eq!(game.player(PlayerId(1)).relation(PlayerId(0)), Relation::Hostile);

        game.run(10);
        assert_eq!(game.bomb_log().len(), 1);
    }

    #[test]
    fn no_silo_no_launch() {
        let mut game = range();
        let silo = game.units(&[UnitType::MissileSilo])[0];
        game.delete_unit(silo, None);
        let exec = atom_bomb(&game);
        game.add_execution(Box::new(exec));
        game.run(3);

        assert!(game.bomb_log().is_empty());
        assert!(game.player(PlayerId(0)).gold() >= 10_000_000);
        assert_eq!(game.num_executions(), 0);
    }

    #[test]
    fn shot_down_bomb_does_no_harm() {
        let mut game = range();
        let dst = game.ref_at(80, 20);
        let exec = atom_bomb(&game);
        game.add_execution(Box::new(exec));
        game.run(3);
        let bomb = game.units(&[UnitType::AtomBomb]);
        assert_eq!(bomb.len(), 1);

        game.delete_unit(bomb[0], Some(PlayerId(1)));
        game.run(100);
        assert!(!game.has_fallout(dst));
        assert_eq!(game.owner(dst), Owner::Player(PlayerId(1)));
        assert_eq!(game.num_executions(), 0);
    }

    #[test]
    fn heavy_strike_on_an_ally_ends_the_alliance() {
        let mut game = range();
        game.force_alliance(PlayerId(0), PlayerId(1));
        let exec = atom_bomb(&game);
        game.add_execution(Box::new(exec));
        game.run(1);

        assert!(!game.player(PlayerId(0)).is_allied_with(PlayerId(1)));
        assert!(game.player(PlayerId(0)).is_traitor());
    }

    #[test]
    fn warheads_strike_unannounced() {
        let mut game = range();
        let (dst, src) = (game.ref_at(80, 20), game.ref_at(40, 20));
        let exec = NukeExecution::new(UnitType::MirvWarhead, PlayerId(0), dst).from_tile(src);
        game.add_execution(Box::new(exec));
        game.run(2);

        assert!(game.bomb_log().is_empty());
        assert_eq!(game.player(PlayerId(1)).relation(PlayerId(0)), Relation::Neutral);
        assert_eq!(game.units(&[UnitType::MirvWarhead]).len(), 1);
    }
}
