//! One AI Nation, driven tick by tick.
//!
//! ```text
//! Uninitialized --init--> Spawning --spawn phase over--> Active --dies--> Dead
//! ```
//!
//! While spawning the Nation asks for a tile near its map hint. The first
//! gated tick after the spawn phase builds the behavior modules and sends an
//! opening attack into unclaimed land; every later gated tick runs the
//! decision pipeline in a fixed order. Gating is `ticks % attack_rate ==
//! attack_tick`, so harder Nations act more often.

use super::{EmbargoAction, EmbargoExecution, Execution, SpawnExecution};
use crate::config::Difficulty;
use crate::game::{Cell, Game, Owner, PlayerId, PlayerInfo, Relation, TerrainType, Tick, TileRef};
use crate::nation::{
    AiContext, AllianceBehavior, AttackBehavior, EmojiBehavior, MirvBehavior, NukeBehavior, StructureBehavior,
    WarshipBehavior,
};
use crate::random::{simple_hash, PseudoRandom};
use std::collections::BTreeSet;
use tracing::instrument;

const SPAWN_SEARCH_RADIUS: i64 = 25;
const SPAWN_SEARCH_ATTEMPTS: usize = 50;
const EMBARGO_MALUS: i32 = -20;

fn attack_rate_range(difficulty: Difficulty) -> (i64, i64) {
    match difficulty {
        Difficulty::Easy => (65, 80),
        Difficulty::Medium => (55, 70),
        Difficulty::Hard => (45, 60),
        Difficulty::Impossible => (30, 50),
    }
}

/// Every behavior module of a Nation that has left the spawn phase.
#[derive(Debug)]
pub struct NationBehaviors {
    pub emoji: EmojiBehavior,
    pub mirv: MirvBehavior,
    pub alliance: AllianceBehavior,
    pub warship: WarshipBehavior,
    pub attack: AttackBehavior,
    pub nuke: NukeBehavior,
    pub structures: StructureBehavior,
}

#[derive(Debug)]
pub enum NationPhase {
    Uninitialized,
    Spawning,
    Active(Box<NationBehaviors>),
    Dead,
}

#[derive(Debug)]
pub struct NationExecution {
    info: PlayerInfo,
    spawn_cell: Option<Cell>,
    random: PseudoRandom,
    trigger_ratio: f64,
    reserve_ratio: f64,
    expand_ratio: f64,
    attack_rate: Tick,
    attack_tick: Tick,
    player: Option<PlayerId>,
    phase: NationPhase,
    embargo_malus_applied: BTreeSet<PlayerId>,
}

impl NationExecution {
    /// `spawn_cell` is the map's suggested home; `None` lets the world pick.
    pub fn new(game_id: &str, info: PlayerInfo, spawn_cell: Option<Cell>) -> Self {
        let mut random = PseudoRandom::new(simple_hash(&info.id).wrapping_add(simple_hash(game_id)));
        let trigger_ratio = random.next_int(50, 60) as f64 / 100.0;
        let reserve_ratio = random.next_int(30, 40) as f64 / 100.0;
        let expand_ratio = random.next_int(10, 20) as f64 / 100.0;
        Self {
            info,
            spawn_cell,
            random,
            trigger_ratio,
            reserve_ratio,
            expand_ratio,
            attack_rate: 1,
            attack_tick: 0,
            player: None,
            phase: NationPhase::Uninitialized,
            embargo_malus_applied: BTreeSet::new(),
        }
    }

    pub fn phase(&self) -> &NationPhase {
        &self.phase
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    /// `(trigger, reserve, expand)`.
    pub fn ratios(&self) -> (f64, f64, f64) {
        (self.trigger_ratio, self.reserve_ratio, self.expand_ratio)
    }

    pub fn attack_rate(&self) -> Tick {
        self.attack_rate
    }

    fn spawn(&mut self, game: &mut dyn Game) {
        let Some(cell) = self.spawn_cell else {
            game.add_execution(Box::new(SpawnExecution::new(self.info.clone(), None)));
            return;
        };
        match self.random_spawn_land(game, cell) {
            Some(tile) => game.add_execution(Box::new(SpawnExecution::new(self.info.clone(), Some(tile)))),
            None => log::warn!("cannot spawn {}", self.info.name),
        }
    }

    /// Free land near the hint, shying away from mountains.
    fn random_spawn_land(&mut self, game: &dyn Game, cell: Cell) -> Option<TileRef> {
        let (cx, cy) = (cell.x as i64, cell.y as i64);
        for _ in 0..SPAWN_SEARCH_ATTEMPTS {
            let x = self.random.next_int(cx - SPAWN_SEARCH_RADIUS, cx + SPAWN_SEARCH_RADIUS) as i32;
            let y = self.random.next_int(cy - SPAWN_SEARCH_RADIUS, cy + SPAWN_SEARCH_RADIUS) as i32;
            if !game.is_valid_coord(x, y) {
                continue;
            }
            let tile = game.ref_at(x, y);
            if !game.is_land(tile) || game.has_owner(tile) {
                continue;
            }
            if game.terrain(tile) == TerrainType::Mountain && self.random.chance(2) {
                continue;
            }
            return Some(tile);
        }
        None
    }

    #[instrument(skip_all, name = "nation_turn", fields(nation = %self.info.name))]
    fn take_turn(&mut self, game: &mut dyn Game, player: PlayerId) {
        let NationPhase::Active(b) = &mut self.phase else {
            return;
        };
        let b = &mut **b;
        let mut ctx = AiContext::new(game, &mut self.random, player);
        b.emoji.maybe_send_casual_emoji(&mut ctx);
        update_relations_from_embargoes(&mut ctx, &mut self.embargo_malus_applied);
        b.alliance.handle_alliance_requests(&mut ctx, &mut b.emoji);
        b.alliance.handle_alliance_extension_requests(&mut ctx, &mut b.emoji);
        b.mirv.consider_mirv(&mut ctx, &mut b.emoji);
        b.structures.handle_units(&mut ctx, &mut b.warship);
        handle_embargoes_to_hostile_nations(&mut ctx);
        b.attack.maybe_attack(&mut ctx, &mut b.alliance, &mut b.emoji);
        b.warship.counter_warship_infestation(&mut ctx, &mut b.emoji);
        b.nuke.maybe_send_nuke(&mut ctx, &mut b.attack, &mut b.emoji);
    }
}

impl Execution for NationExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        let (lo, hi) = attack_rate_range(game.config().difficulty());
        self.attack_rate = self.random.next_int(lo, hi).max(1) as Tick;
        self.attack_tick = self.random.next_int(0, self.attack_rate as i64) as Tick;

        let player = match game.player_by_info_id(&self.info.id) {
            Some(id) => id,
            None => game.add_player(self.info.clone()),
        };
        self.player = Some(player);
        self.phase = NationPhase::Spawning;
        log::debug!("{} acts every {} ticks", self.info.name, self.attack_rate);
    }

    fn tick(&mut self, game: &mut dyn Game, ticks: Tick) {
        let Some(player) = self.player else {
            panic!("NationExecution ticked before init");
        };

        if let NationPhase::Active(b) = &mut self.phase {
            let b = &mut **b;
            if game.player(player).is_alive() && game.config().difficulty() != Difficulty::Easy {
                let mut ctx = AiContext::new(game, &mut self.random, player);
                b.warship.track_ships_and_retaliate(&mut ctx, &mut b.emoji);
            }
        }

        if ticks % self.attack_rate != self.attack_tick {
            return;
        }

        if game.in_spawn_phase() {
            self.spawn(game);
            return;
        }

        if !game.player(player).is_alive() {
            log::info!("{} has been eliminated", self.info.name);
            self.phase = NationPhase::Dead;
            return;
        }

        if matches!(self.phase, NationPhase::Spawning) {
            let mut ctx = AiContext::new(game, &mut self.random, player);
            let emoji = EmojiBehavior::new();
            let mirv = MirvBehavior::new();
            let alliance = AllianceBehavior::new();
            let warship = WarshipBehavior::new();
            let attack = AttackBehavior::new(self.trigger_ratio, self.reserve_ratio, self.expand_ratio);
            let nuke = NukeBehavior::new(&mut ctx);
            let mut behaviors = NationBehaviors {
                emoji,
                mirv,
                alliance,
                warship,
                attack,
                nuke,
                structures: StructureBehavior::new(),
            };
            behaviors.attack.force_send_attack(&mut ctx, Owner::TerraNullius);
            self.phase = NationPhase::Active(Box::new(behaviors));
            return;
        }

        self.take_turn(game, player);
    }

    fn is_active(&self) -> bool {
        !matches!(self.phase, NationPhase::Dead)
    }

    fn active_during_spawn_phase(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "NationExecution"
    }
}

/// Each embargo against us costs its author 20 relation once; lifting it
/// gives the points back.
fn update_relations_from_embargoes(ctx: &mut AiContext<'_>, applied: &mut BTreeSet<PlayerId>) {
    let others: Vec<PlayerId> = ctx.game.players().into_iter().filter(|&p| p != ctx.player).collect();
    for other in others {
        let embargoed = ctx.game.player(other).has_embargo_against(ctx.player);
        if embargoed && !applied.contains(&other) {
            ctx.game.update_relation(ctx.player, other, EMBARGO_MALUS);
            applied.insert(other);
        } else if !embargoed && applied.remove(&other) {
            ctx.game.update_relation(ctx.player, other, -EMBARGO_MALUS);
        }
    }
}

/// Embargo hostile players until they are neutral again.
fn handle_embargoes_to_hostile_nations(ctx: &mut AiContext<'_>) {
    let mut orders = Vec::new();
    {
        let game = &*ctx.game;
        let me = game.player(ctx.player);
        for other in game.players() {
            if other == ctx.player {
                continue;
            }
            let relation = me.relation(other);
            let embargoed = me.has_embargo_against(other);
            if relation <= Relation::Hostile && !embargoed && !me.is_on_same_team(game.player(other)) {
                orders.push((other, EmbargoAction::Start));
            } else if relation >= Relation::Neutral && embargoed {
                orders.push((other, EmbargoAction::Stop));
            }
        }
    }
    for (other, action) in orders {
        log::debug!("{:?} embargo {:?}: {:?}", ctx.player, other, action);
        ctx.game
            .add_execution(Box::new(EmbargoExecution::new(ctx.player, other, action)));
    }
}

#[cfg(test)]
#[path = "nation_tests.rs"]
mod tests;
