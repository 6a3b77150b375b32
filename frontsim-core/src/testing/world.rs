//! In-memory world with a tick scheduler.
//!
//! Combat, shipping and interception are deliberately coarse: enough for the
//! AI to see its decisions play out, nowhere near the real balance.
//!
//! ## Tick order
//!
//! 1. Tick active executions in registration order (spawn-phase filter applies)
//! 2. Initialize executions queued during step 1, in queue order
//! 3. Drop inactive executions
//! 4. World update: attacks, ships, warships, SAMs, growth, expiries, winner
//! 5. `ticks += 1`

use super::entities::{AllianceState, SandboxPlayer, SandboxUnit, Voyage};
use super::map::SandboxMap;
use crate::config::Config;
use crate::execution::Execution;
use crate::game::{
    ActionError, AttackView, BuildError, EmojiRecipient, Game, GameMap, Gold, NearbyUnit, Owner, Player, PlayerId,
    PlayerInfo, Team, TerrainType, Tick, TileRef, Unit, UnitId, UnitParams, UnitType, Winner,
};
use crate::geometry::{circle_tiles, get_spawn_tiles};
use crate::random::{simple_hash, PseudoRandom};
use game_pathfinding::{AStar, Graph};
use rustc_hash::{FxHashMap, FxHasher};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use tracing::instrument;

const MAX_TRANSPORT_SHIPS: usize = 3;
const SHIP_SPEED: usize = 2;
const WARSHIP_RANGE: f64 = 30.0;
const SAM_COOLDOWN: Tick = 75;
const TILES_PER_ATTACK_STEP: usize = 8;
const UNCLAIMED_TILE_COST: f64 = 20.0;
const RANDOM_SPAWN_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct EmojiEvent {
    pub tick: Tick,
    pub sender: PlayerId,
    pub recipient: EmojiRecipient,
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BombLaunch {
    pub tick: Tick,
    pub player: PlayerId,
    pub target: Owner,
    pub kind: UnitType,
}

#[derive(Debug, Clone, Copy)]
struct Attack {
    attacker: PlayerId,
    target: Owner,
    troops: f64,
}

/// Sea lanes for transport ships: ocean tiles plus the landing tile.
struct SeaLanes<'a> {
    map: &'a SandboxMap,
    landing: TileRef,
}

impl Graph for SeaLanes<'_> {
    type Node = TileRef;

    fn neighbors(&self, node: TileRef, out: &mut Vec<TileRef>) {
        out.extend(
            self.map
                .neighbors(node)
                .into_iter()
                .filter(|&n| self.map.is_ocean(n) || n == self.landing),
        );
    }

    fn cost(&self, _from: TileRef, _to: TileRef) -> u32 {
        1
    }

    fn heuristic(&self, from: TileRef, goal: TileRef) -> u32 {
        self.map.manhattan_dist(from, goal)
    }
}

pub struct SandboxGame {
    map: SandboxMap,
    config: Config,
    game_id: String,
    ticks: Tick,
    owners: Vec<Option<PlayerId>>,
    fallout: Vec<bool>,
    num_fallout: usize,
    players: Vec<SandboxPlayer>,
    units: BTreeMap<UnitId, SandboxUnit>,
    next_unit: u32,
    attacks: Vec<Attack>,
    executions: Vec<Box<dyn Execution>>,
    pending: Vec<Box<dyn Execution>>,
    emoji_log: Vec<EmojiEvent>,
    last_emoji: FxHashMap<(PlayerId, EmojiRecipient), Tick>,
    last_alliance_request: FxHashMap<(PlayerId, PlayerId), Tick>,
    mirvs_launched: u64,
    bomb_log: Vec<BombLaunch>,
    winner: Option<Winner>,
    random: PseudoRandom,
}

impl SandboxGame {
    pub fn new(map: SandboxMap, config: Config, game_id: impl Into<String>) -> Self {
        let game_id = game_id.into();
        let size = (map.width() * map.height()) as usize;
        Self {
            map,
            config,
            random: PseudoRandom::new(simple_hash(&game_id)),
            game_id,
            ticks: 0,
            owners: vec![None; size],
            fallout: vec![false; size],
            num_fallout: 0,
            players: Vec::new(),
            units: BTreeMap::new(),
            next_unit: 0,
            attacks: Vec::new(),
            executions: Vec::new(),
            pending: Vec::new(),
            emoji_log: Vec::new(),
            last_emoji: FxHashMap::default(),
            last_alliance_request: FxHashMap::default(),
            mirvs_launched: 0,
            bomb_log: Vec::new(),
            winner: None,
        }
    }

    pub fn map(&self) -> &SandboxMap {
        &self.map
    }

    pub fn sandbox_player(&self, id: PlayerId) -> &SandboxPlayer {
        &self.players[id.0 as usize]
    }

    pub fn sandbox_unit(&self, id: UnitId) -> Option<&SandboxUnit> {
        self.units.get(&id)
    }

    pub fn emoji_log(&self) -> &[EmojiEvent] {
        &self.emoji_log
    }

    pub fn bomb_log(&self) -> &[BombLaunch] {
        &self.bomb_log
    }

    /// Executions registered and still active, pending ones excluded.
    pub fn num_executions(&self) -> usize {
        self.executions.len()
    }

    pub fn set_ticks(&mut self, ticks: Tick) {
        self.ticks = ticks;
    }

    pub fn set_troops(&mut self, player: PlayerId, troops: f64) {
        self.player_mut(player).troops = troops;
    }

    pub fn set_gold(&mut self, player: PlayerId, gold: Gold) {
        self.player_mut(player).gold = gold;
    }

    /// Overwrite `player`'s feelings towards `other`.
    pub fn set_relation(&mut self, player: PlayerId, other: PlayerId, score: i32) {
        self.player_mut(player).set_relation_score(other, score);
    }

    /// Ally two players without the request handshake.
    pub fn force_alliance(&mut self, a: PlayerId, b: PlayerId) {
        self.create_alliance(a, b);
    }

    pub fn set_target(&mut self, player: PlayerId, target: PlayerId) {
        let p = self.player_mut(player);
        if !p.targets.contains(&target) {
            p.targets.push(target);
        }
    }

    pub fn set_owner_at(&mut self, player: Option<PlayerId>, x: i32, y: i32) {
        let tile = self.map.ref_at(x, y);
        self.set_owner(tile, player);
    }

    /// Place a finished unit without paying for it.
    pub fn place_unit(&mut self, owner: PlayerId, kind: UnitType, tile: TileRef) -> UnitId {
        let id = self.insert_unit(owner, kind, tile, UnitParams::default());
        *self.player_mut(owner).constructed.entry(kind).or_insert(0) += 1;
        id
    }

    /// Advance the world by `n` ticks.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.execute_next_tick();
        }
    }

    /// One scheduler step.
    pub fn execute_next_tick(&mut self) {
        let ticks = self.ticks;
        let spawn_phase = self.in_spawn_phase();

        let mut executions = std::mem::take(&mut self.executions);
        for exec in executions.iter_mut() {
            if !exec.is_active() || (spawn_phase && !exec.active_during_spawn_phase()) {
                continue;
            }
            exec.tick(self, ticks);
        }

        while !self.pending.is_empty() {
            let mut admitted = std::mem::take(&mut self.pending);
            for exec in admitted.iter_mut() {
                log::trace!("init {}", exec.name());
                exec.init(self, ticks);
            }
            executions.append(&mut admitted);
        }
        executions.retain(|e| e.is_active());
        self.executions = executions;

        self.update_world();
        self.ticks += 1;
    }

    /// Stable fingerprint of the visible world state.
    pub fn checksum(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.ticks.hash(&mut hasher);
        self.owners.hash(&mut hasher);
        self.fallout.hash(&mut hasher);
        for p in &self.players {
            p.id.hash(&mut hasher);
            p.troops.to_bits().hash(&mut hasher);
            p.gold.hash(&mut hasher);
            p.relations.hash(&mut hasher);
            p.alliances.keys().for_each(|k| k.hash(&mut hasher));
            p.embargoes.hash(&mut hasher);
        }
        for (id, u) in &self.units {
            id.hash(&mut hasher);
            u.kind.hash(&mut hasher);
            u.owner.hash(&mut hasher);
            u.tile.hash(&mut hasher);
            u.active.hash(&mut hasher);
        }
        self.emoji_log.len().hash(&mut hasher);
        hasher.finish()
    }

    fn player_mut(&mut self, id: PlayerId) -> &mut SandboxPlayer {
        &mut self.players[id.0 as usize]
    }

    fn tile_index(tile: TileRef) -> usize {
        tile.0 as usize
    }

    fn insert_unit(&mut self, owner: PlayerId, kind: UnitType, tile: TileRef, params: UnitParams) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        self.units.insert(
            id,
            SandboxUnit {
                id,
                kind,
                owner,
                tile,
                level: 1,
                active: true,
                target_tile: params.target_tile,
                under_construction: params.under_construction,
                destroyed_by: None,
                voyage: None,
                last_fired: None,
            },
        );
        self.player_mut(owner).units.insert(id, (kind, 1));
        id
    }

    pub(crate) fn set_owner(&mut self, tile: TileRef, new: Option<PlayerId>) {
        let i = Self::tile_index(tile);
        let old = self.owners[i];
        if old == new {
            return;
        }
        if let Some(old) = old {
            let p = self.player_mut(old);
            p.tiles.remove(&tile);
            p.border.remove(&tile);
            self.destroy_structures_at(old, tile, new);
        }
        if let Some(new) = new {
            self.player_mut(new).tiles.insert(tile);
        }
        self.owners[i] = new;
        self.refresh_border(tile);
        for n in self.map.neighbors(tile) {
            self.refresh_border(n);
        }
    }

    fn refresh_border(&mut self, tile: TileRef) {
        let Some(owner) = self.owners[Self::tile_index(tile)] else {
            return;
        };
        let is_border = self
            .map
            .neighbors(tile)
            .into_iter()
            .any(|n| self.owners[Self::tile_index(n)] != Some(owner));
        let p = self.player_mut(owner);
        if is_border {
            p.border.insert(tile);
        } else {
            p.border.remove(&tile);
        }
    }

    /// Structures do not survive a change of hands.
    fn destroy_structures_at(&mut self, owner: PlayerId, tile: TileRef, by: Option<PlayerId>) {
        let doomed: Vec<UnitId> = self.players[owner.0 as usize]
            .units
            .iter()
            .filter(|(_, (kind, _))| kind.is_structure())
            .map(|(&id, _)| id)
            .filter(|id| self.units.get(id).is_some_and(|u| u.tile == tile))
            .collect();
        for id in doomed {
            self.delete_unit(id, by);
        }
    }

    pub(crate) fn refresh_neighbors(&mut self) {
        for i in 0..self.players.len() {
            let id = PlayerId(i as u16);
            let mut neighbors = BTreeSet::new();
            let mut unclaimed = false;
            for &tile in &self.players[i].border {
                for n in self.map.neighbors(tile) {
                    match self.owners[Self::tile_index(n)] {
                        Some(o) if o != id => {
                            neighbors.insert(o);
                        }
                        Some(_) => {}
                        None => unclaimed |= self.map.is_land(n),
                    }
                }
            }
            let p = &mut self.players[i];
            p.neighbors = neighbors;
            p.borders_unclaimed = unclaimed;
        }
    }

    fn sync_attacks(&mut self) {
        for p in &mut self.players {
            p.incoming.clear();
            p.outgoing.clear();
        }
        for a in &self.attacks {
            let view = AttackView {
                attacker: a.attacker,
                target: a.target,
                troops: a.troops,
            };
            self.players[a.attacker.0 as usize].outgoing.push(view);
            if let Owner::Player(t) = a.target {
                self.players[t.0 as usize].incoming.push(view);
            }
        }
    }

    fn create_alliance(&mut self, a: PlayerId, b: PlayerId) {
        let state = AllianceState {
            expires_at: self.ticks + self.config.alliance_duration,
            i_agreed_to_extend: false,
            they_agreed_to_extend: false,
        };
        self.player_mut(a).alliances.insert(b, state);
        self.player_mut(b).alliances.insert(a, state);
        self.player_mut(a).incoming_requests.remove(&b);
        self.player_mut(b).incoming_requests.remove(&a);
    }

    fn end_alliance(&mut self, a: PlayerId, b: PlayerId) {
        self.player_mut(a).alliances.remove(&b);
        self.player_mut(b).alliances.remove(&a);
    }

    fn alive(&self, id: PlayerId) -> bool {
        self.has_player(id) && self.players[id.0 as usize].is_alive()
    }

    fn random_free_land(&mut self) -> Option<TileRef> {
        let (w, h) = (self.map.width() as i64, self.map.height() as i64);
        for _ in 0..RANDOM_SPAWN_ATTEMPTS {
            let x = self.random.next_int(0, w) as i32;
            let y = self.random.next_int(0, h) as i32;
            let tile = self.map.ref_at(x, y);
            if self.map.is_land(tile) && !self.has_owner(tile) && !self.has_fallout(tile) {
                return Some(tile);
            }
        }
        None
    }

    #[instrument(skip_all, name = "world_update")]
    fn update_world(&mut self) {
        self.resolve_attacks();
        self.move_transport_ships();
        self.warships_engage();
        self.sams_intercept();
        self.grow();
        self.expire();
        self.refresh_neighbors();
        self.attacks.retain(|a| a.troops > 0.0);
        self.sync_attacks();
        self.check_winner();
    }

    fn resolve_attacks(&mut self) {
        let mut attacks = std::mem::take(&mut self.attacks);
        for attack in attacks.iter_mut() {
            if !self.alive(attack.attacker) {
                attack.troops = 0.0;
                continue;
            }
            let target_id = attack.target.player();
            let frontier: BTreeSet<TileRef> = self.players[attack.attacker.0 as usize]
                .border
                .iter()
                .flat_map(|&t| self.map.neighbors(t))
                .filter(|&n| self.map.is_land(n) && self.owners[Self::tile_index(n)] == target_id)
                .collect();

            let mut conquered = 0;
            for tile in frontier {
                if conquered >= TILES_PER_ATTACK_STEP || self.owners[Self::tile_index(tile)] != target_id {
                    continue;
                }
                let cost = match target_id {
                    None => UNCLAIMED_TILE_COST,
                    Some(d) => {
                        let defender = &self.players[d.0 as usize];
                        defender.troops / defender.tiles.len().max(1) as f64 + UNCLAIMED_TILE_COST
                    }
                };
                if attack.troops < cost {
                    break;
                }
                attack.troops -= cost;
                if let Some(d) = target_id {
                    let defender = self.player_mut(d);
                    defender.troops = (defender.troops - cost / 2.0).max(0.0);
                }
                self.set_owner(tile, Some(attack.attacker));
                conquered += 1;
            }

            if conquered == 0 {
                self.player_mut(attack.attacker).troops += attack.troops;
                attack.troops = 0.0;
            }
        }
        attacks.append(&mut self.attacks);
        self.attacks = attacks;
    }

    fn move_transport_ships(&mut self) {
        let ships: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.active && u.voyage.is_some())
            .map(|u| u.id)
            .collect();
        for id in ships {
            let Some(unit) = self.units.get_mut(&id) else {
                continue;
            };
            let Some(voyage) = unit.voyage.as_mut() else {
                continue;
            };
            voyage.position = (voyage.position + SHIP_SPEED).min(voyage.route.len().saturating_sub(1));
            unit.tile = voyage.route[voyage.position];
            if voyage.position + 1 < voyage.route.len() {
                continue;
            }
            let (owner, voyage) = (unit.owner, voyage.clone());
            self.land_troops(owner, &voyage);
            self.delete_unit(id, None);
        }
    }

    fn land_troops(&mut self, owner: PlayerId, voyage: &Voyage) {
        if !self.alive(owner) {
            return;
        }
        let holder = self.owner(voyage.dst);
        if holder != voyage.target || holder == Owner::Player(owner) {
            self.player_mut(owner).troops += voyage.troops;
            return;
        }
        self.set_owner(voyage.dst, Some(owner));
        log::debug!("{:?} landed {:.0} troops", owner, voyage.troops);
        self.attacks.push(Attack {
            attacker: owner,
            target: voyage.target,
            troops: voyage.troops,
        });
    }

    fn warships_engage(&mut self) {
        let warships: Vec<(PlayerId, TileRef)> = self
            .units
            .values()
            .filter(|u| u.kind == UnitType::Warship && u.is_operational())
            .map(|u| (u.owner, u.tile))
            .collect();
        for (owner, tile) in warships {
            let prey = self
                .nearby_units(tile, WARSHIP_RANGE, &[UnitType::TransportShip])
                .into_iter()
                .find(|n| {
                    self.units
                        .get(&n.unit)
                        .is_some_and(|u| u.owner != owner && !self.is_friendly(owner, u.owner))
                });
            if let Some(prey) = prey {
                log::debug!("{:?} sank transport {:?}", owner, prey.unit);
                self.delete_unit(prey.unit, Some(owner));
            }
        }
    }

    fn sams_intercept(&mut self) {
        let sams: Vec<(UnitId, PlayerId, TileRef, u32)> = self
            .units
            .values()
            .filter(|u| u.kind == UnitType::SamLauncher && u.is_operational())
            .filter(|u| u.last_fired.map_or(true, |t| t + SAM_COOLDOWN <= self.ticks))
            .map(|u| (u.id, u.owner, u.tile, u.level))
            .collect();
        for (sam, owner, tile, level) in sams {
            let range = self.config.sam_range(level);
            let target = self
                .nearby_units(tile, range, &[UnitType::AtomBomb, UnitType::HydrogenBomb])
                .into_iter()
                .find(|n| {
                    self.units
                        .get(&n.unit)
                        .is_some_and(|u| u.owner != owner && !self.is_friendly(owner, u.owner))
                });
            if let Some(target) = target {
                log::info!("SAM of {:?} intercepted {:?}", owner, target.unit);
                self.delete_unit(target.unit, Some(owner));
                if let Some(u) = self.units.get_mut(&sam) {
                    u.last_fired = Some(self.ticks);
                }
            }
        }
    }

    fn grow(&mut self) {
        for i in 0..self.players.len() {
            if !self.players[i].is_alive() {
                continue;
            }
            let max = self.config.max_troops(&self.players[i]);
            let p = &mut self.players[i];
            let growth = (10.0 + p.troops.powf(0.73) / 4.0) * (1.0 - p.troops / max);
            p.troops = (p.troops + growth.max(0.0)).min(max.max(p.troops));
            p.gold += 100 + (10.0 * (p.tiles.len() as f64).sqrt()) as Gold;
        }
    }

    fn expire(&mut self) {
        let ticks = self.ticks;
        let mut ended = Vec::new();
        for p in &mut self.players {
            for (&other, a) in &p.alliances {
                if a.expires_at <= ticks && p.id < other {
                    ended.push((p.id, other));
                }
            }
            if p.traitor_since.is_some_and(|t| t + self.config.traitor_duration <= ticks) {
                p.traitor_since = None;
            }
            p.embargoes.retain(|_, until| until.map_or(true, |t| t > ticks));
            let cooldown = self.config.alliance_request_cooldown;
            p.incoming_requests.retain(|_, &mut sent| sent + cooldown > ticks);
        }
        for (a, b) in ended {
            log::debug!("alliance between {:?} and {:?} expired", a, b);
            self.end_alliance(a, b);
        }
    }

    fn check_winner(&mut self) {
        if self.winner.is_some() || self.in_spawn_phase() {
            return;
        }
        let land = self.map.num_land_tiles().max(1) as f64;
        let needed = self.config.percentage_tiles_owned_to_win();
        if self.config.is_team_game() {
            let mut by_team: BTreeMap<Team, usize> = BTreeMap::new();
            for p in &self.players {
                if let Some(team) = p.team {
                    *by_team.entry(team).or_insert(0) += p.tiles.len();
                }
            }
            if let Some((&team, _)) = by_team.iter().find(|(_, &n)| n as f64 * 100.0 / land >= needed) {
                log::info!("team {:?} wins at tick {}", team, self.ticks);
                self.winner = Some(Winner::Team(team));
            }
        } else if let Some(p) = self
            .players
            .iter()
            .find(|p| p.tiles.len() as f64 * 100.0 / land >= needed)
        {
            log::info!("{} wins at tick {}", p.info.name, self.ticks);
            self.winner = Some(Winner::Player(p.id));
        }
    }
}

impl GameMap for SandboxGame {
    fn width(&self) -> u32 {
        self.map.width()
    }

    fn height(&self) -> u32 {
        self.map.height()
    }

    fn terrain(&self, tile: TileRef) -> TerrainType {
        self.map.terrain(tile)
    }

    fn magnitude(&self, tile: TileRef) -> u8 {
        self.map.magnitude(tile)
    }

    fn num_land_tiles(&self) -> usize {
        self.map.num_land_tiles()
    }
}

impl Game for SandboxGame {
    fn ticks(&self) -> Tick {
        self.ticks
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn game_id(&self) -> &str {
        &self.game_id
    }

    fn owner(&self, tile: TileRef) -> Owner {
        match self.owners[Self::tile_index(tile)] {
            Some(p) => Owner::Player(p),
            None => Owner::TerraNullius,
        }
    }

    fn has_fallout(&self, tile: TileRef) -> bool {
        self.fallout[Self::tile_index(tile)]
    }

    fn num_tiles_with_fallout(&self) -> usize {
        self.num_fallout
    }

    fn players(&self) -> Vec<PlayerId> {
        self.players.iter().filter(|p| p.is_alive()).map(|p| p.id).collect()
    }

    fn all_players(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    fn winner(&self) -> Option<Winner> {
        self.winner
    }

    fn has_player(&self, id: PlayerId) -> bool {
        (id.0 as usize) < self.players.len()
    }

    fn player(&self, id: PlayerId) -> &dyn Player {
        &self.players[id.0 as usize]
    }

    fn player_by_info_id(&self, id: &str) -> Option<PlayerId> {
        self.players.iter().find(|p| p.info.id == id).map(|p| p.id)
    }

    fn unit(&self, id: UnitId) -> Option<&dyn Unit> {
        self.units.get(&id).map(|u| u as &dyn Unit)
    }

    fn units(&self, kinds: &[UnitType]) -> Vec<UnitId> {
        self.units
            .values()
            .filter(|u| u.active && kinds.contains(&u.kind))
            .map(|u| u.id)
            .collect()
    }

    fn nearby_units(&self, tile: TileRef, radius: f64, kinds: &[UnitType]) -> Vec<NearbyUnit> {
        let limit = radius * radius;
        let mut found: Vec<NearbyUnit> = self
            .units
            .values()
            .filter(|u| u.active && kinds.contains(&u.kind))
            .map(|u| NearbyUnit {
                unit: u.id,
                dist_squared: self.map.euclidean_dist_squared(tile, u.tile),
            })
            .filter(|n| n.dist_squared as f64 <= limit)
            .collect();
        found.sort_by_key(|n| (n.dist_squared, n.unit));
        found
    }

    fn stats_mirvs_launched(&self) -> u64 {
        self.mirvs_launched
    }

    fn can_build(&self, player: PlayerId, kind: UnitType, tile: TileRef) -> Result<TileRef, BuildError> {
        if !self.alive(player) {
            return Err(BuildError::PlayerNotAlive(player));
        }
        let required = self.unit_cost(kind, player);
        let available = self.players[player.0 as usize].gold;
        if available < required {
            return Err(BuildError::InsufficientGold { required, available });
        }
        let me = &self.players[player.0 as usize];

        match kind {
            k if k.is_structure() => {
                if self.owner(tile) != Owner::Player(player) {
                    return Err(BuildError::NotOwner);
                }
                if k == UnitType::Port && !self.map.is_ocean_shore(tile) {
                    return Err(BuildError::InvalidTile);
                }
                let structures = [
                    UnitType::City,
                    UnitType::Port,
                    UnitType::Factory,
                    UnitType::DefensePost,
                    UnitType::SamLauncher,
                    UnitType::MissileSilo,
                ];
                if !self
                    .nearby_units(tile, self.config.structure_min_dist as f64, &structures)
                    .is_empty()
                {
                    return Err(BuildError::TooClose);
                }
                Ok(tile)
            }
            UnitType::AtomBomb | UnitType::HydrogenBomb | UnitType::Mirv => me
                .units(&[UnitType::MissileSilo])
                .into_iter()
                .filter_map(|id| self.units.get(&id))
                .filter(|u| u.is_operational())
                .min_by_key(|u| (self.map.euclidean_dist_squared(u.tile, tile), u.id))
                .map(|u| u.tile)
                .ok_or(BuildError::NoSpawnSource),
            UnitType::Warship => {
                if !self.map.is_ocean(tile) {
                    return Err(BuildError::InvalidTile);
                }
                me.units(&[UnitType::Port])
                    .into_iter()
                    .filter_map(|id| self.units.get(&id))
                    .filter(|u| u.is_operational())
                    .min_by_key(|u| (self.map.euclidean_dist_squared(u.tile, tile), u.id))
                    .map(|_| tile)
                    .ok_or(BuildError::NoSpawnSource)
            }
            UnitType::TransportShip => {
                if me.units(&[UnitType::TransportShip]).len() >= MAX_TRANSPORT_SHIPS {
                    return Err(BuildError::LimitReached);
                }
                if !self.map.is_land(tile) {
                    return Err(BuildError::InvalidTile);
                }
                me.border
                    .iter()
                    .copied()
                    .filter(|&t| self.map.is_ocean_shore(t))
                    .min_by_key(|&t| (self.map.manhattan_dist(t, tile), t))
                    .ok_or(BuildError::NoSpawnSource)
            }
            _ => Err(BuildError::InvalidTile),
        }
    }

    fn can_send_emoji(&self, sender: PlayerId, recipient: EmojiRecipient) -> bool {
        if recipient == EmojiRecipient::Player(sender) {
            return false;
        }
        match self.last_emoji.get(&(sender, recipient)) {
            Some(&last) => self.ticks.saturating_sub(last) >= self.config.emoji_cooldown,
            None => true,
        }
    }

    fn can_send_alliance_request(&self, from: PlayerId, to: PlayerId) -> bool {
        if from == to || !self.alive(from) || !self.alive(to) {
            return false;
        }
        let me = &self.players[from.0 as usize];
        if me.is_allied_with(to) || self.players[to.0 as usize].incoming_requests.contains_key(&from) {
            return false;
        }
        match self.last_alliance_request.get(&(from, to)) {
            Some(&last) => self.ticks.saturating_sub(last) >= self.config.alliance_request_cooldown,
            None => true,
        }
    }

    fn can_donate_gold(&self, from: PlayerId, to: PlayerId) -> bool {
        self.config.game.donate_gold && self.can_donate(from, to)
    }

    fn can_donate_troops(&self, from: PlayerId, to: PlayerId) -> bool {
        self.config.game.donate_troops && self.can_donate(from, to)
    }

    fn add_execution(&mut self, exec: Box<dyn Execution>) {
        self.pending.push(exec);
    }

    fn add_player(&mut self, info: PlayerInfo) -> PlayerId {
        let id = PlayerId(self.players.len() as u16);
        let team = self
            .config
            .is_team_game()
            .then(|| Team(id.0 as u32 % self.config.game.player_teams.max(1)));
        let troops = self.config.start_manpower(info.kind);
        log::debug!("player {} joins as {:?}", info.name, id);
        self.players.push(SandboxPlayer::new(id, info, team, troops));
        id
    }

    fn spawn_player(&mut self, player: PlayerId, tile: Option<TileRef>) -> Result<TileRef, ActionError> {
        if !self.has_player(player) {
            return Err(ActionError::UnknownPlayer(player));
        }
        let center = match tile {
            Some(t) if self.map.is_land(t) && !self.has_owner(t) => t,
            Some(_) => return Err(ActionError::NotAllowed("spawn tile unavailable")),
            None => self
                .random_free_land()
                .ok_or(ActionError::NotAllowed("no free land"))?,
        };
        let previous: Vec<TileRef> = self.players[player.0 as usize].tiles.iter().copied().collect();
        for t in previous {
            self.set_owner(t, None);
        }
        for t in get_spawn_tiles(&*self, center) {
            self.set_owner(t, Some(player));
        }
        self.refresh_neighbors();
        Ok(center)
    }

    fn update_relation(&mut self, player: PlayerId, other: PlayerId, delta: i32) {
        if player == other || !self.has_player(player) {
            return;
        }
        self.player_mut(player).shift_relation(other, delta);
    }

    fn donate_gold(&mut self, from: PlayerId, to: PlayerId, amount: Gold) -> Result<(), ActionError> {
        if !self.can_donate_gold(from, to) {
            return Err(ActionError::NotAllowed("gold donation"));
        }
        let available = self.players[from.0 as usize].gold;
        if available < amount {
            return Err(ActionError::InsufficientGold {
                required: amount,
                available,
            });
        }
        self.player_mut(from).gold -= amount;
        self.player_mut(to).gold += amount;
        Ok(())
    }

    fn donate_troops(&mut self, from: PlayerId, to: PlayerId, amount: f64) -> Result<(), ActionError> {
        if !self.can_donate_troops(from, to) {
            return Err(ActionError::NotAllowed("troop donation"));
        }
        let available = self.players[from.0 as usize].troops;
        if available < amount {
            return Err(ActionError::InsufficientTroops {
                required: amount,
                available,
            });
        }
        self.player_mut(from).troops -= amount;
        self.player_mut(to).troops += amount;
        Ok(())
    }

    fn break_alliance(&mut self, breaker: PlayerId, other: PlayerId) -> Result<(), ActionError> {
        if !self.has_player(breaker) || !self.players[breaker.0 as usize].is_allied_with(other) {
            return Err(ActionError::NoAlliance(breaker, other));
        }
        self.end_alliance(breaker, other);
        self.player_mut(breaker).traitor_since = Some(self.ticks);
        log::info!("{:?} broke the alliance with {:?}", breaker, other);
        Ok(())
    }

    fn request_alliance(&mut self, requestor: PlayerId, recipient: PlayerId) -> Result<(), ActionError> {
        if !self.can_send_alliance_request(requestor, recipient) {
            return Err(ActionError::NotAllowed("alliance request"));
        }
        let ticks = self.ticks;
        self.player_mut(recipient).incoming_requests.insert(requestor, ticks);
        self.last_alliance_request.insert((requestor, recipient), ticks);
        Ok(())
    }

    fn accept_alliance_request(&mut self, requestor: PlayerId, recipient: PlayerId) -> Result<(), ActionError> {
        if !self.has_player(recipient) || !self.players[recipient.0 as usize].incoming_requests.contains_key(&requestor) {
            return Err(ActionError::NotAllowed("no pending alliance request"));
        }
        self.create_alliance(requestor, recipient);
        log::debug!("{:?} and {:?} are now allied", requestor, recipient);
        Ok(())
    }

    fn reject_alliance_request(&mut self, requestor: PlayerId, recipient: PlayerId) -> Result<(), ActionError> {
        if !self.has_player(recipient)
            || self
                .player_mut(recipient)
                .incoming_requests
                .remove(&requestor)
                .is_none()
        {
            return Err(ActionError::NotAllowed("no pending alliance request"));
        }
        Ok(())
    }

    fn agree_to_extend_alliance(&mut self, player: PlayerId, other: PlayerId) -> Result<(), ActionError> {
        let ticks = self.ticks;
        let duration = self.config.alliance_duration;
        let mine = self.players[player.0 as usize].alliances.get(&other).copied();
        let Some(mut mine) = mine else {
            return Err(ActionError::NoAlliance(player, other));
        };
        mine.i_agreed_to_extend = true;
        let mut theirs = AllianceState {
            they_agreed_to_extend: true,
            ..mine
        };
        theirs.i_agreed_to_extend = mine.they_agreed_to_extend;
        if mine.they_agreed_to_extend {
            mine = AllianceState {
                expires_at: ticks + duration,
                i_agreed_to_extend: false,
                they_agreed_to_extend: false,
            };
            theirs = mine;
            log::debug!("alliance between {:?} and {:?} extended", player, other);
        }
        self.player_mut(player).alliances.insert(other, mine);
        self.player_mut(other).alliances.insert(player, theirs);
        Ok(())
    }

    fn add_embargo(&mut self, player: PlayerId, other: PlayerId, temporary: bool) {
        let until = temporary.then(|| self.ticks + self.config.temporary_embargo_duration);
        self.player_mut(player).embargoes.insert(other, until);
    }

    fn stop_embargo(&mut self, player: PlayerId, other: PlayerId) {
        self.player_mut(player).embargoes.remove(&other);
    }

    fn send_emoji(&mut self, sender: PlayerId, recipient: EmojiRecipient, emoji: &str) -> Result<(), ActionError> {
        if !self.can_send_emoji(sender, recipient) {
            return Err(ActionError::NotAllowed("emoji cooldown"));
        }
        self.last_emoji.insert((sender, recipient), self.ticks);
        self.emoji_log.push(EmojiEvent {
            tick: self.ticks,
            sender,
            recipient,
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    fn start_attack(
        &mut self,
        attacker: PlayerId,
        target: Owner,
        troops: f64,
        _source_tile: Option<TileRef>,
    ) -> Result<(), ActionError> {
        if !self.alive(attacker) {
            return Err(ActionError::UnknownPlayer(attacker));
        }
        if let Owner::Player(t) = target {
            if t == attacker || self.is_friendly(attacker, t) {
                return Err(ActionError::NotAllowed("cannot attack a friend"));
            }
        }
        let available = self.players[attacker.0 as usize].troops;
        if troops <= 0.0 || troops > available {
            return Err(ActionError::InsufficientTroops {
                required: troops,
                available,
            });
        }
        if !self.players[attacker.0 as usize].shares_border_with(target) {
            return Err(ActionError::NoRoute);
        }
        self.player_mut(attacker).troops -= troops;
        match self
            .attacks
            .iter_mut()
            .find(|a| a.attacker == attacker && a.target == target)
        {
            Some(existing) => existing.troops += troops,
            None => self.attacks.push(Attack {
                attacker,
                target,
                troops,
            }),
        }
        self.sync_attacks();
        Ok(())
    }

    fn launch_transport_ship(
        &mut self,
        owner: PlayerId,
        target: Owner,
        dst: TileRef,
        troops: f64,
        src: Option<TileRef>,
    ) -> Result<UnitId, ActionError> {
        let src = match src {
            Some(src) => src,
            None => self.can_build(owner, UnitType::TransportShip, dst)?,
        };
        let available = self.players[owner.0 as usize].troops;
        if troops <= 0.0 || troops > available {
            return Err(ActionError::InsufficientTroops {
                required: troops,
                available,
            });
        }
        let lanes = SeaLanes {
            map: &self.map,
            landing: dst,
        };
        let path = AStar::default().find_path(&lanes, src, dst).ok_or(ActionError::NoRoute)?;

        self.player_mut(owner).troops -= troops;
        let id = self.insert_unit(owner, UnitType::TransportShip, src, UnitParams::default());
        if let Some(unit) = self.units.get_mut(&id) {
            unit.voyage = Some(Voyage {
                route: path.nodes,
                position: 0,
                troops,
                target,
                dst,
            });
        }
        log::debug!("{:?} sails {:.0} troops towards {:?}", owner, troops, target);
        Ok(id)
    }

    fn build_unit(
        &mut self,
        owner: PlayerId,
        kind: UnitType,
        spawn: TileRef,
        params: UnitParams,
    ) -> Result<UnitId, ActionError> {
        if !self.alive(owner) {
            return Err(BuildError::PlayerNotAlive(owner).into());
        }
        let required = self.unit_cost(kind, owner);
        let available = self.players[owner.0 as usize].gold;
        if available < required {
            return Err(BuildError::InsufficientGold { required, available }.into());
        }
        self.player_mut(owner).gold -= required;
        let id = self.insert_unit(owner, kind, spawn, params);
        if !params.under_construction {
            *self.player_mut(owner).constructed.entry(kind).or_insert(0) += 1;
        }
        log::debug!("{:?} built {:?} {:?} for {} gold", owner, kind, id, required);
        Ok(id)
    }

    fn complete_construction(&mut self, unit: UnitId) {
        let Some(u) = self.units.get_mut(&unit) else {
            return;
        };
        if !u.active || !u.under_construction {
            return;
        }
        u.under_construction = false;
        let (owner, kind) = (u.owner, u.kind);
        *self.player_mut(owner).constructed.entry(kind).or_insert(0) += 1;
    }

    fn move_unit(&mut self, unit: UnitId, tile: TileRef) {
        if let Some(u) = self.units.get_mut(&unit) {
            u.tile = tile;
        }
    }

    fn delete_unit(&mut self, unit: UnitId, destroyer: Option<PlayerId>) {
        let Some(u) = self.units.get_mut(&unit) else {
            return;
        };
        if !u.active {
            return;
        }
        u.active = false;
        u.destroyed_by = destroyer;
        let owner = u.owner;
        self.player_mut(owner).units.remove(&unit);
    }

    #[instrument(skip_all, name = "detonate")]
    fn detonate_nuke(&mut self, unit: UnitId) {
        let Some(u) = self.units.get(&unit) else {
            return;
        };
        let (kind, owner, center) = (u.kind, u.owner, u.tile);
        let Some(magnitude) = self.config.nuke_magnitude(kind) else {
            return;
        };
        let inner_sq = (magnitude.inner as u64).pow(2);

        let blast: Vec<(TileRef, u64)> = circle_tiles(&self.map, center, magnitude.outer).collect();
        let mut cleared = BTreeSet::new();
        for (tile, dist_sq) in blast {
            if !self.map.is_land(tile) {
                continue;
            }
            if dist_sq > inner_sq && self.random.chance(2) {
                continue;
            }
            cleared.insert(tile);
        }

        // Structures die before their tiles change hands so the kill is credited.
        let near: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.active && u.kind.is_structure())
            .filter(|u| {
                self.map.euclidean_dist_squared(u.tile, center) <= inner_sq || cleared.contains(&u.tile)
            })
            .map(|u| u.id)
            .collect();
        for id in near {
            self.delete_unit(id, Some(owner));
        }

        let mut lost: BTreeMap<PlayerId, usize> = BTreeMap::new();
        for &tile in &cleared {
            if let Some(p) = self.owners[Self::tile_index(tile)] {
                *lost.entry(p).or_insert(0) += 1;
                self.set_owner(tile, None);
            }
            let i = Self::tile_index(tile);
            if !self.fallout[i] {
                self.fallout[i] = true;
                self.num_fallout += 1;
            }
        }
        for (p, tiles) in lost {
            let player = self.player_mut(p);
            let before = (player.tiles.len() + tiles) as f64;
            player.troops *= 1.0 - tiles as f64 / before;
        }
        log::info!("{:?} of {:?} detonated at {:?}", kind, owner, self.map.cell(center));
        self.delete_unit(unit, None);
        self.refresh_neighbors();
    }

    fn record_bomb_launch(&mut self, player: PlayerId, target: Owner, kind: UnitType) {
        if kind == UnitType::Mirv {
            self.mirvs_launched += 1;
        }
        self.bomb_log.push(BombLaunch {
            tick: self.ticks,
            player,
            target,
            kind,
        });
    }
}

impl SandboxGame {
    fn can_donate(&self, from: PlayerId, to: PlayerId) -> bool {
        from != to && self.alive(from) && self.alive(to) && self.is_friendly(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerKind;
    use crate::testing::GameBuilder;

    fn duel() -> SandboxGame {
        GameBuilder::new()
            .with_map(SandboxMap::land(40, 20))
            .with_player(PlayerInfo::new("a", "A", PlayerKind::Human))
            .with_player(PlayerInfo::new("b", "B", PlayerKind::Human))
            .with_square(PlayerId(0), 0, 0, 10)
            .with_square(PlayerId(1), 20, 0, 10)
            .at_tick(1_000)
            .build()
    }

    #[test]
    fn borders_and_neighbors() {
        let mut game = duel();
        assert_eq!(game.player(PlayerId(0)).border_tiles().len(), 19);
        assert!(game.player(PlayerId(0)).shares_border_with(Owner::TerraNullius));
        assert!(!game.player(PlayerId(0)).shares_border_with(Owner::Player(PlayerId(1))));

        for x in 10..20 {
            game.set_owner_at(Some(PlayerId(0)), x, 0);
        }
        game.refresh_neighbors();
        assert_eq!(game.player(PlayerId(0)).neighbors(), vec![PlayerId(1)]);
    }

    #[test]
    fn attack_into_unclaimed_land_grows_territory() {
        let mut game = duel();
        let before = game.player(PlayerId(0)).num_tiles_owned();
        game.start_attack(PlayerId(0), Owner::TerraNullius, 2_000.0, None).unwrap();
        game.run(5);
        assert!(game.player(PlayerId(0)).num_tiles_owned() > before);
    }

    #[test]
    fn attack_needs_a_border() {
        let mut game = duel();
        let err = game.start_attack(PlayerId(0), Owner::Player(PlayerId(1)), 100.0, None);
        assert_eq!(err, Err(ActionError::NoRoute));
    }

    #[test]
    fn alliance_handshake_and_extension() {
        let mut game = duel();
        game.request_alliance(PlayerId(0), PlayerId(1)).unwrap();
        assert!(!game.can_send_alliance_request(PlayerId(0), PlayerId(1)));
        game.accept_alliance_request(PlayerId(0), PlayerId(1)).unwrap();
        assert!(game.player(PlayerId(0)).is_allied_with(PlayerId(1)));

        let expires = game.player(PlayerId(0)).alliances()[0].expires_at;
        game.set_ticks(2_000);
        game.agree_to_extend_alliance(PlayerId(0), PlayerId(1)).unwrap();
        assert!(game.player(PlayerId(1)).alliances()[0].only_one_agreed_to_extend);
        game.agree_to_extend_alliance(PlayerId(1), PlayerId(0)).unwrap();
        assert!(game.player(PlayerId(0)).alliances()[0].expires_at > expires);
    }

    #[test]
    fn breaking_marks_a_traitor_until_it_expires() {
        let mut game = duel();
        game.force_alliance(PlayerId(0), PlayerId(1));
        game.break_alliance(PlayerId(0), PlayerId(1)).unwrap();
        assert!(game.player(PlayerId(0)).is_traitor());
        assert!(game.break_alliance(PlayerId(0), PlayerId(1)).is_err());
        game.run(game.config().traitor_duration + 1);
        assert!(!game.player(PlayerId(0)).is_traitor());
    }

    #[test]
    fn emoji_cooldown() {
        let mut game = duel();
        let to = EmojiRecipient::Player(PlayerId(1));
        game.send_emoji(PlayerId(0), to, "hi").unwrap();
        assert!(game.send_emoji(PlayerId(0), to, "again").is_err());
        assert!(game.can_send_emoji(PlayerId(0), EmojiRecipient::AllPlayers));
        assert!(!game.can_send_emoji(PlayerId(0), EmojiRecipient::Player(PlayerId(0))));
        game.set_ticks(1_000 + game.config().emoji_cooldown);
        assert!(game.can_send_emoji(PlayerId(0), to));
    }

    #[test]
    fn structures_keep_their_distance() {
        let mut game = duel();
        game.set_gold(PlayerId(0), 10_000_000);
        let tile = game.ref_at(2, 2);
        game.place_unit(PlayerId(0), UnitType::City, tile);
        assert_eq!(
            game.can_build(PlayerId(0), UnitType::City, game.ref_at(4, 4)),
            Err(BuildError::TooClose)
        );
        assert_eq!(
            game.can_build(PlayerId(0), UnitType::City, game.ref_at(25, 5)),
            Err(BuildError::NotOwner)
        );
    }

    #[test]
    fn nukes_need_a_silo() {
        let mut game = duel();
        game.set_gold(PlayerId(0), 10_000_000);
        let target = game.ref_at(25, 5);
        assert_eq!(
            game.can_build(PlayerId(0), UnitType::AtomBomb, target),
            Err(BuildError::NoSpawnSource)
        );
        let silo = game.ref_at(1, 1);
        game.place_unit(PlayerId(0), UnitType::MissileSilo, silo);
        assert_eq!(game.can_build(PlayerId(0), UnitType::AtomBomb, target), Ok(silo));
    }

    #[test]
    fn detonation_leaves_fallout_and_kills_structures() {
        let mut game = duel();
        let city = game.place_unit(PlayerId(1), UnitType::City, game.ref_at(25, 5));
        let bomb = game.place_unit(PlayerId(0), UnitType::AtomBomb, game.ref_at(25, 5));
        game.detonate_nuke(bomb);
        assert!(game.has_fallout(game.ref_at(25, 5)));
        assert_eq!(game.owner(game.ref_at(25, 5)), Owner::TerraNullius);
        let city = game.unit(city).unwrap();
        assert!(!city.is_active());
        assert_eq!(city.destroyer(), Some(PlayerId(0)));
        assert!(!game.unit(bomb).unwrap().is_active());
    }

    #[test]
    fn nuked_structures_are_credited_to_the_bomber() {
        let mut game = duel();
        let post = game.place_unit(PlayerId(1), UnitType::DefensePost, game.ref_at(28, 5));
        let factory = game.place_unit(PlayerId(1), UnitType::Factory, game.ref_at(22, 8));
        let bomb = game.place_unit(PlayerId(0), UnitType::AtomBomb, game.ref_at(25, 5));
        game.detonate_nuke(bomb);
        for id in [post, factory] {
            let unit = game.unit(id).unwrap();
            assert!(!unit.is_active());
            assert_eq!(unit.destroyer(), Some(PlayerId(0)));
            assert!(unit.was_destroyed_by_enemy());
        }
        assert_eq!(game.player(PlayerId(1)).units(&[UnitType::DefensePost, UnitType::Factory]), vec![]);
    }

    #[test]
    fn transport_ship_crosses_the_sea() {
        let map = SandboxMap::from_fn(30, 10, |x, _| {
            if (10..20).contains(&x) {
                (TerrainType::Ocean, 0)
            } else {
                (TerrainType::Plains, 0)
            }
        });
        let mut game = GameBuilder::new()
            .with_map(map)
            .with_player(PlayerInfo::new("a", "A", PlayerKind::Nation))
            .with_square(PlayerId(0), 0, 0, 10)
            .with_troops(PlayerId(0), 10_000.0)
            .at_tick(1_000)
            .build();
        let dst = game.ref_at(20, 5);
        let ship = game
            .launch_transport_ship(PlayerId(0), Owner::TerraNullius, dst, 1_000.0, None)
            .unwrap();
        assert_eq!(game.player(PlayerId(0)).units(&[UnitType::TransportShip]), vec![ship]);
        game.run(10);
        assert!(!game.unit(ship).unwrap().is_active());
        assert_eq!(game.owner(dst), Owner::Player(PlayerId(0)));
    }

    #[test]
    fn scheduler_initializes_queued_work_the_same_tick() {
        use crate::execution::EmojiExecution;
        let mut game = duel();
        game.add_execution(Box::new(EmojiExecution::new(
            PlayerId(0),
            EmojiRecipient::AllPlayers,
            "hello",
        )));
        game.execute_next_tick();
        assert_eq!(game.num_executions(), 1);
        assert!(game.emoji_log().is_empty());
        game.execute_next_tick();
        assert_eq!(game.emoji_log().len(), 1);
        assert_eq!(game.num_executions(), 0);
    }

    #[test]
    fn checksum_tracks_state() {
        let a = duel();
        let mut b = duel();
        assert_eq!(a.checksum(), b.checksum());
        b.set_troops(PlayerId(0), 1.0);
        assert_ne!(a.checksum(), b.checksum());
    }
}
