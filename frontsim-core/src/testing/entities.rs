use crate::game::{
    AllianceView, AttackView, Gold, Owner, Player, PlayerId, PlayerInfo, Relation, Team, Tick, TileRef, Unit, UnitId,
    UnitType,
};
use std::collections::{BTreeMap, BTreeSet};

const RELATION_BOUND: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AllianceState {
    pub expires_at: Tick,
    pub i_agreed_to_extend: bool,
    pub they_agreed_to_extend: bool,
}

#[derive(Debug, Clone)]
pub struct SandboxPlayer {
    pub(crate) id: PlayerId,
    pub(crate) info: PlayerInfo,
    pub(crate) team: Option<Team>,
    pub(crate) disconnected: bool,
    pub(crate) troops: f64,
    pub(crate) gold: Gold,
    pub(crate) tiles: BTreeSet<TileRef>,
    pub(crate) border: BTreeSet<TileRef>,
    pub(crate) neighbors: BTreeSet<PlayerId>,
    pub(crate) borders_unclaimed: bool,
    pub(crate) relations: BTreeMap<PlayerId, i32>,
    pub(crate) traitor_since: Option<Tick>,
    pub(crate) alliances: BTreeMap<PlayerId, AllianceState>,
    /// Pending requests addressed to us, by requestor, with the tick sent.
    pub(crate) incoming_requests: BTreeMap<PlayerId, Tick>,
    /// `None` for a permanent embargo, otherwise the tick it lapses.
    pub(crate) embargoes: BTreeMap<PlayerId, Option<Tick>>,
    pub(crate) targets: Vec<PlayerId>,
    pub(crate) incoming: Vec<AttackView>,
    pub(crate) outgoing: Vec<AttackView>,
    /// Active units with their kind and level.
    pub(crate) units: BTreeMap<UnitId, (UnitType, u32)>,
    pub(crate) constructed: BTreeMap<UnitType, u32>,
}

impl SandboxPlayer {
    pub(crate) fn new(id: PlayerId, info: PlayerInfo, team: Option<Team>, troops: f64) -> Self {
        Self {
            id,
            info,
            team,
            disconnected: false,
            troops,
            gold: 0,
            tiles: BTreeSet::new(),
            border: BTreeSet::new(),
            neighbors: BTreeSet::new(),
            borders_unclaimed: false,
            relations: BTreeMap::new(),
            traitor_since: None,
            alliances: BTreeMap::new(),
            incoming_requests: BTreeMap::new(),
            embargoes: BTreeMap::new(),
            targets: Vec::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            units: BTreeMap::new(),
            constructed: BTreeMap::new(),
        }
    }

    pub fn relation_score(&self, other: PlayerId) -> i32 {
        self.relations.get(&other).copied().unwrap_or(0)
    }

    pub(crate) fn set_relation_score(&mut self, other: PlayerId, score: i32) {
        self.relations
            .insert(other, score.clamp(-RELATION_BOUND, RELATION_BOUND));
    }

    pub(crate) fn shift_relation(&mut self, other: PlayerId, delta: i32) {
        let score = self.relation_score(other).saturating_add(delta);
        self.set_relation_score(other, score);
    }
}

impl Player for SandboxPlayer {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn info(&self) -> &PlayerInfo {
        &self.info
    }

    fn team(&self) -> Option<Team> {
        self.team
    }

    fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn troops(&self) -> f64 {
        self.troops
    }

    fn gold(&self) -> Gold {
        self.gold
    }

    fn tiles(&self) -> &BTreeSet<TileRef> {
        &self.tiles
    }

    fn border_tiles(&self) -> &BTreeSet<TileRef> {
        &self.border
    }

    fn neighbors(&self) -> Vec<PlayerId> {
        self.neighbors.iter().copied().collect()
    }

    fn shares_border_with(&self, other: Owner) -> bool {
        match other {
            Owner::TerraNullius => self.borders_unclaimed,
            Owner::Player(p) => self.neighbors.contains(&p),
        }
    }

    fn relation(&self, other: PlayerId) -> Relation {
        Relation::from_score(self.relation_score(other))
    }

    fn all_relations_sorted(&self) -> Vec<(PlayerId, Relation)> {
        let mut scored: Vec<(PlayerId, i32)> = self.relations.iter().map(|(&p, &s)| (p, s)).collect();
        scored.sort_by_key(|&(p, s)| (s, p));
        scored
            .into_iter()
            .map(|(p, s)| (p, Relation::from_score(s)))
            .collect()
    }

    fn is_traitor(&self) -> bool {
        self.traitor_since.is_some()
    }

    fn alliances(&self) -> Vec<AllianceView> {
        self.alliances
            .iter()
            .map(|(&other, a)| AllianceView {
                other,
                expires_at: a.expires_at,
                only_one_agreed_to_extend: a.they_agreed_to_extend && !a.i_agreed_to_extend,
            })
            .collect()
    }

    fn is_allied_with(&self, other: PlayerId) -> bool {
        self.alliances.contains_key(&other)
    }

    fn incoming_alliance_requests(&self) -> Vec<PlayerId> {
        self.incoming_requests.keys().copied().collect()
    }

    fn has_embargo_against(&self, other: PlayerId) -> bool {
        self.embargoes.contains_key(&other)
    }

    fn targets(&self) -> Vec<PlayerId> {
        self.targets.clone()
    }

    fn incoming_attacks(&self) -> Vec<AttackView> {
        self.incoming.clone()
    }

    fn outgoing_attacks(&self) -> Vec<AttackView> {
        self.outgoing.clone()
    }

    fn units(&self, kinds: &[UnitType]) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|(_, (kind, _))| kinds.contains(kind))
            .map(|(&id, _)| id)
            .collect()
    }

    fn units_owned(&self, kind: UnitType) -> u32 {
        self.units
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|&(_, level)| level)
            .sum()
    }

    fn units_constructed(&self, kind: UnitType) -> u32 {
        self.constructed.get(&kind).copied().unwrap_or(0)
    }
}

/// Troops at sea, heading for `dst`.
#[derive(Debug, Clone)]
pub(crate) struct Voyage {
    pub route: Vec<TileRef>,
    pub position: usize,
    pub troops: f64,
    pub target: Owner,
    pub dst: TileRef,
}

#[derive(Debug, Clone)]
pub struct SandboxUnit {
    pub(crate) id: UnitId,
    pub(crate) kind: UnitType,
    pub(crate) owner: PlayerId,
    pub(crate) tile: TileRef,
    pub(crate) level: u32,
    pub(crate) active: bool,
    pub(crate) target_tile: Option<TileRef>,
    pub(crate) under_construction: bool,
    pub(crate) destroyed_by: Option<PlayerId>,
    pub(crate) voyage: Option<Voyage>,
    /// SAM reload.
    pub(crate) last_fired: Option<Tick>,
}

impl SandboxUnit {
    pub fn is_under_construction(&self) -> bool {
        self.under_construction
    }

    /// Built, alive and not waiting for construction.
    pub(crate) fn is_operational(&self) -> bool {
        self.active && !self.under_construction
    }
}

impl Unit for SandboxUnit {
    fn id(&self) -> UnitId {
        self.id
    }

    fn kind(&self) -> UnitType {
        self.kind
    }

    fn owner(&self) -> PlayerId {
        self.owner
    }

    fn tile(&self) -> TileRef {
        self.tile
    }

    fn level(&self) -> u32 {
        self.level
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn target_tile(&self) -> Option<TileRef> {
        self.target_tile
    }

    fn was_destroyed_by_enemy(&self) -> bool {
        self.destroyed_by.is_some_and(|d| d != self.owner)
    }

    fn destroyer(&self) -> Option<PlayerId> {
        self.destroyed_by
    }
}
