//! The world as seen from the execution layer.
//!
//! The engine never owns tiles, ownership or combat. It talks to the world
//! through the traits in this module:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`GameMap`] | coordinates, terrain, distances |
//! | [`Game`] | players, units, eligibility checks and every mutation |
//! | [`Player`] | read-only view of one player |
//! | [`Unit`] | read-only view of one unit |
//!
//! Players and units are addressed by copyable ids. Views are borrowed from
//! the world for the duration of a read, mutations go through [`Game`] so no
//! borrow of a view is alive while the world changes.

use crate::config::Config;
use crate::execution::Execution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub type Tick = u64;
pub type Gold = u64;

/// Opaque tile identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Small numeric id the world assigns to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Team(pub u32);

/// Who holds a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Owner {
    TerraNullius,
    Player(PlayerId),
}

impl Owner {
    pub fn player(self) -> Option<PlayerId> {
        match self {
            Owner::TerraNullius => None,
            Owner::Player(id) => Some(id),
        }
    }

    pub fn is_player(self) -> bool {
        matches!(self, Owner::Player(_))
    }
}

impl From<PlayerId> for Owner {
    fn from(id: PlayerId) -> Self {
        Owner::Player(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    Human,
    Bot,
    Nation,
}

/// Stable identity of a player, known before the world assigns a [`PlayerId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub kind: PlayerKind,
}

impl PlayerInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: PlayerKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Ordinal view of the numeric relation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relation {
    Hostile = 0,
    Distrustful = 1,
    Neutral = 2,
    Friendly = 3,
}

impl Relation {
    /// Bucket a score in `[-100, 100]`.
    pub fn from_score(score: i32) -> Self {
        if score <= -50 {
            Relation::Hostile
        } else if score < 0 {
            Relation::Distrustful
        } else if score < 50 {
            Relation::Neutral
        } else {
            Relation::Friendly
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    Plains,
    Highland,
    Mountain,
    Lake,
    Ocean,
}

impl TerrainType {
    pub fn is_land(self) -> bool {
        matches!(self, TerrainType::Plains | TerrainType::Highland | TerrainType::Mountain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitType {
    TransportShip,
    Warship,
    Shell,
    SamMissile,
    Port,
    AtomBomb,
    HydrogenBomb,
    TradeShip,
    MissileSilo,
    DefensePost,
    SamLauncher,
    City,
    Mirv,
    MirvWarhead,
    Factory,
    Train,
}

impl UnitType {
    pub fn is_nuke(self) -> bool {
        matches!(self, UnitType::AtomBomb | UnitType::HydrogenBomb | UnitType::MirvWarhead)
    }

    /// Structures are built on owned land and stay there.
    pub fn is_structure(self) -> bool {
        matches!(
            self,
            UnitType::City
                | UnitType::Port
                | UnitType::Factory
                | UnitType::DefensePost
                | UnitType::SamLauncher
                | UnitType::MissileSilo
        )
    }
}

/// Who won the match, once decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Winner {
    Player(PlayerId),
    Team(Team),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmojiRecipient {
    AllPlayers,
    Player(PlayerId),
}

/// An attack in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackView {
    pub attacker: PlayerId,
    pub target: Owner,
    pub troops: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllianceView {
    pub other: PlayerId,
    pub expires_at: Tick,
    /// The other side asked to extend and we have not answered yet.
    pub only_one_agreed_to_extend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearbyUnit {
    pub unit: UnitId,
    pub dist_squared: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UnitParams {
    pub target_tile: Option<TileRef>,
    pub under_construction: bool,
}

/// Why a unit cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Insufficient gold: required {required}, available {available}")]
    InsufficientGold { required: Gold, available: Gold },
    #[error("Tile is not valid for this unit")]
    InvalidTile,
    #[error("Tile is not owned by the builder")]
    NotOwner,
    #[error("No launch site or port can reach the target")]
    NoSpawnSource,
    #[error("Too close to another structure")]
    TooClose,
    #[error("Player {0:?} is not alive")]
    PlayerNotAlive(PlayerId),
    #[error("Unit limit reached")]
    LimitReached,
}

/// Why the world refused a mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("Unknown player: {0:?}")]
    UnknownPlayer(PlayerId),
    #[error("Not allowed: {0}")]
    NotAllowed(&'static str),
    #[error("Insufficient gold: required {required}, available {available}")]
    InsufficientGold { required: Gold, available: Gold },
    #[error("Insufficient troops: required {required}, available {available}")]
    InsufficientTroops { required: f64, available: f64 },
    #[error("No alliance between {0:?} and {1:?}")]
    NoAlliance(PlayerId, PlayerId),
    #[error("No route to target")]
    NoRoute,
    #[error("Unknown unit: {0:?}")]
    UnknownUnit(UnitId),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Tile grid queries. Tiles are laid out row-major unless an implementation
/// overrides the coordinate helpers.
pub trait GameMap {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn terrain(&self, tile: TileRef) -> TerrainType;
    /// Elevation, higher is better for defensive structures.
    fn magnitude(&self, tile: TileRef) -> u8;
    fn num_land_tiles(&self) -> usize;

    fn is_valid_coord(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    /// Tile at a valid coordinate.
    fn ref_at(&self, x: i32, y: i32) -> TileRef {
        TileRef(y as u32 * self.width() + x as u32)
    }

    fn x(&self, tile: TileRef) -> i32 {
        (tile.0 % self.width()) as i32
    }

    fn y(&self, tile: TileRef) -> i32 {
        (tile.0 / self.width()) as i32
    }

    fn cell(&self, tile: TileRef) -> Cell {
        Cell::new(self.x(tile), self.y(tile))
    }

    fn is_land(&self, tile: TileRef) -> bool {
        self.terrain(tile).is_land()
    }

    fn is_ocean(&self, tile: TileRef) -> bool {
        self.terrain(tile) == TerrainType::Ocean
    }

    /// Land tile touching ocean.
    fn is_ocean_shore(&self, tile: TileRef) -> bool {
        self.is_land(tile) && self.neighbors(tile).into_iter().any(|n| self.is_ocean(n))
    }

    /// Orthogonal neighbors on the map.
    fn neighbors(&self, tile: TileRef) -> Vec<TileRef> {
        let (x, y) = (self.x(tile), self.y(tile));
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter(|&(nx, ny)| self.is_valid_coord(nx, ny))
            .map(|(nx, ny)| self.ref_at(nx, ny))
            .collect()
    }

    fn manhattan_dist(&self, a: TileRef, b: TileRef) -> u32 {
        (self.x(a) - self.x(b)).unsigned_abs() + (self.y(a) - self.y(b)).unsigned_abs()
    }

    fn euclidean_dist_squared(&self, a: TileRef, b: TileRef) -> u64 {
        let dx = (self.x(a) - self.x(b)) as i64;
        let dy = (self.y(a) - self.y(b)) as i64;
        (dx * dx + dy * dy) as u64
    }
}

/// Read-only view of a unit.
pub trait Unit {
    fn id(&self) -> UnitId;
    fn kind(&self) -> UnitType;
    fn owner(&self) -> PlayerId;
    fn tile(&self) -> TileRef;
    fn level(&self) -> u32;
    fn is_active(&self) -> bool;
    fn target_tile(&self) -> Option<TileRef>;
    fn was_destroyed_by_enemy(&self) -> bool;
    fn destroyer(&self) -> Option<PlayerId>;
}

/// Read-only view of a player.
pub trait Player {
    fn id(&self) -> PlayerId;
    fn info(&self) -> &PlayerInfo;
    fn team(&self) -> Option<Team>;
    fn is_disconnected(&self) -> bool;
    fn troops(&self) -> f64;
    fn gold(&self) -> Gold;
    fn tiles(&self) -> &BTreeSet<TileRef>;
    /// Owned tiles with at least one neighbor owned by someone else (or
    /// nobody, water included).
    fn border_tiles(&self) -> &BTreeSet<TileRef>;
    /// Players sharing a land border, ascending id.
    fn neighbors(&self) -> Vec<PlayerId>;
    fn shares_border_with(&self, other: Owner) -> bool;
    fn relation(&self, other: PlayerId) -> Relation;
    /// Every known relation, most hated first.
    fn all_relations_sorted(&self) -> Vec<(PlayerId, Relation)>;
    fn is_traitor(&self) -> bool;
    fn alliances(&self) -> Vec<AllianceView>;
    fn is_allied_with(&self, other: PlayerId) -> bool;
    /// Players whose alliance request to us is pending.
    fn incoming_alliance_requests(&self) -> Vec<PlayerId>;
    fn has_embargo_against(&self, other: PlayerId) -> bool;
    fn targets(&self) -> Vec<PlayerId>;
    fn incoming_attacks(&self) -> Vec<AttackView>;
    fn outgoing_attacks(&self) -> Vec<AttackView>;
    /// Active units of the given kinds, ascending id.
    fn units(&self, kinds: &[UnitType]) -> Vec<UnitId>;
    /// Sum of levels of owned units of `kind`.
    fn units_owned(&self, kind: UnitType) -> u32;
    /// Units of `kind` ever completed by this player.
    fn units_constructed(&self, kind: UnitType) -> u32;

    fn kind(&self) -> PlayerKind {
        self.info().kind
    }

    fn name(&self) -> &str {
        &self.info().name
    }

    fn is_alive(&self) -> bool {
        !self.tiles().is_empty()
    }

    fn num_tiles_owned(&self) -> usize {
        self.tiles().len()
    }

    fn unit_count(&self, kind: UnitType) -> u32 {
        self.units_owned(kind)
    }

    fn allies(&self) -> Vec<PlayerId> {
        self.alliances().into_iter().map(|a| a.other).collect()
    }

    fn alliance_with(&self, other: PlayerId) -> Option<AllianceView> {
        self.alliances().into_iter().find(|a| a.other == other)
    }

    fn is_on_same_team(&self, other: &dyn Player) -> bool {
        if other.id() == self.id() {
            return false;
        }
        matches!((self.team(), other.team()), (Some(a), Some(b)) if a == b)
    }

    /// Teammate or ally. Disconnected players are never friendly.
    fn is_friendly(&self, other: &dyn Player) -> bool {
        if other.is_disconnected() {
            return false;
        }
        self.is_on_same_team(other) || self.is_allied_with(other.id())
    }

    fn incoming_attack_troops(&self) -> f64 {
        self.incoming_attacks().iter().map(|a| a.troops).sum()
    }

    fn outgoing_attack_troops(&self) -> f64 {
        self.outgoing_attacks().iter().map(|a| a.troops).sum()
    }
}

/// The world. Queries take `&self`, every mutation takes `&mut self`.
pub trait Game: GameMap {
    fn ticks(&self) -> Tick;
    fn config(&self) -> &Config;
    fn game_id(&self) -> &str;
    fn owner(&self, tile: TileRef) -> Owner;
    fn has_fallout(&self, tile: TileRef) -> bool;
    fn num_tiles_with_fallout(&self) -> usize;
    /// Alive players in registration order.
    fn players(&self) -> Vec<PlayerId>;
    /// Every registered player, dead ones included.
    fn all_players(&self) -> Vec<PlayerId>;
    fn winner(&self) -> Option<Winner>;
    fn has_player(&self, id: PlayerId) -> bool;
    /// View of a registered player. Panics for ids the world never issued.
    fn player(&self, id: PlayerId) -> &dyn Player;
    fn player_by_info_id(&self, id: &str) -> Option<PlayerId>;
    fn unit(&self, id: UnitId) -> Option<&dyn Unit>;
    /// Active units of the given kinds across all players.
    fn units(&self, kinds: &[UnitType]) -> Vec<UnitId>;
    fn nearby_units(&self, tile: TileRef, radius: f64, kinds: &[UnitType]) -> Vec<NearbyUnit>;
    fn stats_mirvs_launched(&self) -> u64;

    /// Where `kind` would spawn to reach `tile`, or why it cannot.
    fn can_build(&self, player: PlayerId, kind: UnitType, tile: TileRef) -> Result<TileRef, BuildError>;
    fn can_send_emoji(&self, sender: PlayerId, recipient: EmojiRecipient) -> bool;
    fn can_send_alliance_request(&self, from: PlayerId, to: PlayerId) -> bool;
    fn can_donate_gold(&self, from: PlayerId, to: PlayerId) -> bool;
    fn can_donate_troops(&self, from: PlayerId, to: PlayerId) -> bool;

    fn add_execution(&mut self, exec: Box<dyn Execution>);
    fn add_player(&mut self, info: PlayerInfo) -> PlayerId;
    /// Place a player's starting territory, at `tile` or somewhere free.
    fn spawn_player(&mut self, player: PlayerId, tile: Option<TileRef>) -> Result<TileRef, ActionError>;
    /// Shift `player`'s feelings towards `other`.
    fn update_relation(&mut self, player: PlayerId, other: PlayerId, delta: i32);
    fn donate_gold(&mut self, from: PlayerId, to: PlayerId, amount: Gold) -> Result<(), ActionError>;
    fn donate_troops(&mut self, from: PlayerId, to: PlayerId, amount: f64) -> Result<(), ActionError>;
    /// Ends an alliance and marks `breaker` a traitor.
    fn break_alliance(&mut self, breaker: PlayerId, other: PlayerId) -> Result<(), ActionError>;
    fn request_alliance(&mut self, requestor: PlayerId, recipient: PlayerId) -> Result<(), ActionError>;
    fn accept_alliance_request(&mut self, requestor: PlayerId, recipient: PlayerId) -> Result<(), ActionError>;
    fn reject_alliance_request(&mut self, requestor: PlayerId, recipient: PlayerId) -> Result<(), ActionError>;
    fn agree_to_extend_alliance(&mut self, player: PlayerId, other: PlayerId) -> Result<(), ActionError>;
    fn add_embargo(&mut self, player: PlayerId, other: PlayerId, temporary: bool);
    fn stop_embargo(&mut self, player: PlayerId, other: PlayerId);
    fn send_emoji(&mut self, sender: PlayerId, recipient: EmojiRecipient, emoji: &str) -> Result<(), ActionError>;
    fn start_attack(
        &mut self,
        attacker: PlayerId,
        target: Owner,
        troops: f64,
        source_tile: Option<TileRef>,
    ) -> Result<(), ActionError>;
    fn launch_transport_ship(
        &mut self,
        owner: PlayerId,
        target: Owner,
        dst: TileRef,
        troops: f64,
        src: Option<TileRef>,
    ) -> Result<UnitId, ActionError>;
    /// Pays for and places a unit.
    fn build_unit(
        &mut self,
        owner: PlayerId,
        kind: UnitType,
        spawn: TileRef,
        params: UnitParams,
    ) -> Result<UnitId, ActionError>;
    fn complete_construction(&mut self, unit: UnitId);
    fn move_unit(&mut self, unit: UnitId, tile: TileRef);
    fn delete_unit(&mut self, unit: UnitId, destroyer: Option<PlayerId>);
    /// Apply a nuke's blast at its current tile and remove it.
    fn detonate_nuke(&mut self, unit: UnitId);
    fn record_bomb_launch(&mut self, player: PlayerId, target: Owner, kind: UnitType);

    fn in_spawn_phase(&self) -> bool {
        self.ticks() <= self.config().num_spawn_phase_turns()
    }

    fn has_owner(&self, tile: TileRef) -> bool {
        self.owner(tile).is_player()
    }

    fn unit_count(&self, kind: UnitType) -> usize {
        self.units(&[kind]).len()
    }

    fn unit_cost(&self, kind: UnitType, player: PlayerId) -> Gold {
        self.config()
            .unit_cost(kind, self.player(player), self.stats_mirvs_launched())
    }

    fn max_troops(&self, player: PlayerId) -> f64 {
        self.config().max_troops(self.player(player))
    }

    fn is_friendly(&self, a: PlayerId, b: PlayerId) -> bool {
        self.player(a).is_friendly(self.player(b))
    }

    fn is_on_same_team(&self, a: PlayerId, b: PlayerId) -> bool {
        self.player(a).is_on_same_team(self.player(b))
    }
}
