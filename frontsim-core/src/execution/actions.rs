//! Thin executions that validate and hand the effect to the world.
//!
//! These are what behaviors enqueue. Each one checks what it can at admission,
//! then performs a single mutation on its first tick and retires. Construction
//! is the exception: it waits out the build delay before finishing.

use super::{Execution, MirvExecution, NukeExecution};
use crate::game::{EmojiRecipient, Game, Owner, PlayerId, PlayerInfo, Tick, TileRef, UnitId, UnitParams, UnitType};
use crate::nation::respond_to_emoji;
use crate::random::{simple_hash, PseudoRandom};

/// Registers a player (if new) and places their starting territory.
#[derive(Debug)]
pub struct SpawnExecution {
    info: PlayerInfo,
    tile: Option<TileRef>,
    active: bool,
}

impl SpawnExecution {
    pub fn new(info: PlayerInfo, tile: Option<TileRef>) -> Self {
        Self { info, tile, active: true }
    }
}

impl Execution for SpawnExecution {
    fn init(&mut self, _game: &mut dyn Game, _ticks: Tick) {}

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.active = false;
        if !game.in_spawn_phase() {
            log::warn!("{} tried to spawn after the spawn phase", self.info.name);
            return;
        }
        let player = match game.player_by_info_id(&self.info.id) {
            Some(id) => id,
            None => game.add_player(self.info.clone()),
        };
        match game.spawn_player(player, self.tile) {
            Ok(tile) => log::debug!("{} spawned at {:?}", self.info.name, tile),
            Err(e) => log::warn!("{} could not spawn: {}", self.info.name, e),
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "SpawnExecution"
    }
}

/// A land attack. Combat itself is resolved by the world.
#[derive(Debug)]
pub struct AttackExecution {
    attacker: PlayerId,
    target: Owner,
    troops: f64,
    source_tile: Option<TileRef>,
    initialized: bool,
    active: bool,
}

impl AttackExecution {
    pub fn new(attacker: PlayerId, target: Owner, troops: f64) -> Self {
        Self {
            attacker,
            target,
            troops,
            source_tile: None,
            initialized: false,
            active: true,
        }
    }

    /// Start the attack from a specific tile, e.g. where a boat landed.
    pub fn from_tile(mut self, tile: TileRef) -> Self {
        self.source_tile = Some(tile);
        self
    }
}

impl Execution for AttackExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.initialized = true;
        if !game.has_player(self.attacker) || !game.player(self.attacker).is_alive() {
            log::warn!("AttackExecution: attacker {:?} is not alive", self.attacker);
            self.active = false;
            return;
        }
        if self.target == Owner::Player(self.attacker) {
            log::warn!("AttackExecution: {:?} cannot attack itself", self.attacker);
            self.active = false;
        }
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !self.initialized {
            panic!("AttackExecution ticked before init");
        }
        self.active = false;
        let troops = self.troops.min(game.player(self.attacker).troops());
        if let Err(e) = game.start_attack(self.attacker, self.target, troops, self.source_tile) {
            log::warn!("{:?} cannot attack {:?}: {}", self.attacker, self.target, e);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "AttackExecution"
    }
}

/// A naval invasion. The world routes and lands the ship.
#[derive(Debug)]
pub struct TransportShipExecution {
    owner: PlayerId,
    target: Owner,
    dst: TileRef,
    troops: f64,
    src: Option<TileRef>,
    ship: Option<UnitId>,
    active: bool,
}

impl TransportShipExecution {
    pub fn new(owner: PlayerId, target: Owner, dst: TileRef, troops: f64, src: Option<TileRef>) -> Self {
        Self {
            owner,
            target,
            dst,
            troops,
            src,
            ship: None,
            active: true,
        }
    }

    /// The launched ship, once the first tick has run.
    pub fn ship(&self) -> Option<UnitId> {
        self.ship
    }
}

impl Execution for TransportShipExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !game.has_player(self.owner) {
            log::warn!("TransportShipExecution: unknown owner {:?}", self.owner);
            self.active = false;
            return;
        }
        if game.owner(self.dst) != self.target {
            log::warn!("TransportShipExecution: {:?} no longer holds {:?}", self.target, self.dst);
            self.active = false;
        }
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.active = false;
        if let Err(e) = game.can_build(self.owner, UnitType::TransportShip, self.dst) {
            log::warn!("{:?} cannot send a boat to {:?}: {}", self.owner, self.dst, e);
            return;
        }
        let troops = self.troops.min(game.player(self.owner).troops());
        match game.launch_transport_ship(self.owner, self.target, self.dst, troops, self.src) {
            Ok(ship) => {
                log::debug!("{:?} launched boat {:?} with {:.0} troops", self.owner, ship, troops);
                self.ship = Some(ship);
            }
            Err(e) => log::warn!("{:?} cannot send a boat to {:?}: {}", self.owner, self.dst, e),
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "TransportShipExecution"
    }
}

/// Pays for a unit and finishes it after the configured delay.
///
/// Bombs are handed to their own strike executions instead of being placed.
#[derive(Debug)]
pub struct ConstructionExecution {
    owner: PlayerId,
    kind: UnitType,
    tile: TileRef,
    unit: Option<UnitId>,
    ticks_left: Tick,
    active: bool,
}

impl ConstructionExecution {
    pub fn new(owner: PlayerId, kind: UnitType, tile: TileRef) -> Self {
        Self {
            owner,
            kind,
            tile,
            unit: None,
            ticks_left: 0,
            active: true,
        }
    }
}

impl Execution for ConstructionExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !game.has_player(self.owner) || !game.player(self.owner).is_alive() {
            log::warn!("ConstructionExecution: owner {:?} is not alive", self.owner);
            self.active = false;
        }
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        let Some(unit) = self.unit else {
            self.start(game);
            return;
        };
        if !game.unit(unit).is_some_and(|u| u.is_active()) {
            log::debug!("{:?} under construction was destroyed", self.kind);
            self.active = false;
            return;
        }
        if self.ticks_left > 0 {
            self.ticks_left -= 1;
            return;
        }
        game.complete_construction(unit);
        log::trace!("{:?} finished {:?} at {:?}", self.owner, self.kind, self.tile);
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "ConstructionExecution"
    }
}

impl ConstructionExecution {
    fn start(&mut self, game: &mut dyn Game) {
        match self.kind {
            UnitType::AtomBomb | UnitType::HydrogenBomb => {
                game.add_execution(Box::new(NukeExecution::new(self.kind, self.owner, self.tile)));
                self.active = false;
                return;
            }
            UnitType::Mirv => {
                game.add_execution(Box::new(MirvExecution::new(self.owner, self.tile)));
                self.active = false;
                return;
            }
            _ => {}
        }

        let spawn = match game.can_build(self.owner, self.kind, self.tile) {
            Ok(spawn) => spawn,
            Err(e) => {
                log::warn!("{:?} cannot build {:?} at {:?}: {}", self.owner, self.kind, self.tile, e);
                self.active = false;
                return;
            }
        };
        let duration = if self.kind.is_structure() {
            game.config().construction_duration(self.kind)
        } else {
            0
        };
        let params = UnitParams {
            target_tile: None,
            under_construction: duration > 0,
        };
        match game.build_unit(self.owner, self.kind, spawn, params) {
            Ok(unit) if duration > 0 => {
                self.unit = Some(unit);
                self.ticks_left = duration;
            }
            Ok(_) => self.active = false,
            Err(e) => {
                log::warn!("{:?} failed to build {:?}: {}", self.owner, self.kind, e);
                self.active = false;
            }
        }
    }
}

/// Sends one emoji. A Nation on the receiving end may answer.
#[derive(Debug)]
pub struct EmojiExecution {
    sender: PlayerId,
    recipient: EmojiRecipient,
    emoji: String,
    random: Option<PseudoRandom>,
    active: bool,
}

impl EmojiExecution {
    pub fn new(sender: PlayerId, recipient: EmojiRecipient, emoji: impl Into<String>) -> Self {
        Self {
            sender,
            recipient,
            emoji: emoji.into(),
            random: None,
            active: true,
        }
    }
}

impl Execution for EmojiExecution {
    fn init(&mut self, game: &mut dyn Game, ticks: Tick) {
        if !game.has_player(self.sender) {
            log::warn!("EmojiExecution: unknown sender {:?}", self.sender);
            self.active = false;
            return;
        }
        if let EmojiRecipient::Player(p) = self.recipient {
            if !game.has_player(p) {
                log::warn!("EmojiExecution: unknown recipient {:?}", p);
                self.active = false;
                return;
            }
        }
        let seed = ticks.wrapping_add(simple_hash(&game.player(self.sender).info().id));
        self.random = Some(PseudoRandom::new(seed));
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        let Some(random) = self.random.as_mut() else {
            panic!("EmojiExecution ticked before init");
        };
        self.active = false;
        if !game.can_send_emoji(self.sender, self.recipient) {
            log::trace!("{:?} cannot send an emoji yet", self.sender);
            return;
        }
        if let Err(e) = game.send_emoji(self.sender, self.recipient, &self.emoji) {
            log::warn!("{:?} cannot send emoji: {}", self.sender, e);
            return;
        }
        respond_to_emoji(game, random, self.sender, self.recipient, &self.emoji);
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "EmojiExecution"
    }
}

/// Proposes an alliance, or closes the deal if the other side already asked.
#[derive(Debug)]
pub struct AllianceRequestExecution {
    requestor: PlayerId,
    recipient: PlayerId,
    active: bool,
}

impl AllianceRequestExecution {
    pub fn new(requestor: PlayerId, recipient: PlayerId) -> Self {
        Self {
            requestor,
            recipient,
            active: true,
        }
    }
}

impl Execution for AllianceRequestExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !game.has_player(self.recipient) || self.requestor == self.recipient {
            log::warn!("AllianceRequestExecution: bad recipient {:?}", self.recipient);
            self.active = false;
        }
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.active = false;
        let counter_offer = game
            .player(self.requestor)
            .incoming_alliance_requests()
            .contains(&self.recipient);
        let result = if counter_offer {
            game.accept_alliance_request(self.recipient, self.requestor)
        } else if game.can_send_alliance_request(self.requestor, self.recipient) {
            game.request_alliance(self.requestor, self.recipient)
        } else {
            log::trace!("{:?} cannot ask {:?} for an alliance", self.requestor, self.recipient);
            return;
        };
        if let Err(e) = result {
            log::warn!("alliance request {:?} -> {:?} failed: {}", self.requestor, self.recipient, e);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "AllianceRequestExecution"
    }
}

/// The recipient's answer to a pending request.
#[derive(Debug)]
pub struct AllianceRequestReplyExecution {
    requestor: PlayerId,
    recipient: PlayerId,
    accept: bool,
    active: bool,
}

impl AllianceRequestReplyExecution {
    pub fn new(requestor: PlayerId, recipient: PlayerId, accept: bool) -> Self {
        Self {
            requestor,
            recipient,
            accept,
            active: true,
        }
    }
}

impl Execution for AllianceRequestReplyExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !game.has_player(self.requestor) {
            log::warn!("AllianceRequestReplyExecution: unknown requestor {:?}", self.requestor);
            self.active = false;
        }
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.active = false;
        let pending = game
            .player(self.recipient)
            .incoming_alliance_requests()
            .contains(&self.requestor);
        if !pending {
            log::trace!("no pending request from {:?} to {:?}", self.requestor, self.recipient);
            return;
        }
        let result = if self.accept {
            game.accept_alliance_request(self.requestor, self.recipient)
        } else {
            game.reject_alliance_request(self.requestor, self.recipient)
        };
        if let Err(e) = result {
            log::warn!("alliance reply {:?} -> {:?} failed: {}", self.recipient, self.requestor, e);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "AllianceRequestReplyExecution"
    }
}

/// One side's consent to renew an alliance.
#[derive(Debug)]
pub struct AllianceExtensionExecution {
    player: PlayerId,
    other: PlayerId,
    active: bool,
}

impl AllianceExtensionExecution {
    pub fn new(player: PlayerId, other: PlayerId) -> Self {
        Self {
            player,
            other,
            active: true,
        }
    }
}

impl Execution for AllianceExtensionExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !game.has_player(self.other) {
            log::warn!("AllianceExtensionExecution: unknown player {:?}", self.other);
            self.active = false;
        }
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.active = false;
        if let Err(e) = game.agree_to_extend_alliance(self.player, self.other) {
            log::warn!("{:?} cannot extend alliance with {:?}: {}", self.player, self.other, e);
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "AllianceExtensionExecution"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbargoAction {
    Start,
    Stop,
}

/// Starts or lifts a trade embargo.
#[derive(Debug)]
pub struct EmbargoExecution {
    player: PlayerId,
    other: PlayerId,
    action: EmbargoAction,
    active: bool,
}

impl EmbargoExecution {
    pub fn new(player: PlayerId, other: PlayerId, action: EmbargoAction) -> Self {
        Self {
            player,
            other,
            action,
            active: true,
        }
    }
}

impl Execution for EmbargoExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        if !game.has_player(self.other) || self.player == self.other {
            log::warn!("EmbargoExecution: bad target {:?}", self.other);
            self.active = false;
        }
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.active = false;
        match self.action {
            EmbargoAction::Start => game.add_embargo(self.player, self.other, false),
            EmbargoAction::Stop => game.stop_embargo(self.player, self.other),
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "EmbargoExecution"
    }
}

/// Ends an alliance at admission. The betrayed side remembers.
#[derive(Debug)]
pub struct BreakAllianceExecution {
    breaker: PlayerId,
    other: PlayerId,
    active: bool,
}

impl BreakAllianceExecution {
    pub fn new(breaker: PlayerId, other: PlayerId) -> Self {
        Self {
            breaker,
            other,
            active: true,
        }
    }
}

impl Execution for BreakAllianceExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.active = false;
        if !game.has_player(self.other) {
            log::warn!("BreakAllianceExecution: unknown player {:?}", self.other);
            return;
        }
        if let Err(e) = game.break_alliance(self.breaker, self.other) {
            log::warn!("{:?} cannot break with {:?}: {}", self.breaker, self.other, e);
            return;
        }
        game.update_relation(self.other, self.breaker, -100);
        log::info!("{:?} broke their alliance with {:?}", self.breaker, self.other);
    }

    fn tick(&mut self, _game: &mut dyn Game, _ticks: Tick) {}

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "BreakAllianceExecution"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMap, PlayerKind, Relation};
    use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

    fn neighbours() -> SandboxGame {
        GameBuilder::new()
            .with_map(SandboxMap::land(40, 20))
            .with_player(PlayerInfo::new("a", "A", PlayerKind::Nation))
            .with_player(PlayerInfo::new("b", "B", PlayerKind::Human))
            .with_square(PlayerId(0), 0, 0, 20)
            .with_square(PlayerId(1), 20, 0, 20)
            .with_gold(PlayerId(0), 1_000_000)
            .at_tick(1_000)
            .build()
    }

    #[test]
    fn spawns_only_during_the_spawn_phase() {
        let mut game = GameBuilder::new().build();
        let info = PlayerInfo::new("late", "Late", PlayerKind::Human);
        game.add_execution(Box::new(SpawnExecution::new(info.clone(), None)));
        game.run(2);
        let player = game.player_by_info_id("late").unwrap();
        assert!(game.player(player).num_tiles_owned() > 0);

        let mut game = neighbours();
        game.add_execution(Box::new(SpawnExecution::new(info, None)));
        game.run(2);
        assert_eq!(game.player_by_info_id("late"), None);
    }

    #[test]
    #[should_panic(expected = "ticked before init")]
    fn attack_ticked_before_init_panics() {
        let mut game = neighbours();
        AttackExecution::new(PlayerId(0), Owner::TerraNullius, 10.0).tick(&mut game, 1_000);
    }

    #[test]
    fn self_attack_is_dropped_at_admission() {
        let mut game = neighbours();
        game.add_execution(Box::new(AttackExecution::new(PlayerId(0), Owner::Player(PlayerId(0)), 10.0)));
        game.run(1);
        assert_eq!(game.num_executions(), 0);
        assert!(game.player(PlayerId(0)).outgoing_attacks().is_empty());
    }

    #[test]
    fn attack_commits_at_most_what_is_there() {
        let mut game = neighbours();
        game.set_troops(PlayerId(0), 5_000.0);
        game.set_troops(PlayerId(1), 0.0);
        game.add_execution(Box::new(AttackExecution::new(PlayerId(0), Owner::Player(PlayerId(1)), 1e9)));
        game.execute_next_tick();
        game.execute_next_tick();
        let sent = game.player(PlayerId(0)).outgoing_attack_troops();
        assert!(sent > 0.0 && sent <= 5_000.0, "sent {sent}");
    }

    #[test]
    fn construction_waits_out_the_build_delay() {
        let mut game = neighbours();
        let tile = game.ref_at(5, 5);
        game.add_execution(Box::new(ConstructionExecution::new(PlayerId(0), UnitType::City, tile)));
        game.run(10);
        assert_eq!(game.player(PlayerId(0)).units(&[UnitType::City]).len(), 1);
        assert_eq!(game.player(PlayerId(0)).units_constructed(UnitType::City), 0);
        assert!(game.player(PlayerId(0)).gold() < 1_000_000);

        game.run(20);
        assert_eq!(game.player(PlayerId(0)).units_constructed(UnitType::City), 1);
        assert_eq!(game.num_executions(), 0);
    }

    #[test]
    fn ordered_bombs_become_strikes() {
        let mut game = neighbours();
        let silo = game.ref_at(2, 2);
        game.place_unit(PlayerId(0), UnitType::MissileSilo, silo);
        let target = game.ref_at(30, 10);
        game.add_execution(Box::new(ConstructionExecution::new(PlayerId(0), UnitType::AtomBomb, target)));
        game.run(4);
        assert_eq!(game.bomb_log().len(), 1);
        assert_eq!(game.bomb_log()[0].kind, UnitType::AtomBomb);
    }

    #[test]
    fn crossing_requests_close_the_deal() {
        let mut game = neighbours();
        game.request_alliance(PlayerId(1), PlayerId(0)).unwrap();
        game.add_execution(Box::new(AllianceRequestExecution::new(PlayerId(0), PlayerId(1))));
        game.run(2);
        assert!(game.player(PlayerId(0)).is_allied_with(PlayerId(1)));
    }

    #[test]
    fn rejected_request_is_cleared() {
        let mut game = neighbours();
        game.request_alliance(PlayerId(1), PlayerId(0)).unwrap();
        game.add_execution(Box::new(AllianceRequestReplyExecution::new(PlayerId(1), PlayerId(0), false)));
        game.run(2);
        assert!(!game.player(PlayerId(0)).is_allied_with(PlayerId(1)));
        assert!(game.player(PlayerId(0)).incoming_alliance_requests().is_empty());
    }

    #[test]
    fn embargo_starts_and_stops() {
        let mut game = neighbours();
        game.add_execution(Box::new(EmbargoExecution::new(PlayerId(0), PlayerId(1), EmbargoAction::Start)));
        game.run(2);
        assert!(game.player(PlayerId(0)).has_embargo_against(PlayerId(1)));

        game.add_execution(Box::new(EmbargoExecution::new(PlayerId(0), PlayerId(1), EmbargoAction::Stop)));
        game.run(2);
        assert!(!game.player(PlayerId(0)).has_embargo_against(PlayerId(1)));
    }

    #[test]
    fn betrayal_is_remembered() {
        let mut game = neighbours();
        game.force_alliance(PlayerId(0), PlayerId(1));
        game.add_execution(Box::new(BreakAllianceExecution::new(PlayerId(0), PlayerId(1))));
        game.run(1);
        assert!(!game.player(PlayerId(0)).is_allied_with(PlayerId(1)));
        assert!(game.player(PlayerId(0)).is_traitor());
        assert_eq!(game.player(PlayerId(1)).relation(PlayerId(0)), Relation::Hostile);
        assert_eq!(game.num_executions(), 0);
    }
}
