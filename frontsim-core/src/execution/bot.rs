//! Tribes: the simplest AI players.
//!
//! A bot expands into unclaimed land whenever it can and otherwise picks a
//! random neighbour. It never builds, nukes or chats.

use super::{AllianceRequestReplyExecution, Execution};
use crate::game::{Game, Owner, PlayerId, PlayerInfo, Relation, Tick};
use crate::nation::{AiContext, AttackBehavior};
use crate::random::{simple_hash, PseudoRandom};

#[derive(Debug)]
pub struct BotExecution {
    info: PlayerInfo,
    random: PseudoRandom,
    attack_rate: Tick,
    attack_tick: Tick,
    player: Option<PlayerId>,
    attack: Option<AttackBehavior>,
    active: bool,
}

impl BotExecution {
    pub fn new(info: PlayerInfo) -> Self {
        let mut random = PseudoRandom::new(simple_hash(&info.id));
        let attack_rate = random.next_int(40, 80) as Tick;
        let attack_tick = random.next_int(0, attack_rate as i64) as Tick;
        Self {
            info,
            random,
            attack_rate,
            attack_tick,
            player: None,
            attack: None,
            active: true,
        }
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    /// Friends get a yes, everyone else a no.
    fn answer_alliance_requests(&mut self, game: &mut dyn Game, player: PlayerId) {
        let me = game.player(player);
        let replies: Vec<(PlayerId, bool)> = me
            .incoming_alliance_requests()
            .into_iter()
            .map(|requestor| (requestor, me.relation(requestor) >= Relation::Friendly))
            .collect();
        for (requestor, accept) in replies {
            game.add_execution(Box::new(AllianceRequestReplyExecution::new(requestor, player, accept)));
        }
    }
}

impl Execution for BotExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        let player = match game.player_by_info_id(&self.info.id) {
            Some(id) => id,
            None => game.add_player(self.info.clone()),
        };
        self.player = Some(player);
    }

    fn tick(&mut self, game: &mut dyn Game, ticks: Tick) {
        let Some(player) = self.player else {
            panic!("BotExecution ticked before init");
        };
        if !game.player(player).is_alive() {
            self.active = false;
            return;
        }
        if ticks % self.attack_rate != self.attack_tick {
            return;
        }

        let Some(mut attack) = self.attack.take() else {
            let trigger = self.random.next_int(60, 90) as f64 / 100.0;
            let reserve = self.random.next_int(30, 60) as f64 / 100.0;
            let expand = self.random.next_int(15, 25) as f64 / 100.0;
            let mut attack = AttackBehavior::new(trigger, reserve, expand);
            let mut ctx = AiContext::new(game, &mut self.random, player);
            attack.force_send_attack(&mut ctx, Owner::TerraNullius);
            self.attack = Some(attack);
            return;
        };

        self.answer_alliance_requests(game, player);
        let mut ctx = AiContext::new(game, &mut self.random, player);
        if attack.borders_unclaimed_land(&ctx) {
            attack.send_attack(&mut ctx, None, Owner::TerraNullius, false);
        } else {
            attack.attack_random_target(&mut ctx);
        }
        self.attack = Some(attack);
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "BotExecution"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::PlayerKind;
    use crate::testing::{GameBuilder, SandboxGame, SandboxMap};

    fn tribe() -> PlayerInfo {
        PlayerInfo::new("tribe", "Tribe", PlayerKind::Bot)
    }

    /// A tribe in one corner and an idle human in the other.
    fn meadow() -> SandboxGame {
        GameBuilder::new()
            .with_map(SandboxMap::land(60, 60))
            .with_player(tribe())
            .with_player(PlayerInfo::new("human", "Human", PlayerKind::Human))
            .with_square(PlayerId(0), 0, 0, 10)
            .with_square(PlayerId(1), 50, 50, 10)
            .at_tick(1_000)
            .build()
    }

    #[test]
    fn same_identity_same_rhythm() {
        let (a, b) = (BotExecution::new(tribe()), BotExecution::new(tribe()));
        assert_eq!((a.attack_rate, a.attack_tick), (b.attack_rate, b.attack_tick));
        assert!((40..80).contains(&a.attack_rate));
        assert!(a.attack_tick < a.attack_rate);
    }

    #[test]
    fn init_reuses_the_registered_player() {
        let mut game = meadow();
        let mut exec = BotExecution::new(tribe());
        exec.init(&mut game, 1_000);
        assert_eq!(exec.player(), Some(PlayerId(0)));
        assert_eq!(game.players().len(), 2);
    }

    #[test]
    fn expands_into_open_land() {
        let mut game = meadow();
        let before = game.player(PlayerId(0)).num_tiles_owned();
        game.add_execution(Box::new(BotExecution::new(tribe())));
        game.run(300);
        assert!(game.player(PlayerId(0)).num_tiles_owned() > before);
    }

    #[test]
    fn friends_get_a_yes() {
        let mut game = meadow();
        game.set_relation(PlayerId(0), PlayerId(1), 80);
        game.request_alliance(PlayerId(1), PlayerId(0)).unwrap();
        game.add_execution(Box::new(BotExecution::new(tribe())));
        game.run(200);
        assert!(game.player(PlayerId(0)).is_allied_with(PlayerId(1)));
    }

    #[test]
    fn strangers_get_a_no() {
        let mut game = meadow();
        game.request_alliance(PlayerId(1), PlayerId(0)).unwrap();
        game.add_execution(Box::new(BotExecution::new(tribe())));
        game.run(200);
        assert!(!game.player(PlayerId(0)).is_allied_with(PlayerId(1)));
        assert!(game.player(PlayerId(0)).incoming_alliance_requests().is_empty());
    }

    #[test]
    fn landless_tribe_retires() {
        let mut game = GameBuilder::new().with_player(tribe()).at_tick(1_000).build();
        game.add_execution(Box::new(BotExecution::new(tribe())));
        game.run(2);
        assert_eq!(game.num_executions(), 0);
    }
}
