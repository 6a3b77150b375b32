use super::{EmojiExecution, Execution};
use crate::config::Difficulty;
use crate::game::{EmojiRecipient, Game, Gold, PlayerId, PlayerKind, Tick};
use crate::nation::emoji::{DONATION_OK, DONATION_TOO_SMALL, LOVE};
use crate::random::PseudoRandom;

/// Relation points per donated chunk.
const POINTS_PER_CHUNK: u64 = 5;
const MAX_GOLD_RELATION: u64 = 100;
/// Flat relation bonus for a troop donation above the recipient's threshold.
pub const TROOP_RELATION_BONUS: i32 = 50;

fn gold_chunk_size(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 2_500.0,
        Difficulty::Medium => 5_000.0,
        Difficulty::Hard => 12_500.0,
        Difficulty::Impossible => 25_000.0,
    }
}

/// Relation gained by the sender for donating `gold` at tick `ticks`.
///
/// The chunk size grows linearly with elapsed time so late-game gold buys
/// less goodwill. Capped at 100.
pub fn gold_relation_delta(gold: Gold, ticks: Tick, difficulty: Difficulty, spawn_phase_turns: u64) -> i32 {
    let chunk = gold_chunk_size(difficulty);
    let multiplier = ticks as f64 / (3000 + spawn_phase_turns) as f64;
    let scaled = (chunk + chunk * multiplier).round().max(1.0) as u64;
    ((gold / scaled) * POINTS_PER_CHUNK).min(MAX_GOLD_RELATION) as i32
}

/// Minimum donation a recipient with `max_troops` capacity notices. Drawn
/// fresh for every donation.
pub fn min_troops_threshold(random: &mut PseudoRandom, difficulty: Difficulty, max_troops: f64) -> f64 {
    let (lo, hi) = match difficulty {
        Difficulty::Easy => (13.0, 11.0),
        Difficulty::Medium => (11.0, 9.0),
        Difficulty::Hard => (9.0, 7.0),
        Difficulty::Impossible => (7.0, 5.0),
    };
    random.next_int((max_troops / lo) as i64, (max_troops / hi) as i64) as f64
}

/// Either the full bonus or nothing.
pub fn troop_relation_bonus(troops: f64, min_troops: f64) -> i32 {
    if troops >= min_troops {
        TROOP_RELATION_BONUS
    } else {
        0
    }
}

/// One-shot gold transfer.
#[derive(Debug)]
pub struct DonateGoldExecution {
    sender: PlayerId,
    recipient: PlayerId,
    gold: Option<Gold>,
    random: Option<PseudoRandom>,
    active: bool,
}

impl DonateGoldExecution {
    /// `gold: None` donates a third of the sender's gold at admission.
    pub fn new(sender: PlayerId, recipient: PlayerId, gold: Option<Gold>) -> Self {
        Self {
            sender,
            recipient,
            gold,
            random: None,
            active: true,
        }
    }
}

impl Execution for DonateGoldExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.random = Some(PseudoRandom::new(game.ticks()));
        if !game.has_player(self.recipient) {
            log::warn!("DonateGoldExecution recipient {:?} not found", self.recipient);
            self.active = false;
            return;
        }
        if self.gold.is_none() {
            self.gold = Some(game.player(self.sender).gold() / 3);
        }
    }

    fn tick(&mut self, game: &mut dyn Game, ticks: Tick) {
        let (Some(gold), Some(random)) = (self.gold, self.random.as_mut()) else {
            panic!("DonateGoldExecution ticked before init");
        };
        self.active = false;

        if !game.can_donate_gold(self.sender, self.recipient) {
            log::warn!("cannot send gold from {:?} to {:?}", self.sender, self.recipient);
            return;
        }
        if let Err(e) = game.donate_gold(self.sender, self.recipient, gold) {
            log::warn!("cannot send gold from {:?} to {:?}: {}", self.sender, self.recipient, e);
            return;
        }

        let config = game.config();
        let delta = gold_relation_delta(gold, ticks, config.difficulty(), config.num_spawn_phase_turns());
        if delta > 0 {
            game.update_relation(self.recipient, self.sender, delta);
        }
        log::debug!("{:?} donated {} gold to {:?} (+{} relation)", self.sender, gold, self.recipient, delta);

        if game.player(self.recipient).kind() == PlayerKind::Nation
            && game.can_send_emoji(self.recipient, EmojiRecipient::Player(self.sender))
        {
            let table = if delta >= 50 {
                LOVE
            } else if delta > 0 {
                DONATION_OK
            } else {
                DONATION_TOO_SMALL
            };
            if let Some(&emoji) = random.rand_element(table) {
                game.add_execution(Box::new(EmojiExecution::new(
                    self.recipient,
                    EmojiRecipient::Player(self.sender),
                    emoji,
                )));
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "DonateGoldExecution"
    }
}

/// One-shot troop transfer.
#[derive(Debug)]
pub struct DonateTroopsExecution {
    sender: PlayerId,
    recipient: PlayerId,
    troops: Option<f64>,
    random: Option<PseudoRandom>,
    initialized: bool,
    active: bool,
}

impl DonateTroopsExecution {
    /// `troops: None` donates a third of the sender's troops. Either way the
    /// amount is clamped to the recipient's free capacity at admission.
    pub fn new(sender: PlayerId, recipient: PlayerId, troops: Option<f64>) -> Self {
        Self {
            sender,
            recipient,
            troops,
            random: None,
            initialized: false,
            active: true,
        }
    }
}

impl Execution for DonateTroopsExecution {
    fn init(&mut self, game: &mut dyn Game, _ticks: Tick) {
        self.random = Some(PseudoRandom::new(game.ticks()));
        self.initialized = true;
        if !game.has_player(self.recipient) {
            log::warn!("DonateTroopsExecution recipient {:?} not found", self.recipient);
            self.active = false;
            return;
        }
        let requested = self
            .troops
            .unwrap_or_else(|| game.config().default_donation_amount(game.player(self.sender)));
        let capacity = game.max_troops(self.recipient) - game.player(self.recipient).troops();
        self.troops = Some(requested.min(capacity));
    }

    fn tick(&mut self, game: &mut dyn Game, _ticks: Tick) {
        let (true, Some(troops), Some(random)) = (self.initialized, self.troops, self.random.as_mut()) else {
            panic!("DonateTroopsExecution ticked before init");
        };
        self.active = false;

        // Drawn before the transfer so the draw order never depends on its outcome.
        let min_troops = min_troops_threshold(random, game.config().difficulty(), game.max_troops(self.recipient));

        if !game.can_donate_troops(self.sender, self.recipient) {
            log::warn!("cannot send troops from {:?} to {:?}", self.sender, self.recipient);
            return;
        }
        if let Err(e) = game.donate_troops(self.sender, self.recipient, troops) {
            log::warn!("cannot send troops from {:?} to {:?}: {}", self.sender, self.recipient, e);
            return;
        }

        let bonus = troop_relation_bonus(troops, min_troops);
        if bonus > 0 {
            game.update_relation(self.recipient, self.sender, bonus);
        }

        if game.player(self.recipient).kind() == PlayerKind::Nation
            && game.can_send_emoji(self.recipient, EmojiRecipient::Player(self.sender))
        {
            let table = if bonus > 0 { LOVE } else { DONATION_TOO_SMALL };
            if let Some(&emoji) = random.rand_element(table) {
                game.add_execution(Box::new(EmojiExecution::new(
                    self.recipient,
                    EmojiRecipient::Player(self.sender),
                    emoji,
                )));
            }
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn active_during_spawn_phase(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "DonateTroopsExecution"
    }
}
