//! Bot decision policies.
//!
//! A policy looks at a read-only snapshot and proposes one request. The
//! request goes through [`crate::rules::RulesEngine::apply`] like any human
//! action; a policy never touches the match itself.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::config::BotConfig;
use crate::cards::{CardInstance, CardType};
use crate::core::{ActionRequest, Match, Participant, ParticipantId, Phase};

/// Policy for choosing a participant's next request.
pub trait DecisionPolicy {
    /// Propose the next request for `me`, or `None` when nothing is expected
    /// of them right now.
    fn propose(&mut self, state: &Match, me: &ParticipantId) -> Option<ActionRequest>;
}

/// Fixed-priority heuristic bot.
///
/// Priorities on its own main phase:
/// 1. heal with an item below the low-hp threshold
/// 2. attack the weakest opponent with the strongest weapon (weighted by aggression)
/// 3. play an affordable card with no harmful op
/// 4. pray when no weapon is held
/// 5. attack anyway
/// 6. end the turn
///
/// When defending it blocks with the first armor that covers enough of the
/// incoming power, else the first armor, else nothing.
#[derive(Clone, Debug)]
pub struct HeuristicBot {
    config: BotConfig,
    rng: ChaCha8Rng,
}

impl Default for HeuristicBot {
    fn default() -> Self {
        Self::new(BotConfig::default())
    }
}

impl HeuristicBot {
    /// Create a bot with its own seeded random stream.
    #[must_use]
    pub fn new(config: BotConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    fn roll(&mut self, probability: f64) -> bool {
        self.rng.gen::<f64>() < probability
    }

    fn strategic(&mut self, state: &Match, bot: &Participant) -> ActionRequest {
        let match_id = state.id.as_str();
        let affordable = |c: &&CardInstance| c.card.cost <= bot.ki;

        if bot.hp < self.config.low_hp_threshold {
            let heal = bot
                .hand
                .iter()
                .filter(affordable)
                .find(|c| c.card.card_type == CardType::Item && c.card.heals_hp());
            if let Some(heal) = heal {
                return ActionRequest::play_card(match_id, &heal.instance_id, None);
            }
        }

        let weapon = strongest_weapon(bot);
        let target = weakest_opponent(state, &bot.id);
        if let (Some(weapon), Some(target)) = (weapon, target) {
            if self.roll(self.config.aggression) {
                return ActionRequest::attack(match_id, &weapon.instance_id, target.id.as_str());
            }
        }

        let beneficial = bot
            .hand
            .iter()
            .filter(affordable)
            .find(|c| c.card.card_type.is_playable_in_main() && !c.card.is_harmful());
        if let Some(card) = beneficial {
            return ActionRequest::play_card(match_id, &card.instance_id, None);
        }

        if !bot.hand.iter().any(|c| c.card.is_weapon()) {
            return ActionRequest::pray(match_id);
        }

        if let (Some(weapon), Some(target)) = (weapon, target) {
            return ActionRequest::attack(match_id, &weapon.instance_id, target.id.as_str());
        }

        ActionRequest::end_turn(match_id)
    }

    /// Uniform pick among everything that looks like a move.
    fn blunder(&mut self, state: &Match, bot: &Participant) -> ActionRequest {
        let match_id = state.id.as_str();
        let opponents: Vec<&Participant> = state
            .participants
            .iter()
            .filter(|p| p.is_alive() && p.id != bot.id)
            .collect();

        let mut candidates = vec![ActionRequest::end_turn(match_id)];
        if !bot.hand.iter().any(|c| c.card.is_weapon()) {
            candidates.push(ActionRequest::pray(match_id));
        }
        for card in &bot.hand {
            let aim = if opponents.is_empty() {
                None
            } else {
                Some(opponents[self.rng.gen_range(0..opponents.len())])
            };
            if card.card.is_weapon() {
                if let Some(aim) = aim {
                    candidates.push(ActionRequest::attack(match_id, &card.instance_id, aim.id.as_str()));
                }
            } else if card.card.card_type.is_playable_in_main() {
                candidates.push(ActionRequest::play_card(
                    match_id,
                    &card.instance_id,
                    aim.map(|p| p.id.as_str()),
                ));
            }
        }
        let pick = self.rng.gen_range(0..candidates.len());
        candidates.swap_remove(pick)
    }

    fn defend(&self, state: &Match, bot: &Participant, power: i64) -> ActionRequest {
        let mut armor = bot.hand.iter().filter(|c| c.card.is_armor());
        let first = armor.clone().next();
        let needed = power.saturating_mul(self.config.defend_cover_pct);
        let covering = armor.find(|c| c.card.stats.defense.saturating_mul(100) >= needed);
        match covering.or(first) {
            Some(card) => ActionRequest::defend(&state.id, &[card.instance_id.as_str()]),
            None => ActionRequest::defend(&state.id, &[]),
        }
    }
}

impl DecisionPolicy for HeuristicBot {
    fn propose(&mut self, state: &Match, me: &ParticipantId) -> Option<ActionRequest> {
        if state.is_finished() {
            return None;
        }
        let bot = state.participant(me).filter(|p| p.is_alive())?;

        if state.phase == Phase::Threat {
            let threat = state.threat.as_ref().filter(|t| &t.defender == me)?;
            return Some(self.defend(state, bot, threat.power));
        }
        if &state.current_actor != me {
            return None;
        }
        match state.phase {
            Phase::Main => {}
            Phase::End => return Some(ActionRequest::end_turn(&state.id)),
            Phase::Reaction | Phase::Resolve | Phase::Threat => return None,
        }

        let request = if self.roll(self.config.error_rate) {
            self.blunder(state, bot)
        } else {
            self.strategic(state, bot)
        };
        debug!(bot = %me, action = request.name(), "bot proposal");
        Some(request)
    }
}

/// The highest-attack weapon in hand that the participant can pay for.
#[must_use]
pub fn strongest_weapon(participant: &Participant) -> Option<&CardInstance> {
    participant
        .hand
        .iter()
        .filter(|c| c.card.is_weapon() && c.card.cost <= participant.ki)
        .fold(None, |best: Option<&CardInstance>, c| match best {
            Some(b) if b.card.stats.attack >= c.card.stats.attack => Some(b),
            _ => Some(c),
        })
}

/// The living opponent with the lowest hp; ties go to the earlier seat.
#[must_use]
pub fn weakest_opponent<'m>(state: &'m Match, me: &ParticipantId) -> Option<&'m Participant> {
    state
        .participants
        .iter()
        .filter(|p| p.is_alive() && &p.id != me)
        .fold(None, |best: Option<&Participant>, p| match best {
            Some(b) if b.hp <= p.hp => Some(b),
            _ => Some(p),
        })
}
