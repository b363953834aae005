//! The turn/phase state machine.
//!
//! ## Phases
//!
//! ```text
//! main --playCard--> reaction --window elapses--> resolve --> end --endTurn--> main (next actor)
//! main --ATTACK--> threat --DEFEND / timeout--> main
//! ```
//!
//! Every action works on a clone of the committed match (`im` collections
//! make that cheap). Guards run against the clone before anything changes,
//! so a rejection leaves nothing behind, and an internal failure part-way
//! through resolution simply drops the clone.

use tracing::{debug, info};

use super::engine::{RulesEngine, Transition};
use super::error::ActionError;
use crate::cards::{CardInstance, CardType};
use crate::core::{
    ActionRequest, CombatAction, EngineConfig, LogEntry, Match, ParticipantId, Phase, Stat,
};
use crate::effects::{Op, TargetSpec, Value};
use crate::stack::{BoundOp, Interpreter};
use crate::triggers::{EventKind, GameEvent};

/// The authoritative rules engine.
///
/// ## Example
///
/// ```
/// use card_battle::cards::{Card, CardInstance, CardType};
/// use card_battle::core::{ActionRequest, EngineConfig, MatchBuilder, Participant, ParticipantId};
/// use card_battle::effects::{Op, TargetSpec, Value};
/// use card_battle::rules::{MatchEngine, RulesEngine};
///
/// let bolt = Card::new("bolt", "Bolt", CardType::Spell)
///     .with_op(Op::Damage { amount: Value::Literal(10), target: TargetSpec::Enemy, attribute: None });
/// let mut p1 = Participant::new("p1", 20, 0, 5);
/// p1.hand.push(CardInstance::new("bolt#1", bolt));
///
/// let state = MatchBuilder::new("m1", 42)
///     .participant(p1)
///     .participant(Participant::new("p2", 20, 0, 5))
///     .build();
///
/// let engine = MatchEngine::new(EngineConfig::default().with_reaction_window_ms(0));
/// let p1 = ParticipantId::new("p1");
/// let next = engine.apply(&state, &p1, &ActionRequest::play_card("m1", "bolt#1", None), 0).unwrap();
///
/// assert_eq!(next.state.participant(&ParticipantId::new("p2")).unwrap().hp, 10);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MatchEngine {
    pub(super) config: EngineConfig,
    pub(super) interpreter: Interpreter,
}

impl MatchEngine {
    /// Create an engine with the given tuning.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            interpreter: Interpreter::new(config.clone()),
            config,
        }
    }

    /// Engine tuning.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one request against the working copy. Returns whether anything
    /// changed; only `advance` can come back empty-handed.
    fn dispatch(
        &self,
        next: &mut Match,
        actor: &ParticipantId,
        request: &ActionRequest,
        now_ms: u64,
    ) -> Result<bool, ActionError> {
        let outcome = match request {
            ActionRequest::PlayCard { card_id, target_id, .. } => {
                self.play_card(next, actor, card_id, target_id.as_ref(), now_ms)
            }
            ActionRequest::React { card_id, target_id, .. } => {
                self.react(next, actor, card_id, target_id.as_ref(), now_ms)
            }
            ActionRequest::EndTurn { .. } => self.end_turn(next, actor),
            ActionRequest::Advance { .. } => return self.advance(next, now_ms),
            ActionRequest::PlayerAction { action_type, payload, .. } => match action_type {
                CombatAction::Attack => {
                    let weapon = payload.card_id.as_deref().unwrap_or_default();
                    let defender = payload
                        .target_id
                        .as_ref()
                        .ok_or_else(|| ActionError::MalformedPayload("ATTACK needs payload.targetId".into()))?;
                    self.attack(next, actor, weapon, defender, now_ms)
                }
                CombatAction::Defend => self.defend(next, actor, &payload.card_ids),
                CombatAction::Pray => self.pray(next, actor),
            },
        };
        outcome.map(|()| true)
    }

    fn try_apply(
        &self,
        state: &Match,
        actor: &ParticipantId,
        request: &ActionRequest,
        now_ms: u64,
    ) -> Result<Transition, ActionError> {
        request.validate()?;
        if request.match_id() != state.id {
            return Err(ActionError::WrongMatch {
                requested: request.match_id().to_string(),
                actual: state.id.clone(),
            });
        }
        if state.is_finished() {
            return Err(ActionError::MatchFinished);
        }
        // Deadline checks are open to any caller.
        if !matches!(request, ActionRequest::Advance { .. }) {
            let p = state
                .participant(actor)
                .ok_or_else(|| ActionError::NotParticipant(actor.clone()))?;
            if !p.is_alive() {
                return Err(ActionError::ActorDefeated(actor.clone()));
            }
        }

        let mut next = state.clone();
        let log_start = next.logs.len();
        if !self.dispatch(&mut next, actor, request, now_ms)? {
            return Ok(Transition::unchanged(state.clone()));
        }
        self.settle(&mut next)?;
        Ok(Self::commit(next, log_start))
    }

    /// Pass the turn on if its holder fell during their own turn.
    fn settle(&self, next: &mut Match) -> Result<(), ActionError> {
        let stranded = !next.is_finished()
            && !next.is_alive(&next.current_actor)
            && matches!(next.phase, Phase::Main | Phase::End);
        if stranded {
            self.finish_turn(next)?;
        }
        Ok(())
    }

    fn commit(next: Match, log_start: usize) -> Transition {
        let mut state = next;
        state.version += 1;
        let log = state.logs.iter().skip(log_start).cloned().collect();
        Transition { state, log }
    }

    // =========================================================================
    // Guards
    // =========================================================================

    pub(super) fn require_turn(state: &Match, actor: &ParticipantId) -> Result<(), ActionError> {
        if &state.current_actor != actor {
            return Err(ActionError::NotYourTurn {
                actor: actor.clone(),
                current: state.current_actor.clone(),
            });
        }
        Ok(())
    }

    pub(super) fn require_phase(state: &Match, action: &'static str, allowed: &[Phase]) -> Result<(), ActionError> {
        if !allowed.contains(&state.phase) {
            return Err(ActionError::WrongPhase { action, phase: state.phase });
        }
        Ok(())
    }

    pub(super) fn require_ki(state: &Match, actor: &ParticipantId, cost: i64) -> Result<(), ActionError> {
        let have = state.participant(actor).map_or(0, |p| p.ki);
        if have < cost {
            return Err(ActionError::InsufficientKi { need: cost, have });
        }
        Ok(())
    }

    fn require_living_target(state: &Match, target: Option<&ParticipantId>) -> Result<(), ActionError> {
        match target {
            Some(t) if !state.is_alive(t) => Err(ActionError::InvalidTarget(t.to_string())),
            _ => Ok(()),
        }
    }

    /// Hand index of a card, or `CardNotInHand`.
    pub(super) fn hand_index(state: &Match, actor: &ParticipantId, card_ref: &str) -> Result<usize, ActionError> {
        state
            .participant(actor)
            .and_then(|p| p.find_in_hand(card_ref))
            .ok_or_else(|| ActionError::CardNotInHand(card_ref.to_string()))
    }

    /// Move a hand card to the discard pile without paying for it.
    pub(super) fn spend_card_free(state: &mut Match, actor: &ParticipantId, idx: usize) -> Option<CardInstance> {
        let p = state.participant_mut(actor)?;
        if idx >= p.hand.len() {
            return None;
        }
        let card = p.hand.remove(idx);
        state.discard_pile.push_back(card.clone());
        Some(card)
    }

    /// Pay a card's cost and move it from hand to the discard pile.
    pub(super) fn spend_card(state: &mut Match, actor: &ParticipantId, idx: usize) -> Option<CardInstance> {
        let card = Self::spend_card_free(state, actor, idx)?;
        if let Some(p) = state.participant_mut(actor) {
            p.ki -= card.card.cost;
        }
        Some(card)
    }

    // =========================================================================
    // Card play
    // =========================================================================

    fn play_card(
        &self,
        next: &mut Match,
        actor: &ParticipantId,
        card_ref: &str,
        target: Option<&ParticipantId>,
        now_ms: u64,
    ) -> Result<(), ActionError> {
        Self::require_turn(next, actor)?;
        Self::require_phase(next, "playCard", &[Phase::Main])?;
        let idx = Self::hand_index(next, actor, card_ref)?;
        let (card_type, cost) = next
            .participant(actor)
            .map(|p| (p.hand[idx].card.card_type, p.hand[idx].card.cost))
            .ok_or_else(|| ActionError::NotParticipant(actor.clone()))?;
        if !card_type.is_playable_in_main() {
            return Err(ActionError::WrongCardType(card_ref.to_string()));
        }
        Self::require_ki(next, actor, cost)?;
        Self::require_living_target(next, target)?;

        let Some(played) = Self::spend_card(next, actor, idx) else {
            return Err(ActionError::CardNotInHand(card_ref.to_string()));
        };
        next.pending
            .enqueue_batch(BoundOp::bind_all(&played.card.ops, actor, target, &played.card.name));
        next.log(LogEntry::CardPlayed {
            caster: actor.clone(),
            card: played.card.name.clone(),
            target: target.cloned(),
        });
        self.fire(next, GameEvent::new(EventKind::CardPlayed, actor.clone()));

        if self.config.reaction_window_ms == 0 {
            return self.resolve_pending(next);
        }
        next.phase = Phase::Reaction;
        next.reaction_deadline = Some(now_ms.saturating_add(self.config.reaction_window_ms));
        Ok(())
    }

    fn react(
        &self,
        next: &mut Match,
        actor: &ParticipantId,
        card_ref: &str,
        target: Option<&ParticipantId>,
        now_ms: u64,
    ) -> Result<(), ActionError> {
        Self::require_phase(next, "react", &[Phase::Reaction])?;
        if next.reaction_deadline.is_some_and(|deadline| now_ms >= deadline) {
            return Err(ActionError::ReactionWindowClosed);
        }
        if &next.current_actor == actor {
            return Err(ActionError::CannotReactToOwnCard);
        }
        let idx = Self::hand_index(next, actor, card_ref)?;
        let (card_type, cost, used) = next
            .participant(actor)
            .map(|p| (p.hand[idx].card.card_type, p.hand[idx].card.cost, p.reactions_used))
            .ok_or_else(|| ActionError::NotParticipant(actor.clone()))?;
        if card_type != CardType::Reaction {
            return Err(ActionError::WrongCardType(card_ref.to_string()));
        }
        Self::require_ki(next, actor, cost)?;
        if used >= self.config.reaction_cap {
            return Err(ActionError::ReactionLimit { limit: self.config.reaction_cap });
        }
        Self::require_living_target(next, target)?;

        let Some(played) = Self::spend_card(next, actor, idx) else {
            return Err(ActionError::CardNotInHand(card_ref.to_string()));
        };
        if let Some(p) = next.participant_mut(actor) {
            p.reactions_used += 1;
        }
        next.pending
            .push_batch(BoundOp::bind_all(&played.card.ops, actor, target, &played.card.name));
        next.log(LogEntry::Reaction {
            caster: actor.clone(),
            card: played.card.name.clone(),
            target: target.cloned(),
        });
        Ok(())
    }

    /// Fire triggers for an event; their ops go on top of the stack.
    pub(super) fn fire(&self, next: &mut Match, event: GameEvent) {
        let mut ops = Vec::new();
        for fired in next.triggers.fire(&event) {
            next.log(LogEntry::TriggerFired {
                owner: fired.owner,
                event: fired.event,
                source: fired.source,
            });
            ops.extend(fired.ops);
        }
        next.pending.push_batch(ops);
    }

    /// Move delayed effects due now in `phase` under the pending ops.
    fn enqueue_due(next: &mut Match, phase: Phase) {
        for delayed in next.triggers.take_due(next.turn, phase) {
            next.log(LogEntry::DelayFired {
                phase,
                source: delayed.source.clone(),
            });
            next.pending.enqueue_batch(delayed.ops);
        }
    }

    /// Resolve phase, then end phase.
    fn resolve_pending(&self, next: &mut Match) -> Result<(), ActionError> {
        next.phase = Phase::Resolve;
        next.reaction_deadline = None;
        Self::enqueue_due(next, Phase::Resolve);
        self.interpreter.resolve(next)?;
        if next.is_finished() {
            return Ok(());
        }

        next.phase = Phase::End;
        Self::enqueue_due(next, Phase::End);
        if !next.pending.is_empty() {
            self.interpreter.resolve(next)?;
        }
        Ok(())
    }

    // =========================================================================
    // Turn flow
    // =========================================================================

    fn end_turn(&self, next: &mut Match, actor: &ParticipantId) -> Result<(), ActionError> {
        Self::require_turn(next, actor)?;
        Self::require_phase(next, "endTurn", &[Phase::Main, Phase::End])?;
        self.finish_turn(next)
    }

    /// Close the current actor's turn and open the next one.
    pub(super) fn finish_turn(&self, next: &mut Match) -> Result<(), ActionError> {
        let ending = next.current_actor.clone();
        let expired = next
            .participant_mut(&ending)
            .map(|p| p.tick_statuses())
            .unwrap_or_default();
        next.log(LogEntry::TurnEnded {
            actor: ending.clone(),
            expired,
        });
        self.fire(next, GameEvent::new(EventKind::TurnEnd, ending));
        if !next.pending.is_empty() {
            self.interpreter.resolve(next)?;
        }

        // A turn-start effect may defeat the new actor; keep passing the
        // turn until someone living holds it or the match ends.
        for _ in 0..next.participants.len() {
            if next.is_finished() {
                break;
            }
            self.start_turn(next)?;
            if next.is_finished() || next.is_alive(&next.current_actor) {
                break;
            }
        }
        Ok(())
    }

    fn start_turn(&self, next: &mut Match) -> Result<(), ActionError> {
        let Some(actor) = next.next_living_after(&next.current_actor) else {
            return Ok(());
        };
        next.turn += 1;
        next.current_actor = actor.clone();
        next.phase = Phase::Main;
        next.reaction_deadline = None;

        let mut ki = 0;
        let mut burns = Vec::new();
        if let Some(p) = next.participant_mut(&actor) {
            let regen = p.ki_regen;
            p.restore(Stat::Ki, regen);
            p.reactions_used = 0;
            ki = p.ki;
            burns = p
                .disasters
                .iter()
                .filter(|d| d.potency > 0)
                .map(|d| {
                    let op = Op::Damage {
                        amount: Value::Literal(d.potency),
                        target: TargetSpec::Caster,
                        attribute: None,
                    };
                    BoundOp::new(op, actor.clone(), Some(actor.clone()), &d.name)
                })
                .collect();
        }
        let drew = next.draw_cards(&actor, 1) == 1;
        debug!(turn = next.turn, actor = %actor, ki, drew, "turn started");
        next.log(LogEntry::TurnStarted {
            actor: actor.clone(),
            ki,
            drew,
        });

        next.pending.enqueue_batch(burns);
        Self::enqueue_due(next, Phase::Main);
        self.fire(next, GameEvent::new(EventKind::TurnStart, actor));
        if !next.pending.is_empty() {
            self.interpreter.resolve(next)?;
        }
        next.phase = Phase::Main;
        Ok(())
    }

    /// Process whichever window has elapsed. Returns whether anything ran.
    fn advance(&self, next: &mut Match, now_ms: u64) -> Result<bool, ActionError> {
        match next.phase {
            Phase::Reaction if next.reaction_deadline.is_some_and(|d| now_ms >= d) => {
                self.resolve_pending(next)?;
                Ok(true)
            }
            Phase::Threat if next.threat_deadline.is_some_and(|d| now_ms >= d) => {
                self.land_threat(next, 0, &[])?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl RulesEngine for MatchEngine {
    fn apply(
        &self,
        state: &Match,
        actor: &ParticipantId,
        request: &ActionRequest,
        now_ms: u64,
    ) -> Result<Transition, ActionError> {
        let result = self.try_apply(state, actor, request, now_ms);
        match &result {
            Ok(transition) => info!(
                match_id = %state.id,
                actor = %actor,
                action = request.name(),
                entries = transition.log.len(),
                "action applied"
            ),
            Err(err) => debug!(
                match_id = %state.id,
                actor = %actor,
                action = request.name(),
                code = err.code(),
                "action rejected"
            ),
        }
        result
    }

    fn advance_if_due(&self, state: &Match, now_ms: u64) -> Result<Option<Transition>, ActionError> {
        if state.is_finished() {
            return Ok(None);
        }
        let mut next = state.clone();
        let log_start = next.logs.len();
        if !self.advance(&mut next, now_ms)? {
            return Ok(None);
        }
        self.settle(&mut next)?;
        Ok(Some(Self::commit(next, log_start)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::Card;
    use crate::core::{MatchBuilder, Participant};

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn bolt(n: usize) -> CardInstance {
        let card = Card::new("bolt", "Bolt", CardType::Spell)
            .with_cost(2)
            .with_op(Op::Damage { amount: Value::Literal(10), target: TargetSpec::Enemy, attribute: None });
        CardInstance::new(format!("bolt#{n}"), card)
    }

    fn duel() -> Match {
        let mut p1 = Participant::new("p1", 20, 0, 10).with_ki(3, 2);
        p1.hand.push(bolt(1));
        MatchBuilder::new("m", 5)
            .participant(p1)
            .participant(Participant::new("p2", 20, 0, 10).with_ki(3, 2))
            .draw_pool(vec![bolt(2), bolt(3)])
            .build()
    }

    #[test]
    fn test_play_opens_reaction_window() {
        let engine = MatchEngine::default();
        let m = duel();
        let t = engine.apply(&m, &pid("p1"), &ActionRequest::play_card("m", "bolt#1", None), 1_000).unwrap();
        assert_eq!(t.state.phase, Phase::Reaction);
        assert_eq!(t.state.reaction_deadline, Some(4_000));
        assert_eq!(t.state.pending.len(), 1);
        assert_eq!(t.state.participant(&pid("p1")).map(|p| p.ki), Some(1));
        assert_eq!(t.state.version, 1);

        // Not yet due.
        assert!(engine.advance_if_due(&t.state, 3_999).unwrap().is_none());
        let resolved = engine.advance_if_due(&t.state, 4_000).unwrap().unwrap();
        assert_eq!(resolved.state.phase, Phase::End);
        assert_eq!(resolved.state.participant(&pid("p2")).map(|p| p.hp), Some(10));
        // Idempotent.
        assert!(engine.advance_if_due(&resolved.state, 9_000).unwrap().is_none());
    }

    #[test]
    fn test_advance_with_nothing_due_keeps_version() {
        let engine = MatchEngine::default();
        let m = duel();
        let t = engine.apply(&m, &pid("p1"), &ActionRequest::advance("m"), 0).unwrap();
        assert_eq!(t.state.version, 0);
        assert!(t.log.is_empty());
        assert_eq!(t.state, m);

        // Same inside an open window that has not elapsed yet.
        let played = engine.apply(&m, &pid("p1"), &ActionRequest::play_card("m", "bolt#1", None), 0).unwrap();
        let early = engine.apply(&played.state, &pid("p2"), &ActionRequest::advance("m"), 10).unwrap();
        assert_eq!(early.state.version, played.state.version);
        assert_eq!(early.state.phase, Phase::Reaction);
    }

    #[test]
    fn test_rejection_leaves_state_untouched() {
        let engine = MatchEngine::default();
        let m = duel();
        let err = engine
            .apply(&m, &pid("p2"), &ActionRequest::play_card("m", "bolt#1", None), 0)
            .unwrap_err();
        assert_eq!(err.code(), "not_your_turn");
        assert_eq!(m, duel());
    }

    #[test]
    fn test_end_turn_regenerates_and_draws() {
        let engine = MatchEngine::default();
        let m = duel();
        let t = engine.apply(&m, &pid("p1"), &ActionRequest::end_turn("m"), 0).unwrap();
        let p2 = t.state.participant(&pid("p2")).cloned().unwrap();
        assert_eq!(t.state.current_actor, pid("p2"));
        assert_eq!(t.state.turn, 2);
        assert_eq!(p2.ki, 5);
        assert_eq!(p2.hand.len(), 1);
    }

    #[test]
    fn test_finished_match_rejects_everything() {
        let engine = MatchEngine::default();
        let mut m = duel();
        m.status = crate::core::MatchStatus::Finished;
        let err = engine.apply(&m, &pid("p1"), &ActionRequest::end_turn("m"), 0).unwrap_err();
        assert_eq!(err, ActionError::MatchFinished);
        assert!(engine.advance_if_due(&m, u64::MAX).unwrap().is_none());
    }
}
