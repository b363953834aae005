//! The combat sub-cycle: `ATTACK`, `DEFEND` and `PRAY`.
//!
//! An attack does no damage by itself. It records a [`Threat`] and hands
//! the defender a window to block with armor cards; the hit lands when they
//! answer or when the window times out. The attribute table lives in
//! [`crate::cards::classify`]; [`compute`] turns a classified matchup into a
//! damage figure.

use tracing::debug;

use super::error::ActionError;
use super::machine::MatchEngine;
use crate::cards::{classify, Attribute, Matchup};
use crate::core::{EngineConfig, LogEntry, Match, ParticipantId, Phase, Threat};

/// Result of resolving a threat against a defense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CombatOutcome {
    pub matchup: Matchup,
    /// Damage to route through the damage pipeline.
    pub damage: i64,
    /// The hit defeats the defender outright.
    pub lethal: bool,
}

/// Compute the outcome of an attack.
///
/// `block_attrs` are the attributes of the armor used; an empty slice means
/// the defender did not block.
#[must_use]
pub fn compute(
    config: &EngineConfig,
    attribute: Attribute,
    power: i64,
    block: i64,
    block_attrs: &[Attribute],
    defender: Attribute,
) -> CombatOutcome {
    let power = power.max(0);
    let block = block.max(0);
    let matchup = classify(attribute, power, block, block_attrs, defender);
    let base = (power - block).max(0);
    let (damage, lethal) = match matchup {
        Matchup::Bypass => (power, false),
        Matchup::Lethal => (power, power > 0),
        Matchup::Nullified => (0, false),
        Matchup::Normal => (base, false),
        Matchup::Resisted => (base.saturating_mul(config.resisted_pct) / 100, false),
        Matchup::Weakness => (base.saturating_mul(config.weakness_pct) / 100, false),
    };
    CombatOutcome { matchup, damage, lethal }
}

impl MatchEngine {
    pub(super) fn attack(
        &self,
        next: &mut Match,
        actor: &ParticipantId,
        weapon_ref: &str,
        defender: &ParticipantId,
        now_ms: u64,
    ) -> Result<(), ActionError> {
        Self::require_turn(next, actor)?;
        Self::require_phase(next, "attack", &[Phase::Main])?;
        let idx = Self::hand_index(next, actor, weapon_ref)?;
        let weapon = next
            .participant(actor)
            .map(|p| p.hand[idx].card.clone())
            .ok_or_else(|| ActionError::NotParticipant(actor.clone()))?;
        if !weapon.is_weapon() {
            return Err(ActionError::WrongCardType(weapon_ref.to_string()));
        }
        Self::require_ki(next, actor, weapon.cost)?;
        if defender == actor || !next.is_alive(defender) {
            return Err(ActionError::InvalidTarget(defender.to_string()));
        }

        if Self::spend_card(next, actor, idx).is_none() {
            return Err(ActionError::CardNotInHand(weapon_ref.to_string()));
        }
        let bonus = next.participant(actor).map_or(0, |p| p.attack_bonus());
        let power = weapon.stats.attack.saturating_add(bonus).max(0);
        next.threat = Some(Threat {
            attacker: actor.clone(),
            defender: defender.clone(),
            power,
            attribute: weapon.attribute,
            source: weapon.name.clone(),
        });
        next.phase = Phase::Threat;
        next.threat_deadline = Some(now_ms.saturating_add(self.config.threat_window_ms));
        next.log(LogEntry::Attack {
            attacker: actor.clone(),
            defender: defender.clone(),
            power,
            attribute: weapon.attribute,
            source: weapon.name,
        });
        Ok(())
    }

    pub(super) fn defend(&self, next: &mut Match, actor: &ParticipantId, armor_refs: &[String]) -> Result<(), ActionError> {
        Self::require_phase(next, "defend", &[Phase::Threat])?;
        let Some(threat) = next.threat.as_ref() else {
            return Err(ActionError::WrongPhase { action: "defend", phase: next.phase });
        };
        if &threat.defender != actor {
            return Err(ActionError::NotDefender { defender: threat.defender.clone() });
        }

        let mut indices = Vec::with_capacity(armor_refs.len());
        for card_ref in armor_refs {
            let idx = Self::hand_index(next, actor, card_ref)?;
            let is_armor = next.participant(actor).is_some_and(|p| p.hand[idx].card.is_armor());
            if !is_armor {
                return Err(ActionError::WrongCardType(card_ref.clone()));
            }
            if indices.contains(&idx) {
                return Err(ActionError::MalformedPayload(format!("{card_ref} listed twice")));
            }
            indices.push(idx);
        }

        // Remove from the back so earlier indices stay valid.
        indices.sort_unstable_by(|a, b| b.cmp(a));
        let mut block = next.participant(actor).map_or(0, |p| p.block_bonus());
        let mut block_attrs = Vec::with_capacity(indices.len());
        for idx in indices {
            if let Some(card) = Self::spend_card_free(next, actor, idx) {
                block = block.saturating_add(card.card.stats.defense);
                block_attrs.push(card.card.attribute);
            }
        }
        self.land_threat(next, block, &block_attrs)
    }

    /// Resolve the pending threat against a block. A timeout lands with no block.
    pub(super) fn land_threat(&self, next: &mut Match, block: i64, block_attrs: &[Attribute]) -> Result<(), ActionError> {
        let Some(threat) = next.threat.take() else {
            return Ok(());
        };
        next.threat_deadline = None;
        next.phase = Phase::Main;

        let defender_attr = next
            .participant(&threat.defender)
            .map_or(Attribute::Neutral, |p| p.attribute);
        let outcome = compute(&self.config, threat.attribute, threat.power, block, block_attrs, defender_attr);
        debug!(
            attacker = %threat.attacker,
            defender = %threat.defender,
            matchup = ?outcome.matchup,
            damage = outcome.damage,
            "threat landed"
        );
        next.log(LogEntry::Defend {
            defender: threat.defender.clone(),
            block,
            matchup: outcome.matchup,
            damage: outcome.damage,
        });
        self.interpreter.strike(
            next,
            &threat.attacker,
            &threat.defender,
            outcome.damage,
            outcome.lethal,
            &threat.source,
        )?;
        Ok(())
    }

    pub(super) fn pray(&self, next: &mut Match, actor: &ParticipantId) -> Result<(), ActionError> {
        Self::require_turn(next, actor)?;
        Self::require_phase(next, "pray", &[Phase::Main])?;
        let holds_weapon = next
            .participant(actor)
            .is_some_and(|p| p.hand.iter().any(|c| c.card.is_weapon()));
        if holds_weapon {
            return Err(ActionError::HoldsAttackableCard);
        }

        let discarded = Self::spend_card_free(next, actor, 0);
        let drew = next.draw_cards(actor, self.config.pray_draw);
        next.log(LogEntry::Pray {
            actor: actor.clone(),
            discarded: discarded.map(|c| c.card.name),
            drew,
        });
        self.finish_turn(next)
    }
}
