//! The stack interpreter.
//!
//! Drains the match's pending stack in one pass, applying each bound op to
//! the match it is given. The caller owns the transaction boundary: the
//! state machine hands in a private working copy and only commits it if the
//! pass returns `Ok`.
//!
//! ## Pass structure
//!
//! 1. Pop the top op. Skip it silently if its caster was defeated (unless
//!    it is an on-death op).
//! 2. Resolve its target token. Unknown ids and unbound variables are
//!    logged as `skipped`; an empty living set is skipped silently.
//! 3. Dispatch by tag. Branch-bearing ops push their chosen branch back
//!    with [`PendingStack::push_batch`], so the branch resolves next, in
//!    script order.
//! 4. Damage and healing emit events; fired triggers are pushed on top.
//!
//! After the stack empties, the sweep clamps every pool, marks new defeats,
//! fires on-death registrations and drains again until nothing changes. If
//! at most one participant is still standing the match is finished.

use tracing::{debug, trace, warn};

use super::pending::{BoundOp, PendingStack};
use crate::core::{
    CombatFlag, EngineConfig, Equipment, LogEntry, Match, MatchRng, MatchStatus, ParticipantId, Stat,
};
use crate::effects::{
    Binding, Bindings, DiscardFrom, EvalContext, FindFilter, Op, TargetResolver, Targets, Value,
    VarLookup,
};
use crate::rules::InvariantViolation;
use crate::triggers::{EventKind, GameEvent, Trigger};

/// What one resolution pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Ops popped.
    pub steps: usize,
    /// Participants defeated during the pass, in order.
    pub defeated: Vec<ParticipantId>,
    /// Whether the pass ended the match.
    pub finished: bool,
}

/// Resolves pending ops against a match.
#[derive(Clone, Debug, Default)]
pub struct Interpreter {
    config: EngineConfig,
}

impl Interpreter {
    /// Create an interpreter with the given tuning.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Drain the pending stack and run the end-of-pass sweep.
    ///
    /// # Errors
    ///
    /// Fails if the match is already finished or the pass exceeds its step
    /// budget. The match is left partially resolved in that case and must
    /// not be committed.
    pub fn resolve(&self, state: &mut Match) -> Result<PassOutcome, InvariantViolation> {
        let pass = Pass::begin(state, &self.config)?;
        pass.finish()
    }

    /// Land a combat hit on `defender`, then sweep.
    ///
    /// A lethal hit sets hp to 0 regardless of shield. Any other hit goes
    /// through the regular damage pipeline (shield, reflect, lifesteal,
    /// `damaged` triggers).
    ///
    /// # Errors
    ///
    /// As [`Interpreter::resolve`].
    pub fn strike(
        &self,
        state: &mut Match,
        attacker: &ParticipantId,
        defender: &ParticipantId,
        damage: i64,
        lethal: bool,
        source: &str,
    ) -> Result<PassOutcome, InvariantViolation> {
        let mut pass = Pass::begin(state, &self.config)?;
        if lethal {
            if let Some(p) = pass.state.participant_mut(defender) {
                let lost = p.hp.max(0);
                p.hp = 0;
                pass.state.log(LogEntry::Damage {
                    caster: attacker.clone(),
                    target: defender.clone(),
                    amount: lost,
                    absorbed: 0,
                    source: source.to_string(),
                });
            }
        } else {
            pass.deal_damage(attacker, defender, damage.max(0), source);
        }
        pass.finish()
    }
}

// =============================================================================
// Pass
// =============================================================================

/// Working state of one pass. The RNG and the stack are taken out of the
/// match for the duration and written back at the end.
struct Pass<'s> {
    state: &'s mut Match,
    rng: MatchRng,
    stack: PendingStack,
    vars: Bindings,
    config: &'s EngineConfig,
    outcome: PassOutcome,
}

impl<'s> Pass<'s> {
    fn begin(state: &'s mut Match, config: &'s EngineConfig) -> Result<Self, InvariantViolation> {
        if state.is_finished() {
            return Err(InvariantViolation::ResolveFinishedMatch);
        }
        let rng = state.rng();
        let stack = std::mem::take(&mut state.pending);
        Ok(Self {
            state,
            rng,
            stack,
            vars: Bindings::new(),
            config,
            outcome: PassOutcome::default(),
        })
    }

    fn finish(mut self) -> Result<PassOutcome, InvariantViolation> {
        self.sweep()?;
        self.state.store_rng(&self.rng);
        self.state.pending = std::mem::take(&mut self.stack);
        debug!(
            steps = self.outcome.steps,
            defeated = self.outcome.defeated.len(),
            finished = self.outcome.finished,
            "resolution pass complete"
        );
        Ok(self.outcome)
    }

    fn drain(&mut self) -> Result<(), InvariantViolation> {
        while let Some(bound) = self.stack.pop() {
            self.outcome.steps += 1;
            if self.outcome.steps > self.config.max_steps_per_pass {
                return Err(InvariantViolation::StepBudgetExceeded {
                    limit: self.config.max_steps_per_pass,
                });
            }
            self.apply(bound);
        }
        Ok(())
    }

    // === Sweep ===

    fn sweep(&mut self) -> Result<(), InvariantViolation> {
        loop {
            self.drain()?;
            for p in self.state.participants.iter_mut() {
                p.clamp_resources();
            }

            let fallen: Vec<ParticipantId> = self
                .state
                .participants
                .iter()
                .filter(|p| !p.defeated && p.hp <= 0)
                .map(|p| p.id.clone())
                .collect();
            if fallen.is_empty() {
                break;
            }

            let mut posthumous = Vec::new();
            for id in fallen {
                if let Some(p) = self.state.participant_mut(&id) {
                    p.defeated = true;
                }
                debug!(participant = %id, "participant defeated");
                self.state.log(LogEntry::Defeated { participant: id.clone() });
                for fired in self.state.triggers.fire(&GameEvent::new(EventKind::Defeated, id.clone())) {
                    self.state.log(LogEntry::TriggerFired {
                        owner: fired.owner,
                        event: fired.event,
                        source: fired.source,
                    });
                    posthumous.extend(fired.ops);
                }
                self.state.triggers.remove_owned_by(&id);
                self.outcome.defeated.push(id);
            }
            self.stack.push_batch(posthumous);
        }

        if self.state.active_count() <= 1 {
            let winner = self.state.living_ids().next();
            debug!(winner = ?winner, "match finished");
            self.state.status = MatchStatus::Finished;
            self.state.winner = winner.clone();
            self.state.reaction_deadline = None;
            self.state.threat_deadline = None;
            self.state.threat = None;
            self.state.log(LogEntry::GameOver { winner });
            self.outcome.finished = true;
        }
        Ok(())
    }

    // === Helpers ===

    fn eval(&mut self, value: &Value, bound: &BoundOp, target: Option<&ParticipantId>) -> i64 {
        let ctx = EvalContext {
            state: &*self.state,
            caster: &bound.caster,
            target,
            vars: VarLookup::new(&self.vars, &bound.scope),
        };
        value.evaluate(&ctx, &mut self.rng)
    }

    fn targets(&mut self, bound: &BoundOp) -> Option<Targets> {
        let spec = bound.op.target()?;
        let resolver = TargetResolver::new(
            &*self.state,
            &bound.caster,
            bound.target.as_ref(),
            VarLookup::new(&self.vars, &bound.scope),
        );
        match resolver.resolve(spec, bound.op.is_harmful(), &mut self.rng) {
            Ok(targets) => Some(targets),
            Err(reason) => {
                warn!(op = bound.op.tag(), source = %bound.source, %reason, "op skipped");
                self.state.log(LogEntry::Skipped {
                    op: bound.op.tag().to_string(),
                    reason: reason.to_string(),
                    source: bound.source.clone(),
                });
                None
            }
        }
    }

    /// Push a nested branch so it resolves next, in order.
    fn expand(&mut self, parent: &BoundOp, ops: &[Op]) {
        if ops.is_empty() {
            return;
        }
        if parent.depth.saturating_add(1) >= self.config.max_nesting_depth {
            self.too_deep(parent);
            return;
        }
        self.stack.push_batch(parent.children(ops));
    }

    fn too_deep(&mut self, parent: &BoundOp) {
        warn!(op = parent.op.tag(), source = %parent.source, depth = parent.depth, "nesting too deep");
        self.state.log(LogEntry::Skipped {
            op: parent.op.tag().to_string(),
            reason: "nesting depth exceeded".to_string(),
            source: parent.source.clone(),
        });
    }

    /// Fire triggers for an event, pushing their ops so they resolve next.
    fn emit(&mut self, event: GameEvent) {
        let mut ops = Vec::new();
        for fired in self.state.triggers.fire(&event) {
            self.state.log(LogEntry::TriggerFired {
                owner: fired.owner,
                event: fired.event,
                source: fired.source,
            });
            ops.extend(fired.ops);
        }
        self.stack.push_batch(ops);
    }

    /// The damage pipeline. Returns hp actually lost.
    fn deal_damage(&mut self, caster: &ParticipantId, target: &ParticipantId, amount: i64, source: &str) -> i64 {
        let Some(p) = self.state.participant_mut(target) else {
            return 0;
        };
        let absorbed = p.shield.clamp(0, amount);
        p.shield -= absorbed;
        let dealt = amount - absorbed;
        p.hp = p.hp.saturating_sub(dealt);
        let reflect_pct = if dealt > 0 && target != caster {
            p.flags.take(CombatFlag::Reflect)
        } else {
            0
        };

        self.state.log(LogEntry::Damage {
            caster: caster.clone(),
            target: target.clone(),
            amount: dealt,
            absorbed,
            source: source.to_string(),
        });
        if dealt <= 0 {
            return 0;
        }

        if target != caster {
            if let Some(c) = self.state.participant_mut(caster) {
                let pct = c.flags.take(CombatFlag::Lifesteal);
                let healed = c.restore(Stat::Hp, dealt.saturating_mul(pct) / 100);
                if pct > 0 {
                    self.state.log(LogEntry::Lifesteal {
                        caster: caster.clone(),
                        amount: healed,
                        source: source.to_string(),
                    });
                }
            }
        }

        let reflected = dealt.saturating_mul(reflect_pct) / 100;
        if reflected > 0 {
            if let Some(c) = self.state.participant_mut(caster) {
                c.hp = c.hp.saturating_sub(reflected);
                self.state.log(LogEntry::Reflect {
                    from: target.clone(),
                    to: caster.clone(),
                    amount: reflected,
                    source: source.to_string(),
                });
            }
        }

        self.emit(GameEvent::damaged(target.clone(), caster.clone(), dealt));
        dealt
    }

    fn register(&mut self, bound: &BoundOp, owner: &ParticipantId, event: EventKind, actions: &[Op], uses: u32) {
        let depth = bound.depth.saturating_add(1);
        if depth >= self.config.max_nesting_depth {
            self.too_deep(bound);
            return;
        }
        let trigger = Trigger::new(owner.clone(), event, bound.caster.clone(), &bound.source)
            .with_actions(actions.to_vec())
            .with_uses(uses)
            .with_depth(depth);
        self.state.triggers.register(trigger);
        self.state.log(LogEntry::TriggerRegistered {
            owner: owner.clone(),
            event,
            source: bound.source.clone(),
        });
    }

    // === Dispatch ===

    fn apply(&mut self, bound: BoundOp) {
        if !bound.posthumous && !self.state.is_alive(&bound.caster) {
            trace!(op = bound.op.tag(), caster = %bound.caster, "caster defeated, skipping");
            return;
        }

        let targets = match bound.op.target() {
            Some(_) => match self.targets(&bound) {
                Some(targets) if !targets.is_empty() => targets,
                _ => return,
            },
            None => Targets::new(),
        };
        debug!(op = bound.op.tag(), caster = %bound.caster, source = %bound.source, targets = targets.len(), "dispatch");

        let source = bound.source.clone();
        match &bound.op {
            Op::Damage { amount, attribute, .. } => {
                for t in &targets {
                    let mut amount = self.eval(amount, &bound, Some(t)).max(0);
                    let weak = self
                        .state
                        .participant(t)
                        .is_some_and(|p| attribute.and_then(|a| a.opposing()) == Some(p.attribute));
                    if weak {
                        amount = amount.saturating_mul(self.config.weakness_pct) / 100;
                    }
                    self.deal_damage(&bound.caster, t, amount, &source);
                }
            }

            Op::Heal { amount, stat, .. } => {
                for t in &targets {
                    let amount = self.eval(amount, &bound, Some(t)).max(0);
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    let gained = p.restore(*stat, amount);
                    self.state.log(LogEntry::Heal {
                        caster: bound.caster.clone(),
                        target: t.clone(),
                        stat: *stat,
                        amount: gained,
                        source: source.clone(),
                    });
                    if *stat == Stat::Hp && gained > 0 {
                        self.emit(
                            GameEvent::new(EventKind::Healed, t.clone())
                                .with_source(bound.caster.clone())
                                .with_amount(gained),
                        );
                    }
                }
            }

            Op::Shield { amount, .. } => {
                for t in &targets {
                    let amount = self.eval(amount, &bound, Some(t)).max(0);
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    p.shield = p.shield.saturating_add(amount);
                    self.state.log(LogEntry::Shield {
                        caster: bound.caster.clone(),
                        target: t.clone(),
                        amount,
                        source: source.clone(),
                    });
                }
            }

            Op::Draw { count, .. } => {
                for t in &targets {
                    let count = self.eval(count, &bound, Some(t)).max(0) as usize;
                    let drawn = self.state.draw_cards(t, count);
                    self.state.log(LogEntry::Draw {
                        target: t.clone(),
                        count: drawn,
                        source: source.clone(),
                    });
                }
            }

            Op::Discard { count, from, .. } => {
                for t in &targets {
                    let count = self.eval(count, &bound, Some(t)).max(0) as usize;
                    let mut moved = Vec::new();
                    if let Some(p) = self.state.participant_mut(t) {
                        while moved.len() < count && !p.hand.is_empty() {
                            let len = p.hand.len();
                            let idx = match from {
                                DiscardFrom::Newest => len - 1,
                                DiscardFrom::Oldest => 0,
                                DiscardFrom::Random => self.rng.gen_index(len).unwrap_or(0),
                            };
                            moved.push(p.hand.remove(idx));
                        }
                    }
                    let discarded = moved.len();
                    self.state.discard_pile.extend(moved);
                    self.state.log(LogEntry::Discard {
                        target: t.clone(),
                        count: discarded,
                        source: source.clone(),
                    });
                }
            }

            Op::AddMarker { name, turns, .. } => {
                for t in &targets {
                    let turns = self.eval(turns, &bound, Some(t)).max(1);
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    p.add_marker(name, turns);
                    self.state.log(LogEntry::AddMarker {
                        target: t.clone(),
                        marker: name.clone(),
                        turns,
                        source: source.clone(),
                    });
                }
            }

            Op::ApplyDisaster { name, turns, potency, .. } => {
                for t in &targets {
                    let turns = self.eval(turns, &bound, Some(t)).max(1);
                    let potency = self.eval(potency, &bound, Some(t)).max(0);
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    p.add_disaster(name, turns, potency);
                    self.state.log(LogEntry::Disaster {
                        target: t.clone(),
                        name: name.clone(),
                        turns,
                        potency,
                        source: source.clone(),
                    });
                }
            }

            Op::RemoveDisaster { name, .. } => {
                for t in &targets {
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    let removed = p.remove_disasters(name.as_deref());
                    self.state.log(LogEntry::DisasterRemoved {
                        target: t.clone(),
                        removed,
                        source: source.clone(),
                    });
                }
            }

            Op::ModifyStat { stat, amount, .. } => {
                for t in &targets {
                    let delta = self.eval(amount, &bound, Some(t));
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    let slot = p.stat_mut(*stat);
                    *slot = slot.saturating_add(delta);
                    let value = *slot;
                    self.state.log(LogEntry::StatChanged {
                        target: t.clone(),
                        stat: *stat,
                        delta,
                        value,
                        source: source.clone(),
                    });
                }
            }

            Op::SetVar { var, value } => {
                let value = self.eval(value, &bound, bound.target.as_ref());
                self.vars.set(var, Binding::Number(value));
                self.state.log(LogEntry::Variable {
                    name: var.clone(),
                    value,
                    source,
                });
            }

            Op::If { cond, then, otherwise } => {
                let result = {
                    let ctx = EvalContext {
                        state: &*self.state,
                        caster: &bound.caster,
                        target: bound.target.as_ref(),
                        vars: VarLookup::new(&self.vars, &bound.scope),
                    };
                    cond.evaluate(&ctx, &mut self.rng)
                };
                self.state.log(LogEntry::Condition {
                    cond: cond.source().to_string(),
                    result,
                    source,
                });
                self.expand(&bound, if result { then } else { otherwise });
            }

            Op::Random { chance, then, otherwise } => {
                let (roll, success) = self.rng.chance(*chance);
                self.state.log(LogEntry::Random {
                    chance: *chance,
                    roll,
                    success,
                    source,
                });
                self.expand(&bound, if success { then } else { otherwise });
            }

            Op::ForEach { loop_var, actions, .. } => {
                if actions.is_empty() {
                    return;
                }
                if bound.depth.saturating_add(1) >= self.config.max_nesting_depth {
                    self.too_deep(&bound);
                    return;
                }
                let parent = &bound;
                let unrolled: Vec<BoundOp> = targets
                    .iter()
                    .flat_map(|elem| {
                        let single: Targets = std::iter::once(elem.clone()).collect();
                        actions.iter().map(move |op| {
                            parent
                                .child(op)
                                .with_binding(loop_var, Binding::Participants(single.clone()))
                                .with_target(Some(elem.clone()))
                        })
                    })
                    .collect();
                self.stack.push_batch(unrolled);
            }

            Op::Find { filters, var, .. } => {
                let filters = FindFilter::parse_all(filters);
                let matched = TargetResolver::new(
                    &*self.state,
                    &bound.caster,
                    bound.target.as_ref(),
                    VarLookup::new(&self.vars, &bound.scope),
                )
                .find(&filters);
                self.vars.set(var, Binding::Participants(matched.clone()));
                self.state.log(LogEntry::Find {
                    var: var.clone(),
                    matched: matched.into_vec(),
                    source,
                });
            }

            Op::AddTrigger { event, actions, uses, .. } => {
                for t in &targets {
                    self.register(&bound, t, *event, actions, *uses);
                }
            }

            Op::OnDeath { actions, .. } => {
                for t in &targets {
                    self.register(&bound, t, EventKind::Defeated, actions, 1);
                }
            }

            Op::Delay { turns, phase, actions, .. } => {
                if bound.depth.saturating_add(1) >= self.config.max_nesting_depth {
                    self.too_deep(&bound);
                    return;
                }
                for t in &targets {
                    let turns = self.eval(turns, &bound, Some(t)).max(0);
                    let fire_turn = self.state.turn.saturating_add(u32::try_from(turns).unwrap_or(u32::MAX));
                    let ops: Vec<BoundOp> = actions
                        .iter()
                        .map(|op| bound.child(op).with_target(Some(t.clone())))
                        .collect();
                    self.state.triggers.schedule(fire_turn, *phase, &source, ops);
                    self.state.log(LogEntry::DelayScheduled {
                        fire_turn,
                        phase: *phase,
                        source: source.clone(),
                    });
                }
            }

            Op::Execute { threshold, .. } => {
                for t in &targets {
                    let threshold = self.eval(threshold, &bound, Some(t));
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    let success = p.hp <= threshold;
                    if success {
                        p.hp = 0;
                    }
                    self.state.log(LogEntry::Execute {
                        caster: bound.caster.clone(),
                        target: t.clone(),
                        threshold,
                        success,
                        source: source.clone(),
                    });
                }
            }

            Op::Lifesteal { percent, .. } => self.set_flag(&bound, &targets, CombatFlag::Lifesteal, percent),

            Op::ReflectDamage { percent, .. } => self.set_flag(&bound, &targets, CombatFlag::Reflect, percent),

            Op::Equip { slot, name, power, defense, .. } => {
                for t in &targets {
                    let power = self.eval(power, &bound, Some(t));
                    let defense = self.eval(defense, &bound, Some(t));
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    *p.equipment.slot_mut(*slot) = Some(Equipment {
                        name: name.clone(),
                        power,
                        defense,
                    });
                    self.state.log(LogEntry::Equip {
                        target: t.clone(),
                        slot: *slot,
                        name: name.clone(),
                        source: source.clone(),
                    });
                }
            }

            Op::ChangeAttribute { attribute, .. } => {
                for t in &targets {
                    let Some(p) = self.state.participant_mut(t) else { continue };
                    p.attribute = *attribute;
                    self.state.log(LogEntry::AttributeChanged {
                        target: t.clone(),
                        attribute: *attribute,
                        source: source.clone(),
                    });
                }
            }
        }
    }

    fn set_flag(&mut self, bound: &BoundOp, targets: &Targets, flag: CombatFlag, percent: &Value) {
        for t in targets {
            let percent = self.eval(percent, bound, Some(t)).clamp(0, 100);
            let Some(p) = self.state.participant_mut(t) else { continue };
            p.flags.set(flag, percent);
            self.state.log(LogEntry::FlagSet {
                target: t.clone(),
                flag,
                percent,
                source: bound.source.clone(),
            });
        }
    }
}
