//! Combat sub-cycle integration tests: ATTACK, DEFEND, PRAY.

use card_battle::cards::{Attribute, Card, CardInstance, CardType, Matchup};
use card_battle::core::{ActionRequest, EquipSlot, LogEntry, Match, MatchBuilder, Participant, ParticipantId, Phase};
use card_battle::effects::{Op, TargetSpec, Value};
use card_battle::rules::{ActionError, MatchEngine, RulesEngine};
use card_battle::stack::{BoundOp, Interpreter};

fn pid(s: &str) -> ParticipantId {
    ParticipantId::new(s)
}

fn weapon(id: &str, attribute: Attribute, attack: i64) -> CardInstance {
    let card = Card::new(id, id, CardType::Weapon)
        .with_attribute(attribute)
        .with_stats(attack, 0);
    CardInstance::new(id, card)
}

fn armor(id: &str, attribute: Attribute, defense: i64) -> CardInstance {
    let card = Card::new(id, id, CardType::Armor)
        .with_attribute(attribute)
        .with_stats(0, defense);
    CardInstance::new(id, card)
}

fn arena(attacker_hand: Vec<CardInstance>, defender_hand: Vec<CardInstance>) -> Match {
    let mut p1 = Participant::new("p1", 40, 0, 5);
    p1.hand = attacker_hand;
    let mut p2 = Participant::new("p2", 40, 0, 5);
    p2.hand = defender_hand;
    MatchBuilder::new("m", 8)
        .participant(p1)
        .participant(p2)
        .draw_pool(vec![armor("pool#1", Attribute::Neutral, 1), armor("pool#2", Attribute::Neutral, 1)])
        .unshuffled()
        .build()
}

fn hp(state: &Match, id: &str) -> Option<i64> {
    state.participant(&pid(id)).map(|p| p.hp)
}

// =============================================================================
// Attack and Defend
// =============================================================================

/// Test the light example: power 12 against 8 defense deals 12.
#[test]
fn test_light_attack_ignores_defense() {
    let engine = MatchEngine::default();
    let state = arena(
        vec![weapon("blade", Attribute::Light, 12)],
        vec![armor("plate", Attribute::Neutral, 8)],
    );

    let attacked = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "blade", "p2"), 0)
        .unwrap();
    assert_eq!(attacked.state.phase, Phase::Threat);
    assert_eq!(attacked.state.threat.as_ref().map(|t| t.power), Some(12));
    assert_eq!(attacked.state.threat_deadline, Some(15_000));

    let defended = engine
        .apply(&attacked.state, &pid("p2"), &ActionRequest::defend("m", &["plate"]), 100)
        .unwrap();
    assert_eq!(hp(&defended.state, "p2"), Some(28));
    assert_eq!(defended.state.phase, Phase::Main);
    assert!(defended.state.threat.is_none());
    assert!(defended
        .log
        .iter()
        .any(|r| matches!(r.entry, LogEntry::Defend { block: 8, matchup: Matchup::Bypass, damage: 12, .. })));
}

/// Test the dark example: any nonzero unblocked hit defeats the defender.
#[test]
fn test_dark_attack_is_lethal() {
    let engine = MatchEngine::default();
    let state = arena(vec![weapon("shade", Attribute::Dark, 3)], vec![]);

    let attacked = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "shade", "p2"), 0)
        .unwrap();
    let defended = engine
        .apply(&attacked.state, &pid("p2"), &ActionRequest::defend("m", &[]), 10)
        .unwrap();
    assert_eq!(hp(&defended.state, "p2"), Some(0));
    assert!(defended.finished());
    assert_eq!(defended.state.winner, Some(pid("p1")));
}

/// Test that light armor fully blocks a dark hit.
#[test]
fn test_light_armor_nullifies_dark() {
    let engine = MatchEngine::default();
    let state = arena(
        vec![weapon("shade", Attribute::Dark, 3)],
        vec![armor("halo", Attribute::Light, 5)],
    );
    let attacked = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "shade", "p2"), 0)
        .unwrap();
    let defended = engine
        .apply(&attacked.state, &pid("p2"), &ActionRequest::defend("m", &["halo"]), 10)
        .unwrap();
    assert_eq!(hp(&defended.state, "p2"), Some(40));
    assert!(!defended.finished());
}

/// Test that an unanswered threat lands unblocked when its window times out.
#[test]
fn test_threat_times_out() {
    let engine = MatchEngine::default();
    let state = arena(
        vec![weapon("spear", Attribute::Fire, 10)],
        vec![armor("plate", Attribute::Neutral, 8)],
    );
    let attacked = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "spear", "p2"), 0)
        .unwrap();

    assert!(engine.advance_if_due(&attacked.state, 14_999).unwrap().is_none());
    let landed = engine.advance_if_due(&attacked.state, 15_000).unwrap().unwrap();
    assert_eq!(hp(&landed.state, "p2"), Some(30));
    assert_eq!(landed.state.phase, Phase::Main);
    // The armor was never used.
    assert_eq!(landed.state.participant(&pid("p2")).map(|p| p.hand.len()), Some(1));
}

/// Test that equipment adds to attack power and to block.
#[test]
fn test_equipment_feeds_combat() {
    let engine = MatchEngine::default();
    let mut state = arena(
        vec![weapon("spear", Attribute::Fire, 10)],
        vec![armor("plate", Attribute::Neutral, 8)],
    );
    let gear = |slot, name: &str, power, defense, target: &str| Op::Equip {
        slot,
        name: name.into(),
        power: Value::Literal(power),
        defense: Value::Literal(defense),
        target: TargetSpec::Id(pid(target)),
    };
    let ops = [
        gear(EquipSlot::Weapon, "Whetstone", 5, 0, "p1"),
        gear(EquipSlot::Armor, "Buckler", 0, 3, "p2"),
    ];
    state.pending.enqueue_batch(BoundOp::bind_all(&ops, &pid("p1"), None, "Armory"));
    Interpreter::default().resolve(&mut state).unwrap();

    let attacked = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "spear", "p2"), 0)
        .unwrap();
    assert_eq!(attacked.state.threat.as_ref().map(|t| t.power), Some(15));

    let defended = engine
        .apply(&attacked.state, &pid("p2"), &ActionRequest::defend("m", &["plate"]), 10)
        .unwrap();
    assert!(defended
        .log
        .iter()
        .any(|r| matches!(r.entry, LogEntry::Defend { block: 11, matchup: Matchup::Normal, damage: 4, .. })));
    assert_eq!(hp(&defended.state, "p2"), Some(36));
}

/// Test the combat guards.
#[test]
fn test_combat_guards() {
    let engine = MatchEngine::default();
    let state = arena(
        vec![weapon("spear", Attribute::Fire, 10), armor("cap", Attribute::Neutral, 2)],
        vec![armor("plate", Attribute::Neutral, 8)],
    );

    let err = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "cap", "p2"), 0)
        .unwrap_err();
    assert_eq!(err, ActionError::WrongCardType("cap".into()));

    let err = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "spear", "p1"), 0)
        .unwrap_err();
    assert_eq!(err.code(), "invalid_target");

    let err = engine.apply(&state, &pid("p1"), &ActionRequest::pray("m"), 0).unwrap_err();
    assert_eq!(err, ActionError::HoldsAttackableCard);

    let attacked = engine
        .apply(&state, &pid("p1"), &ActionRequest::attack("m", "spear", "p2"), 0)
        .unwrap();
    let err = engine
        .apply(&attacked.state, &pid("p1"), &ActionRequest::defend("m", &["cap"]), 1)
        .unwrap_err();
    assert!(matches!(err, ActionError::NotDefender { .. }));
    let err = engine
        .apply(&attacked.state, &pid("p1"), &ActionRequest::end_turn("m"), 1)
        .unwrap_err();
    assert_eq!(err.code(), "wrong_phase");
}

// =============================================================================
// Pray
// =============================================================================

/// Test that praying discards the oldest card, draws two and passes the turn.
#[test]
fn test_pray_redraws_and_ends_turn() {
    let engine = MatchEngine::default();
    let state = arena(
        vec![armor("old", Attribute::Neutral, 1), armor("new", Attribute::Neutral, 1)],
        vec![],
    );
    let t = engine.apply(&state, &pid("p1"), &ActionRequest::pray("m"), 0).unwrap();

    let p1 = t.state.participant(&pid("p1")).unwrap();
    let ids: Vec<&str> = p1.hand.iter().map(|c| c.instance_id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], "new");
    assert_eq!(t.state.discard_pile.len(), 1);
    assert_eq!(t.state.current_actor, pid("p2"));
    assert!(t
        .log
        .iter()
        .any(|r| matches!(&r.entry, LogEntry::Pray { discarded: Some(name), drew: 2, .. } if name == "old")));
}
