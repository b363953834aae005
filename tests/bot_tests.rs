//! Bot policy integration tests.
//!
//! Bots are driven through the same `RulesEngine::apply` path as human
//! players, with a deck loaded from authored card documents.

use card_battle::bot::{BotConfig, DecisionPolicy, Difficulty, HeuristicBot};
use card_battle::cards::{normalize_card, CardId, CardRegistry};
use card_battle::core::{ActionRequest, EngineConfig, Match, MatchBuilder, Participant, ParticipantId, Phase};
use card_battle::rules::{MatchEngine, RulesEngine};
use serde_json::json;

fn pid(s: &str) -> ParticipantId {
    ParticipantId::new(s)
}

/// The solo-play deck, in the loose authored form.
fn registry() -> CardRegistry {
    let docs = vec![
        json!({"id": "blade", "name": "Heaven Blade", "cardType": "weapon", "attribute": "光",
               "stats": {"attack": 12, "durability": 3},
               "dsl": [{"op": "damage", "amount": 12, "attribute": "光", "target": "enemy"}]}),
        json!({"id": "lance", "name": "Flame Lance", "cardType": "weapon", "attribute": "火",
               "stats": {"attack": 10},
               "dsl": [{"op": "damage", "amount": 10, "attribute": "火", "target": "enemy"}]}),
        json!({"id": "dagger", "name": "Ice Dagger", "cardType": "weapon", "attribute": "水",
               "stats": {"attack": 8},
               "dsl": [{"op": "damage", "amount": 8, "attribute": "水", "target": "enemy"}]}),
        json!({"id": "aegis", "name": "Heaven Shield", "cardType": "armor", "attribute": "無",
               "stats": {"defense": 8},
               "dsl": [{"op": "modify_stat", "target_stat": "hp", "amount": 5, "target": "caster"}]}),
        json!({"id": "mail", "name": "Holy Mail", "cardType": "armor", "attribute": "光",
               "stats": {"defense": 6},
               "dsl": [{"op": "heal", "amount": 3, "target_stat": "hp", "target": "caster"}]}),
        json!({"id": "potion", "name": "Life Potion", "cardType": "item", "attribute": "無",
               "dsl": [{"op": "heal", "amount": 15, "target_stat": "hp", "target": "caster"}]}),
        json!({"id": "crystal", "name": "Mana Crystal", "cardType": "item", "attribute": "無",
               "dsl": [{"op": "heal", "amount": 10, "target_stat": "mp"}]}),
    ];
    let mut registry = CardRegistry::new();
    for doc in docs {
        registry.register(normalize_card(doc).unwrap()).unwrap();
    }
    registry
}

fn table(seed: u64) -> Match {
    let mut registry = registry();
    let ids: Vec<CardId> = ["blade", "lance", "dagger", "aegis", "mail", "potion", "crystal"]
        .iter()
        .cycle()
        .take(28)
        .map(|id| CardId::new(*id))
        .collect();
    let pool = registry.build_deck(&ids).unwrap();
    MatchBuilder::new("solo", seed)
        .participant(Participant::new("bot1", 40, 20, 5).as_bot())
        .participant(Participant::new("bot2", 40, 20, 5).as_bot())
        .draw_pool(pool)
        .opening_hand(4)
        .build()
}

/// Who is expected to act next, if anyone.
fn next_actor(state: &Match) -> Option<ParticipantId> {
    match state.phase {
        Phase::Threat => state.threat.as_ref().map(|t| t.defender.clone()),
        Phase::Reaction | Phase::Resolve => None,
        Phase::Main | Phase::End => Some(state.current_actor.clone()),
    }
}

/// Play bot against bot for up to `steps` requests.
fn play_out(seed: u64, steps: usize) -> Match {
    let engine = MatchEngine::new(EngineConfig::default());
    let mut bots = [
        HeuristicBot::new(BotConfig::preset(Difficulty::Hard).with_seed(seed)),
        HeuristicBot::new(BotConfig::preset(Difficulty::Easy).with_seed(seed + 1)),
    ];
    let mut state = table(seed);
    let mut now = 0u64;

    for _ in 0..steps {
        if state.is_finished() {
            break;
        }
        now += 1_000;
        if let Some(t) = engine.advance_if_due(&state, now).unwrap() {
            state = t.state;
            continue;
        }
        let Some(actor) = next_actor(&state) else {
            now += 60_000;
            continue;
        };
        let seat = usize::from(actor.as_str() == "bot2");
        let Some(request) = bots[seat].propose(&state, &actor) else {
            continue;
        };
        state = match engine.apply(&state, &actor, &request, now) {
            Ok(t) => t.state,
            // A blunder may be rejected; the bot then just ends its turn.
            Err(_) => match engine.apply(&state, &actor, &ActionRequest::end_turn("solo"), now) {
                Ok(t) => t.state,
                Err(_) => state,
            },
        };
        assert!(state.resources_in_bounds());
    }
    state
}

/// Test that the authored deck survives normalization intact.
#[test]
fn test_authored_deck_loads() {
    let registry = registry();
    assert_eq!(registry.len(), 7);
    let potion = registry.get(&CardId::new("potion")).unwrap();
    assert!(potion.heals_hp());
    let blade = registry.get(&CardId::new("blade")).unwrap();
    assert!(blade.is_weapon());
    assert_eq!(blade.stats.attack, 12);
}

/// Test that every bot proposal at the opening is accepted by the engine.
#[test]
fn test_opening_proposal_is_legal() {
    let engine = MatchEngine::default();
    let state = table(3);
    let mut bot = HeuristicBot::new(BotConfig::default().with_error_rate(0.0));
    let request = bot.propose(&state, &pid("bot1")).unwrap();
    assert!(engine.apply(&state, &pid("bot1"), &request, 0).is_ok());
    assert!(bot.propose(&state, &pid("bot2")).is_none());
}

/// Test that bot games are reproducible from their seeds.
#[test]
fn test_bot_game_is_reproducible() {
    let a = play_out(17, 300);
    let b = play_out(17, 300);
    assert_eq!(a.logs, b.logs);
    assert_eq!(a.version, b.version);
    assert!(a.version > 0);
}
