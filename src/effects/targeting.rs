//! Target resolution.
//!
//! - `TargetSpec`: the symbolic target token an op carries
//! - `TargetResolver`: maps a token to an ordered list of living participants
//! - `FindFilter`: predicates used by the `find` op
//!
//! ## Ordering
//!
//! Every multi-target result is in seating order. `enemy` is the first
//! living participant seated after the caster, wrapping around the table.
//! Defeated participants are never returned.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::expr::Comparator;
use super::scope::{bare_name, is_var_reference, Binding, Targets, VarLookup};
use crate::cards::Attribute;
use crate::core::{Match, MatchRng, Participant, ParticipantId, Stat};

/// Symbolic target of an op.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetSpec {
    /// The participant who played the card.
    Caster,
    /// The target chosen with the action, or the op's default if none.
    Target,
    /// First living opponent in seating order after the caster.
    Enemy,
    AllEnemies,
    AllPlayers,
    /// One living opponent chosen with the match RNG.
    RandomEnemy,
    /// A participant set bound by `find` or `forEach`.
    Variable(String),
    /// An explicit participant id.
    Id(ParticipantId),
}

impl TargetSpec {
    /// Wire token.
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            TargetSpec::Caster => "caster".into(),
            TargetSpec::Target => "target".into(),
            TargetSpec::Enemy => "enemy".into(),
            TargetSpec::AllEnemies => "all_enemies".into(),
            TargetSpec::AllPlayers => "all_players".into(),
            TargetSpec::RandomEnemy => "random_enemy".into(),
            TargetSpec::Variable(name) => format!("${name}"),
            TargetSpec::Id(id) => id.0.clone(),
        }
    }
}

impl From<String> for TargetSpec {
    fn from(token: String) -> Self {
        let key: String = token
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "caster" | "self" | "me" => TargetSpec::Caster,
            "target" => TargetSpec::Target,
            "enemy" | "opponent" => TargetSpec::Enemy,
            "allenemies" | "opponents" | "opponentplayers" => TargetSpec::AllEnemies,
            "allplayers" | "all" | "everyone" => TargetSpec::AllPlayers,
            "randomenemy" | "randomopponent" => TargetSpec::RandomEnemy,
            _ if is_var_reference(&token) => TargetSpec::Variable(bare_name(&token).to_string()),
            _ => TargetSpec::Id(ParticipantId::new(token.trim())),
        }
    }
}

impl From<&str> for TargetSpec {
    fn from(token: &str) -> Self {
        TargetSpec::from(token.to_string())
    }
}

impl From<TargetSpec> for String {
    fn from(spec: TargetSpec) -> Self {
        spec.token()
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

/// Why a target token named nothing at all.
///
/// A token naming only defeated participants is not unresolved; it simply
/// resolves to an empty list.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Unresolved {
    #[error("no participant with id {0}")]
    UnknownParticipant(String),
    #[error("variable {0} is not bound to participants")]
    UnboundVariable(String),
}

/// Resolves target tokens against a match.
pub struct TargetResolver<'a> {
    state: &'a Match,
    caster: &'a ParticipantId,
    chosen: Option<&'a ParticipantId>,
    vars: VarLookup<'a>,
}

impl<'a> TargetResolver<'a> {
    /// Create a resolver for one bound op.
    #[must_use]
    pub fn new(
        state: &'a Match,
        caster: &'a ParticipantId,
        chosen: Option<&'a ParticipantId>,
        vars: VarLookup<'a>,
    ) -> Self {
        Self {
            state,
            caster,
            chosen,
            vars,
        }
    }

    /// Resolve a token.
    ///
    /// `harmful` selects the fallback for `target` when no living target was
    /// chosen: the first enemy for harmful ops, the caster otherwise.
    pub fn resolve(
        &self,
        spec: &TargetSpec,
        harmful: bool,
        rng: &mut MatchRng,
    ) -> Result<Targets, Unresolved> {
        let living = |id: &ParticipantId| self.state.participant(id).is_some_and(Participant::is_alive);
        let targets = match spec {
            TargetSpec::Caster => std::iter::once(self.caster).filter(|id| living(*id)).cloned().collect(),
            TargetSpec::Target => match self.chosen.filter(|id| living(*id)) {
                Some(id) => std::iter::once(id.clone()).collect(),
                None => {
                    let fallback = if harmful { TargetSpec::Enemy } else { TargetSpec::Caster };
                    return self.resolve(&fallback, harmful, rng);
                }
            },
            TargetSpec::Enemy => self.state.next_living_after(self.caster).into_iter().collect(),
            TargetSpec::AllEnemies => self.enemies().collect(),
            TargetSpec::AllPlayers => self.state.living_ids().collect(),
            TargetSpec::RandomEnemy => {
                let enemies: Targets = self.enemies().collect();
                rng.gen_index(enemies.len())
                    .map(|i| enemies[i].clone())
                    .into_iter()
                    .collect()
            }
            TargetSpec::Variable(name) => match self.vars.get(name) {
                Some(Binding::Participants(ids)) => ids.iter().filter(|id| living(*id)).cloned().collect(),
                _ => return Err(Unresolved::UnboundVariable(name.clone())),
            },
            TargetSpec::Id(id) => match self.state.participant(id) {
                Some(p) if p.is_alive() => std::iter::once(id.clone()).collect(),
                Some(_) => Targets::new(),
                None => return Err(Unresolved::UnknownParticipant(id.0.clone())),
            },
        };
        Ok(targets)
    }

    fn enemies(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.state.living_ids().filter(move |id| id != self.caster)
    }

    /// Participants passing every filter, in seating order.
    #[must_use]
    pub fn find(&self, filters: &[FindFilter]) -> Targets {
        self.state
            .participants
            .iter()
            .filter(|p| p.is_alive())
            .filter(|p| filters.iter().all(|f| f.matches(p, self.caster)))
            .map(|p| p.id.clone())
            .collect()
    }
}

/// A `find` predicate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FindFilter {
    /// Not the caster.
    Enemy,
    /// The caster (matches are free-for-all, so allies are only oneself).
    Ally,
    StatCompare { stat: Stat, cmp: Comparator, value: i64 },
    ShieldCompare { cmp: Comparator, value: i64 },
    HasMarker(String),
    HasDisaster(String),
    HasAttribute(Attribute),
}

impl FindFilter {
    /// Test one participant.
    #[must_use]
    pub fn matches(&self, p: &Participant, caster: &ParticipantId) -> bool {
        match self {
            FindFilter::Enemy => &p.id != caster,
            FindFilter::Ally => &p.id == caster,
            FindFilter::StatCompare { stat, cmp, value } => cmp.holds(p.stat(*stat), *value),
            FindFilter::ShieldCompare { cmp, value } => cmp.holds(p.shield, *value),
            FindFilter::HasMarker(name) => p.has_marker(name),
            FindFilter::HasDisaster(name) => p.has_disaster(name),
            FindFilter::HasAttribute(attr) => p.attribute == *attr,
        }
    }

    /// Parse a list of filter strings, dropping unknown ones.
    ///
    /// `alive` is accepted and implied.
    #[must_use]
    pub fn parse_all(filters: &[String]) -> Vec<FindFilter> {
        filters
            .iter()
            .filter(|f| !f.trim().eq_ignore_ascii_case("alive"))
            .filter_map(|f| match f.parse() {
                Ok(filter) => Some(filter),
                Err(()) => {
                    tracing::warn!(filter = %f, "ignoring unknown find filter");
                    None
                }
            })
            .collect()
    }
}

impl FromStr for FindFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "enemy" | "enemies" | "opponent" | "not_self" | "notself" => return Ok(FindFilter::Enemy),
            "ally" | "self" => return Ok(FindFilter::Ally),
            _ => {}
        }
        if let Some((kind, arg)) = s.split_once(':') {
            let arg = arg.trim();
            return match kind.trim().to_ascii_lowercase().as_str() {
                "marker" => Ok(FindFilter::HasMarker(arg.to_string())),
                "disaster" => Ok(FindFilter::HasDisaster(arg.to_string())),
                "attribute" => arg.parse().map(FindFilter::HasAttribute),
                _ => Err(()),
            };
        }
        let (lhs, cmp, rhs) = Comparator::split(s).ok_or(())?;
        let value = rhs.trim().parse::<i64>().map_err(|_| ())?;
        let lhs = lhs.trim();
        if lhs.eq_ignore_ascii_case("shield") {
            return Ok(FindFilter::ShieldCompare { cmp, value });
        }
        Ok(FindFilter::StatCompare { stat: lhs.parse()?, cmp, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MatchBuilder;
    use crate::effects::scope::Bindings;
    use smallvec::smallvec;

    fn table() -> Match {
        let mut m = MatchBuilder::new("m", 3)
            .participant(Participant::new("a", 20, 0, 5))
            .participant(Participant::new("b", 20, 0, 5))
            .participant(Participant::new("c", 20, 0, 5))
            .participant(Participant::new("d", 20, 0, 5))
            .build();
        if let Some(c) = m.participant_mut(&ParticipantId::new("c")) {
            c.defeated = true;
            c.hp = 0;
        }
        if let Some(d) = m.participant_mut(&ParticipantId::new("d")) {
            d.hp = 5;
            d.add_marker("stun", 2);
        }
        m
    }

    fn ids(targets: &Targets) -> Vec<&str> {
        targets.iter().map(ParticipantId::as_str).collect()
    }

    #[test]
    fn test_token_parsing() {
        assert_eq!(TargetSpec::from("self"), TargetSpec::Caster);
        assert_eq!(TargetSpec::from("allEnemies"), TargetSpec::AllEnemies);
        assert_eq!(TargetSpec::from("opponentPlayers"), TargetSpec::AllEnemies);
        assert_eq!(TargetSpec::from("random_enemy"), TargetSpec::RandomEnemy);
        assert_eq!(TargetSpec::from("find.weak"), TargetSpec::Variable("weak".into()));
        assert_eq!(TargetSpec::from("uid-42"), TargetSpec::Id(ParticipantId::new("uid-42")));
    }

    #[test]
    fn test_enemy_is_next_living_seat() {
        let m = table();
        let vars = Bindings::new();
        let mut rng = MatchRng::new(1);

        let b = ParticipantId::new("b");
        let r = TargetResolver::new(&m, &b, None, VarLookup::new(&vars, &[]));
        // c is defeated, so b's enemy is d.
        assert_eq!(ids(&r.resolve(&TargetSpec::Enemy, true, &mut rng).unwrap()), vec!["d"]);

        let d = ParticipantId::new("d");
        let r = TargetResolver::new(&m, &d, None, VarLookup::new(&vars, &[]));
        assert_eq!(ids(&r.resolve(&TargetSpec::Enemy, true, &mut rng).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_group_tokens_skip_defeated() {
        let m = table();
        let vars = Bindings::new();
        let mut rng = MatchRng::new(1);
        let a = ParticipantId::new("a");
        let r = TargetResolver::new(&m, &a, None, VarLookup::new(&vars, &[]));

        assert_eq!(ids(&r.resolve(&TargetSpec::AllEnemies, true, &mut rng).unwrap()), vec!["b", "d"]);
        assert_eq!(ids(&r.resolve(&TargetSpec::AllPlayers, true, &mut rng).unwrap()), vec!["a", "b", "d"]);

        let random = r.resolve(&TargetSpec::RandomEnemy, true, &mut rng).unwrap();
        assert_eq!(random.len(), 1);
        assert!(random[0].as_str() == "b" || random[0].as_str() == "d");
    }

    #[test]
    fn test_explicit_ids() {
        let m = table();
        let vars = Bindings::new();
        let mut rng = MatchRng::new(1);
        let a = ParticipantId::new("a");
        let r = TargetResolver::new(&m, &a, None, VarLookup::new(&vars, &[]));

        assert_eq!(ids(&r.resolve(&TargetSpec::from("b"), true, &mut rng).unwrap()), vec!["b"]);
        assert!(r.resolve(&TargetSpec::from("c"), true, &mut rng).unwrap().is_empty());
        assert_eq!(
            r.resolve(&TargetSpec::from("zz"), true, &mut rng),
            Err(Unresolved::UnknownParticipant("zz".into()))
        );
    }

    #[test]
    fn test_target_falls_back_by_harm() {
        let m = table();
        let vars = Bindings::new();
        let mut rng = MatchRng::new(1);
        let a = ParticipantId::new("a");
        let dead = ParticipantId::new("c");

        let r = TargetResolver::new(&m, &a, Some(&dead), VarLookup::new(&vars, &[]));
        assert_eq!(ids(&r.resolve(&TargetSpec::Target, true, &mut rng).unwrap()), vec!["b"]);
        assert_eq!(ids(&r.resolve(&TargetSpec::Target, false, &mut rng).unwrap()), vec!["a"]);

        let d = ParticipantId::new("d");
        let r = TargetResolver::new(&m, &a, Some(&d), VarLookup::new(&vars, &[]));
        assert_eq!(ids(&r.resolve(&TargetSpec::Target, true, &mut rng).unwrap()), vec!["d"]);
    }

    #[test]
    fn test_variables() {
        let m = table();
        let mut vars = Bindings::new();
        vars.set("hit", Binding::Participants(smallvec![ParticipantId::new("c"), ParticipantId::new("d")]));
        vars.set("n", Binding::Number(3));
        let mut rng = MatchRng::new(1);
        let a = ParticipantId::new("a");
        let r = TargetResolver::new(&m, &a, None, VarLookup::new(&vars, &[]));

        assert_eq!(ids(&r.resolve(&TargetSpec::from("find.hit"), true, &mut rng).unwrap()), vec!["d"]);
        assert!(r.resolve(&TargetSpec::from("$n"), true, &mut rng).is_err());
        assert!(r.resolve(&TargetSpec::from("loop.none"), true, &mut rng).is_err());
    }

    #[test]
    fn test_find_filters() {
        let m = table();
        let vars = Bindings::new();
        let a = ParticipantId::new("a");
        let r = TargetResolver::new(&m, &a, None, VarLookup::new(&vars, &[]));

        let filters = FindFilter::parse_all(&["alive".into(), "enemy".into(), "hp<10".into()]);
        assert_eq!(filters.len(), 2);
        assert_eq!(ids(&r.find(&filters)), vec!["d"]);

        let filters = FindFilter::parse_all(&["marker:stun".into()]);
        assert_eq!(ids(&r.find(&filters)), vec!["d"]);

        let filters = FindFilter::parse_all(&["self".into(), "bogus!".into()]);
        assert_eq!(filters, vec![FindFilter::Ally]);
        assert_eq!(ids(&r.find(&filters)), vec!["a"]);

        assert_eq!(
            "attribute:fire".parse::<FindFilter>(),
            Ok(FindFilter::HasAttribute(Attribute::Fire))
        );
        assert_eq!(
            "hp >= 12".parse::<FindFilter>(),
            Ok(FindFilter::StatCompare { stat: Stat::Hp, cmp: Comparator::Ge, value: 12 })
        );
    }
}
