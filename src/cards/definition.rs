//! Card definitions - static card data.
//!
//! A `Card` is immutable once authored: name, cost, attribute and an ordered
//! list of 1–10 ops. Decks reference cards by id; a card in a hand or pile
//! is wrapped in a `CardInstance`.
//!
//! The wire shape is camelCase JSON. Older documents used `dsl`,
//! `ownerUid`, `cooldownTurns` and `cardType`; those names are accepted on
//! input. Documents from untrusted authors should go through
//! [`normalize_card`](super::normalize_card) rather than straight serde.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::attributes::Attribute;
use crate::core::Stat;
use crate::effects::Op;

/// Most ops a card may carry.
pub const MAX_OPS_PER_CARD: usize = 10;

/// Most keywords a card may carry.
pub const MAX_KEYWORDS: usize = 4;

/// Unique identifier for a card definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl CardId {
    /// Create a new card ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Card({})", self.0)
    }
}

/// What a card is used for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[default]
    Skill,
    Spell,
    Attachment,
    /// Playable only inside a reaction window.
    Reaction,
    /// Attackable card for the combat sub-cycle.
    Weapon,
    /// Blocks an incoming threat.
    Armor,
    Item,
    Miracle,
}

impl CardType {
    /// Whether the card is played through `playCard`.
    #[must_use]
    pub const fn is_playable_in_main(self) -> bool {
        !matches!(self, CardType::Reaction | CardType::Weapon | CardType::Armor)
    }
}

/// Card rarity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Normal,
    Rare,
    Epic,
    #[serde(alias = "legendary")]
    Legend,
}

/// Review status assigned by the authoring pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Pending,
    #[default]
    Approved,
    Blocked,
}

/// Combat numbers for weapon and armor cards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
    #[serde(default)]
    pub attack: i64,
    #[serde(default)]
    pub defense: i64,
}

/// Static card definition.
///
/// ## Example
///
/// ```
/// use card_battle::cards::{Card, CardType};
/// use card_battle::effects::{Op, TargetSpec, Value};
///
/// let bolt = Card::new("bolt", "Bolt", CardType::Spell)
///     .with_cost(2)
///     .with_op(Op::Damage { amount: Value::Literal(10), target: TargetSpec::Enemy, attribute: None });
///
/// assert_eq!(bolt.cost, 2);
/// assert!(bolt.is_harmful());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,

    #[serde(default, alias = "ownerUid")]
    pub owner_id: String,

    pub name: String,

    #[serde(rename = "type", alias = "cardType", default)]
    pub card_type: CardType,

    #[serde(default)]
    pub rarity: Rarity,

    #[serde(default)]
    pub attribute: Attribute,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub cost: i64,

    #[serde(default, alias = "cooldownTurns")]
    pub cooldown: i64,

    /// The effect script, resolved in order.
    #[serde(alias = "dsl")]
    pub ops: Vec<Op>,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub status: CardStatus,

    #[serde(default)]
    pub stats: CardStats,
}

impl Card {
    /// Create a new card with no ops.
    pub fn new(id: impl Into<String>, name: impl Into<String>, card_type: CardType) -> Self {
        Self {
            id: CardId::new(id),
            owner_id: String::new(),
            name: name.into(),
            card_type,
            rarity: Rarity::default(),
            attribute: Attribute::default(),
            keywords: Vec::new(),
            cost: 0,
            cooldown: 0,
            ops: Vec::new(),
            text: String::new(),
            status: CardStatus::default(),
            stats: CardStats::default(),
        }
    }

    /// Set the ki cost (builder pattern).
    #[must_use]
    pub fn with_cost(mut self, cost: i64) -> Self {
        self.cost = cost;
        self
    }

    /// Set the attribute (builder pattern).
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = attribute;
        self
    }

    /// Append an op (builder pattern).
    #[must_use]
    pub fn with_op(mut self, op: Op) -> Self {
        self.ops.push(op);
        self
    }

    /// Set combat stats (builder pattern).
    #[must_use]
    pub fn with_stats(mut self, attack: i64, defense: i64) -> Self {
        self.stats = CardStats { attack, defense };
        self
    }

    /// Set the description (builder pattern).
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the owner (builder pattern).
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_id = owner.into();
        self
    }

    /// Weapon cards drive the attack sub-cycle.
    #[must_use]
    pub fn is_weapon(&self) -> bool {
        self.card_type == CardType::Weapon
    }

    /// Armor cards answer a threat.
    #[must_use]
    pub fn is_armor(&self) -> bool {
        self.card_type == CardType::Armor
    }

    /// Whether any top-level op hurts its target.
    #[must_use]
    pub fn is_harmful(&self) -> bool {
        self.ops.iter().any(Op::is_harmful)
    }

    /// Whether any top-level op restores hp.
    #[must_use]
    pub fn heals_hp(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, Op::Heal { stat: Stat::Hp, .. }))
    }
}
