//! Card registry for definition lookup.
//!
//! The `CardRegistry` stores the approved card definitions a match may be
//! built from. Decks are submitted as lists of card ids; the registry turns
//! them into `CardInstance`s with match-unique instance ids.

use rustc_hash::FxHashMap;

use super::definition::{Card, CardId, CardStatus, CardType};
use super::instance::CardInstance;
use super::normalize::CardError;

/// Registry of card definitions.
///
/// ## Example
///
/// ```
/// use card_battle::cards::{Card, CardId, CardRegistry, CardType};
///
/// let mut registry = CardRegistry::new();
/// registry.register(Card::new("bolt", "Bolt", CardType::Spell)).unwrap();
///
/// let found = registry.get(&CardId::new("bolt")).unwrap();
/// assert_eq!(found.name, "Bolt");
/// ```
#[derive(Clone, Debug, Default)]
pub struct CardRegistry {
    cards: FxHashMap<CardId, Card>,
    minted: u64,
}

impl CardRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card definition.
    ///
    /// Fails if a card with the same id already exists.
    pub fn register(&mut self, card: Card) -> Result<(), CardError> {
        if self.cards.contains_key(&card.id) {
            return Err(CardError::Duplicate(card.id.0.clone()));
        }
        self.cards.insert(card.id.clone(), card);
        Ok(())
    }

    /// Get a card definition by id.
    #[must_use]
    pub fn get(&self, id: &CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    /// Check if a card id is registered.
    #[must_use]
    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.contains_key(id)
    }

    /// Number of registered cards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Iterate over all card definitions.
    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.values()
    }

    /// Find cards by type.
    pub fn find_by_type(&self, card_type: CardType) -> impl Iterator<Item = &Card> {
        self.cards.values().filter(move |c| c.card_type == card_type)
    }

    /// Mint a fresh instance of a registered card.
    ///
    /// Blocked cards cannot enter a match.
    pub fn instantiate(&mut self, id: &CardId) -> Result<CardInstance, CardError> {
        let card = self
            .cards
            .get(id)
            .ok_or_else(|| CardError::Unknown(id.0.clone()))?;
        if card.status == CardStatus::Blocked {
            return Err(CardError::Blocked(id.0.clone()));
        }
        self.minted += 1;
        Ok(CardInstance::new(format!("{}#{}", id.0, self.minted), card.clone()))
    }

    /// Mint instances for a whole deck list, preserving order.
    pub fn build_deck(&mut self, ids: &[CardId]) -> Result<Vec<CardInstance>, CardError> {
        ids.iter().map(|id| self.instantiate(id)).collect()
    }
}
