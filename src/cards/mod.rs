//! Card system: definitions, instances, normalization and registry.
//!
//! ## Key Types
//!
//! - `Card`: Static card data with its effect script
//! - `CardInstance`: One copy of a card in a hand, the draw pool or a discard pile
//! - `CardRegistry`: Card definition lookup and deck building
//! - `Attribute`: Elemental attribute driving the combat matchup table
//!
//! Authored card documents go through [`normalize_card`] before they reach
//! the registry.

pub mod attributes;
pub mod definition;
pub mod instance;
pub mod normalize;
pub mod registry;

pub use attributes::{classify, Attribute, Matchup};
pub use definition::{Card, CardId, CardStats, CardStatus, CardType, Rarity, MAX_KEYWORDS, MAX_OPS_PER_CARD};
pub use instance::CardInstance;
pub use normalize::{normalize_card, normalize_ops, CardError};
pub use registry::CardRegistry;
