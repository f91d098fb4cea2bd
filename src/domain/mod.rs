pub mod card;
pub mod deck;
pub mod note;
pub mod review;

pub use card::{Card, CardId, QueueState, SchedulingState};
pub use deck::{Deck, DeckId, DeckTree};
pub use note::{CardTemplate, CardType, CardTypeId, Note, NoteId};
pub use review::{Grade, ReviewLog};
