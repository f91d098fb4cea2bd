use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CardTypeId = i64;
pub type NoteId = i64;

/// Front/back template for one card ordinal. Rendering happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardTemplate {
  pub front: String,
  pub back: String,
}

impl CardTemplate {
  pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
    Self {
      front: front.into(),
      back: back.into(),
    }
  }
}

/// Field layout shared by all notes of a type. One card is generated per
/// template, with the template's index as its `card_ord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardType {
  pub id: CardTypeId,
  pub fields: Vec<String>,
  pub tags: Vec<String>,
  pub templates: Vec<CardTemplate>,
  pub modified_at: DateTime<Utc>,
}

impl CardType {
  pub fn new(fields: Vec<String>, tags: Vec<String>, templates: Vec<CardTemplate>) -> Self {
    Self {
      id: 0,
      fields,
      tags,
      templates,
      modified_at: Utc::now(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
  pub id: NoteId,
  pub card_type_id: CardTypeId,
  pub field_values: Vec<String>,
}
