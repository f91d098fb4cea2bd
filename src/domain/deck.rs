//! Deck hierarchy.
//!
//! Decks form an arena keyed by id, each with an optional parent id. The
//! storage layer cannot stop the parent pointers from forming a loop, so every
//! walk over the tree carries a visited set and reports
//! [`Error::CycleDetected`] instead of looping.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{Error, Result};

pub type DeckId = i64;

/// Separator used when displaying a deck's ancestry
pub const DECK_PATH_SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
  pub id: DeckId,
  pub name: String,
  pub parent_deck_id: Option<DeckId>,
}

impl Deck {
  pub fn new(id: DeckId, name: impl Into<String>, parent_deck_id: Option<DeckId>) -> Self {
    Self {
      id,
      name: name.into(),
      parent_deck_id,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct DeckTree {
  decks: BTreeMap<DeckId, Deck>,
  children: BTreeMap<DeckId, Vec<DeckId>>,
}

impl DeckTree {
  pub fn new(decks: impl IntoIterator<Item = Deck>) -> Self {
    let decks: BTreeMap<DeckId, Deck> = decks.into_iter().map(|d| (d.id, d)).collect();
    let mut children: BTreeMap<DeckId, Vec<DeckId>> = BTreeMap::new();
    for deck in decks.values() {
      if let Some(parent) = deck.parent_deck_id {
        children.entry(parent).or_default().push(deck.id);
      }
    }
    // Siblings in display order
    for ids in children.values_mut() {
      ids.sort_by(|a, b| decks[a].name.cmp(&decks[b].name).then(a.cmp(b)));
    }
    Self { decks, children }
  }

  pub fn get(&self, id: DeckId) -> Option<&Deck> {
    self.decks.get(&id)
  }

  pub fn len(&self) -> usize {
    self.decks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.decks.is_empty()
  }

  /// Direct children, ordered by name
  pub fn children(&self, id: DeckId) -> &[DeckId] {
    self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Decks without a parent, or whose parent is missing from the arena
  pub fn roots(&self) -> Vec<DeckId> {
    let mut roots: Vec<&Deck> = self
      .decks
      .values()
      .filter(|d| d.parent_deck_id.is_none_or(|p| !self.decks.contains_key(&p)))
      .collect();
    roots.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    roots.into_iter().map(|d| d.id).collect()
  }

  /// The deck itself plus all transitive descendants
  pub fn resolve_scope(&self, deck_id: DeckId) -> Result<BTreeSet<DeckId>> {
    if !self.decks.contains_key(&deck_id) {
      return Err(Error::UnknownDeck(deck_id));
    }

    let mut scope = BTreeSet::new();
    let mut stack = vec![deck_id];
    while let Some(id) = stack.pop() {
      if !scope.insert(id) {
        tracing::warn!("Deck {} revisited while resolving scope of {}", id, deck_id);
        return Err(Error::CycleDetected { deck_id: id });
      }
      stack.extend(self.children(id).iter().copied());
    }
    Ok(scope)
  }

  /// Ancestors from the root down to the deck itself
  pub fn path(&self, deck_id: DeckId) -> Result<Vec<&Deck>> {
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(deck_id);
    while let Some(id) = current {
      let Some(deck) = self.decks.get(&id) else {
        if id == deck_id {
          return Err(Error::UnknownDeck(id));
        }
        // Dangling parent pointer: treat the last known deck as a root
        break;
      };
      if !seen.insert(id) {
        return Err(Error::CycleDetected { deck_id: id });
      }
      path.push(deck);
      current = deck.parent_deck_id;
    }
    path.reverse();
    Ok(path)
  }

  /// Display name including ancestors, e.g. `Grammar::1 - Basic`
  pub fn full_name(&self, deck_id: DeckId) -> Result<String> {
    let names: Vec<&str> = self.path(deck_id)?.iter().map(|d| d.name.as_str()).collect();
    Ok(names.join(DECK_PATH_SEPARATOR))
  }

  /// Depth-first listing of the tree as `(deck, depth)`, children by name.
  ///
  /// Decks caught in a cycle are unreachable from any root and are skipped.
  pub fn walk(&self) -> Vec<(&Deck, usize)> {
    let mut out = Vec::with_capacity(self.decks.len());
    let mut seen = HashSet::new();
    let mut stack: Vec<(DeckId, usize)> = self.roots().into_iter().rev().map(|id| (id, 0)).collect();
    while let Some((id, depth)) = stack.pop() {
      if !seen.insert(id) {
        continue;
      }
      out.push((&self.decks[&id], depth));
      for child in self.children(id).iter().rev() {
        stack.push((*child, depth + 1));
      }
    }
    out
  }
}
