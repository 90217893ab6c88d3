//! Merge of source project data with the locally persisted placement.
//!
//! The project source is the only authority for card content. The placement
//! record only decides which column a card sits in and where.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::models::{BoardState, PlacementRecord, ProjectCard, Stage};

/// Build the board from `cards` (source order) and an optional placement.
///
/// Cards named by the placement go first, in recorded stage and order.
/// Every other card is appended to its natural stage in source order. Ids
/// the placement knows but the source no longer has are dropped. When the
/// source repeats an id, the first row carrying it wins.
pub fn reconcile(cards: &[ProjectCard], placement: Option<&PlacementRecord>) -> BoardState {
    let mut board = BoardState::empty();
    let mut by_id: HashMap<&str, &ProjectCard> = HashMap::with_capacity(cards.len());
    for (index, card) in cards.iter().enumerate() {
        if by_id.contains_key(card.id.as_str()) {
            warn!(card_id = %card.id, row = index, "dropping project row with duplicate id");
            continue;
        }
        by_id.insert(card.id.as_str(), card);
    }
    let mut assigned: HashSet<&str> = HashSet::with_capacity(cards.len());

    if let Some(placement) = placement {
        let mut dropped = 0usize;
        for stage in Stage::ALL {
            for id in placement.ids(stage) {
                let Some(&card) = by_id.get(id.as_str()) else {
                    dropped += 1;
                    continue;
                };
                if !assigned.insert(card.id.as_str()) {
                    continue;
                }
                board.column_mut(stage).push(ProjectCard {
                    stage,
                    ..card.clone()
                });
            }
        }
        if dropped > 0 {
            debug!(dropped, "placement references projects missing from the source");
        }
    }

    for card in cards {
        if assigned.insert(card.id.as_str()) {
            board.column_mut(card.stage).push(card.clone());
        }
    }

    board
}
