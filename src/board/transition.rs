use tracing::debug;

use super::models::{BoardState, PendingMove, Stage};

/// Result of applying a move to a board snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// The card was relocated. `affected` lists the touched stages, source
    /// first, without duplicates.
    Applied { next: BoardState, affected: Vec<Stage> },
    /// Dropped where it already was.
    NoOp,
    /// The card is not on the board.
    NotFound,
}

/// Relocate one card. Never touches `state`.
///
/// The card's current position on the board wins over `mv.from`, so a move
/// built from a stale view still lands where it was dropped. The target
/// index is clamped to the destination column's length.
pub fn apply_move(state: &BoardState, mv: &PendingMove) -> MoveOutcome {
    let Some((from, from_index)) = state.locate(&mv.card_id) else {
        debug!(card_id = %mv.card_id, "move references a card that is not on the board");
        return MoveOutcome::NotFound;
    };
    if from != mv.from {
        debug!(
            card_id = %mv.card_id,
            claimed = %mv.from,
            actual = %from,
            "move source is stale; using the card's current stage"
        );
    }

    let dest_len_after_removal = if from == mv.to {
        state.column(mv.to).len() - 1
    } else {
        state.column(mv.to).len()
    };
    let to_index = mv.to_index.min(dest_len_after_removal);
    if from == mv.to && to_index == from_index {
        return MoveOutcome::NoOp;
    }

    let mut next = state.clone();
    let mut card = next.column_mut(from).remove(from_index);
    card.stage = mv.to;
    next.column_mut(mv.to).insert(to_index, card);

    let affected = if from == mv.to { vec![from] } else { vec![from, mv.to] };
    MoveOutcome::Applied { next, affected }
}
