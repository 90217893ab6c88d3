//! Production board: kanban reconciliation and persistence.
//!
//! ## Overview
//!
//! Projects come from an external source (a spreadsheet export) on every
//! load. The board lays them out over ten fixed production stages, keeps
//! the column placement users chose across restarts, and persists every drag
//! to a remote store, rolling it back when the store refuses it.
//!
//! ## Module Map
//!
//! ```text
//! ┌────────────┐ fetch ┌──────────────────────────────────────────────────┐
//! │  Project   │ ────> │  controller.rs  (BoardController)                │
//! │  source    │       │    │ load(): reconcile.rs  (pure merge)          │
//! └────────────┘       │    │           └─ store.rs  (PlacementStore)     │
//!                      │    │                                             │
//! ┌────────────┐ move  │    │ move_card():                                │
//! │  UI caller │ ────> │    │   transition.rs  (apply_move, pure)         │
//! └────────────┘       │    │   gateway.rs     (PersistenceGateway)       │
//!                      │    │   feedback.rs    (per-card marks)           │
//!                      └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module     | Responsibility                                           |
//! |------------|----------------------------------------------------------|
//! | `models`   | `Stage`, `ProjectCard`, `BoardState`, `PlacementRecord`  |
//! | `source`   | `ProjectSource` trait + static in-memory source          |
//! | `store`    | File and in-memory placement stores                      |
//! | `gateway`  | PostgREST upsert gateway + unconfigured no-op gateway    |
//!
//! ## Move Flow
//!
//! 1. `move_card()` waits for the board's move gate (serialized ordering).
//! 2. `apply_move()` computes the next board; the previous one is kept as
//!    the checkpoint and the card is flagged as updating.
//! 3. Rows for the affected stages go to `PersistenceGateway::upsert()`.
//! 4. Success: success mark, placement saved locally. Failure: checkpoint
//!    restored, error mark and banner, nothing saved locally.

pub mod controller;
pub mod feedback;
pub mod gateway;
pub mod models;
pub mod reconcile;
pub mod source;
pub mod store;
pub mod transition;

pub use controller::{BoardController, ControllerOptions, MoveOrdering, MoveResult, SkipReason};
pub use models::{BoardState, PendingMove, PlacementRecord, ProjectCard, ProjectRecord, Stage};
