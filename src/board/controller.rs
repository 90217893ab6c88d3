//! The board controller: single owner of the live board.
//!
//! Callers talk to it through commands (`load`, `refresh`, `move_card`) and
//! read snapshots back. The board sits behind a synchronous mutex that is
//! never held across an `.await`; the only suspension point of a move is the
//! remote gateway call.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use super::feedback::{FeedbackStatus, FeedbackTracker};
use super::gateway::{PersistenceGateway, RestGateway, UnconfiguredGateway, rows_for_stages};
use super::models::{
    BoardState, ColumnView, MovePhase, PendingMove, PlacementRecord, ProjectCard, ProjectRecord,
    is_valid_transition,
};
use super::reconcile::reconcile;
use super::source::ProjectSource;
use super::store::{FilePlacementStore, PlacementStore};
use super::transition::{MoveOutcome, apply_move};
use crate::config::BoardConfig;
use crate::errors::BoardError;

/// Banner text shown after a move had to be reverted.
pub const ROLLBACK_MESSAGE: &str =
    "Não foi possível atualizar o status. As alterações foram revertidas.";

/// How moves that overlap in time are handled.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveOrdering {
    /// One move at a time per board. A move's checkpoint is taken only after
    /// the previous move has committed or rolled back.
    #[default]
    Serialized,
    /// Moves never wait for each other. A rollback restores its own
    /// checkpoint and therefore also discards any move applied after it.
    Overlapping,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub ordering: MoveOrdering,
    pub success_ttl: Duration,
    pub error_ttl: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            ordering: MoveOrdering::default(),
            success_ttl: super::feedback::DEFAULT_SUCCESS_TTL,
            error_ttl: super::feedback::DEFAULT_ERROR_TTL,
        }
    }
}

/// Why a move did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoOp,
    NotFound,
}

/// What happened to one move.
#[derive(Debug)]
pub enum MoveResult {
    Skipped(SkipReason),
    Committed {
        move_id: Uuid,
        state: BoardState,
    },
    RolledBack {
        move_id: Uuid,
        state: BoardState,
        error: BoardError,
    },
}

impl MoveResult {
    pub fn phase(&self) -> MovePhase {
        match self {
            Self::Skipped(_) => MovePhase::Idle,
            Self::Committed { .. } => MovePhase::Committed,
            Self::RolledBack { .. } => MovePhase::RolledBack,
        }
    }

    /// Board as it stood when the move finished, if the move ran at all.
    pub fn state(&self) -> Option<&BoardState> {
        match self {
            Self::Skipped(_) => None,
            Self::Committed { state, .. } | Self::RolledBack { state, .. } => Some(state),
        }
    }
}

/// Per-card marks for the board view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CardFeedback {
    pub updating: bool,
    pub status: Option<FeedbackStatus>,
}

struct BoardInner {
    state: BoardState,
    /// Board with only settled moves applied. This is what gets saved
    /// locally; `state` may also hold moves still waiting on the gateway.
    durable: BoardState,
    selected: Option<ProjectCard>,
    feedback: FeedbackTracker,
    error_banner: Option<String>,
    loaded: bool,
}

/// Cheap to clone; clones share the same board.
#[derive(Clone)]
pub struct BoardController {
    inner: Arc<Mutex<BoardInner>>,
    store: Arc<dyn PlacementStore>,
    gateway: Arc<dyn PersistenceGateway>,
    move_gate: Arc<tokio::sync::Mutex<()>>,
    ordering: MoveOrdering,
}

impl BoardController {
    pub fn new(
        store: Arc<dyn PlacementStore>,
        gateway: Arc<dyn PersistenceGateway>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoardInner {
                state: BoardState::empty(),
                durable: BoardState::empty(),
                selected: None,
                feedback: FeedbackTracker::new(options.success_ttl, options.error_ttl),
                error_banner: None,
                loaded: false,
            })),
            store,
            gateway,
            move_gate: Arc::new(tokio::sync::Mutex::new(())),
            ordering: options.ordering,
        }
    }

    /// Wire a controller from configuration: file-backed placement store and
    /// a REST gateway when credentials are present, a no-op one otherwise.
    pub fn from_config(config: &BoardConfig) -> Result<Self, BoardError> {
        let store = Arc::new(FilePlacementStore::new(config.storage_dir()));
        let gateway: Arc<dyn PersistenceGateway> = match config.remote_settings() {
            Some(remote) => Arc::new(
                RestGateway::new(&remote.url, &remote.api_key, &remote.table, remote.timeout)
                    .map_err(|e| anyhow::Error::new(e).context("Failed to build remote gateway"))?,
            ),
            None => {
                warn!("remote store credentials are not configured; moves will not be persisted remotely");
                Arc::new(UnconfiguredGateway)
            }
        };
        Ok(Self::new(store, gateway, config.controller_options()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, BoardInner>, BoardError> {
        self.inner.lock().map_err(|_| BoardError::LockPoisoned)
    }

    async fn gate(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.ordering {
            MoveOrdering::Serialized => Some(self.move_gate.lock().await),
            MoveOrdering::Overlapping => None,
        }
    }

    /// Rebuild the board from freshly fetched project rows.
    ///
    /// An empty list leaves the current board alone. The reconciled placement
    /// is written back, which also forgets projects that no longer exist.
    pub async fn load(&self, records: &[ProjectRecord]) -> Result<BoardState, BoardError> {
        let _gate = self.gate().await;
        if records.is_empty() {
            debug!("project source returned no rows; keeping current board");
            return self.snapshot();
        }

        let cards = ProjectCard::from_records(records);
        let placement = self.load_placement().await;
        let state = reconcile(&cards, placement.as_ref());
        {
            let mut inner = self.lock()?;
            inner.state = state.clone();
            inner.durable = state.clone();
            inner.selected = None;
            inner.loaded = true;
        }
        info!(
            cards = state.len(),
            restored = placement.is_some(),
            "production board loaded"
        );

        self.save_placement(state.placement()).await;
        Ok(state)
    }

    /// Fetch rows from `source` and reload. On fetch failure the board is
    /// left as it was.
    pub async fn refresh(&self, source: &dyn ProjectSource) -> Result<BoardState, BoardError> {
        let records = source.fetch().await.map_err(BoardError::Source)?;
        self.load(&records).await
    }

    /// Refresh every `every` until the handle is aborted. The first refresh
    /// runs immediately.
    pub fn spawn_refresh_loop(
        &self,
        source: Arc<dyn ProjectSource>,
        every: Duration,
    ) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = controller.refresh(source.as_ref()).await {
                    error!(error = %e, "failed to refresh production board");
                }
            }
        })
    }

    /// Apply a drag optimistically, persist it remotely, and commit or roll
    /// back.
    pub async fn move_card(&self, mv: PendingMove) -> Result<MoveResult, BoardError> {
        let span = info_span!(
            "move_card",
            move_id = %mv.move_id,
            card_id = %mv.card_id,
            from = %mv.from,
            to = %mv.to,
            to_index = mv.to_index,
        );
        self.run_move(mv).instrument(span).await
    }

    async fn run_move(&self, mv: PendingMove) -> Result<MoveResult, BoardError> {
        let _gate = self.gate().await;
        let mut phase = MovePhase::Idle;

        let (checkpoint, rows) = {
            let mut inner = self.lock()?;
            let (next, affected) = match apply_move(&inner.state, &mv) {
                MoveOutcome::Applied { next, affected } => (next, affected),
                MoveOutcome::NoOp => {
                    return Ok(MoveResult::Skipped(SkipReason::NoOp));
                }
                MoveOutcome::NotFound => {
                    return Ok(MoveResult::Skipped(SkipReason::NotFound));
                }
            };

            let checkpoint = std::mem::replace(&mut inner.state, next);
            follow_selection(&mut inner, &mv.card_id);
            inner.feedback.begin(&mv.card_id);
            inner.error_banner = None;
            let rows = rows_for_stages(&inner.state, &affected, Utc::now());
            (checkpoint, rows)
        };
        advance(&mut phase, MovePhase::OptimisticallyApplied);

        match self.gateway.upsert(&rows).await {
            Ok(()) => {
                let (state, placement) = {
                    let mut inner = self.lock()?;
                    inner.feedback.finish(&mv.card_id, FeedbackStatus::Success);
                    // Overlapping moves may still be pending in `state`; only
                    // this move's effect becomes durable.
                    if let MoveOutcome::Applied { next, .. } = apply_move(&inner.durable, &mv) {
                        inner.durable = next;
                    }
                    (inner.state.clone(), inner.durable.placement())
                };
                advance(&mut phase, MovePhase::Committed);
                info!(rows = rows.len(), "move committed");

                self.save_placement(placement).await;
                Ok(MoveResult::Committed {
                    move_id: mv.move_id,
                    state,
                })
            }
            Err(source) => {
                warn!(error = %source, "remote store rejected move; rolling back");
                let state = {
                    let mut inner = self.lock()?;
                    inner.state = checkpoint;
                    follow_selection(&mut inner, &mv.card_id);
                    inner.feedback.finish(&mv.card_id, FeedbackStatus::Error);
                    inner.error_banner = Some(ROLLBACK_MESSAGE.to_string());
                    inner.state.clone()
                };
                advance(&mut phase, MovePhase::RolledBack);

                Ok(MoveResult::RolledBack {
                    move_id: mv.move_id,
                    state,
                    error: BoardError::Persistence {
                        card_id: mv.card_id,
                        source,
                    },
                })
            }
        }
    }

    async fn load_placement(&self) -> Option<PlacementRecord> {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.load()).await {
            Ok(Ok(placement)) => placement,
            Ok(Err(e)) => {
                warn!(error = %e, "ignoring saved board placement");
                None
            }
            Err(e) => {
                warn!(error = %e, "placement load task panicked");
                None
            }
        }
    }

    async fn save_placement(&self, placement: PlacementRecord) {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.save(&placement)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to save board placement"),
            Err(e) => warn!(error = %e, "placement save task panicked"),
        }
    }

    pub fn snapshot(&self) -> Result<BoardState, BoardError> {
        Ok(self.lock()?.state.clone())
    }

    pub fn column_views(&self) -> Result<Vec<ColumnView>, BoardError> {
        Ok(self.lock()?.state.column_views())
    }

    /// True once a non-empty project list has been loaded.
    pub fn is_loaded(&self) -> Result<bool, BoardError> {
        Ok(self.lock()?.loaded)
    }

    /// Open the detail view for a card. Unknown ids close it.
    pub fn select(&self, card_id: &str) -> Result<Option<ProjectCard>, BoardError> {
        let mut inner = self.lock()?;
        inner.selected = inner.state.card(card_id).cloned();
        Ok(inner.selected.clone())
    }

    pub fn selected(&self) -> Result<Option<ProjectCard>, BoardError> {
        Ok(self.lock()?.selected.clone())
    }

    pub fn clear_selection(&self) -> Result<(), BoardError> {
        self.lock()?.selected = None;
        Ok(())
    }

    pub fn feedback(&self, card_id: &str) -> Result<CardFeedback, BoardError> {
        let mut inner = self.lock()?;
        inner.feedback.prune();
        Ok(CardFeedback {
            updating: inner.feedback.is_updating(card_id),
            status: inner.feedback.status(card_id),
        })
    }

    /// Message of the last rolled back move, until the next move starts.
    pub fn error_banner(&self) -> Result<Option<String>, BoardError> {
        Ok(self.lock()?.error_banner.clone())
    }

    pub fn dismiss_error(&self) -> Result<(), BoardError> {
        self.lock()?.error_banner = None;
        Ok(())
    }

    pub fn gateway_configured(&self) -> bool {
        self.gateway.is_configured()
    }
}

/// Keep an open detail view of `card_id` in step with the board.
fn follow_selection(inner: &mut BoardInner, card_id: &str) {
    if inner.selected.as_ref().is_some_and(|c| c.id == card_id) {
        inner.selected = inner.state.card(card_id).cloned();
    }
}

fn advance(phase: &mut MovePhase, next: MovePhase) {
    debug_assert!(
        is_valid_transition(phase, &next),
        "invalid move transition {} -> {}",
        phase,
        next
    );
    debug!(from = %phase, to = %next, "move phase");
    *phase = next;
}
