pub mod board;
pub mod config;
pub mod errors;
pub mod logging;

pub use board::{BoardController, BoardState, PendingMove, ProjectRecord, Stage};
pub use config::BoardConfig;
pub use errors::{BoardError, GatewayError, StoreError};
