//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! service's workflows.
//!
//! Use cases:
//! - `Aggregator`: per-tick sample flattening and atomic publication
//! - `Poller`: scheduled concurrent polling of both chain collectors
//! - `SwapBoardService`: on-demand cross-chain swap reconciliation
//! - `TickSchedule`: cron expression handling for the poller

pub mod aggregator;
pub mod poller;
pub mod schedule;
pub mod swap_board;

pub use aggregator::{Aggregator, MetricsHolder, MetricsSnapshot};
pub use poller::{Poller, TickError};
pub use schedule::TickSchedule;
pub use swap_board::{SwapBoard, SwapBoardService};
