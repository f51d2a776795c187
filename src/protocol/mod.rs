//! Protocol Engine (C5): session lifecycle, transaction tracking, inbound
//! dispatch, and Window Acknowledgement accounting, per §4.5.

pub(crate) mod commands;
pub(crate) mod control;
mod engine;
mod session;
mod state;
mod transaction;
mod writer_lane;

pub use engine::{EngineEvent, ProtocolEngine};
pub use session::Session;
pub use state::PublishState;
pub use transaction::TransactionKind;
pub use writer_lane::WriterLane;
