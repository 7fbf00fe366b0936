//! Line-oriented text command protocol for the radio link.
//!
//! Inbound frames run a fixed pipeline: clean, split, look up, check arity,
//! dispatch. Outbound replies are plain text, chunked to the negotiated
//! transport payload when they exceed it. The dispatcher talks to the rest
//! of the system exclusively through injected collaborator traits so the
//! same engine drives the firmware and the emulator.

pub mod chunker;
pub mod command;
pub mod engine;
pub mod parser;

pub use chunker::{Chunks, chunk_limit};
pub use command::CommandId;
pub use engine::{
    CommandEngine, Dispatch, EngineAction, HidInjector, MAX_REPLY_LEN, PowerControl, Reply,
    SystemInfo, SystemOps,
};
pub use parser::{CommandFrame, MAX_LINE_LEN, ParseError};
