//! Execution Engine
//!
//! This crate runs macroboard boards: it dispatches each action to a handler
//! bound to its kind, threads one shared variable space through the run, and
//! drives the pointer, keyboard, screen and record store through ports.
//!
//! # Key Types
//!
//! - [`ExecutionEngine`] - Runs a board's enabled actions in order
//! - [`HandlerRegistry`] - Maps action kinds to handlers
//! - [`ActionHandler`] - The contract every handler implements
//! - [`ExecutionContext`] - Shared per-run state
//! - [`Ports`] - The capability ports handed to handlers

pub mod context;
pub mod engine;
pub mod handlers;
pub mod memory_store;
pub mod ports;
pub mod registry;
pub mod testing;

pub use context::ExecutionContext;
pub use engine::{EngineError, EngineResult, EngineState, ExecutionEngine};
pub use handlers::{ActionHandler, HandlerError, HandlerResult};
pub use memory_store::InMemoryRecordStore;
pub use ports::{
    KeyPort, PointerPort, PortError, PortResult, Ports, Record, RecordStore, RecordTable,
    ScreenPort,
};
pub use registry::HandlerRegistry;
