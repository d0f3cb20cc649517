//! Interactive chat session in the terminal.
//!
//! Wires the operator's terminal (readline or piped stdin) and the
//! WebSocket transport into a `wschat_core` session. Entry point:
//! `loop_runner::run_chat`.

pub mod banner;
pub mod input;
pub mod loop_runner;
pub mod output;
