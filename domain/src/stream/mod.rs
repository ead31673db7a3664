//! Stream assembly: turning ordered protocol events into complete messages
//! and tool calls.

pub mod accumulator;
pub mod assembler;

pub use accumulator::{AssemblyError, ToolCallAccumulator, parse_arguments};
pub use assembler::{AssemblyOutput, FinalizedMessage, MessageAssembler};
