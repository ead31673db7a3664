//! Shell-command hooks: continuation on loop end, plus the prompt, tool
//! and message lifecycle events. All of them share one process runner.

mod lifecycle;
mod runner;
mod shell;

pub use lifecycle::{HookEvent, ShellLifecycleHook};
pub use runner::DEFAULT_HOOK_TIMEOUT;
pub use shell::ShellContinuationHook;
