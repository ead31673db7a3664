//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for tether
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about = "Drive a remote coding agent with local read-only tools")]
#[command(long_about = r#"
tether connects to a remote agent backend, submits prompts, and answers the
agent's tool permission requests by running local read-only tools
(Glob, Grep, Read).

Without a PROMPT, prompts are read from stdin one line at a time, each
starting a new turn. Ctrl-C cancels the running turn.

Configuration files are loaded from (in priority order):
1. TETHER_* environment variables (TETHER_RECONNECT__MAX_ATTEMPTS=3)
2. --config <path>     Explicit config file
3. ./tether.toml       Project-level config
4. ~/.config/tether/config.toml   Global config

Example:
  tether --connect 127.0.0.1:8765 "Find every TODO in src/"
  tether --command agent-server --hotl --promise "TESTS PASS" "Make the tests pass"
  tether --hook ./review.sh --max-iterations 3 "Refactor the parser"
  tether --tool-hook ./deny-secrets.sh "Summarize the config files"
"#)]
pub struct Cli {
    /// Prompt to submit (reads prompts from stdin when omitted)
    pub prompt: Option<String>,

    /// Connect to a backend over TCP at ADDR (host:port)
    #[arg(long, value_name = "ADDR", conflicts_with = "command")]
    pub connect: Option<String>,

    /// Spawn CMD as the backend and talk to it over stdio
    #[arg(long, value_name = "CMD")]
    pub command: Option<String>,

    /// Working directory for the session and its tools
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Maximum automatic continuations per prompt
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u32>,

    /// Keep re-submitting the prompt until the agent fulfils the promise
    #[arg(long, requires = "prompt")]
    pub hotl: bool,

    /// Completion promise the agent must state as <promise>TEXT</promise>
    #[arg(long, value_name = "TEXT", requires = "hotl")]
    pub promise: Option<String>,

    /// In HOTL mode, ask the agent to predict the user's reply
    #[arg(long, requires = "hotl")]
    pub auto_respond: bool,

    /// Shell command run when a turn completes (can be specified multiple times)
    #[arg(long, value_name = "CMD")]
    pub hook: Vec<String>,

    /// Shell command run before each prompt; may block it or add to it (repeatable)
    #[arg(long, value_name = "CMD")]
    pub prompt_hook: Vec<String>,

    /// Shell command run before each tool call; may block it (repeatable)
    #[arg(long, value_name = "CMD")]
    pub tool_hook: Vec<String>,

    /// Resume an existing session instead of creating one
    #[arg(long, value_name = "SESSION_ID")]
    pub resume: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print the agent's text
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write diagnostic logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and the merged configuration, then exit
    #[arg(long)]
    pub show_config: bool,
}
