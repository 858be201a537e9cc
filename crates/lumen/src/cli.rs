//! Clap derive structures for the `lumen` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lumen -- talk to a smart-lighting bridge from the command line
#[derive(Debug, Parser)]
#[command(
    name = "lumen",
    version,
    about = "Inspect and drive a smart-lighting bridge from the command line",
    long_about = "Mirror a bridge's resources, follow its event stream, and stream\n\
        colour to entertainment areas over the low-latency datagram channel.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Bridge profile to use
    #[arg(long, short = 'p', env = "LUMEN_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Bridge URL (overrides profile)
    #[arg(long, short = 'b', env = "LUMEN_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Application key
    #[arg(long, env = "LUMEN_APP_KEY", global = true, hide_env_values = true)]
    pub app_key: Option<String>,

    /// Entertainment client key (hex)
    #[arg(long, env = "LUMEN_CLIENT_KEY", global = true, hide_env_values = true)]
    pub client_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LUMEN_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Require a verified TLS certificate
    #[arg(long, env = "LUMEN_STRICT_TLS", global = true)]
    pub strict_tls: bool,

    /// Request timeout in seconds
    #[arg(long, env = "LUMEN_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pair with a bridge (press its link button first)
    Pair(PairArgs),

    /// List, inspect and delete mirrored resources
    #[command(alias = "res", alias = "r")]
    Resources(ResourcesArgs),

    /// Follow the bridge's change events
    Events(EventsArgs),

    /// Entertainment areas and colour streaming
    #[command(alias = "ent")]
    Entertainment(EntertainmentArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Pair ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Bridge URL, e.g. https://192.168.1.2
    pub bridge: String,

    /// Instance name reported to the bridge
    #[arg(long, default_value = "cli")]
    pub instance: String,

    /// Seconds to wait for the link button
    #[arg(long, default_value = "30")]
    pub wait: u64,

    /// Profile name to store the credentials under
    #[arg(long, default_value = "default")]
    pub name: String,
}

// ── Resources ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ResourcesArgs {
    #[command(subcommand)]
    pub command: ResourcesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ResourcesCommand {
    /// List resources, optionally of one type
    #[command(alias = "ls")]
    List {
        /// Resource type, e.g. light, room, entertainment_configuration
        #[arg(long, short = 't')]
        r#type: Option<String>,
    },

    /// Show one resource
    Get {
        /// Resource type
        r#type: String,
        /// Resource id (UUID)
        id: String,
    },

    /// Delete one resource
    #[command(alias = "rm")]
    Delete {
        /// Resource type
        r#type: String,
        /// Resource id (UUID)
        id: String,
    },
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Only show events for this resource type
    #[arg(long, short = 't')]
    pub r#type: Option<String>,

    /// Stop after this many seconds
    #[arg(long)]
    pub seconds: Option<u64>,
}

// ── Entertainment ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EntertainmentArgs {
    #[command(subcommand)]
    pub command: EntertainmentCommand,
}

#[derive(Debug, Subcommand)]
pub enum EntertainmentCommand {
    /// List entertainment configurations
    #[command(alias = "ls")]
    List,

    /// Stream an animated effect to an entertainment configuration
    Stream {
        /// Entertainment configuration id (UUID)
        id: String,

        /// Frames per second (defaults to the profile's fps)
        #[arg(long)]
        fps: Option<u32>,

        /// How long to stream
        #[arg(long, default_value = "10")]
        seconds: u64,

        /// Effect to render on every channel
        #[arg(long, value_enum, default_value = "wave")]
        effect: Effect,

        /// Base colour as hex RGB, e.g. `#ff8800` (defaults to warm white)
        #[arg(long)]
        color: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Effect {
    /// Slow brightness wave
    Wave,
    /// Cycle through a warm colour palette
    Palette,
    /// Candle-like random flicker
    Flicker,
    /// Occasional lightning flashes
    Lightning,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
