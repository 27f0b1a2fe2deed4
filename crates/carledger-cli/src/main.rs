// crates/carledger-cli/src/main.rs
// ============================================================================
// Module: Car Ledger CLI Entry Point
// Description: Command dispatcher for contract invocation and policy tooling.
// Purpose: Drive the car contract against a configured ledger from the shell.
// Dependencies: clap, carledger-config, carledger-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The `carledger` CLI invokes contract operations against the ledger named in
//! `carledger.toml`, replays scripted invocation batches, and inspects or
//! builds validation policies. Errors are written to stderr and mapped to a
//! failure exit code.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use carledger_config::CarLedgerConfig;
use carledger_core::CarContract;
use carledger_core::Invocation;
use carledger_core::KeyEndorsementPolicy;
use carledger_core::Response;
use carledger_core::SharedLedger;
use carledger_core::ValidationPolicy;
use carledger_core::core::policy::decode_envelope;
use carledger_core::core::policy::wire::MspRoleType;
use carledger_core::decode_transport;
use carledger_core::describe;
use carledger_core::encode_transport;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a replay script.
const MAX_REPLAY_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "carledger", disable_help_subcommand = true)]
struct Cli {
    /// Optional config file path (defaults to carledger.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Invoke a single contract function.
    Invoke(InvokeCommand),
    /// Invoke a JSON script of functions in order against one ledger.
    Replay(ReplayCommand),
    /// Validation policy utilities.
    Policy {
        /// Selected policy subcommand.
        #[command(subcommand)]
        command: PolicyCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `invoke` command.
#[derive(Args, Debug)]
struct InvokeCommand {
    /// Contract function name.
    #[arg(value_name = "FUNCTION")]
    function: String,
    /// Positional function arguments.
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Arguments for the `replay` command.
#[derive(Args, Debug)]
struct ReplayCommand {
    /// JSON array of `{"function", "args"}` objects.
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
    /// Continue after failed invocations.
    #[arg(long)]
    keep_going: bool,
}

/// Policy subcommands.
#[derive(Subcommand, Debug)]
enum PolicyCommand {
    /// Render base64 policy bytes as a policy expression.
    Describe(PolicyDescribeCommand),
    /// Build a policy requiring every listed organization.
    Build(PolicyBuildCommand),
    /// Print a canonical policy as base64.
    Canonical(PolicyCanonicalCommand),
}

/// Arguments for `policy describe`.
#[derive(Args, Debug)]
struct PolicyDescribeCommand {
    /// Base64-encoded policy bytes.
    #[arg(value_name = "BASE64", allow_hyphen_values = true)]
    policy: String,
}

/// Arguments for `policy build`.
#[derive(Args, Debug)]
struct PolicyBuildCommand {
    /// Role required from each organization.
    #[arg(long, value_name = "ROLE", default_value = "member")]
    role: String,
    /// Organization MSP identifiers.
    #[arg(long = "org", value_name = "MSP", required = true)]
    orgs: Vec<String>,
}

/// Arguments for `policy canonical`.
#[derive(Args, Debug)]
struct PolicyCanonicalCommand {
    /// Canonical policy to print.
    #[arg(value_enum)]
    policy: CanonicalPolicy,
}

/// Canonical policy selector.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CanonicalPolicy {
    /// Accept-all policy.
    AcceptAll,
    /// Reject-all policy.
    RejectAll,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a car ledger configuration file.
    Validate,
}

/// One replay output line.
#[derive(Serialize)]
struct ReplayLine<'a> {
    /// Position in the script.
    index: usize,
    /// Invoked function name.
    function: &'a str,
    /// Response status.
    status: i32,
    /// Payload decoded as lossy UTF-8.
    payload: String,
    /// Error message, empty on success.
    message: &'a str,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors from bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Invoke(command) => command_invoke(config_path, &command),
        Commands::Replay(command) => command_replay(config_path, &command),
        Commands::Policy {
            command,
        } => match command {
            PolicyCommand::Describe(command) => command_policy_describe(&command),
            PolicyCommand::Build(command) => command_policy_build(&command),
            PolicyCommand::Canonical(command) => command_policy_canonical(&command),
        },
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(config_path),
    }
}

// ============================================================================
// SECTION: Contract Commands
// ============================================================================

/// Loads configuration and assembles the contract.
fn load_contract(config_path: Option<&Path>) -> CliResult<CarContract<SharedLedger>> {
    let config = CarLedgerConfig::load(config_path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    config
        .build_contract()
        .map_err(|err| CliError::new(format!("failed to open ledger: {err}")))
}

/// Executes the `invoke` command.
fn command_invoke(config_path: Option<&Path>, command: &InvokeCommand) -> CliResult<ExitCode> {
    let contract = load_contract(config_path)?;
    let response = contract.invoke(&Invocation::new(&command.function, &command.args));
    if !response.is_success() {
        return Err(CliError::new(format!("{} failed: {}", command.function, response.message)));
    }
    if !response.payload.is_empty() {
        write_stdout_bytes(&response.payload)
            .and_then(|()| write_stdout_line(""))
            .map_err(|err| CliError::new(output_error(&err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `replay` command.
fn command_replay(config_path: Option<&Path>, command: &ReplayCommand) -> CliResult<ExitCode> {
    let bytes = read_bytes_with_limit(&command.file, MAX_REPLAY_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(format!(
            "failed to read replay script {}: {err}",
            command.file.display()
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "replay script {} is too large ({size} bytes, max {limit})",
            command.file.display()
        )),
    })?;
    let invocations: Vec<Invocation> = serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid replay script: {err}")))?;
    let contract = load_contract(config_path)?;
    let mut failed = false;
    for (index, invocation) in invocations.iter().enumerate() {
        let response = contract.invoke(invocation);
        write_replay_line(index, invocation, &response)?;
        if !response.is_success() {
            failed = true;
            if !command.keep_going {
                break;
            }
        }
    }
    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

/// Writes one replay response as a JSON line.
fn write_replay_line(index: usize, invocation: &Invocation, response: &Response) -> CliResult<()> {
    let line = ReplayLine {
        index,
        function: &invocation.function,
        status: response.status,
        payload: String::from_utf8_lossy(&response.payload).into_owned(),
        message: &response.message,
    };
    let text = serde_json::to_string(&line)
        .map_err(|err| CliError::new(format!("failed to encode replay output: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::new(output_error(&err)))
}

// ============================================================================
// SECTION: Policy Commands
// ============================================================================

/// Executes `policy describe`.
fn command_policy_describe(command: &PolicyDescribeCommand) -> CliResult<ExitCode> {
    let bytes = decode_transport(&command.policy).map_err(|err| CliError::new(err.to_string()))?;
    let envelope = decode_envelope(&bytes).map_err(|err| CliError::new(err.to_string()))?;
    let classification = ValidationPolicy::from_bytes(bytes);
    write_stdout_line(&format!("{classification}: {}", describe(&envelope)))
        .map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `policy build`.
fn command_policy_build(command: &PolicyBuildCommand) -> CliResult<ExitCode> {
    let role = MspRoleType::parse(&command.role).map_err(|err| CliError::new(err.to_string()))?;
    let mut policy = KeyEndorsementPolicy::new();
    policy.add_orgs(role, command.orgs.iter().map(String::as_str));
    write_stdout_line(&encode_transport(&policy.policy()))
        .map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `policy canonical`.
fn command_policy_canonical(command: &PolicyCanonicalCommand) -> CliResult<ExitCode> {
    let policy = match command.policy {
        CanonicalPolicy::AcceptAll => ValidationPolicy::AcceptAll,
        CanonicalPolicy::RejectAll => ValidationPolicy::RejectAll,
    };
    write_stdout_line(&policy.to_transport()).map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes `config validate`.
fn command_config_validate(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let _config = CarLedgerConfig::load(config_path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error(&err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: I/O Helpers
// ============================================================================

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Formats a stdout write failure.
fn output_error(err: &std::io::Error) -> String {
    format!("failed to write stdout: {err}")
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
