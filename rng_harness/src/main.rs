use anyhow::{anyhow, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::Path;

use rng_harness::{
    config::{defaults, CampaignMode, ConfigValidator, HarnessConfig},
    logger::{init_logger, LogLevel},
    rng::parse_seed,
    CampaignReport, CampaignRunner, ContractAbi, ContractNode, HarnessError, NodeClient,
    SamplerKind, TestRng,
};

/// RNG harness CLI configuration - wrapper for command line parsing
#[derive(Parser, Clone, Debug)]
#[command(name = "rng-harness")]
#[command(about = "Samples the RNG functions of a contract on an EVM test node and validates the values")]
pub struct CliConfig {
    /// Set log level
    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Disable the log file
    #[clap(long)]
    disable_file_logging: bool,

    /// Disable the usage of colors in log
    #[clap(long)]
    disable_log_color: bool,

    /// Log filename
    #[clap(long, default_value_t = String::from(defaults::FILENAME_LOG))]
    filename_log: String,

    /// Logs directory
    #[clap(long, default_value_t = String::from(defaults::LOGS_PATH))]
    logs_path: String,

    /// Network profile to use (development, debug)
    #[clap(long, default_value_t = String::from(defaults::NETWORK))]
    network: String,

    /// Node RPC address, overrides the network profile
    #[clap(long)]
    rpc_address: Option<String>,

    /// Address of the deployed RNG contract
    #[clap(short, long)]
    contract_address: Option<String>,

    /// ABI file, either a bare ABI array or a build artifact
    #[clap(long, default_value_t = String::from(defaults::ABI_PATH))]
    abi_path: String,

    /// Sender of the calls, defaults to the first node account
    #[clap(long)]
    from_address: Option<String>,

    /// Gas limit per call, overrides the network profile
    #[clap(long)]
    gas: Option<u64>,

    /// Gas price in wei, overrides the network profile
    #[clap(long)]
    gas_price: Option<u64>,

    /// Number of values drawn per campaign
    #[clap(short, long, default_value_t = defaults::REPEAT_COUNT)]
    repeat_count: u32,

    /// Duplicate ratio used to compute the quota
    #[clap(long, default_value_t = defaults::MAX_DUPLICATE_RATIO)]
    max_duplicate_ratio: f64,

    /// Fail campaigns exceeding the duplicate quota
    #[clap(long)]
    enforce_duplicate_quota: bool,

    /// Calls submitted per mined block (at most 1000)
    #[clap(short, long, default_value_t = defaults::BATCH_SIZE)]
    batch_size: usize,

    /// Bit width to sample, repeatable
    #[clap(long = "bits", value_name = "BITS")]
    bits: Vec<u32>,

    /// Kinds of draws to run for each bit width
    #[clap(long, value_enum, default_value_t = CampaignMode::Both)]
    mode: CampaignMode,

    /// Seed of the range generator, decimal or 0x-prefixed hex
    #[clap(long, value_parser = parse_seed_arg)]
    seed: Option<u64>,

    /// Name template of unbounded functions, `{bits}` is replaced by the width
    #[clap(long, default_value_t = String::from(defaults::UNBOUNDED_PATTERN))]
    pattern_unbounded: String,

    /// Name template of bounded functions, `{bits}` is replaced by the width
    #[clap(long, default_value_t = String::from(defaults::BOUNDED_PATTERN))]
    pattern_bounded: String,

    /// Advanced: Request timeout in seconds
    #[clap(long, default_value_t = defaults::REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    /// Advanced: Connection timeout in seconds
    #[clap(long, default_value_t = defaults::CONNECTION_TIMEOUT_SECS)]
    connection_timeout_secs: u64,

    /// Advanced: Maximum number of retries on transport errors
    #[clap(long, default_value_t = defaults::MAX_RETRIES)]
    max_retries: u32,

    /// Advanced: Retry delay in milliseconds
    #[clap(long, default_value_t = defaults::RETRY_DELAY_MS)]
    retry_delay_ms: u64,

    /// Advanced: Receipt polling interval in milliseconds
    #[clap(long, default_value_t = defaults::RECEIPT_POLL_INTERVAL_MS)]
    receipt_poll_interval_ms: u64,

    /// Advanced: Receipt timeout in seconds
    #[clap(long, default_value_t = defaults::RECEIPT_TIMEOUT_SECS)]
    receipt_timeout_secs: u64,

    /// Enable strict configuration validation
    #[clap(long)]
    strict_validation: bool,

    /// Disable auto-fix of configuration issues
    #[clap(long)]
    no_auto_fix: bool,

    /// JSON File to load the configuration from
    #[clap(long)]
    config_file: Option<String>,

    /// Generate the template at the `config_file` path
    #[clap(long)]
    generate_config_template: bool,
}

fn parse_seed_arg(value: &str) -> Result<u64, String> {
    parse_seed(value).ok_or_else(|| format!("invalid seed '{}'", value))
}

impl CliConfig {
    /// Convert CLI configuration to HarnessConfig
    pub fn to_harness_config(self) -> HarnessConfig {
        let bits = if self.bits.is_empty() {
            defaults::BITS.to_vec()
        } else {
            self.bits
        };

        HarnessConfig {
            log_level: self.log_level,
            disable_file_logging: self.disable_file_logging,
            disable_log_color: self.disable_log_color,
            filename_log: self.filename_log,
            logs_path: self.logs_path,
            network: self.network,
            rpc_address: self.rpc_address,
            contract_address: self.contract_address,
            abi_path: self.abi_path,
            from_address: self.from_address,
            gas: self.gas,
            gas_price: self.gas_price,
            repeat_count: self.repeat_count,
            max_duplicate_ratio: self.max_duplicate_ratio,
            enforce_duplicate_quota: self.enforce_duplicate_quota,
            batch_size: self.batch_size,
            bits,
            mode: self.mode,
            seed: self.seed,
            unbounded_pattern: self.pattern_unbounded,
            bounded_pattern: self.pattern_bounded,
            unbounded_functions: Default::default(),
            bounded_functions: Default::default(),
            request_timeout_secs: self.request_timeout_secs,
            connection_timeout_secs: self.connection_timeout_secs,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            receipt_poll_interval_ms: self.receipt_poll_interval_ms,
            receipt_timeout_secs: self.receipt_timeout_secs,
            auto_fix_config: !self.no_auto_fix,
            strict_validation: self.strict_validation,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_config = CliConfig::parse();

    // Handle config template generation
    if let Some(path) = cli_config.config_file.as_ref() {
        if cli_config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {path}");
                eprintln!("Use a different path or remove the existing file");
                return Ok(());
            }

            HarnessConfig::generate_template(path)?;
            println!("Configuration template generated at {path}");
            println!("Edit the file and run the harness with --config-file {path}");
            return Ok(());
        }
    }

    // Load and validate configuration
    let config = if let Some(config_path) = &cli_config.config_file {
        println!("Loading configuration from: {config_path}");
        HarnessConfig::from_file(
            config_path,
            cli_config.strict_validation,
            !cli_config.no_auto_fix,
        )?
    } else {
        let mut config = cli_config.to_harness_config();
        let validator = ConfigValidator::new(config.strict_validation, config.auto_fix_config);
        let messages = validator.validate(&mut config)?;

        if !messages.is_empty() {
            println!(
                "Configuration validation completed with {} message(s)",
                messages.len()
            );
        }

        config
    };

    init_logger(&config.logger_options())?;

    if log::log_enabled!(log::Level::Info) {
        info!("RNG harness v{} starting...", env!("CARGO_PKG_VERSION"));
    }

    let rpc_address = config.effective_rpc_address()?;
    let client = NodeClient::with_config(&rpc_address, config.to_node_client_config())?;
    if log::log_enabled!(log::Level::Info) {
        info!("Node address: {}", client.url());
    }

    info!("Testing connection to node...");
    client.test_connection().await?;

    let abi = ContractAbi::from_file(&config.abi_path)?;
    let functions = config.rng_functions();
    for kind in [SamplerKind::Unbounded, SamplerKind::Bounded] {
        for (bits, name) in functions.table(kind) {
            if !abi.has_function(name) && log::log_enabled!(log::Level::Warn) {
                warn!("{} function '{}' for {} bits is missing from the ABI", kind, name, bits);
            }
        }
        if !abi.has_event(kind.event_name()) {
            warn!("Event '{}' is missing from the ABI", kind.event_name());
        }
    }

    let node = ContractNode::connect(
        client,
        abi,
        config.contract_address()?,
        config.from_address()?,
        config.gas_settings(),
    )
    .await?;

    let rng = TestRng::from_option(config.seed);
    let runner = CampaignRunner::new(node, functions, config.to_run_configuration(), rng);

    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for bits in &config.bits {
        for ranged in config.mode.ranged_flags() {
            match runner.test_rng(*bits, *ranged, config.batch_size).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("{} bits ({}): {}", bits, mode_name(*ranged), e);
                    failures.push((*bits, *ranged, e));
                }
            }
        }
    }

    print_summary(&reports, &failures);

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} campaign(s) failed (seed 0x{:016x})",
            failures.len(),
            failures.len() + reports.len(),
            runner.rng().seed()
        ))
    }
}

fn mode_name(ranged: bool) -> &'static str {
    if ranged {
        "ranged"
    } else {
        "unbounded"
    }
}

fn print_summary(reports: &[CampaignReport], failures: &[(u32, bool, HarnessError)]) {
    println!();
    println!(
        "{:>5}  {:<9}  {:>7}  {:>6}  {:>10}  {:>5}  result",
        "bits", "mode", "samples", "epochs", "duplicates", "quota"
    );
    for report in reports {
        let result = if report.quota_exceeded() {
            "passed (quota exceeded, not enforced)"
        } else {
            "passed"
        };
        println!(
            "{:>5}  {:<9}  {:>7}  {:>6}  {:>10}  {:>5}  {}",
            report.bits,
            mode_name(report.ranged),
            report.samples,
            report.epochs,
            report.duplicate_count,
            report.duplicate_quota,
            result
        );
    }
    for (bits, ranged, error) in failures {
        let result = if error.is_validation() {
            "FAILED"
        } else {
            "ABORTED"
        };
        println!(
            "{:>5}  {:<9}  {:>7}  {:>6}  {:>10}  {:>5}  {}: {}",
            bits,
            mode_name(*ranged),
            "-",
            "-",
            "-",
            "-",
            result,
            error
        );
    }
}
