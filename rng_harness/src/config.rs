use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::campaign::RunConfiguration;
use crate::logger::{LogLevel, LoggerOptions};
use crate::node::GasSettings;
use crate::rpc::{normalize_address, NodeClientConfig};
use crate::sampler::{RngFunctions, MAX_BITS, MIN_BITS};

/// Default values for configuration
pub mod defaults {
    use super::*;

    pub const LOG_LEVEL: LogLevel = LogLevel::Info;
    pub const FILENAME_LOG: &str = "rng-harness.log";
    pub const LOGS_PATH: &str = "logs/";
    pub const NETWORK: &str = "development";
    pub const ABI_PATH: &str = "./src/contracts/RNG.json";

    // Campaign defaults
    pub const REPEAT_COUNT: u32 = 100;
    pub const MAX_DUPLICATE_RATIO: f64 = 0.1;
    pub const BATCH_SIZE: usize = 1;
    pub const BITS: [u32; 6] = [8, 16, 32, 64, 128, 256];
    pub const UNBOUNDED_PATTERN: &str = "getRandom{bits}";
    pub const BOUNDED_PATTERN: &str = "getRandomRange{bits}";

    // Node client defaults
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
    pub const MAX_RETRIES: u32 = 0;
    pub const RETRY_DELAY_MS: u64 = 1000;
    pub const RECEIPT_POLL_INTERVAL_MS: u64 = 10;
    pub const RECEIPT_TIMEOUT_SECS: u64 = 60;

    // Validation limits
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 300;
    pub const MAX_RETRIES_LIMIT: u32 = 10;
    pub const MAX_BATCH_SIZE: usize = crate::executor::MAX_BATCH_SIZE;
    pub const MIN_RETRY_DELAY_MS: u64 = 100;
    pub const MAX_RETRY_DELAY_MS: u64 = 30000;
    pub const MIN_POLL_INTERVAL_MS: u64 = 1;
    pub const MAX_POLL_INTERVAL_MS: u64 = 10000;
}

/// Connection settings of a named test network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkProfile {
    pub name: &'static str,
    pub rpc_address: &'static str,
    pub gas: u64,
    pub gas_price: u64,
}

pub static NETWORK_PROFILES: [NetworkProfile; 2] = [
    NetworkProfile {
        name: "development",
        rpc_address: "http://localhost:7545",
        gas: 7_400_000,
        gas_price: 5_000_000_000,
    },
    NetworkProfile {
        name: "debug",
        rpc_address: "http://localhost:9545",
        gas: 7_400_000,
        gas_price: 5_000_000_000,
    },
];

impl NetworkProfile {
    pub fn find(name: &str) -> Option<&'static NetworkProfile> {
        let name = name.to_lowercase();
        NETWORK_PROFILES.iter().find(|profile| profile.name == name)
    }
}

/// Which kinds of draws a run exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignMode {
    Unbounded,
    Ranged,
    Both,
}

impl CampaignMode {
    /// `ranged` flags of the campaigns to run for each bit width
    pub fn ranged_flags(&self) -> &'static [bool] {
        match self {
            Self::Unbounded => &[false],
            Self::Ranged => &[true],
            Self::Both => &[false, true],
        }
    }
}

/// Harness configuration with validation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Log level configuration
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// File logging settings
    #[serde(default)]
    pub disable_file_logging: bool,

    #[serde(default)]
    pub disable_log_color: bool,

    #[serde(default = "default_filename_log")]
    pub filename_log: String,

    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    /// Node connection settings
    #[serde(default = "default_network")]
    pub network: String,

    /// Overrides the address of the network profile
    #[serde(default)]
    pub rpc_address: Option<String>,

    #[serde(default)]
    pub contract_address: Option<String>,

    #[serde(default = "default_abi_path")]
    pub abi_path: String,

    /// Sender of the RNG calls, first node account when unset
    #[serde(default)]
    pub from_address: Option<String>,

    #[serde(default)]
    pub gas: Option<u64>,

    #[serde(default)]
    pub gas_price: Option<u64>,

    /// Campaign settings
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,

    #[serde(default = "default_max_duplicate_ratio")]
    pub max_duplicate_ratio: f64,

    #[serde(default)]
    pub enforce_duplicate_quota: bool,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_bits")]
    pub bits: Vec<u32>,

    #[serde(default = "default_mode")]
    pub mode: CampaignMode,

    #[serde(default)]
    pub seed: Option<u64>,

    /// Function name templates, `{bits}` is replaced by the width
    #[serde(default = "default_unbounded_pattern")]
    pub unbounded_pattern: String,

    #[serde(default = "default_bounded_pattern")]
    pub bounded_pattern: String,

    /// Explicit entries, taking precedence over the templates
    #[serde(default)]
    pub unbounded_functions: BTreeMap<u32, String>,

    #[serde(default)]
    pub bounded_functions: BTreeMap<u32, String>,

    /// Advanced node client configuration
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,

    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,

    /// Auto-fix configuration issues
    #[serde(default)]
    pub auto_fix_config: bool,

    /// Validation settings
    #[serde(default)]
    pub strict_validation: bool,
}

// Default functions for serde
fn default_log_level() -> LogLevel {
    defaults::LOG_LEVEL
}
fn default_filename_log() -> String {
    defaults::FILENAME_LOG.to_string()
}
fn default_logs_path() -> String {
    defaults::LOGS_PATH.to_string()
}
fn default_network() -> String {
    defaults::NETWORK.to_string()
}
fn default_abi_path() -> String {
    defaults::ABI_PATH.to_string()
}
fn default_repeat_count() -> u32 {
    defaults::REPEAT_COUNT
}
fn default_max_duplicate_ratio() -> f64 {
    defaults::MAX_DUPLICATE_RATIO
}
fn default_batch_size() -> usize {
    defaults::BATCH_SIZE
}
fn default_bits() -> Vec<u32> {
    defaults::BITS.to_vec()
}
fn default_mode() -> CampaignMode {
    CampaignMode::Both
}
fn default_unbounded_pattern() -> String {
    defaults::UNBOUNDED_PATTERN.to_string()
}
fn default_bounded_pattern() -> String {
    defaults::BOUNDED_PATTERN.to_string()
}
fn default_request_timeout_secs() -> u64 {
    defaults::REQUEST_TIMEOUT_SECS
}
fn default_connection_timeout_secs() -> u64 {
    defaults::CONNECTION_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    defaults::MAX_RETRIES
}
fn default_retry_delay_ms() -> u64 {
    defaults::RETRY_DELAY_MS
}
fn default_receipt_poll_interval_ms() -> u64 {
    defaults::RECEIPT_POLL_INTERVAL_MS
}
fn default_receipt_timeout_secs() -> u64 {
    defaults::RECEIPT_TIMEOUT_SECS
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            disable_file_logging: false,
            disable_log_color: false,
            filename_log: default_filename_log(),
            logs_path: default_logs_path(),
            network: default_network(),
            rpc_address: None,
            contract_address: None,
            abi_path: default_abi_path(),
            from_address: None,
            gas: None,
            gas_price: None,
            repeat_count: default_repeat_count(),
            max_duplicate_ratio: default_max_duplicate_ratio(),
            enforce_duplicate_quota: false,
            batch_size: default_batch_size(),
            bits: default_bits(),
            mode: default_mode(),
            seed: None,
            unbounded_pattern: default_unbounded_pattern(),
            bounded_pattern: default_bounded_pattern(),
            unbounded_functions: BTreeMap::new(),
            bounded_functions: BTreeMap::new(),
            request_timeout_secs: default_request_timeout_secs(),
            connection_timeout_secs: default_connection_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            auto_fix_config: true,
            strict_validation: false,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidRpcAddress(String),
    UnknownNetwork(String),
    InvalidAddress {
        field: String,
        value: String,
    },
    InvalidRepeatCount,
    InvalidBatchSize(usize),
    InvalidDuplicateRatio(f64),
    InvalidBitWidth {
        field: String,
        bits: u32,
    },
    InvalidTimeout {
        field: String,
        value: u64,
        min: u64,
        max: u64,
    },
    InvalidRetrySettings {
        field: String,
        value: u32,
        max: u32,
    },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigValidationError::InvalidRpcAddress(addr) => write!(
                f,
                "Invalid RPC address: '{}' - must be a valid HTTP/HTTPS URL",
                addr
            ),
            ConfigValidationError::UnknownNetwork(network) => write!(
                f,
                "Unknown network: '{}' - must be one of: {} (or set rpc_address)",
                network,
                NETWORK_PROFILES
                    .iter()
                    .map(|p| p.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ConfigValidationError::InvalidAddress { field, value } => write!(
                f,
                "Invalid {}: '{}' - must be a 20-byte hex address",
                field, value
            ),
            ConfigValidationError::InvalidRepeatCount => {
                write!(f, "Invalid repeat_count: must be at least 1")
            }
            ConfigValidationError::InvalidBatchSize(size) => write!(
                f,
                "Invalid batch_size: {} - must be between 1 and {}",
                size,
                defaults::MAX_BATCH_SIZE
            ),
            ConfigValidationError::InvalidDuplicateRatio(ratio) => write!(
                f,
                "Invalid max_duplicate_ratio: {} - must be between 0 and 1",
                ratio
            ),
            ConfigValidationError::InvalidBitWidth { field, bits } => write!(
                f,
                "Invalid bit width {} in {} - must be between {} and {}",
                bits, field, MIN_BITS, MAX_BITS
            ),
            ConfigValidationError::InvalidTimeout {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "Invalid {}: {} - must be between {} and {}",
                field, value, min, max
            ),
            ConfigValidationError::InvalidRetrySettings { field, value, max } => write!(
                f,
                "Invalid {}: {} - must be between 0 and {}",
                field, value, max
            ),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validation result
pub type ValidationResult<T> = std::result::Result<T, ConfigValidationError>;

fn valid_bits(bits: u32) -> bool {
    (MIN_BITS..=MAX_BITS).contains(&bits)
}

/// Configuration validator
pub struct ConfigValidator {
    strict_mode: bool,
    auto_fix: bool,
}

impl ConfigValidator {
    pub fn new(strict_mode: bool, auto_fix: bool) -> Self {
        Self {
            strict_mode,
            auto_fix,
        }
    }

    fn can_fix(&self) -> bool {
        self.auto_fix && !self.strict_mode
    }

    // Applies `fix` when auto-fixing is allowed, fails otherwise
    fn fix_or_fail<F: FnOnce() -> String>(
        &self,
        error: ConfigValidationError,
        fixed_issues: &mut Vec<String>,
        fix: F,
    ) -> Result<()> {
        if !self.can_fix() {
            return Err(anyhow!("Configuration validation failed: {}", error));
        }
        if log::log_enabled!(log::Level::Warn) {
            warn!("Auto-fixing: {}", error);
        }
        fixed_issues.push(fix());
        Ok(())
    }

    /// Validate the entire configuration
    ///
    /// Returns the list of applied fixes and warnings.
    pub fn validate(&self, config: &mut HarnessConfig) -> Result<Vec<String>> {
        let mut warnings = Vec::new();
        let mut fixed_issues = Vec::new();

        info!("Validating configuration...");

        if let Err(e) = self.validate_endpoint(config) {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.rpc_address = None;
                config.network = defaults::NETWORK.to_string();
                format!("Fixed network to default: {}", config.network)
            })?;
        }

        // Addresses cannot be guessed, they are never auto-fixed
        if let Some(ref addr) = config.contract_address {
            self.validate_address("contract_address", addr)
                .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;
        } else {
            warnings.push("No contract_address set, campaigns cannot run".to_string());
        }
        if let Some(ref addr) = config.from_address {
            self.validate_address("from_address", addr)
                .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;
        }

        if config.repeat_count == 0 {
            self.fix_or_fail(ConfigValidationError::InvalidRepeatCount, &mut fixed_issues, || {
                config.repeat_count = defaults::REPEAT_COUNT;
                format!("Fixed repeat count to {}", config.repeat_count)
            })?;
        }

        if config.batch_size == 0 || config.batch_size > defaults::MAX_BATCH_SIZE {
            let error = ConfigValidationError::InvalidBatchSize(config.batch_size);
            self.fix_or_fail(error, &mut fixed_issues, || {
                config.batch_size = config.batch_size.clamp(1, defaults::MAX_BATCH_SIZE);
                format!("Fixed batch size to {}", config.batch_size)
            })?;
        }

        if !(0.0..=1.0).contains(&config.max_duplicate_ratio) {
            let error = ConfigValidationError::InvalidDuplicateRatio(config.max_duplicate_ratio);
            self.fix_or_fail(error, &mut fixed_issues, || {
                config.max_duplicate_ratio = defaults::MAX_DUPLICATE_RATIO;
                format!("Fixed duplicate ratio to {}", config.max_duplicate_ratio)
            })?;
        }

        let invalid_bits = config.bits.iter().copied().find(|b| !valid_bits(*b));
        if let Some(bits) = invalid_bits {
            let error = ConfigValidationError::InvalidBitWidth {
                field: "bits".to_string(),
                bits,
            };
            self.fix_or_fail(error, &mut fixed_issues, || {
                config.bits.retain(|b| valid_bits(*b));
                format!("Removed out of range bit widths, kept {:?}", config.bits)
            })?;
        }

        for (field, table) in [
            ("unbounded_functions", &mut config.unbounded_functions),
            ("bounded_functions", &mut config.bounded_functions),
        ] {
            let invalid_bits = table.keys().copied().find(|b| !valid_bits(*b));
            if let Some(bits) = invalid_bits {
                let error = ConfigValidationError::InvalidBitWidth {
                    field: field.to_string(),
                    bits,
                };
                self.fix_or_fail(error, &mut fixed_issues, || {
                    table.retain(|b, _| valid_bits(*b));
                    format!("Removed out of range entries from {}", field)
                })?;
            }
        }

        // Validate timeout settings
        for (field, value, default) in [
            (
                "request_timeout",
                &mut config.request_timeout_secs,
                defaults::REQUEST_TIMEOUT_SECS,
            ),
            (
                "connection_timeout",
                &mut config.connection_timeout_secs,
                defaults::CONNECTION_TIMEOUT_SECS,
            ),
            (
                "receipt_timeout",
                &mut config.receipt_timeout_secs,
                defaults::RECEIPT_TIMEOUT_SECS,
            ),
        ] {
            if let Err(e) = self.validate_timeout(field, *value) {
                self.fix_or_fail(e, &mut fixed_issues, || {
                    *value = default;
                    format!("Fixed {} to {} seconds", field, default)
                })?;
            }
        }

        if let Err(e) = self.validate_poll_interval(config.receipt_poll_interval_ms) {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.receipt_poll_interval_ms = defaults::RECEIPT_POLL_INTERVAL_MS;
                format!(
                    "Fixed receipt poll interval to {} ms",
                    config.receipt_poll_interval_ms
                )
            })?;
        }

        // Validate retry settings
        if let Err(e) = self.validate_retry_count(config.max_retries) {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.max_retries = defaults::MAX_RETRIES;
                format!("Fixed max retries to {}", config.max_retries)
            })?;
        }

        if let Err(e) = self.validate_retry_delay(config.retry_delay_ms) {
            self.fix_or_fail(e, &mut fixed_issues, || {
                config.retry_delay_ms = defaults::RETRY_DELAY_MS;
                format!("Fixed retry delay to {} ms", config.retry_delay_ms)
            })?;
        }

        if !config.disable_file_logging {
            self.ensure_directory_exists(&config.logs_path, "logs", &mut fixed_issues)?;
        }

        // Report results
        if !fixed_issues.is_empty() && log::log_enabled!(log::Level::Info) {
            info!("Auto-fixed {} configuration issue(s):", fixed_issues.len());
            for fix in &fixed_issues {
                info!("  {}", fix);
            }
        }

        if !warnings.is_empty() && log::log_enabled!(log::Level::Warn) {
            warn!("Configuration warnings:");
            for warning in &warnings {
                warn!("  {}", warning);
            }
        }

        let mut all_messages = fixed_issues;
        all_messages.extend(warnings);

        info!("Configuration validation completed successfully");
        Ok(all_messages)
    }

    fn validate_endpoint(&self, config: &HarnessConfig) -> ValidationResult<()> {
        match config.rpc_address {
            Some(ref address) => normalize_address(address)
                .map(|_| ())
                .map_err(|_| ConfigValidationError::InvalidRpcAddress(address.clone())),
            None => NetworkProfile::find(&config.network)
                .map(|_| ())
                .ok_or_else(|| ConfigValidationError::UnknownNetwork(config.network.clone())),
        }
    }

    fn validate_address(&self, field: &str, value: &str) -> ValidationResult<()> {
        Address::from_str(value)
            .map(|_| ())
            .map_err(|_| ConfigValidationError::InvalidAddress {
                field: field.to_string(),
                value: value.to_string(),
            })
    }

    fn validate_timeout(&self, field: &str, value: u64) -> ValidationResult<()> {
        if value < defaults::MIN_TIMEOUT_SECS || value > defaults::MAX_TIMEOUT_SECS {
            return Err(ConfigValidationError::InvalidTimeout {
                field: field.to_string(),
                value,
                min: defaults::MIN_TIMEOUT_SECS,
                max: defaults::MAX_TIMEOUT_SECS,
            });
        }
        Ok(())
    }

    fn validate_poll_interval(&self, value: u64) -> ValidationResult<()> {
        if value < defaults::MIN_POLL_INTERVAL_MS || value > defaults::MAX_POLL_INTERVAL_MS {
            return Err(ConfigValidationError::InvalidTimeout {
                field: "receipt_poll_interval".to_string(),
                value,
                min: defaults::MIN_POLL_INTERVAL_MS,
                max: defaults::MAX_POLL_INTERVAL_MS,
            });
        }
        Ok(())
    }

    fn validate_retry_count(&self, value: u32) -> ValidationResult<()> {
        if value > defaults::MAX_RETRIES_LIMIT {
            return Err(ConfigValidationError::InvalidRetrySettings {
                field: "max_retries".to_string(),
                value,
                max: defaults::MAX_RETRIES_LIMIT,
            });
        }
        Ok(())
    }

    fn validate_retry_delay(&self, value: u64) -> ValidationResult<()> {
        if value < defaults::MIN_RETRY_DELAY_MS || value > defaults::MAX_RETRY_DELAY_MS {
            return Err(ConfigValidationError::InvalidTimeout {
                field: "retry_delay".to_string(),
                value,
                min: defaults::MIN_RETRY_DELAY_MS,
                max: defaults::MAX_RETRY_DELAY_MS,
            });
        }
        Ok(())
    }

    fn ensure_directory_exists(
        &self,
        path: &str,
        dir_type: &str,
        fixed_issues: &mut Vec<String>,
    ) -> Result<()> {
        let path_buf = PathBuf::from(path);

        if !path_buf.exists() {
            if log::log_enabled!(log::Level::Info) {
                info!("Creating {} directory: {}", dir_type, path);
            }
            std::fs::create_dir_all(&path_buf).map_err(|e| {
                anyhow!("Failed to create {} directory '{}': {}", dir_type, path, e)
            })?;
            fixed_issues.push(format!("Created {} directory: {}", dir_type, path));
        } else if !path_buf.is_dir() {
            return Err(anyhow!("Path '{}' exists but is not a directory", path));
        }

        Ok(())
    }
}

impl HarnessConfig {
    /// Create NodeClientConfig from validated settings
    pub fn to_node_client_config(&self) -> NodeClientConfig {
        NodeClientConfig {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
        }
    }

    pub fn to_run_configuration(&self) -> RunConfiguration {
        RunConfiguration::new(self.repeat_count, self.max_duplicate_ratio)
            .with_quota_enforced(self.enforce_duplicate_quota)
    }

    pub fn logger_options(&self) -> LoggerOptions<'_> {
        LoggerOptions {
            level: self.log_level,
            disable_file_logging: self.disable_file_logging,
            disable_log_color: self.disable_log_color,
            logs_path: &self.logs_path,
            filename_log: &self.filename_log,
        }
    }

    pub fn network_profile(&self) -> Option<&'static NetworkProfile> {
        NetworkProfile::find(&self.network)
    }

    /// Explicit `rpc_address`, else the address of the network profile
    pub fn effective_rpc_address(&self) -> Result<String> {
        match (&self.rpc_address, self.network_profile()) {
            (Some(address), _) => Ok(address.clone()),
            (None, Some(profile)) => Ok(profile.rpc_address.to_string()),
            (None, None) => Err(anyhow!(
                "{}",
                ConfigValidationError::UnknownNetwork(self.network.clone())
            )),
        }
    }

    /// Explicit gas settings, else those of the network profile
    pub fn gas_settings(&self) -> GasSettings {
        let profile = self.network_profile();
        GasSettings {
            gas: self.gas.or(profile.map(|p| p.gas)),
            gas_price: self.gas_price.or(profile.map(|p| p.gas_price)),
        }
    }

    pub fn contract_address(&self) -> Result<Address> {
        let value = self
            .contract_address
            .as_deref()
            .ok_or_else(|| anyhow!("No contract address configured"))?;
        Address::from_str(value).map_err(|e| anyhow!("Invalid contract address '{}': {}", value, e))
    }

    pub fn from_address(&self) -> Result<Option<Address>> {
        self.from_address
            .as_deref()
            .map(|value| {
                Address::from_str(value)
                    .map_err(|e| anyhow!("Invalid from address '{}': {}", value, e))
            })
            .transpose()
    }

    /// Function tables rendered from the templates, overridden by explicit entries
    pub fn rng_functions(&self) -> RngFunctions {
        let mut functions =
            RngFunctions::with_pattern(&self.bits, &self.unbounded_pattern, &self.bounded_pattern);
        functions.unbounded.extend(
            self.unbounded_functions
                .iter()
                .map(|(bits, name)| (*bits, name.clone())),
        );
        functions.bounded.extend(
            self.bounded_functions
                .iter()
                .map(|(bits, name)| (*bits, name.clone())),
        );
        functions
    }

    /// Validate and load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P, strict_mode: bool, auto_fix: bool) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            anyhow!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        let mut config: HarnessConfig = serde_json::from_str(&content).map_err(|e| {
            anyhow!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        let validator = ConfigValidator::new(strict_mode, auto_fix);
        let messages = validator.validate(&mut config)?;

        if !messages.is_empty() && log::log_enabled!(log::Level::Info) {
            info!(
                "Configuration loaded with {} adjustments/warnings",
                messages.len()
            );
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(&path, content).map_err(|e| {
            anyhow!(
                "Failed to write config file '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        if log::log_enabled!(log::Level::Info) {
            info!("Configuration saved to: {}", path.as_ref().display());
        }
        Ok(())
    }

    /// Generate a configuration template with descriptive structure
    pub fn generate_template<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut template = serde_json::to_value(HarnessConfig::default())?;
        if let serde_json::Value::Object(ref mut fields) = template {
            fields.insert(
                "_info".to_string(),
                serde_json::json!({
                    "description": "RNG sampling harness configuration",
                    "version": "1.0",
                    "sections": {
                        "logging": "Controls log output and file generation",
                        "node": "Network profile or RPC address, contract and ABI",
                        "campaign": "Sample count, batch size, bit widths and duplicate quota",
                        "functions": "Contract function names per bit width",
                        "client": "Timeouts, retries and receipt polling",
                        "validation": "Configuration validation behavior"
                    }
                }),
            );
        }

        let content = serde_json::to_string_pretty(&template)?;
        std::fs::write(&path, content).map_err(|e| {
            anyhow!(
                "Failed to write template to '{}': {}",
                path.as_ref().display(),
                e
            )
        })?;

        if log::log_enabled!(log::Level::Info) {
            info!(
                "Configuration template generated at: {}",
                path.as_ref().display()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn test_config(dir: &TempDir) -> HarnessConfig {
        HarnessConfig {
            logs_path: dir.path().join("logs").to_string_lossy().to_string(),
            contract_address: Some(CONTRACT.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        let messages = ConfigValidator::new(true, false)
            .validate(&mut config)
            .unwrap();
        // only the logs directory creation is reported
        assert_eq!(messages.len(), 1);
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_strict_mode_rejects_bad_ratio() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.max_duplicate_ratio = 1.5;
        let err = ConfigValidator::new(true, true)
            .validate(&mut config)
            .unwrap_err();
        assert!(err.to_string().contains("max_duplicate_ratio"));
    }

    #[test]
    fn test_auto_fix_resets_to_defaults() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.max_duplicate_ratio = -0.2;
        config.repeat_count = 0;
        config.batch_size = 0;
        config.request_timeout_secs = 0;
        config.max_retries = 99;
        config.bits = vec![8, 0, 300, 16];
        config.bounded_functions.insert(512, "getRandomRange512".to_string());
        config.network = "mainnet".to_string();

        let messages = ConfigValidator::new(false, true)
            .validate(&mut config)
            .unwrap();

        assert!(!messages.is_empty());
        assert_eq!(config.max_duplicate_ratio, defaults::MAX_DUPLICATE_RATIO);
        assert_eq!(config.repeat_count, defaults::REPEAT_COUNT);
        assert_eq!(config.batch_size, defaults::BATCH_SIZE);
        assert_eq!(config.request_timeout_secs, defaults::REQUEST_TIMEOUT_SECS);
        assert_eq!(config.max_retries, defaults::MAX_RETRIES);
        assert_eq!(config.bits, vec![8, 16]);
        assert!(config.bounded_functions.is_empty());
        assert_eq!(config.network, defaults::NETWORK);
    }

    #[test]
    fn test_oversized_batch_is_clamped_or_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.batch_size = usize::MAX / 2;

        let err = ConfigValidator::new(true, true)
            .validate(&mut config.clone())
            .unwrap_err();
        assert!(err.to_string().contains("batch_size"));

        ConfigValidator::new(false, true)
            .validate(&mut config)
            .unwrap();
        assert_eq!(config.batch_size, defaults::MAX_BATCH_SIZE);
    }

    #[test]
    fn test_invalid_contract_address_is_never_fixed() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.contract_address = Some("0x1234".to_string());
        assert!(ConfigValidator::new(false, true)
            .validate(&mut config)
            .is_err());
    }

    #[test]
    fn test_network_profiles() {
        let config = HarnessConfig::default();
        assert_eq!(
            config.effective_rpc_address().unwrap(),
            "http://localhost:7545"
        );
        let gas = config.gas_settings();
        assert_eq!(gas.gas, Some(7_400_000));
        assert_eq!(gas.gas_price, Some(5_000_000_000));

        let config = HarnessConfig {
            network: "debug".to_string(),
            gas: Some(1_000_000),
            ..Default::default()
        };
        assert_eq!(
            config.effective_rpc_address().unwrap(),
            "http://localhost:9545"
        );
        assert_eq!(config.gas_settings().gas, Some(1_000_000));

        let config = HarnessConfig {
            network: "custom".to_string(),
            rpc_address: Some("127.0.0.1:8545".to_string()),
            ..Default::default()
        };
        assert_eq!(config.effective_rpc_address().unwrap(), "127.0.0.1:8545");
        assert_eq!(config.gas_settings().gas, None);
    }

    #[test]
    fn test_rng_functions_merge_explicit_entries() {
        let mut config = HarnessConfig {
            bits: vec![8, 16],
            ..Default::default()
        };
        config.unbounded_functions.insert(16, "rand16".to_string());
        config.bounded_functions.insert(24, "range24".to_string());

        let functions = config.rng_functions();
        assert_eq!(functions.unbounded[&8], "getRandom8");
        assert_eq!(functions.unbounded[&16], "rand16");
        assert_eq!(functions.bounded[&16], "getRandomRange16");
        assert_eq!(functions.bounded[&24], "range24");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("harness.json");
        let mut config = test_config(&dir);
        config.repeat_count = 42;
        config.mode = CampaignMode::Ranged;
        config.unbounded_functions.insert(8, "rand8".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = HarnessConfig::from_file(&path, true, false).unwrap();
        assert_eq!(loaded.repeat_count, 42);
        assert_eq!(loaded.mode, CampaignMode::Ranged);
        assert_eq!(loaded.unbounded_functions[&8], "rand8");
        assert_eq!(loaded.contract_address.as_deref(), Some(CONTRACT));
    }

    #[test]
    fn test_template_is_loadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("template.json");
        HarnessConfig::generate_template(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("_info"));
        let config: HarnessConfig = serde_json::from_str(&content).unwrap();
        assert_eq!(config.repeat_count, defaults::REPEAT_COUNT);
        assert_eq!(config.bits, defaults::BITS.to_vec());
    }

    #[test]
    fn test_run_configuration() {
        let config = HarnessConfig {
            repeat_count: 10,
            max_duplicate_ratio: 0.25,
            enforce_duplicate_quota: true,
            ..Default::default()
        };
        let run = config.to_run_configuration();
        assert_eq!(run.repeat_count, 10);
        assert_eq!(run.max_duplicate_ratio, 0.25);
        assert!(run.enforce_duplicate_quota);
    }
}
