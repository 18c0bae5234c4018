//! Multi-epoch sampling campaigns and the duplicate quota.

use log::{debug, info, warn};
use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{HarnessError, HarnessResult};
use crate::executor::{check_batch_size, execute_batch};
use crate::node::RngNode;
use crate::rng::TestRng;
use crate::sampler::{RngFunctions, SampleRequest, MAX_BITS, MIN_BITS};
use crate::validator::{max_value, validate_batch};

/// Batch size used when a campaign does not ask for one
pub const DEFAULT_BATCH_SIZE: usize = 1;

/// Denominator of the random fractions used to place a range
pub const RANGE_PRECISION: u32 = 10_000;

/// Widths up to this one get a coverage based duplicate quota
pub const COVERAGE_QUOTA_MAX_BITS: u32 = 32;

/// Settings shared by every campaign of a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub repeat_count: u32,
    pub max_duplicate_ratio: f64,
    #[serde(default)]
    pub enforce_duplicate_quota: bool,
}

impl RunConfiguration {
    pub fn new(repeat_count: u32, max_duplicate_ratio: f64) -> Self {
        Self {
            repeat_count,
            max_duplicate_ratio,
            enforce_duplicate_quota: false,
        }
    }

    pub fn with_quota_enforced(mut self, enforce: bool) -> Self {
        self.enforce_duplicate_quota = enforce;
        self
    }
}

/// Outcome of a successful campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    pub bits: u32,
    pub ranged: bool,
    pub batch_size: usize,
    pub epochs: u64,
    pub samples: usize,
    pub duplicate_count: u64,
    pub duplicate_quota: u64,
    pub quota_enforced: bool,
    pub values: Vec<U256>,
}

impl CampaignReport {
    pub fn quota_exceeded(&self) -> bool {
        self.duplicate_count > self.duplicate_quota
    }
}

/// Number of epochs needed to draw `repeat_count` values `batch_size` at a time.
pub fn epoch_count(repeat_count: u32, batch_size: usize) -> HarnessResult<u64> {
    check_batch_size(batch_size)?;
    Ok((repeat_count as u64).div_ceil(batch_size as u64))
}

/// Sum over distinct values of `occurrences - 1`.
pub fn count_dupes(values: &[U256]) -> u64 {
    let mut counts: HashMap<U256, u64> = HashMap::with_capacity(values.len());
    for value in values {
        *counts.entry(*value).or_insert(0) += 1;
    }
    counts.values().map(|count| count - 1).sum()
}

/// Maximum tolerated duplicate count for a campaign.
///
/// Up to 32 bits the quota scales with the share of the value space the
/// campaign covers: `ceil(repeat * ratio * repeat / 2^bits)`. Wider values
/// fall back to one percent of the sample count.
pub fn duplicate_quota(repeat_count: u32, max_duplicate_ratio: f64, bits: u32) -> u64 {
    let repeat = repeat_count as f64;
    if bits <= COVERAGE_QUOTA_MAX_BITS {
        let coverage = repeat / 2f64.powi(bits as i32);
        (repeat * max_duplicate_ratio * coverage).ceil() as u64
    } else {
        (repeat / 100.0).ceil() as u64
    }
}

// floor(value * numerator / RANGE_PRECISION), never above `value`
fn scale(value: U256, numerator: u32) -> U256 {
    let scaled = value.full_mul(U256::from(numerator)) / U512::from(RANGE_PRECISION as u64);
    U256::try_from(scaled).unwrap_or(value)
}

/// Places a random sub-range inside `[0, max_value(bits)]`.
///
/// Returns `(range_min, range_max)` with `range_min <= range_max`. Both may be
/// zero, in which case the epoch runs as an unbounded draw.
pub fn generate_range(bits: u32, rng: &TestRng) -> (U256, U256) {
    let max_val = max_value(bits);
    let min_mul = rng.gen_range(0..RANGE_PRECISION);
    let max_mul = rng.gen_range(0..RANGE_PRECISION);

    let range_min = scale(max_val, min_mul);
    let range_max = range_min + scale(max_val - range_min, max_mul);
    (range_min, range_max)
}

/// Drives sampling campaigns against one node.
pub struct CampaignRunner<N: RngNode> {
    node: N,
    functions: RngFunctions,
    config: RunConfiguration,
    rng: TestRng,
}

impl<N: RngNode> CampaignRunner<N> {
    pub fn new(node: N, functions: RngFunctions, config: RunConfiguration, rng: TestRng) -> Self {
        Self {
            node,
            functions,
            config,
            rng,
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn functions(&self) -> &RngFunctions {
        &self.functions
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    pub fn rng(&self) -> &TestRng {
        &self.rng
    }

    /// Runs `ceil(repeat_count / batch_size)` epochs of `bits`-wide draws.
    ///
    /// Each epoch gets a fresh random range when `ranged` is set. The first
    /// epoch with an invalid result aborts the campaign, listing every
    /// failure of that epoch.
    pub async fn test_rng(
        &self,
        bits: u32,
        ranged: bool,
        batch_size: usize,
    ) -> HarnessResult<CampaignReport> {
        let result = self.run(bits, ranged, batch_size).await;
        if result.is_err() {
            self.rng.on_failure();
        }
        result
    }

    async fn run(
        &self,
        bits: u32,
        ranged: bool,
        batch_size: usize,
    ) -> HarnessResult<CampaignReport> {
        let epochs = epoch_count(self.config.repeat_count, batch_size)?;
        // A ranged epoch whose range collapses to (0, 0) draws unbounded
        let mut probes = vec![SampleRequest::unbounded(bits)];
        if ranged {
            probes.insert(0, SampleRequest::new(bits, U256::one(), U256::one()));
        }
        if bits < MIN_BITS || bits > MAX_BITS {
            return Err(HarnessError::UnsupportedBitWidth {
                bits,
                kind: probes[0].kind(),
            });
        }
        for probe in &probes {
            self.functions.resolve(probe)?;
        }

        if log::log_enabled!(log::Level::Info) {
            info!(
                "Starting {} campaign: {} bits, {} sample(s), {} epoch(s) of {}",
                if ranged { "ranged" } else { "unbounded" },
                bits,
                self.config.repeat_count,
                epochs,
                batch_size
            );
        }

        let mut values = Vec::with_capacity(self.config.repeat_count as usize);
        for epoch in 0..epochs {
            let (range_min, range_max) = if ranged {
                generate_range(bits, &self.rng)
            } else {
                (U256::zero(), U256::zero())
            };
            let request = SampleRequest::new(bits, range_min, range_max);

            if log::log_enabled!(log::Level::Debug) {
                debug!("Epoch {}/{}: range {}", epoch + 1, epochs, request.range);
            }

            let results = execute_batch(&self.node, &self.functions, &request, batch_size).await?;
            let failures = validate_batch(&results, &request);
            if !failures.is_empty() {
                return Err(HarnessError::Validation {
                    epoch: epoch as u32,
                    failures,
                });
            }

            values.extend(results.iter().map(|r| r.random_val));
        }

        let duplicate_count = count_dupes(&values);
        let quota = duplicate_quota(
            self.config.repeat_count,
            self.config.max_duplicate_ratio,
            bits,
        );

        if log::log_enabled!(log::Level::Debug) {
            debug!("DupeCount: {} DupeQuota: {}", duplicate_count, quota);
        }

        if duplicate_count > quota {
            if self.config.enforce_duplicate_quota {
                return Err(HarnessError::DuplicateQuotaExceeded {
                    duplicates: duplicate_count,
                    quota,
                });
            }
            warn!(
                "{} duplicate(s) over a quota of {} for {} bits, not enforced",
                duplicate_count, quota, bits
            );
        }

        let report = CampaignReport {
            bits,
            ranged,
            batch_size,
            epochs,
            samples: values.len(),
            duplicate_count,
            duplicate_quota: quota,
            quota_enforced: self.config.enforce_duplicate_quota,
            values,
        };

        if log::log_enabled!(log::Level::Info) {
            info!(
                "Campaign finished: {} bits, {} sample(s), {} duplicate(s)",
                bits, report.samples, report.duplicate_count
            );
        }

        Ok(report)
    }
}
