//! RNG Sampling Harness Library
//!
//! Drives an EVM test node over JSON-RPC to sample the random number
//! functions of a contract, then checks every drawn value against its bit
//! width, its requested range and a duplicate quota.

pub mod abi;
pub mod campaign;
pub mod config;
pub mod error;
pub mod executor;
pub mod logger;
pub mod node;
pub mod rng;
pub mod rpc;
pub mod sampler;
pub mod validator;

pub use abi::{ContractAbi, DecodedEvent};
pub use campaign::{CampaignReport, CampaignRunner, RunConfiguration, DEFAULT_BATCH_SIZE};
pub use config::{CampaignMode, ConfigValidationError, ConfigValidator, HarnessConfig};
pub use error::{HarnessError, HarnessResult, ValidationError, ValidationFailure};
pub use executor::execute_batch;
pub use node::{ContractNode, GasSettings, RngNode};
pub use rng::TestRng;
pub use rpc::{NodeClient, NodeClientConfig};
pub use sampler::{RngFunctions, SampleRange, SampleRequest, SampleResult, SamplerCall, SamplerKind};
pub use validator::{validate_batch, validate_result};
