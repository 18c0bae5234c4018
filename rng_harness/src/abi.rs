//! Contract ABI handling: call encoding and receipt log decoding.

use alloy_dyn_abi::{DynSolType, DynSolValue, EventExt, JsonAbiExt, Specifier};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::B256;
use log::{debug, trace};
use primitive_types::U256;
use serde_json::Value;
use std::path::Path;

use crate::error::{HarnessError, HarnessResult};
use crate::rpc::ReceiptLog;
use crate::sampler::SamplerCall;

/// Event decoded from a receipt log, keeping only its unsigned integer arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub name: String,
    pub args: Vec<(String, U256)>,
}

impl DecodedEvent {
    pub fn new<S: Into<String>>(name: S, args: Vec<(String, U256)>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Value of the named unsigned argument
    pub fn uint(&self, name: &str) -> Option<U256> {
        self.args
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| *value)
    }
}

pub fn to_abi_uint(value: U256) -> alloy_primitives::U256 {
    alloy_primitives::U256::from_be_bytes(value.to_big_endian())
}

pub fn from_abi_uint(value: alloy_primitives::U256) -> U256 {
    U256::from_big_endian(&value.to_be_bytes::<32>())
}

/// ABI of the contract exposing the RNG functions.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    abi: JsonAbi,
}

impl ContractAbi {
    pub fn new(abi: JsonAbi) -> Self {
        Self { abi }
    }

    /// Parses either a bare ABI array or a build artifact holding it under `abi`.
    pub fn from_json_str(json: &str) -> HarnessResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| HarnessError::Abi(format!("Invalid JSON: {}", e)))?;

        let abi_value = match value {
            Value::Array(_) => value,
            Value::Object(mut artifact) => artifact
                .remove("abi")
                .ok_or_else(|| HarnessError::Abi("Artifact has no 'abi' field".to_string()))?,
            _ => {
                return Err(HarnessError::Abi(
                    "Expected an ABI array or an artifact object".to_string(),
                ))
            }
        };

        let abi: JsonAbi = serde_json::from_value(abi_value)
            .map_err(|e| HarnessError::Abi(format!("Invalid ABI: {}", e)))?;
        Ok(Self { abi })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            HarnessError::Abi(format!(
                "Failed to read ABI file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.abi.function(name).is_some()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.abi.event(name).is_some()
    }

    /// Overload of `name` taking exactly `arity` inputs
    fn function(&self, name: &str, arity: usize) -> HarnessResult<&Function> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
            .ok_or_else(|| {
                HarnessError::Abi(format!(
                    "Function '{}' with {} argument(s) not found in ABI",
                    name, arity
                ))
            })
    }

    /// Encodes the calldata (selector included) for a sampler call.
    ///
    /// Arguments are encoded with the unsigned width the ABI declares for each input.
    pub fn encode_call(&self, call: &SamplerCall) -> HarnessResult<Vec<u8>> {
        let args = call.args();
        let function = self.function(call.function(), args.len())?;

        let values = function
            .inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| match param.resolve()? {
                DynSolType::Uint(size) => Ok(DynSolValue::Uint(to_abi_uint(arg), size)),
                other => Err(HarnessError::Abi(format!(
                    "Unsupported input type '{}' for parameter '{}' of '{}'",
                    other.sol_type_name(),
                    param.name,
                    function.name
                ))),
            })
            .collect::<HarnessResult<Vec<_>>>()?;

        Ok(function.abi_encode_input(&values)?)
    }

    /// Decodes every log matching a non-anonymous event of the ABI.
    ///
    /// Logs emitted by other contracts or events unknown to the ABI are skipped.
    pub fn decode_logs(&self, logs: &[ReceiptLog]) -> Vec<DecodedEvent> {
        logs.iter().filter_map(|log| self.decode_log(log)).collect()
    }

    fn decode_log(&self, log: &ReceiptLog) -> Option<DecodedEvent> {
        let topic0: B256 = *log.topics.first()?;
        let event = self
            .abi
            .events()
            .find(|event| !event.anonymous && event.selector() == topic0)?;

        let decoded = match event.decode_log_parts(log.topics.iter().copied(), &log.data, true) {
            Ok(decoded) => decoded,
            Err(e) => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("Failed to decode log as '{}': {}", event.name, e);
                }
                return None;
            }
        };

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let args = event
            .inputs
            .iter()
            .filter_map(|param| {
                let value = if param.indexed {
                    indexed.next()
                } else {
                    body.next()
                }?;
                value
                    .as_uint()
                    .map(|(v, _)| (param.name.clone(), from_abi_uint(v)))
            })
            .collect();

        if log::log_enabled!(log::Level::Trace) {
            trace!("decoded event {} from log", event.name);
        }
        Some(DecodedEvent::new(event.name.clone(), args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{keccak256, Address, Bytes};

    const ABI_JSON: &str = r#"[
        {"type":"function","name":"getRandom8","inputs":[],"outputs":[],"stateMutability":"nonpayable"},
        {"type":"function","name":"getRandomRange8","inputs":[
            {"name":"min","type":"uint8","internalType":"uint8"},
            {"name":"max","type":"uint8","internalType":"uint8"}
        ],"outputs":[],"stateMutability":"nonpayable"},
        {"type":"event","name":"RandomValueGenerated","anonymous":false,"inputs":[
            {"name":"bits","type":"uint16","indexed":false,"internalType":"uint16"},
            {"name":"value","type":"uint256","indexed":false,"internalType":"uint256"}
        ]},
        {"type":"event","name":"RandomRangedValueGenerated","anonymous":false,"inputs":[
            {"name":"bits","type":"uint16","indexed":true,"internalType":"uint16"},
            {"name":"value","type":"uint256","indexed":false,"internalType":"uint256"}
        ]}
    ]"#;

    fn word(value: u64) -> [u8; 32] {
        U256::from(value).to_big_endian()
    }

    fn log(topics: Vec<B256>, data: Vec<u8>) -> ReceiptLog {
        ReceiptLog {
            address: Address::ZERO,
            topics,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_load_bare_and_artifact() {
        let abi = ContractAbi::from_json_str(ABI_JSON).unwrap();
        assert!(abi.has_function("getRandom8"));
        assert!(abi.has_event("RandomRangedValueGenerated"));

        let artifact = format!(r#"{{"contractName":"RNG","abi":{}}}"#, ABI_JSON);
        let abi = ContractAbi::from_json_str(&artifact).unwrap();
        assert!(abi.has_function("getRandomRange8"));

        assert!(ContractAbi::from_json_str(r#"{"contractName":"RNG"}"#).is_err());
        assert!(ContractAbi::from_json_str("42").is_err());
    }

    #[test]
    fn test_encode_unbounded_call_is_selector_only() {
        let abi = ContractAbi::from_json_str(ABI_JSON).unwrap();
        let call = SamplerCall::Unbounded {
            bits: 8,
            function: "getRandom8".to_string(),
        };

        let data = abi.encode_call(&call).unwrap();
        assert_eq!(data, keccak256("getRandom8()".as_bytes())[..4].to_vec());
    }

    #[test]
    fn test_encode_bounded_call_uses_declared_width() {
        let abi = ContractAbi::from_json_str(ABI_JSON).unwrap();
        let call = SamplerCall::Bounded {
            bits: 8,
            function: "getRandomRange8".to_string(),
            min: U256::from(3u64),
            max: U256::from(250u64),
        };

        let data = abi.encode_call(&call).unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(
            &data[..4],
            &keccak256("getRandomRange8(uint8,uint8)".as_bytes())[..4]
        );
        assert_eq!(&data[4..36], &word(3));
        assert_eq!(&data[36..68], &word(250));
    }

    #[test]
    fn test_encode_unknown_function() {
        let abi = ContractAbi::from_json_str(ABI_JSON).unwrap();
        let call = SamplerCall::Unbounded {
            bits: 64,
            function: "getRandom64".to_string(),
        };
        assert!(matches!(abi.encode_call(&call), Err(HarnessError::Abi(_))));
    }

    #[test]
    fn test_decode_body_and_indexed_arguments() {
        let abi = ContractAbi::from_json_str(ABI_JSON).unwrap();

        let unbounded = keccak256("RandomValueGenerated(uint16,uint256)".as_bytes());
        let mut data = word(8).to_vec();
        data.extend_from_slice(&word(201));

        let ranged = keccak256("RandomRangedValueGenerated(uint16,uint256)".as_bytes());
        let bits_topic = B256::from(word(16));

        let logs = vec![
            log(vec![unbounded], data),
            log(vec![ranged, bits_topic], word(4242).to_vec()),
            // unknown event is skipped
            log(vec![keccak256("Transfer(address,address,uint256)".as_bytes())], vec![]),
        ];

        let events = abi.decode_logs(&logs);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "RandomValueGenerated");
        assert_eq!(events[0].uint("bits"), Some(U256::from(8u64)));
        assert_eq!(events[0].uint("value"), Some(U256::from(201u64)));
        assert_eq!(events[1].name, "RandomRangedValueGenerated");
        assert_eq!(events[1].uint("bits"), Some(U256::from(16u64)));
        assert_eq!(events[1].uint("value"), Some(U256::from(4242u64)));
    }

    #[test]
    fn test_malformed_log_is_skipped() {
        let abi = ContractAbi::from_json_str(ABI_JSON).unwrap();
        let unbounded = keccak256("RandomValueGenerated(uint16,uint256)".as_bytes());
        let events = abi.decode_logs(&[log(vec![unbounded], vec![1, 2, 3])]);
        assert!(events.is_empty());
    }

    #[test]
    fn test_uint_conversions_are_lossless() {
        for value in [U256::zero(), U256::from(255u64), U256::MAX] {
            assert_eq!(from_abi_uint(to_abi_uint(value)), value);
        }
    }
}
