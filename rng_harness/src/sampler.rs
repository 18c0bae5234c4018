//! Requests, results and the bit-width → contract function tables.
//!
//! A draw is either *unbounded* (only the bit-width ceiling applies) or
//! *bounded* to an additional `[min, max]` sub-range. Each kind is served by
//! its own contract function per bit width and announces its output through
//! its own event.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use crate::abi::DecodedEvent;
use crate::error::{HarnessError, HarnessResult};

/// Event emitted by unbounded draw functions
pub const UNBOUNDED_EVENT: &str = "RandomValueGenerated";
/// Event emitted by range-bounded draw functions
pub const BOUNDED_EVENT: &str = "RandomRangedValueGenerated";

/// Smallest and largest bit width a draw can request
pub const MIN_BITS: u32 = 1;
pub const MAX_BITS: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Unbounded,
    Bounded,
}

impl SamplerKind {
    /// Name of the event carrying the drawn value for this kind
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Unbounded => UNBOUNDED_EVENT,
            Self::Bounded => BOUNDED_EVENT,
        }
    }
}

impl Display for SamplerKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Bounded => write!(f, "bounded"),
        }
    }
}

/// Range constraint of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleRange {
    Unbounded,
    Bounded { min: U256, max: U256 },
}

impl SampleRange {
    /// `(0, 0)` is the unbounded sentinel, anything else is a bounded range.
    pub fn from_bounds(min: U256, max: U256) -> Self {
        if min.is_zero() && max.is_zero() {
            Self::Unbounded
        } else {
            Self::Bounded { min, max }
        }
    }

    pub fn kind(&self) -> SamplerKind {
        match self {
            Self::Unbounded => SamplerKind::Unbounded,
            Self::Bounded { .. } => SamplerKind::Bounded,
        }
    }

    /// Bounds as a pair, `(0, 0)` when unbounded
    pub fn bounds(&self) -> (U256, U256) {
        match self {
            Self::Unbounded => (U256::zero(), U256::zero()),
            Self::Bounded { min, max } => (*min, *max),
        }
    }
}

impl Display for SampleRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Bounded { min, max } => write!(f, "[{}, {}]", min, max),
        }
    }
}

/// One epoch's draw request: a bit width and an optional range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequest {
    pub bits: u32,
    pub range: SampleRange,
}

impl SampleRequest {
    pub fn new(bits: u32, range_min: U256, range_max: U256) -> Self {
        Self {
            bits,
            range: SampleRange::from_bounds(range_min, range_max),
        }
    }

    pub fn unbounded(bits: u32) -> Self {
        Self {
            bits,
            range: SampleRange::Unbounded,
        }
    }

    pub fn range_min(&self) -> U256 {
        self.range.bounds().0
    }

    pub fn range_max(&self) -> U256 {
        self.range.bounds().1
    }

    pub fn kind(&self) -> SamplerKind {
        self.range.kind()
    }
}

/// Decoded outcome of one RNG invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleResult {
    pub event_found: bool,
    pub bits: u32,
    pub random_val: U256,
}

impl SampleResult {
    /// Builds a result from the first event matching `kind`.
    ///
    /// Events of the other kind are ignored. Without a match the result keeps
    /// `event_found = false` and zero defaults, leaving the failure to the
    /// validator.
    pub fn from_events(events: &[DecodedEvent], kind: SamplerKind) -> Self {
        let name = kind.event_name();
        events
            .iter()
            .filter(|event| event.name == name)
            .find_map(|event| {
                let bits = event.uint("bits")?;
                let value = event.uint("value")?;
                Some(Self {
                    event_found: true,
                    bits: if bits > U256::from(u32::MAX) {
                        u32::MAX
                    } else {
                        bits.low_u32()
                    },
                    random_val: value,
                })
            })
            .unwrap_or_default()
    }
}

/// A resolved contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerCall {
    Unbounded {
        bits: u32,
        function: String,
    },
    Bounded {
        bits: u32,
        function: String,
        min: U256,
        max: U256,
    },
}

impl SamplerCall {
    pub fn function(&self) -> &str {
        match self {
            Self::Unbounded { function, .. } | Self::Bounded { function, .. } => function,
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            Self::Unbounded { bits, .. } | Self::Bounded { bits, .. } => *bits,
        }
    }

    pub fn kind(&self) -> SamplerKind {
        match self {
            Self::Unbounded { .. } => SamplerKind::Unbounded,
            Self::Bounded { .. } => SamplerKind::Bounded,
        }
    }

    /// Call arguments in ABI order
    pub fn args(&self) -> Vec<U256> {
        match self {
            Self::Unbounded { .. } => Vec::new(),
            Self::Bounded { min, max, .. } => vec![*min, *max],
        }
    }
}

/// Contract function names keyed by bit width, one table per draw kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngFunctions {
    #[serde(default)]
    pub unbounded: BTreeMap<u32, String>,
    #[serde(default)]
    pub bounded: BTreeMap<u32, String>,
}

impl RngFunctions {
    pub fn new(unbounded: BTreeMap<u32, String>, bounded: BTreeMap<u32, String>) -> Self {
        Self { unbounded, bounded }
    }

    /// Builds both tables from name templates where `{bits}` is replaced by the width,
    /// e.g. `getRandom{bits}` → `getRandom8`, `getRandom16`, ...
    pub fn with_pattern(bits: &[u32], unbounded_pattern: &str, bounded_pattern: &str) -> Self {
        let render = |pattern: &str| -> BTreeMap<u32, String> {
            bits.iter()
                .map(|b| (*b, pattern.replace("{bits}", &b.to_string())))
                .collect()
        };

        Self {
            unbounded: render(unbounded_pattern),
            bounded: render(bounded_pattern),
        }
    }

    pub fn table(&self, kind: SamplerKind) -> &BTreeMap<u32, String> {
        match kind {
            SamplerKind::Unbounded => &self.unbounded,
            SamplerKind::Bounded => &self.bounded,
        }
    }

    pub fn supports(&self, bits: u32, kind: SamplerKind) -> bool {
        self.table(kind).contains_key(&bits)
    }

    /// Every bit width registered in either table
    pub fn bit_widths(&self) -> Vec<u32> {
        self.unbounded
            .keys()
            .chain(self.bounded.keys())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Picks the function serving `request`.
    pub fn resolve(&self, request: &SampleRequest) -> HarnessResult<SamplerCall> {
        let kind = request.kind();
        let function = self
            .table(kind)
            .get(&request.bits)
            .cloned()
            .ok_or(HarnessError::UnsupportedBitWidth {
                bits: request.bits,
                kind,
            })?;

        Ok(match request.range {
            SampleRange::Unbounded => SamplerCall::Unbounded {
                bits: request.bits,
                function,
            },
            SampleRange::Bounded { min, max } => SamplerCall::Bounded {
                bits: request.bits,
                function,
                min,
                max,
            },
        })
    }
}
