//! Bid recommendation extracted from the enriched pipeline state.
//!
//! The bid-calculation handler writes a `decision` data section of the form
//! `{"recommendation": "BID", "max_bid": 142500.0}`. This module is the
//! single point that reads it back out for the run result; absent or
//! malformed data degrades to `Review` (a human looks at the case) with no
//! max bid.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::state::PipelineState;

/// Data section the bid-calculation stage writes its verdict under.
pub const DECISION_SECTION: &str = "decision";

/// Terminal verdict for a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    /// Bid on the property at auction.
    Bid,
    /// Route the case to a human underwriter.
    Review,
    /// Pass on the property.
    Skip,
}

impl Default for Recommendation {
    fn default() -> Self {
        Self::Review
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bid => write!(f, "BID"),
            Self::Review => write!(f, "REVIEW"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

impl FromStr for Recommendation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BID" => Ok(Self::Bid),
            "REVIEW" => Ok(Self::Review),
            "SKIP" => Ok(Self::Skip),
            _ => Err(()),
        }
    }
}

impl Recommendation {
    /// Reads the recommendation from the state's decision section,
    /// defaulting to `Review`.
    #[must_use]
    pub fn from_state(state: &PipelineState) -> Self {
        state
            .data
            .get(DECISION_SECTION)
            .and_then(|section| section.get("recommendation"))
            .and_then(|value| value.as_str())
            .and_then(|text| text.parse().ok())
            .unwrap_or_default()
    }
}

/// Reads the maximum bid from the state's decision section, if present.
#[must_use]
pub fn max_bid(state: &PipelineState) -> Option<f64> {
    state
        .data
        .get(DECISION_SECTION)
        .and_then(|section| section.get("max_bid"))
        .and_then(serde_json::Value::as_f64)
}
