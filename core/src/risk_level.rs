//! Risk level calculator (GTC-45).
//!
//! Converts the three ordinal inputs into a probability level, a risk
//! level and a severity band:
//!
//!   NP = ND × NE
//!   NR = NP × NC
//!   band = first ladder step whose lower bound NR reaches
//!
//! RULE: ND / NE / NC must be members of their discrete sets.
//! Anything else is a ValidationError, never a clamp.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFICIENCY_LEVELS: &[u32] = &[0, 2, 6, 10];
pub const EXPOSURE_LEVELS: &[u32] = &[1, 2, 3, 4];
pub const CONSEQUENCE_LEVELS: &[u32] = &[10, 25, 60, 100];

/// Lower NR bound of every band above I, ascending.
/// This is the only band ladder in the crate.
pub const BAND_LADDER: [(u32, SeverityBand); 4] = [
    (20, SeverityBand::II),
    (40, SeverityBand::III),
    (150, SeverityBand::IV),
    (600, SeverityBand::V),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeverityBand {
    I,
    II,
    III,
    IV,
    V,
}

impl SeverityBand {
    pub const ALL: [SeverityBand; 5] = [Self::I, Self::II, Self::III, Self::IV, Self::V];

    pub fn from_nr(nr: u32) -> Self {
        BAND_LADDER
            .iter()
            .rev()
            .find(|(floor, _)| nr >= *floor)
            .map(|(_, band)| *band)
            .unwrap_or(SeverityBand::I)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::I => "I",
            Self::II => "II",
            Self::III => "III",
            Self::IV => "IV",
            Self::V => "V",
        }
    }

    pub fn interpretation(&self) -> &'static str {
        match self {
            Self::I => "Acceptable: keep existing controls and monitor",
            Self::II => "Tolerable: improve controls where feasible",
            Self::III => "Moderate: strengthen controls within a defined period",
            Self::IV => "High: corrective action required promptly",
            Self::V => "Critical: suspend the activity until the risk is controlled",
        }
    }
}

impl fmt::Display for SeverityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete, unvalidated ND / NE / NC triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RiskLevels {
    pub nd: u32,
    pub ne: u32,
    pub nc: u32,
}

impl RiskLevels {
    /// Build a validated triple.
    pub fn new(nd: u32, ne: u32, nc: u32) -> Result<Self, ValidationError> {
        let levels = Self { nd, ne, nc };
        levels.validate()?;
        Ok(levels)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_member("nd", self.nd, DEFICIENCY_LEVELS)?;
        check_member("ne", self.ne, EXPOSURE_LEVELS)?;
        check_member("nc", self.nc, CONSEQUENCE_LEVELS)?;
        Ok(())
    }

    /// NP. Meaningful only for validated levels.
    pub fn probability(&self) -> u32 {
        self.nd * self.ne
    }

    /// NR. Meaningful only for validated levels.
    pub fn risk(&self) -> u32 {
        self.probability() * self.nc
    }

    pub fn assess(&self) -> Result<RiskAssessment, ValidationError> {
        self.validate()?;
        let np = self.probability();
        let nr = np * self.nc;
        let band = SeverityBand::from_nr(nr);
        Ok(RiskAssessment {
            levels: *self,
            np,
            nr,
            band,
            interpretation: band.interpretation().to_string(),
        })
    }
}

impl fmt::Display for RiskLevels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ND={} NE={} NC={}", self.nd, self.ne, self.nc)
    }
}

/// Result of the calculator for one validated triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub levels: RiskLevels,
    pub np: u32,
    pub nr: u32,
    pub band: SeverityBand,
    pub interpretation: String,
}

/// Risk levels as captured from an evaluator; any field may be unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskInput {
    pub nd: Option<u32>,
    pub ne: Option<u32>,
    pub nc: Option<u32>,
}

impl RiskInput {
    pub fn is_complete(&self) -> bool {
        self.nd.is_some() && self.ne.is_some() && self.nc.is_some()
    }

    /// Check every supplied value against its set. Unset fields pass.
    pub fn validate_supplied(&self) -> Result<(), ValidationError> {
        if let Some(nd) = self.nd {
            check_member("nd", nd, DEFICIENCY_LEVELS)?;
        }
        if let Some(ne) = self.ne {
            check_member("ne", ne, EXPOSURE_LEVELS)?;
        }
        if let Some(nc) = self.nc {
            check_member("nc", nc, CONSEQUENCE_LEVELS)?;
        }
        Ok(())
    }

    pub fn to_levels(&self) -> Result<RiskLevels, ValidationError> {
        let nd = self.nd.ok_or(ValidationError::Missing { field: "nd" })?;
        let ne = self.ne.ok_or(ValidationError::Missing { field: "ne" })?;
        let nc = self.nc.ok_or(ValidationError::Missing { field: "nc" })?;
        RiskLevels::new(nd, ne, nc)
    }
}

impl From<RiskLevels> for RiskInput {
    fn from(levels: RiskLevels) -> Self {
        Self {
            nd: Some(levels.nd),
            ne: Some(levels.ne),
            nc: Some(levels.nc),
        }
    }
}

/// Calculator entry point for possibly-partial input.
/// A missing field is an error here; ND = 0 is a value, not a gap.
pub fn calculate(input: &RiskInput) -> Result<RiskAssessment, ValidationError> {
    input.to_levels()?.assess()
}

fn check_member(
    field: &'static str,
    value: u32,
    allowed: &'static [u32],
) -> Result<(), ValidationError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfSet {
            field,
            value,
            allowed,
        })
    }
}
