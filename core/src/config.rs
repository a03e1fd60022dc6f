use crate::{
    controls::{string_set, ControlBundle},
    risk_level::SeverityBand,
    types::Months,
};
use serde::{Deserialize, Serialize};

/// NR thresholds at which each control family of a hazard applies.
/// A family applies when NR >= its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub exam_nr: u32,
    pub ppe_nr: u32,
    pub aptitude_nr: u32,
}

impl ThresholdConfig {
    /// Triggers every control family.
    pub fn is_high_severity(&self, nr: u32) -> bool {
        nr >= self.exam_nr.max(self.ppe_nr).max(self.aptitude_nr)
    }

    /// Triggers no control family.
    pub fn is_low_severity(&self, nr: u32) -> bool {
        nr < self.exam_nr.min(self.ppe_nr).min(self.aptitude_nr)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            exam_nr: 41,
            ppe_nr: 121,
            aptitude_nr: 121,
        }
    }
}

/// Re-evaluation interval per severity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandPeriodicity {
    #[serde(rename = "I")]
    pub band_i: Months,
    #[serde(rename = "II")]
    pub band_ii: Months,
    #[serde(rename = "III")]
    pub band_iii: Months,
    #[serde(rename = "IV")]
    pub band_iv: Months,
    #[serde(rename = "V")]
    pub band_v: Months,
}

impl BandPeriodicity {
    pub fn for_band(&self, band: SeverityBand) -> Months {
        match band {
            SeverityBand::I => self.band_i,
            SeverityBand::II => self.band_ii,
            SeverityBand::III => self.band_iii,
            SeverityBand::IV => self.band_iv,
            SeverityBand::V => self.band_v,
        }
    }
}

impl Default for BandPeriodicity {
    fn default() -> Self {
        Self {
            band_i: 36,
            band_ii: 24,
            band_iii: 12,
            band_iv: 12,
            band_v: 6,
        }
    }
}

/// Exams every position receives, whatever its hazards or duties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniversalMinimum {
    pub exam_codes: Vec<String>,
    pub periodicity_months: Months,
    pub justification: String,
}

impl UniversalMinimum {
    pub fn bundle(&self) -> ControlBundle {
        ControlBundle {
            exam_codes: string_set(&self.exam_codes),
            ..ControlBundle::empty(self.justification.clone())
        }
        .with_periodicity(self.periodicity_months)
    }
}

impl Default for UniversalMinimum {
    fn default() -> Self {
        Self {
            exam_codes: vec!["EMO".into(), "OPTO".into()],
            periodicity_months: 36,
            justification: "Universal minimum package: occupational medical exam and optometry \
                            for every position (Res. 2346/2007)"
                .into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Most recent overrides considered by pattern detection.
    pub pattern_window: usize,
    /// Share of the window the largest group must reach.
    pub pattern_min_share: f64,
    /// Fewer overrides than this is never a pattern.
    pub pattern_min_sample: usize,
    /// Hazards with fewer records are not checked for consistency.
    pub inconsistency_min_records: usize,
    /// Coefficient of variation above which a hazard is flagged.
    pub inconsistency_cv: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            pattern_window: 20,
            pattern_min_share: 0.6,
            pattern_min_sample: 3,
            inconsistency_min_records: 3,
            inconsistency_cv: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    pub thresholds: ThresholdConfig,
    pub band_periodicity: BandPeriodicity,
    /// Recorded on hazards whose levels are unset or whose catalog entry is missing.
    pub unconfigured_periodicity_months: Months,
    pub universal_minimum: UniversalMinimum,
    #[serde(default)]
    pub learning: LearningConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let band_periodicity = BandPeriodicity::default();
        Self {
            thresholds: ThresholdConfig::default(),
            unconfigured_periodicity_months: band_periodicity.band_v,
            band_periodicity,
            universal_minimum: UniversalMinimum::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Load from `{data_dir}/controls/control_config.json`.
    /// In tests, use ControlConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/controls/control_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ControlConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.band_periodicity;
        let intervals = [
            p.band_i,
            p.band_ii,
            p.band_iii,
            p.band_iv,
            p.band_v,
            self.unconfigured_periodicity_months,
            self.universal_minimum.periodicity_months,
        ];
        if intervals.iter().any(|m| *m == 0) {
            anyhow::bail!("periodicities must be at least one month");
        }
        if self.learning.pattern_window == 0 || self.learning.pattern_window > 20 {
            anyhow::bail!(
                "learning.pattern_window must be within 1..=20, got {}",
                self.learning.pattern_window
            );
        }
        let share = self.learning.pattern_min_share;
        if !(share > 0.0 && share <= 1.0) {
            anyhow::bail!("learning.pattern_min_share must be within (0, 1], got {share}");
        }
        if self.universal_minimum.exam_codes.is_empty() {
            anyhow::bail!("universal_minimum.exam_codes must not be empty");
        }
        Ok(())
    }
}
