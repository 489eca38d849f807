//! Vitals readings and the health insights derived from them.

use crate::profile::FieldValue;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VitalsParseError {
    #[error("blood pressure must look like 120/80, got {0:?}")]
    BloodPressure(String),
    #[error("stress level must be Low, Moderate or High, got {0:?}")]
    StressLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

impl BloodPressure {
    pub const NORMAL: BloodPressure = BloodPressure { systolic: 120, diastolic: 80 };
}

impl fmt::Display for BloodPressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.systolic, self.diastolic)
    }
}

impl FromStr for BloodPressure {
    type Err = VitalsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || VitalsParseError::BloodPressure(s.to_string());
        let (sys, dia) = s.trim().split_once('/').ok_or_else(bad)?;
        Ok(Self {
            systolic: sys.trim().parse().map_err(|_| bad())?,
            diastolic: dia.trim().parse().map_err(|_| bad())?,
        })
    }
}

impl From<BloodPressure> for String {
    fn from(bp: BloodPressure) -> Self {
        bp.to_string()
    }
}

impl TryFrom<String> for BloodPressure {
    type Error = VitalsParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    Low,
    Moderate,
    High,
}

impl fmt::Display for StressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StressLevel::Low => "Low",
            StressLevel::Moderate => "Moderate",
            StressLevel::High => "High",
        })
    }
}

impl FromStr for StressLevel {
    type Err = VitalsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(StressLevel::Low),
            "moderate" => Ok(StressLevel::Moderate),
            "high" => Ok(StressLevel::High),
            _ => Err(VitalsParseError::StressLevel(s.to_string())),
        }
    }
}

/// One vitals reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    pub heart_rate: u32,
    pub blood_pressure: BloodPressure,
    pub respiratory_rate: u32,
    pub stress_level: StressLevel,
    pub bmi: f64,
    pub oxygen_saturation: u32,
    pub timestamp: DateTime<Local>,
}

impl VitalsSnapshot {
    /// Store columns and values written on check-in.
    pub fn store_fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("Heart Rate", FieldValue::Integer(self.heart_rate.into())),
            ("Blood Pressure", FieldValue::Text(self.blood_pressure.to_string())),
            ("Respiratory Rate", FieldValue::Integer(self.respiratory_rate.into())),
            ("Stress Level", FieldValue::Text(self.stress_level.to_string())),
            ("BMI", FieldValue::Real(self.bmi)),
            ("Oxygen Saturation", FieldValue::Integer(self.oxygen_saturation.into())),
        ]
    }
}

/// Producer of vitals readings.
pub trait VitalsSource {
    fn generate(&mut self) -> VitalsSnapshot;
}

/// Placeholder source returning one fixed, normal reading. No sensor is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedVitals;

impl VitalsSource for SimulatedVitals {
    fn generate(&mut self) -> VitalsSnapshot {
        VitalsSnapshot {
            heart_rate: 72,
            blood_pressure: BloodPressure::NORMAL,
            respiratory_rate: 16,
            stress_level: StressLevel::Low,
            bmi: 24.5,
            oxygen_saturation: 98,
            timestamp: Local::now(),
        }
    }
}

/// A health observation shown on the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Insight {
    HeartRateOutOfRange,
    BloodPressureAbnormal,
    Overweight,
    Underweight,
    HighStress,
    LowOxygen,
    AllNormal,
}

impl Insight {
    pub fn message(&self) -> &'static str {
        match self {
            Insight::HeartRateOutOfRange => {
                "Your heart rate is outside the normal range. Consider consulting a healthcare professional."
            }
            Insight::BloodPressureAbnormal => "Your blood pressure might need attention. Consult with your doctor.",
            Insight::Overweight => {
                "Your BMI suggests you might be overweight. Consider discussing a healthy lifestyle plan."
            }
            Insight::Underweight => "Your BMI suggests you might be underweight. Consult a nutritionist.",
            Insight::HighStress => "Your stress levels seem elevated. Consider stress management techniques.",
            Insight::LowOxygen => {
                "Your oxygen saturation is lower than optimal. This may require medical attention."
            }
            Insight::AllNormal => "Your vitals look great! Keep up the good work.",
        }
    }
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Rule-based insights, in a fixed order. Never empty.
pub fn derive_insights(vitals: &VitalsSnapshot) -> Vec<Insight> {
    let mut insights = Vec::new();

    if vitals.heart_rate > 100 || vitals.heart_rate < 60 {
        insights.push(Insight::HeartRateOutOfRange);
    }
    if vitals.blood_pressure != BloodPressure::NORMAL {
        insights.push(Insight::BloodPressureAbnormal);
    }
    if vitals.bmi > 25.0 {
        insights.push(Insight::Overweight);
    } else if vitals.bmi < 18.5 {
        insights.push(Insight::Underweight);
    }
    if vitals.stress_level == StressLevel::High {
        insights.push(Insight::HighStress);
    }
    if vitals.oxygen_saturation < 95 {
        insights.push(Insight::LowOxygen);
    }

    if insights.is_empty() {
        insights.push(Insight::AllNormal);
    }
    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal() -> VitalsSnapshot {
        SimulatedVitals.generate()
    }

    #[test]
    fn test_simulated_reading_is_all_normal() {
        assert_eq!(derive_insights(&normal()), vec![Insight::AllNormal]);
    }

    #[test]
    fn test_rules_fire_in_order() {
        let vitals = VitalsSnapshot {
            heart_rate: 110,
            blood_pressure: BloodPressure { systolic: 140, diastolic: 90 },
            stress_level: StressLevel::High,
            bmi: 31.0,
            oxygen_saturation: 91,
            ..normal()
        };
        assert_eq!(
            derive_insights(&vitals),
            vec![
                Insight::HeartRateOutOfRange,
                Insight::BloodPressureAbnormal,
                Insight::Overweight,
                Insight::HighStress,
                Insight::LowOxygen,
            ]
        );
    }

    #[test]
    fn test_single_rule_readings() {
        let heavy = VitalsSnapshot { bmi: 27.0, ..normal() };
        assert_eq!(derive_insights(&heavy), vec![Insight::Overweight]);

        let racing = VitalsSnapshot { heart_rate: 110, oxygen_saturation: 90, ..normal() };
        assert_eq!(derive_insights(&racing), vec![Insight::HeartRateOutOfRange, Insight::LowOxygen]);
    }

    #[test]
    fn test_boundaries() {
        let at_edges = VitalsSnapshot { heart_rate: 100, bmi: 25.0, oxygen_saturation: 95, ..normal() };
        assert_eq!(derive_insights(&at_edges), vec![Insight::AllNormal]);

        let slow = VitalsSnapshot { heart_rate: 59, ..normal() };
        assert_eq!(derive_insights(&slow), vec![Insight::HeartRateOutOfRange]);

        let thin = VitalsSnapshot { bmi: 18.4, ..normal() };
        assert_eq!(derive_insights(&thin), vec![Insight::Underweight]);
    }

    #[test]
    fn test_blood_pressure_parse_and_display() {
        let bp: BloodPressure = " 135 / 85 ".parse().unwrap();
        assert_eq!(bp, BloodPressure { systolic: 135, diastolic: 85 });
        assert_eq!(bp.to_string(), "135/85");
        assert!("135-85".parse::<BloodPressure>().is_err());
        assert!("high/low".parse::<BloodPressure>().is_err());
    }

    #[test]
    fn test_insight_messages() {
        assert_eq!(Insight::AllNormal.to_string(), "Your vitals look great! Keep up the good work.");
        assert_eq!(
            Insight::HeartRateOutOfRange.message(),
            "Your heart rate is outside the normal range. Consider consulting a healthcare professional."
        );
    }

    #[test]
    fn test_stress_level_parse() {
        assert_eq!("moderate".parse::<StressLevel>(), Ok(StressLevel::Moderate));
        assert!("calm".parse::<StressLevel>().is_err());
    }

    #[test]
    fn test_store_fields() {
        let fields = normal().store_fields();
        let names: Vec<&str> = fields.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec!["Heart Rate", "Blood Pressure", "Respiratory Rate", "Stress Level", "BMI", "Oxygen Saturation"]
        );
        assert_eq!(fields[1].1, FieldValue::Text("120/80".into()));
    }
}
