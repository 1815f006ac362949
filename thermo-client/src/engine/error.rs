/// Distinguishable failure outcomes of the estimation engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no prior {0} available")]
    MissingPriorData(&'static str),
    #[error("{0} is zero; ratio is undefined")]
    DegenerateDenominator(&'static str),
    #[error("meter reading {current} is lower than previous reading {previous}")]
    NonMonotonicMeter { previous: f64, current: f64 },
    #[error("heat-rise calibration undefined at {outdoor_f}°F (must be below {threshold_f}°F)")]
    OutOfDomainCalibration { outdoor_f: f64, threshold_f: f64 },
}

impl EngineError {
    /// Raw (negative) delta carried by a non-monotonic meter error, for callers
    /// that explicitly accept a decrease such as a meter rollover.
    pub fn rejected_delta(&self) -> Option<f64> {
        match self {
            Self::NonMonotonicMeter { previous, current } => Some(current - previous),
            _ => None,
        }
    }
}
