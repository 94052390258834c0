//! Fitted, invertible channel scales.
//!
//! A scale is fit once over a whole experiment and then reused to map
//! values into the clustering coordinate space and back.

use super::logicle::Logicle;
use crate::core::Experiment;
use crate::error::{CytoflowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default lower bound for [`LogMode::Clip`].
pub const DEFAULT_LOG_THRESHOLD: f64 = 0.1;

/// Which kind of scale to fit for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleKind {
    #[default]
    Linear,
    Log,
    Logicle,
}

impl ScaleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleKind::Linear => "linear",
            ScaleKind::Log => "log",
            ScaleKind::Logicle => "logicle",
        }
    }
}

impl fmt::Display for ScaleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleKind {
    type Err = CytoflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(ScaleKind::Linear),
            "log" => Ok(ScaleKind::Log),
            "logicle" => Ok(ScaleKind::Logicle),
            other => Err(CytoflowError::InvalidParameter(format!(
                "unknown scale '{other}'"
            ))),
        }
    }
}

/// How a log scale treats values at or below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Values `<= 0` become NaN and drop out of the analysis.
    #[default]
    Mask,
    /// Values below the threshold are raised to it.
    Clip,
}

/// A fitted scale transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    /// Identity.
    Linear,
    /// Base-10 logarithm.
    Log { mode: LogMode, threshold: f64 },
    /// Biexponential.
    Logicle(Logicle),
}

impl Scale {
    /// A masking base-10 log scale.
    pub fn log() -> Self {
        Scale::Log {
            mode: LogMode::Mask,
            threshold: DEFAULT_LOG_THRESHOLD,
        }
    }

    /// A clipping base-10 log scale.
    pub fn log_clipped(threshold: f64) -> Result<Self> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(CytoflowError::InvalidParameter(format!(
                "log threshold must be positive, got {threshold}"
            )));
        }
        Ok(Scale::Log {
            mode: LogMode::Clip,
            threshold,
        })
    }

    /// Fit a scale of the given kind to a set of values.
    pub fn fit(kind: ScaleKind, values: &[f64], range: Option<f64>) -> Result<Self> {
        match kind {
            ScaleKind::Linear => Ok(Scale::Linear),
            ScaleKind::Log => Ok(Scale::log()),
            ScaleKind::Logicle => Ok(Scale::Logicle(Logicle::fit(values, range)?)),
        }
    }

    pub fn kind(&self) -> ScaleKind {
        match self {
            Scale::Linear => ScaleKind::Linear,
            Scale::Log { .. } => ScaleKind::Log,
            Scale::Logicle(_) => ScaleKind::Logicle,
        }
    }

    /// Map a data value into scale coordinates.
    ///
    /// Values outside the scale's domain map to NaN.
    pub fn forward(&self, x: f64) -> f64 {
        match self {
            Scale::Linear => x,
            Scale::Log { mode, threshold } => match mode {
                LogMode::Mask => {
                    if x > 0.0 {
                        x.log10()
                    } else {
                        f64::NAN
                    }
                }
                LogMode::Clip => {
                    if x.is_nan() {
                        f64::NAN
                    } else {
                        x.max(*threshold).log10()
                    }
                }
            },
            Scale::Logicle(logicle) => logicle.forward(x),
        }
    }

    /// Map a scale coordinate back to a data value.
    pub fn inverse(&self, y: f64) -> f64 {
        match self {
            Scale::Linear => y,
            Scale::Log { .. } => 10f64.powf(y),
            Scale::Logicle(logicle) => logicle.inverse(y),
        }
    }

    pub fn forward_all(&self, data: &[f64]) -> Vec<f64> {
        data.iter().map(|&x| self.forward(x)).collect()
    }

    pub fn inverse_all(&self, data: &[f64]) -> Vec<f64> {
        data.iter().map(|&y| self.inverse(y)).collect()
    }
}

/// Fit a scale for one channel using all of an experiment's events.
pub fn scale_factory(kind: ScaleKind, experiment: &Experiment, channel: &str) -> Result<Scale> {
    let values = experiment.numeric(channel)?;
    Scale::fit(kind, values, experiment.channel_range(channel))
}
