//! Scale transforms for channel data.
//!
//! Provides linear, logarithmic and logicle scales. Each is fit once over
//! an experiment and is invertible, so cluster centers computed in scale
//! coordinates can be reported in the channel's original units.
//!
//! # Example
//!
//! ```
//! use cytoflow_kmeans::transform::{Scale, ScaleKind};
//!
//! let values = vec![-50.0, 10.0, 100.0, 1000.0, 10000.0];
//! let scale = Scale::fit(ScaleKind::Logicle, &values, None).unwrap();
//!
//! let y = scale.forward(100.0);
//! assert!((scale.inverse(y) - 100.0).abs() < 1e-6);
//!
//! // a log scale can't represent the negative event
//! let log = Scale::fit(ScaleKind::Log, &values, None).unwrap();
//! assert!(log.forward(-50.0).is_nan());
//! ```

pub mod logicle;
pub mod scale;

pub use logicle::Logicle;
pub use scale::{scale_factory, LogMode, Scale, ScaleKind, DEFAULT_LOG_THRESHOLD};
