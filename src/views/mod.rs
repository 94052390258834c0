//! Diagnostic views of fitted operations.
//!
//! Views don't render anything themselves. They compute overlay marks in
//! data coordinates and hand them to a [`PlotSurface`], which owns the
//! underlying plot of the event distribution.

mod kmeans;

pub use kmeans::KMeansView;

use crate::core::GroupKey;

/// An overlay mark, in data (not scale) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mark {
    /// A vertical line across a one-channel plot.
    VerticalLine { x: f64 },
    /// A star marker on a two-channel plot.
    Star { x: f64, y: f64 },
}

/// The rendering backend a view draws onto.
pub trait PlotSurface {
    /// Called before the marks of each group's facet.
    fn begin_facet(&mut self, group: &GroupKey) {
        let _ = group;
    }

    fn vertical_line(&mut self, x: f64);

    fn star(&mut self, x: f64, y: f64);

    /// Draw one mark.
    fn mark(&mut self, mark: Mark) {
        match mark {
            Mark::VerticalLine { x } => self.vertical_line(x),
            Mark::Star { x, y } => self.star(x, y),
        }
    }
}
