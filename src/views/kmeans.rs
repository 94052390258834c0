//! Cluster-center overlays for the k-means operation.

use super::{Mark, PlotSurface};
use crate::core::GroupKey;
use crate::error::{CytoflowError, Result};
use crate::operations::KMeansOp;
use crate::transform::{Scale, ScaleKind};

/// Diagnostic view of a fitted [`KMeansOp`].
///
/// Built with [`KMeansOp::default_view`] or [`KMeansOp::view`]. The scale
/// kinds are the plot's axis scales; centers are always mapped back through
/// the op's own fitted scales.
#[derive(Debug, Clone)]
pub enum KMeansView<'a> {
    /// Histogram of one channel with a vertical line per center.
    OneChannel {
        op: &'a KMeansOp,
        channel: String,
        scale: ScaleKind,
    },
    /// Scatter plot of two channels with a star per center.
    TwoChannel {
        op: &'a KMeansOp,
        xchannel: String,
        ychannel: String,
        xscale: ScaleKind,
        yscale: ScaleKind,
    },
}

impl<'a> KMeansView<'a> {
    pub fn op(&self) -> &'a KMeansOp {
        match self {
            KMeansView::OneChannel { op, .. } | KMeansView::TwoChannel { op, .. } => *op,
        }
    }

    /// The center marks of one group.
    pub fn centroid_marks(&self, group: &GroupKey) -> Result<Vec<Mark>> {
        let op = self.op();
        if !op.is_estimated() {
            return Err(CytoflowError::NotEstimated);
        }
        let model = op
            .model(group)
            .ok_or_else(|| CytoflowError::View(format!("no model was fit for group {group}")))?;

        match self {
            KMeansView::OneChannel { channel, .. } => {
                let (xi, xscale) = axis(op, channel)?;
                model
                    .cluster_centers()
                    .iter()
                    .map(|center| {
                        coordinate(center, xi, xscale).map(|x| Mark::VerticalLine { x })
                    })
                    .collect()
            }
            KMeansView::TwoChannel {
                xchannel, ychannel, ..
            } => {
                let (xi, xscale) = axis(op, xchannel)?;
                let (yi, yscale) = axis(op, ychannel)?;
                model
                    .cluster_centers()
                    .iter()
                    .map(|center| -> Result<Mark> {
                        Ok(Mark::Star {
                            x: coordinate(center, xi, xscale)?,
                            y: coordinate(center, yi, yscale)?,
                        })
                    })
                    .collect()
            }
        }
    }

    /// Draw the centers of every fitted group, in group order.
    pub fn draw_centroids<P: PlotSurface + ?Sized>(&self, surface: &mut P) -> Result<()> {
        let op = self.op();
        if !op.is_estimated() {
            return Err(CytoflowError::NotEstimated);
        }

        let mut groups: Vec<&GroupKey> = op.models().keys().collect();
        groups.sort();

        for group in groups {
            let marks = self.centroid_marks(group)?;
            surface.begin_facet(group);
            for mark in marks {
                surface.mark(mark);
            }
        }
        Ok(())
    }
}

/// Position of a channel in the op's channels, and its fitted scale.
fn axis<'o>(op: &'o KMeansOp, channel: &str) -> Result<(usize, &'o Scale)> {
    let index = op
        .channels
        .iter()
        .position(|c| c == channel)
        .ok_or_else(|| {
            CytoflowError::View(format!("channel {channel} isn't in the operation's channels"))
        })?;
    let scale = op.scales().get(channel).ok_or(CytoflowError::NotEstimated)?;
    Ok((index, scale))
}

fn coordinate(center: &[f64], index: usize, scale: &Scale) -> Result<f64> {
    center
        .get(index)
        .map(|&y| scale.inverse(y))
        .ok_or(CytoflowError::NotEstimated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, Experiment, Value};
    use crate::operations::Operation;
    use approx::assert_relative_eq;

    #[derive(Debug, Default)]
    struct Recorder {
        facets: Vec<GroupKey>,
        marks: Vec<Mark>,
    }

    impl PlotSurface for Recorder {
        fn begin_facet(&mut self, group: &GroupKey) {
            self.facets.push(group.clone());
        }

        fn vertical_line(&mut self, x: f64) {
            self.marks.push(Mark::VerticalLine { x });
        }

        fn star(&mut self, x: f64, y: f64) {
            self.marks.push(Mark::Star { x, y });
        }
    }

    fn experiment() -> Experiment {
        let n = 40;
        let x: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 10.0 } else { 1000.0 }).collect();
        let y: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 5.0 } else { 50.0 }).collect();
        let well: Vec<String> = (0..n)
            .map(|i| if i < n / 2 { "A1" } else { "B1" }.to_string())
            .collect();
        Experiment::builder()
            .channel("X", x)
            .channel("Y", y)
            .condition("Well", Column::Categorical(well))
            .build()
            .unwrap()
    }

    fn fitted(by: &[&str]) -> KMeansOp {
        let mut op = KMeansOp::new("Clust")
            .channels(["X", "Y"])
            .scale("X", ScaleKind::Log)
            .by(by.iter().copied());
        op.estimate(&experiment(), None).unwrap();
        op
    }

    fn x_of(mark: &Mark) -> f64 {
        match *mark {
            Mark::VerticalLine { x } | Mark::Star { x, .. } => x,
        }
    }

    fn sorted_xs(marks: &[Mark]) -> Vec<f64> {
        let mut xs: Vec<f64> = marks.iter().map(x_of).collect();
        xs.sort_by(|a, b| a.total_cmp(b));
        xs
    }

    // ==================== one channel ====================

    #[test]
    fn one_channel_lines_in_data_units() {
        let op = fitted(&[]);
        let view = op.view(&["X"], &Default::default()).unwrap();

        let marks = view.centroid_marks(&GroupKey::all()).unwrap();
        assert_eq!(marks.len(), 2);
        assert!(marks.iter().all(|m| matches!(m, Mark::VerticalLine { .. })));

        let xs = sorted_xs(&marks);
        assert_relative_eq!(xs[0], 10.0, max_relative = 1e-9);
        assert_relative_eq!(xs[1], 1000.0, max_relative = 1e-9);
    }

    // ==================== two channels ====================

    #[test]
    fn two_channel_stars() {
        let op = fitted(&[]);
        let view = op.default_view().unwrap();

        let mut marks = view.centroid_marks(&GroupKey::all()).unwrap();
        marks.sort_by(|a, b| x_of(a).total_cmp(&x_of(b)));
        match (marks[0], marks[1]) {
            (Mark::Star { x: x0, y: y0 }, Mark::Star { x: x1, y: y1 }) => {
                assert_relative_eq!(x0, 10.0, max_relative = 1e-9);
                assert_relative_eq!(y0, 5.0, max_relative = 1e-9);
                assert_relative_eq!(x1, 1000.0, max_relative = 1e-9);
                assert_relative_eq!(y1, 50.0, max_relative = 1e-9);
            }
            other => panic!("expected stars, got {other:?}"),
        }
    }

    // ==================== drawing ====================

    #[test]
    fn draws_each_group_in_order() {
        let op = fitted(&["Well"]);
        let view = op.view(&["Y"], &Default::default()).unwrap();

        let mut surface = Recorder::default();
        view.draw_centroids(&mut surface).unwrap();

        assert_eq!(
            surface.facets,
            vec![
                GroupKey(vec![Value::from("A1")]),
                GroupKey(vec![Value::from("B1")]),
            ]
        );
        assert_eq!(surface.marks.len(), 4);
    }

    #[test]
    fn drawing_needs_estimate() {
        let op = KMeansOp::new("Clust").channels(["X"]);
        let view = op.default_view().unwrap();

        let mut surface = Recorder::default();
        assert_eq!(
            view.draw_centroids(&mut surface).unwrap_err(),
            CytoflowError::NotEstimated
        );
        assert!(surface.facets.is_empty());
    }

    #[test]
    fn unknown_group() {
        let op = fitted(&["Well"]);
        let view = op.default_view().unwrap();
        assert!(matches!(
            view.centroid_marks(&GroupKey(vec![Value::from("C1")])),
            Err(CytoflowError::View(_))
        ));
    }
}
