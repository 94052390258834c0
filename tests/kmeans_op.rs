//! Integration tests for the k-means clustering operation.
//!
//! These exercise the operation end to end through the public API: building
//! experiments, estimating, applying, reading back statistics and history,
//! and drawing diagnostic views.

use cytoflow_kmeans::core::{Column, Experiment, GroupKey, Value};
use cytoflow_kmeans::error::CytoflowError;
use cytoflow_kmeans::operations::{BoxedOperation, KMeansOp, Operation, KMEANS_ID};
use cytoflow_kmeans::transform::ScaleKind;
use cytoflow_kmeans::utils::finite_range;
use cytoflow_kmeans::views::{Mark, PlotSurface};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Events drawn uniformly around a set of centers, in round-robin order.
fn blobs(centers: &[f64], spread: f64, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| centers[i % centers.len()] + rng.gen_range(-spread..spread))
        .collect()
}

fn labels<'a>(ex: &'a Experiment, name: &str) -> &'a [String] {
    match ex.column(name) {
        Some(Column::Categorical(values)) => values,
        other => panic!("expected categorical column {name}, got {other:?}"),
    }
}

/// A two-channel, two-well experiment resembling a dose response.
fn dose_response() -> Experiment {
    let n = 400;
    let fitc = blobs(&[200.0, 5000.0], 50.0, n, 1);
    let pe: Vec<f64> = blobs(&[-30.0, 80.0, 3000.0, 3200.0], 20.0, n, 2);
    let well: Vec<String> = (0..n)
        .map(|i| if i < n / 2 { "A1" } else { "A2" }.to_string())
        .collect();
    let dox: Vec<f64> = (0..n).map(|i| if i < n / 2 { 0.0 } else { 10.0 }).collect();

    Experiment::builder()
        .channel("FITC-A", fitc)
        .channel("PE-A", pe)
        .range("FITC-A", 262_144.0)
        .range("PE-A", 262_144.0)
        .condition("Well", Column::Categorical(well))
        .condition("Dox", Column::Numeric(dox))
        .build()
        .unwrap()
}

// ==================== scenarios ====================

#[test]
fn single_channel_two_clusters() {
    let ex = Experiment::builder()
        .channel("X", blobs(&[10.0, 100.0], 2.0, 100, 7))
        .build()
        .unwrap();

    let mut op = KMeansOp::new("Clust").channels(["X"]).num_clusters(2);
    op.estimate(&ex, None).unwrap();
    assert_eq!(op.models().len(), 1);

    let clustered = op.apply(&ex).unwrap();
    let labels = labels(&clustered, "Clust");
    assert_eq!(labels.len(), 100);
    assert!(labels
        .iter()
        .all(|l| ["Clust_1", "Clust_2", "Clust_None"].contains(&l.as_str())));

    let centers = clustered.statistic("Clust", "centers").unwrap();
    assert_eq!(centers.len(), 2);
}

#[test]
fn one_cluster_is_rejected() {
    let ex = Experiment::builder()
        .channel("X", blobs(&[10.0], 1.0, 20, 3))
        .build()
        .unwrap();
    let mut op = KMeansOp::new("Clust").channels(["X"]).num_clusters(1);
    assert_eq!(
        op.estimate(&ex, None).unwrap_err(),
        CytoflowError::InvalidClusterCount(1)
    );
}

#[test]
fn missing_channel_fails_estimate_and_apply() {
    let ex = dose_response();
    let mut op = KMeansOp::new("Clust").channels(["FITC-A", "APC-A"]);

    let err = op.estimate(&ex, None).unwrap_err();
    assert_eq!(err, CytoflowError::ChannelNotFound("APC-A".to_string()));
    assert!(err.to_string().contains("APC-A"));

    let err = op.apply(&ex).unwrap_err();
    assert_eq!(err, CytoflowError::ChannelNotFound("APC-A".to_string()));
}

#[test]
fn high_cardinality_grouping_fails_estimate_and_apply() {
    let n = 300;
    let ex = Experiment::builder()
        .channel("X", blobs(&[1.0, 50.0], 0.5, n, 5))
        .condition("Time", Column::Numeric((0..n).map(|i| (i % 150) as f64).collect()))
        .build()
        .unwrap();

    let mut op = KMeansOp::new("Clust").channels(["X"]).by(["Time"]);
    let expected = CytoflowError::TooManyValues {
        name: "Time".to_string(),
        limit: 100,
    };
    assert_eq!(op.estimate(&ex, None).unwrap_err(), expected);
    assert_eq!(op.apply(&ex).unwrap_err(), expected);
}

// ==================== grouped workflows ====================

#[test]
fn grouped_logicle_clustering() {
    let ex = dose_response();
    let mut op = KMeansOp::new("Pop")
        .channels(["FITC-A", "PE-A"])
        .default_scale(ScaleKind::Logicle)
        .num_clusters(2)
        .by(["Well"]);
    op.estimate(&ex, None).unwrap();
    assert_eq!(op.models().len(), 2);

    let clustered = op.apply(&ex).unwrap();

    // logicle maps every finite event, so nothing goes unscored
    let labels = labels(&clustered, "Pop");
    assert!(labels.iter().all(|l| l == "Pop_1" || l == "Pop_2"));

    let centers = clustered.statistic("Pop", "centers").unwrap();
    assert_eq!(centers.index_names(), ["Well", "Cluster", "Channel"]);
    assert_eq!(centers.len(), 2 * 2 * 2);

    let a1 = centers.xs("Well", &Value::from("A1")).unwrap();
    assert_eq!(a1.len(), 4);
    let key = [Value::from(1usize), Value::from("FITC-A")];
    assert!(a1.get(&key).is_some());
}

#[test]
fn numeric_grouping_and_subset() {
    let ex = dose_response();
    let mut op = KMeansOp::new("Pop")
        .channels(["FITC-A"])
        .scale("FITC-A", ScaleKind::Log)
        .by(["Dox"]);
    op.estimate(&ex, Some("Dox == 10 and Well == 'A2'")).unwrap();

    assert_eq!(op.models().len(), 1);
    assert!(op.model(&GroupKey(vec![Value::from(10.0)])).is_some());

    // the uninduced group was never fit and stays unlabelled
    let clustered = op.apply(&ex).unwrap();
    let labels = labels(&clustered, "Pop");
    assert!(labels[..200].iter().all(|l| l == "Pop_None"));
    assert!(labels[200..].iter().all(|l| l != "Pop_None"));
}

#[test]
fn negative_events_dropped_on_log_scale() {
    let ex = dose_response();
    let pe = ex.numeric("PE-A").unwrap().to_vec();

    let mut op = KMeansOp::new("Pop")
        .channels(["PE-A"])
        .scale("PE-A", ScaleKind::Log)
        .num_clusters(3);
    op.estimate(&ex, None).unwrap();
    let clustered = op.apply(&ex).unwrap();

    for (value, label) in pe.iter().zip(labels(&clustered, "Pop")) {
        assert_eq!(*value <= 0.0, label == "Pop_None", "{value} -> {label}");
    }
}

// ==================== operation contract ====================

#[test]
fn boxed_operations() {
    let ex = dose_response();
    let mut op: BoxedOperation = Box::new(KMeansOp::new("Pop").channels(["FITC-A"]));
    assert_eq!(op.id(), KMEANS_ID);

    op.estimate(&ex, None).unwrap();
    let clustered = op.apply(&ex).unwrap();
    assert!(clustered.has_column("Pop"));
}

#[test]
fn chained_operations_keep_history() {
    let ex = dose_response();

    let mut first = KMeansOp::new("Coarse").channels(["FITC-A"]);
    first.estimate(&ex, None).unwrap();
    let once = first.apply(&ex).unwrap();

    let mut second = KMeansOp::new("Fine")
        .channels(["FITC-A", "PE-A"])
        .num_clusters(4)
        .by(["Coarse"]);
    second.estimate(&once, None).unwrap();
    let twice = second.apply(&once).unwrap();

    assert_eq!(twice.history().len(), 2);
    assert!(twice.statistic("Coarse", "centers").is_some());
    assert!(twice.statistic("Fine", "centers").is_some());

    let replay = KMeansOp::from_record(&twice.history()[1]).unwrap();
    assert_eq!(replay, second);

    // applying twice under one name is a usage error
    assert_eq!(
        second.apply(&twice).unwrap_err(),
        CytoflowError::DuplicateColumn("Fine".to_string())
    );
}

#[test]
fn centers_within_channel_range() {
    let ex = dose_response();
    let mut op = KMeansOp::new("Pop")
        .channels(["FITC-A", "PE-A"])
        .default_scale(ScaleKind::Logicle)
        .num_clusters(3);
    op.estimate(&ex, None).unwrap();
    let clustered = op.apply(&ex).unwrap();

    let centers = clustered.statistic("Pop", "centers").unwrap();
    assert_eq!(centers.len(), 3 * 2);
    for (key, value) in centers.iter() {
        let channel = key[1].as_text().unwrap();
        let (lo, hi) = finite_range(ex.numeric(channel).unwrap()).unwrap();
        assert!(value.is_finite());
        assert!(value >= lo - 1e-6 && value <= hi + 1e-6, "{channel}: {value}");
    }
}

// ==================== views ====================

#[derive(Default)]
struct Canvas {
    facets: usize,
    lines: Vec<f64>,
    stars: Vec<(f64, f64)>,
}

impl PlotSurface for Canvas {
    fn begin_facet(&mut self, _group: &GroupKey) {
        self.facets += 1;
    }

    fn vertical_line(&mut self, x: f64) {
        self.lines.push(x);
    }

    fn star(&mut self, x: f64, y: f64) {
        self.stars.push((x, y));
    }
}

#[test]
fn diagnostic_views_draw_centers() {
    let ex = dose_response();
    let mut op = KMeansOp::new("Pop")
        .channels(["FITC-A", "PE-A"])
        .by(["Well"]);
    op.estimate(&ex, None).unwrap();

    let mut canvas = Canvas::default();
    op.default_view().unwrap().draw_centroids(&mut canvas).unwrap();
    assert_eq!(canvas.facets, 2);
    assert_eq!(canvas.stars.len(), 4);
    assert!(canvas.lines.is_empty());

    let mut canvas = Canvas::default();
    let view = op.view(&["PE-A"], &Default::default()).unwrap();
    view.draw_centroids(&mut canvas).unwrap();
    assert_eq!(canvas.lines.len(), 4);

    let marks = view
        .centroid_marks(&GroupKey(vec![Value::from("A1")]))
        .unwrap();
    assert!(marks.iter().all(|m| matches!(m, Mark::VerticalLine { .. })));
}
