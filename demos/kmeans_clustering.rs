//! Clustering a two-channel experiment with the k-means operation.
//!
//! Run with: cargo run --example kmeans_clustering

use cytoflow_kmeans::core::{Column, Experiment, GroupKey};
use cytoflow_kmeans::operations::{KMeansOp, Operation};
use cytoflow_kmeans::transform::ScaleKind;
use cytoflow_kmeans::views::PlotSurface;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Prints overlay marks instead of drawing them.
struct TextSurface;

impl PlotSurface for TextSurface {
    fn begin_facet(&mut self, group: &GroupKey) {
        println!("  facet {group}");
    }

    fn vertical_line(&mut self, x: f64) {
        println!("    | x = {x:.1}");
    }

    fn star(&mut self, x: f64, y: f64) {
        println!("    * ({x:.1}, {y:.1})");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== cytoflow-kmeans: k-means clustering ===\n");

    // 1. Simulate two wells with a dim and a bright population each
    let mut rng = StdRng::seed_from_u64(2024);
    let n = 2_000;
    let mut fitc = Vec::with_capacity(n);
    let mut pe = Vec::with_capacity(n);
    let mut well = Vec::with_capacity(n);
    for i in 0..n {
        let bright = rng.gen_bool(0.3);
        let induced = i >= n / 2;
        let level = match (bright, induced) {
            (false, _) => 100.0,
            (true, false) => 2_000.0,
            (true, true) => 8_000.0,
        };
        fitc.push(level * rng.gen_range(0.7..1.3));
        pe.push(rng.gen_range(-80.0..400.0) + if bright { 1_500.0 } else { 0.0 });
        well.push(if induced { "B1" } else { "A1" }.to_string());
    }

    let ex = Experiment::builder()
        .channel("FITC-A", fitc)
        .channel("PE-A", pe)
        .range("FITC-A", 262_144.0)
        .range("PE-A", 262_144.0)
        .condition("Well", Column::Categorical(well))
        .build()
        .unwrap();
    println!("Created experiment with {} events", ex.len());

    // 2. Estimate one model per well on logicle-scaled data
    let mut op = KMeansOp::new("Pop")
        .channels(["FITC-A", "PE-A"])
        .default_scale(ScaleKind::Logicle)
        .num_clusters(2)
        .by(["Well"]);
    op.estimate(&ex, None).unwrap();
    println!("Fitted {} models", op.models().len());

    // 3. Apply: label every event and collect the centers
    let clustered = op.apply(&ex).unwrap();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    if let Some(Column::Categorical(labels)) = clustered.column("Pop") {
        for label in labels {
            *counts.entry(label.as_str()).or_default() += 1;
        }
    }
    println!("\n--- Assignments ---");
    for (label, count) in &counts {
        println!("  {label}: {count}");
    }

    println!("\n--- Centers ---");
    if let Some(centers) = clustered.statistic("Pop", "centers") {
        for (key, value) in centers.iter() {
            let key: Vec<String> = key.iter().map(ToString::to_string).collect();
            println!("  ({}) = {:.1}", key.join(", "), value);
        }
    }

    // 4. Diagnostic views
    println!("\n--- FITC-A histogram overlay ---");
    let view = op.view(&["FITC-A"], &BTreeMap::new()).unwrap();
    view.draw_centroids(&mut TextSurface).unwrap();

    println!("\n--- FITC-A vs PE-A scatter overlay ---");
    op.default_view()
        .unwrap()
        .draw_centroids(&mut TextSurface)
        .unwrap();

    println!("\n=== Done ===");
}
