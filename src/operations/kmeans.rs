//! K-means clustering operation.
//!
//! Clusters events in one or more channels, optionally fitting a separate
//! model for each combination of grouping conditions. Channels are mapped
//! through a fitted scale before clustering; centers are reported back in
//! the channel's original units.
//!
//! `estimate` learns the scales and per-group models. `apply` labels each
//! event `{name}_{cluster}` (1-based), or `{name}_None` if the event could
//! not be scored, and stores the centers as the statistic
//! `(name, "centers")` indexed by `[by..., "Cluster", "Channel"]`.

use super::Operation;
use crate::clustering::{kmeans, KMeansAlgorithm, KMeansConfig, KMeansModel};
use crate::core::{group_by, Column, Experiment, GroupKey, OperationRecord, Statistic, Value};
use crate::error::{CytoflowError, Result};
use crate::transform::{scale_factory, LogMode, Scale, ScaleKind, DEFAULT_LOG_THRESHOLD};
use crate::views::KMeansView;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Identifier of the k-means operation type.
pub const KMEANS_ID: &str = "edu.mit.synbio.cytoflow.operations.kmeans";

/// Human readable name of the k-means operation type.
pub const KMEANS_FRIENDLY_ID: &str = "KMeans Clustering";

/// Most distinct values a grouping condition may have.
pub const MAX_GROUP_VALUES: usize = 100;

const DEFAULT_NUM_CLUSTERS: usize = 2;
const DEFAULT_SEED: u64 = 314_159;

/// K-means clustering operation.
///
/// # Example
///
/// ```
/// use cytoflow_kmeans::core::Experiment;
/// use cytoflow_kmeans::operations::{KMeansOp, Operation};
///
/// let ex = Experiment::builder()
///     .channel("X", vec![1.0, 1.2, 0.9, 10.0, 10.3, 9.8])
///     .build()
///     .unwrap();
///
/// let mut op = KMeansOp::new("Clust").channels(["X"]).num_clusters(2);
/// op.estimate(&ex, None).unwrap();
/// let clustered = op.apply(&ex).unwrap();
///
/// let centers = clustered.statistic("Clust", "centers").unwrap();
/// assert_eq!(centers.len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansOp {
    /// Name of the assignment column and prefix of its labels
    pub name: String,
    /// Channels to cluster on
    pub channels: Vec<String>,
    /// Per-channel scale overrides
    pub scale: BTreeMap<String, ScaleKind>,
    /// Number of clusters in each group
    pub num_clusters: usize,
    /// Conditions to group by; one model is fit per group
    pub by: Vec<String>,
    /// Scale for channels without an override
    pub default_scale: ScaleKind,
    /// How log-scaled channels treat values at or below zero
    pub log_mode: LogMode,
    /// Seed for center initialization
    pub seed: u64,
    /// K-means variant
    pub algorithm: KMeansAlgorithm,

    #[serde(skip)]
    models: HashMap<GroupKey, KMeansModel>,
    #[serde(skip)]
    scales: HashMap<String, Scale>,
}

impl Default for KMeansOp {
    fn default() -> Self {
        Self {
            name: String::new(),
            channels: Vec::new(),
            scale: BTreeMap::new(),
            num_clusters: DEFAULT_NUM_CLUSTERS,
            by: Vec::new(),
            default_scale: ScaleKind::default(),
            log_mode: LogMode::default(),
            seed: DEFAULT_SEED,
            algorithm: KMeansAlgorithm::default(),
            models: HashMap::new(),
            scales: HashMap::new(),
        }
    }
}

impl PartialEq for KMeansOp {
    /// Compares configuration only; fitted state is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.channels == other.channels
            && self.scale == other.scale
            && self.num_clusters == other.num_clusters
            && self.by == other.by
            && self.default_scale == other.default_scale
            && self.log_mode == other.log_mode
            && self.seed == other.seed
            && self.algorithm == other.algorithm
    }
}

impl KMeansOp {
    /// Create an operation writing to the condition `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the channels to cluster on.
    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Override the scale of one channel.
    pub fn scale(mut self, channel: impl Into<String>, kind: ScaleKind) -> Self {
        self.scale.insert(channel.into(), kind);
        self
    }

    /// Set number of clusters.
    pub fn num_clusters(mut self, num_clusters: usize) -> Self {
        self.num_clusters = num_clusters;
        self
    }

    /// Set the grouping conditions.
    pub fn by<I, S>(mut self, by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.by = by.into_iter().map(Into::into).collect();
        self
    }

    /// Set the scale used for channels without an override.
    pub fn default_scale(mut self, kind: ScaleKind) -> Self {
        self.default_scale = kind;
        self
    }

    /// Set how log-scaled channels treat values at or below zero.
    pub fn log_mode(mut self, mode: LogMode) -> Self {
        self.log_mode = mode;
        self
    }

    /// Set random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the k-means variant.
    pub fn algorithm(mut self, algorithm: KMeansAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Rebuild an (unfitted) operation from a history entry.
    pub fn from_record(record: &OperationRecord) -> Result<Self> {
        if record.id != KMEANS_ID {
            return Err(CytoflowError::InvalidParameter(format!(
                "history entry '{}' is not a k-means operation",
                record.id
            )));
        }
        Ok(serde_json::from_value(record.config.clone())?)
    }

    /// Fitted models, one per group.
    pub fn models(&self) -> &HashMap<GroupKey, KMeansModel> {
        &self.models
    }

    /// The fitted model of one group.
    pub fn model(&self, group: &GroupKey) -> Option<&KMeansModel> {
        self.models.get(group)
    }

    /// Fitted scales, one per channel.
    pub fn scales(&self) -> &HashMap<String, Scale> {
        &self.scales
    }

    pub fn is_estimated(&self) -> bool {
        !self.scales.is_empty()
    }

    /// Diagnostic view of the op's own channels and scale overrides.
    pub fn default_view(&self) -> Result<KMeansView<'_>> {
        self.view(&self.channels, &self.scale)
    }

    /// Diagnostic view of one or two of the op's channels.
    ///
    /// Channels without an entry in `scale` are drawn on the op's
    /// `default_scale`.
    pub fn view<S: AsRef<str>>(
        &self,
        channels: &[S],
        scale: &BTreeMap<String, ScaleKind>,
    ) -> Result<KMeansView<'_>> {
        for c in channels {
            let c: &str = c.as_ref();
            if !self.channels.iter().any(|own| own == c) {
                return Err(CytoflowError::View(format!(
                    "channel {c} isn't in the operation's channels"
                )));
            }
        }
        for c in scale.keys() {
            if !self.channels.contains(c) {
                return Err(CytoflowError::View(format!(
                    "channel {c} isn't in the operation's channels"
                )));
            }
        }

        let scale_of = |c: &str| scale.get(c).copied().unwrap_or(self.default_scale);

        match channels {
            [] => Err(CytoflowError::View(
                "must specify at least one channel for a default view".to_string(),
            )),
            [channel] => {
                let channel: &str = channel.as_ref();
                Ok(KMeansView::OneChannel {
                    op: self,
                    channel: channel.to_string(),
                    scale: scale_of(channel),
                })
            }
            [xchannel, ychannel] => {
                let xchannel: &str = xchannel.as_ref();
                let ychannel: &str = ychannel.as_ref();
                Ok(KMeansView::TwoChannel {
                    op: self,
                    xchannel: xchannel.to_string(),
                    ychannel: ychannel.to_string(),
                    xscale: scale_of(xchannel),
                    yscale: scale_of(ychannel),
                })
            }
            _ => Err(CytoflowError::View(
                "can't specify more than two channels for a default view".to_string(),
            )),
        }
    }

    /// Checks shared by `estimate` and `apply`.
    fn validate(&self, experiment: &Experiment) -> Result<()> {
        if self.channels.is_empty() {
            return Err(CytoflowError::NoChannels);
        }
        for c in &self.channels {
            experiment.numeric(c)?;
        }
        for c in self.scale.keys() {
            if !self.channels.contains(c) {
                return Err(CytoflowError::ScaleWithoutChannel(c.clone()));
            }
        }
        for b in &self.by {
            let unique = experiment
                .unique_values(b)
                .ok_or_else(|| CytoflowError::GroupingNotFound(b.clone()))?;
            if unique.len() > MAX_GROUP_VALUES {
                return Err(CytoflowError::TooManyValues {
                    name: b.clone(),
                    limit: MAX_GROUP_VALUES,
                });
            }
        }
        Ok(())
    }

    fn scale_kind(&self, channel: &str) -> ScaleKind {
        self.scale
            .get(channel)
            .copied()
            .unwrap_or(self.default_scale)
    }

    #[allow(clippy::type_complexity)]
    fn fit(
        &self,
        experiment: &Experiment,
    ) -> Result<(HashMap<String, Scale>, HashMap<GroupKey, KMeansModel>)> {
        let groups = group_by(experiment, &self.by)?;

        // scales are fit over every event, not per group
        let mut scales = HashMap::with_capacity(self.channels.len());
        for c in &self.channels {
            let scale = match (self.scale_kind(c), self.log_mode) {
                (ScaleKind::Log, LogMode::Clip) => Scale::log_clipped(DEFAULT_LOG_THRESHOLD)?,
                (kind, _) => scale_factory(kind, experiment, c)?,
            };
            debug!(channel = %c, scale = %scale.kind(), "fitted channel scale");
            scales.insert(c.clone(), scale);
        }

        let config = KMeansConfig::default()
            .k(self.num_clusters)
            .seed(self.seed)
            .algorithm(self.algorithm);

        let mut models = HashMap::with_capacity(groups.len());
        for (key, rows) in groups {
            if rows.is_empty() {
                return Err(CytoflowError::EmptyGroup(key.to_string()));
            }

            let points: Vec<Vec<f64>> = scaled_points(experiment, &self.channels, &scales, &rows)?
                .into_iter()
                .flatten()
                .collect();
            if points.len() < self.num_clusters {
                return Err(CytoflowError::InsufficientEvents {
                    group: key.to_string(),
                    needed: self.num_clusters,
                    got: points.len(),
                });
            }

            let model = kmeans(&points, &config)?;
            debug!(
                group = %key,
                events = points.len(),
                dropped = rows.len() - points.len(),
                inertia = model.inertia(),
                iterations = model.n_iter(),
                "fitted k-means model"
            );
            models.insert(key, model);
        }

        Ok((scales, models))
    }
}

/// Scale the channel values of `rows`.
///
/// A row whose scaled values aren't all finite is `None`.
fn scaled_points(
    experiment: &Experiment,
    channels: &[String],
    scales: &HashMap<String, Scale>,
    rows: &[usize],
) -> Result<Vec<Option<Vec<f64>>>> {
    let mut columns = Vec::with_capacity(channels.len());
    for c in channels {
        let scale = scales.get(c).ok_or(CytoflowError::NotEstimated)?;
        columns.push((experiment.numeric(c)?, scale));
    }

    Ok(rows
        .iter()
        .map(|&row| {
            let point: Vec<f64> = columns
                .iter()
                .map(|(values, scale)| scale.forward(values[row]))
                .collect();
            point.iter().all(|x| x.is_finite()).then_some(point)
        })
        .collect())
}

impl Operation for KMeansOp {
    fn id(&self) -> &'static str {
        KMEANS_ID
    }

    fn friendly_id(&self) -> &'static str {
        KMEANS_FRIENDLY_ID
    }

    fn estimate(&mut self, experiment: &Experiment, subset: Option<&str>) -> Result<()> {
        self.models.clear();
        self.scales.clear();

        if experiment.is_empty() {
            return Err(CytoflowError::EmptyExperiment);
        }
        if self.num_clusters < 2 {
            return Err(CytoflowError::InvalidClusterCount(self.num_clusters));
        }
        self.validate(experiment)?;

        let experiment = match subset {
            Some(expr) if !expr.is_empty() => Cow::Owned(experiment.query(expr)?),
            _ => Cow::Borrowed(experiment),
        };

        let (scales, models) = self.fit(&experiment)?;
        debug!(
            name = %self.name,
            groups = models.len(),
            events = experiment.len(),
            "estimated k-means operation"
        );
        self.scales = scales;
        self.models = models;
        Ok(())
    }

    fn apply(&self, experiment: &Experiment) -> Result<Experiment> {
        if experiment.is_empty() {
            return Err(CytoflowError::EmptyExperiment);
        }
        if self.name.trim().is_empty() {
            return Err(CytoflowError::NameNotSet);
        }
        if experiment.has_column(&self.name) {
            return Err(CytoflowError::DuplicateColumn(self.name.clone()));
        }
        self.validate(experiment)?;
        if !self.is_estimated() {
            return Err(CytoflowError::NotEstimated);
        }

        let none_label = format!("{}_None", self.name);
        let mut assignments = vec![none_label; experiment.len()];

        let mut index_names = self.by.clone();
        index_names.push("Cluster".to_string());
        index_names.push("Channel".to_string());
        let mut centers = Statistic::new(index_names);

        for (key, rows) in group_by(experiment, &self.by)? {
            if rows.is_empty() {
                return Err(CytoflowError::EmptyGroup(key.to_string()));
            }

            let Some(model) = self.models.get(&key) else {
                warn!(group = %key, events = rows.len(), "no k-means model was fit for group");
                continue;
            };
            if model.n_features() != self.channels.len() {
                return Err(CytoflowError::NotEstimated);
            }

            let points = scaled_points(experiment, &self.channels, &self.scales, &rows)?;
            let mut scored = 0;
            for (&row, point) in rows.iter().zip(points) {
                if let Some(point) = point {
                    assignments[row] = format!("{}_{}", self.name, model.predict(&point) + 1);
                    scored += 1;
                }
            }
            debug!(group = %key, events = rows.len(), scored, "assigned clusters");

            for (cluster, center) in model.cluster_centers().iter().enumerate() {
                for (channel, &coord) in self.channels.iter().zip(center) {
                    let scale = self.scales.get(channel).ok_or(CytoflowError::NotEstimated)?;
                    let mut index = key.values().to_vec();
                    index.push(Value::from(cluster + 1));
                    index.push(Value::from(channel.as_str()));
                    centers.insert(index, scale.inverse(coord))?;
                }
            }
        }

        let mut clustered = experiment.clone();
        clustered.add_condition(&self.name, Column::Categorical(assignments))?;
        clustered.add_statistic(&self.name, "centers", centers);
        clustered.push_history(self.record()?);
        Ok(clustered)
    }

    fn record(&self) -> Result<OperationRecord> {
        Ok(OperationRecord {
            id: KMEANS_ID.to_string(),
            friendly_id: KMEANS_FRIENDLY_ID.to_string(),
            config: serde_json::to_value(self)?,
        })
    }
}
