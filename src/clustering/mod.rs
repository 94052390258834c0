//! K-means clustering.
//!
//! # Example
//!
//! ```
//! use cytoflow_kmeans::clustering::{kmeans, KMeansConfig};
//!
//! let points = vec![
//!     vec![1.0, 2.0],
//!     vec![1.1, 2.1],
//!     vec![10.0, 11.0],
//!     vec![10.1, 11.1],
//! ];
//! let config = KMeansConfig::default().k(2).seed(42);
//! let model = kmeans(&points, &config).unwrap();
//! assert_eq!(model.cluster_centers().len(), 2);
//! assert_eq!(model.predict(&[1.05, 2.05]), model.predict(&points[0]));
//! ```

pub mod kmeans;

pub use kmeans::{kmeans, KMeansAlgorithm, KMeansConfig, KMeansModel};
