//! Hopipe Data Crate
//!
//! Mesh and mask processing used around the reconstruction engine: OBJ I/O,
//! similarity transforms, connected components, cleanup, Laplacian smoothing,
//! and binary mask erosion. This crate does no file discovery and knows nothing
//! about pipeline phases.

pub mod mask;
pub mod mesh;
pub mod types;

pub use mask::{erode_mask, foreground_area};
pub use mesh::{
    CleanReport, LaplacianParams, MeshError, TriangleMesh, clean_mesh, filter_laplacian,
    largest_component, load_obj, save_obj, split_components,
};
pub use types::{SimilarityTransform, Triangle};
