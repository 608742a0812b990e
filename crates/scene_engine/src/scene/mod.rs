//! Scene graph and visibility
//!
//! Hierarchical transforms, bounding volumes, frustum tests and
//! level-of-detail selection. The [`Scene`] decides *what* to draw each
//! frame and in what detail; the render layer decides *how*.
//!
//! ## Architecture
//!
//! ```text
//! Scene (arena of SceneNodes)
//!      ↓  update_world_matrices / bounds refresh
//! Camera frustum + LOD groups
//!      ↓  collect_visible_renderers
//! Vec<VisibleRenderer> (draw list)
//! ```

pub mod bounds;
pub mod frustum;
pub mod lod;
pub mod node;
pub mod scene_graph;
pub mod transform;

pub use bounds::{Sphere, AABB};
pub use frustum::{Frustum, FrustumSide, FrustumTest, Plane};
pub use lod::{LodGroup, LodLevel, LodMode};
pub use node::{MeshRenderer, NodeId, Renderable, SceneNode};
pub use scene_graph::{CullView, CullingStats, Scene, SceneError, SceneResult, VisibleRenderer};
pub use transform::Transform;
