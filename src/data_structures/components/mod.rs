//! Entity components.
//!
//! - `transform` holds shift/twist/scale and the entity's [`DualFrame`](super::dual::DualFrame)
//! - `view` is a camera's projection and its [`DualView`](super::dual::DualView)
//! - `mesh_instance` draws a mesh with a shader, resolving resources by tag

pub mod mesh_instance;
pub mod transform;
pub mod view;

pub use mesh_instance::MeshInstance;
pub use transform::Transform;
pub use view::{Projection, View};
