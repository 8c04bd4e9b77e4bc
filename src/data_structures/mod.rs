//! Engine data structures: identifiers, scene graphs, transforms and entities.
//!
//! - `uid` allocates unique identifiers and keys registries by them
//! - `scene_graph` walks node hierarchies into world matrices
//! - `dual` pairs matrices with the GPU buffers mirroring them
//! - `components` and `entity` attach transforms, views and meshes to entities
//! - `texture` wraps GPU textures and sampler descriptions

pub mod components;
pub mod dual;
pub mod entity;
pub mod scene_graph;
pub mod texture;
pub mod uid;
