//! scene-ngin
//!
//! A small wgpu scene engine for native and WASM targets. It reads binary glTF
//! scenes, compiles annotated shader descriptions into bind group layouts and
//! pipelines, and keeps per-object matrices on the GPU with dirty-tracked
//! uploads.
//!
//! High-level modules
//! - `context`: GPU context, engine configuration and the buffer upload façade
//! - `data_structures`: uids and registries, scene graph traversal, dual frames,
//!   entities and their components, GPU textures
//! - `flow`: host event loop, sketch lifecycle hooks, pulse timer, load barrier
//! - `render`: swapchain targets and draw-time errors
//! - `resources`: container decoding, scene documents, mesh and image registries
//! - `shader`: shader source parsing, layout compilation, pipelines and binding
//!

pub mod context;
pub mod data_structures;
pub mod flow;
pub mod render;
pub mod resources;
pub mod shader;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use context::{Context, EngineConfig};
pub use flow::{Loads, Sketch, run};
pub use winit::event::WindowEvent;
pub use wgpu;
