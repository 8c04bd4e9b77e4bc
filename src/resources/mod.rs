//! Loading scene resources from binary glTF files.
//!
//! - `glb` splits the container into its JSON and binary chunks
//! - `document` types the JSON chunk and resolves accessors to byte ranges
//! - `mesh` and `image` hold per-resource records and their one-time uploads
//! - `registry` owns every record of a loaded scene
//! - `loading` tracks outstanding asynchronous loads
//! - `io` reads files from disk (or over HTTP on the web)

use thiserror::Error;

use crate::data_structures::uid::Uid;

pub mod document;
pub mod glb;
pub mod image;
pub mod io;
pub mod loading;
pub mod mesh;
pub mod registry;

pub use document::{ByteRange, SceneData};
pub use glb::DecodeError;
pub use loading::{CompletionLatch, LoadError, LoadTicket, PendingLoads};
pub use registry::SceneContext;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("buffer view {0} does not exist")]
    MissingView(usize),
    #[error("accessor {0} does not exist")]
    MissingAccessor(usize),
    #[error("accessor {0} has no buffer view")]
    SparseAccessor(usize),
    #[error("accessor {0} has an invalid component type or element type")]
    InvalidAccessor(usize),
    #[error("buffer {0} has no binary chunk")]
    MissingChunk(usize),
    #[error("buffer view {view} ends at byte {end}, past the end of its {chunk}-byte chunk")]
    OutOfBounds { view: usize, end: usize, chunk: usize },
    #[error("accessor {accessor} reads an interleaved view ({stride}-byte stride, {element}-byte elements)")]
    Interleaved {
        accessor: usize,
        stride: usize,
        element: usize,
    },
    #[error("mesh `{0}` has no primitives")]
    NoPrimitives(String),
    #[error("image {0} is not embedded in a binary chunk")]
    ExternalImage(usize),
    #[error("image {index} could not be decoded: {message}")]
    Image { index: usize, message: String },
    #[error("{what} is not ready")]
    NotReady { what: String },
    #[error("no resource with uid {0}")]
    UnknownUid(Uid),
}
