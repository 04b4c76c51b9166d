//! dockpipe build pipeline
//!
//! This crate assembles a parsed Dockerfile and a build context into a
//! build request, submits it to a container engine over its HTTP API
//! (unix socket or TCP), and exposes the engine's newline-delimited JSON
//! progress output as a lazy stream of typed events.

pub mod client;
pub mod codec;
pub mod context;
pub mod error;
pub mod event;
pub mod options;
pub mod reference;
pub mod request;
mod transport;

pub use client::{BuildClient, BuildEventStream, StreamState};
pub use codec::{Line, LineCodec, MAX_LINE_LENGTH};
pub use context::{ContextProvider, DirectoryContext, EmptyContext, TarContext};
pub use error::{AssemblyError, BuildError, ConnectionError, Result, StreamError};
pub use event::{ProgressEvent, decode_line};
pub use options::{BuildOptions, DEFAULT_DOCKERFILE};
pub use reference::ImageReference;
pub use request::{BuildRequest, assemble};
