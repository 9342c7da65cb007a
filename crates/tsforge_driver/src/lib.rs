//! Build driver wiring a compiler service to the compile cache.
//!
//! A [`BuildSession`] is created once per build (or watch) process. The host
//! bundler forwards its per-file `transform` calls, resolved imports, and
//! per-target `generate` calls; the session answers them from the
//! [`tsforge_cache::CompileCache`] where it can and from the
//! [`CompilerService`] where it must.

#![warn(missing_docs)]

pub mod build;
pub mod error;
pub mod filter;
pub mod service;
pub mod session;

pub use build::{BuildSession, GenerateReport, TransformOutput};
pub use error::DriverError;
pub use filter::SourceFilter;
pub use service::{CompilerService, EmitOutput, OutputFile};
pub use session::{BuildMode, GeneratePhase, SessionContext};
