//! `knit_core` turns documentation into code. Code samples written in
//! markdown (or in the comments of source files) are assembled into
//! compilable source files, their expected output becomes generated tests,
//! and the documents themselves get a maintained table of contents and
//! resolved API links.
//!
//! ## Directives
//!
//! Directives are HTML comments with three dashes:
//!
//! ~~~text
//! <!--- INCLUDE
//! import kotlinx.coroutines.*
//! -->
//!
//! ```kotlin
//! fun main() = println("Hello")
//! ```
//!
//! > You can get the full code [here](example/example-basic-01.kt).
//!
//! ```text
//! Hello
//! ```
//!
//! <!--- TEST -->
//! ~~~
//!
//! Each link to a file matching `knit.pattern` under `knit.dir` writes that
//! file. Numbers in the name are renumbered in document order.
//!
//! ## Modules
//!
//! - [`directive`] and [`reader`] recognise directives and rewrite documents
//!   line by line.
//! - [`knit`] is the per document pass.
//! - [`context`] drives a run over many documents.
//! - [`sync`] compares generated content with what is on disk, reporting a
//!   [`format_diff`] in check mode.
//! - [`props`] resolves `knit.properties` files, [`template`] and
//!   [`emitter`] render headers and tests.
//! - [`api_index`] resolves `[Symbol]` references against API docs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use knit_core::KnitContext;
//! use knit_core::KnitOptions;
//! use std::path::PathBuf;
//!
//! let options = KnitOptions::new(".", vec![PathBuf::from("README.md")]);
//! let mut ctx = KnitContext::new(options).unwrap();
//!
//! if !ctx.process() {
//!     eprintln!("knit failed");
//! }
//! ```

pub use api_index::*;
pub use config::*;
pub use context::*;
pub use diff::*;
pub use directive::*;
pub use discovery::*;
pub use emitter::*;
pub use error::*;
pub use knit::*;
pub use log::*;
pub use props::*;
pub use reader::*;
pub use sync::*;
pub use template::*;

pub mod api_index;
pub mod config;
pub mod context;
mod diff;
pub mod directive;
pub mod discovery;
pub mod emitter;
#[allow(unused_assignments)]
mod error;
pub mod knit;
mod log;
pub mod props;
pub mod reader;
pub mod sync;
pub mod template;

#[cfg(test)]
mod __tests;
