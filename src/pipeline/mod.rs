//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the rendering backend can be swapped without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ tasks ──▶ pool ──▶ sequence ──▶ write ──▶ archive
//! (path)    (1/page)  (W workers, (sort by   (page_NNN) (.tar.gz)
//!                      unordered)  index)
//! ```
//!
//! 1. [`input`]    — validate the source file, derive default output paths
//! 2. [`tasks`]    — one immutable [`tasks::RenderTask`] per page
//! 3. [`pool`]     — render tasks concurrently behind a per-task failure
//!    boundary; [`render`] and [`encode`] do the actual rasterisation
//! 4. [`sequence`] — collect out-of-order results and restore page order
//! 5. [`write`]    — atomically persist each successful page
//! 6. [`archive`]  — optionally bundle the written pages, in page order

pub mod archive;
pub mod encode;
pub mod input;
pub mod pool;
pub mod render;
pub mod sequence;
pub mod tasks;
pub mod write;
