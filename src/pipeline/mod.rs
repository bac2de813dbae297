//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements one step, so each is testable on its own and
//! the rendering backend can be swapped (tests use an in-memory one)
//! without touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ render ──▶ encode ──▶ file
//! (path)    (unlock)     (pdfium)   (format + fallback, conflict)
//!                 └──────── pool ────────┘
//! ```
//!
//! 1. [`input`]: validate the path (exists, readable, `%PDF`) and derive
//!    the output folder
//! 2. [`document`]: open through a [`document::DocumentSource`] and run the
//!    password loop
//! 3. [`render`]: rasterise one page into a [`render::RawPixelBuffer`];
//!    [`library`] binds pdfium once per process
//! 4. [`encode`]: apply the [`encode::FormatPolicy`] and [`conflict`]
//!    decisions, then write the file atomically
//! 5. [`pool`]: runs steps 3 and 4 for many pages at once

pub mod conflict;
pub mod document;
pub mod encode;
pub mod input;
pub mod library;
pub mod pool;
pub mod render;
