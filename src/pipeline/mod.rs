//! Pipeline stages for document extraction.
//!
//! Each submodule implements one step. Only [`submit`] and [`poll`] talk to
//! the network, and both do so through the [`crate::transport::Transport`]
//! seam.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ submit ──▶ poll ──▶ normalize ──▶ tabulate ──▶ render
//! (path/URL) (base64)   (POST)    (GET…)   (shape)       (80 cols)    (xlsx)
//! ```
//!
//! 1. [`input`]     — read a local file or download a URL; check the PDF magic
//! 2. [`encode`]    — base64 the document bytes for the JSON body
//! 3. [`submit`]    — start a remote run; exactly one POST, never retried
//! 4. [`poll`]      — wait for the run, falling back across status URLs
//! 5. [`normalize`] — fold any result shape into `{line_items, header}`
//! 6. [`tabulate`]  — flatten into fixed-schema rows
//! 7. [`render`]    — write the rows as a spreadsheet

pub mod encode;
pub mod input;
pub mod normalize;
pub mod poll;
pub mod render;
pub mod submit;
pub mod tabulate;
