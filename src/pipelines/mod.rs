//! Composite pipelines built on the upstream clients: multi-stage flows with
//! fallbacks, filtering, and bounded fan-out.

pub mod changelog;
pub mod compare;
pub mod docs;
pub mod error_translate;
pub mod extract;
