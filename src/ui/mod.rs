//! Console output helpers
//!
//! Styled symbols in an interactive terminal, plain `[OK]`/`[WARN]` tags in
//! CI and when output is piped.

mod context;
mod output;

pub use context::UiContext;
pub use output::{key_value, section, step_ok, step_ok_detail, step_warn_hint};
