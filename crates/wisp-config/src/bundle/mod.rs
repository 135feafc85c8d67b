//! Options describing what gets built and where it goes.

mod html;
mod optimization;
mod output;
mod resolve;
mod rules;

pub use html::{CopyPattern, HtmlOptions};
pub use optimization::{OptimizationOptions, SplitChunks};
pub use output::OutputOptions;
pub use resolve::ResolveOptions;
pub use rules::{EsTarget, ModuleOptions, StageName, StageOptions, TransformRule};
