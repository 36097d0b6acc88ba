//! Shader fragment renaming, pass composition and the pipeline that keeps a
//! composed pass current.

pub mod composer;
pub mod conflicts;
pub mod pipeline;

pub use composer::{COLOR_FUNCTION, ComposedPass, ENTRY_POINT_MARKER, combined_source, compose_pass};
pub use conflicts::{find_global_conflicts, rewrite};
pub use pipeline::CustomPipeline;
