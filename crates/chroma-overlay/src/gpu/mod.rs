pub mod compositor;
pub mod context;
pub mod fullscreen_quad;
pub mod render_target;

pub use compositor::{ChromaKeyCompositor, RenderParams, RenderParamsHandle};
pub use context::GpuContext;
pub use render_target::RenderTarget;
