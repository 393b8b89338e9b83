//! Chroma-keyed video overlay compositing with playback-synced
//! cross-fades.
//!
//! The crate renders a decoded video stream with one designated
//! background color made transparent (or replaced by a silhouette
//! color), and fades the composited output in and out in sync with
//! playback position. Three pieces cooperate:
//!
//! - [`gpu::ChromaKeyCompositor`] owns the wgpu pipeline and the
//!   per-frame draw call; decoded frames arrive through the
//!   [`frame::FrameSurface`] mailbox it hands out.
//! - [`timing::FadeScheduler`] drives the shared blend alpha over
//!   wall-clock time on [`timing::PausableTimer`] ticks.
//! - [`player::PlaybackController`] sequences decoder readiness, surface
//!   readiness, and transport transitions, triggering the fade-in at
//!   start and scheduling the fade-out a configured lead before the end
//!   of the stream.
//!
//! Decoding itself lives behind the [`player::MediaBackend`] trait; the
//! host supplies it along with the render loop that calls `draw`.
//!
//! Typical wiring:
//!
//! ```no_run
//! # fn demo(backend: impl chroma_overlay::player::MediaBackend + 'static)
//! #     -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use chroma_overlay::config::OverlayOptions;
//! use chroma_overlay::gpu::{ChromaKeyCompositor, GpuContext};
//! use chroma_overlay::player::{PlaybackController, VideoMetadata};
//! use chroma_overlay::timing::FadeScheduler;
//!
//! let gpu = GpuContext::new()?;
//! let options = OverlayOptions::default();
//! let (mut compositor, surface) = ChromaKeyCompositor::new(
//!     &gpu.device,
//!     &gpu.queue,
//!     wgpu::TextureFormat::Rgba8UnormSrgb,
//!     &options,
//! )?;
//! let fades = Arc::new(FadeScheduler::new(compositor.blend_alpha()));
//! let controller = PlaybackController::new(backend, options, fades);
//!
//! controller.surface_ready(surface)?;
//! controller.set_data_source(VideoMetadata {
//!     width: 1280,
//!     height: 720,
//!     duration_ms: 10_000,
//! })?;
//! // decoder reports ready -> controller.on_prepared() -> playback and
//! // fades run; each render tick calls compositor.draw(..).
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod player;
pub mod timing;

pub use config::{OverlayOptions, Rgb};
pub use error::{DataSourceError, RenderError};
pub use frame::{DecodedFrame, FrameSurface};
pub use gpu::{ChromaKeyCompositor, GpuContext};
pub use player::{MediaBackend, PlaybackController, PlayerState, VideoMetadata};
pub use timing::{FadeScheduler, PausableTimer};
