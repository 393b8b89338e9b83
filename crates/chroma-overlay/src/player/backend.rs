use crate::error::DataSourceError;
use crate::frame::FrameSurface;

/// The external decoder boundary. The host wires its media layer (file,
/// URL, file descriptor, custom provider) behind this trait; the
/// controller never touches container or codec data itself.
///
/// `prepare` kicks off asynchronous decoder preparation; the host must
/// call [`crate::player::PlaybackController::on_prepared`] when the
/// decoder reports ready, and
/// [`crate::player::PlaybackController::on_completed`] at end-of-stream.
/// Frames are delivered by publishing into the attached [`FrameSurface`]
/// from whatever thread the decoder owns.
pub trait MediaBackend: Send {
    /// Accept the drawable surface the compositor produced. Decoded
    /// frames are published into it.
    fn attach_surface(&mut self, surface: FrameSurface);

    /// Begin asynchronous preparation of the attached data source.
    fn prepare(&mut self) -> Result<(), DataSourceError>;

    fn start(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn reset(&mut self);
    fn release(&mut self);
    fn seek(&mut self, position_ms: u64);

    /// Current playback position in milliseconds.
    fn position_ms(&self) -> u64;

    fn set_looping(&mut self, looping: bool);
}
