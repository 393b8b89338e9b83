use thiserror::Error;

/// Fatal GPU pipeline errors. Any of these aborts the current session;
/// there is no retry inside the library.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Shader failed validation. The message carries the compiler log.
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),
    /// Pipeline creation failed. The message carries the linker log.
    #[error("pipeline link failed: {0}")]
    ProgramLink(String),
    /// Unexpected GPU error during setup or draw.
    #[error("graphics API error: {0}")]
    GraphicsApi(String),
}

/// The decoder backend failed to open or prepare a data source. The
/// session stays in `NotPrepared`; retrying is the caller's call.
#[derive(Debug, Error)]
#[error("data source error: {0}")]
pub struct DataSourceError(pub String);
