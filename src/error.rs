pub type AnimrecResult<T> = Result<T, AnimrecError>;

/// Crate-wide error taxonomy.
///
/// Every error is fatal to the run: the recorder never retries a stage and
/// never finalizes a partially written output file.
#[derive(thiserror::Error, Debug)]
pub enum AnimrecError {
    /// Missing/corrupt source document, unknown artboard or animation name,
    /// undecodable watermark.
    #[error("input error: {0}")]
    Input(String),

    /// Stream/codec/muxer construction failures before the first frame.
    #[error("setup error: {0}")]
    Setup(String),

    /// Frame capture, encoder submit/drain or mux-write failures mid-loop.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Trailer write or sink release failures after the loop.
    #[error("shutdown error: {0}")]
    Shutdown(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AnimrecError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub fn shutdown(msg: impl Into<String>) -> Self {
        Self::Shutdown(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(AnimrecError::input("x").to_string().contains("input error:"));
        assert!(AnimrecError::setup("x").to_string().contains("setup error:"));
        assert!(
            AnimrecError::runtime("x")
                .to_string()
                .contains("runtime error:")
        );
        assert!(
            AnimrecError::shutdown("x")
                .to_string()
                .contains("shutdown error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = AnimrecError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
