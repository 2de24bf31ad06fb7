use thiserror::Error;

#[derive(Debug, Error)]
pub enum Point2PointError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Screen capture unavailable: {reason}. Hint: {hint}")]
    CaptureUnavailable { reason: String, hint: String },

    #[error("Invalid monitor selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Measurement session already finished")]
    SessionAlreadyFinished,

    #[error("Topology provider error: {0}")]
    Topology(String),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Point2PointError {
    /// Generic capture failure carrying the standard troubleshooting hint.
    pub fn capture_unavailable(reason: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            reason: reason.into(),
            hint: CAPTURE_HINT.to_string(),
        }
    }
}

/// Shown whenever no capture provider produced a usable image.
pub const CAPTURE_HINT: &str = "install gnome-screenshot (GNOME), grim (wlroots Wayland) or scrot (X11); \
     on Wayland the compositor may also need to grant screenshot permission";

impl serde::Serialize for Point2PointError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type Point2PointResult<T> = Result<T, Point2PointError>;
