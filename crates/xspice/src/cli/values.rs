//! Enumerated flag values.
//!
//! The names are the exact strings the driver expects in its `XSPICE_*`
//! variables, so `Display` is used when exporting them.

use clap::ValueEnum;

/// WAN compression policy for JPEG and zlib-GLZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WanCompression {
    /// Decide from the measured bandwidth
    Auto,
    /// Never compress
    Never,
    /// Always compress
    Always,
}

/// Image compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImageCompression {
    /// No compression
    Off,
    /// GLZ or QUIC, chosen per image
    #[value(name = "auto_glz")]
    AutoGlz,
    /// LZ or QUIC, chosen per image
    #[value(name = "auto_lz")]
    AutoLz,
    /// Always QUIC
    Quic,
    /// Always GLZ
    Glz,
    /// Always LZ
    Lz,
}

/// Video stream detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamingVideo {
    /// Never stream
    Off,
    /// Stream every frequently updated region
    All,
    /// Stream regions that look like video
    Filter,
}

impl std::fmt::Display for WanCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Never => write!(f, "never"),
            Self::Always => write!(f, "always"),
        }
    }
}

impl std::fmt::Display for ImageCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::AutoGlz => write!(f, "auto_glz"),
            Self::AutoLz => write!(f, "auto_lz"),
            Self::Quic => write!(f, "quic"),
            Self::Glz => write!(f, "glz"),
            Self::Lz => write!(f, "lz"),
        }
    }
}

impl std::fmt::Display for StreamingVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::All => write!(f, "all"),
            Self::Filter => write!(f, "filter"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wan_compression_display() {
        assert_eq!(WanCompression::Auto.to_string(), "auto");
        assert_eq!(WanCompression::Never.to_string(), "never");
        assert_eq!(WanCompression::Always.to_string(), "always");
    }

    #[test]
    fn test_image_compression_display_uses_underscores() {
        assert_eq!(ImageCompression::AutoGlz.to_string(), "auto_glz");
        assert_eq!(ImageCompression::AutoLz.to_string(), "auto_lz");
        assert_eq!(ImageCompression::Quic.to_string(), "quic");
        assert_eq!(ImageCompression::Off.to_string(), "off");
    }

    #[test]
    fn test_image_compression_parse() {
        assert_eq!(
            ImageCompression::from_str("auto_glz", false).unwrap(),
            ImageCompression::AutoGlz
        );
        assert!(ImageCompression::from_str("auto-glz", false).is_err());
    }

    #[test]
    fn test_streaming_video_display() {
        assert_eq!(StreamingVideo::Filter.to_string(), "filter");
        assert_eq!(StreamingVideo::All.to_string(), "all");
    }
}
