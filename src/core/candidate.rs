//! Upstream media candidates and media URL normalization

use std::fmt;
use thiserror::Error;
use url::Url;

/// Container format assumed for a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// Candidate order for every recording
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Mp3, AudioFormat::Wav];

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    /// Content type used when the upstream response does not declare one
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }
}

/// One upstream location to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    pub url: Url,
    pub format: AudioFormat,
}

impl fmt::Display for MediaCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.format.extension())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CandidateError {
    #[error("invalid media URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("media URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("media URL must have a host")]
    MissingHost,

    #[error("media URL path names no file: {0}")]
    EmptyPath(String),
}

/// Suffixes stripped before format extensions are appended
const RECOGNIZED_SUFFIXES: [&str; 3] = [".json", ".mp3", ".wav"];

fn strip_recognized_suffix(path: &str) -> &str {
    let lower = path.to_ascii_lowercase();
    RECOGNIZED_SUFFIXES
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| &path[..path.len() - suffix.len()])
        .unwrap_or(path)
}

/// Expand `base` (a URL whose path has no extension) into one candidate per format
pub fn format_variants(base: &Url) -> Vec<MediaCandidate> {
    let stem = strip_recognized_suffix(base.path()).to_string();
    AudioFormat::ALL
        .iter()
        .map(|format| {
            let mut url = base.clone();
            url.set_path(&format!("{stem}.{}", format.extension()));
            MediaCandidate {
                url,
                format: *format,
            }
        })
        .collect()
}

/// Normalize a media URL taken from a call record into format candidates
///
/// `.../RE1.json` becomes `.../RE1.mp3` and `.../RE1.wav`; a URL without a
/// recognized suffix gets the extensions appended. The query string is kept.
pub fn candidates_from_media_url(raw: &str) -> Result<Vec<MediaCandidate>, CandidateError> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(CandidateError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CandidateError::MissingHost);
    }
    let stem = strip_recognized_suffix(url.path());
    if stem.rsplit('/').next().is_none_or(str::is_empty) {
        return Err(CandidateError::EmptyPath(url.path().to_string()));
    }
    Ok(format_variants(&url))
}
