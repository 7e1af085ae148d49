use std::fmt;
use std::path::Path;
use serde::Serialize;

/// Audio containers the tool knows how to tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AudioFormat {
    Aiff,
    Ape,
    Flac,
    M4a,
    Mp3,
    Mpc,
    Ogg,
    Opus,
    Wav,
    WavPack,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "aiff" | "aif" => Some(AudioFormat::Aiff),
            "ape" => Some(AudioFormat::Ape),
            "flac" => Some(AudioFormat::Flac),
            "m4a" => Some(AudioFormat::M4a),
            "mp3" => Some(AudioFormat::Mp3),
            "mpc" => Some(AudioFormat::Mpc),
            "ogg" => Some(AudioFormat::Ogg),
            "opus" => Some(AudioFormat::Opus),
            "wav" => Some(AudioFormat::Wav),
            "wv" => Some(AudioFormat::WavPack),
            _ => None,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Aiff => "AIFF",
            AudioFormat::Ape => "APE",
            AudioFormat::Flac => "FLAC",
            AudioFormat::M4a => "M4A",
            AudioFormat::Mp3 => "MP3",
            AudioFormat::Mpc => "Musepack",
            AudioFormat::Ogg => "Ogg Vorbis",
            AudioFormat::Opus => "Opus",
            AudioFormat::Wav => "WAV",
            AudioFormat::WavPack => "WavPack",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
