//! Reading and writing the identifier field inside audio file metadata.
//!
//! The rest of the crate only sees [`TagAccessor`]. [`LoftyTags`] is the real
//! implementation: it picks the tag family from the file extension and edits
//! exactly one field, leaving every other frame of the file alone.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;
use lofty::ape::{ApeFile, ApeItem, ApeTag};
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile as _;
use lofty::flac::FlacFile;
use lofty::id3::v2::Id3v2Tag;
use lofty::iff::aiff::AiffFile;
use lofty::iff::wav::WavFile;
use lofty::mp4::{Atom, AtomData, AtomIdent, Ilst, Mp4File};
use lofty::mpeg::MpegFile;
use lofty::musepack::MpcFile;
use lofty::ogg::{OpusFile, VorbisComments, VorbisFile};
use lofty::tag::{ItemValue, TagExt};
use lofty::wavpack::WavPackFile;
use crate::audio::format::AudioFormat;
use crate::library::identifier::Identifier;
use crate::{AudioError, Result};

/// Field name used by ID3v2 (`TXXX` description), Vorbis comments and APE.
pub const IDENTIFIER_FIELD: &str = "AUDIOLINK_ID";
const MP4_MEAN: &str = "com.apple.iTunes";
const MP4_NAME: &str = "Audiolink Id";

/// Get/set access to the single identifier field of an audio file.
pub trait TagAccessor: Sync {
    fn supports(&self, path: &Path) -> bool;

    /// The raw stored value, `None` when the field is absent or empty.
    fn read_identifier(&self, path: &Path) -> Result<Option<String>>;

    fn write_identifier(&self, path: &Path, identifier: &Identifier) -> Result<()>;

    fn clear_identifier(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTags;

impl LoftyTags {
    pub fn new() -> Self {
        Self
    }

    fn format_of(path: &Path) -> Result<AudioFormat> {
        AudioFormat::from_path(path)
            .ok_or_else(|| AudioError::UnsupportedFormat(path.display().to_string()))
    }
}

impl TagAccessor for LoftyTags {
    fn supports(&self, path: &Path) -> bool {
        AudioFormat::from_path(path).is_some()
    }

    fn read_identifier(&self, path: &Path) -> Result<Option<String>> {
        let tag = FormatTag::load(path, Self::format_of(path)?)?;
        Ok(tag.identifier().filter(|value| !value.trim().is_empty()))
    }

    fn write_identifier(&self, path: &Path, identifier: &Identifier) -> Result<()> {
        let mut tag = FormatTag::load(path, Self::format_of(path)?)?;
        tag.set_identifier(identifier.as_str())?;
        tag.save(path)
    }

    fn clear_identifier(&self, path: &Path) -> Result<()> {
        let mut tag = FormatTag::load(path, Self::format_of(path)?)?;
        if tag.identifier().is_none() {
            return Ok(());
        }
        tag.clear_identifier();
        tag.save(path)
    }
}

fn mp4_ident() -> AtomIdent<'static> {
    AtomIdent::Freeform {
        mean: Cow::Borrowed(MP4_MEAN),
        name: Cow::Borrowed(MP4_NAME),
    }
}

/// The one tag of a file that carries the identifier.
enum FormatTag {
    Id3v2(Id3v2Tag),
    Vorbis(VorbisComments),
    Mp4(Ilst),
    Ape(ApeTag),
}

impl FormatTag {
    fn load(path: &Path, format: AudioFormat) -> Result<Self> {
        let mut file = File::open(path)?;
        let options = ParseOptions::new().read_properties(false);

        let tag = match format {
            AudioFormat::Mp3 => {
                Self::Id3v2(MpegFile::read_from(&mut file, options)?.id3v2().cloned().unwrap_or_default())
            }
            AudioFormat::Aiff => {
                Self::Id3v2(AiffFile::read_from(&mut file, options)?.id3v2().cloned().unwrap_or_default())
            }
            AudioFormat::Wav => {
                Self::Id3v2(WavFile::read_from(&mut file, options)?.id3v2().cloned().unwrap_or_default())
            }
            AudioFormat::Flac => Self::Vorbis(
                FlacFile::read_from(&mut file, options)?
                    .vorbis_comments()
                    .cloned()
                    .unwrap_or_default(),
            ),
            AudioFormat::Ogg => {
                Self::Vorbis(VorbisFile::read_from(&mut file, options)?.vorbis_comments().clone())
            }
            AudioFormat::Opus => {
                Self::Vorbis(OpusFile::read_from(&mut file, options)?.vorbis_comments().clone())
            }
            AudioFormat::M4a => {
                Self::Mp4(Mp4File::read_from(&mut file, options)?.ilst().cloned().unwrap_or_default())
            }
            AudioFormat::Ape => {
                Self::Ape(ApeFile::read_from(&mut file, options)?.ape().cloned().unwrap_or_default())
            }
            AudioFormat::Mpc => {
                Self::Ape(MpcFile::read_from(&mut file, options)?.ape().cloned().unwrap_or_default())
            }
            AudioFormat::WavPack => {
                Self::Ape(WavPackFile::read_from(&mut file, options)?.ape().cloned().unwrap_or_default())
            }
        };

        Ok(tag)
    }

    fn identifier(&self) -> Option<String> {
        match self {
            Self::Id3v2(tag) => tag.get_user_text(IDENTIFIER_FIELD).map(str::to_owned),
            Self::Vorbis(tag) => tag.get(IDENTIFIER_FIELD).map(str::to_owned),
            Self::Mp4(tag) => tag.get(&mp4_ident()).and_then(|atom| {
                atom.data().find_map(|data| match data {
                    AtomData::UTF8(value) => Some(value.clone()),
                    _ => None,
                })
            }),
            Self::Ape(tag) => tag.get(IDENTIFIER_FIELD).and_then(|item| match item.value() {
                ItemValue::Text(value) => Some(value.clone()),
                _ => None,
            }),
        }
    }

    fn set_identifier(&mut self, value: &str) -> Result<()> {
        match self {
            Self::Id3v2(tag) => {
                tag.insert_user_text(IDENTIFIER_FIELD.to_string(), value.to_string());
            }
            Self::Vorbis(tag) => {
                tag.insert(IDENTIFIER_FIELD.to_string(), value.to_string());
            }
            Self::Mp4(tag) => {
                // insert() merges into an existing atom, so drop the old one first
                tag.remove(&mp4_ident()).for_each(drop);
                tag.insert(Atom::new(mp4_ident(), AtomData::UTF8(value.to_string())));
            }
            Self::Ape(tag) => {
                let item = ApeItem::new(IDENTIFIER_FIELD.to_string(), ItemValue::Text(value.to_string()))?;
                tag.insert(item);
            }
        }
        Ok(())
    }

    fn clear_identifier(&mut self) {
        match self {
            Self::Id3v2(tag) => {
                tag.remove_user_text(IDENTIFIER_FIELD);
            }
            Self::Vorbis(tag) => tag.remove(IDENTIFIER_FIELD).for_each(drop),
            Self::Mp4(tag) => tag.remove(&mp4_ident()).for_each(drop),
            Self::Ape(tag) => {
                tag.remove(IDENTIFIER_FIELD);
            }
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        let options = WriteOptions::default();
        match self {
            Self::Id3v2(tag) => tag.save_to_path(path, options)?,
            Self::Vorbis(tag) => tag.save_to_path(path, options)?,
            Self::Mp4(tag) => tag.save_to_path(path, options)?,
            Self::Ape(tag) => tag.save_to_path(path, options)?,
        }
        Ok(())
    }
}
