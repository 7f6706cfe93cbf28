use crate::codec::SubtitleCodec;
use std::path::{Path, PathBuf};

/// A subtitle track.
#[derive(Debug, Clone, Default)]
pub struct SubtitleStream {
    pub(crate) index: usize,
    pub(crate) format: String,
    pub(crate) source: PathBuf,
    pub(crate) language: Option<String>,

    pub(crate) codec: Option<String>,
    pub(crate) language_arg: Option<String>,
}

impl SubtitleStream {
    /// Create a bare subtitle stream for the given source.
    pub fn new(source: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            index,
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Language tag reported by the probe, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Select the output codec.
    pub fn set_codec(mut self, codec: SubtitleCodec) -> Self {
        self.codec = Some(format!("-c:s {} ", codec));
        self
    }

    /// Tag the output track with a language.
    pub fn set_language(mut self, language: impl Into<String>) -> Self {
        self.language_arg = Some(format!(
            "-metadata:s:s:{} language={} ",
            self.index,
            language.into()
        ));
        self
    }

    /// Concatenate the staged fragments.
    pub fn build(&self) -> String {
        let mut args = String::new();
        for fragment in [&self.codec, &self.language_arg].into_iter().flatten() {
            args.push_str(fragment);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_and_language_render_in_order() {
        let built = SubtitleStream::new("movie.mkv", 2)
            .set_language("eng")
            .set_codec(SubtitleCodec::MOV_TEXT)
            .build();
        assert_eq!(built, "-c:s mov_text -metadata:s:s:2 language=eng ");
    }
}
