//! Work items: a decoded image, its effect chain, and where it goes.

use std::path::PathBuf;

use log::debug;

use crate::buffer::PixelTriple;
use crate::codec::Codec;
use crate::types::{Effect, Job, PipelineError};

/// One image being processed, from decode to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Name for logs (the plan's input file name).
    pub name: String,
    /// Effects to apply, in order.
    pub effects: Vec<Effect>,
    /// Where the final image is encoded to.
    pub output: PathBuf,
    /// The image's buffers. Owned by this item alone.
    pub triple: PixelTriple,
}

impl WorkItem {
    /// Decode `job`'s source image and build its buffer triple.
    ///
    /// A job with no effects persists its source unchanged, so `result`
    /// starts as a copy of `current` in that case.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Decode`] if the codec cannot decode the
    /// job's input.
    pub fn load<C: Codec + ?Sized>(job: &Job, codec: &C) -> Result<Self, PipelineError> {
        let source = codec
            .decode(&job.input)
            .map_err(|source| PipelineError::Decode {
                path: job.input.clone(),
                source,
            })?;
        debug!(
            "decoded {} ({}x{}), effects {:?}",
            job.name,
            source.width(),
            source.height(),
            job.effects,
        );
        let mut triple = PixelTriple::new(source);
        if job.effects.is_empty() {
            triple.result = triple.current.clone();
        }
        Ok(Self {
            name: job.name.clone(),
            effects: job.effects.clone(),
            output: job.output.clone(),
            triple,
        })
    }

    /// Returns `true` if stage `index` is the last of the chain.
    #[must_use]
    pub const fn is_last_stage(&self, index: usize) -> bool {
        index + 1 >= self.effects.len()
    }

    /// Encode the item's `result` buffer to its output path.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Encode`] if the codec cannot write it.
    pub fn persist<C: Codec + ?Sized>(&self, codec: &C) -> Result<(), PipelineError> {
        codec
            .encode(&self.output, &self.triple.result)
            .map_err(|source| PipelineError::Encode {
                path: self.output.clone(),
                source,
            })?;
        debug!("persisted {} to {}", self.name, self.output.display());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::codec::MemoryCodec;

    fn job(effects: Vec<Effect>) -> Job {
        Job {
            name: "a.png".to_owned(),
            input: PathBuf::from("in/a.png"),
            output: PathBuf::from("out/a.png"),
            effects,
        }
    }

    #[test]
    fn load_builds_triple_around_source() {
        let codec = MemoryCodec::new();
        let source = PixelBuffer::from_fn(3, 2, |x, y| [1, 2, 3, u16::try_from(x + y).unwrap()]);
        codec.insert("in/a.png", source.clone());
        let item = WorkItem::load(&job(vec![Effect::Blur]), &codec).unwrap();
        assert_eq!(item.triple.current, source);
        assert_eq!(item.triple.result, PixelBuffer::new(3, 2));
        assert!(item.is_last_stage(0));
    }

    #[test]
    fn load_missing_source_is_decode_error() {
        let codec = MemoryCodec::new();
        let err = WorkItem::load(&job(vec![]), &codec).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { ref path, .. } if path == Path::new("in/a.png")));
    }

    #[test]
    fn empty_chain_persists_source_unchanged() {
        let codec = MemoryCodec::new();
        let source = PixelBuffer::from_fn(2, 2, |_, _| [9, 8, 7, 6]);
        codec.insert("in/a.png", source.clone());
        let item = WorkItem::load(&job(vec![]), &codec).unwrap();
        item.persist(&codec).unwrap();
        assert_eq!(codec.get(Path::new("out/a.png")).unwrap(), source);
    }
}
