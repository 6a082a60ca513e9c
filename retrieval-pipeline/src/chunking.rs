use common::{error::AppError, utils::config::AppConfig};
use text_splitter::{Characters, ChunkCapacity, ChunkConfig, TextSplitter};

/// Character-bounded splitter used when building the index.
pub struct Chunker {
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    pub fn new(min_chars: usize, max_chars: usize, overlap_chars: usize) -> Result<Self, AppError> {
        let chunk_capacity = ChunkCapacity::new(min_chars)
            .with_max(max_chars)
            .map_err(|e| AppError::Validation(format!("invalid chunk bounds: {e}")))?;
        let chunk_config = ChunkConfig::new(chunk_capacity)
            .with_overlap(overlap_chars)
            .map_err(|e| AppError::Validation(format!("invalid chunk overlap: {e}")))?;

        Ok(Self {
            splitter: TextSplitter::new(chunk_config),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.chunk_min_chars,
            config.chunk_max_chars,
            config.chunk_overlap_chars,
        )
    }

    /// Splits `text` into non-empty chunks. Blank documents produce none.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.splitter
            .chunks(text)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = Chunker::new(10, 100, 0).expect("chunker");
        assert_eq!(
            chunker.split("Tokio is an async runtime."),
            vec!["Tokio is an async runtime.".to_string()]
        );
    }

    #[test]
    fn long_text_respects_max_chars() {
        let chunker = Chunker::new(10, 40, 0).expect("chunker");
        let text = "First sentence about ferries. Second sentence about harbours. \
                    Third sentence about lighthouses. Fourth sentence about tides.";

        let chunks = chunker.split(text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
    }

    #[test]
    fn blank_text_has_no_chunks() {
        let chunker = Chunker::new(10, 40, 0).expect("chunker");
        assert!(chunker.split("").is_empty());
        assert!(chunker.split("   \n\t ").is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_capacity() {
        assert!(Chunker::new(10, 40, 40).is_err());
    }

    #[test]
    fn min_above_max_is_rejected() {
        assert!(Chunker::new(50, 40, 0).is_err());
    }
}
