//! Property tests for fixed-size chunk coverage.

use docreader_rag::FixedSizeChunker;
use proptest::prelude::*;

/// *For any* text and chunk size, concatenating the chunks reproduces the
/// text exactly, every chunk but the last has exactly `chunk_size`
/// characters, and the last has between one and `chunk_size`.
mod prop_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn chunks_cover_text_exactly(
            text in "(?s)\\PC{0,400}|[a-zé€🦀 \\n]{0,400}",
            chunk_size in 1usize..64,
        ) {
            let chunker = FixedSizeChunker::new(chunk_size);
            let chunks: Vec<&str> = chunker.chunks(&text).collect();

            prop_assert_eq!(chunks.concat(), text.clone());
            prop_assert_eq!(chunks.is_empty(), text.is_empty());

            if let Some((last, rest)) = chunks.split_last() {
                for chunk in rest {
                    prop_assert_eq!(chunk.chars().count(), chunk_size);
                }
                let last_len = last.chars().count();
                prop_assert!(last_len >= 1 && last_len <= chunk_size);
            }

            let expected_count = text.chars().count().div_ceil(chunk_size);
            prop_assert_eq!(chunks.len(), expected_count);
        }
    }
}
