//! Property tests for chunk coverage and size bounds.

use pdfchat_rag::{Chunker, Document, FixedSizeChunker, SeparatorChunker, merge_chunks};
use proptest::prelude::*;

/// Window size and an overlap strictly below it.
fn arb_size_and_overlap() -> impl Strategy<Value = (usize, usize)> {
    (1usize..64).prop_flat_map(|size| (Just(size), 0..size))
}

/// *For any* text, merging fixed-size chunks (dropping each overlap) rebuilds
/// the text exactly, and consecutive chunks share `overlap` characters.
mod prop_fixed_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn merge_restores_source(
            text in "[a-zé日 .\n]{0,300}",
            (size, overlap) in arb_size_and_overlap(),
        ) {
            let chunker = FixedSizeChunker::new(size, overlap).unwrap();
            let chunks = chunker.chunk(&Document::new("doc", text.clone()));

            prop_assert_eq!(chunks.is_empty(), text.is_empty());
            prop_assert_eq!(merge_chunks(&chunks, overlap), text);

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.sequence_index, i);
                prop_assert!(chunk.text.chars().count() <= size);
            }

            for pair in chunks.windows(2) {
                let tail: String = pair[0].text.chars().skip(size - overlap).collect();
                let head: String = pair[1].text.chars().take(overlap).collect();
                prop_assert_eq!(tail, head);
            }
        }
    }
}

/// *For any* newline-separated text, every non-blank line appears in some
/// chunk, and a chunk exceeds the size only when it is a single line.
mod prop_separator_chunk_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn every_line_is_kept(
            lines in proptest::collection::vec("[a-z ]{0,30}", 0..30),
            (size, overlap) in arb_size_and_overlap(),
        ) {
            let text = lines.join("\n");
            let chunker = SeparatorChunker::new(size, overlap).unwrap();
            let chunks = chunker.split_text(&text);

            for line in lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
                prop_assert!(
                    chunks.iter().any(|c| c.contains(line)),
                    "line {:?} missing from {:?}",
                    line,
                    chunks,
                );
            }

            for chunk in &chunks {
                prop_assert!(!chunk.trim().is_empty());
                if chunk.chars().count() > size {
                    prop_assert!(!chunk.contains('\n'), "oversized multi-line chunk {:?}", chunk);
                }
            }
        }
    }
}

#[test]
fn sky_and_grass_split_into_overlapping_chunks() {
    let chunker = FixedSizeChunker::new(20, 5).unwrap();
    let chunks = chunker.chunk(&Document::new("doc", "The sky is blue. Grass is green."));

    let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["The sky is blue. Gra", ". Grass is green."]);
    assert_eq!(merge_chunks(&chunks, 5), "The sky is blue. Grass is green.");
}
