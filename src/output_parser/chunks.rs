//! Chunk splitting for the chunking stage.
//!
//! The model is asked for paragraphs that each open with a
//! `Chunk <n>: <title>` line. Output is split on blank lines; when titled
//! paragraphs are present, untitled paragraphs are folded into the titled
//! chunk before them so a title and its body stay together.

use super::extract::strip_leading_think_block;

const CHUNK_SEPARATOR: &str = "\n\n";

/// Split generated chunk text into trimmed, non-empty chunks.
///
/// # Examples
///
/// ```
/// use chunkbuddy::output_parser::split_chunks;
///
/// let text = "Chunk 1: Basics\n\nA topic is a log.\n\nChunk 2: Scale\n\nPartitions spread load.";
/// assert_eq!(
///     split_chunks(text),
///     vec![
///         "Chunk 1: Basics\n\nA topic is a log.".to_string(),
///         "Chunk 2: Scale\n\nPartitions spread load.".to_string(),
///     ]
/// );
/// ```
pub fn split_chunks(text: &str) -> Vec<String> {
    let text = strip_leading_think_block(text).replace("\r\n", "\n");
    let segments: Vec<&str> = text
        .split(CHUNK_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if !segments.iter().any(|s| is_chunk_title(s)) {
        return segments.into_iter().map(String::from).collect();
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current_titled = false;
    for segment in segments {
        if is_chunk_title(segment) {
            chunks.push(segment.to_string());
            current_titled = true;
        } else if current_titled {
            if let Some(last) = chunks.last_mut() {
                last.push_str(CHUNK_SEPARATOR);
                last.push_str(segment);
            }
        } else {
            // Preamble before the first title stays on its own.
            chunks.push(segment.to_string());
        }
    }
    chunks
}

/// `true` when the segment's first line opens with `Chunk <digits>:`.
pub fn is_chunk_title(segment: &str) -> bool {
    let Some(rest) = first_line(segment).strip_prefix("Chunk ") else {
        return false;
    };
    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && rest[digits..].starts_with(':')
}

/// First line of a chunk, trimmed. Empty for empty input.
pub fn first_line(chunk: &str) -> &str {
    chunk.lines().next().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KAFKA: &str = "Chunk 1: What a partition is\n\nA partition is a slice of a topic.\n\nChunk 2: Why partitions matter\n\nThey enable parallelism.";

    #[test]
    fn kafka_scenario_keeps_title_with_body() {
        assert_eq!(
            split_chunks(KAFKA),
            vec![
                "Chunk 1: What a partition is\n\nA partition is a slice of a topic.",
                "Chunk 2: Why partitions matter\n\nThey enable parallelism.",
            ]
        );
    }

    #[test]
    fn inline_titles_split_per_paragraph() {
        let text = "Chunk 1: Logs\nA topic is an append-only log.\n\n\n  Chunk 2: Partitions\nEach partition is ordered.  \n\n";
        assert_eq!(
            split_chunks(text),
            vec![
                "Chunk 1: Logs\nA topic is an append-only log.",
                "Chunk 2: Partitions\nEach partition is ordered.",
            ]
        );
    }

    #[test]
    fn untitled_output_is_structural_split() {
        let text = "First idea.\n\n   \n\nSecond idea.\n\nThird idea.";
        assert_eq!(
            split_chunks(text),
            vec!["First idea.", "Second idea.", "Third idea."]
        );
    }

    #[test]
    fn preamble_before_first_title_stays_separate() {
        let text = "Here are your chunks:\n\nChunk 1: A\n\nBody A.";
        assert_eq!(split_chunks(text), vec!["Here are your chunks:", "Chunk 1: A\n\nBody A."]);
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(split_chunks("").is_empty());
        assert!(split_chunks("  \n\n \n\n").is_empty());
    }

    #[test]
    fn crlf_line_endings() {
        let text = "Chunk 1: A\r\n\r\nBody.\r\n\r\nChunk 2: B";
        assert_eq!(split_chunks(text), vec!["Chunk 1: A\n\nBody.", "Chunk 2: B"]);
    }

    #[test]
    fn think_blocks_are_dropped() {
        let text = "<think>plan the chunks</think>\n\nChunk 1: A\n\nBody.";
        assert_eq!(split_chunks(text), vec!["Chunk 1: A\n\nBody."]);
    }

    #[test]
    fn literal_think_tag_in_body_is_content() {
        let text = "Chunk 1: HTML tags\n\nA tag such as <think> is not standard HTML.\n\nChunk 2: Attributes\n\nAttributes add data.";
        assert_eq!(
            split_chunks(text),
            vec![
                "Chunk 1: HTML tags\n\nA tag such as <think> is not standard HTML.",
                "Chunk 2: Attributes\n\nAttributes add data.",
            ]
        );
    }

    #[test]
    fn split_is_stable_under_reapplication() {
        let inputs = [
            KAFKA,
            "Intro.\n\nChunk 1: A\n\n\n\nBody\n\nmore\n\nChunk 2: B",
            "plain\n\n\n\ntext",
            "",
        ];
        for input in inputs {
            let once = split_chunks(input);
            let twice = split_chunks(&once.join("\n\n"));
            assert_eq!(once, twice, "input: {:?}", input);
        }
    }

    #[test]
    fn chunk_title_detection() {
        assert!(is_chunk_title("Chunk 1: Basics"));
        assert!(is_chunk_title("Chunk 12:\nbody"));
        assert!(!is_chunk_title("Chunk: missing number"));
        assert!(!is_chunk_title("Chunk one: words"));
        assert!(!is_chunk_title("chunk 1: lowercase"));
        assert!(!is_chunk_title("A partition is a slice."));
    }

    #[test]
    fn first_line_of_chunk() {
        assert_eq!(first_line("Chunk 1: Basics\nBody"), "Chunk 1: Basics");
        assert_eq!(first_line("  single  "), "single");
        assert_eq!(first_line(""), "");
    }
}
