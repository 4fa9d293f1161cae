// Header-aware markdown chunker
use std::ops::Range;
use tracing::debug;

use super::ChunkingConfig;
use crate::types::{Chunk, Document};

/// A `(header, body)` pair in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Full header line (e.g. `## Returns`), empty for headerless text
    pub header: String,
    /// Text up to the next header, trimmed
    pub body: String,
}

/// Splits documents into header-delimited sections and windows long bodies
#[derive(Debug, Clone, Default)]
pub struct MarkdownChunker {
    config: ChunkingConfig,
}

impl MarkdownChunker {
    /// Create new chunker with default window (512/128)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration
    pub fn with_config(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Get current configuration
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Partition text into sections.
    ///
    /// Non-blank text before the first header becomes a leading section
    /// with an empty header. Text without any header is a single section.
    pub fn sections(text: &str) -> Vec<Section> {
        // (line start, line end including newline, header text)
        let mut headers: Vec<(usize, usize, &str)> = Vec::new();
        let mut offset = 0;

        for raw in text.split_inclusive('\n') {
            let line = raw.trim_end_matches(|c| c == '\n' || c == '\r');
            if is_header_line(line) {
                headers.push((offset, offset + raw.len(), line.trim_end()));
            }
            offset += raw.len();
        }

        let mut sections = Vec::new();

        let preamble_end = headers.first().map(|(start, _, _)| *start).unwrap_or(text.len());
        let preamble = text[..preamble_end].trim();
        if !preamble.is_empty() {
            sections.push(Section {
                header: String::new(),
                body: preamble.to_string(),
            });
        }

        for (i, (_, body_start, header)) in headers.iter().enumerate() {
            let body_end = headers.get(i + 1).map(|(start, _, _)| *start).unwrap_or(text.len());
            sections.push(Section {
                header: header.to_string(),
                body: text[*body_start..body_end].trim().to_string(),
            });
        }

        sections
    }

    /// Chunk one document. Never fails.
    pub fn chunk(&self, filename: &str, text: &str) -> Vec<Chunk> {
        let size = self.config.size;
        let overlap = self.config.overlap;
        let step = self.config.step();

        let mut chunks = Vec::new();
        let mut sequence = 0;

        for (section_idx, section) in Self::sections(text).into_iter().enumerate() {
            let body_len = section.body.chars().count();

            // step == 0 only when validation was bypassed: keep the section whole
            if body_len <= size || step == 0 {
                chunks.push(Chunk::new(
                    format!("{}#chunk_{}", filename, section_idx),
                    compose(&section.header, &section.body),
                    section.header.clone(),
                    filename,
                    sequence,
                ));
                sequence += 1;
                continue;
            }

            let offsets = char_offsets(&section.body);
            for (sub_idx, span) in window_spans(body_len, size, overlap).into_iter().enumerate() {
                let piece = &section.body[offsets[span.start]..offsets[span.end]];
                chunks.push(Chunk::new(
                    format!("{}#chunk_{}_{}", filename, section_idx, sub_idx),
                    compose(&section.header, piece),
                    section.header.clone(),
                    filename,
                    sequence,
                ));
                sequence += 1;
            }
        }

        debug!(filename, chunks = chunks.len(), "chunked document");
        chunks
    }

    /// Chunk every document in order
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk(&doc.filename, &doc.raw_text))
            .collect()
    }
}

/// Character spans of the sliding windows over a body of `len` characters.
///
/// Window *i* covers `[i*step, min(i*step + size, len))`; iteration stops
/// once a start reaches `len`. A zero step yields one span over everything.
pub fn window_spans(len: usize, size: usize, overlap: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let step = size.saturating_sub(overlap);
    if step == 0 {
        return vec![0..len];
    }

    let mut spans = Vec::new();
    let mut start = 0;
    while start < len {
        spans.push(start..(start + size).min(len));
        start += step;
    }
    spans
}

/// One to six `#`, then whitespace, then some text
fn is_header_line(line: &str) -> bool {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return false;
    }
    let rest = &line[hashes..];
    match rest.chars().next() {
        Some(c) if c.is_whitespace() => !rest.trim().is_empty(),
        _ => false,
    }
}

fn compose(header: &str, body: &str) -> String {
    if header.is_empty() {
        body.to_string()
    } else {
        format!("{}\n\n{}", header, body)
    }
}

/// Byte offset of every char boundary, plus the end of the string
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}
