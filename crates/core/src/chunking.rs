use crate::error::ChatError;
use crate::models::SessionOptions;
use std::collections::VecDeque;

const SEPARATOR: char = '\n';

/// Sizes are measured in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            overlap: 200,
        }
    }
}

impl From<&SessionOptions> for ChunkingConfig {
    fn from(value: &SessionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.chunk_size == 0 {
            return Err(ChatError::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(ChatError::InvalidConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }
}

/// Splits on line breaks and greedily packs lines into chunks of at most
/// `chunk_size` characters. Each new chunk starts with the trailing lines of
/// the previous one, up to `overlap` characters. Lines longer than a chunk are
/// cut into fixed windows that advance by `chunk_size - overlap`.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let pieces = text
        .split(SEPARATOR)
        .filter(|line| !line.trim().is_empty())
        .flat_map(|line| window_line(line, config))
        .collect::<Vec<_>>();

    merge_pieces(pieces, config)
}

fn window_line(line: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= config.chunk_size {
        return vec![line.to_string()];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = start.saturating_add(config.stride());
    }

    windows
}

fn merge_pieces(pieces: Vec<String>, config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<(String, usize)> = VecDeque::new();
    // character length of `current` joined with separators
    let mut total = 0usize;

    for piece in pieces {
        let len = piece.chars().count();
        let joiner = usize::from(!current.is_empty());

        if total + joiner + len > config.chunk_size {
            push_chunk(&mut chunks, &current);

            while let Some(&(_, first_len)) = current.front() {
                let fits = total + 1 + len <= config.chunk_size;
                if total <= config.overlap && fits {
                    break;
                }
                total -= first_len + usize::from(current.len() > 1);
                current.pop_front();
            }
        }

        total += len + usize::from(!current.is_empty());
        current.push_back((piece, len));
    }

    push_chunk(&mut chunks, &current);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, current: &VecDeque<(String, usize)>) {
    if current.is_empty() {
        return;
    }

    let joined = current
        .iter()
        .map(|(piece, _)| piece.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
