//! Stitcher for combining per-window transcriptions.
//!
//! Adjacent windows share `overlap_s` of audio, so the words spoken in that
//! span usually appear at the end of one chunk and again at the start of the
//! next. For every boundary the stitcher:
//!
//! 1. Takes the tokens of the earlier chunk near its end and the tokens of the
//!    later chunk near its start (by timestamp when the model reports them,
//!    by token count otherwise).
//! 2. Finds the longest contiguous run of matching tokens between the two.
//!    Tokens compare case- and punctuation-insensitively.
//! 3. Cuts the earlier chunk just before the run and starts the later chunk
//!    at the run, so the shared words are emitted once, from the later chunk.
//!    Without a run, both sides are cut at the midpoint of the overlap.
//!
//! Timestamps are shifted into the source timeline and cut at the same
//! points as the text.

use crate::defaults;
use crate::pipeline::transcript::{ChunkResult, Transcript};
use crate::stt::TimedText;
use serde::{Deserialize, Serialize};

/// Part of the overlap added on each side of the candidate region for timed
/// tokens, to catch words straddling the window edge.
const TIMED_SLACK_FRACTION: f64 = 0.25;

/// Configuration for the stitcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitcherConfig {
    /// Whether to deduplicate words at chunk boundaries.
    pub deduplicate_boundaries: bool,
    /// Minimum word length for a single-word match to count.
    pub min_word_length: usize,
    /// Minimum tokens searched per side when the model reports no timestamps.
    pub min_candidate_tokens: usize,
    /// Remove non-speech annotations like `[BLANK_AUDIO]` or `(music)`.
    pub strip_annotations: bool,
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            deduplicate_boundaries: true,
            min_word_length: defaults::MIN_WORD_LENGTH,
            min_candidate_tokens: defaults::MIN_CANDIDATE_TOKENS,
            strip_annotations: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    key: String,
    start_s: f64,
    end_s: f64,
    /// Index of the timed span this token came from.
    span: usize,
}

impl Token {
    fn new(text: &str, start_s: f64, end_s: f64, span: usize) -> Self {
        Self {
            text: text.to_string(),
            key: normalize(text),
            start_s,
            end_s,
            span,
        }
    }

    fn center(&self) -> f64 {
        (self.start_s + self.end_s) / 2.0
    }
}

/// Tokens of one chunk in the source timeline.
#[derive(Debug)]
struct ChunkTokens {
    tokens: Vec<Token>,
    timed: bool,
    start_s: f64,
    end_s: f64,
}

/// Merges ordered chunk results into one [`Transcript`].
#[derive(Debug, Clone)]
pub struct Stitcher {
    config: StitcherConfig,
    sample_rate: u32,
}

impl Stitcher {
    /// Creates a new stitcher with default configuration.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_config(StitcherConfig::default(), sample_rate)
    }

    /// Creates a new stitcher with custom configuration.
    pub fn with_config(config: StitcherConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
        }
    }

    pub fn config(&self) -> &StitcherConfig {
        &self.config
    }

    /// Stitches `chunks`, which must be sorted by window index.
    pub fn stitch(
        &self,
        chunks: &[ChunkResult],
        return_timestamps: bool,
        duration_s: f64,
    ) -> Transcript {
        debug_assert!(
            chunks.windows(2).all(|p| p[0].index() < p[1].index()),
            "chunk results must be in window order"
        );
        if chunks.is_empty() {
            return Transcript::empty(duration_s, return_timestamps);
        }

        let tokenized: Vec<ChunkTokens> = chunks.iter().map(|c| self.tokenize(c)).collect();

        // Kept token range per chunk.
        let mut bounds: Vec<(usize, usize)> =
            tokenized.iter().map(|c| (0, c.tokens.len())).collect();
        for k in 1..tokenized.len() {
            let (prev_hi, next_lo) =
                self.resolve_boundary(&tokenized[k - 1], bounds[k - 1].0, &tokenized[k]);
            bounds[k - 1].1 = prev_hi;
            bounds[k].0 = next_lo;
            tracing::trace!(
                boundary = k,
                dropped_prev = tokenized[k - 1].tokens.len() - prev_hi,
                dropped_next = next_lo,
                "resolved chunk boundary"
            );
        }

        let text = tokenized
            .iter()
            .zip(&bounds)
            .flat_map(|(chunk, &(lo, hi))| chunk.tokens[lo..hi].iter())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let timestamps = return_timestamps.then(|| build_records(&tokenized, &bounds));

        Transcript {
            text,
            timestamps,
            duration_s,
            chunk_count: chunks.len(),
        }
    }

    /// Strips Whisper non-speech annotations when configured.
    fn clean(&self, text: &str) -> String {
        if self.config.strip_annotations {
            clean_transcription(text)
        } else {
            text.trim().to_string()
        }
    }

    fn tokenize(&self, chunk: &ChunkResult) -> ChunkTokens {
        let start_s = chunk.window.start_s(self.sample_rate);
        let end_s = chunk.window.end_s(self.sample_rate);
        let mut tokens = Vec::new();

        let timed = match chunk.output.timestamps.as_deref() {
            Some(spans) if !spans.is_empty() => {
                let mut ordered: Vec<&TimedText> = spans.iter().collect();
                ordered.sort_by(|a, b| a.start_s.total_cmp(&b.start_s));

                for (span_idx, span) in ordered.into_iter().enumerate() {
                    let text = self.clean(&span.text);
                    let words: Vec<&str> = text.split_whitespace().collect();
                    if words.is_empty() {
                        continue;
                    }
                    let s = (start_s + span.start_s.max(0.0)).min(end_s);
                    let e = (start_s + span.end_s.max(0.0)).clamp(s, end_s);

                    // Spread the span's time over its words by character count.
                    let total = words
                        .iter()
                        .map(|w| w.chars().count())
                        .sum::<usize>()
                        .max(1) as f64;
                    let mut consumed = 0usize;
                    for word in words {
                        let word_start = s + (e - s) * consumed as f64 / total;
                        consumed += word.chars().count();
                        let word_end = s + (e - s) * consumed as f64 / total;
                        tokens.push(Token::new(word, word_start, word_end, span_idx));
                    }
                }
                true
            }
            _ => {
                let text = self.clean(&chunk.output.text);
                let words: Vec<&str> = text.split_whitespace().collect();
                let n = words.len().max(1) as f64;
                let duration = end_s - start_s;
                for (k, word) in words.into_iter().enumerate() {
                    tokens.push(Token::new(
                        word,
                        start_s + duration * k as f64 / n,
                        start_s + duration * (k + 1) as f64 / n,
                        0,
                    ));
                }
                false
            }
        };

        ChunkTokens {
            tokens,
            timed,
            start_s,
            end_s,
        }
    }

    /// Returns `(prev_hi, next_lo)`: the earlier chunk keeps
    /// `tokens[prev_lo..prev_hi]`, the later chunk starts at `next_lo`.
    fn resolve_boundary(
        &self,
        prev: &ChunkTokens,
        prev_lo: usize,
        next: &ChunkTokens,
    ) -> (usize, usize) {
        let prev_len = prev.tokens.len();
        if !self.config.deduplicate_boundaries || prev_lo >= prev_len || next.tokens.is_empty() {
            return (prev_len, 0);
        }

        let overlap_start = next.start_s;
        let overlap_end = prev.end_s;
        if overlap_end <= overlap_start {
            return (prev_len, 0);
        }
        let overlap = overlap_end - overlap_start;

        let tail_from = self.tail_start(prev, overlap_start, overlap).max(prev_lo);
        let head_to = self.head_end(next, overlap_end, overlap);

        if let Some((i, j)) = self.longest_run(
            &prev.tokens[tail_from..],
            &next.tokens[..head_to],
            (overlap_start, overlap_end),
        ) {
            return (tail_from + i, j);
        }

        let midpoint = overlap_start + overlap / 2.0;
        let prev_hi = prev_lo
            + prev.tokens[prev_lo..]
                .iter()
                .take_while(|t| t.center() < midpoint)
                .count();
        let next_lo = next
            .tokens
            .iter()
            .take_while(|t| t.center() < midpoint)
            .count();
        tracing::debug!(midpoint, "no matching run at boundary, split at overlap midpoint");
        (prev_hi, next_lo)
    }

    /// First token of `chunk` that may fall inside an overlap starting at `overlap_start`.
    fn tail_start(&self, chunk: &ChunkTokens, overlap_start: f64, overlap: f64) -> usize {
        let len = chunk.tokens.len();
        if chunk.timed {
            let edge = overlap_start - overlap * TIMED_SLACK_FRACTION;
            chunk
                .tokens
                .iter()
                .position(|t| t.end_s > edge)
                .unwrap_or(len)
        } else {
            len.saturating_sub(self.candidate_count(chunk, overlap))
        }
    }

    /// One past the last token of `chunk` that may fall inside an overlap ending at `overlap_end`.
    fn head_end(&self, chunk: &ChunkTokens, overlap_end: f64, overlap: f64) -> usize {
        let len = chunk.tokens.len();
        if chunk.timed {
            let edge = overlap_end + overlap * TIMED_SLACK_FRACTION;
            chunk
                .tokens
                .iter()
                .position(|t| t.start_s >= edge)
                .unwrap_or(len)
        } else {
            self.candidate_count(chunk, overlap).min(len)
        }
    }

    /// Twice the token count expected in the overlap, at least `min_candidate_tokens`.
    fn candidate_count(&self, chunk: &ChunkTokens, overlap: f64) -> usize {
        let len = chunk.tokens.len();
        let duration = chunk.end_s - chunk.start_s;
        let expected = if duration > 0.0 {
            (len as f64 * overlap / duration).ceil() as usize
        } else {
            len
        };
        (expected * 2).max(self.config.min_candidate_tokens).min(len)
    }

    /// Longest contiguous run of equal keys, as `(start in tail, start in head)`.
    ///
    /// Equal-length runs prefer the earliest start in `head`, then the latest
    /// start in `tail`, so the later chunk contributes as much as possible.
    /// A run of one token must also pass [`Self::single_token_matches`].
    fn longest_run(
        &self,
        tail: &[Token],
        head: &[Token],
        overlap: (f64, f64),
    ) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, usize)> = None;
        let mut prev_row = vec![0usize; head.len() + 1];

        for (i, t) in tail.iter().enumerate() {
            let mut row = vec![0usize; head.len() + 1];
            for (j, h) in head.iter().enumerate() {
                if t.key.is_empty() || t.key != h.key {
                    continue;
                }
                let run = prev_row[j] + 1;
                row[j + 1] = run;

                if run == 1 && !self.single_token_matches(t, h, overlap) {
                    continue;
                }
                let (ti, hj) = (i + 1 - run, j + 1 - run);
                let better = match best {
                    None => true,
                    Some((len, bi, bj)) => {
                        run > len || (run == len && (hj < bj || (hj == bj && ti > bi)))
                    }
                };
                if better {
                    best = Some((run, ti, hj));
                }
            }
            prev_row = row;
        }

        best.map(|(_, i, j)| (i, j))
    }

    /// A lone matching word anchors the split only when it is long enough and
    /// both occurrences sit in the overlap at roughly the same source time.
    fn single_token_matches(&self, tail: &Token, head: &Token, overlap: (f64, f64)) -> bool {
        if tail.key.chars().count() < self.config.min_word_length {
            return false;
        }
        let (start, end) = overlap;
        let slack = (end - start) * TIMED_SLACK_FRACTION;
        let inside = |t: &Token| (start - slack..=end + slack).contains(&t.center());
        inside(tail) && inside(head) && (tail.center() - head.center()).abs() <= (end - start) / 2.0
    }
}

/// One record per kept timed span (or per chunk without timestamps), made
/// monotonic and non-overlapping.
fn build_records(tokenized: &[ChunkTokens], bounds: &[(usize, usize)]) -> Vec<TimedText> {
    let mut records: Vec<TimedText> = Vec::new();

    for (chunk, &(lo, hi)) in tokenized.iter().zip(bounds) {
        let kept = &chunk.tokens[lo..hi];
        if kept.is_empty() {
            continue;
        }
        if chunk.timed {
            let mut group_start = 0;
            for k in 1..=kept.len() {
                if k == kept.len() || kept[k].span != kept[group_start].span {
                    records.push(record_for(&kept[group_start..k]));
                    group_start = k;
                }
            }
        } else {
            records.push(record_for(kept));
        }
    }

    let mut last_end = 0.0f64;
    for record in &mut records {
        record.start_s = record.start_s.max(last_end);
        record.end_s = record.end_s.max(record.start_s);
        last_end = record.end_s;
    }
    records
}

fn record_for(tokens: &[Token]) -> TimedText {
    let text = tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let start_s = tokens.first().map_or(0.0, |t| t.start_s);
    let end_s = tokens.last().map_or(start_s, |t| t.end_s);
    TimedText::new(start_s, end_s, text)
}

/// Lowercased alphanumeric characters of a word.
fn normalize(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Strips Whisper non-speech annotations in any language.
///
/// Whisper wraps annotations in `[…]`, `*…*`, or `(…)`; these never contain
/// real speech. Unmatched opening delimiters are kept as-is.
pub fn clean_transcription(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        let close = match ch {
            '[' => ']',
            '(' => ')',
            '*' => '*',
            _ => {
                result.push(ch);
                continue;
            }
        };
        let mut buf = String::new();
        let mut found_close = false;
        while let Some(&inner) = chars.peek() {
            chars.next();
            if inner == close {
                found_close = true;
                break;
            }
            buf.push(inner);
        }
        if !found_close {
            result.push(ch);
            result.push_str(&buf);
        } else {
            // keep words on either side of the annotation apart
            result.push(' ');
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
