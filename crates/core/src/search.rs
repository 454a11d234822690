use std::collections::HashMap;
use std::path::Path;

/// One ranked retrieval unit with source attribution.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyHit {
    pub text: String,
    pub source: String,
}

/// Ranked-snippet search over the policy corpus. Implementations must
/// degrade rather than fail: no documents means no hits, never an error.
pub trait PolicySearch: Send + Sync {
    fn search(&self, query: &str, k: usize) -> Vec<PolicyHit>;
}

/// Stand-in when no policy documents exist. Always empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyIndex;

impl PolicySearch for EmptyIndex {
    fn search(&self, _query: &str, _k: usize) -> Vec<PolicyHit> {
        Vec::new()
    }
}

#[derive(Clone, Debug)]
struct Chunk {
    text: String,
    source: String,
    term_weights: HashMap<String, f64>,
    norm: f64,
}

/// In-process TF-IDF cosine index over overlapping document chunks.
///
/// Chunks target `chunk_size` characters with `chunk_overlap` carried
/// across boundaries, keeping each retrieval unit below the LLM context
/// budget while preserving cross-boundary context.
#[derive(Debug, Default)]
pub struct TfIdfIndex {
    chunks: Vec<Chunk>,
    document_frequency: HashMap<String, usize>,
}

impl TfIdfIndex {
    /// Index every `.md` file under `docs_dir`, sorted by name for
    /// deterministic chunk ids. Returns `None` when there is nothing to
    /// index so the caller can fall back to [`EmptyIndex`].
    pub fn build(docs_dir: &Path, chunk_size: usize, chunk_overlap: usize) -> Option<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(docs_dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
            .collect();
        paths.sort();

        let mut raw_chunks = Vec::new();
        for path in paths {
            let Ok(text) = std::fs::read_to_string(&path) else { continue };
            let source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "?".to_string());
            for piece in split_chunks(&text, chunk_size, chunk_overlap) {
                raw_chunks.push((piece, source.clone()));
            }
        }
        if raw_chunks.is_empty() {
            return None;
        }

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let tokenized: Vec<(Vec<String>, String, String)> = raw_chunks
            .into_iter()
            .map(|(text, source)| {
                let terms = tokenize(&text);
                (terms, text, source)
            })
            .collect();
        for (terms, _, _) in &tokenized {
            let mut seen: Vec<&String> = terms.iter().collect();
            seen.sort();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term.clone()).or_default() += 1;
            }
        }

        let chunk_count = tokenized.len() as f64;
        let chunks = tokenized
            .into_iter()
            .map(|(terms, text, source)| {
                let term_weights = weigh(&terms, &document_frequency, chunk_count);
                let norm = vector_norm(&term_weights);
                Chunk { text, source, term_weights, norm }
            })
            .collect();

        Some(Self { chunks, document_frequency })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl PolicySearch for TfIdfIndex {
    fn search(&self, query: &str, k: usize) -> Vec<PolicyHit> {
        let terms = tokenize(query);
        if terms.is_empty() || self.chunks.is_empty() {
            return Vec::new();
        }
        let query_weights = weigh(&terms, &self.document_frequency, self.chunks.len() as f64);
        let query_norm = vector_norm(&query_weights);
        if query_norm == 0.0 {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &Chunk)> = self
            .chunks
            .iter()
            .map(|chunk| (cosine(&query_weights, query_norm, chunk), chunk))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| PolicyHit { text: chunk.text.clone(), source: chunk.source.clone() })
            .collect()
    }
}

/// Split text into overlapping windows, preferring whitespace boundaries
/// so a chunk never ends mid-word.
pub fn split_chunks(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            // back off to the last whitespace inside the window
            if let Some(offset) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                if offset > chunk_size / 2 {
                    end = start + offset;
                }
            }
        }
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim().to_string();
        if !piece.is_empty() {
            chunks.push(piece);
        }
        if start + chunk_size >= chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 1)
        .map(str::to_string)
        .collect()
}

fn weigh(
    terms: &[String],
    document_frequency: &HashMap<String, usize>,
    chunk_count: f64,
) -> HashMap<String, f64> {
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for term in terms {
        *counts.entry(term).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(term, count)| {
            let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
            let idf = ((chunk_count + 1.0) / (df + 1.0)).ln() + 1.0;
            (term.clone(), count as f64 * idf)
        })
        .collect()
}

fn vector_norm(weights: &HashMap<String, f64>) -> f64 {
    weights.values().map(|w| w * w).sum::<f64>().sqrt()
}

fn cosine(query_weights: &HashMap<String, f64>, query_norm: f64, chunk: &Chunk) -> f64 {
    if chunk.norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = query_weights
        .iter()
        .filter_map(|(term, weight)| chunk.term_weights.get(term).map(|cw| weight * cw))
        .sum();
    dot / (query_norm * chunk.norm)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{split_chunks, EmptyIndex, PolicySearch, TfIdfIndex};

    #[test]
    fn empty_index_is_always_empty() {
        assert!(EmptyIndex.search("refund policy", 3).is_empty());
    }

    #[test]
    fn build_returns_none_without_documents() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TfIdfIndex::build(dir.path(), 800, 150).is_none());
        assert!(TfIdfIndex::build(std::path::Path::new("/nonexistent"), 800, 150).is_none());
    }

    #[test]
    fn chunks_overlap_and_respect_word_boundaries() {
        let text = "alpha beta gamma ".repeat(200);
        let chunks = split_chunks(&text, 800, 150);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 800);
            assert!(!chunk.ends_with("alph"), "chunk ends mid-word: {chunk}");
        }
        // consecutive chunks share text
        let tail: String = chunks[0].chars().rev().take(50).collect::<String>();
        let tail: String = tail.chars().rev().collect();
        assert!(chunks[1].contains(tail.split_whitespace().next().unwrap()));
    }

    #[test]
    fn relevant_document_ranks_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut returns = std::fs::File::create(dir.path().join("return_policy.md")).unwrap();
        writeln!(
            returns,
            "Device returns are accepted within 30 days. A replacement device ships after the return is inspected."
        )
        .unwrap();
        let mut billing = std::fs::File::create(dir.path().join("billing.md")).unwrap();
        writeln!(
            billing,
            "Billing disputes are escalated to the billing team. Charges appear within one cycle."
        )
        .unwrap();

        let index = TfIdfIndex::build(dir.path(), 800, 150).unwrap();
        let hits = index.search("how do device returns work", 3);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].source, "return_policy.md");

        assert!(index.search("", 3).is_empty());
    }
}
