use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Splits code-shaped identifiers into lowercase word tokens (§4.8):
/// lowercase, split camelCase boundaries, split on `_`/`-`, strip
/// non-word punctuation, drop tokens of length <2 or >50, drop
/// pure-numeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();

    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-') {
        if raw.is_empty() {
            continue;
        }
        for piece in raw.split(['_', '-']) {
            if piece.is_empty() {
                continue;
            }
            words.extend(split_camel_case(piece));
        }
    }

    words
        .into_iter()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 2 && w.len() <= 50)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

fn split_camel_case(word: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = word.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || (prev.is_uppercase() && next_lower) {
                result.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Posting {
    term_freq: HashMap<String, u32>,
    doc_len: u32,
}

/// Sparse lexical (BM25) index over chunk text (C8, §4.8). Byte-exact
/// round-trip of scores for an unchanged corpus is achieved by persisting
/// the raw postings and recomputing IDF deterministically on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Index {
    k1: f32,
    b: f32,
    min_df: u32,
    max_df_ratio: f32,
    postings: HashMap<String, Posting>,
    /// Stable insertion order, used as the tie-break for equal scores.
    insertion_order: Vec<String>,
    document_frequency: HashMap<String, u32>,
    idf: HashMap<String, f32>,
    avg_doc_len: f32,
}

impl Bm25Index {
    pub fn new(k1: f32, b: f32, min_df: u32, max_df_ratio: f32) -> Self {
        Self {
            k1,
            b,
            min_df,
            max_df_ratio,
            postings: HashMap::new(),
            insertion_order: Vec::new(),
            document_frequency: HashMap::new(),
            idf: HashMap::new(),
            avg_doc_len: 0.0,
        }
    }

    pub fn size(&self) -> usize {
        self.postings.len()
    }

    pub fn vocab_size(&self) -> usize {
        self.idf.len()
    }

    /// Adds or replaces a document, then recomputes IDF (§4.8: "recomputed
    /// after any add/remove batch").
    pub fn add(&mut self, id: impl Into<String>, content: &str) {
        let id = id.into();
        let tokens = tokenize(content);
        let mut term_freq: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *term_freq.entry(token.clone()).or_insert(0) += 1;
        }

        if !self.postings.contains_key(&id) {
            self.insertion_order.push(id.clone());
        } else {
            self.remove_from_df(&id);
        }

        for term in term_freq.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }

        self.postings.insert(
            id,
            Posting {
                term_freq,
                doc_len: tokens.len() as u32,
            },
        );
        self.recompute();
    }

    pub fn remove(&mut self, id: &str) {
        if self.postings.remove(id).is_some() {
            self.remove_from_df(id);
            self.insertion_order.retain(|x| x != id);
            self.recompute();
        }
    }

    fn remove_from_df(&mut self, id: &str) {
        if let Some(posting) = self.postings.get(id) {
            for term in posting.term_freq.keys() {
                if let Some(count) = self.document_frequency.get_mut(term) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.document_frequency.remove(term);
                    }
                }
            }
        }
    }

    fn recompute(&mut self) {
        let n = self.postings.len() as f32;
        self.avg_doc_len = if self.postings.is_empty() {
            0.0
        } else {
            self.postings.values().map(|p| p.doc_len as f32).sum::<f32>() / n
        };

        let disable_upper = n <= 10.0;
        let disable_lower = n <= 5.0;

        self.idf.clear();
        for (term, &df) in &self.document_frequency {
            let df_f = df as f32;
            if !disable_lower && df < self.min_df {
                continue;
            }
            if !disable_upper && df_f > self.max_df_ratio * n {
                continue;
            }
            let idf = ((n - df_f + 0.5) / (df_f + 0.5) + 1.0).ln();
            self.idf.insert(term.clone(), idf);
        }
    }

    fn score_doc(&self, posting: &Posting, query_tokens: &[String]) -> f32 {
        let mut score = 0.0;
        for term in query_tokens {
            let Some(&idf) = self.idf.get(term) else {
                continue;
            };
            let tf = *posting.term_freq.get(term).unwrap_or(&0) as f32;
            if tf == 0.0 {
                continue;
            }
            let denom = tf
                + self.k1
                    * (1.0 - self.b + self.b * posting.doc_len as f32 / self.avg_doc_len.max(1.0));
            score += idf * (tf * (self.k1 + 1.0)) / denom;
        }
        score
    }

    /// Top-`k` documents by summed term score, descending; ties broken by
    /// insertion order (§4.8).
    pub fn search(&self, query: &str, k: usize) -> Vec<(String, f32)> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || self.postings.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, String, f32)> = self
            .insertion_order
            .iter()
            .enumerate()
            .filter_map(|(rank, id)| {
                let posting = self.postings.get(id)?;
                let score = self.score_doc(posting, &query_tokens);
                if score > 0.0 {
                    Some((rank, id.clone(), score))
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        scored.into_iter().take(k).map(|(_, id, s)| (id, s)).collect()
    }
}
