//! License text identification by word n-gram overlap.
//!
//! A sample is scored against each template as the fraction of the
//! template's 3-word shingles that also occur in the sample, after the
//! sample has been reduced to the template's vocabulary. Templates live in a
//! directory as `<ID>.txt` files; bracketed placeholders such as `<year>` are
//! removed before tokenizing.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;

/// Words per shingle.
pub const NGRAM_SIZE: usize = 3;

/// Minimum fraction of the template's word count a sample must reach.
const WORDS_THRESHOLD: f64 = 0.9;

/// Scores strictly above this are close matches.
pub const CLOSE_MATCH_THRESHOLD: f64 = 0.9;

/// Scores at or above this are trusted as identifications.
pub const MATCH_THRESHOLD: f64 = 0.9;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

/// Remove `<...>` placeholder spans from template text.
///
/// A span runs from the first `<` to the last `>` on the same line and must
/// enclose at least one character, so `<>` is left alone.
pub fn strip_placeholders(text: &str) -> Cow<'_, str> {
    let re = PLACEHOLDER_RE.get_or_init(|| Regex::new(r"<.+>").expect("valid placeholder regex"));
    re.replace_all(text, "")
}

/// Shingles of the template found in a sample, out of all template shingles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgramMatch {
    pub matched: usize,
    pub total: usize,
}

impl NgramMatch {
    const NONE: NgramMatch = NgramMatch {
        matched: 0,
        total: 1,
    };

    pub fn score(&self) -> f64 {
        self.matched as f64 / self.total as f64
    }
}

fn too_short(sample_len: usize, template_len: usize) -> bool {
    (sample_len as f64) < WORDS_THRESHOLD * template_len as f64
}

fn shingles<'a>(words: &'a [&'a str], n: usize) -> HashSet<&'a [&'a str]> {
    words.windows(n).collect()
}

/// Count how many of the template's `n`-word shingles occur in the sample.
pub fn ngrams_matched(sample: &[&str], template: &[&str], n: usize) -> NgramMatch {
    if too_short(sample.len(), template.len()) {
        return NgramMatch::NONE;
    }

    let vocabulary: HashSet<&str> = template.iter().copied().collect();
    let relevant: Vec<&str> = sample
        .iter()
        .copied()
        .filter(|w| vocabulary.contains(w))
        .collect();

    if too_short(relevant.len(), template.len()) {
        return NgramMatch::NONE;
    }

    let template_grams = shingles(template, n);
    if template_grams.is_empty() {
        return NgramMatch::NONE;
    }
    let sample_grams = shingles(&relevant, n);

    NgramMatch {
        matched: template_grams.intersection(&sample_grams).count(),
        total: template_grams.len(),
    }
}

/// The outcome of classifying a text sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub license_id: Option<String>,
    pub score: f64,
}

impl Identification {
    /// The sample could not be classified.
    pub fn none() -> Self {
        Self {
            license_id: None,
            score: 0.0,
        }
    }

    pub fn is_confident(&self) -> bool {
        self.license_id.is_some() && self.score >= MATCH_THRESHOLD
    }

    /// The identified license, if the score clears [`MATCH_THRESHOLD`].
    pub fn confident_id(&self) -> Option<&str> {
        if self.is_confident() {
            self.license_id.as_deref()
        } else {
            None
        }
    }
}

/// Tokenized license templates keyed by identifier.
#[derive(Debug, Default)]
pub struct TemplateCorpus {
    templates: BTreeMap<String, Vec<String>>,
}

impl TemplateCorpus {
    /// Load `<dir>/<id>.txt` for each identifier. Missing templates are skipped.
    pub fn load(dir: &Path, license_ids: &[&str]) -> Self {
        let mut templates = BTreeMap::new();
        for id in license_ids {
            let path = dir.join(format!("{id}.txt"));
            if !path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    templates.insert(id.to_string(), tokenize_template(&text));
                }
                Err(e) => {
                    tracing::warn!(template = %path.display(), "skipping unreadable license template: {e}");
                }
            }
        }
        tracing::debug!(dir = %dir.display(), loaded = templates.len(), "loaded license templates");
        Self { templates }
    }

    /// Build a corpus from in-memory template texts.
    pub fn from_texts<I, K, V>(texts: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let templates = texts
            .into_iter()
            .map(|(id, text)| (id.into(), tokenize_template(text.as_ref())))
            .collect();
        Self { templates }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn contains(&self, license_id: &str) -> bool {
        self.templates.contains_key(license_id)
    }

    /// Classify pre-split sample words against every template.
    ///
    /// Among close matches the template with the most matched shingles wins,
    /// which favors long specific templates over short ones that saturate
    /// easily. Without a close match the highest score wins.
    pub fn identify_words(&self, words: &[&str]) -> Identification {
        let matches: Vec<(&str, NgramMatch)> = self
            .templates
            .iter()
            .map(|(id, template)| {
                let template: Vec<&str> = template.iter().map(String::as_str).collect();
                (id.as_str(), ngrams_matched(words, &template, NGRAM_SIZE))
            })
            .collect();

        let mut best: Option<(&str, NgramMatch)> = None;
        for &(id, m) in matches.iter().filter(|(_, m)| m.score() > CLOSE_MATCH_THRESHOLD) {
            if best.map_or(true, |(_, b)| m.matched > b.matched) {
                best = Some((id, m));
            }
        }
        if best.is_none() {
            for &(id, m) in &matches {
                if best.map_or(true, |(_, b)| m.score() > b.score()) {
                    best = Some((id, m));
                }
            }
        }

        match best {
            Some((id, m)) => Identification {
                license_id: Some(id.to_string()),
                score: m.score(),
            },
            None => Identification::none(),
        }
    }

    pub fn identify_text(&self, text: &str) -> Identification {
        let words: Vec<&str> = text.split_whitespace().collect();
        self.identify_words(&words)
    }
}

fn tokenize_template(text: &str) -> Vec<String> {
    strip_placeholders(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Classify the file at `path`. Unreadable or non-UTF-8 content yields
/// [`Identification::none`].
pub fn identify_license(path: &Path, corpus: &TemplateCorpus) -> Identification {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(file = %path.display(), "cannot read file for classification: {e}");
            return Identification::none();
        }
    };
    match String::from_utf8(bytes) {
        Ok(text) => corpus.identify_text(&text),
        Err(_) => {
            tracing::debug!(file = %path.display(), "not UTF-8 text; skipping classification");
            Identification::none()
        }
    }
}

/// Template corpora memoized by the set of identifiers requested.
///
/// Safe to share across worker threads: each key is built at most once,
/// even when several workers ask for it at the same time.
#[derive(Debug)]
pub struct TemplateCache {
    dir: PathBuf,
    entries: Mutex<HashMap<String, Arc<OnceLock<Arc<TemplateCorpus>>>>>,
}

impl TemplateCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The corpus holding the templates available for `license_ids`.
    pub fn corpus<S: AsRef<str>>(&self, license_ids: &[S]) -> Arc<TemplateCorpus> {
        let mut ids: Vec<&str> = license_ids.iter().map(AsRef::as_ref).collect();
        ids.sort_unstable();
        ids.dedup();
        let key = ids.join(",");

        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(entries.entry(key).or_default())
        };
        Arc::clone(cell.get_or_init(|| Arc::new(TemplateCorpus::load(&self.dir, &ids))))
    }

    /// Classify the file at `path` against the templates for `license_ids`.
    pub fn identify<S: AsRef<str>>(&self, path: &Path, license_ids: &[S]) -> Identification {
        identify_license(path, &self.corpus(license_ids))
    }
}
