use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref ENGLISH: BTreeSet<String> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().map(|w| w.to_string()).collect()
    };
}

/// Stemming algorithm applied to every retained token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    #[default]
    None,
    /// Snowball English, the maintained successor of the Porter algorithm.
    Porter,
}

impl StemmerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StemmerKind::None => "none",
            StemmerKind::Porter => "porter",
        }
    }
}

impl FromStr for StemmerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(StemmerKind::None),
            "porter" | "english" | "snowball" => Ok(StemmerKind::Porter),
            "krovetz" | "kstem" => Err(Error::Config("krovetz stemming is not supported".into())),
            other => Err(Error::Config(format!("unknown stemmer {other:?}"))),
        }
    }
}

impl fmt::Display for StemmerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A case-folded set of words dropped during analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeSet<String>", into = "BTreeSet<String>")]
pub struct StopwordList(BTreeSet<String>);

impl StopwordList {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self(words)
    }

    /// Built-in English list.
    pub fn english() -> Self {
        Self(ENGLISH.clone())
    }

    /// One word per line; blank lines and `#` comments are ignored.
    pub fn from_text(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(|l| l.split('#').next().unwrap_or(""))
                .filter(|l| !l.trim().is_empty()),
        )
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<BTreeSet<String>> for StopwordList {
    fn from(words: BTreeSet<String>) -> Self {
        Self::new(words)
    }
}

impl From<StopwordList> for BTreeSet<String> {
    fn from(list: StopwordList) -> Self {
        list.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub stemmer: StemmerKind,
    pub stopwords: Option<StopwordList>,
}

impl AnalyzerConfig {
    pub fn new(stemmer: StemmerKind, stopwords: Option<StopwordList>) -> Self {
        Self { stemmer, stopwords }
    }

    /// Stable digest of the stemmer and the sorted stopword set.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(b"stemmer=");
        hasher.update(self.stemmer.as_str().as_bytes());
        hasher.update(b"\n");
        match &self.stopwords {
            None => hasher.update(b"stopwords=none\n"),
            Some(list) => {
                hasher.update(format!("stopwords={}\n", list.len()).as_bytes());
                for word in list.iter() {
                    hasher.update(word.as_bytes());
                    hasher.update(b"\n");
                }
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stopwords {
            Some(list) => write!(f, "stem={} stop={}", self.stemmer, list.len()),
            None => write!(f, "stem={} nostop", self.stemmer),
        }
    }
}

/// Turns raw text into index terms.
pub struct Analyzer {
    config: AnalyzerConfig,
    stemmer: Option<Stemmer>,
    fingerprint: String,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let stemmer = match config.stemmer {
            StemmerKind::None => None,
            StemmerKind::Porter => Some(Stemmer::create(Algorithm::English)),
        };
        let fingerprint = config.fingerprint();
        Self { config, stemmer, fingerprint }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// NFKC-normalize, lowercase, split on non-alphanumerics, drop stopwords, stem.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut terms = Vec::new();
        for mat in RE.find_iter(&normalized) {
            let token = mat.as_str();
            if self.is_stopword(token) {
                continue;
            }
            let term = match &self.stemmer {
                Some(stemmer) => stemmer.stem(token).into_owned(),
                None => token.to_string(),
            };
            terms.push(term);
        }
        terms
    }

    fn is_stopword(&self, token: &str) -> bool {
        self.config
            .stopwords
            .as_ref()
            .map_or(false, |list| list.contains(token))
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
