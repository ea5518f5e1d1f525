//! Motivational quotes.
//!
//! Quotes come from a `quotes.txt` (one per line) next to the config file,
//! falling back to a built-in list. Selection is a plain random pick; the
//! multi-pick variant avoids repeats until the pool is exhausted.

use std::path::Path;

use rand::seq::{IndexedRandom, SliceRandom};

/// Fallback when no quote source is usable at all.
const LAST_RESORT: &str = "Keep going - you've got this!";

const BUILTIN_QUOTES: &[&str] = &[
    "The secret of getting ahead is getting started.",
    "Small daily improvements are the key to staggering long-term results.",
    "It always seems impossible until it's done.",
    "Success is the sum of small efforts, repeated day in and day out.",
    "Don't watch the clock; do what it does. Keep going.",
    "The expert in anything was once a beginner.",
    "You don't have to be great to start, but you have to start to be great.",
    "A year from now you may wish you had started today.",
    "Discipline is choosing between what you want now and what you want most.",
    "The best way to predict your future is to create it.",
];

/// A loaded pool of quotes.
pub struct QuotePool {
    quotes: Vec<String>,
}

impl QuotePool {
    /// Load from the default location (`<config dir>/quotes.txt`),
    /// falling back to the built-in list.
    pub fn load_default() -> Self {
        match crate::config::config_dir() {
            Some(dir) => Self::load(&dir.join("quotes.txt")),
            None => Self::builtin(),
        }
    }

    /// Load from a quotes file; built-ins when the file is missing,
    /// unreadable, or empty.
    pub fn load(path: &Path) -> Self {
        let from_file = std::fs::read_to_string(path)
            .map(|contents| {
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if from_file.is_empty() {
            tracing::debug!("No usable quotes at {:?}, using built-ins", path);
            Self::builtin()
        } else {
            Self { quotes: from_file }
        }
    }

    fn builtin() -> Self {
        Self {
            quotes: BUILTIN_QUOTES.iter().map(|q| q.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// One random quote.
    pub fn random(&self) -> String {
        let mut rng = rand::rng();
        self.quotes
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| LAST_RESORT.to_string())
    }

    /// `count` random quotes without repeats; when `count` exceeds the
    /// pool, the pool is recycled in reshuffled batches.
    pub fn unique_random(&self, count: usize) -> Vec<String> {
        if self.quotes.is_empty() {
            return vec![LAST_RESORT.to_string(); count];
        }

        let mut rng = rand::rng();
        let mut result = Vec::with_capacity(count);
        while result.len() < count {
            let remaining = count - result.len();
            let mut batch: Vec<String> = self.quotes.clone();
            batch.shuffle(&mut rng);
            batch.truncate(remaining);
            result.extend(batch);
        }
        result
    }
}
