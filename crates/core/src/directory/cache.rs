use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::RwLock;

/// Autocomplete choices are capped by the chat platform.
pub const MAX_SUGGESTIONS: usize = 25;

/// Sorted, de-duplicated round and puzzle names used for suggestions.
///
/// A rebuild reads the sheet before it swaps the sets, so entries recorded
/// while a rebuild is in flight are journaled and merged into its snapshot.
#[derive(Debug, Default)]
pub struct NameCache {
    rounds: RwLock<BTreeSet<String>>,
    names: RwLock<BTreeSet<String>>,
    journal: Mutex<Journal>,
}

#[derive(Debug, Default)]
struct Journal {
    rebuilds_in_flight: usize,
    rounds: BTreeSet<String>,
    names: BTreeSet<String>,
}

/// An open rebuild. Dropping it without [`CacheRebuild::finish`] leaves the
/// cache untouched.
#[must_use]
pub struct CacheRebuild<'a> {
    cache: &'a NameCache,
}

impl NameCache {
    /// Starts journaling [`NameCache::record`] calls. Take this before reading
    /// the snapshot that will be passed to [`CacheRebuild::finish`].
    pub fn begin_rebuild(&self) -> CacheRebuild<'_> {
        self.journal().rebuilds_in_flight += 1;
        CacheRebuild { cache: self }
    }

    pub async fn replace<R, N>(&self, rounds: R, names: N)
    where
        R: IntoIterator<Item = String>,
        N: IntoIterator<Item = String>,
    {
        self.begin_rebuild().finish(rounds, names).await;
    }

    pub async fn record(&self, round: Option<&str>, name: &str) {
        let round = round.filter(|value| is_cacheable(value));
        let name = Some(name).filter(|value| is_cacheable(value));

        {
            let mut journal = self.journal();
            if journal.rebuilds_in_flight > 0 {
                journal.rounds.extend(round.map(str::to_owned));
                journal.names.extend(name.map(str::to_owned));
            }
        }

        if let Some(round) = round {
            self.rounds.write().await.insert(round.to_owned());
        }
        if let Some(name) = name {
            self.names.write().await.insert(name.to_owned());
        }
    }

    pub async fn rounds(&self) -> Vec<String> {
        self.rounds.read().await.iter().cloned().collect()
    }

    pub async fn names(&self) -> Vec<String> {
        self.names.read().await.iter().cloned().collect()
    }

    pub async fn suggest_rounds(&self, query: &str, limit: usize) -> Vec<String> {
        suggest(&*self.rounds.read().await, query, limit)
    }

    pub async fn suggest_names(&self, query: &str, limit: usize) -> Vec<String> {
        suggest(&*self.names.read().await, query, limit)
    }

    pub async fn counts(&self) -> (usize, usize) {
        (self.rounds.read().await.len(), self.names.read().await.len())
    }
}

impl NameCache {
    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheRebuild<'_> {
    /// Swaps in the scanned sets plus everything recorded since
    /// [`NameCache::begin_rebuild`].
    pub async fn finish<R, N>(self, rounds: R, names: N)
    where
        R: IntoIterator<Item = String>,
        N: IntoIterator<Item = String>,
    {
        let mut rounds: BTreeSet<String> =
            rounds.into_iter().filter(|value| is_cacheable(value)).collect();
        let mut names: BTreeSet<String> =
            names.into_iter().filter(|value| is_cacheable(value)).collect();

        let mut current_rounds = self.cache.rounds.write().await;
        let mut current_names = self.cache.names.write().await;
        {
            let journal = self.cache.journal();
            rounds.extend(journal.rounds.iter().cloned());
            names.extend(journal.names.iter().cloned());
        }
        *current_rounds = rounds;
        *current_names = names;
    }
}

impl Drop for CacheRebuild<'_> {
    fn drop(&mut self) {
        let mut journal = self.cache.journal();
        journal.rebuilds_in_flight = journal.rebuilds_in_flight.saturating_sub(1);
        if journal.rebuilds_in_flight == 0 {
            journal.rounds.clear();
            journal.names.clear();
        }
    }
}

fn is_cacheable(value: &str) -> bool {
    !value.trim().is_empty()
}

fn suggest(values: &BTreeSet<String>, query: &str, limit: usize) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    values
        .iter()
        .filter(|value| value.to_lowercase().contains(&needle))
        .take(limit.min(MAX_SUGGESTIONS))
        .cloned()
        .collect()
}
