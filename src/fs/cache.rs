//! Path keyed cache of directory listings and the fetch logic in front of it.
//!
//! A path that has been fetched successfully is served from memory until it is
//! invalidated with [`FileListingCache::clear_cache`] or refreshed with
//! [`FileListingCache::refresh_files`]. Entries never expire and the cache has no
//! size bound.
//!
//! The state lock is never held across the network await. Two fetches for the same
//! uncached path that overlap both go to the source, and whichever finishes last
//! owns the cached entry. A fetch that finishes after the user moved elsewhere
//! still writes its result.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, error, warn};

use crate::{
    router::{Navigator, Route},
    storage::{KeyValueStore, JWT_KEY},
};

use super::{partition, ErrorInfo, FetchError, Listing, ListingEntry, ListingSource};

#[derive(Default)]
struct ListingState {
    cache: HashMap<String, Listing>,
    current_path: String,
    loading: bool,
    error: Option<ErrorInfo>,
    folders: Vec<ListingEntry>,
    files: Vec<ListingEntry>,
}

impl ListingState {
    fn show(&mut self, listing: Option<&[ListingEntry]>) {
        let (folders, files) = partition(listing);
        self.folders = folders;
        self.files = files;
    }

    fn fail(&mut self, error: &FetchError) {
        self.error = Some(ErrorInfo::from(error));
        self.folders.clear();
        self.files.clear();
    }
}

/// Resets the loading flag when a fetch ends, however it ends
struct LoadingGuard<'a> {
    state: &'a Mutex<ListingState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).loading = false;
    }
}

fn lock(state: &Mutex<ListingState>) -> MutexGuard<'_, ListingState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct FileListingCache<S, K: ?Sized, N: ?Sized> {
    source: S,
    tokens: Arc<K>,
    navigator: Arc<N>,
    state: Mutex<ListingState>,
}

impl<S, K, N> FileListingCache<S, K, N>
where
    S: ListingSource,
    K: KeyValueStore + ?Sized,
    N: Navigator + ?Sized,
{
    pub fn new(source: S, tokens: Arc<K>, navigator: Arc<N>) -> Self {
        FileListingCache {
            source,
            tokens,
            navigator,
            state: Mutex::new(ListingState::default()),
        }
    }

    /// Show the listing at `path`, from the cache when possible.
    ///
    /// A cache hit completes without calling the source. A miss makes exactly one
    /// source call and caches the result, including an empty (`None`) listing. On
    /// failure nothing is cached, the error is recorded and returned, and a 401
    /// additionally sends the navigator to [`Route::Login`].
    pub async fn fetch_files(&self, path: &str) -> Result<(), FetchError> {
        if path.is_empty() {
            return Err(FetchError::EmptyPath);
        }

        {
            let mut state = self.state();
            state.loading = true;
            state.current_path = path.to_owned();
            state.error = None;
        }
        let _loading = LoadingGuard { state: &self.state };

        {
            let mut state = self.state();
            if let Some(listing) = state.cache.get(path).cloned() {
                debug!(path, "serving listing from cache");
                state.show(listing.as_deref());
                return Ok(());
            }
        }

        debug!(path, "fetching listing from server");
        let token = self.tokens.get(JWT_KEY);
        match self.source.list(path, token.as_deref()).await {
            Ok(listing) => {
                let mut state = self.state();
                state.show(listing.as_deref());
                state.cache.insert(path.to_owned(), listing);
                Ok(())
            }
            Err(err) if err.is_unauthenticated() => {
                warn!(path, error = %err, "listing request was not authenticated");
                self.state().fail(&err);
                self.navigator.navigate(Route::Login);
                Err(err)
            }
            Err(err) => {
                error!(path, error = %err, "failed to fetch listing");
                self.state().fail(&err);
                Err(err)
            }
        }
    }

    /// Forget the listing for `path`, or every listing when `path` is `None`
    pub fn clear_cache(&self, path: Option<&str>) {
        let mut state = self.state();
        match path {
            Some(path) => {
                if state.cache.remove(path).is_some() {
                    debug!(path, "invalidated cached listing");
                }
            }
            None => {
                debug!(entries = state.cache.len(), "cleared listing cache");
                state.cache.clear();
            }
        }
    }

    /// Fetch `path` from the source even if it is cached
    pub async fn refresh_files(&self, path: &str) -> Result<(), FetchError> {
        self.clear_cache(Some(path));
        self.fetch_files(path).await
    }

    pub fn current_path(&self) -> String {
        self.state().current_path.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.state().error.clone()
    }

    /// Directories of the listing currently shown
    pub fn folders(&self) -> Vec<ListingEntry> {
        self.state().folders.clone()
    }

    /// Files of the listing currently shown
    pub fn files(&self) -> Vec<ListingEntry> {
        self.state().files.clone()
    }

    /// The stored listing for `path`. The outer `None` means `path` is not cached.
    pub fn cached(&self, path: &str) -> Option<Listing> {
        self.state().cache.get(path).cloned()
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.state().cache.contains_key(path)
    }

    pub fn cached_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state().cache.keys().cloned().collect();
        paths.sort_unstable();
        paths
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn state(&self) -> MutexGuard<'_, ListingState> {
        lock(&self.state)
    }
}
