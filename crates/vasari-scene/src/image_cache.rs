//! Decoded image cache keyed by source (file path or `data:` URI).
//!
//! Entries move from `Loading` to `Ready` or `Failed` when a decode
//! completes. Failed sources stay failed for the life of the cache so they
//! are never re-requested. Ready entries are evicted least recently used
//! first once the byte budget is exceeded.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use vasari_surface::RasterImage;

const DEFAULT_MAX_BYTES: usize = 128 * 1024 * 1024;

#[derive(Clone)]
enum CacheEntry {
    Loading { request_id: u64 },
    Ready { image: Arc<RasterImage>, bytes: usize },
    Failed,
}

/// Answer to a lookup.
#[derive(Clone)]
pub enum ImageLookup {
    Ready(Arc<RasterImage>),
    /// A decode is already in flight.
    Loading,
    Failed,
    /// Not seen before: the caller must start a decode under this id.
    Start(u64),
}

pub struct ImageCache {
    map: HashMap<String, CacheEntry>,
    lru: VecDeque<String>,
    in_flight: HashMap<u64, String>,
    next_request: u64,
    max_bytes: usize,
    total_bytes: usize,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCache {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            lru: VecDeque::new(),
            in_flight: HashMap::new(),
            next_request: 1,
            max_bytes: DEFAULT_MAX_BYTES,
            total_bytes: 0,
        }
    }

    pub fn set_max_bytes(&mut self, bytes: usize) {
        self.max_bytes = bytes;
        self.evict_if_needed();
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Look up `source`, reserving a request id the first time it is seen.
    pub fn lookup(&mut self, source: &str) -> ImageLookup {
        match self.map.get(source) {
            Some(CacheEntry::Ready { image, .. }) => {
                let image = image.clone();
                self.touch(source);
                ImageLookup::Ready(image)
            }
            Some(CacheEntry::Loading { .. }) => ImageLookup::Loading,
            Some(CacheEntry::Failed) => ImageLookup::Failed,
            None => {
                let request_id = self.next_request;
                self.next_request += 1;
                self.map.insert(source.to_string(), CacheEntry::Loading { request_id });
                self.in_flight.insert(request_id, source.to_string());
                ImageLookup::Start(request_id)
            }
        }
    }

    /// Cached image for `source`, if decoded.
    pub fn get(&self, source: &str) -> Option<Arc<RasterImage>> {
        match self.map.get(source)? {
            CacheEntry::Ready { image, .. } => Some(image.clone()),
            _ => None,
        }
    }

    pub fn is_failed(&self, source: &str) -> bool {
        matches!(self.map.get(source), Some(CacheEntry::Failed))
    }

    /// Record the outcome of request `request_id`. Returns the source it was
    /// for and the image on success, or `None` for unknown ids.
    pub fn complete(&mut self, request_id: u64, image: Option<RasterImage>) -> Option<(String, Option<Arc<RasterImage>>)> {
        let source = self.in_flight.remove(&request_id)?;
        match self.map.get(&source) {
            Some(CacheEntry::Loading { request_id: current }) if *current == request_id => {}
            _ => return None,
        }
        match image {
            Some(image) => {
                let bytes = image.width() as usize * image.height() as usize * 4;
                let image = Arc::new(image);
                self.map.insert(
                    source.clone(),
                    CacheEntry::Ready {
                        image: image.clone(),
                        bytes,
                    },
                );
                self.total_bytes += bytes;
                self.lru.push_back(source.clone());
                self.evict_if_needed();
                Some((source, Some(image)))
            }
            None => {
                self.map.insert(source.clone(), CacheEntry::Failed);
                Some((source, None))
            }
        }
    }

    fn touch(&mut self, source: &str) {
        if let Some(pos) = self.lru.iter().position(|k| k == source) {
            if let Some(key) = self.lru.remove(pos) {
                self.lru.push_back(key);
            }
        }
    }

    fn evict_if_needed(&mut self) {
        while self.total_bytes > self.max_bytes {
            let Some(old) = self.lru.pop_front() else {
                break;
            };
            if let Some(CacheEntry::Ready { bytes, .. }) = self.map.remove(&old) {
                self.total_bytes = self.total_bytes.saturating_sub(bytes);
                tracing::debug!(bytes, "image cache: evicted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(w: u32, h: u32) -> RasterImage {
        RasterImage::from_rgba(w, h, vec![255; (w * h * 4) as usize]).unwrap()
    }

    #[test]
    fn first_lookup_starts_a_request_then_waits() {
        let mut cache = ImageCache::new();
        let ImageLookup::Start(id) = cache.lookup("a.png") else {
            panic!("expected a new request");
        };
        assert!(matches!(cache.lookup("a.png"), ImageLookup::Loading));
        let (source, ready) = cache.complete(id, Some(image(2, 2))).unwrap();
        assert_eq!(source, "a.png");
        assert!(ready.is_some());
        assert!(matches!(cache.lookup("a.png"), ImageLookup::Ready(_)));
        assert_eq!(cache.total_bytes(), 16);
    }

    #[test]
    fn failures_are_never_retried() {
        let mut cache = ImageCache::new();
        let ImageLookup::Start(id) = cache.lookup("broken.png") else {
            panic!("expected a new request");
        };
        cache.complete(id, None);
        assert!(matches!(cache.lookup("broken.png"), ImageLookup::Failed));
        assert!(cache.is_failed("broken.png"));
        assert!(cache.complete(id, None).is_none());
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let mut cache = ImageCache::new();
        cache.set_max_bytes(40);
        for name in ["a", "b"] {
            if let ImageLookup::Start(id) = cache.lookup(name) {
                cache.complete(id, Some(image(2, 2)));
            }
        }
        // touch "a" so "b" is the oldest
        assert!(matches!(cache.lookup("a"), ImageLookup::Ready(_)));
        if let ImageLookup::Start(id) = cache.lookup("c") {
            cache.complete(id, Some(image(2, 2)));
        }
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.total_bytes(), 32);
    }
}
