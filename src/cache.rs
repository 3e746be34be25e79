//! In-process cache for generated media URLs. Concurrent requests for the
//! same key share one upstream fetch; failures are returned to their caller
//! but never stored, so the next request tries again.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

pub fn speech_key(text: &str, voice: &str) -> String {
    format!("speech:{voice}:{text}")
}

pub fn image_key(character: &str) -> String {
    format!("image:{character}")
}

enum Entry {
    Ready(Arc<String>),
    InFlight(broadcast::Sender<Arc<String>>),
}

enum Role {
    Waiter(broadcast::Receiver<Arc<String>>),
    Leader(broadcast::Sender<Arc<String>>),
}

#[derive(Default)]
pub struct MediaCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached URL for `key`, or runs `fetch` to produce it. While
    /// a fetch is in flight every other caller for the same key waits on its
    /// outcome instead of issuing another one. If the in-flight fetch fails
    /// or its task is dropped, one of the waiters takes over with a fresh
    /// `fetch` call.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<Arc<String>, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        loop {
            let role = {
                let mut entries = self.entries.lock();
                match entries.get(key) {
                    Some(Entry::Ready(url)) => return Ok(url.clone()),
                    Some(Entry::InFlight(tx)) => Role::Waiter(tx.subscribe()),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        entries.insert(key.to_string(), Entry::InFlight(tx.clone()));
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Waiter(mut rx) => match rx.recv().await {
                    Ok(url) => return Ok(url),
                    // Sender dropped without a value: the leader failed or
                    // was cancelled. Take another turn at the map.
                    Err(_) => continue,
                },
                Role::Leader(tx) => return self.lead(key, tx, fetch()).await,
            }
        }
    }

    async fn lead<E>(
        &self,
        key: &str,
        tx: broadcast::Sender<Arc<String>>,
        fut: impl Future<Output = Result<String, E>>,
    ) -> Result<Arc<String>, E> {
        let guard = InFlightGuard {
            cache: self,
            key,
            completed: false,
        };
        match fut.await {
            Ok(url) => {
                let url = Arc::new(url);
                self.entries
                    .lock()
                    .insert(key.to_string(), Entry::Ready(url.clone()));
                let _ = tx.send(url.clone());
                guard.complete();
                Ok(url)
            }
            Err(err) => {
                self.entries.lock().remove(key);
                guard.complete();
                drop(tx);
                Err(err)
            }
        }
    }

    /// Seeds a key with a known URL, e.g. one already persisted elsewhere.
    pub fn insert(&self, key: &str, url: String) {
        self.entries
            .lock()
            .insert(key.to_string(), Entry::Ready(Arc::new(url)));
    }

    pub fn peek(&self, key: &str) -> Option<Arc<String>> {
        match self.entries.lock().get(key) {
            Some(Entry::Ready(url)) => Some(url.clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Clears the in-flight marker if the leading future is dropped mid-fetch,
/// so waiters are released instead of hanging on a key nobody is filling.
struct InFlightGuard<'a> {
    cache: &'a MediaCache,
    key: &'a str,
    completed: bool,
}

impl InFlightGuard<'_> {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut entries = self.cache.entries.lock();
        if matches!(entries.get(self.key), Some(Entry::InFlight(_))) {
            entries.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[test]
    fn test_keys_are_disambiguated_by_kind() {
        assert_eq!(speech_key("안녕하세요", "alloy"), "speech:alloy:안녕하세요");
        assert_eq!(image_key("ㄱ"), "image:ㄱ");
        assert_ne!(speech_key("ㄱ", "alloy"), image_key("ㄱ"));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let cache = Arc::new(MediaCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());

        let leader = {
            let cache = cache.clone();
            let calls = calls.clone();
            let started = started.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("image:ㄱ", || {
                        let calls = calls.clone();
                        let started = started.clone();
                        let gate = gate.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            started.notify_one();
                            gate.notified().await;
                            Ok::<_, &str>("https://img.example/giyeok.png".to_string())
                        }
                    })
                    .await
            })
        };

        started.notified().await;

        let follower = {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("image:ㄱ", || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, &str>("from the follower".to_string())
                        }
                    })
                    .await
            })
        };

        tokio::task::yield_now().await;
        gate.notify_one();

        let a = leader.await.unwrap().unwrap();
        let b = follower.await.unwrap().unwrap();
        assert_eq!(*a, "https://img.example/giyeok.png");
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache = MediaCache::new();
        let calls = AtomicUsize::new(0);

        let err = cache
            .get_or_fetch("speech:alloy:안녕", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<String, _>("upstream down") }
            })
            .await
            .unwrap_err();
        assert_eq!(err, "upstream down");
        assert!(cache.peek("speech:alloy:안녕").is_none());

        let url = cache
            .get_or_fetch("speech:alloy:안녕", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, &str>("https://audio.example/1.mp3".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(*url, "https://audio.example/1.mp3");

        let again = cache
            .get_or_fetch("speech:alloy:안녕", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, &str>("should not run".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(again, url);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_leader_frees_the_key() {
        let cache = Arc::new(MediaCache::new());
        let started = Arc::new(Notify::new());

        let hung = {
            let cache = cache.clone();
            let started = started.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch("image:ㅎ", || {
                        let started = started.clone();
                        async move {
                            started.notify_one();
                            std::future::pending::<()>().await;
                            Ok::<_, &str>(String::new())
                        }
                    })
                    .await
            })
        };

        started.notified().await;
        hung.abort();
        let _ = hung.await;

        let url = cache
            .get_or_fetch("image:ㅎ", || async {
                Ok::<_, &str>("https://img.example/hieut.png".to_string())
            })
            .await
            .unwrap();
        assert_eq!(*url, "https://img.example/hieut.png");
    }

    #[tokio::test]
    async fn test_seeded_entries_skip_fetching() {
        let cache = MediaCache::new();
        cache.insert(&image_key("ㅏ"), "https://img.example/a.png".to_string());

        let url = cache
            .get_or_fetch(&image_key("ㅏ"), || async {
                Err::<String, _>("must not be called")
            })
            .await
            .unwrap();
        assert_eq!(*url, "https://img.example/a.png");
        assert_eq!(cache.len(), 1);
    }
}
