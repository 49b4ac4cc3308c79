use std::time::Duration;

use async_trait::async_trait;

/// The browser operations the mission needs from a rendered page.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and wait for the document to load.
    async fn open(&self, url: &str) -> anyhow::Result<()>;
    async fn current_url(&self) -> anyhow::Result<String>;
    /// Serialized DOM as currently rendered.
    async fn page_source(&self) -> anyhow::Result<String>;
    async fn scroll_by(&self, pixels: u32) -> anyhow::Result<()>;
    async fn scroll_to_bottom(&self) -> anyhow::Result<()>;
    async fn document_height(&self) -> anyhow::Result<u64>;
    async fn count_elements(&self, selector: &str) -> anyhow::Result<usize>;
    /// Clicks the first clickable link whose text contains `partial_text`.
    /// Returns `false` when none shows up within `wait`.
    async fn click_link(
        &self,
        partial_text: &str,
        wait: Duration,
        poll: Duration,
    ) -> anyhow::Result<bool>;
}

#[cfg(test)]
pub mod testing {
    use std::{
        collections::{HashMap, HashSet},
        sync::{
            atomic::{AtomicU32, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::PageSession;

    /// In-memory page session. Height and item count follow per-step
    /// schedules indexed by the number of `scroll_by` calls; the last entry
    /// repeats.
    #[derive(Default)]
    pub struct FakeSession {
        pub heights: Vec<u64>,
        pub counts: Vec<usize>,
        pub sources: HashMap<String, String>,
        pub next_links: HashMap<String, String>,
        pub failing_urls: HashSet<String>,
        pub current: Mutex<String>,
        pub visited: Mutex<Vec<String>>,
        pub steps: AtomicU32,
        pub bottom_scrolls: AtomicU32,
    }

    fn at<T: Copy + Default>(schedule: &[T], step: u32) -> T {
        match schedule.is_empty() {
            true => T::default(),
            false => schedule[(step as usize).min(schedule.len() - 1)],
        }
    }

    impl FakeSession {
        pub fn with_schedule(heights: Vec<u64>, counts: Vec<usize>) -> Self {
            FakeSession {
                heights,
                counts,
                ..Default::default()
            }
        }

        pub fn page(mut self, url: &str, html: &str) -> Self {
            self.sources.insert(url.to_string(), html.to_string());
            self
        }

        pub fn link(mut self, from: &str, to: &str) -> Self {
            self.next_links.insert(from.to_string(), to.to_string());
            self
        }

        pub fn failing(mut self, url: &str) -> Self {
            self.failing_urls.insert(url.to_string());
            self
        }

        pub fn steps(&self) -> u32 {
            self.steps.load(Ordering::SeqCst)
        }

        pub fn visited(&self) -> Vec<String> {
            self.visited.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSession for FakeSession {
        async fn open(&self, url: &str) -> anyhow::Result<()> {
            self.visited.lock().unwrap().push(url.to_string());
            if self.failing_urls.contains(url) {
                return Err(anyhow!("Timed out loading {}", url));
            }
            *self.current.lock().unwrap() = url.to_string();
            self.steps.store(0, Ordering::SeqCst);
            Ok(())
        }

        async fn current_url(&self) -> anyhow::Result<String> {
            Ok(self.current.lock().unwrap().clone())
        }

        async fn page_source(&self) -> anyhow::Result<String> {
            let current = self.current.lock().unwrap().clone();
            self.sources
                .get(&current)
                .cloned()
                .ok_or_else(|| anyhow!("No source for {}", current))
        }

        async fn scroll_by(&self, _pixels: u32) -> anyhow::Result<()> {
            self.steps.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn scroll_to_bottom(&self) -> anyhow::Result<()> {
            self.bottom_scrolls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn document_height(&self) -> anyhow::Result<u64> {
            Ok(at(&self.heights, self.steps()))
        }

        async fn count_elements(&self, _selector: &str) -> anyhow::Result<usize> {
            Ok(at(&self.counts, self.steps()))
        }

        async fn click_link(
            &self,
            _partial_text: &str,
            _wait: Duration,
            _poll: Duration,
        ) -> anyhow::Result<bool> {
            let current = self.current.lock().unwrap().clone();
            match self.next_links.get(&current) {
                Some(next) => {
                    *self.current.lock().unwrap() = next.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}
