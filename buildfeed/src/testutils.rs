use crate::cache::Clock;
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// 2025-07-15T06:03:05Z
const START_MS: u64 = 1_752_559_385_000;

/// Clock that only moves when told to.
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now_ms: AtomicU64::new(START_MS),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// `count` releases shaped like the primary API returns them.
pub fn github_releases(start_id: u64, count: u64) -> Value {
    let releases: Vec<Value> = (start_id..start_id + count)
        .map(|id| {
            json!({
                "id": id,
                "tag_name": format!("1.21.8-{id:08x}"),
                "published_at": "2025-07-15T06:03:05Z",
                "html_url": format!("https://github.com/LuminolMC/Luminol/releases/{id}"),
                "prerelease": false,
                "assets": [],
                "author": {"login": "github-actions[bot]"},
                "body": "### Commit Message\n> Update upstream",
                "target_commitish": "ver/1.21.8"
            })
        })
        .collect();
    Value::Array(releases)
}

/// A mirror item for `source_repo`.
pub fn mirror_item(source_repo: &str, tag_name: &str) -> Value {
    json!({
        "source_repo": source_repo,
        "tag_name": tag_name,
        "published_at": "2025-07-15T06:03:05Z",
        "body": "automatically compiled by GitHub Actions",
        "assets": [{"download_url": "https://mirror.example/build.jar", "download_count": 5}]
    })
}

/// Recorder that keeps counter values and descriptions in memory.
#[derive(Default)]
pub struct TestRecorder {
    counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    descriptions: Mutex<HashMap<String, String>>,
}

impl TestRecorder {
    /// Sum of a counter across all label sets.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .iter()
            .filter(|(key, _)| key.as_str() == name)
            .map(|(_, value)| value.load(Ordering::SeqCst))
            .sum()
    }

    pub fn description(&self, name: &str) -> Option<String> {
        self.descriptions.lock().get(name).cloned()
    }

    pub fn described(&self) -> usize {
        self.descriptions.lock().len()
    }
}

impl Recorder for TestRecorder {
    fn describe_counter(&self, key: KeyName, _: Option<Unit>, description: SharedString) {
        self.descriptions.lock().insert(key.as_str().to_string(), description.to_string());
    }

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let mut counters = self.counters.lock();
        let value = counters.entry(key.name().to_string()).or_default();
        Counter::from_arc(value.clone())
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
