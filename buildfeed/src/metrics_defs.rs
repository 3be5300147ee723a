//! Metrics emitted by the fetch pipeline.

/// A counter emitted by the pipeline. Every metric here is a counter.
#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub description: &'static str,
}

#[macro_export]
macro_rules! counter {
    ($def:expr $(, $label:expr => $value:expr)* $(,)?) => {
        metrics::counter!($def.name $(, $label => $value)*)
    };
}

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "cache.hit",
    description: "Lookups answered by a valid cache entry",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "cache.miss",
    description: "Lookups with no stored cache entry",
};

pub const CACHE_EXPIRED: MetricDef = MetricDef {
    name: "cache.expired",
    description: "Cache entries found expired and removed on lookup",
};

pub const COOLDOWN_SKIP: MetricDef = MetricDef {
    name: "cooldown.skip",
    description: "Fetches skipped because the error cooldown was active",
};

pub const PRIMARY_PAGE: MetricDef = MetricDef {
    name: "primary.page",
    description: "Release pages fetched from the primary API",
};

pub const MIRROR_SUCCESS: MetricDef = MetricDef {
    name: "mirror.success",
    description: "Mirror requests that returned a usable payload, tagged by mirror",
};

pub const MIRROR_FAILURE: MetricDef = MetricDef {
    name: "mirror.failure",
    description: "Mirror requests that failed, tagged by mirror",
};

pub const FEED_UNAVAILABLE: MetricDef = MetricDef {
    name: "feed.unavailable",
    description: "Build lookups where every source failed",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    CACHE_EXPIRED,
    COOLDOWN_SKIP,
    PRIMARY_PAGE,
    MIRROR_SUCCESS,
    MIRROR_FAILURE,
    FEED_UNAVAILABLE,
];

/// Registers the description of every metric with the installed recorder.
pub fn describe_all() {
    for def in ALL_METRICS {
        metrics::describe_counter!(def.name, def.description);
    }
}
