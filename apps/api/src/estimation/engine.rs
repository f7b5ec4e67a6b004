//! Estimation Engine: prices a feature list from calibrated history, one batched external
//! sizing call, and static fallbacks.
//!
//! Flow per request:
//! 1. Each feature is expanded to its subfeatures (the parent name stands in when none).
//! 2. Every subfeature with a trustworthy calibration match is priced at `avg × 1.20`.
//! 3. All remaining subfeatures, across all features, go out in ONE sizing call.
//!    Failures never escape: a failed batch prices every item at 16h raw, a bad entry
//!    prices that item at 16h raw. Without a completion service the per-complexity
//!    static base applies instead.
//! 4. Features total their subfeatures; the request totals its features with a ±15% band.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::calibration::{round1, CalibrationMatcher, CalibrationStore};
use crate::estimation::models::{
    Complexity, EstimatedFeature, EstimatedSubFeature, EstimationResult, FeatureSpec,
};
use crate::estimation::sizing::{request_sizing, DeferredItem};
use crate::llm_client::TextCompletionService;

/// Contingency applied exactly once to every subfeature estimate.
pub const BUFFER_MULTIPLIER: f64 = 1.20;
/// Raw hours used when the external sizing call fails or returns an unusable entry.
pub const SIZING_FALLBACK_HOURS: f64 = 16.0;
pub const MIN_RANGE_FACTOR: f64 = 0.85;
pub const MAX_RANGE_FACTOR: f64 = 1.15;
pub const DEFAULT_SIZING_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw subfeature hours when no completion service is configured at all.
pub fn static_subfeature_hours(complexity: Complexity) -> f64 {
    match complexity {
        Complexity::Low | Complexity::Medium => 16.0,
        Complexity::High => 28.0,
    }
}

/// Applies the buffer and rounds to one decimal.
pub fn buffered(raw_hours: f64) -> f64 {
    round1(raw_hours * BUFFER_MULTIPLIER)
}

enum Slot {
    Calibrated(f64),
    Deferred(usize),
}

struct FeatureDraft<'a> {
    spec: &'a FeatureSpec,
    subfeatures: Vec<(String, Slot)>,
    parent_calibrated_hours: Option<f64>,
}

pub struct EstimationEngine {
    store: Arc<CalibrationStore>,
    completion: Option<Arc<dyn TextCompletionService>>,
    sizing_timeout: Duration,
}

impl EstimationEngine {
    pub fn new(
        store: Arc<CalibrationStore>,
        completion: Option<Arc<dyn TextCompletionService>>,
    ) -> Self {
        Self {
            store,
            completion,
            sizing_timeout: DEFAULT_SIZING_TIMEOUT,
        }
    }

    pub fn with_sizing_timeout(mut self, timeout: Duration) -> Self {
        self.sizing_timeout = timeout;
        self
    }

    pub fn store(&self) -> &CalibrationStore {
        &self.store
    }

    /// Estimates `features`. Never fails; degraded inputs produce degraded (uncalibrated) hours.
    pub async fn estimate(&self, features: &[FeatureSpec], description: &str) -> EstimationResult {
        let features: Vec<&FeatureSpec> = features
            .iter()
            .filter(|f| !f.name.trim().is_empty())
            .collect();

        if features.is_empty() {
            return EstimationResult::empty();
        }

        let matcher = CalibrationMatcher::new(&self.store);
        let mut deferred: Vec<DeferredItem> = Vec::new();
        let mut drafts: Vec<FeatureDraft> = Vec::with_capacity(features.len());

        for spec in features {
            let mut subfeatures = Vec::new();

            for name in spec.effective_subfeatures() {
                let calibrated = matcher
                    .find(&name)
                    .and_then(|entry| entry.avg_hours())
                    .map(buffered);

                let slot = match calibrated {
                    Some(effort) => Slot::Calibrated(effort),
                    None => {
                        deferred.push(DeferredItem {
                            feature: spec.name.trim().to_string(),
                            subfeature: name.clone(),
                            complexity: spec.complexity,
                        });
                        Slot::Deferred(deferred.len() - 1)
                    }
                };
                subfeatures.push((name, slot));
            }

            let parent_calibrated_hours = if spec.has_explicit_subfeatures() {
                matcher
                    .find(&spec.name)
                    .and_then(|entry| entry.avg_hours())
                    .map(buffered)
            } else {
                None
            };

            drafts.push(FeatureDraft {
                spec,
                subfeatures,
                parent_calibrated_hours,
            });
        }

        let sized = self.size_deferred(&deferred, description).await;

        let estimated: Vec<EstimatedFeature> = drafts
            .into_iter()
            .map(|draft| finish_feature(draft, &sized))
            .collect();

        let total_hours = round1(estimated.iter().map(|f| f.total_hours).sum());
        let calibrated_count = estimated.iter().filter(|f| f.was_calibrated).count();

        info!(
            "Estimated {} features: {}h total ({} calibrated, {} items sized externally)",
            estimated.len(),
            total_hours,
            calibrated_count,
            deferred.len()
        );

        EstimationResult {
            total_hours,
            min_hours: round1(total_hours * MIN_RANGE_FACTOR),
            max_hours: round1(total_hours * MAX_RANGE_FACTOR),
            features: estimated,
        }
    }

    /// Buffered effort for each deferred item, in order.
    async fn size_deferred(&self, items: &[DeferredItem], description: &str) -> Vec<f64> {
        if items.is_empty() {
            return Vec::new();
        }

        let Some(service) = &self.completion else {
            debug!(
                "No completion service configured; using static base hours for {} items",
                items.len()
            );
            return items
                .iter()
                .map(|item| buffered(static_subfeature_hours(item.complexity)))
                .collect();
        };

        info!("Requesting batched sizing for {} items", items.len());
        let history = self.store.summary();

        match request_sizing(
            service.as_ref(),
            items,
            description,
            &history,
            self.sizing_timeout,
        )
        .await
        {
            Ok(hours) => {
                let failed = hours.iter().filter(|h| h.is_none()).count();
                if failed > 0 {
                    warn!(
                        "{} of {} sized items were unusable; using {}h fallback for them",
                        failed,
                        items.len(),
                        SIZING_FALLBACK_HOURS
                    );
                }
                hours
                    .into_iter()
                    .map(|h| buffered(h.unwrap_or(SIZING_FALLBACK_HOURS)))
                    .collect()
            }
            Err(e) => {
                warn!(
                    "Batched sizing failed ({e}); using {}h fallback for all {} items",
                    SIZING_FALLBACK_HOURS,
                    items.len()
                );
                vec![buffered(SIZING_FALLBACK_HOURS); items.len()]
            }
        }
    }
}

fn finish_feature(draft: FeatureDraft, sized: &[f64]) -> EstimatedFeature {
    let subfeatures: Vec<EstimatedSubFeature> = draft
        .subfeatures
        .into_iter()
        .map(|(name, slot)| match slot {
            Slot::Calibrated(effort) => EstimatedSubFeature {
                name,
                effort,
                was_calibrated: true,
            },
            Slot::Deferred(index) => EstimatedSubFeature {
                name,
                effort: sized
                    .get(index)
                    .copied()
                    .unwrap_or_else(|| buffered(SIZING_FALLBACK_HOURS)),
                was_calibrated: false,
            },
        })
        .collect();

    let total_hours = round1(subfeatures.iter().map(|s| s.effort).sum());
    let was_calibrated = subfeatures.iter().any(|s| s.was_calibrated);

    if let Some(floor) = draft.parent_calibrated_hours {
        if total_hours < floor {
            warn!(
                "Feature '{}' sums to {}h, below its own calibrated {}h",
                draft.spec.name, total_hours, floor
            );
        }
    }

    EstimatedFeature {
        name: draft.spec.name.trim().to_string(),
        complexity: draft.spec.complexity,
        total_hours,
        subfeatures,
        was_calibrated,
        parent_calibrated_hours: draft.parent_calibrated_hours,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::calibration::store::AggregatedCalibration;
    use crate::llm_client::LlmError;

    /// Test double: returns canned text (or an error) and records every prompt it sees.
    struct FakeCompletion {
        reply: Result<String, ()>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeCompletion {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                delay: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(r#"{"hours": [40]}"#.to_string()),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextCompletionService for FakeCompletion {
        async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(|_| LlmError::EmptyContent)
        }
    }

    fn store_with(rows: &[(&str, f64, u32)]) -> Arc<CalibrationStore> {
        let data: BTreeMap<String, AggregatedCalibration> = rows
            .iter()
            .map(|(k, avg, n)| {
                (
                    k.to_string(),
                    AggregatedCalibration {
                        avg_hours: *avg,
                        sample_size: *n,
                        sources: vec![],
                    },
                )
            })
            .collect();
        let mut store = CalibrationStore::new();
        store.load(&data);
        Arc::new(store)
    }

    fn engine(
        store: Arc<CalibrationStore>,
        completion: Option<Arc<FakeCompletion>>,
    ) -> EstimationEngine {
        EstimationEngine::new(
            store,
            completion.map(|c| c as Arc<dyn TextCompletionService>),
        )
    }

    #[tokio::test]
    async fn test_calibrated_subfeature_gets_buffered_average() {
        // total_hours=200, sample_size=4 → avg 50 → 60.0
        let completion = FakeCompletion::replying("[]");
        let engine = engine(
            store_with(&[("oauthlogin", 50.0, 4)]),
            Some(completion.clone()),
        );
        let features =
            vec![FeatureSpec::new("Login", Complexity::Medium).with_subfeatures(&["OAuth Login"])];

        let result = engine.estimate(&features, "").await;

        let sub = &result.features[0].subfeatures[0];
        assert_eq!(sub.name, "OAuth Login");
        assert_eq!(sub.effort, 60.0);
        assert!(sub.was_calibrated);
        assert!(result.features[0].was_calibrated);
        assert_eq!(completion.calls(), 0, "nothing deferred, no external call");
    }

    #[tokio::test]
    async fn test_buffer_applied_exactly_once() {
        let engine = engine(store_with(&[("reporting", 100.0, 3)]), None);
        let result = engine
            .estimate(&[FeatureSpec::new("Reporting", Complexity::High)], "")
            .await;
        assert_eq!(result.features[0].subfeatures[0].effort, 120.0);
        assert_eq!(result.features[0].total_hours, 120.0);
    }

    #[tokio::test]
    async fn test_single_sample_calibration_is_deferred() {
        let completion = FakeCompletion::replying(r#"{"hours": [30]}"#);
        let engine = engine(
            store_with(&[("oauthlogin", 50.0, 1)]),
            Some(completion.clone()),
        );
        let features =
            vec![FeatureSpec::new("Login", Complexity::Medium).with_subfeatures(&["OAuth Login"])];

        let result = engine.estimate(&features, "").await;

        let sub = &result.features[0].subfeatures[0];
        assert!(!sub.was_calibrated);
        assert_eq!(sub.effort, 36.0);
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_features_returns_zeroes_without_call() {
        let completion = FakeCompletion::replying("[]");
        let engine = engine(store_with(&[]), Some(completion.clone()));

        let result = engine.estimate(&[], "anything").await;

        assert_eq!(result, EstimationResult::empty());
        assert_eq!(completion.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_feature_names_are_dropped() {
        let engine = engine(store_with(&[]), None);
        let features = vec![
            FeatureSpec::new("  ", Complexity::High),
            FeatureSpec::new("Chat", Complexity::Low),
        ];

        let result = engine.estimate(&features, "").await;

        assert_eq!(result.features.len(), 1);
        assert_eq!(result.features[0].name, "Chat");
    }

    #[tokio::test]
    async fn test_failed_batch_uses_fallback_for_every_item() {
        let completion = FakeCompletion::failing();
        let engine = engine(store_with(&[]), Some(completion.clone()));
        let features = vec![
            FeatureSpec::new("Auth", Complexity::High).with_subfeatures(&["Login", "Signup"]),
            FeatureSpec::new("Search", Complexity::Low),
        ];

        let result = engine.estimate(&features, "").await;

        let efforts: Vec<f64> = result
            .features
            .iter()
            .flat_map(|f| f.subfeatures.iter().map(|s| s.effort))
            .collect();
        assert_eq!(efforts, vec![19.2, 19.2, 19.2]);
        assert_eq!(completion.calls(), 1, "one batched call for all features");
        assert_eq!(result.total_hours, 57.6);
    }

    #[tokio::test]
    async fn test_length_mismatch_falls_back_for_all_items() {
        let completion = FakeCompletion::replying(r#"{"hours": [100]}"#);
        let engine = engine(store_with(&[]), Some(completion));
        let features =
            vec![FeatureSpec::new("Auth", Complexity::Medium).with_subfeatures(&["A", "B"])];

        let result = engine.estimate(&features, "").await;

        let efforts: Vec<f64> = result.features[0]
            .subfeatures
            .iter()
            .map(|s| s.effort)
            .collect();
        assert_eq!(efforts, vec![19.2, 19.2]);
    }

    #[tokio::test]
    async fn test_bad_entry_falls_back_for_that_item_only() {
        let completion = FakeCompletion::replying(r#"{"hours": [10, -3, "abc"]}"#);
        let engine = engine(store_with(&[]), Some(completion));
        let features =
            vec![FeatureSpec::new("Auth", Complexity::Medium).with_subfeatures(&["A", "B", "C"])];

        let result = engine.estimate(&features, "").await;

        let efforts: Vec<f64> = result.features[0]
            .subfeatures
            .iter()
            .map(|s| s.effort)
            .collect();
        assert_eq!(efforts, vec![12.0, 19.2, 19.2]);
    }

    #[tokio::test]
    async fn test_deferred_items_keep_order_across_features() {
        let completion = FakeCompletion::replying(r#"[10, 20, 30]"#);
        let engine = engine(store_with(&[("payments", 50.0, 2)]), Some(completion.clone()));
        let features = vec![
            FeatureSpec::new("Auth", Complexity::Medium).with_subfeatures(&["Login", "Payments"]),
            FeatureSpec::new("Chat", Complexity::Medium),
            FeatureSpec::new("Admin", Complexity::Medium).with_subfeatures(&["Roles"]),
        ];

        let result = engine.estimate(&features, "Marketplace").await;

        assert_eq!(result.features[0].subfeatures[0].effort, 12.0);
        assert_eq!(result.features[0].subfeatures[1].effort, 60.0);
        assert_eq!(result.features[1].subfeatures[0].effort, 24.0);
        assert_eq!(result.features[2].subfeatures[0].effort, 36.0);

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Marketplace"));
        assert!(prompts[0].contains("payments"), "history summary is sent");
    }

    #[tokio::test]
    async fn test_no_completion_service_uses_static_base() {
        let engine = engine(store_with(&[]), None);
        let features = vec![
            FeatureSpec::new("Chat", Complexity::Low),
            FeatureSpec::new("Video", Complexity::High),
        ];

        let result = engine.estimate(&features, "").await;

        assert_eq!(result.features[0].total_hours, 19.2);
        assert_eq!(result.features[1].total_hours, 33.6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_treated_as_batch_failure() {
        let completion = FakeCompletion::slow(Duration::from_secs(600));
        let engine = engine(store_with(&[]), Some(completion.clone()))
            .with_sizing_timeout(Duration::from_secs(5));

        let result = engine
            .estimate(&[FeatureSpec::new("Chat", Complexity::Medium)], "")
            .await;

        assert_eq!(result.features[0].subfeatures[0].effort, 19.2);
        assert_eq!(completion.calls(), 1);
    }

    #[tokio::test]
    async fn test_totals_and_range() {
        let engine = engine(store_with(&[("login", 50.0, 2), ("search", 25.0, 3)]), None);
        let features = vec![
            FeatureSpec::new("Login", Complexity::Medium),
            FeatureSpec::new("Search", Complexity::Medium),
        ];

        let result = engine.estimate(&features, "").await;

        // 60.0 + 30.0
        assert_eq!(result.total_hours, 90.0);
        assert_eq!(result.min_hours, 76.5);
        assert_eq!(result.max_hours, 103.5);
        assert!(result.min_hours <= result.total_hours && result.total_hours <= result.max_hours);
    }

    #[tokio::test]
    async fn test_feature_total_is_sum_of_subfeatures() {
        let engine = engine(store_with(&[("login", 10.0, 2)]), None);
        let features = vec![FeatureSpec::new("Auth", Complexity::High)
            .with_subfeatures(&["Login", "Two Factor", "Sessions"])];

        let result = engine.estimate(&features, "").await;
        let feature = &result.features[0];

        // 12.0 calibrated + 33.6 + 33.6 static high
        assert_eq!(feature.total_hours, 79.2);
        assert!(feature.was_calibrated);
        assert_eq!(feature.subfeatures.len(), 3);
    }

    #[tokio::test]
    async fn test_parent_calibration_is_reported_not_applied() {
        let engine = engine(store_with(&[("checkout", 100.0, 5)]), None);
        let features = vec![FeatureSpec::new("Checkout", Complexity::Medium)
            .with_subfeatures(&["Cart Review"])];

        let result = engine.estimate(&features, "").await;
        let feature = &result.features[0];

        assert_eq!(feature.parent_calibrated_hours, Some(120.0));
        assert_eq!(feature.total_hours, 19.2);
        assert!(!feature.was_calibrated);
    }
}
