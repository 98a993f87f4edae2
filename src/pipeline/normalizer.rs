use super::types::{MetricNormalizer, RawMetric, UnifiedSnapshot};

/// Normalizer shared by every current provider: `value` wins over
/// `count`, absent both defaults to 0, timestamp and metadata carry
/// through unchanged. Providers with a bespoke payload shape register
/// their own implementation in the registry instead.
pub struct DefaultNormalizer;

impl MetricNormalizer for DefaultNormalizer {
    fn normalize(&self, raw: &RawMetric, metric_key: &str) -> Vec<UnifiedSnapshot> {
        let value = raw
            .value
            .or_else(|| raw.count.map(|c| c as f64))
            .unwrap_or(0.0);
        vec![UnifiedSnapshot {
            metric_key: metric_key.to_string(),
            value,
            captured_at: raw.timestamp,
            metadata: raw.meta.clone(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(value: Option<f64>, count: Option<u64>) -> RawMetric {
        RawMetric {
            metric: "m".into(),
            value,
            count,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            meta: None,
        }
    }

    #[test]
    fn value_payload_round_trips() {
        let snaps = DefaultNormalizer.normalize(&raw(Some(42.0), None), "stripe.mrr");
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].value, 42.0);
        assert_eq!(snaps[0].metric_key, "stripe.mrr");
        assert_eq!(
            snaps[0].captured_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn value_takes_precedence_over_count() {
        let snaps = DefaultNormalizer.normalize(&raw(Some(3.0), Some(99)), "k");
        assert_eq!(snaps[0].value, 3.0);
    }

    #[test]
    fn count_is_used_when_value_absent() {
        let snaps = DefaultNormalizer.normalize(&raw(None, Some(17)), "k");
        assert_eq!(snaps[0].value, 17.0);
    }

    #[test]
    fn missing_both_defaults_to_zero() {
        let snaps = DefaultNormalizer.normalize(&raw(None, None), "k");
        assert_eq!(snaps[0].value, 0.0);
    }

    #[test]
    fn metadata_passes_through_unchanged() {
        let mut r = raw(Some(1.0), None);
        r.meta = Some(serde_json::json!({ "currency": "usd", "unit": "hours" }));
        let snaps = DefaultNormalizer.normalize(&r, "k");
        assert_eq!(snaps[0].metadata, r.meta);
    }
}
