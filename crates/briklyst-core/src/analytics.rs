//! Click analytics aggregation.
//!
//! Converts the raw click events of one storefront into three views:
//! per-product totals, a per-interval series and a "most popular" ranking.
//! Everything here is pure; fetching the inputs is the job of a
//! [`ClickSource`] implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A visitor clicking through to a product's affiliate link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: String,
    pub product_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub title: String,
}

/// Bucketing granularity for the `clicks_by_interval` series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// Parse a query-string value. Missing or unrecognised values fall back
    /// to [`Interval::Daily`]; this never fails.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("weekly") => Self::Weekly,
            Some("monthly") => Self::Monthly,
            _ => Self::Daily,
        }
    }
}

/// Map a timestamp to the key of the bucket it falls into.
///
/// - daily: `YYYY-MM-DD`
/// - monthly: `YYYY-M`, month 1-based and not zero-padded
/// - weekly: `YYYY-W<n>` with `n = ceil((days since Jan 1 + weekday of Jan 1) / 7)`,
///   weekday counted from Sunday = 0. This is not ISO-8601 week numbering.
pub fn bucket_key(ts: &DateTime<Utc>, interval: Interval) -> String {
    match interval {
        Interval::Daily => ts.format("%Y-%m-%d").to_string(),
        Interval::Monthly => format!("{}-{}", ts.year(), ts.month()),
        Interval::Weekly => format!("{}-W{}", ts.year(), approximate_week(ts)),
    }
}

fn approximate_week(ts: &DateTime<Utc>) -> i64 {
    let ordinal0 = i64::from(ts.ordinal0());
    // Weekday of Jan 1 derived from today's weekday and the distance back to it.
    let jan1_weekday = (i64::from(ts.weekday().num_days_from_sunday()) - ordinal0).rem_euclid(7);
    let seconds_into_day =
        f64::from(ts.num_seconds_from_midnight()) + f64::from(ts.nanosecond()) / 1e9;
    let days_since_jan1 = ordinal0 as f64 + seconds_into_day / 86_400.0;
    ((days_since_jan1 + jan1_weekday as f64) / 7.0).ceil() as i64
}

/// Intermediate fold result, before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub clicks_by_product: BTreeMap<String, u64>,
    pub clicks_by_interval: BTreeMap<String, u64>,
    pub product_titles: BTreeMap<String, String>,
    pub total_clicks: u64,
}

/// Fold `events` into per-product and per-bucket counts.
///
/// Every product that passes `product_filter` (exact id match) gets an entry,
/// zero if it has no clicks. Events for products outside that set are
/// skipped and do not count towards `total_clicks`.
pub fn aggregate(
    events: &[ClickEvent],
    products: &[ProductSummary],
    interval: Interval,
    product_filter: Option<&str>,
) -> Aggregation {
    let mut agg = Aggregation::default();

    for product in products {
        if product_filter.is_some_and(|wanted| wanted != product.id) {
            continue;
        }
        agg.clicks_by_product.insert(product.id.clone(), 0);
        agg.product_titles
            .insert(product.id.clone(), product.title.clone());
    }

    for event in events {
        let Some(count) = agg.clicks_by_product.get_mut(&event.product_id) else {
            continue;
        };
        *count += 1;
        *agg.clicks_by_interval
            .entry(bucket_key(&event.created_at, interval))
            .or_insert(0) += 1;
        agg.total_clicks += 1;
    }

    agg
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularProduct {
    pub product_id: String,
    pub title: String,
    pub count: u64,
}

/// Order every product by click count, highest first.
///
/// Equal counts are ordered by product id ascending so the ranking is a
/// total order independent of map iteration.
pub fn rank(
    clicks_by_product: &BTreeMap<String, u64>,
    product_titles: &BTreeMap<String, String>,
) -> Vec<PopularProduct> {
    let mut ranked: Vec<PopularProduct> = clicks_by_product
        .iter()
        .map(|(id, count)| PopularProduct {
            product_id: id.clone(),
            title: product_titles.get(id).cloned().unwrap_or_default(),
            count: *count,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    ranked
}

/// Response payload of the analytics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub clicks_by_product: BTreeMap<String, u64>,
    pub clicks_by_interval: BTreeMap<String, u64>,
    pub most_popular: Vec<PopularProduct>,
    pub total_clicks: u64,
    pub product_titles: BTreeMap<String, String>,
}

pub fn assemble(agg: Aggregation) -> AnalyticsResult {
    let most_popular = rank(&agg.clicks_by_product, &agg.product_titles);
    AnalyticsResult {
        clicks_by_product: agg.clicks_by_product,
        clicks_by_interval: agg.clicks_by_interval,
        most_popular,
        total_clicks: agg.total_clicks,
        product_titles: agg.product_titles,
    }
}

/// Aggregate, rank and assemble in one call.
pub fn analyze(
    events: &[ClickEvent],
    products: &[ProductSummary],
    interval: Interval,
    product_filter: Option<&str>,
) -> AnalyticsResult {
    assemble(aggregate(events, products, interval, product_filter))
}

/// Source of the aggregator's inputs.
///
/// Implementations must scope both calls to the given storefront: the
/// aggregator trusts its inputs and performs no authorization.
#[async_trait]
pub trait ClickSource: Send + Sync + 'static {
    async fn product_summaries(&self, storefront_id: &str) -> anyhow::Result<Vec<ProductSummary>>;

    /// Clicks with `start <= created_at < end`.
    async fn clicks_in_range(
        &self,
        storefront_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<ClickEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn click(id: &str, product_id: &str, created_at: DateTime<Utc>) -> ClickEvent {
        ClickEvent {
            id: id.to_string(),
            product_id: product_id.to_string(),
            created_at,
        }
    }

    fn product(id: &str, title: &str) -> ProductSummary {
        ProductSummary {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    fn sample_events() -> Vec<ClickEvent> {
        vec![
            click("c1", "p1", at(2024, 1, 5, 10)),
            click("c2", "p1", at(2024, 1, 6, 10)),
            click("c3", "p2", at(2024, 1, 5, 18)),
        ]
    }

    fn sample_products() -> Vec<ProductSummary> {
        vec![product("p1", "A"), product("p2", "B")]
    }

    #[test]
    fn daily_example() {
        let result = analyze(&sample_events(), &sample_products(), Interval::Daily, None);
        assert_eq!(result.clicks_by_product["p1"], 2);
        assert_eq!(result.clicks_by_product["p2"], 1);
        assert_eq!(result.clicks_by_interval.len(), 2);
        assert_eq!(result.clicks_by_interval["2024-01-05"], 2);
        assert_eq!(result.clicks_by_interval["2024-01-06"], 1);
        assert_eq!(result.total_clicks, 3);
        assert_eq!(
            result.most_popular,
            vec![
                PopularProduct {
                    product_id: "p1".to_string(),
                    title: "A".to_string(),
                    count: 2
                },
                PopularProduct {
                    product_id: "p2".to_string(),
                    title: "B".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn monthly_example_is_not_zero_padded() {
        let result = analyze(&sample_events(), &sample_products(), Interval::Monthly, None);
        assert_eq!(result.clicks_by_interval.len(), 1);
        assert_eq!(result.clicks_by_interval["2024-1"], 3);
    }

    #[test]
    fn product_filter_keeps_only_matching_product() {
        let result = analyze(
            &sample_events(),
            &sample_products(),
            Interval::Daily,
            Some("p2"),
        );
        assert_eq!(result.clicks_by_product.len(), 1);
        assert_eq!(result.clicks_by_product["p2"], 1);
        assert_eq!(result.total_clicks, 1);
        assert_eq!(result.most_popular.len(), 1);
        assert_eq!(result.most_popular[0].title, "B");
        assert_eq!(result.clicks_by_interval["2024-01-05"], 1);
    }

    #[test]
    fn filter_matching_no_product_yields_empty_result() {
        let result = analyze(
            &sample_events(),
            &sample_products(),
            Interval::Daily,
            Some("p9"),
        );
        assert!(result.clicks_by_product.is_empty());
        assert!(result.product_titles.is_empty());
        assert!(result.clicks_by_interval.is_empty());
        assert_eq!(result.total_clicks, 0);
    }

    #[test]
    fn no_products_means_nothing_is_counted() {
        let result = analyze(&sample_events(), &[], Interval::Weekly, None);
        assert!(result.clicks_by_product.is_empty());
        assert!(result.clicks_by_interval.is_empty());
        assert!(result.most_popular.is_empty());
        assert!(result.product_titles.is_empty());
        assert_eq!(result.total_clicks, 0);
    }

    #[test]
    fn products_without_clicks_are_zero_initialised() {
        let products = vec![product("p1", "A"), product("p2", "B"), product("p3", "C")];
        let result = analyze(&sample_events(), &products, Interval::Daily, None);
        assert_eq!(result.clicks_by_product["p3"], 0);
        assert_eq!(result.product_titles["p3"], "C");
        assert_eq!(result.most_popular.last().map(|p| p.count), Some(0));
    }

    #[test]
    fn clicks_for_unknown_products_are_skipped() {
        let mut events = sample_events();
        events.push(click("c4", "other", at(2024, 2, 1, 0)));
        let result = analyze(&events, &sample_products(), Interval::Daily, None);
        assert_eq!(result.total_clicks, 3);
        assert!(!result.clicks_by_interval.contains_key("2024-02-01"));
    }

    #[test]
    fn total_equals_sum_of_product_counts() {
        let products: Vec<ProductSummary> = (0..5)
            .map(|i| product(&format!("p{i}"), &format!("T{i}")))
            .collect();
        let events: Vec<ClickEvent> = (0..40)
            .map(|i| {
                click(
                    &format!("c{i}"),
                    &format!("p{}", (i * 7) % 6),
                    at(2024, 1 + (i % 12) as u32, 1 + (i % 28) as u32, 12),
                )
            })
            .collect();
        let result = analyze(&events, &products, Interval::Weekly, None);
        let by_product: u64 = result.clicks_by_product.values().sum();
        let by_interval: u64 = result.clicks_by_interval.values().sum();
        assert_eq!(by_product, result.total_clicks);
        assert_eq!(by_interval, result.total_clicks);
        for pair in result.most_popular.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
    }

    #[test]
    fn ranking_ties_break_by_product_id() {
        let counts = BTreeMap::from([
            ("p3".to_string(), 2),
            ("p1".to_string(), 2),
            ("p2".to_string(), 5),
            ("p0".to_string(), 0),
        ]);
        let ranked = rank(&counts, &BTreeMap::new());
        let ids: Vec<&str> = ranked.iter().map(|p| p.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1", "p3", "p0"]);
    }

    #[test]
    fn weekly_key_follows_jan1_weekday_offset() {
        // 2024-01-01 is a Monday (weekday index 1).
        assert_eq!(bucket_key(&at(2024, 1, 1, 12), Interval::Weekly), "2024-W1");
        assert_eq!(bucket_key(&at(2024, 1, 5, 12), Interval::Weekly), "2024-W1");
        // Saturday 2024-01-06 at noon: 5.5 + 1 = 6.5 -> week 1.
        assert_eq!(bucket_key(&at(2024, 1, 6, 12), Interval::Weekly), "2024-W1");
        // Sunday 2024-01-07 at noon: 6.5 + 1 = 7.5 -> week 2.
        assert_eq!(bucket_key(&at(2024, 1, 7, 12), Interval::Weekly), "2024-W2");
        // 2023-01-01 is a Sunday (offset 0); midnight sits exactly on week 0.
        assert_eq!(bucket_key(&at(2023, 1, 1, 0), Interval::Weekly), "2023-W0");
        assert_eq!(bucket_key(&at(2023, 1, 1, 1), Interval::Weekly), "2023-W1");
        assert_eq!(bucket_key(&at(2024, 12, 31, 12), Interval::Weekly), "2024-W53");
    }

    #[test]
    fn daily_and_monthly_keys() {
        let ts = at(2024, 11, 3, 23);
        assert_eq!(bucket_key(&ts, Interval::Daily), "2024-11-03");
        assert_eq!(bucket_key(&ts, Interval::Monthly), "2024-11");
        assert_eq!(bucket_key(&at(2024, 3, 9, 0), Interval::Monthly), "2024-3");
    }

    #[test]
    fn bucket_key_is_deterministic() {
        let ts = at(2025, 6, 15, 8);
        for interval in [Interval::Daily, Interval::Weekly, Interval::Monthly] {
            assert_eq!(bucket_key(&ts, interval), bucket_key(&ts, interval));
        }
    }

    #[test]
    fn unknown_interval_defaults_to_daily() {
        assert_eq!(Interval::parse(None), Interval::Daily);
        assert_eq!(Interval::parse(Some("hourly")), Interval::Daily);
        assert_eq!(Interval::parse(Some("weekly")), Interval::Weekly);
        assert_eq!(Interval::parse(Some(" monthly ")), Interval::Monthly);
    }

    #[test]
    fn result_serialises_with_camel_case_keys() {
        let result = analyze(&sample_events(), &sample_products(), Interval::Daily, None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalClicks"], 3);
        assert_eq!(json["clicksByProduct"]["p1"], 2);
        assert_eq!(json["mostPopular"][0]["productId"], "p1");
        assert_eq!(json["productTitles"]["p2"], "B");
        assert_eq!(json["clicksByInterval"]["2024-01-06"], 1);
    }
}
