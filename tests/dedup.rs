// tests/dedup.rs
use chrono::{NaiveDate, TimeZone, Utc};

use trend_news_collector::dedup::{deduplicate, merge_with_prior, normalize_url};
use trend_news_collector::model::{CanonicalRecord, ClassifiedArticle, Confidence, RawArticle};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

struct A {
    source: &'static str,
    title: &'static str,
    url: &'static str,
    hour_on_day: Option<(u32, u32)>,
    confidence: Confidence,
    magnitude: f64,
}

impl A {
    fn new(source: &'static str, title: &'static str, url: &'static str) -> Self {
        Self {
            source,
            title,
            url,
            hour_on_day: Some((3, 9)),
            confidence: Confidence::Low,
            magnitude: 1.0,
        }
    }

    fn build(self) -> ClassifiedArticle {
        ClassifiedArticle {
            raw: RawArticle {
                source_id: self.source.into(),
                title: self.title.into(),
                url: self.url.into(),
                published_at: self
                    .hour_on_day
                    .map(|(d, h)| Utc.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()),
                snippet: format!("{} snippet", self.title),
                provider_category: None,
                country: None,
            },
            category: Some("power-outage".into()),
            summary: format!("summary from {}", self.source),
            confidence_hint: self.confidence,
            country: "Japan".into(),
            magnitude: self.magnitude,
            sources: vec![self.source.into()],
            notes: Vec::new(),
        }
    }
}

#[test]
fn same_url_after_normalization_is_one_record() {
    let mut high = A::new("deepsearch", "Tokyo blackout", "https://News.example.com/a?utm_medium=rss");
    high.confidence = Confidence::High;
    let low = A::new("rss", "Tokyo goes dark", "https://news.example.com/a/");

    let out = deduplicate(vec![low.build(), high.build()], day(18));
    assert_eq!(out.len(), 1);
    let r = &out[0].record;
    assert_eq!(r.confidence, Confidence::High);
    assert_eq!(r.title, "Tokyo blackout");
    assert_eq!(r.summary, "summary from deepsearch");
    assert_eq!(r.continent, "ASIA");
    assert_eq!(r.published_date, day(3));
    assert!(
        r.verification_note.starts_with("sources: deepsearch, rss; category: power-outage"),
        "{}",
        r.verification_note
    );
}

#[test]
fn near_duplicate_titles_merge_only_on_the_same_day() {
    let a = A::new("rss", "Massive blackout hits Tokyo after storm", "https://a.example/1");
    let b = A::new("deepsearch", "Massive blackout hits Tokyo after storm, officials say", "https://b.example/2");
    let mut c = A::new("rss", "Massive blackout hits Tokyo after storm", "https://c.example/3");
    c.hour_on_day = Some((2, 9));

    let out = deduplicate(vec![a.build(), b.build(), c.build()], day(18));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].record.published_date, day(3));
    assert_eq!(out[1].record.published_date, day(2));
}

#[test]
fn ties_prefer_the_earliest_article() {
    let mut late = A::new("rss", "Quake shakes northern coast", "https://n/late");
    late.hour_on_day = Some((3, 20));
    let early = A::new("deepsearch", "Quake shakes northern coast", "https://n/early");

    let out = deduplicate(vec![late.build(), early.build()], day(18));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].record.url, "https://n/early");
}

#[test]
fn output_is_sorted_by_date_then_magnitude_then_url() {
    let mut small = A::new("rss", "Alpha rail strike begins", "https://n/b");
    small.magnitude = 0.5;
    let mut big = A::new("rss", "Grid failure across region", "https://n/c");
    big.magnitude = 3.0;
    let mut tie = A::new("rss", "Ferry services halted by typhoon", "https://n/a");
    tie.magnitude = 0.5;
    let mut older = A::new("rss", "Older flood coverage", "https://n/z");
    older.hour_on_day = Some((1, 9));
    older.magnitude = 10.0;
    let mut undated = A::new("rss", "Undated item from a feed", "https://n/u");
    undated.hour_on_day = None;

    let out = deduplicate(
        vec![older.build(), small.build(), tie.build(), big.build(), undated.build()],
        day(18),
    );
    let urls: Vec<&str> = out.iter().map(|m| m.record.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://n/u", "https://n/c", "https://n/a", "https://n/b", "https://n/z"]
    );
}

#[test]
fn agreeing_search_adapters_corroborate() {
    let mut a = A::new("openai-search", "Nationwide curfew announced", "https://n/curfew").build();
    a.raw.provider_category = Some("curfew".into());
    a.confidence_hint = Confidence::Medium;
    let mut b = A::new("claude-search", "Nationwide curfew announced", "https://n/curfew").build();
    b.raw.provider_category = Some("Curfew".into());
    b.confidence_hint = Confidence::Medium;

    let out = deduplicate(vec![a, b], day(18));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].record.confidence, Confidence::High);
    assert!(out[0]
        .record
        .verification_note
        .contains("corroborated across sources: curfew (claude-search+openai-search)"));
}

#[test]
fn deduplication_is_order_independent() {
    let build = || {
        vec![
            A::new("rss", "Tokyo blackout", "https://n/1?utm_source=x").build(),
            A::new("deepsearch", "Tokyo blackout", "https://n/1").build(),
            A::new("rss", "Brazil protests grow", "https://n/2").build(),
        ]
    };
    let forward = deduplicate(build(), day(18));
    let mut rev = build();
    rev.reverse();
    assert_eq!(forward, deduplicate(rev, day(18)));
}

fn record(url: &str, d: u32, title: &str) -> CanonicalRecord {
    CanonicalRecord {
        title: title.into(),
        summary: String::new(),
        url: url.into(),
        published_date: day(d),
        country: "Japan".into(),
        continent: "ASIA".into(),
        confidence: Confidence::Low,
        verification_note: "sources: rss".into(),
    }
}

#[test]
fn prior_records_are_superseded_not_duplicated() {
    let prior = vec![
        record("https://n/1", 1, "old title"),
        record("https://n/2", 2, "kept"),
    ];
    let current = vec![record("https://N/1/", 3, "new title")];
    let merged = merge_with_prior(current, prior);
    let titles: Vec<&str> = merged.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["new title", "kept"]);
    assert_eq!(normalize_url(&merged[0].url), "https://n/1");
}
