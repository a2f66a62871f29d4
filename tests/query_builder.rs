// tests/query_builder.rs
use std::fs;
use std::path::Path;

use trend_news_collector::config::keywords::load_keywords_from;
use trend_news_collector::model::{Direction, TrendSignal};
use trend_news_collector::query::QueryBuilder;

fn sig(country: &str, direction: Direction, magnitude: f64) -> TrendSignal {
    TrendSignal {
        country: country.to_string(),
        direction,
        magnitude,
    }
}

#[test]
fn builds_ordered_deduplicated_queries() {
    let kw = load_keywords_from(Path::new("tests/fixtures/keywords.toml")).unwrap();
    let signals = vec![
        sig("Japan", Direction::Rising, 2.5),
        sig("Brazil", Direction::Falling, 1.0),
        sig("Atlantis", Direction::Rising, 9.0),
        sig("japan", Direction::Rising, 4.0),
    ];
    let queries = QueryBuilder::new(&kw).build(&signals);

    let texts: Vec<&str> = queries.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Japan outage",
            "Japan blackout",
            "Japan holiday",
            "Brazil internet",
            "Brazil carnival",
            "Brazil internet shutdown",
            "PUBG Mobile server down",
            "internet shutdown",
            "power outage",
        ]
    );

    // The repeated Japan signal merged into the first queries.
    let first = &queries[0];
    assert_eq!(first.country.as_deref(), Some("Japan"));
    assert_eq!(first.magnitude, 4.0);
    assert_eq!(first.signals.len(), 2);

    let global = queries.iter().find(|q| q.text == "power outage").unwrap();
    assert_eq!(global.country, None);
    assert_eq!(global.magnitude, 0.0);
}

#[test]
fn no_signals_means_global_queries_only() {
    let kw = load_keywords_from(Path::new("tests/fixtures/keywords.toml")).unwrap();
    let queries = QueryBuilder::new(&kw).build(&[]);
    assert_eq!(queries.len(), 3);
    assert!(queries.iter().all(|q| q.country.is_none()));
}

#[test]
fn unknown_country_never_aborts() {
    let kw = trend_news_collector::KeywordConfig::from_countries(vec![(
        "India",
        vec!["India blackout"],
    )])
    .unwrap();
    let queries = QueryBuilder::new(&kw).build(&[sig("Peru", Direction::Falling, 1.0)]);
    assert!(queries.is_empty());
}

#[test]
fn impact_categories_follow_base_keywords_up_to_the_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keywords.toml");
    fs::write(
        &path,
        r#"
        base_keywords = ["internet shutdown"]
        max_global_queries = 2

        [traffic_impact_keywords]
        power = ["power outage", "blackout"]
        conflict = ["missile attack"]
        internet = ["internet shutdown", "network outage"]
        weather = ["typhoon landfall"]
        "#,
    )
    .unwrap();
    let kw = load_keywords_from(&path).unwrap();
    let queries = QueryBuilder::new(&kw).build(&[]);

    // Categories go in name order; one already issued as a base keyword
    // does not count against the cap.
    let texts: Vec<&str> = queries.iter().map(|q| q.text.as_str()).collect();
    assert_eq!(texts, vec!["internet shutdown", "missile attack", "power outage"]);
    assert!(queries.iter().all(|q| q.country.is_none() && q.signals.is_empty()));
}
