// src/dedup.rs
//! Merge articles that describe the same real-world item into one
//! canonical record each.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use url::Url;

use crate::geo::continent_for;
use crate::model::{normalize_category, CanonicalRecord, ClassifiedArticle, Confidence};
use crate::text::tokens;

/// Token-overlap (Jaccard) needed for two same-day titles to merge.
pub const TITLE_JACCARD_THRESHOLD: f64 = 0.7;
/// Titles shorter than this many tokens are compared by edit distance instead.
pub const SHORT_TITLE_TOKENS: usize = 4;
pub const SHORT_TITLE_SIMILARITY: f64 = 0.9;

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "ref", "ref_src", "igshid",
    "cmpid", "ocid", "oc",
];

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Grouping key: lower-cased, whitespace removed, tracking parameters and
/// fragment dropped, remaining parameters sorted, trailing `/` trimmed.
pub fn normalize_url(raw: &str) -> String {
    let compact: String = raw.split_whitespace().collect();
    let mut out = match Url::parse(&compact) {
        Ok(mut u) => {
            u.set_fragment(None);
            let mut pairs: Vec<(String, String)> = u
                .query_pairs()
                .filter(|(k, _)| !is_tracking_param(k))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            pairs.sort();
            if pairs.is_empty() {
                u.set_query(None);
            } else {
                u.query_pairs_mut().clear().extend_pairs(pairs.iter());
            }
            u.to_string()
        }
        Err(_) => compact,
    };
    out = out.to_lowercase();
    while out.ends_with('/') {
        out.pop();
    }
    out
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

/// Same-day titles that are near-identical after tokenization.
pub fn titles_match(a: &str, b: &str) -> bool {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.len() < SHORT_TITLE_TOKENS || tb.len() < SHORT_TITLE_TOKENS {
        return strsim::normalized_levenshtein(&ta.join(" "), &tb.join(" ")) >= SHORT_TITLE_SIMILARITY;
    }
    let sa: HashSet<String> = ta.into_iter().collect();
    let sb: HashSet<String> = tb.into_iter().collect();
    jaccard(&sa, &sb) >= TITLE_JACCARD_THRESHOLD
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Smaller index as root keeps grouping order-independent.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Canonical record plus the trend magnitude used for ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub record: CanonicalRecord,
    pub magnitude: f64,
}

/// Group, merge, and order. `today` dates articles the provider left undated.
pub fn deduplicate(mut articles: Vec<ClassifiedArticle>, today: NaiveDate) -> Vec<Merged> {
    // Fixed input order so grouping and tie-breaks never depend on arrival order.
    articles.sort_by(|a, b| {
        normalize_url(&a.raw.url)
            .cmp(&normalize_url(&b.raw.url))
            .then_with(|| a.raw.source_id.cmp(&b.raw.source_id))
            .then_with(|| a.raw.title.cmp(&b.raw.title))
    });

    let keys: Vec<String> = articles.iter().map(|a| normalize_url(&a.raw.url)).collect();
    let mut ds = DisjointSet::new(articles.len());

    let mut by_key: HashMap<&str, usize> = HashMap::new();
    for (i, k) in keys.iter().enumerate() {
        match by_key.get(k.as_str()) {
            Some(&first) => ds.union(first, i),
            None => {
                by_key.insert(k.as_str(), i);
            }
        }
    }

    let mut by_day: HashMap<NaiveDate, Vec<usize>> = HashMap::new();
    for (i, a) in articles.iter().enumerate() {
        if let Some(ts) = a.raw.published_at {
            by_day.entry(ts.date_naive()).or_default().push(i);
        }
    }
    for idxs in by_day.values() {
        for (n, &i) in idxs.iter().enumerate() {
            for &j in &idxs[n + 1..] {
                if keys[i] != keys[j] && titles_match(&articles[i].raw.title, &articles[j].raw.title) {
                    ds.union(i, j);
                }
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..articles.len() {
        let root = ds.find(i);
        groups.entry(root).or_default().push(i);
    }

    let mut merged: Vec<Merged> = groups
        .into_values()
        .map(|idxs| {
            let members: Vec<&ClassifiedArticle> = idxs.iter().map(|&i| &articles[i]).collect();
            merge_group(&members, today)
        })
        .collect();

    sort_merged(&mut merged);
    merged
}

/// `publishedDate` desc, magnitude desc, url asc.
pub fn sort_merged(merged: &mut [Merged]) {
    merged.sort_by(|a, b| {
        b.record
            .published_date
            .cmp(&a.record.published_date)
            .then_with(|| b.magnitude.partial_cmp(&a.magnitude).unwrap_or(Ordering::Equal))
            .then_with(|| normalize_url(&a.record.url).cmp(&normalize_url(&b.record.url)))
    });
}

/// Representative order: confidence desc, earliest published, longer
/// summary, then url/source for a total order.
fn representative_cmp(a: &ClassifiedArticle, b: &ClassifiedArticle) -> Ordering {
    b.confidence_hint
        .cmp(&a.confidence_hint)
        .then_with(|| match (a.raw.published_at, b.raw.published_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.summary.chars().count().cmp(&a.summary.chars().count()))
        .then_with(|| a.raw.url.cmp(&b.raw.url))
        .then_with(|| a.raw.source_id.cmp(&b.raw.source_id))
}

fn merge_group(members: &[&ClassifiedArticle], today: NaiveDate) -> Merged {
    let mut sorted: Vec<&ClassifiedArticle> = members.to_vec();
    sorted.sort_by(|a, b| representative_cmp(a, b));
    let rep = sorted[0];

    let mut confidence = sorted
        .iter()
        .map(|m| m.confidence_hint)
        .max()
        .unwrap_or(Confidence::Low);

    let mut notes: BTreeSet<String> = members.iter().flat_map(|m| m.notes.iter().cloned()).collect();

    // Independent AI adapters that each classified the item while searching.
    let mut provider_cats: Vec<(&str, String)> = members
        .iter()
        .filter_map(|m| {
            m.raw
                .provider_category
                .as_deref()
                .map(|c| (m.raw.source_id.as_str(), normalize_category(c)))
        })
        .collect();
    provider_cats.sort();
    provider_cats.dedup_by(|a, b| a.0 == b.0);
    if provider_cats.len() >= 2 {
        let cats: BTreeSet<&str> = provider_cats.iter().map(|(_, c)| c.as_str()).collect();
        let ids: Vec<&str> = provider_cats.iter().map(|(s, _)| *s).collect();
        if cats.len() == 1 {
            confidence = confidence.max(Confidence::High);
            notes.insert(format!(
                "corroborated across sources: {} ({})",
                provider_cats[0].1,
                ids.join("+")
            ));
        } else {
            let listed: Vec<String> = provider_cats.iter().map(|(s, c)| format!("{s}={c}")).collect();
            confidence = confidence.max(Confidence::Medium);
            notes.insert(format!("sources disagree: {}", listed.join(" vs ")));
        }
    }

    let summary = if rep.summary.trim().is_empty() {
        members
            .iter()
            .map(|m| m.summary.as_str())
            .max_by(|a, b| a.chars().count().cmp(&b.chars().count()).then_with(|| b.cmp(a)))
            .unwrap_or_default()
            .to_string()
    } else {
        rep.summary.clone()
    };

    let country = if rep.country.is_empty() {
        sorted
            .iter()
            .map(|m| m.country.as_str())
            .find(|c| !c.is_empty())
            .unwrap_or_default()
            .to_string()
    } else {
        rep.country.clone()
    };

    let sources: BTreeSet<&str> = members
        .iter()
        .flat_map(|m| m.sources.iter().map(String::as_str))
        .collect();

    let mut note_parts = vec![format!("sources: {}", sources.into_iter().collect::<Vec<_>>().join(", "))];
    if let Some(cat) = &rep.category {
        note_parts.push(format!("category: {cat}"));
    }
    note_parts.extend(notes);

    Merged {
        record: CanonicalRecord {
            title: rep.raw.title.clone(),
            summary,
            url: rep.raw.url.clone(),
            published_date: rep
                .raw
                .published_at
                .map(|t| t.date_naive())
                .unwrap_or(today),
            continent: continent_for(&country).to_string(),
            country,
            confidence,
            verification_note: note_parts.join("; "),
        },
        magnitude: members.iter().map(|m| m.magnitude).fold(0.0, f64::max),
    }
}

/// This run's records supersede prior ones with the same normalized URL;
/// other prior records are kept as they were. Stable by date desc.
pub fn merge_with_prior(
    current: Vec<CanonicalRecord>,
    prior: Vec<CanonicalRecord>,
) -> Vec<CanonicalRecord> {
    let mut seen: HashSet<String> = current.iter().map(|r| normalize_url(&r.url)).collect();
    let mut out = current;
    for r in prior {
        if seen.insert(normalize_url(&r.url)) {
            out.push(r);
        }
    }
    out.sort_by(|a, b| b.published_date.cmp(&a.published_date));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_normalization() {
        assert_eq!(
            normalize_url(" HTTPS://Example.com/News/1/?utm_source=x&b=2&a=1#frag "),
            "https://example.com/news/1/?a=1&b=2"
        );
        assert_eq!(
            normalize_url("https://example.com/a?fbclid=abc"),
            "https://example.com/a"
        );
        assert_eq!(normalize_url("https://example.com/a/"), "https://example.com/a");
        assert_eq!(normalize_url("not a url"), "notaurl");
    }

    #[test]
    fn title_similarity() {
        assert!(titles_match(
            "Massive earthquake strikes northern Japan coast",
            "Massive earthquake strikes northern Japan coast, officials say"
        ));
        assert!(!titles_match(
            "Massive earthquake strikes northern Japan coast",
            "Floods force evacuations across southern Brazil"
        ));
        assert!(titles_match("Brazil blackout", "Brazil blackout!"));
    }
}
