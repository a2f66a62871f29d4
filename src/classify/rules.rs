// src/classify/rules.rs
//! Keyword rules giving a baseline category without any AI call.
//! Matching is on whole tokens, so "war" does not fire on "award".

use crate::text::tokens;

/// First matching rule wins; order encodes precedence.
const RULES: &[(&str, &[&str])] = &[
    (
        "internet_shutdown",
        &["internet shutdown", "internet blackout", "internet outage", "network outage", "telecom outage"],
    ),
    (
        "power_outage",
        &["power outage", "power cut", "blackout", "grid failure", "load shedding"],
    ),
    (
        "cyber_attack",
        &["cyberattack", "cyber attack", "ddos", "ransomware", "hacked", "data breach"],
    ),
    ("tech_outage", &["outage", "service disruption", "servers down"]),
    ("censorship", &["censorship", "banned app", "app ban", "blocked access", "vpn ban"]),
    (
        "terrorism_explosion",
        &["explosion", "bombing", "blast", "terrorist", "terrorism", "suicide attack"],
    ),
    ("war_conflict", &["war", "airstrike", "airstrikes", "missile", "invasion", "ceasefire"]),
    (
        "natural_disaster",
        &[
            "earthquake", "flood", "floods", "tsunami", "typhoon", "hurricane", "cyclone",
            "wildfire", "landslide",
        ],
    ),
    (
        "protest_strike",
        &["protest", "protests", "riot", "riots", "strike", "unrest", "demonstrators"],
    ),
    ("curfew", &["curfew", "state of emergency", "lockdown"]),
    ("pandemic", &["pandemic", "outbreak", "epidemic", "quarantine"]),
    ("election", &["election", "elections", "polling day", "referendum"]),
    (
        "holiday",
        &[
            "national holiday", "public holiday", "bank holiday", "eid al-fitr", "eid al-adha",
            "christmas day", "new year", "ramadan", "diwali", "lunar new year",
        ],
    ),
    (
        "school_calendar",
        &["school holiday", "school vacation", "exam period", "semester break", "summer vacation", "winter vacation"],
    ),
    (
        "gaming",
        &["pubg", "pubg mobile", "battlegrounds mobile", "krafton", "bgmi", "esports tournament"],
    ),
    ("competitor_game", &["free fire", "call of duty mobile", "cod mobile", "mobile legends"]),
    ("sports_event", &["world cup", "olympics", "champions league", "super bowl"]),
];

/// Advertising, finance and entertainment items never get a baseline category.
const EXCLUDE: &[&str] = &[
    "sponsored", "promotion", "stock price", "earnings", "dividend", "ipo", "hiring",
    "job opening", "k-pop", "concert", "album", "celebrity", "box office",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn categorize(&self, title: &str, snippet: &str) -> Option<&'static str> {
        let toks = tokens(&format!("{title} {snippet}"));
        if EXCLUDE.iter().any(|p| contains_phrase(&toks, p)) {
            return None;
        }
        RULES
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| contains_phrase(&toks, p)))
            .map(|(cat, _)| *cat)
    }
}

fn contains_phrase(toks: &[String], phrase: &str) -> bool {
    let needle = tokens(phrase);
    if needle.is_empty() || needle.len() > toks.len() {
        return false;
    }
    toks.windows(needle.len()).any(|w| w == needle.as_slice())
}
