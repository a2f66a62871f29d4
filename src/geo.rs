// src/geo.rs
//! Country → continent lookup used for the `continent` column.

const CONTINENTS: &[(&str, &[&str])] = &[
    ("NORTH AMERICA", &["usa", "united states", "us", "canada", "mexico"]),
    ("SOUTH AMERICA", &["brazil", "argentina", "chile", "colombia", "peru"]),
    (
        "EUROPE",
        &["germany", "uk", "united kingdom", "france", "italy", "spain", "poland", "netherlands"],
    ),
    (
        "ASIA",
        &[
            "china", "india", "japan", "korea", "south korea", "indonesia", "vietnam", "thailand",
            "philippines",
        ],
    ),
    ("MIDDLE EAST", &["iran", "israel", "saudi arabia", "turkey", "uae"]),
    ("AFRICA", &["south africa", "egypt", "nigeria", "kenya"]),
    ("OCEANIA", &["australia", "new zealand"]),
    ("RUSSIA & CIS", &["russia", "ukraine", "kazakhstan", "belarus"]),
];

/// Continent for a country name. Empty input yields an empty string,
/// unknown countries map to `OTHER`.
pub fn continent_for(country: &str) -> &'static str {
    let key = country.trim().to_ascii_lowercase();
    if key.is_empty() {
        return "";
    }
    CONTINENTS
        .iter()
        .find(|(_, names)| names.contains(&key.as_str()))
        .map(|(continent, _)| *continent)
        .unwrap_or("OTHER")
}
