//! Restaurant search tool backed by the OpenStreetMap Overpass API.
//!
//! Overpass has no ranking of its own, so results are scored with simple
//! heuristics (named places, cuisine specificity, preference keyword hits,
//! known brands), deduplicated by name, and capped at ten.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{check_status, required_f64, Tool, ToolError};

const OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
const MAX_RESULTS: usize = 10;

/// Preference keyword → name/cuisine match patterns.
const PREFERENCE_KEYWORDS: &[(&str, &[&str])] = &[
    ("spicy", &["spicy", "sichuan", "szechuan", "chongqing", "hot"]),
    ("hotpot", &["hotpot", "hot pot"]),
    ("noodles", &["noodle", "ramen", "lamian"]),
    ("dumplings", &["dumpling", "jiaozi", "dim sum"]),
    ("sushi", &["sushi", "sashimi", "omakase"]),
];

/// Chains with consistent quality get a small boost.
const KNOWN_BRANDS: &[&str] = &["din tai fung", "haidilao"];

/// Find and rank restaurants near a coordinate.
pub struct FindRestaurants {
    http: reqwest::Client,
}

impl FindRestaurants {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Tool for FindRestaurants {
    fn name(&self) -> &str {
        "find_restaurants"
    }

    fn description(&self) -> &str {
        "Find nearby restaurants by cuisine and preferences. Returns up to ten ranked matches with name, cuisine, address, opening hours, and website. Requires coordinates from geocode_city."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "latitude": {
                    "type": "number",
                    "description": "Latitude of the search center"
                },
                "longitude": {
                    "type": "number",
                    "description": "Longitude of the search center"
                },
                "cuisine": {
                    "type": "string",
                    "description": "Type of cuisine, e.g. 'japanese', 'italian', 'pizza'"
                },
                "preferences": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Preference keywords, e.g. ['sushi', 'spicy', 'noodles']"
                },
                "radius": {
                    "type": "integer",
                    "description": "Search radius in meters (default: 2000)"
                }
            },
            "required": ["latitude", "longitude"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let lat = required_f64(&args, "latitude")?;
        let lon = required_f64(&args, "longitude")?;
        let cuisine = args["cuisine"].as_str().unwrap_or("");
        let preferences = string_list(&args["preferences"]);
        let radius = args["radius"].as_u64().unwrap_or(2000);

        let query = build_overpass_query(lat, lon, cuisine, &preferences, radius);

        let response = self.http.post(OVERPASS_URL).body(query).send().await?;
        let response = check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;

        let elements = body["elements"].as_array().cloned().unwrap_or_default();
        let ranked = rank_places(&elements, &preferences);

        serde_json::to_string(&json!({ "restaurants": ranked }))
            .map_err(|e| ToolError::Decode(e.to_string()))
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Build the Overpass QL query: a cuisine-tag match, a preference-driven
/// name match, or a plain restaurant search when neither applies.
fn build_overpass_query(
    lat: f64,
    lon: f64,
    cuisine: &str,
    preferences: &[String],
    radius: u64,
) -> String {
    let cuisine_pattern = sanitize_pattern(&cuisine.to_lowercase());
    let name_pattern = preferences
        .iter()
        .filter_map(|p| {
            PREFERENCE_KEYWORDS
                .iter()
                .find(|(key, _)| key == p)
                .map(|(_, patterns)| patterns.join("|"))
        })
        .collect::<Vec<_>>()
        .join("|");

    let mut clauses = Vec::new();
    if !cuisine_pattern.is_empty() {
        clauses.push(format!(
            "node[\"amenity\"~\"restaurant|fast_food\"][\"cuisine\"~\"{}\"](around:{},{},{});",
            cuisine_pattern, radius, lat, lon
        ));
    }
    if !name_pattern.is_empty() {
        clauses.push(format!(
            "node[\"amenity\"~\"restaurant|fast_food\"][\"name\"~\"{}\",i](around:{},{},{});",
            name_pattern, radius, lat, lon
        ));
    }
    if clauses.is_empty() {
        clauses.push(format!(
            "node[\"amenity\"~\"restaurant|fast_food\"](around:{},{},{});",
            radius, lat, lon
        ));
    }

    format!("[out:json];({});out tags;", clauses.join(""))
}

/// Strip characters that would escape an Overpass regex literal.
fn sanitize_pattern(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-' | '|'))
        .collect()
}

/// Score, dedupe, and cap raw Overpass elements.
fn rank_places(elements: &[Value], preferences: &[String]) -> Vec<Value> {
    let mut scored: Vec<(f64, Value)> = elements
        .iter()
        .filter_map(|element| {
            let tags = element["tags"].as_object()?;
            let name = tags.get("name")?.as_str()?;
            let score = score_place(tags, preferences);

            let address = format!(
                "{} {}",
                tag_str(tags, "addr:street"),
                tag_str(tags, "addr:housenumber")
            )
            .trim()
            .to_string();

            Some((
                score,
                json!({
                    "name": name,
                    "cuisine": tags.get("cuisine").and_then(|v| v.as_str()).unwrap_or("unknown"),
                    "score": score,
                    "address": address,
                    "opening_hours": tags.get("opening_hours"),
                    "website": tags.get("website").or_else(|| tags.get("contact:website")),
                    "lat": element.get("lat"),
                    "lon": element.get("lon"),
                }),
            ))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = std::collections::HashSet::new();
    let mut top = Vec::new();
    for (_, place) in scored {
        let name = place["name"].as_str().unwrap_or_default().to_string();
        if seen.insert(name) {
            top.push(place);
        }
        if top.len() >= MAX_RESULTS {
            break;
        }
    }
    top
}

fn tag_str<'a>(tags: &'a Map<String, Value>, key: &str) -> &'a str {
    tags.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Heuristic place score; higher is better.
fn score_place(tags: &Map<String, Value>, preferences: &[String]) -> f64 {
    let name = tag_str(tags, "name").to_lowercase();
    let cuisine = tag_str(tags, "cuisine").to_lowercase();

    let mut score = 0.0;

    // Unnamed places are filtered out upstream; a name is still worth a point
    // so preference hits stack on top of a common baseline.
    if tags.contains_key("name") {
        score += 1.0;
    }

    // Multi-valued cuisine tags signal better-mapped places
    if cuisine.contains(';') || cuisine.contains(',') {
        score += 0.5;
    }

    for preference in preferences {
        if let Some((_, keywords)) = PREFERENCE_KEYWORDS.iter().find(|(key, _)| key == preference) {
            if keywords.iter().any(|kw| name.contains(kw) || cuisine.contains(kw)) {
                score += 1.5;
            }
        }
    }

    if KNOWN_BRANDS.iter().any(|brand| name.contains(brand)) {
        score += 2.0;
    }

    score
}
