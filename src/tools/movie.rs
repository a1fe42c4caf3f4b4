//! Movie discovery tool backed by the TMDB discover API.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{check_status, Tool, ToolError};

const DISCOVER_URL: &str = "https://api.themoviedb.org/3/discover/movie";

/// TMDB genre name → numeric id.
const GENRE_MAP: &[(&str, u32)] = &[
    ("action", 28),
    ("adventure", 12),
    ("animation", 16),
    ("comedy", 35),
    ("crime", 80),
    ("documentary", 99),
    ("drama", 18),
    ("family", 10751),
    ("fantasy", 14),
    ("history", 36),
    ("horror", 27),
    ("music", 10402),
    ("mystery", 9648),
    ("romance", 10749),
    ("science fiction", 878),
    ("scifi", 878),
    ("tv movie", 10770),
    ("thriller", 53),
    ("war", 10752),
    ("western", 37),
];

/// Discover movies by genre, release window, and rating.
pub struct DiscoverMovies {
    http: reqwest::Client,
    access_token: String,
}

impl DiscoverMovies {
    pub fn new(http: reqwest::Client, access_token: String) -> Self {
        Self { http, access_token }
    }
}

#[async_trait]
impl Tool for DiscoverMovies {
    fn name(&self) -> &str {
        "discover_movies"
    }

    fn description(&self) -> &str {
        "Discover movies by release date window, genres, minimum rating, and popularity. Use this for the movie section of the itinerary, e.g. recent releases worth seeing this weekend."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "primary_release_date_gte": {
                    "type": "string",
                    "description": "Only movies released on or after this date, format YYYY-MM-DD"
                },
                "primary_release_date_lte": {
                    "type": "string",
                    "description": "Only movies released on or before this date, format YYYY-MM-DD"
                },
                "with_genres": {
                    "type": "string",
                    "description": "Comma-separated genre names. Supported: action, adventure, animation, comedy, crime, documentary, drama, family, fantasy, history, horror, music, mystery, romance, science fiction, tv movie, thriller, war, western."
                },
                "vote_average_gte": {
                    "type": "number",
                    "description": "Only movies with at least this vote average"
                },
                "sort_by": {
                    "type": "string",
                    "description": "Sort option, e.g. popularity.desc, release_date.desc, vote_average.desc (default: popularity.desc)"
                },
                "page": {
                    "type": "integer",
                    "description": "Result page to query (default: 1)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", args["page"].as_u64().unwrap_or(1).to_string()),
            (
                "sort_by",
                args["sort_by"]
                    .as_str()
                    .unwrap_or("popularity.desc")
                    .to_string(),
            ),
        ];

        if let Some(date) = args["primary_release_date_gte"].as_str() {
            params.push(("primary_release_date.gte", date.to_string()));
        }
        if let Some(date) = args["primary_release_date_lte"].as_str() {
            params.push(("primary_release_date.lte", date.to_string()));
        }
        if let Some(genres) = args["with_genres"].as_str() {
            if let Some(ids) = genre_ids(genres) {
                params.push(("with_genres", ids));
            }
        }
        if let Some(vote) = args["vote_average_gte"].as_f64() {
            params.push(("vote_average.gte", vote.to_string()));
        }

        let response = self
            .http
            .get(DISCOVER_URL)
            .query(&params)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;

        let movies = extract_movies(&body);
        serde_json::to_string(&json!({ "movies": movies }))
            .map_err(|e| ToolError::Decode(e.to_string()))
    }
}

/// Map comma-separated genre names to a TMDB `with_genres` value.
/// Unknown names are skipped; returns `None` when nothing matched.
fn genre_ids(names: &str) -> Option<String> {
    let ids: Vec<String> = names
        .split(',')
        .filter_map(|name| {
            let cleaned = name.trim().to_lowercase();
            GENRE_MAP
                .iter()
                .find(|(genre, _)| *genre == cleaned)
                .map(|(_, id)| id.to_string())
        })
        .collect();

    if ids.is_empty() {
        None
    } else {
        Some(ids.join("|"))
    }
}

fn extract_movies(body: &Value) -> Vec<Value> {
    body["results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .map(|movie| {
                    json!({
                        "id": movie.get("id"),
                        "title": movie.get("title"),
                        "overview": movie.get("overview"),
                        "release_date": movie.get("release_date"),
                        "vote_average": movie.get("vote_average"),
                        "popularity": movie.get("popularity"),
                        "genre_ids": movie.get("genre_ids"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
