//! Geocoding tool backed by OpenStreetMap Nominatim.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{check_status, required_str, Tool, ToolError};

const SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Resolve a city name to latitude/longitude.
pub struct GeocodeCity {
    http: reqwest::Client,
}

impl GeocodeCity {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

/// One Nominatim search result. `lat`/`lon` arrive as strings.
#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

#[async_trait]
impl Tool for GeocodeCity {
    fn name(&self) -> &str {
        "geocode_city"
    }

    fn description(&self) -> &str {
        "Resolve the latitude and longitude of a city using OpenStreetMap Nominatim. Returns 'lat', 'lon', and 'display_name'. Use this before searching for restaurants or events, which need coordinates."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {
                    "type": "string",
                    "description": "City name with optional region or country, e.g. 'San Jose, CA' or 'Huangshi, China'"
                }
            },
            "required": ["city"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let city = required_str(&args, "city")?;

        let response = self
            .http
            .get(SEARCH_URL)
            .query(&[("q", city), ("format", "json"), ("limit", "1")])
            .header("Accept-Language", "en")
            .send()
            .await?;

        let response = check_status(response).await?;
        let hits: Vec<NominatimHit> = response
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;

        let Some(hit) = hits.into_iter().next() else {
            return Err(ToolError::InvalidArgument(
                "city",
                format!("no location found for '{}'", city),
            ));
        };

        let (lat, lon) = parse_coordinates(&hit)?;
        let summary = json!({
            "lat": lat,
            "lon": lon,
            "display_name": hit.display_name,
        });
        serde_json::to_string(&summary).map_err(|e| ToolError::Decode(e.to_string()))
    }
}

fn parse_coordinates(hit: &NominatimHit) -> Result<(f64, f64), ToolError> {
    let lat = hit
        .lat
        .parse::<f64>()
        .map_err(|e| ToolError::Decode(format!("bad latitude '{}': {}", hit.lat, e)))?;
    let lon = hit
        .lon
        .parse::<f64>()
        .map_err(|e| ToolError::Decode(format!("bad longitude '{}': {}", hit.lon, e)))?;
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_city_is_rejected() {
        let tool = GeocodeCity::new(reqwest::Client::new());
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingArgument("city")));
    }

    #[test]
    fn nominatim_hit_parses_string_coordinates() {
        let hit: NominatimHit = serde_json::from_value(json!({
            "lat": "37.3361663",
            "lon": "-121.890591",
            "display_name": "San Jose, Santa Clara County, California, United States"
        }))
        .unwrap();
        let (lat, lon) = parse_coordinates(&hit).unwrap();
        assert!((lat - 37.336).abs() < 0.01);
        assert!((lon + 121.890).abs() < 0.01);
    }

    #[test]
    fn malformed_coordinates_are_a_decode_error() {
        let hit = NominatimHit {
            lat: "not-a-number".to_string(),
            lon: "0".to_string(),
            display_name: String::new(),
        };
        assert!(matches!(
            parse_coordinates(&hit).unwrap_err(),
            ToolError::Decode(_)
        ));
    }
}
