//! Event discovery tool backed by the Ticketmaster Discovery API.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{check_status, required_f64, Tool, ToolError};

const DISCOVERY_URL: &str = "https://app.ticketmaster.com/discovery/v2/events";

/// Discovery wants a geohash rather than raw coordinates; precision 9 is
/// roughly a five-meter cell, well below any search radius we pass.
const GEOHASH_PRECISION: usize = 9;

/// Find upcoming events near a coordinate.
pub struct DiscoverEvents {
    http: reqwest::Client,
    api_key: String,
}

impl DiscoverEvents {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl Tool for DiscoverEvents {
    fn name(&self) -> &str {
        "discover_events"
    }

    fn description(&self) -> &str {
        "Discover upcoming events (concerts, sports, theatre) near a location. Returns event name, date, time, venue, and ticket URL, soonest first. Requires coordinates from geocode_city."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lat": {
                    "type": "number",
                    "description": "Latitude"
                },
                "lon": {
                    "type": "number",
                    "description": "Longitude"
                },
                "radius": {
                    "type": "integer",
                    "description": "Search radius (default: 20)"
                },
                "unit": {
                    "type": "string",
                    "description": "Radius unit, 'km' or 'miles' (default: 'km')"
                },
                "size": {
                    "type": "integer",
                    "description": "Number of events to return (default: 5)"
                },
                "segment_name": {
                    "type": "string",
                    "description": "Event segment, e.g. 'music', 'sports' (default: 'music')"
                }
            },
            "required": ["lat", "lon"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let lat = required_f64(&args, "lat")?;
        let lon = required_f64(&args, "lon")?;
        let radius = args["radius"].as_u64().unwrap_or(20);
        let unit = args["unit"].as_str().unwrap_or("km");
        let size = args["size"].as_u64().unwrap_or(5);
        let segment = args["segment_name"].as_str().unwrap_or("music");

        let geo_point = geohash_encode(lat, lon, GEOHASH_PRECISION);

        let response = self
            .http
            .get(DISCOVERY_URL)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("geoPoint", geo_point.as_str()),
                ("radius", &radius.to_string()),
                ("unit", unit),
                ("size", &size.to_string()),
                ("sort", "date,asc"),
                ("segmentName", segment),
            ])
            .send()
            .await?;

        let response = check_status(response).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;

        let events = extract_events(&body);
        serde_json::to_string(&json!({ "events": events }))
            .map_err(|e| ToolError::Decode(e.to_string()))
    }
}

/// Flatten the Discovery response into the fields the planner cares about.
fn extract_events(body: &Value) -> Vec<Value> {
    let Some(raw_events) = body["_embedded"]["events"].as_array() else {
        return Vec::new();
    };

    raw_events
        .iter()
        .map(|event| {
            let mut info = json!({
                "name": event.get("name"),
                "url": event.get("url"),
                "date": event["dates"]["start"].get("localDate"),
                "time": event["dates"]["start"].get("localTime"),
            });

            if let Some(venue) = event["_embedded"]["venues"].as_array().and_then(|v| v.first()) {
                info["venue"] = venue.get("name").cloned().unwrap_or(Value::Null);
                info["city"] = venue["city"].get("name").cloned().unwrap_or(Value::Null);
            }

            info
        })
        .collect()
}

const GEOHASH_BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Standard geohash encoding: interleave longitude/latitude bisection bits,
/// five bits per base32 character.
fn geohash_encode(lat: f64, lon: f64, precision: usize) -> String {
    let (mut lat_lo, mut lat_hi) = (-90.0f64, 90.0f64);
    let (mut lon_lo, mut lon_hi) = (-180.0f64, 180.0f64);

    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0u8;
    let mut ch = 0usize;

    while hash.len() < precision {
        if even {
            let mid = (lon_lo + lon_hi) / 2.0;
            if lon >= mid {
                ch = (ch << 1) | 1;
                lon_lo = mid;
            } else {
                ch <<= 1;
                lon_hi = mid;
            }
        } else {
            let mid = (lat_lo + lat_hi) / 2.0;
            if lat >= mid {
                ch = (ch << 1) | 1;
                lat_lo = mid;
            } else {
                ch <<= 1;
                lat_hi = mid;
            }
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            hash.push(GEOHASH_BASE32[ch] as char);
            bits = 0;
            ch = 0;
        }
    }

    hash
}
