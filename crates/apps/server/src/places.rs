//! Places Text Search client.
//!
//! One request per page: `POST places:searchText` with a rectangle
//! `locationRestriction`. The field mask keeps responses (and billing) to what
//! a lead needs.

use discovery::{BoxFuture, EntitySource, Place, SearchPage, SourceError};
use foundation::LatLngBounds;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,places.location,\
places.primaryType,places.addressComponents,nextPageToken";

pub struct PlacesClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    page_size: u32,
}

impl PlacesClient {
    pub fn new(http: reqwest::Client, endpoint: String, api_key: String, page_size: u32) -> Self {
        Self {
            http,
            endpoint,
            api_key,
            page_size,
        }
    }

    async fn search_text(
        &self,
        query: &str,
        viewport: LatLngBounds,
        page_token: Option<&str>,
    ) -> Result<SearchPage, SourceError> {
        let mut body = json!({
            "textQuery": query,
            "pageSize": self.page_size,
            "locationRestriction": {
                "rectangle": {
                    "low": { "latitude": viewport.sw.lat, "longitude": viewport.sw.lng },
                    "high": { "latitude": viewport.ne.lat, "longitude": viewport.ne.lng },
                }
            }
        });
        if let Some(token) = page_token {
            body["pageToken"] = json!(token);
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SourceError::Upstream(format!(
                "places search failed: {status}: {}",
                text.chars().take(300).collect::<String>()
            )));
        }

        let raw: TextSearchResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        let page = raw.into_page();
        debug!(query, results = page.results.len(), "places page");
        Ok(page)
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Upstream(e.to_string())
    }
}

impl EntitySource for PlacesClient {
    fn name(&self) -> &str {
        "places"
    }

    fn search<'a>(
        &'a self,
        query: &'a str,
        viewport: LatLngBounds,
        page_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<SearchPage, SourceError>> {
        Box::pin(self.search_text(query, viewport, page_token))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextSearchResponse {
    #[serde(default)]
    places: Vec<RawPlace>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlace {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    display_name: Option<LocalizedText>,
    #[serde(default)]
    formatted_address: Option<String>,
    #[serde(default)]
    location: Option<RawLatLng>,
    #[serde(default)]
    primary_type: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawLatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressComponent {
    long_text: String,
    #[serde(default)]
    types: Vec<String>,
}

impl TextSearchResponse {
    fn into_page(self) -> SearchPage {
        SearchPage {
            // Unnamed or unlocated places can't become leads.
            results: self.places.into_iter().filter_map(RawPlace::into_place).collect(),
            next_page_token: self.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

impl RawPlace {
    fn into_place(self) -> Option<Place> {
        let name = self.display_name?.text;
        let location = self.location?;
        let city = self
            .address_components
            .into_iter()
            .find(|c| c.types.iter().any(|t| t == "locality"))
            .map(|c| c.long_text);
        Some(Place {
            name,
            address: self.formatted_address.unwrap_or_default(),
            city,
            lat: location.latitude,
            lng: location.longitude,
            place_type: self.primary_type,
            external_id: self.id,
        })
    }
}
