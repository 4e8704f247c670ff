use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use discovery::DiscoveryConfig;

pub const DEFAULT_PLACES_ENDPOINT: &str = "https://places.googleapis.com/v1/places:searchText";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// JSON snapshot file; `None` keeps records in memory only.
    pub data_path: Option<PathBuf>,
    pub places_api_key: Option<String>,
    pub places_endpoint: String,
    pub places_timeout: Duration,
    /// Tile size used when a virtual-cells request doesn't name one.
    pub default_cell_km: f64,
    pub discovery: DiscoveryConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset or unparsable values fall
    /// back to defaults, except for the listen address.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let raw_addr = get("DISCOVERY_ADDR").unwrap_or_else(|| "127.0.0.1:9200".to_string());
        let addr: SocketAddr = raw_addr
            .parse()
            .map_err(|e| format!("invalid DISCOVERY_ADDR {raw_addr:?}: {e}"))?;

        let defaults = DiscoveryConfig::default();
        let page_size = env_var(&get, "DISCOVERY_PAGE_SIZE", defaults.page_size);
        let discovery = DiscoveryConfig {
            page_size,
            max_pages_per_query: env_var(&get, "DISCOVERY_MAX_PAGES", defaults.max_pages_per_query),
            // Follows the page size unless set explicitly.
            saturation_threshold: env_var(&get, "DISCOVERY_SATURATION_THRESHOLD", page_size),
            max_virtual_cells: env_var(
                &get,
                "DISCOVERY_MAX_VIRTUAL_CELLS",
                defaults.max_virtual_cells,
            ),
            inter_cell_delay: Duration::from_millis(env_var(
                &get,
                "DISCOVERY_INTER_CELL_DELAY_MS",
                250u64,
            )),
            ..defaults
        };
        discovery.validate()?;

        let default_cell_km: f64 = env_var(&get, "DISCOVERY_DEFAULT_CELL_KM", 10.0);
        if !(default_cell_km.is_finite() && default_cell_km > 0.0) {
            return Err(format!("DISCOVERY_DEFAULT_CELL_KM must be positive, got {default_cell_km}"));
        }

        Ok(Self {
            addr,
            data_path: get("DISCOVERY_DATA_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            places_api_key: get("PLACES_API_KEY").filter(|k| !k.trim().is_empty()),
            places_endpoint: get("PLACES_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_PLACES_ENDPOINT.to_string()),
            places_timeout: Duration::from_millis(env_var(&get, "PLACES_TIMEOUT_MS", 10_000u64)),
            default_cell_km,
            discovery,
        })
    }
}

fn env_var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
