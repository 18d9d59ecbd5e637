//! External data fetchers for SmartDay.
//!
//! - [`weather`]: current conditions and forecasts from Open-Meteo
//! - [`web_search`]: Tavily answer search
//! - [`gazetteer`]: the static location table both weather tools resolve against

pub mod gazetteer;
pub mod weather;
pub mod web_search;

use smartday_config::ToolsConfig;
use smartday_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use weather::{CurrentWeatherTool, OpenMeteoClient, WeatherForecastTool};
pub use web_search::WebSearchTool;

/// Create the registry with every built-in tool, in catalog order.
pub fn default_registry(config: &ToolsConfig) -> ToolRegistry {
    let timeout = Duration::from_secs(config.timeout_secs);
    let meteo = Arc::new(OpenMeteoClient::new(&config.weather_base_url, timeout));

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CurrentWeatherTool::new(meteo.clone())));
    registry.register(Arc::new(WeatherForecastTool::new(meteo)));
    registry.register(Arc::new(WebSearchTool::new(
        &config.search_url,
        config.tavily_api_key.clone(),
        timeout,
    )));
    registry
}
