//! Open-Meteo weather fetchers: current conditions and one-day forecasts.
//!
//! Unknown locations and days without forecast data are reported as
//! `ToolOutput::Unavailable` with a bracketed message; only transport and
//! decoding failures are errors.

use async_trait::async_trait;
use serde::Deserialize;
use smartday_core::error::ToolError;
use smartday_core::tool::{
    CurrentWeather, Forecast, ParameterSpec, Tool, ToolArguments, ToolDescriptor, ToolKind,
    ToolOutput, required_str,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::gazetteer::{self, Region};

const LOCATION_HINT: &str = "광역시도, e.g. 서울, 경기";

/// Thin client over the Open-Meteo forecast endpoint.
pub struct OpenMeteoClient {
    base_url: String,
    client: reqwest::Client,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn get_json(
        &self,
        tool: ToolKind,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: tool.name().to_string(),
            reason,
        };
        let url = format!("{}/forecast", self.base_url);
        debug!(tool = %tool, url = %url, "Calling Open-Meteo");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        // Out-of-range dates come back as 400 with an error body; the caller
        // inspects the payload rather than the status.
        response.json().await.map_err(|e| failed(e.to_string()))
    }

    /// Max temperature and representative condition for `location` on `date`.
    pub async fn forecast(&self, location: &str, date: &str) -> Result<ToolOutput, ToolError> {
        let Some(region) = gazetteer::resolve(location) else {
            return Ok(ToolOutput::Unavailable(location_not_found(location)));
        };

        let mut query = coordinates(region);
        query.extend([
            ("hourly", "temperature_2m,weathercode".to_string()),
            ("timezone", "Asia/Seoul".to_string()),
            ("start_date", date.to_string()),
            ("end_date", date.to_string()),
        ]);
        let data = self.get_json(ToolKind::WeatherForecast, &query).await?;

        let Some(hourly) = data.get("hourly") else {
            return Ok(ToolOutput::Unavailable(format!(
                "[{date} {}의 날씨 예보 데이터를 찾을 수 없습니다. 날짜가 과거이거나 예보가 제공되지 않는 경우일 수 있습니다.]",
                region.name
            )));
        };
        let hourly: HourlyBlock =
            serde_json::from_value(hourly.clone()).map_err(|e| ToolError::ExecutionFailed {
                tool_name: ToolKind::WeatherForecast.name().to_string(),
                reason: format!("unexpected hourly block: {e}"),
            })?;

        let (max_temperature, weather) = summarize_hourly(&hourly.temperature_2m, &hourly.weathercode);
        Ok(ToolOutput::Forecast(Forecast {
            date: date.to_string(),
            location: region.name.to_string(),
            max_temperature,
            weather: weather.to_string(),
        }))
    }

    /// Current temperature and condition at `location`.
    pub async fn current(&self, location: &str) -> Result<ToolOutput, ToolError> {
        let Some(region) = gazetteer::resolve(location) else {
            return Ok(ToolOutput::Unavailable(location_not_found(location)));
        };

        let mut query = coordinates(region);
        query.push(("current_weather", "true".to_string()));
        let data = self.get_json(ToolKind::CurrentWeather, &query).await?;

        let current: CurrentBlock = data
            .get("current_weather")
            .cloned()
            .ok_or_else(|| "missing current_weather block".to_string())
            .and_then(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
            .map_err(|reason| ToolError::ExecutionFailed {
                tool_name: ToolKind::CurrentWeather.name().to_string(),
                reason,
            })?;

        Ok(ToolOutput::CurrentWeather(CurrentWeather {
            temperature: current.temperature,
            weather: current
                .weathercode
                .map(gazetteer::weather_label)
                .unwrap_or(gazetteer::UNKNOWN_WEATHER)
                .to_string(),
        }))
    }
}

fn coordinates(region: &Region) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", region.latitude.to_string()),
        ("longitude", region.longitude.to_string()),
    ]
}

fn location_not_found(location: &str) -> String {
    format!("[{location}의 위치 정보를 찾을 수 없습니다.]")
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    weathercode: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature: f64,
    #[serde(default)]
    weathercode: Option<i64>,
}

/// Reduce an hourly series to (max temperature, most frequent condition).
///
/// Null samples are ignored. Ties between equally frequent codes go to the
/// code seen first.
pub fn summarize_hourly(temps: &[Option<f64>], codes: &[Option<i64>]) -> (Option<f64>, &'static str) {
    let max = temps
        .iter()
        .flatten()
        .copied()
        .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |m| m.max(t))));

    let mut counts: HashMap<i64, (usize, usize)> = HashMap::new();
    for (pos, code) in codes.iter().flatten().enumerate() {
        counts.entry(*code).or_insert((0, pos)).0 += 1;
    }
    let label = counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(code, _)| gazetteer::weather_label(code))
        .unwrap_or(gazetteer::UNKNOWN_WEATHER);

    (max, label)
}

/// `get_celsius_temperature`
pub struct CurrentWeatherTool {
    client: Arc<OpenMeteoClient>,
}

impl CurrentWeatherTool {
    pub fn new(client: Arc<OpenMeteoClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CurrentWeatherTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CurrentWeather
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.kind().name().into(),
            description: r#"지정된 위치의 현재 섭씨 기온과 날씨 상태(맑음, 흐림 등) 확인. 반환 예시: {"temperature": 23.5, "weather": "맑음"}"#.into(),
            parameters: vec![ParameterSpec::required_string("location", LOCATION_HINT)],
        }
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        let location = required_str(args, "location")?;
        self.client.current(location).await
    }
}

/// `get_weather_forecast`
pub struct WeatherForecastTool {
    client: Arc<OpenMeteoClient>,
}

impl WeatherForecastTool {
    pub fn new(client: Arc<OpenMeteoClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WeatherForecast
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.kind().name().into(),
            description: r#"지정된 위치와 날짜의 날씨 예보(최고기온, 대표 날씨 상태)를 반환. 반환 예시: {"date": "2025-09-27", "location": "서울", "max_temperature": 28.5, "weather": "맑음"}"#.into(),
            parameters: vec![
                ParameterSpec::required_string("location", LOCATION_HINT),
                ParameterSpec::required_string("date", "날짜(yyyy-mm-dd)"),
            ],
        }
    }

    async fn invoke(&self, args: &ToolArguments) -> Result<ToolOutput, ToolError> {
        let location = required_str(args, "location")?;
        let date = required_str(args, "date")?;
        self.client.forecast(location, date).await
    }
}
