//! WMO weather interpretation codes, as reported by Open-Meteo.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherCondition {
    pub description: &'static str,
    pub icon: &'static str,
}

const UNKNOWN: WeatherCondition = WeatherCondition {
    description: "Unknown",
    icon: "",
};

const CONDITIONS: &[(i64, &str, &str)] = &[
    (0, "Clear sky", "☀️"),
    (1, "Mainly clear", "🌤️"),
    (2, "Partly cloudy", "⛅"),
    (3, "Overcast", "☁️"),
    (45, "Fog", "🌫️"),
    (48, "Depositing rime fog", "🌫️"),
    (51, "Light drizzle", "🌦️"),
    (53, "Drizzle", "🌦️"),
    (55, "Dense drizzle", "🌦️"),
    (56, "Light freezing drizzle", "🌧️"),
    (57, "Freezing drizzle", "🌧️"),
    (61, "Slight rain", "🌦️"),
    (63, "Rain", "🌧️"),
    (65, "Heavy rain", "🌧️"),
    (66, "Light freezing rain", "🌧️"),
    (67, "Freezing rain", "🌧️"),
    (71, "Slight snow fall", "🌨️"),
    (73, "Snow fall", "🌨️"),
    (75, "Heavy snow fall", "❄️"),
    (77, "Snow grains", "❄️"),
    (80, "Slight rain showers", "🌦️"),
    (81, "Rain showers", "🌧️"),
    (82, "Violent rain showers", "⛈️"),
    (85, "Slight snow showers", "🌨️"),
    (86, "Heavy snow showers", "❄️"),
    (95, "Thunderstorm", "⛈️"),
    (96, "Thunderstorm with slight hail", "⛈️"),
    (99, "Thunderstorm with heavy hail", "⛈️"),
];

pub fn describe(code: Option<i64>) -> WeatherCondition {
    code.and_then(|code| CONDITIONS.iter().find(|(c, _, _)| *c == code))
        .map(|&(_, description, icon)| WeatherCondition { description, icon })
        .unwrap_or(UNKNOWN)
}
