//! Where the home view asks for the weather.

use async_trait::async_trait;

use super::WeatherError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, WeatherError>;
}

/// A position fixed in configuration. Sharing can be switched off, which behaves
/// like a denied permission prompt.
pub struct ConfiguredLocation {
    coordinates: Option<Coordinates>,
    permission_granted: bool,
}

impl ConfiguredLocation {
    pub fn new(coordinates: Option<Coordinates>, permission_granted: bool) -> Self {
        Self {
            coordinates,
            permission_granted,
        }
    }
}

#[async_trait]
impl LocationProvider for ConfiguredLocation {
    async fn current_position(&self) -> Result<Coordinates, WeatherError> {
        let coordinates = self.coordinates.ok_or(WeatherError::LocationUnsupported)?;
        if !self.permission_granted {
            return Err(WeatherError::PermissionDenied);
        }
        Ok(coordinates)
    }
}
