use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A point on the map. Equality compares coordinates only; the name is a label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        let location = Self {
            lat,
            lng,
            name: None,
        };
        location.validate()?;
        Ok(location)
    }

    pub fn named(lat: f64, lng: f64, name: impl Into<String>) -> Result<Self, ValidationError> {
        Ok(Self {
            name: Some(name.into()),
            ..Self::new(lat, lng)?
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(ValidationError::Latitude(self.lat));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(ValidationError::Longitude(self.lng));
        }
        Ok(())
    }

    /// Same label, different coordinates.
    pub fn moved_to(&self, lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            name: self.name.clone(),
        }
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("({:.4}, {:.4})", self.lat, self.lng),
        }
    }

    pub fn as_lat_lng(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.lat == other.lat && self.lng == other.lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_name() {
        let a = Location::named(28.6139, 77.209, "Delhi").expect("valid");
        let b = Location::new(28.6139, 77.209).expect("valid");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert_eq!(
            Location::new(91.0, 0.0),
            Err(ValidationError::Latitude(91.0))
        );
        assert_eq!(
            Location::new(0.0, -180.5),
            Err(ValidationError::Longitude(-180.5))
        );
        assert!(Location::new(f64::NAN, 0.0).is_err());
    }
}
