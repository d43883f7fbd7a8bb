use indexmap::IndexMap;

use crate::config::LocationConfig;
use crate::models::Location;

/// The fixed, ordered set of locations polled every cycle
#[derive(Debug, Clone)]
pub struct LocationRegistry {
    locations: Vec<Location>,
}

impl LocationRegistry {
    /// One location per config entry, keyed by its config name
    pub fn from_config(locations: &IndexMap<String, LocationConfig>) -> Self {
        let locations = locations
            .iter()
            .map(|(name, conf)| {
                tracing::debug!(
                    "Loaded {} with country={}, state={}, city={}",
                    name,
                    conf.country,
                    conf.state,
                    conf.city
                );
                Location {
                    name: name.clone(),
                    country: conf.country.clone(),
                    state: conf.state.clone(),
                    city: conf.city.clone(),
                }
            })
            .collect();
        Self { locations }
    }

    /// Locations in config order
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// Number of configured locations
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// True when no location is configured
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl FromIterator<Location> for LocationRegistry {
    fn from_iter<I: IntoIterator<Item = Location>>(iter: I) -> Self {
        Self {
            locations: iter.into_iter().collect(),
        }
    }
}
