use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};

pub const POPULARITY: &str = "popularity";
pub const ENERGY: &str = "energy";
pub const INSTRUMENTALNESS: &str = "instrumentalness";

const SLIDER_MIN: u8 = 0;
const SLIDER_MAX: u8 = 100;
const SLIDER_DEFAULT: u8 = 50;

/// Named preference sliders sent to the recommender
///
/// Each slider runs 0..=100. The stock sliders are popularity
/// (underground to mainstream), energy (chill to high energy) and
/// instrumentalness (vocal heavy to instrumental).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PreferenceVector {
    sliders: BTreeMap<String, u8>,
}

impl Default for PreferenceVector {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceVector {
    /// Creates the stock sliders, all centred
    pub fn new() -> Self {
        let sliders = [POPULARITY, ENERGY, INSTRUMENTALNESS]
            .into_iter()
            .map(|name| (name.to_string(), SLIDER_DEFAULT))
            .collect();
        Self { sliders }
    }

    /// Sets a slider, adding it if absent
    pub fn set(&mut self, name: &str, value: u8) -> AppResult<()> {
        if !(SLIDER_MIN..=SLIDER_MAX).contains(&value) {
            return Err(AppError::InvalidInput(format!(
                "Preference '{}' must be between {} and {}, got {}",
                name, SLIDER_MIN, SLIDER_MAX, value
            )));
        }
        self.sliders.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u8> {
        self.sliders.get(name).copied()
    }

    /// Rejects vectors deserialized with out-of-range values
    pub fn validate(&self) -> AppResult<()> {
        match self.sliders.iter().find(|(_, v)| **v > SLIDER_MAX) {
            Some((name, value)) => Err(AppError::InvalidInput(format!(
                "Preference '{}' must be between {} and {}, got {}",
                name, SLIDER_MIN, SLIDER_MAX, value
            ))),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.sliders.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
