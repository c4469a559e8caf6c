use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Duty period label. `Morning`, `Afternoon` and `Night` rotate in that
/// order; `Sos` is a transient override held while the driver is on an
/// active call and never takes part in the rotation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
    #[serde(rename = "SOS")]
    Sos,
}

impl Shift {
    /// Parses a stored label, tolerating stray whitespace and casing
    /// (`"night "` -> `Night`, `"SOS"` -> `Sos`). `None` for anything else.
    pub fn from_label(raw: &str) -> Option<Shift> {
        match normalize_label(raw).as_str() {
            "Morning" => Some(Shift::Morning),
            "Afternoon" => Some(Shift::Afternoon),
            "Night" => Some(Shift::Night),
            "Sos" => Some(Shift::Sos),
            _ => None,
        }
    }

    /// Next label in the Morning -> Afternoon -> Night -> Morning cycle.
    /// The SOS override sits outside the cycle and maps to itself.
    pub fn next(self) -> Shift {
        match self {
            Shift::Morning => Shift::Afternoon,
            Shift::Afternoon => Shift::Night,
            Shift::Night => Shift::Morning,
            Shift::Sos => Shift::Sos,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Shift::Morning => "Morning",
            Shift::Afternoon => "Afternoon",
            Shift::Night => "Night",
            Shift::Sos => "SOS",
        }
    }
}

/// Trim, uppercase the first letter, lowercase the remainder.
fn normalize_label(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRating {
    pub rater_id: Uuid,
    pub score: f64,
}

/// An ambulance driver record. `shift` holds the live duty label as a string:
/// records imported from older systems may carry unnormalized or unknown
/// labels, which the rotation path tolerates rather than corrects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub contact_number: Option<String>,
    pub location: Option<GeoPoint>,
    pub available: bool,
    pub shift: String,
    /// Rotation label stashed while an SOS override is active.
    pub previous_shift: Option<String>,
    pub speed_kmh: Option<f64>,
    pub ratings: Vec<DriverRating>,
    pub active_sos: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(
        name: String,
        contact_number: Option<String>,
        location: Option<GeoPoint>,
        shift: Shift,
        speed_kmh: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            contact_number,
            location,
            available: true,
            shift: shift.label().to_string(),
            previous_shift: None,
            speed_kmh,
            ratings: Vec::new(),
            active_sos: None,
            updated_at: Utc::now(),
        }
    }

    /// Running mean of user ratings, 0.0 when unrated.
    pub fn average_rating(&self) -> f64 {
        if self.ratings.is_empty() {
            return 0.0;
        }
        let total: f64 = self.ratings.iter().map(|r| r.score).sum();
        total / self.ratings.len() as f64
    }

    /// Reported speed when positive and finite, otherwise the fallback.
    pub fn effective_speed_kmh(&self, default_kmh: f64) -> f64 {
        self.speed_kmh
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(default_kmh)
    }

    /// Only available drivers with a known position can be dispatched.
    pub fn is_dispatchable(&self) -> bool {
        self.available && self.location.is_some()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{Driver, DriverRating, Shift};

    #[test]
    fn labels_normalize_before_matching() {
        assert_eq!(Shift::from_label("night "), Some(Shift::Night));
        assert_eq!(Shift::from_label("MORNING"), Some(Shift::Morning));
        assert_eq!(Shift::from_label("  afTernoon"), Some(Shift::Afternoon));
        assert_eq!(Shift::from_label("SOS"), Some(Shift::Sos));
        assert_eq!(Shift::from_label("Lunch"), None);
        assert_eq!(Shift::from_label(""), None);
    }

    #[test]
    fn rotation_cycle_has_period_three() {
        for start in [Shift::Morning, Shift::Afternoon, Shift::Night] {
            assert_eq!(start.next().next().next(), start);
        }
    }

    #[test]
    fn sos_override_is_outside_the_cycle() {
        assert_eq!(Shift::Sos.next(), Shift::Sos);
    }

    #[test]
    fn average_rating_is_zero_when_unrated() {
        let driver = Driver::new("Asha".to_string(), None, None, Shift::Morning, None);
        assert_eq!(driver.average_rating(), 0.0);
    }

    #[test]
    fn average_rating_is_the_mean_of_scores() {
        let mut driver = Driver::new("Asha".to_string(), None, None, Shift::Morning, None);
        for score in [3.0, 4.0, 5.0] {
            driver.ratings.push(DriverRating {
                rater_id: Uuid::new_v4(),
                score,
            });
        }
        assert_eq!(driver.average_rating(), 4.0);
    }

    #[test]
    fn effective_speed_falls_back_on_bad_values() {
        let mut driver = Driver::new("Ravi".to_string(), None, None, Shift::Night, Some(60.0));
        assert_eq!(driver.effective_speed_kmh(40.0), 60.0);

        driver.speed_kmh = Some(0.0);
        assert_eq!(driver.effective_speed_kmh(40.0), 40.0);

        driver.speed_kmh = None;
        assert_eq!(driver.effective_speed_kmh(40.0), 40.0);
    }
}
