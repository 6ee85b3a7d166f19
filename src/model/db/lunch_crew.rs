use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core lunch crew data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LunchCrewCore {
    /// Unique lookup key.
    pub name: String,
    /// Candidate destinations in insertion order, without duplicates.
    #[serde(default)]
    pub destination_options: Vec<String>,
    /// The last drawn winner. Absent until the first draw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_winning_destination: Option<String>,
}

impl LunchCrewCore {
    /// A fresh crew with no destinations and no winner.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination_options: Vec::new(),
            current_winning_destination: None,
        }
    }
}

/// A lunch crew without an ID.
pub type NewLunchCrew = LunchCrewCore;

/// A lunch crew from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LunchCrew {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub crew: LunchCrewCore,
}

impl Deref for LunchCrew {
    type Target = LunchCrewCore;

    fn deref(&self) -> &Self::Target {
        &self.crew
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl LunchCrewCore {
        pub fn example() -> Self {
            Self::new("Lunch")
        }

        pub fn example2() -> Self {
            Self {
                name: "Second Breakfast".to_string(),
                destination_options: vec!["Bakery".to_string(), "Diner".to_string()],
                current_winning_destination: Some("Diner".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{self, doc, oid::ObjectId};

    use super::*;

    #[test]
    fn missing_fields_deserialize_as_empty() {
        let document = doc! {
            "_id": ObjectId::new(),
            "name": "Lunch",
        };
        let crew: LunchCrew = bson::from_document(document).unwrap();
        assert_eq!(crew.name, "Lunch");
        assert!(crew.destination_options.is_empty());
        assert_eq!(crew.current_winning_destination, None);
    }

    #[test]
    fn persisted_layout_is_camel_case() {
        let document = bson::to_document(&NewLunchCrew::example2()).unwrap();
        assert_eq!(
            document,
            doc! {
                "name": "Second Breakfast",
                "destinationOptions": ["Bakery", "Diner"],
                "currentWinningDestination": "Diner",
            }
        );

        // No winner means no field at all, so "set only if unset" filters match.
        let document = bson::to_document(&NewLunchCrew::example()).unwrap();
        assert!(!document.contains_key("currentWinningDestination"));
    }
}
