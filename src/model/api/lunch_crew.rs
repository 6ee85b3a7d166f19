use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{id::ApiId, is_blank},
    db::lunch_crew::{LunchCrew, NewLunchCrew},
};

/// A request to create a lunch crew.
///
/// Missing fields deserialize as empty so that they fail validation with the
/// payload echoed back, rather than being rejected by the JSON parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LunchCrewSpec {
    #[serde(default)]
    pub name: String,
}

impl LunchCrewSpec {
    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.name) {
            return Err(Error::invalid_payload(self));
        }
        Ok(())
    }
}

impl TryFrom<LunchCrewSpec> for NewLunchCrew {
    type Error = Error;

    fn try_from(spec: LunchCrewSpec) -> Result<Self> {
        spec.validate()?;
        Ok(NewLunchCrew::new(spec.name))
    }
}

/// A destination proposed for a lunch crew.
///
/// The original wire name of the destination field was `destination`, so that
/// is accepted as well as `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSpec {
    #[serde(default)]
    pub lunch_crew_name: String,
    #[serde(default, alias = "destination")]
    pub name: String,
}

impl DestinationSpec {
    pub fn new(lunch_crew_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            lunch_crew_name: lunch_crew_name.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if is_blank(&self.lunch_crew_name) || is_blank(&self.name) {
            return Err(Error::invalid_payload(self));
        }
        Ok(())
    }
}

/// A lunch crew as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LunchCrewDescription {
    pub id: ApiId,
    pub name: String,
    pub destination_options: Vec<String>,
    pub current_winning_destination: Option<String>,
}

impl From<LunchCrew> for LunchCrewDescription {
    fn from(crew: LunchCrew) -> Self {
        Self {
            id: crew.id.into(),
            name: crew.crew.name,
            destination_options: crew.crew.destination_options,
            current_winning_destination: crew.crew.current_winning_destination,
        }
    }
}
