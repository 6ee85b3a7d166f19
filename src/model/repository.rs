use log::{debug, info};
use mongodb::{
    bson::{doc, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};
use rocket::{
    futures::TryStreamExt,
    outcome::try_outcome,
    request::{self, FromRequest, Request},
    State,
};

use crate::error::{Error, Result};
use crate::lottery;
use crate::model::{
    api::is_blank,
    db::lunch_crew::{LunchCrew, NewLunchCrew},
    mongodb::{is_duplicate_key_error, Coll},
};

/// All reads and writes of lunch crew documents.
#[derive(Clone)]
pub struct CrewRepository {
    crews: Coll<LunchCrew>,
    new_crews: Coll<NewLunchCrew>,
}

impl CrewRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            crews: Coll::from_db(db),
            new_crews: Coll::from_db(db),
        }
    }

    /// Every crew in the store.
    pub async fn list_crews(&self) -> Result<Vec<LunchCrew>> {
        let crews: Vec<LunchCrew> = self.crews.find(None, None).await?.try_collect().await?;
        Ok(crews)
    }

    /// The crew with the given name, or `None` if there isn't one.
    pub async fn get_crew(&self, name: &str) -> Result<Option<LunchCrew>> {
        let crew = self.crews.find_one(name_filter(name), None).await?;
        Ok(crew)
    }

    /// Insert a new crew. Names must be non-blank and unique.
    pub async fn create_crew(&self, crew: NewLunchCrew) -> Result<LunchCrew> {
        require("Lunch crew name", &crew.name)?;

        let result = self.new_crews.insert_one(&crew, None).await;
        if is_duplicate_key_error(result.as_ref()) {
            return Err(Error::Validation(format!(
                "Lunch crew name already in use: {}",
                crew.name
            )));
        }
        let id = result?
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::InvalidState("Store assigned a non-ObjectId ID".to_string()))?
            .into();

        info!("Created lunch crew {}", crew.name);
        Ok(LunchCrew { id, crew })
    }

    /// Fetch the named crew, creating it with no destinations if it doesn't exist yet.
    pub async fn ensure_crew(&self, name: &str) -> Result<LunchCrew> {
        require("Lunch crew name", name)?;

        let update = doc! {
            "$setOnInsert": { "destinationOptions": [] }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        match self
            .crews
            .find_one_and_update(name_filter(name), update, options)
            .await
        {
            Ok(Some(crew)) => Ok(crew),
            Ok(None) => Err(crew_not_found(name)),
            // Two concurrent upserts for a new name: the unique index lets one
            // through, and the loser just reads what the winner inserted.
            Err(err) if is_duplicate_key_error::<()>(Err(&err)) => {
                debug!("Lost upsert race for lunch crew {name}, re-reading");
                self.get_crew(name)
                    .await?
                    .ok_or_else(|| crew_not_found(name))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Add a destination to the named crew, ignoring it if already present.
    /// Returns the crew's destinations as they stand after the update.
    pub async fn add_destination(&self, crew_name: &str, destination: &str) -> Result<Vec<String>> {
        require("Lunch crew name", crew_name)?;
        require("Destination name", destination)?;

        let update = doc! {
            "$addToSet": { "destinationOptions": destination }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let crew = self
            .crews
            .find_one_and_update(name_filter(crew_name), update, options)
            .await?
            .ok_or_else(|| crew_not_found(crew_name))?;
        Ok(crew.crew.destination_options)
    }

    /// The named crew's destinations, in the order they were added.
    pub async fn get_destinations(&self, crew_name: &str) -> Result<Vec<String>> {
        let crew = self
            .get_crew(crew_name)
            .await?
            .ok_or_else(|| crew_not_found(crew_name))?;
        Ok(crew.crew.destination_options)
    }

    /// Overwrite the named crew's winner.
    pub async fn set_winner(&self, crew_name: &str, destination: &str) -> Result<()> {
        let update = doc! {
            "$set": { "currentWinningDestination": destination }
        };
        let result = self
            .crews
            .update_one(name_filter(crew_name), update, None)
            .await?;
        if result.matched_count == 0 {
            return Err(crew_not_found(crew_name));
        }
        Ok(())
    }

    /// Set the named crew's winner only if it has none yet.
    /// Returns true iff this call was the one that set it.
    pub async fn claim_winner(&self, crew_name: &str, destination: &str) -> Result<bool> {
        // `null` matches both a missing field and an explicit null.
        let filter = doc! {
            "name": crew_name,
            "currentWinningDestination": null,
        };
        let update = doc! {
            "$set": { "currentWinningDestination": destination }
        };
        let result = self.crews.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    /// The named crew's winner. If there isn't one yet, one is drawn and
    /// persisted, so every later call sees the same result.
    pub async fn get_winner(&self, crew_name: &str) -> Result<String> {
        let crew = self
            .get_crew(crew_name)
            .await?
            .ok_or_else(|| crew_not_found(crew_name))?;
        if let Some(winner) = crew.crew.current_winning_destination {
            return Ok(winner);
        }

        let drawn = lottery::draw(&crew.crew.destination_options)?.to_string();
        if self.claim_winner(crew_name, &drawn).await? {
            info!("Drew {drawn} as the winner for lunch crew {crew_name}");
            return Ok(drawn);
        }

        // Someone else claimed it between our read and write; theirs stands.
        debug!("Winner for lunch crew {crew_name} was claimed concurrently");
        self.get_crew(crew_name)
            .await?
            .and_then(|crew| crew.crew.current_winning_destination)
            .ok_or_else(|| crew_not_found(crew_name))
    }

    /// Draw a fresh winner for the named crew, replacing any previous one.
    pub async fn draw_winner(&self, crew_name: &str) -> Result<String> {
        let options = self.get_destinations(crew_name).await?;
        let winner = lottery::draw(&options)?.to_string();
        self.set_winner(crew_name, &winner).await?;
        info!("Drew {winner} as the new winner for lunch crew {crew_name}");
        Ok(winner)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CrewRepository {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = try_outcome!(req.guard::<&State<Database>>().await);
        request::Outcome::Success(CrewRepository::new(db))
    }
}

fn name_filter(name: &str) -> Document {
    doc! { "name": name }
}

fn crew_not_found(name: &str) -> Error {
    Error::not_found(format!("Lunch crew '{name}'"))
}

fn require(field: &str, value: &str) -> Result<()> {
    if is_blank(value) {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
