use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{api::lunch_crew::DestinationSpec, repository::CrewRepository};
use crate::realtime::{self, Notifier};

pub fn routes() -> Vec<Route> {
    routes![propose_destination]
}

/// Add a destination to a crew. Everyone watching the crew is sent the new list.
#[post("/destination", data = "<spec>", format = "json")]
async fn propose_destination(
    spec: Json<DestinationSpec>,
    crews: CrewRepository,
    notifier: &State<Notifier>,
) -> Result<()> {
    realtime::propose_destination(&crews, notifier, &spec).await?;
    Ok(())
}
