//! Realtime crew updates: the operations behind each client event, and the
//! registry of who is listening.

use log::{debug, info, warn};
use rocket::serde::json::serde_json;

use crate::error::Result;
use crate::model::{
    api::{
        event::{ClientEvent, ServerEvent},
        lunch_crew::DestinationSpec,
    },
    repository::CrewRepository,
};

mod notifier;

pub use notifier::{Connection, ConnectionId, Notifier, Sequence};

/// Add the connection to the crew's room, then send it the crew's current
/// state. If the crew has destinations but no winner yet, one is drawn.
///
/// Runs in the crew's sequence, so no broadcast can land between the read and
/// the send and leave the connection holding stale state.
pub async fn subscribe(
    crews: &CrewRepository,
    notifier: &Notifier,
    connection: &Connection,
    crew_name: &str,
) -> Result<()> {
    let _sequence = notifier.sequence(crew_name).await;
    notifier.join(connection, crew_name).await;

    let options = crews.get_destinations(crew_name).await?;
    let has_options = !options.is_empty();
    connection.send(ServerEvent::DestinationOptions(options));
    if has_options {
        let winner = crews.get_winner(crew_name).await?;
        connection.send(ServerEvent::WinningOption(winner));
    }
    Ok(())
}

/// Make sure the crew exists, then subscribe to it.
pub async fn join(
    crews: &CrewRepository,
    notifier: &Notifier,
    connection: &Connection,
    crew_name: &str,
) -> Result<()> {
    crews.ensure_crew(crew_name).await?;
    subscribe(crews, notifier, connection, crew_name).await
}

/// Draw a new winner for the crew and tell its room.
pub async fn pull_lever(crews: &CrewRepository, notifier: &Notifier, crew_name: &str) -> Result<String> {
    let _sequence = notifier.sequence(crew_name).await;
    let winner = crews.draw_winner(crew_name).await?;
    notifier.broadcast_winner(crew_name, &winner).await;
    Ok(winner)
}

/// Add a destination to the crew and send the resulting list to its room.
pub async fn propose_destination(
    crews: &CrewRepository,
    notifier: &Notifier,
    spec: &DestinationSpec,
) -> Result<Vec<String>> {
    spec.validate()?;
    let _sequence = notifier.sequence(&spec.lunch_crew_name).await;
    let options = crews
        .add_destination(&spec.lunch_crew_name, &spec.name)
        .await?;
    notifier
        .broadcast_destinations(&spec.lunch_crew_name, &options)
        .await;
    Ok(options)
}

/// Handle one text frame from a client. Failures are reported back to that
/// client only, as an `error` event.
pub async fn dispatch(
    crews: &CrewRepository,
    notifier: &Notifier,
    connection: &Connection,
    text: &str,
) {
    let id = connection.id();
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(err) => {
            warn!("ws{id} sent an unreadable event: {err}");
            connection.send(ServerEvent::error(None, format!("Failed to read event: {err}")));
            return;
        }
    };
    info!("ws{id} {} {}", event.name(), event.crew_name());

    if let Err(err) = handle(crews, notifier, connection, &event).await {
        warn!("ws{id} {} failed: {err}", event.name());
        connection.send(ServerEvent::error(Some(event.name()), err.to_string()));
    }
}

async fn handle(
    crews: &CrewRepository,
    notifier: &Notifier,
    connection: &Connection,
    event: &ClientEvent,
) -> Result<()> {
    event.validate()?;
    match event {
        ClientEvent::JoinRoom(crew_name) => join(crews, notifier, connection, crew_name).await,
        ClientEvent::PullLever(crew_name) => {
            let winner = pull_lever(crews, notifier, crew_name).await?;
            debug!("ws{} pulled the lever for {crew_name}: {winner}", connection.id());
            Ok(())
        }
        ClientEvent::AddDestination(spec) => {
            propose_destination(crews, notifier, spec).await?;
            Ok(())
        }
    }
}
