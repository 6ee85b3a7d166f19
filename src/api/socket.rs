use log::{error, info, warn};
use rocket::{
    futures::{SinkExt, StreamExt},
    serde::json::serde_json,
    tokio, Route, State,
};
use rocket_ws::{result::Error as WsError, Channel, Message, WebSocket};

use crate::model::{api::event::ServerEvent, repository::CrewRepository};
use crate::realtime::{self, Notifier};

pub fn routes() -> Vec<Route> {
    routes![socket]
}

/// The realtime channel. Each text frame is one event; see
/// [`crate::model::api::event`] for the message format.
#[get("/socket")]
fn socket(ws: WebSocket, crews: CrewRepository, notifier: &State<Notifier>) -> Channel<'static> {
    let notifier = notifier.inner().clone();
    ws.channel(move |stream| {
        Box::pin(async move {
            let (connection, mut outbox) = notifier.connect();
            let id = connection.id();
            info!("->ws{id} connected");

            let (mut sink, mut source) = stream.split::<Message>();

            // Drain the connection's outbox onto the socket until every sender is gone.
            let writer = tokio::spawn(async move {
                while let Some(event) = outbox.recv().await {
                    match serde_json::to_string(&event) {
                        Ok(text) => sink.send(Message::Text(text)).await?,
                        Err(e) => error!("ws{id} failed to encode {event:?}: {e}"),
                    }
                }
                Ok::<_, WsError>(())
            });

            let received = async {
                while let Some(message) = source.next().await {
                    match message? {
                        Message::Text(text) => {
                            realtime::dispatch(&crews, &notifier, &connection, &text).await
                        }
                        Message::Binary(_) => {
                            warn!("ws{id} sent a binary frame");
                            connection.send(ServerEvent::error(
                                None,
                                "Events must be sent as text frames",
                            ));
                        }
                        Message::Close(_) => break,
                        // Pings are answered by the protocol layer.
                        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                    }
                }
                Ok::<_, WsError>(())
            }
            .await;

            // Dropping the last sender ends the writer.
            notifier.disconnect(id).await;
            drop(connection);
            let written = match writer.await {
                Ok(written) => written,
                Err(e) => {
                    error!("ws{id} writer task failed: {e}");
                    Ok(())
                }
            };

            match received.and(written) {
                Ok(()) => {
                    info!("<-ws{id} disconnected");
                    Ok(())
                }
                Err(e) => {
                    warn!("<-ws{id} dropped: {e}");
                    Err(e)
                }
            }
        })
    })
}
