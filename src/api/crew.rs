use rocket::{serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::lunch_crew::{LunchCrewDescription, LunchCrewSpec},
    db::lunch_crew::NewLunchCrew,
    repository::CrewRepository,
};

pub fn routes() -> Vec<Route> {
    routes![
        index,
        lunch_crews,
        lunch_crew,
        destinations,
        current_destination_winner,
        create_lunch_crew,
    ]
}

#[get("/")]
fn index() -> &'static str {
    "lunchlotto"
}

#[get("/lunchCrew")]
async fn lunch_crews(crews: CrewRepository) -> Result<Json<Vec<LunchCrewDescription>>> {
    let descriptions = crews
        .list_crews()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Json(descriptions))
}

#[get("/lunchCrew/<name>")]
async fn lunch_crew(name: &str, crews: CrewRepository) -> Result<Json<LunchCrewDescription>> {
    let crew = crews
        .get_crew(name)
        .await?
        .ok_or_else(|| Error::not_found(format!("Lunch crew '{name}'")))?;
    Ok(Json(crew.into()))
}

#[get("/lunchCrew/<name>/destinations")]
async fn destinations(name: &str, crews: CrewRepository) -> Result<Json<Vec<String>>> {
    Ok(Json(crews.get_destinations(name).await?))
}

/// The crew's winner, drawing one first if there isn't one yet.
#[get("/lunchCrew/<name>/currentDestinationWinner")]
async fn current_destination_winner(name: &str, crews: CrewRepository) -> Result<Json<String>> {
    Ok(Json(crews.get_winner(name).await?))
}

#[post("/lunchCrew", data = "<spec>", format = "json")]
async fn create_lunch_crew(
    spec: Json<LunchCrewSpec>,
    crews: CrewRepository,
) -> Result<Json<LunchCrewDescription>> {
    let crew: NewLunchCrew = spec.into_inner().try_into()?;
    let created = crews.create_crew(crew).await?;
    Ok(Json(created.into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;

    async fn create(client: &Client, spec: &LunchCrewSpec) -> Status {
        client
            .post(uri!(create_lunch_crew))
            .header(ContentType::JSON)
            .body(serde_json::to_string(spec).unwrap())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn index_names_the_service(client: Client) {
        let response = client.get(uri!(index)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(response.into_string().await.unwrap(), "lunchlotto");
    }

    #[backend_test]
    async fn create_then_get_crew(client: Client) {
        let response = client
            .post(uri!(create_lunch_crew))
            .header(ContentType::JSON)
            .body(r#"{"name": "Lunch"}"#)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let created = response
            .into_json::<LunchCrewDescription>()
            .await
            .unwrap();
        assert_eq!(created.name, "Lunch");
        assert!(created.destination_options.is_empty());
        assert_eq!(created.current_winning_destination, None);

        let response = client.get(uri!(lunch_crew("Lunch"))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let fetched = response
            .into_json::<LunchCrewDescription>()
            .await
            .unwrap();
        assert_eq!(fetched, created);
    }

    #[backend_test]
    async fn create_crew_with_empty_name(client: Client, crews: CrewRepository) {
        let response = client
            .post(uri!(create_lunch_crew))
            .header(ContentType::JSON)
            .body(r#"{"name": ""}"#)
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(
            response.into_string().await.unwrap(),
            r#"Failed to validate {"name":""}."#
        );

        // Missing entirely is treated the same way.
        let response = client
            .post(uri!(create_lunch_crew))
            .header(ContentType::JSON)
            .body("{}")
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        assert!(crews.list_crews().await.unwrap().is_empty());
    }

    #[backend_test]
    async fn create_duplicate_crew(client: Client) {
        assert_eq!(Status::Ok, create(&client, &LunchCrewSpec::example()).await);
        assert_eq!(
            Status::BadRequest,
            create(&client, &LunchCrewSpec::example()).await
        );
    }

    #[backend_test]
    async fn list_crews(client: Client) {
        let response = client.get(uri!(lunch_crews)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let crews = response
            .into_json::<Vec<LunchCrewDescription>>()
            .await
            .unwrap();
        assert!(crews.is_empty());

        for name in ["Lunch", "Brunch"] {
            let spec = LunchCrewSpec { name: name.into() };
            assert_eq!(Status::Ok, create(&client, &spec).await);
        }

        let response = client.get(uri!(lunch_crews)).dispatch().await;
        let mut names = response
            .into_json::<Vec<LunchCrewDescription>>()
            .await
            .unwrap()
            .into_iter()
            .map(|crew| crew.name)
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["Brunch", "Lunch"]);
    }

    #[backend_test]
    async fn missing_crew_is_not_found(client: Client) {
        let response = client.get(uri!(lunch_crew("Nobody"))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get(uri!(destinations("Nobody"))).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .get(uri!(current_destination_winner("Nobody")))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test]
    async fn winner_of_empty_crew_is_a_conflict(client: Client) {
        assert_eq!(Status::Ok, create(&client, &LunchCrewSpec::example()).await);
        let response = client
            .get(uri!(current_destination_winner("Lunch")))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test]
    async fn destinations_and_winner(client: Client, crews: CrewRepository) {
        assert_eq!(Status::Ok, create(&client, &LunchCrewSpec::example()).await);
        crews.add_destination("Lunch", "Tacos").await.unwrap();
        crews.add_destination("Lunch", "Pizza").await.unwrap();

        let response = client.get(uri!(destinations("Lunch"))).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let options = response.into_json::<Vec<String>>().await.unwrap();
        assert_eq!(options, vec!["Tacos", "Pizza"]);

        let response = client
            .get(uri!(current_destination_winner("Lunch")))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let winner = response.into_json::<String>().await.unwrap();
        assert!(options.contains(&winner));

        // Asking again doesn't redraw.
        for _ in 0..5 {
            let response = client
                .get(uri!(current_destination_winner("Lunch")))
                .dispatch()
                .await;
            assert_eq!(response.into_json::<String>().await.unwrap(), winner);
        }
    }

    #[backend_test]
    async fn names_with_spaces_round_trip(client: Client) {
        let spec = LunchCrewSpec {
            name: "Second Breakfast".into(),
        };
        assert_eq!(Status::Ok, create(&client, &spec).await);

        let response = client
            .get(uri!(lunch_crew("Second Breakfast")))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let crew = response
            .into_json::<LunchCrewDescription>()
            .await
            .unwrap();
        assert_eq!(crew.name, "Second Breakfast");
    }
}
