use rocket::Route;

mod crew;
mod destination;
mod socket;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(crew::routes());
    routes.extend(destination::routes());
    routes.extend(socket::routes());
    routes
}
