//! HTTP route handlers outside the auth flows. Everything here is mounted
//! under `/v1`.

pub mod health;
pub mod params;
pub mod users;

use rocket::{Route, routes};

pub fn routes() -> Vec<Route> {
    routes![
        health::health_check,
        users::list_users,
        users::create_user,
        users::get_user,
        users::update_user,
        users::delete_user,
    ]
}
