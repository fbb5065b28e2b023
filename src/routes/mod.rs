use axum::Router;

use crate::state::AppState;

pub mod availability;
pub mod bookings;
pub mod doc;
pub mod health;
pub mod params;
pub mod shops;
pub mod wallet;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/shops", availability::router().merge(shops::router()))
        .nest("/bookings", bookings::router())
        .nest("/wallet", wallet::router())
}
