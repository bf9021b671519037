use axum::{
    middleware,
    routing::{delete, get, patch},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::middleware::authenticate;

use super::{
    handlers::{
        create_organization_handler, delete_organization_handler, delete_profile_handler,
        ensure_profile_handler, get_profile_handler, health_handler, list_members_handler,
        list_organizations_handler, remove_member_handler, rename_organization_handler,
        set_member_role_handler, update_profile_handler,
    },
    AppState,
};

pub fn build_router(state: AppState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.clone(), authenticate);

    let secured = Router::new()
        .route(
            "/profile",
            get(get_profile_handler)
                .post(ensure_profile_handler)
                .patch(update_profile_handler)
                .delete(delete_profile_handler),
        )
        .route(
            "/organization",
            get(list_organizations_handler).post(create_organization_handler),
        )
        .route(
            "/organization/{id}",
            patch(rename_organization_handler).delete(delete_organization_handler),
        )
        .route(
            "/organization/{id}/members",
            get(list_members_handler).put(set_member_role_handler),
        )
        .route("/organization/{id}/members/{identifier}", delete(remove_member_handler))
        .route_layer(auth_layer);

    Router::new()
        .route("/health", get(health_handler))
        .merge(secured)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
