use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/objects", object_routes(config))
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::logout))
}

fn object_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let manage = OpenApiRouter::new()
        .routes(routes!(handlers::objects::create_upload_params))
        .routes(routes!(handlers::objects::delete_object))
        .routes(routes!(handlers::objects::resolve_references))
        .routes(routes!(handlers::objects::purge_references));

    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::objects::upload_object))
        .routes(routes!(handlers::objects::direct_upload))
        .layer(handlers::objects::upload_body_limit(
            config.storage.max_upload_bytes,
        ));

    manage.merge(upload)
}
