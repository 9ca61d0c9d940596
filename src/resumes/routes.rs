use super::handlers;
use axum::{
    routing::{delete, get, post},
    Router,
};

/// Creates the resumes router with resume, tag and file routes
pub fn resumes_routes() -> Router {
    Router::new()
        .route("/api/resumes", post(handlers::upload_resume))
        .route("/api/resumes/search", get(handlers::search_resumes))
        .route("/api/resumes/filters", get(handlers::get_filters))
        .route("/api/resumes/all/delete", delete(handlers::delete_all_resumes))
        .route(
            "/api/resumes/:id",
            get(handlers::get_resume)
                .put(handlers::update_resume)
                .delete(handlers::delete_resume),
        )
        .route("/api/resumes/:id/download", get(handlers::download_resume))
        // Tag vocabularies
        .route(
            "/api/companies",
            get(handlers::list_companies).post(handlers::create_company),
        )
        .route(
            "/api/keywords",
            get(handlers::list_keywords).post(handlers::create_keyword),
        )
        .route("/api/files/resumes/:filename", get(handlers::serve_resume_file))
}
