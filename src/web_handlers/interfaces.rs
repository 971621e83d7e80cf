use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpRequest, HttpResponse};
use log::{debug, error, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::generator::GenerateError;
use crate::models::{AppState, ConfigBuilder, ConfigError};
use crate::utils::url::rewrite_provider_urls;

/// Response header listing upstreams left out of the output
pub const FAILED_UPSTREAMS_HEADER: &str = "X-Failed-Upstreams";

#[derive(Error, Debug)]
pub enum SubError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation error: {0}")]
    Generate(GenerateError),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_yaml::Error),
}

impl From<GenerateError> for SubError {
    fn from(e: GenerateError) -> Self {
        match e {
            GenerateError::Config(e) => SubError::Config(e),
            other => SubError::Generate(other),
        }
    }
}

/// Rendered subscription body and the keys of failed upstreams
#[derive(Debug)]
pub struct RenderedSubscription {
    pub body: String,
    pub failed_upstreams: Vec<String>,
}

/// Map a query string to a request, run the generator and encode the result
pub async fn render_subscription(
    app_state: &AppState,
    query: &str,
) -> Result<RenderedSubscription, SubError> {
    let config = ConfigBuilder::from_query(query).build()?;
    let mut generation = app_state.generator.generate(&config).await?;

    if let Some(public_url) = &app_state.settings.public_url {
        let count = rewrite_provider_urls(&mut generation.document, public_url);
        debug!("Rewrote {} rule-provider url(s)", count);
    }

    Ok(RenderedSubscription {
        body: generation.to_yaml()?,
        failed_upstreams: generation
            .failed_keys()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

/// Handler for subscription generation
pub async fn sub_handler(req: HttpRequest, app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    match render_subscription(&app_state, req.query_string()).await {
        Ok(rendered) => {
            let mut resp = HttpResponse::Ok();
            resp.content_type("text/yaml; charset=utf-8");
            if !rendered.failed_upstreams.is_empty() {
                resp.append_header((
                    FAILED_UPSTREAMS_HEADER,
                    rendered.failed_upstreams.join(","),
                ));
            }
            resp.body(rendered.body)
        }
        Err(SubError::Config(e)) => {
            warn!("Rejected request: {}", e);
            HttpResponse::BadRequest().body(format!("Configuration error: {}", e))
        }
        Err(e) => {
            error!("Subscription error: {}", e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

/// Query parameters for the cache endpoint
#[derive(Deserialize, Debug)]
pub struct CacheQuery {
    /// URL to retrieve
    pub url: String,
    /// Time-to-live in seconds; defaults to the server's cache_ttl
    pub ttl: Option<u64>,
}

/// Handler serving any URL through the retrieval cache
pub async fn cache_handler(
    query: web::Query<CacheQuery>,
    app_state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    let generator = &app_state.generator;
    let ttl = query
        .ttl
        .map(Duration::from_secs)
        .unwrap_or_else(|| generator.cache_ttl());

    match generator.cache().retrieve(&query.url, ttl).await {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(body),
        Err(e) => {
            warn!("Cache retrieval of {} failed: {}", query.url, e);
            HttpResponse::BadGateway().body(e.to_string())
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/sub", web::get().to(sub_handler))
        .route("/cache", web::get().to(cache_handler));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    use crate::settings::Settings;

    fn state() -> Arc<AppState> {
        let template = serde_yaml::from_str("mode: rule").unwrap();
        let settings = Settings {
            cache_dir: std::env::temp_dir().join("submerge-handler-tests"),
            ..Settings::default()
        };
        Arc::new(AppState::with_template(settings, template).unwrap())
    }

    #[actix_web::test]
    async fn test_sub_rejects_missing_upstreams() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(config),
        )
        .await;
        let req = test::TestRequest::get().uri("/sub?mode=proxy").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_sub_rejects_redir_without_interface() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(config),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/sub?mode=redir&upstream.a=http%3A%2F%2F127.0.0.1%3A9%2Fsub")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_cache_requires_url() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(config),
        )
        .await;
        let req = test::TestRequest::get().uri("/cache").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
