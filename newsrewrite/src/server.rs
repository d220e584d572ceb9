use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rocket::data::{Limits, ToByteUnit};
use rocket::figment::Figment;
use rocket::form::Form;
use rocket::fs::{NamedFile, TempFile};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, post, routes, Build, FromForm, Request, Responder, Rocket, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use common::{Config, Secrets};

use crate::auth::{Authenticated, SessionStore, SESSION_COOKIE};
use crate::cms::{Category, CategoryMap, CategorySource, PublishOutcome, PublishRequest, Publisher, StagedUpload, WordPressClient};
use crate::error::AppError;
use crate::llm::azure::{AzureStyleProvider, GithubModelsClient, GITHUB_MODELS_ENDPOINT};
use crate::llm::openrouter::{OpenRouterProvider, OPENROUTER_API_URL};
use crate::rewrite::{ProviderKey, RewriteOutcome, Rewriter};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub rewriter: Rewriter,
    pub publisher: Publisher,
    pub wordpress: WordPressClient,
    pub sessions: Arc<SessionStore>,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    providers: Vec<&'static str>,
}

#[derive(Deserialize)]
struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
struct RewriteBody {
    news: String,
    api: String,
}

#[derive(Deserialize)]
struct PublishBody {
    news: String,
    featured_image_id: Option<i64>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    post_status: Option<String>,
}

#[derive(FromForm)]
struct ImageUpload<'r> {
    file: TempFile<'r>,
}

#[derive(Responder)]
enum Page {
    File(NamedFile),
    Redirect(Redirect),
}

/// Locate a static page: configured dir first, then `templates/`, then the working dir.
fn find_page(static_dir: &Path, name: &str) -> Option<PathBuf> {
    [static_dir.join(name), Path::new("templates").join(name), PathBuf::from(name)]
        .into_iter()
        .find(|p| p.is_file())
}

async fn serve_page(static_dir: &Path, name: &str) -> Result<NamedFile, AppError> {
    let path = find_page(static_dir, name).ok_or_else(|| {
        tracing::error!("{} not found (static dir {})", name, static_dir.display());
        AppError::upstream("Frontend application file not found.")
    })?;
    NamedFile::open(&path).await.map_err(|e| {
        tracing::error!("failed to open {}: {}", path.display(), e);
        AppError::upstream("An unexpected error occurred.")
    })
}

/// Home page; anonymous visitors are sent to the login page.
#[get("/")]
async fn home(auth: Option<Authenticated>, state: &State<AppState>) -> Result<Page, AppError> {
    if auth.is_none() {
        return Ok(Page::Redirect(Redirect::to("/login")));
    }
    serve_page(&state.static_dir, "index.html").await.map(Page::File)
}

#[get("/login")]
async fn login_page(auth: Option<Authenticated>, state: &State<AppState>) -> Result<Page, AppError> {
    if auth.is_some() {
        return Ok(Page::Redirect(Redirect::to("/")));
    }
    serve_page(&state.static_dir, "login.html").await.map(Page::File)
}

#[post("/login", data = "<body>")]
async fn login(
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
    body: Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    match state.sessions.login(&body.password).await? {
        Some(token) => {
            cookies.add_private(
                Cookie::build((SESSION_COOKIE, token))
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .path("/"),
            );
            Ok(Json(json!({ "message": "Login successful" })))
        }
        None => Err(AppError::Unauthorized),
    }
}

/// Drops the caller's cookie; only an authenticated caller rotates the shared token.
#[post("/logout")]
async fn logout(
    auth: Option<Authenticated>,
    state: &State<AppState>,
    cookies: &CookieJar<'_>,
) -> Result<Json<Value>, AppError> {
    cookies.remove_private(SESSION_COOKIE);
    if auth.is_some() {
        state.sessions.logout().await?;
    } else {
        tracing::debug!("logout without a valid session; token left unchanged");
    }
    Ok(Json(json!({ "message": "Logged out" })))
}

#[post("/rewrite", data = "<body>")]
async fn rewrite(
    _auth: Authenticated,
    state: &State<AppState>,
    body: Json<RewriteBody>,
) -> Result<Json<Value>, AppError> {
    if body.news.trim().is_empty() {
        tracing::warn!("Rewrite request received with empty news content.");
        return Err(AppError::invalid("News content cannot be empty"));
    }

    tracing::info!("Received rewrite request for API: {}", body.api);
    let outcome = state.rewriter.rewrite(&body.news, &body.api).await?;

    let name = match body.api.parse::<ProviderKey>() {
        Ok(key) => key.display_name(),
        Err(_) => body.api.as_str(),
    };

    match outcome {
        RewriteOutcome::Success(text) => {
            tracing::info!("Successfully rewrote news using {}.", name);
            Ok(Json(json!({ "rewritten_news": text })))
        }
        RewriteOutcome::RateLimited => {
            tracing::warn!("Rate limit reached for {} during rewrite.", name);
            Err(AppError::RateLimited(format!(
                "Rate limit reached for {}. Please try a different API option from the dropdown.",
                name
            )))
        }
        RewriteOutcome::Failure => {
            tracing::error!("No result returned from {} for rewrite request.", name);
            Err(AppError::upstream(format!(
                "Unable to process your request with {}. Please try another API option.",
                name
            )))
        }
    }
}

#[post("/publish", data = "<body>")]
async fn publish(
    _auth: Authenticated,
    state: &State<AppState>,
    body: Json<PublishBody>,
) -> Result<Json<Value>, AppError> {
    let body = body.into_inner();
    if body.news.trim().is_empty() {
        tracing::warn!("Publish request received with empty news content.");
        return Err(AppError::invalid("News content cannot be empty"));
    }

    let request = PublishRequest {
        article_text: body.news,
        featured_image_id: body.featured_image_id,
        category_names: body.categories,
        tag_names: body.tags,
        post_status: body.post_status,
    };

    match state.publisher.publish(request).await? {
        PublishOutcome::Success { permalink, post_id } => Ok(Json(json!({
            "message": "News published successfully",
            "permalink": permalink,
            "post_id": post_id,
        }))),
        PublishOutcome::Error(detail) => Err(AppError::upstream(format!("Publishing failed: {}", detail))),
    }
}

#[post("/upload-image", data = "<form>")]
async fn upload_image(
    _auth: Authenticated,
    state: &State<AppState>,
    form: Form<ImageUpload<'_>>,
) -> Result<Json<Value>, AppError> {
    let mut upload = form.into_inner();

    let content_type = upload
        .file
        .content_type()
        .map(|ct| ct.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let extension = upload
        .file
        .content_type()
        .and_then(|ct| ct.extension())
        .map(|e| e.to_string());
    let file_name = match (upload.file.name(), extension) {
        (Some(name), Some(ext)) => format!("{}.{}", name, ext),
        (Some(name), None) => name.to_string(),
        (None, Some(ext)) => format!("upload.{}", ext),
        (None, None) => "upload".to_string(),
    };

    let staged = StagedUpload::reserve(&state.upload_dir, &file_name, &content_type)
        .await
        .map_err(|e| {
            tracing::error!("failed to stage upload in {}: {}", state.upload_dir.display(), e);
            AppError::upstream(format!("An unexpected error occurred: {}", e))
        })?;
    upload.file.copy_to(staged.path()).await.map_err(|e| {
        tracing::error!("failed to write staged upload {}: {}", staged.path().display(), e);
        AppError::upstream(format!("An unexpected error occurred: {}", e))
    })?;

    let uploaded = state.wordpress.upload_media(&staged).await?;
    Ok(Json(json!({ "message": "Image uploaded successfully", "id": uploaded.id })))
}

#[get("/wp-categories")]
async fn wp_categories(_auth: Authenticated, state: &State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    state.wordpress.list_categories().await.map(Json)
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning simple JSON with uptime and the accepted provider keys.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        providers: ProviderKey::ALL.iter().map(|k| k.as_str()).collect(),
    })
}

#[catch(default)]
fn json_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<Value>) {
    let detail = match status.code {
        401 => "Not authenticated",
        413 => "Uploaded file is too large",
        _ => status.reason().unwrap_or("Request failed"),
    };
    (status, Json(json!({ "detail": detail })))
}

/// Build the rewrite dispatcher from configuration and provider credentials.
pub fn create_rewriter(config: &Config, openrouter_key: Option<String>, github_token: Option<String>) -> Rewriter {
    let or_cfg = config.llm.openrouter.clone().unwrap_or_default();
    let az_cfg = config.llm.azure.clone().unwrap_or_default();

    let openrouter = OpenRouterProvider::new(
        or_cfg.api_url.unwrap_or_else(|| OPENROUTER_API_URL.to_string()),
        openrouter_key,
    )
    .with_timeout(or_cfg.timeout_seconds.unwrap_or(60));

    let github = GithubModelsClient::new(
        az_cfg.endpoint.unwrap_or_else(|| GITHUB_MODELS_ENDPOINT.to_string()),
        github_token,
    )
    .with_timeout(az_cfg.timeout_seconds.unwrap_or(60));
    let azure = AzureStyleProvider::new(github)
        .with_sampling(az_cfg.temperature.unwrap_or(0.7), az_cfg.top_p.unwrap_or(1.0));

    Rewriter::new(Arc::new(azure), Arc::new(openrouter))
}

/// Build the CMS client and publisher from configuration and secrets.
pub fn create_publisher(config: &Config, secrets: &Secrets) -> Result<(WordPressClient, Publisher)> {
    let wp_cfg = &config.wordpress;
    let wordpress = WordPressClient::new(
        &secrets.wordpress_site_url,
        &secrets.wordpress_api_token,
        &secrets.wordpress_app_password,
        wp_cfg.timeout_seconds.unwrap_or(30),
    )?;

    let categories = if wp_cfg.categories.is_empty() {
        CategorySource::Live
    } else {
        CategorySource::Static(CategoryMap::new(wp_cfg.categories.clone()))
    };
    let mut publisher = Publisher::new(wordpress.clone(), categories);
    if let Some(status) = &wp_cfg.default_post_status {
        publisher = publisher.with_default_status(status);
    }
    Ok((wordpress, publisher))
}

/// Assemble the managed state: providers, CMS client and session store.
pub async fn build_state(config: &Config, secrets: &Secrets) -> Result<AppState> {
    if secrets.openrouter_api_key.is_none() {
        tracing::warn!("{} is not set. OpenRouter API calls will fail.", config.openrouter_key_env());
    }
    if secrets.github_token.is_none() {
        tracing::warn!("{} is not set. Azure API calls will fail.", config.azure_token_env());
    }

    let rewriter = create_rewriter(config, secrets.openrouter_api_key.clone(), secrets.github_token.clone());
    let (wordpress, publisher) = create_publisher(config, secrets)?;
    let sessions = SessionStore::open(&secrets.access_password_hash, &secrets.session_token_file)
        .await
        .context("failed to initialize session store")?;

    let static_dir = PathBuf::from(config.server.static_dir.as_deref().unwrap_or("templates"));
    let upload_dir = config
        .server
        .upload_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("newsrewrite-uploads"));

    Ok(AppState {
        started_at: Utc::now(),
        rewriter,
        publisher,
        wordpress,
        sessions: Arc::new(sessions),
        static_dir,
        upload_dir,
    })
}

/// Mount routes and catchers on top of the given figment.
pub fn build_rocket(state: AppState, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount(
            "/",
            routes![
                home,
                login_page,
                login,
                logout,
                rewrite,
                publish,
                upload_image,
                wp_categories,
                health,
                status,
            ],
        )
        .register("/", catchers![json_catcher])
}

/// Figment with address, port and upload limits taken from `[server]`.
pub fn server_figment(config: &Config) -> Figment {
    let server = &config.server;
    let max_upload_mb = server.max_upload_mb.unwrap_or(20);
    let limits = Limits::default()
        .limit("file", max_upload_mb.mebibytes())
        .limit("data-form", (max_upload_mb + 1).mebibytes());

    let mut fig = rocket::Config::figment().merge(("limits", limits));
    if let Some(bind) = &server.bind {
        fig = fig.merge(("address", bind.clone()));
    }
    if let Some(port) = server.port {
        fig = fig.merge(("port", port));
    }
    fig
}

/// Build and launch the Rocket server.
///
/// This function blocks until the Rocket server shuts down (it awaits `rocket.launch().await`)
/// and returns an error if Rocket fails to start.
pub async fn launch_rocket(config: &Config, state: AppState) -> Result<()> {
    let rocket = build_rocket(state, server_figment(config));

    tracing::info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_lookup_prefers_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        assert_eq!(find_page(dir.path(), "index.html"), Some(dir.path().join("index.html")));
        assert_eq!(find_page(dir.path(), "missing-page.html"), None);
    }

    #[test]
    fn figment_applies_server_section() {
        let mut config = Config::default();
        config.server.port = Some(5000);
        config.server.bind = Some("127.0.0.1".into());
        let cfg: rocket::Config = server_figment(&config).extract().unwrap();
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.address.to_string(), "127.0.0.1");
        assert_eq!(cfg.limits.get("file"), Some(20.mebibytes()));
    }
}
