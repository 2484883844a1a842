//! Front page handler

use axum::{extract::State, response::Html};

use crate::AppState;

const FALLBACK_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>WAKEE.reloaded</title></head>
<body>
<h1>WAKEE.reloaded</h1>
<p>POST an image to <code>/predict</code> for a personalized recommendation,
or to <code>/backup</code> for a short fixed message.</p>
</body>
</html>
"#;

/// Serve `index.html` from the templates directory, or a built-in page
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let path = state.config.templates_dir.join("index.html");

    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page),
        Err(e) => {
            tracing::debug!("Cannot read {}: {}, serving fallback page", path.display(), e);
            Html(FALLBACK_PAGE.to_string())
        }
    }
}
