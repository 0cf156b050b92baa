use std::time::Duration;

use async_trait::async_trait;
use scribe_core::{Result, ScribeError, Site};
use scribe_pipeline::{PostDraft, PublishedPost, Publisher, RemoteCategory};
use serde::Deserialize;
use tracing::{debug, warn};

/// Publisher for sites exposing the WordPress REST API (`/wp-json/wp/v2`),
/// authenticated with an application password.
pub struct WordPressPublisher {
    client: reqwest::Client,
}

impl WordPressPublisher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ScribeError::Config(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    fn get(&self, site: &Site, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(endpoint(site, path))
            .basic_auth(&site.username, Some(&site.app_password))
    }
}

fn endpoint(site: &Site, path: &str) -> String {
    format!("{}/wp-json/wp/v2/{}", site.url.trim_end_matches('/'), path)
}

fn post_body(post: &PostDraft) -> serde_json::Value {
    serde_json::json!({
        "title": post.title,
        "content": post.content,
        "status": "publish",
        "categories": [post.category_remote_id],
    })
}

async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    warn!(status, body = %text, "{what} rejected by site");
    Err(ScribeError::Publish(format!("{what} failed ({status}): {text}")))
}

fn transport(e: reqwest::Error) -> ScribeError {
    ScribeError::Publish(format!("request failed: {e}"))
}

#[async_trait]
impl Publisher for WordPressPublisher {
    async fn publish(&self, site: &Site, post: &PostDraft) -> Result<PublishedPost> {
        debug!(site = %site.name, title = %post.title, "publishing post");
        let resp = self
            .client
            .post(endpoint(site, "posts"))
            .basic_auth(&site.username, Some(&site.app_password))
            .json(&post_body(post))
            .send()
            .await
            .map_err(transport)?;
        let created: CreatedPost = check_status(resp, "publish")
            .await?
            .json()
            .await
            .map_err(|e| ScribeError::Publish(format!("unreadable post response: {e}")))?;
        Ok(PublishedPost {
            post_id: created.id.to_string(),
            url: created.link,
        })
    }

    async fn health_check(&self, site: &Site) -> Result<()> {
        let resp = self.get(site, "users/me").send().await.map_err(transport)?;
        check_status(resp, "health check").await?;
        Ok(())
    }

    async fn list_categories(&self, site: &Site) -> Result<Vec<RemoteCategory>> {
        let resp = self
            .get(site, "categories?per_page=100")
            .send()
            .await
            .map_err(transport)?;
        check_status(resp, "category listing")
            .await?
            .json()
            .await
            .map_err(|e| ScribeError::Publish(format!("unreadable category list: {e}")))
    }
}

#[derive(Deserialize)]
struct CreatedPost {
    id: i64,
    link: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let mut site = Site::new("Blog", "https://blog.example");
        assert_eq!(endpoint(&site, "posts"), "https://blog.example/wp-json/wp/v2/posts");
        site.url = "https://blog.example/".into();
        assert_eq!(endpoint(&site, "posts"), "https://blog.example/wp-json/wp/v2/posts");
    }

    #[test]
    fn post_body_publishes_into_category() {
        let body = post_body(&PostDraft {
            title: "Hello".into(),
            content: "<p>World</p>".into(),
            category_remote_id: 12,
        });
        assert_eq!(body["status"], "publish");
        assert_eq!(body["categories"][0], 12);
        assert_eq!(body["title"], "Hello");
    }

    #[test]
    fn category_list_parses() {
        let cats: Vec<RemoteCategory> =
            serde_json::from_str(r#"[{"id":1,"name":"News","slug":"news","count":4}]"#).unwrap();
        assert_eq!(cats, vec![RemoteCategory { id: 1, name: "News".into() }]);
    }
}
