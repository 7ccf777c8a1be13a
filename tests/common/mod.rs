//! Common test utilities for blog-archive end-to-end tests

use blog_archive::Config;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Blog identifier served by the mock API
pub const BLOG: &str = "example.tumblr.com";

/// Config pointing the API at `server` and all output into `dir`
pub fn config_for(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.api.base_url = format!("{}/v2/", server.uri());
    config.api.api_key = Some("test-key".to_string());
    config.api.request_timeout = Duration::from_secs(5);
    config.assets.output_dir = dir.join("posts");
    config.assets.workers = 3;
    config.assets.download_timeout = Duration::from_secs(5);
    config.persistence.database_path = dir.join("scrape.sqlite");
    config
}

/// Wrap a payload in the API's success envelope
pub fn envelope(response: Value) -> Value {
    json!({"meta": {"status": 200, "msg": "OK"}, "response": response})
}

/// Serve blog info for [`BLOG`]
pub async fn mount_info(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/blog/{BLOG}/info")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "blog": {"title": "Example", "url": "https://example.tumblr.com/", "updated": 1700000000}
        }))))
        .mount(server)
        .await;
}

/// Serve `posts` as the page at `offset`
pub async fn mount_page(server: &MockServer, offset: u32, posts: Vec<Value>) {
    let total = posts.len();
    Mock::given(method("GET"))
        .and(path(format!("/v2/blog/{BLOG}/posts")))
        .and(query_param("offset", offset.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!({"posts": posts, "total_posts": total}))),
        )
        .mount(server)
        .await;
}

/// Serve an image body at `image_path` on the asset host
pub async fn mount_image(server: &MockServer, image_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(image_path.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// A photo post whose single photo offers two sizes on `asset_host`
pub fn photo_post(id: i64, asset_host: &str) -> Value {
    json!({
        "id": id,
        "type": "photo",
        "timestamp": 1400000000 + id,
        "date": "2014-05-13 16:53:20 GMT",
        "tags": ["photo"],
        "state": "published",
        "caption": "<p>caption</p>",
        "photos": [{
            "caption": "",
            "alt_sizes": [
                {"width": 100, "height": 100, "url": format!("{asset_host}/media/photo_{id}_100.jpg")},
                {"width": 500, "height": 400, "url": format!("{asset_host}/media/photo_{id}_500.jpg")}
            ]
        }]
    })
}

/// A text post with no media
pub fn text_post(id: i64) -> Value {
    json!({
        "id": id,
        "type": "text",
        "timestamp": 1400000000 + id,
        "date": "2014-05-13 16:53:20 GMT",
        "tags": [],
        "state": "published",
        "title": format!("Post {id}"),
        "body": "<p>words</p>"
    })
}
