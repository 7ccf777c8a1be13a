//! Post normalization.
//!
//! [`transform`] turns a [`RawPost`] into a [`NormalizedPost`]. Media it
//! references is handed to an [`AssetSink`] and the stored URLs are rewritten
//! to the local paths the sink returns.
//!
//! Inline media links are rewritten only in fields expected to carry HTML:
//!
//! | type   | rewritten fields              |
//! |--------|-------------------------------|
//! | text   | body                          |
//! | quote  | text, source                  |
//! | link   | excerpt, description          |
//! | answer | answer                        |
//! | video  | caption                       |
//! | audio  | caption                       |
//! | chat   | (none)                        |
//! | photo  | caption, each photo's caption |

use crate::assets::AssetSink;
use crate::types::{
    AnswerAux, AudioAux, Aux, ChatAux, LinkAux, NormalizedPost, PhotoAux, PhotoRecord, PhotoSize,
    PostType, QuoteAux, RawPhoto, RawPost, TextAux, VideoAux,
};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Image URLs served by the feed's media host
///
/// Character classes are ASCII-only, so a non-ASCII letter ends the match.
pub const MEDIA_URL_PATTERN: &str = r"(?-u)https://\d+\.media\.tumblr\.com/\w+/\w+\.\w{3}";

#[allow(clippy::expect_used)]
static MEDIA_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MEDIA_URL_PATTERN).expect("media URL pattern is valid"));

/// Normalize a raw post, queueing every media asset it references
///
/// Never fails: an unrecognized post type keeps its common fields and gets no
/// `aux` payload, and a recognized type whose fields cannot be decoded gets an
/// empty payload of the right shape.
pub fn transform(raw: RawPost, assets: &dyn AssetSink) -> NormalizedPost {
    let RawPost {
        id,
        post_type,
        timestamp,
        date,
        tags,
        source_url,
        source_title,
        state,
        fields,
    } = raw;

    let aux = match PostType::parse(&post_type) {
        Some(kind) => Some(build_aux(kind, id.get(), fields, assets)),
        None => {
            warn!(post = %id, post_type = %post_type, "Unrecognized post type; storing without aux");
            None
        }
    };

    NormalizedPost {
        id,
        post_type,
        timestamp,
        date,
        tags: tags.join(","),
        source_url,
        source_title,
        state,
        aux,
    }
}

fn build_aux(kind: PostType, id: i64, mut fields: Map<String, Value>, assets: &dyn AssetSink) -> Aux {
    match kind {
        PostType::Text => {
            let mut aux: TextAux = decode(id, kind, fields);
            aux.body = replace_media_urls(&aux.body, assets);
            Aux::Text(aux)
        }
        PostType::Quote => {
            let mut aux: QuoteAux = decode(id, kind, fields);
            aux.text = replace_media_urls(&aux.text, assets);
            aux.source = replace_media_urls(&aux.source, assets);
            Aux::Quote(aux)
        }
        PostType::Link => {
            let raw_photos = take_photos(id, &mut fields);
            let mut aux: LinkAux = decode(id, kind, fields);
            aux.photos = raw_photos
                .into_iter()
                .filter_map(|photo| match photo.original_size.as_ref() {
                    Some(original) => Some(localize_photo(&photo, original, assets)),
                    None => {
                        warn!(post = id, "Link photo has no original size; dropping it");
                        None
                    }
                })
                .collect();
            aux.excerpt = aux.excerpt.map(|text| replace_media_urls(&text, assets));
            aux.description = replace_media_urls(&aux.description, assets);
            Aux::Link(aux)
        }
        PostType::Answer => {
            let mut aux: AnswerAux = decode(id, kind, fields);
            aux.answer = replace_media_urls(&aux.answer, assets);
            Aux::Answer(aux)
        }
        PostType::Video => {
            let mut aux: VideoAux = decode(id, kind, fields);
            aux.caption = replace_media_urls(&aux.caption, assets);
            Aux::Video(aux)
        }
        PostType::Audio => {
            let mut aux: AudioAux = decode(id, kind, fields);
            aux.caption = replace_media_urls(&aux.caption, assets);
            Aux::Audio(aux)
        }
        PostType::Chat => Aux::Chat(decode::<ChatAux>(id, kind, fields)),
        PostType::Photo => {
            let raw_photos = take_photos(id, &mut fields);
            let mut aux: PhotoAux = decode(id, kind, fields);
            aux.photos = raw_photos
                .into_iter()
                .filter_map(|photo| {
                    let chosen = if photo.alt_sizes.is_empty() {
                        photo.original_size.as_ref()
                    } else {
                        select_largest_variant(&photo.alt_sizes)
                    };
                    match chosen {
                        Some(variant) => Some(localize_photo(&photo, variant, assets)),
                        None => {
                            warn!(post = id, "Photo offers no sizes; dropping it");
                            None
                        }
                    }
                })
                .collect();
            aux.caption = replace_media_urls(&aux.caption, assets);
            Aux::Photo(aux)
        }
    }
}

/// Decode a type-specific payload, falling back to an empty one
fn decode<T: DeserializeOwned + Default>(id: i64, kind: PostType, fields: Map<String, Value>) -> T {
    serde_json::from_value(Value::Object(fields)).unwrap_or_else(|e| {
        warn!(post = id, post_type = %kind, error = %e, "Malformed post fields; storing empty payload");
        T::default()
    })
}

/// Pull the raw photo list out of the fields so the rest can decode into an aux type
fn take_photos(id: i64, fields: &mut Map<String, Value>) -> Vec<RawPhoto> {
    match fields.remove("photos") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(post = id, error = %e, "Malformed photo list; ignoring photos");
            Vec::new()
        }),
    }
}

fn localize_photo(photo: &RawPhoto, variant: &PhotoSize, assets: &dyn AssetSink) -> PhotoRecord {
    PhotoRecord {
        caption: replace_media_urls(&photo.caption, assets),
        width: variant.width,
        height: variant.height,
        url: localize(&variant.url, assets),
    }
}

fn localize(url: &str, assets: &dyn AssetSink) -> String {
    assets
        .rewrite_and_enqueue(url)
        .unwrap_or_else(|| url.to_string())
}

/// Pick the variant with the largest `width + height`
///
/// Ties keep the variant seen first.
pub fn select_largest_variant(variants: &[PhotoSize]) -> Option<&PhotoSize> {
    variants.iter().fold(None, |best: Option<&PhotoSize>, candidate| match best {
        Some(current)
            if u64::from(current.width) + u64::from(current.height)
                >= u64::from(candidate.width) + u64::from(candidate.height) =>
        {
            Some(current)
        }
        _ => Some(candidate),
    })
}

/// Replace every media-host image URL in `text` with its local path
pub fn replace_media_urls(text: &str, assets: &dyn AssetSink) -> String {
    MEDIA_URL
        .replace_all(text, |caps: &Captures| {
            let url = &caps[0];
            let local = localize(url, assets);
            debug!(url = %url, local = %local, "Rewrote inline media URL");
            local
        })
        .into_owned()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::local_file_name;
    use serde_json::json;
    use std::sync::Mutex;

    /// Sink that records every URL and maps it the way the pool does
    #[derive(Default)]
    struct RecordingSink {
        urls: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    impl AssetSink for RecordingSink {
        fn rewrite_and_enqueue(&self, url: &str) -> Option<String> {
            let name = local_file_name(url)?;
            self.urls.lock().unwrap().push(url.to_string());
            Some(format!("images/{}", name))
        }
    }

    fn raw(value: serde_json::Value) -> RawPost {
        serde_json::from_value(value).unwrap()
    }

    fn size(width: u32, height: u32, url: &str) -> PhotoSize {
        PhotoSize {
            width,
            height,
            url: url.to_string(),
        }
    }

    const MEDIA_A: &str = "https://66.media.tumblr.com/abc123/tumblr_aaa_500.jpg";
    const MEDIA_B: &str = "https://65.media.tumblr.com/def456/tumblr_bbb_1280.png";

    #[test]
    fn test_largest_variant_uses_width_plus_height() {
        let variants = vec![
            size(100, 100, "small"),
            size(500, 500, "square"),
            size(50, 900, "tall"),
        ];
        let chosen = select_largest_variant(&variants).unwrap();
        assert_eq!(chosen.url, "square");
    }

    #[test]
    fn test_largest_variant_tie_keeps_first_seen() {
        let variants = vec![size(300, 200, "first"), size(200, 300, "second")];
        assert_eq!(select_largest_variant(&variants).unwrap().url, "first");
        assert!(select_largest_variant(&[]).is_none());
    }

    #[test]
    fn test_replace_media_urls_only_touches_media_host() {
        let sink = RecordingSink::default();
        let html = format!(
            r#"<img src="{MEDIA_A}"> <a href="https://example.com/x.jpg">x</a> <img src="{MEDIA_B}">"#
        );

        let rewritten = replace_media_urls(&html, &sink);

        assert_eq!(
            rewritten,
            r#"<img src="images/tumblr_aaa_500.jpg"> <a href="https://example.com/x.jpg">x</a> <img src="images/tumblr_bbb_1280.png">"#
        );
        assert_eq!(sink.urls(), vec![MEDIA_A.to_string(), MEDIA_B.to_string()]);
    }

    #[test]
    fn test_common_fields_are_normalized() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 1,
                "type": "text",
                "timestamp": 1400000000,
                "date": "2014-05-13 16:53:20 GMT",
                "tags": ["cats", "two words", "dogs"],
                "state": "published",
                "title": "Hi",
                "body": "plain"
            })),
            &sink,
        );

        assert_eq!(post.tags, "cats,two words,dogs");
        assert_eq!(post.source_url, None);
        assert_eq!(post.source_title, None);
        assert_eq!(post.timestamp, 1400000000);
        assert_eq!(post.state, "published");
    }

    #[test]
    fn test_text_post_rewrites_body_not_title() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 2,
                "type": "text",
                "title": MEDIA_A,
                "body": format!("<p><img src=\"{MEDIA_B}\"></p>"),
                "source_url": "https://src.example.com",
                "source_title": "src"
            })),
            &sink,
        );

        let Some(Aux::Text(aux)) = post.aux else {
            panic!("expected text aux");
        };
        assert_eq!(aux.title.as_deref(), Some(MEDIA_A));
        assert_eq!(aux.body, "<p><img src=\"images/tumblr_bbb_1280.png\"></p>");
        assert_eq!(sink.urls(), vec![MEDIA_B.to_string()]);
        assert_eq!(post.source_url.as_deref(), Some("https://src.example.com"));
        assert_eq!(post.source_title.as_deref(), Some("src"));
    }

    #[test]
    fn test_photo_post_selects_and_localizes_largest_variant() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 3,
                "type": "photo",
                "caption": format!("<p>{MEDIA_B}</p>"),
                "photos": [{
                    "caption": "first",
                    "alt_sizes": [
                        {"width": 100, "height": 100, "url": "https://66.media.tumblr.com/x/tumblr_p_100.jpg"},
                        {"width": 500, "height": 500, "url": "https://66.media.tumblr.com/x/tumblr_p_500.jpg"},
                        {"width": 50, "height": 900, "url": "https://66.media.tumblr.com/x/tumblr_p_tall.jpg"}
                    ],
                    "original_size": {"width": 1280, "height": 1280, "url": "https://66.media.tumblr.com/x/tumblr_p_1280.jpg"}
                }]
            })),
            &sink,
        );

        let Some(Aux::Photo(aux)) = post.aux else {
            panic!("expected photo aux");
        };
        assert_eq!(
            aux.photos,
            vec![PhotoRecord {
                caption: "first".to_string(),
                width: 500,
                height: 500,
                url: "images/tumblr_p_500.jpg".to_string(),
            }]
        );
        assert_eq!(aux.caption, "<p>images/tumblr_bbb_1280.png</p>");
        assert_eq!(
            sink.urls(),
            vec![
                "https://66.media.tumblr.com/x/tumblr_p_500.jpg".to_string(),
                MEDIA_B.to_string()
            ]
        );
    }

    #[test]
    fn test_photo_without_alternates_uses_original() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 4,
                "type": "photo",
                "photos": [
                    {"original_size": {"width": 640, "height": 480, "url": "https://h.example.com/o/orig.jpg"}},
                    {"caption": "no sizes at all"}
                ]
            })),
            &sink,
        );

        let Some(Aux::Photo(aux)) = post.aux else {
            panic!("expected photo aux");
        };
        assert_eq!(aux.photos.len(), 1);
        assert_eq!(aux.photos[0].url, "images/orig.jpg");
        assert_eq!(aux.photos[0].width, 640);
    }

    #[test]
    fn test_link_post_uses_original_size_and_rewrites_text_fields() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 5,
                "type": "link",
                "title": "A link",
                "url": "https://example.com/article",
                "link_author": "Author",
                "excerpt": format!("see {MEDIA_A}"),
                "publisher": "example.com",
                "description": format!("<img src=\"{MEDIA_B}\">"),
                "photos": [{
                    "caption": "",
                    "alt_sizes": [{"width": 2000, "height": 2000, "url": "https://66.media.tumblr.com/x/big.jpg"}],
                    "original_size": {"width": 400, "height": 300, "url": "https://66.media.tumblr.com/x/orig.jpg"}
                }]
            })),
            &sink,
        );

        let Some(Aux::Link(aux)) = post.aux else {
            panic!("expected link aux");
        };
        assert_eq!(aux.title.as_deref(), Some("A link"));
        assert_eq!(aux.url, "https://example.com/article");
        assert_eq!(aux.author.as_deref(), Some("Author"));
        assert_eq!(aux.publisher.as_deref(), Some("example.com"));
        assert_eq!(aux.excerpt.as_deref(), Some("see images/tumblr_aaa_500.jpg"));
        assert_eq!(aux.description, "<img src=\"images/tumblr_bbb_1280.png\">");
        assert_eq!(aux.photos.len(), 1);
        assert_eq!(aux.photos[0].url, "images/orig.jpg");
        assert_eq!((aux.photos[0].width, aux.photos[0].height), (400, 300));
        assert!(
            !sink
                .urls()
                .contains(&"https://66.media.tumblr.com/x/big.jpg".to_string())
        );
    }

    #[test]
    fn test_link_photo_without_original_is_dropped() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 9,
                "type": "link",
                "url": "https://example.com/article",
                "photos": [
                    {"caption": "no sizes", "alt_sizes": []},
                    {"caption": "", "original_size": {"width": 640, "height": 480, "url": MEDIA_A}}
                ]
            })),
            &sink,
        );

        let Some(Aux::Link(aux)) = post.aux else {
            panic!("expected link aux");
        };
        assert_eq!(aux.photos.len(), 1);
        assert_eq!(aux.photos[0].url, "images/tumblr_aaa_500.jpg");
        assert_eq!(sink.urls(), vec![MEDIA_A.to_string()]);
    }

    #[test]
    fn test_media_pattern_is_ascii_only() {
        let sink = RecordingSink::default();
        let html = concat!(
            "<img src=\"https://66.media.tumblr.com/abc/caf\u{e9}.jpg\">",
            "<img src=\"https://66.media.tumblr.com/\u{e9}t\u{e9}/photo.jpg\">"
        );

        assert_eq!(replace_media_urls(html, &sink), html);
        assert!(sink.urls().is_empty());
    }

    #[test]
    fn test_quote_answer_video_audio_payloads() {
        let sink = RecordingSink::default();

        let quote = transform(
            raw(json!({"id": 6, "type": "quote", "text": MEDIA_A, "source": "<a>someone</a>"})),
            &sink,
        );
        assert_eq!(
            quote.aux,
            Some(Aux::Quote(QuoteAux {
                text: "images/tumblr_aaa_500.jpg".to_string(),
                source: "<a>someone</a>".to_string(),
            }))
        );

        let answer = transform(
            raw(json!({
                "id": 7,
                "type": "answer",
                "asking_name": "anon",
                "asking_url": null,
                "question": MEDIA_B,
                "answer": MEDIA_B
            })),
            &sink,
        );
        let Some(Aux::Answer(aux)) = answer.aux else {
            panic!("expected answer aux");
        };
        assert_eq!(aux.asking_name, "anon");
        assert_eq!(aux.asking_url, None);
        assert_eq!(aux.question, MEDIA_B, "questions are never rewritten");
        assert_eq!(aux.answer, "images/tumblr_bbb_1280.png");

        let video = transform(
            raw(json!({
                "id": 8,
                "type": "video",
                "caption": "clip",
                "player": [{"width": 250, "embed_code": "<iframe></iframe>"}]
            })),
            &sink,
        );
        let Some(Aux::Video(aux)) = video.aux else {
            panic!("expected video aux");
        };
        assert_eq!(aux.caption, "clip");
        assert_eq!(aux.player[0]["width"], 250);

        let audio = transform(
            raw(json!({"id": 9, "type": "audio", "caption": "song", "player": "<embed>", "plays": 12})),
            &sink,
        );
        assert_eq!(
            audio.aux,
            Some(Aux::Audio(AudioAux {
                caption: "song".to_string(),
                player: json!("<embed>"),
                plays: Some(12),
            }))
        );
    }

    #[test]
    fn test_chat_post_is_never_rewritten() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 10,
                "type": "chat",
                "title": null,
                "dialogue": [
                    {"name": "A", "label": "A:", "phrase": MEDIA_A},
                    {"name": "B", "label": "B:", "phrase": "hello"}
                ]
            })),
            &sink,
        );

        let Some(Aux::Chat(aux)) = post.aux else {
            panic!("expected chat aux");
        };
        assert_eq!(aux.title, None);
        assert_eq!(aux.dialogue.len(), 2);
        assert_eq!(aux.dialogue[0].phrase, MEDIA_A);
        assert!(sink.urls().is_empty());
    }

    #[test]
    fn test_unrecognized_type_has_no_aux() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({
                "id": 11,
                "type": "poll",
                "timestamp": 5,
                "tags": ["x"],
                "body": MEDIA_A
            })),
            &sink,
        );

        assert_eq!(post.post_type, "poll");
        assert_eq!(post.tags, "x");
        assert!(post.aux.is_none());
        assert!(sink.urls().is_empty());
    }

    #[test]
    fn test_malformed_fields_still_produce_payload() {
        let sink = RecordingSink::default();
        let post = transform(
            raw(json!({"id": 12, "type": "audio", "plays": "many", "photos": 3})),
            &sink,
        );
        assert_eq!(post.aux, Some(Aux::Audio(AudioAux::default())));

        let photo = transform(raw(json!({"id": 13, "type": "photo", "photos": "nope"})), &sink);
        assert_eq!(photo.aux, Some(Aux::Photo(PhotoAux::default())));
    }
}
