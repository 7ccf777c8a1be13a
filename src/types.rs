//! Core types for blog-archive
//!
//! Raw payloads (`RawPost`, `RawPhoto`, ...) mirror what the feed API returns.
//! Normalized records (`NormalizedPost`, [`Aux`]) are what the store persists.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Feed-assigned unique identifier for a post
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl PostId {
    /// Create a new PostId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for PostId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<PostId> for i64 {
    fn from(id: PostId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for PostId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for PostId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for PostId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for PostId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Post types the feed is known to produce
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    /// Titled HTML body
    Text,
    /// Quotation with attribution
    Quote,
    /// Shared link with optional preview photos
    Link,
    /// Answered ask
    Answer,
    /// Embedded video player
    Video,
    /// Embedded audio player
    Audio,
    /// Chat transcript
    Chat,
    /// Photo set
    Photo,
}

impl PostType {
    /// Parse the feed's `type` string; `None` for anything unrecognized
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "quote" => Some(Self::Quote),
            "link" => Some(Self::Link),
            "answer" => Some(Self::Answer),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "chat" => Some(Self::Chat),
            "photo" => Some(Self::Photo),
            _ => None,
        }
    }

    /// The feed's string form of this type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Quote => "quote",
            Self::Link => "link",
            Self::Answer => "answer",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Chat => "chat",
            Self::Photo => "photo",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The feed sends `null` for many absent strings; treat it like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A post exactly as the feed returns it
///
/// Fields common to every post type are lifted out; everything type-specific
/// stays in `fields` until the transformer decodes it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPost {
    /// Feed-assigned post id
    pub id: PostId,
    /// Post type as reported by the feed
    #[serde(rename = "type")]
    pub post_type: String,
    /// Unix timestamp of publication
    #[serde(default)]
    pub timestamp: i64,
    /// Human-readable publication date
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    /// Tags in feed order
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Attribution URL for reblogged content
    #[serde(default)]
    pub source_url: Option<String>,
    /// Attribution title for reblogged content
    #[serde(default)]
    pub source_title: Option<String>,
    /// Publication state (published, queued, draft, private)
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    /// Type-specific payload
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// One rendition of an image
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    /// Width in pixels
    #[serde(default)]
    pub width: u32,
    /// Height in pixels
    #[serde(default)]
    pub height: u32,
    /// Remote URL of this rendition
    pub url: String,
}

/// A photo as offered by the feed, with all its variants
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawPhoto {
    /// Per-photo caption
    #[serde(default, deserialize_with = "null_as_default")]
    pub caption: String,
    /// Differently-sized renditions
    #[serde(default, deserialize_with = "null_as_default")]
    pub alt_sizes: Vec<PhotoSize>,
    /// The uploaded original
    #[serde(default)]
    pub original_size: Option<PhotoSize>,
}

/// A photo as stored: the chosen variant with its URL pointing at the local copy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Per-photo caption
    #[serde(default)]
    pub caption: String,
    /// Width of the chosen variant
    pub width: u32,
    /// Height of the chosen variant
    pub height: u32,
    /// Local path (or the remote URL if it could not be localized)
    pub url: String,
}

/// Text post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextAux {
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// HTML body
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
}

/// Quote post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteAux {
    /// Quoted text
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    /// HTML attribution
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
}

/// Link post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkAux {
    /// Link title
    #[serde(default)]
    pub title: Option<String>,
    /// Target URL
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    /// Author of the linked page
    #[serde(default, alias = "link_author")]
    pub author: Option<String>,
    /// Excerpt from the linked page
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Publisher of the linked page
    #[serde(default)]
    pub publisher: Option<String>,
    /// Preview photos
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
    /// Poster's commentary
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// Answer post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerAux {
    /// Who asked
    #[serde(default, deserialize_with = "null_as_default")]
    pub asking_name: String,
    /// Asker's blog URL
    #[serde(default)]
    pub asking_url: Option<String>,
    /// The question
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    /// The answer (HTML)
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
}

/// Video post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAux {
    /// HTML caption
    #[serde(default, deserialize_with = "null_as_default")]
    pub caption: String,
    /// Embed players, kept opaque
    #[serde(default)]
    pub player: Value,
}

/// Audio post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioAux {
    /// HTML caption
    #[serde(default, deserialize_with = "null_as_default")]
    pub caption: String,
    /// Embed player, kept opaque
    #[serde(default)]
    pub player: Value,
    /// Play count
    #[serde(default)]
    pub plays: Option<u64>,
}

/// One line of a chat transcript
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    /// Speaker name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Speaker label as written
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    /// What was said
    #[serde(default, deserialize_with = "null_as_default")]
    pub phrase: String,
}

/// Chat post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatAux {
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
    /// Transcript lines
    #[serde(default, deserialize_with = "null_as_default")]
    pub dialogue: Vec<DialogueLine>,
}

/// Photo post payload
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoAux {
    /// Chosen variant of each photo
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
    /// HTML caption for the whole set
    #[serde(default, deserialize_with = "null_as_default")]
    pub caption: String,
}

/// Type-specific payload of a normalized post
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Aux {
    /// See [`TextAux`]
    Text(TextAux),
    /// See [`QuoteAux`]
    Quote(QuoteAux),
    /// See [`LinkAux`]
    Link(LinkAux),
    /// See [`AnswerAux`]
    Answer(AnswerAux),
    /// See [`VideoAux`]
    Video(VideoAux),
    /// See [`AudioAux`]
    Audio(AudioAux),
    /// See [`ChatAux`]
    Chat(ChatAux),
    /// See [`PhotoAux`]
    Photo(PhotoAux),
}

impl Aux {
    /// The post type this payload belongs to
    pub fn post_type(&self) -> PostType {
        match self {
            Self::Text(_) => PostType::Text,
            Self::Quote(_) => PostType::Quote,
            Self::Link(_) => PostType::Link,
            Self::Answer(_) => PostType::Answer,
            Self::Video(_) => PostType::Video,
            Self::Audio(_) => PostType::Audio,
            Self::Chat(_) => PostType::Chat,
            Self::Photo(_) => PostType::Photo,
        }
    }
}

/// A post in the uniform shape the store persists
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPost {
    /// Feed-assigned post id
    pub id: PostId,
    /// Post type string, kept verbatim even when unrecognized
    pub post_type: String,
    /// Unix timestamp of publication
    pub timestamp: i64,
    /// Human-readable publication date
    pub date: String,
    /// Tags joined with `,`
    pub tags: String,
    /// Attribution URL
    pub source_url: Option<String>,
    /// Attribution title
    pub source_title: Option<String>,
    /// Publication state
    pub state: String,
    /// Type-specific payload; absent for unrecognized types
    pub aux: Option<Aux>,
}

impl NormalizedPost {
    /// Tags split back into their original order
    pub fn tag_list(&self) -> Vec<&str> {
        if self.tags.is_empty() {
            Vec::new()
        } else {
            self.tags.split(',').collect()
        }
    }
}

/// Blog-level metadata, refreshed once per run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogMetadata {
    /// Blog URL
    pub url: String,
    /// Blog title
    pub title: String,
    /// Unix timestamp of the blog's last update
    pub last_update: i64,
}

/// One page of posts returned by the feed
#[derive(Clone, Debug, Deserialize)]
pub struct PostsPage {
    /// Posts in feed order
    #[serde(default)]
    pub posts: Vec<RawPost>,
    /// Total number of posts the feed reports for the blog
    #[serde(default)]
    pub total_posts: u64,
}
