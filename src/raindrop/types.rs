use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Remote collection identifier.
pub type CollectionId = i64;

/// The id Raindrop uses for "no collection" (its Unsorted bucket).
pub const UNSORTED_COLLECTION_ID: CollectionId = -1;

/// `GET /user` envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// A named, ordered list of collection ids in the user's sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub title: String,
    #[serde(default)]
    pub collections: Vec<CollectionId>,
}

/// `GET /collection/{id}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CollectionEnvelope {
    pub item: Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "_id")]
    pub id: CollectionId,
    pub title: String,
}

/// A bookmark ready to be created remotely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkPayload {
    pub link: String,
    pub created: DateTime<Utc>,
    pub tags: Vec<String>,
    pub collection_id: CollectionId,
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct CollectionRef {
    #[serde(rename = "$id")]
    id: CollectionId,
}

#[derive(Serialize)]
struct RaindropWire<'a> {
    #[serde(rename = "pleaseParse")]
    please_parse: Empty,
    created: String,
    tags: &'a [String],
    collection: CollectionRef,
    link: &'a str,
}

impl Serialize for BookmarkPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RaindropWire {
            please_parse: Empty {},
            created: self.created.to_rfc3339_opts(SecondsFormat::Secs, true),
            tags: &self.tags,
            collection: CollectionRef {
                id: self.collection_id,
            },
            link: &self.link,
        }
        .serialize(serializer)
    }
}

/// `POST /raindrops` body.
#[derive(Debug, Serialize)]
pub(crate) struct CreateRequest<'a> {
    pub items: &'a [BookmarkPayload],
}

/// Reply to one `POST /raindrops` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub result: bool,
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemResult>,
}

/// Per-item part of a [`BatchResponse`]. Created items come back as full
/// bookmark objects without a `result` flag, so only `Some(false)` marks a
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl ItemResult {
    pub fn failed(&self) -> bool {
        self.result == Some(false)
    }
}

/// Error body shape shared by every endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}
