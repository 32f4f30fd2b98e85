use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, trace};

use crate::webhooks::instagram::CommentEvent;

const INSTAGRAM_OBJECT: &str = "instagram";
const COMMENTS_FIELD: &str = "comments";

/// Body of a POST delivery. Everything below `object` is parsed leniently: missing or
/// ill-typed arrays are empty, and entries or changes that don't fit are dropped.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    /// ID of the Instagram account the notification is about
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
struct CommentValue {
    id: String,
    parent_id: Option<String>,
    text: String,
    from: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    username: Option<String>,
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items,
        Some(other) => {
            trace!("expected an array, got {}, treating it as empty", other);
            return Ok(Vec::new());
        }
        None => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(item) => Some(item),
            Err(e) => {
                trace!("dropping malformed item: {}", e);
                None
            }
        })
        .collect())
}

impl WebhookPayload {
    pub fn is_instagram(&self) -> bool {
        self.object.as_deref() == Some(INSTAGRAM_OBJECT)
    }

    /// Every comment event of the payload, in delivery order.
    pub fn comment_events(self) -> Vec<CommentEvent> {
        self.entry
            .into_iter()
            .flat_map(|entry| {
                trace!(account = ?entry.id, changes = entry.changes.len(), "reading entry");
                entry.changes
            })
            .filter(|change| change.field == COMMENTS_FIELD)
            .filter_map(|change| match serde_json::from_value::<CommentValue>(change.value) {
                Ok(value) => Some(value.into_event()),
                Err(e) => {
                    debug!("skipping comment change with missing fields: {}", e);
                    None
                }
            })
            .collect()
    }
}

impl CommentValue {
    fn into_event(self) -> CommentEvent {
        // an empty parent_id shows up on some top-level comments, it isn't a thread
        let parent_thread_id = self
            .parent_id
            .filter(|parent| !parent.is_empty())
            .unwrap_or_else(|| self.id.clone());
        let author_username = self.from.and_then(|from| from.username).unwrap_or_default();

        CommentEvent {
            comment_id: self.id,
            parent_thread_id,
            author_username,
            text: self.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> WebhookPayload {
        serde_json::from_value(value).expect("payload should parse")
    }

    #[test]
    fn test_top_level_comment() {
        let payload = parse(json!({
            "object": "instagram",
            "entry": [{
                "id": "17841400000000000",
                "time": 1_700_000_000,
                "changes": [{
                    "field": "comments",
                    "value": {
                        "id": "1789",
                        "text": "Love it!",
                        "from": { "id": "42", "username": "jane.doe" },
                        "media": { "id": "1788" }
                    }
                }]
            }]
        }));

        assert!(payload.is_instagram());
        assert_eq!(
            payload.comment_events(),
            vec![CommentEvent {
                comment_id: "1789".to_owned(),
                parent_thread_id: "1789".to_owned(),
                author_username: "jane.doe".to_owned(),
                text: "Love it!".to_owned(),
            }]
        );
    }

    #[test]
    fn test_reply_in_thread_uses_parent_id() {
        let payload = parse(json!({
            "object": "instagram",
            "entry": [{ "changes": [{
                "field": "comments",
                "value": { "id": "1790", "parent_id": "1789", "text": "me too", "from": { "username": "joe" } }
            }]}]
        }));

        let events = payload.comment_events();
        assert_eq!(events[0].comment_id, "1790");
        assert_eq!(events[0].parent_thread_id, "1789");
    }

    #[test]
    fn test_empty_parent_id_is_its_own_thread() {
        let payload = parse(json!({
            "object": "instagram",
            "entry": [{ "changes": [
                { "field": "comments", "value": { "id": "A", "parent_id": "", "text": "great", "from": { "username": "joe" } } },
                { "field": "comments", "value": { "id": "B", "parent_id": "", "text": "awful", "from": { "username": "amy" } } },
            ]}]
        }));

        let threads = payload
            .comment_events()
            .into_iter()
            .map(|e| (e.comment_id, e.parent_thread_id))
            .collect::<Vec<_>>();
        assert_eq!(
            threads,
            [
                ("A".to_owned(), "A".to_owned()),
                ("B".to_owned(), "B".to_owned())
            ]
        );
    }

    #[test]
    fn test_missing_arrays_are_empty() {
        assert!(parse(json!({ "object": "instagram" })).comment_events().is_empty());
        assert!(parse(json!({ "object": "instagram", "entry": null }))
            .comment_events()
            .is_empty());
        assert!(parse(json!({ "object": "instagram", "entry": "nope" }))
            .comment_events()
            .is_empty());
        assert!(parse(json!({ "object": "instagram", "entry": [{}] }))
            .comment_events()
            .is_empty());
        assert!(parse(json!({ "object": "instagram", "entry": [{ "changes": {} }] }))
            .comment_events()
            .is_empty());
    }

    #[test]
    fn test_other_fields_and_malformed_changes_are_skipped() {
        let payload = parse(json!({
            "object": "instagram",
            "entry": [
                { "changes": [
                    { "field": "mentions", "value": { "media_id": "1" } },
                    { "field": "comments", "value": { "text": "no id" } },
                    { "field": "comments", "value": { "id": "1791" } },
                    { "value": { "id": "1792", "text": "no field" } },
                    { "field": "comments", "value": { "id": "1793", "text": "anonymous" } },
                ]},
                "not an entry",
                { "changes": [
                    { "field": "comments", "value": { "id": "1794", "text": "second entry", "from": { "username": "amy" } } },
                ]},
            ]
        }));

        let events = payload.comment_events();
        let ids = events.iter().map(|e| e.comment_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["1793", "1794"]);
        assert_eq!(events[0].author_username, "");
        assert_eq!(events[1].author_username, "amy");
    }

    #[test]
    fn test_other_objects() {
        assert!(!parse(json!({ "object": "page", "entry": [] })).is_instagram());
        assert!(!parse(json!({})).is_instagram());
    }
}
