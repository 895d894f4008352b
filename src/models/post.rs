// Post domain model

use serde::{Deserialize, Serialize};

/// A post row as stored by the posts service
///
/// The `id` is store-assigned and unique; it exists from the moment the
/// create operation commits. Posts reference their author by integer foreign
/// key (`user_id`), which the posts service does not validate against the
/// users service — the two stores are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: String,
    #[serde(rename = "userId")]
    pub user_id: i32,
}

/// Fields required to create a post (the store assigns the id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub user_id: i32,
}

/// Partial update for a post; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl Post {
    /// Apply a change-set in place
    pub fn apply(&mut self, changes: PostChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(content) = changes.content {
            self.content = content;
        }
    }
}
