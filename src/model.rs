//! Goal data model
//!
//! A forest of goals. Each goal is the root of a tree of tasks, and goals
//! reference tags from a flat registry by id.
//!
//! The JSON shape matches the synced document:
//!
//! ```text
//! { "goals": [ { "id", "title", "description", "children", "done",
//!                "createdAt", "week", "duration", "tags" } ],
//!   "tags":  [ { "id", "name", "color", "isHot" } ] }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::week::{IsoWeekId, MAX_DURATION_WEEKS};

/// Generate a fresh node/tag id. Ids are never reused.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// A node in a goal tree. Goals carry one as their root; every other node is a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default, with = "done_flag")]
    pub done: bool,
}

impl Node {
    /// Create a pending leaf task with a fresh id
    pub fn new_task(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            children: Vec::new(),
            done: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A root-level objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(flatten)]
    pub root: Node,
    #[serde(default)]
    pub created_at: String,
    /// ISO year-week (`2026-W42`) the goal is scheduled to start
    #[serde(default)]
    pub week: Option<String>,
    /// Number of weeks the goal spans
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Goal {
    pub fn id(&self) -> &str {
        &self.root.id
    }

    pub fn title(&self) -> &str {
        &self.root.title
    }

    /// Fraction of completed nodes among all descendants.
    /// A goal without tasks counts itself.
    pub fn progress(&self) -> f64 {
        let (done, total) = crate::tree::done_counts(&self.root);
        if total == 0 {
            if self.root.done {
                1.0
            } else {
                0.0
            }
        } else {
            done as f64 / total as f64
        }
    }

    /// Parsed schedule week, if set and valid
    pub fn iso_week(&self) -> Option<IsoWeekId> {
        self.week.as_deref().and_then(|w| w.parse().ok())
    }
}

/// A label attached to goals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub is_hot: bool,
}

/// The whole persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default = "default_tags")]
    pub tags: Vec<Tag>,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            goals: Vec::new(),
            tags: default_tags(),
        }
    }
}

/// Tag registry used when the document has none
pub fn default_tags() -> Vec<Tag> {
    [
        ("work", "blue"),
        ("personal", "green"),
        ("health", "red"),
        ("learning", "magenta"),
    ]
    .iter()
    .map(|(name, color)| Tag {
        id: name.to_string(),
        name: name.to_string(),
        color: color.to_string(),
        is_hot: false,
    })
    .collect()
}

/// Error for goal and tag registry edits
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    EmptyTitle,
    InvalidWeek(String),
    InvalidDuration,
    DuplicateTag(String),
    TagNotFound(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::EmptyTitle => write!(f, "Title cannot be empty"),
            ModelError::InvalidWeek(w) => {
                write!(f, "'{}' is not an ISO week (expected YYYY-Www)", w)
            }
            ModelError::InvalidDuration => {
                write!(f, "Duration must be between 1 and {} weeks", MAX_DURATION_WEEKS)
            }
            ModelError::DuplicateTag(name) => write!(f, "Tag '{}' already exists", name),
            ModelError::TagNotFound(id) => write!(f, "Tag {} not found", id),
        }
    }
}

impl std::error::Error for ModelError {}

/// Fields for a new goal
#[derive(Debug, Clone, Default)]
pub struct NewGoal {
    pub title: String,
    pub description: String,
    pub week: Option<String>,
    pub duration: Option<u32>,
    pub tags: Vec<String>,
}

impl AppData {
    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id() == id)
    }

    pub fn goal_mut(&mut self, id: &str) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.id() == id)
    }

    /// Find the goal whose tree contains `node_id`
    pub fn goal_containing(&self, node_id: &str) -> Option<&Goal> {
        self.goals
            .iter()
            .find(|g| crate::tree::find(&g.root, node_id).is_some())
    }

    /// Create a goal and append it to the forest, returning its id
    pub fn add_goal(&mut self, new: NewGoal) -> Result<String, ModelError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(ModelError::EmptyTitle);
        }
        let week = match new.week {
            Some(w) => {
                let parsed: IsoWeekId = w.parse().map_err(|_| ModelError::InvalidWeek(w.clone()))?;
                Some(parsed.to_string())
            }
            None => None,
        };
        if matches!(new.duration, Some(d) if d == 0 || d > MAX_DURATION_WEEKS) {
            return Err(ModelError::InvalidDuration);
        }

        let mut tags = new.tags;
        tags.sort();
        tags.dedup();

        let goal = Goal {
            root: Node::new_task(title, new.description),
            created_at: chrono::Local::now().to_rfc3339(),
            week,
            duration: new.duration,
            tags,
        };
        let id = goal.id().to_string();
        self.goals.push(goal);
        Ok(id)
    }

    /// Resolve a goal's tag ids against the registry, skipping dangling ids
    pub fn tags_for<'a>(&'a self, goal: &'a Goal) -> impl Iterator<Item = &'a Tag> + 'a {
        goal.tags
            .iter()
            .filter_map(move |id| self.tags.iter().find(|t| &t.id == id))
    }

    /// Register a tag. Names are unique, compared case-insensitively.
    pub fn add_tag(&mut self, name: &str, color: &str, is_hot: bool) -> Result<String, ModelError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ModelError::EmptyTitle);
        }
        if self.tags.iter().any(|t| t.name.eq_ignore_ascii_case(name)) {
            return Err(ModelError::DuplicateTag(name.to_string()));
        }
        let id = new_id();
        self.tags.push(Tag {
            id: id.clone(),
            name: name.to_string(),
            color: color.to_string(),
            is_hot,
        });
        Ok(id)
    }

    pub fn toggle_hot(&mut self, tag_id: &str) -> Result<bool, ModelError> {
        let tag = self
            .tags
            .iter_mut()
            .find(|t| t.id == tag_id)
            .ok_or_else(|| ModelError::TagNotFound(tag_id.to_string()))?;
        tag.is_hot = !tag.is_hot;
        Ok(tag.is_hot)
    }

    /// Goals whose scheduled span covers `week`
    pub fn goals_in_week(&self, week: IsoWeekId) -> Vec<&Goal> {
        self.goals
            .iter()
            .filter(|g| crate::week::covers(g, week))
            .collect()
    }
}

/// `done` is stored as `0`/`1`; older documents used booleans.
mod done_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(done: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*done))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Flag {
            Int(i64),
            Bool(bool),
        }
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Int(n) => n != 0,
            Flag::Bool(b) => b,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tags_use_defaults() {
        let data: AppData = serde_json::from_str(r#"{"goals": []}"#).unwrap();
        assert_eq!(data.tags, default_tags());
    }

    #[test]
    fn test_goal_tolerates_missing_fields() {
        let json = r#"{"goals": [{"id": "g1", "title": "Run a marathon"}], "tags": []}"#;
        let data: AppData = serde_json::from_str(json).unwrap();
        let goal = &data.goals[0];
        assert!(goal.tags.is_empty());
        assert!(goal.root.children.is_empty());
        assert!(!goal.root.done);
        assert_eq!(goal.week, None);
    }

    #[test]
    fn test_done_flag_formats() {
        let json = r#"{"id": "a", "title": "A", "done": 1, "children": [{"id": "b", "title": "B", "done": true}]}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert!(node.done);
        assert!(node.children[0].done);

        let out = serde_json::to_value(&node).unwrap();
        assert_eq!(out["done"], 1);
        assert_eq!(out["children"][0]["done"], 1);
    }

    #[test]
    fn test_goal_serializes_flat_camel_case() {
        let mut data = AppData::default();
        let id = data
            .add_goal(NewGoal {
                title: "Learn Rust".into(),
                week: Some("2026-W42".into()),
                duration: Some(3),
                ..Default::default()
            })
            .unwrap();
        let value = serde_json::to_value(&data).unwrap();
        let goal = &value["goals"][0];
        assert_eq!(goal["id"], id.as_str());
        assert_eq!(goal["title"], "Learn Rust");
        assert_eq!(goal["week"], "2026-W42");
        assert!(goal.get("createdAt").is_some());
        assert!(goal.get("root").is_none());
    }

    #[test]
    fn test_add_goal_validation() {
        let mut data = AppData::default();
        assert_eq!(
            data.add_goal(NewGoal { title: "  ".into(), ..Default::default() }),
            Err(ModelError::EmptyTitle)
        );
        assert!(matches!(
            data.add_goal(NewGoal {
                title: "x".into(),
                week: Some("2026-42".into()),
                ..Default::default()
            }),
            Err(ModelError::InvalidWeek(_))
        ));
        assert_eq!(
            data.add_goal(NewGoal {
                title: "x".into(),
                duration: Some(0),
                ..Default::default()
            }),
            Err(ModelError::InvalidDuration)
        );
        assert_eq!(
            data.add_goal(NewGoal {
                title: "x".into(),
                duration: Some(4_000_000_000),
                ..Default::default()
            }),
            Err(ModelError::InvalidDuration)
        );
        assert!(data.goals.is_empty());
    }

    #[test]
    fn test_dangling_tag_ids_are_skipped() {
        let mut data = AppData::default();
        let id = data
            .add_goal(NewGoal {
                title: "Ship it".into(),
                tags: vec!["work".into(), "missing".into()],
                ..Default::default()
            })
            .unwrap();
        let goal = data.goal(&id).unwrap();
        let names: Vec<&str> = data.tags_for(goal).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["work"]);
    }

    #[test]
    fn test_tag_registry() {
        let mut data = AppData::default();
        let id = data.add_tag("Side project", "yellow", false).unwrap();
        assert_eq!(
            data.add_tag("side PROJECT", "red", true),
            Err(ModelError::DuplicateTag("side PROJECT".into()))
        );
        assert_eq!(data.toggle_hot(&id), Ok(true));
        assert_eq!(data.toggle_hot(&id), Ok(false));
        assert!(data.toggle_hot("nope").is_err());
    }

    #[test]
    fn test_progress() {
        let mut goal = Goal {
            root: Node::new_task("g", ""),
            created_at: String::new(),
            week: None,
            duration: None,
            tags: vec![],
        };
        assert_eq!(goal.progress(), 0.0);
        let mut done_child = Node::new_task("a", "");
        done_child.done = true;
        goal.root.children = vec![done_child, Node::new_task("b", "")];
        assert_eq!(goal.progress(), 0.5);
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
