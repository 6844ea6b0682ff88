//! A generated choice, presented to the host between continues.
use serde_json::{json, Map};

use crate::callstack::Thread;
use crate::node::ContentTree;
use crate::path::Path;
use crate::story_error::StoryError;

#[derive(Clone)]
pub struct Choice {
    /// The main text, as it should be presented to the player.
    pub text: String,
    /// Path to the choice point that generated this choice, for diagnostics.
    pub source_path: String,
    /// Index within the visible choice list of the current flow.
    pub index: usize,
    pub tags: Vec<String>,

    pub(crate) target_path: Path,
    pub(crate) is_invisible_default: bool,
    pub(crate) thread_at_generation: Option<Thread>,
    pub(crate) original_thread_index: usize,
}

impl Choice {
    pub(crate) fn write_json(&self) -> serde_json::Value {
        let mut jobj: Map<String, serde_json::Value> = Map::new();
        jobj.insert("text".to_string(), json!(self.text));
        jobj.insert("index".to_string(), json!(self.index));
        jobj.insert("originalChoicePath".to_string(), json!(self.source_path));
        jobj.insert(
            "originalThreadIndex".to_string(),
            json!(self.original_thread_index),
        );
        jobj.insert(
            "targetPath".to_string(),
            json!(self.target_path.get_components_string()),
        );

        if !self.tags.is_empty() {
            let jtags: Vec<serde_json::Value> = self.tags.iter().map(|t| json!(t)).collect();
            jobj.insert("tags".to_string(), serde_json::Value::Array(jtags));
        }

        serde_json::Value::Object(jobj)
    }

    pub(crate) fn from_json(
        jobj: &Map<String, serde_json::Value>,
        tree: &ContentTree,
        jthread: Option<&serde_json::Value>,
    ) -> Result<Choice, StoryError> {
        let text = jobj
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let index = jobj.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let source_path = jobj
            .get("originalChoicePath")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let original_thread_index = jobj
            .get("originalThreadIndex")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        let target_path = jobj
            .get("targetPath")
            .and_then(|v| v.as_str())
            .map(Path::from_components_string)
            .ok_or_else(|| StoryError::BadJson("Choice is missing targetPath".to_string()))?;

        let tags = match jobj.get("tags").and_then(|v| v.as_array()) {
            Some(jtags) => jtags
                .iter()
                .filter_map(|t| t.as_str())
                .map(|t| t.to_string())
                .collect(),
            None => Vec::new(),
        };

        let thread_at_generation = match jthread {
            Some(jthread) => {
                let jthread = jthread.as_object().ok_or_else(|| {
                    StoryError::BadJson("Choice thread is not an object".to_string())
                })?;
                Some(Thread::from_json(tree, jthread)?)
            }
            None => None,
        };

        Ok(Choice {
            text,
            source_path,
            index,
            tags,
            target_path,
            is_invisible_default: false,
            thread_at_generation,
            original_thread_index,
        })
    }
}
