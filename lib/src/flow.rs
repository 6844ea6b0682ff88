//! A named flow: an independent callstack, output stream and choice list.
//! Stories start in a single default flow and may switch between flows.
use serde_json::Map;

use crate::callstack::{CallStack, Thread};
use crate::choice::Choice;
use crate::json_read;
use crate::json_write;
use crate::node::{ContentTree, NodeId};
use crate::rt_obj::RtObj;
use crate::story_error::StoryError;

#[derive(Clone)]
pub(crate) struct Flow {
    pub name: String,
    pub callstack: CallStack,
    pub output_stream: Vec<RtObj>,
    pub current_choices: Vec<Choice>,
}

impl Flow {
    pub fn new(name: &str, root: NodeId) -> Flow {
        Flow {
            name: name.to_string(),
            callstack: CallStack::new(root),
            output_stream: Vec::new(),
            current_choices: Vec::new(),
        }
    }

    pub fn from_json(
        name: &str,
        tree: &ContentTree,
        root: NodeId,
        jobj: &Map<String, serde_json::Value>,
    ) -> Result<Flow, StoryError> {
        let joutput = jobj
            .get("outputStream")
            .and_then(|v| v.as_array())
            .ok_or_else(|| StoryError::BadJson("outputStream not found.".to_string()))?;

        let jchoices = jobj
            .get("currentChoices")
            .and_then(|v| v.as_array())
            .ok_or_else(|| StoryError::BadJson("currentChoices not found.".to_string()))?;

        let mut flow = Flow {
            name: name.to_string(),
            callstack: CallStack::new(root),
            output_stream: json_read::jarray_to_rt_obj_list(joutput)?,
            current_choices: Vec::with_capacity(jchoices.len()),
        };

        for jchoice in jchoices {
            let jchoice = jchoice
                .as_object()
                .ok_or_else(|| StoryError::BadJson("Choice is not an object".to_string()))?;
            flow.current_choices
                .push(Choice::from_json(jchoice, tree, None)?);
        }

        flow.callstack.load_json(
            tree,
            jobj.get("callstack")
                .and_then(|v| v.as_object())
                .ok_or_else(|| StoryError::BadJson("loading callstack".to_string()))?,
        )?;

        flow.load_flow_choice_threads(jobj.get("choiceThreads"), tree)?;

        Ok(flow)
    }

    pub(crate) fn write_json(&mut self, tree: &ContentTree) -> Result<serde_json::Value, StoryError> {
        let mut jflow: Map<String, serde_json::Value> = Map::new();

        jflow.insert("callstack".to_string(), self.callstack.write_json(tree)?);
        jflow.insert(
            "outputStream".to_string(),
            json_write::write_rt_obj_list(&self.output_stream)?,
        );

        // choiceThreads is optional, and has to come before the choices
        // themselves since each choice's originalThreadIndex is set here.
        let mut jchoice_threads: Map<String, serde_json::Value> = Map::new();
        for choice in &mut self.current_choices {
            if let Some(thread) = &choice.thread_at_generation {
                choice.original_thread_index = thread.thread_index;

                if self
                    .callstack
                    .get_thread_with_index(choice.original_thread_index)
                    .is_none()
                {
                    jchoice_threads.insert(
                        choice.original_thread_index.to_string(),
                        thread.write_json(tree)?,
                    );
                }
            }
        }

        if !jchoice_threads.is_empty() {
            jflow.insert(
                "choiceThreads".to_string(),
                serde_json::Value::Object(jchoice_threads),
            );
        }

        let jchoices: Vec<serde_json::Value> = self
            .current_choices
            .iter()
            .map(|c| c.write_json())
            .collect();
        jflow.insert("currentChoices".to_string(), serde_json::Value::Array(jchoices));

        Ok(serde_json::Value::Object(jflow))
    }

    pub fn load_flow_choice_threads(
        &mut self,
        jchoice_threads: Option<&serde_json::Value>,
        tree: &ContentTree,
    ) -> Result<(), StoryError> {
        for choice in &mut self.current_choices {
            if let Some(thread) = self
                .callstack
                .get_thread_with_index(choice.original_thread_index)
            {
                choice.thread_at_generation = Some(thread.clone());
                continue;
            }

            let jsaved_thread = jchoice_threads
                .and_then(|ts| ts.get(choice.original_thread_index.to_string()))
                .and_then(|t| t.as_object())
                .ok_or_else(|| {
                    StoryError::BadJson(format!(
                        "Could not find choice thread {} in saved state",
                        choice.original_thread_index
                    ))
                })?;

            choice.thread_at_generation = Some(Thread::from_json(tree, jsaved_thread)?);
        }

        Ok(())
    }
}
