use crate::{
    control_command::CommandType,
    node::NodeKind,
    path::Path,
    story::Story,
    story_error::StoryError,
};

/// # Tags
/// Methods to read tags.
impl Story {
    /// Get any global tags associated with the story. These are defined as
    /// hash tags defined at the very top of the story.
    pub fn get_global_tags(&self) -> Result<Vec<String>, StoryError> {
        self.tags_at_start_of_flow_container_with_path_string("")
    }

    /// Gets any tags associated with a particular knot or knot.stitch.
    /// These are defined as hash tags defined at the very top of a
    /// knot or stitch.
    pub fn tags_for_content_at_path(&self, path: &str) -> Result<Vec<String>, StoryError> {
        self.tags_at_start_of_flow_container_with_path_string(path)
    }

    pub(crate) fn tags_at_start_of_flow_container_with_path_string(
        &self,
        path_string: &str,
    ) -> Result<Vec<String>, StoryError> {
        let path = Path::from_components_string(path_string);

        // Expected to be global story, knot, or stitch
        let mut flow_container = self
            .tree
            .content_at_path(&path)
            .node
            .filter(|n| self.tree.is_container(*n))
            .ok_or_else(|| {
                StoryError::BadArgument(format!(
                    "Failed to find flow container at path '{}'",
                    path_string
                ))
            })?;

        while let Some(first_content) = self
            .tree
            .container(flow_container)
            .and_then(|c| c.content.first())
            .copied()
        {
            if self.tree.is_container(first_content) {
                flow_container = first_content;
            } else {
                break;
            }
        }

        // Any initial tag nodes count as the "main tags" associated with that
        // story/knot/stitch
        let mut in_tag = false;
        let mut tags = Vec::new();

        let content: Vec<_> = self
            .tree
            .container(flow_container)
            .map(|c| c.content.clone())
            .unwrap_or_default();

        for node in content {
            match self.tree.kind(node) {
                NodeKind::Command(CommandType::BeginTag) => in_tag = true,
                NodeKind::Command(CommandType::EndTag) => in_tag = false,
                NodeKind::Command(_) => {}
                kind => {
                    if in_tag {
                        if let NodeKind::Value(value) = kind {
                            if let Some(string_value) = value.get_str() {
                                tags.push(string_value.to_owned());
                                continue;
                            }
                        }

                        return Err(
                            StoryError::InvalidStoryState("Tag contained non-text content. Only plain text is allowed when using globalTags or TagsAtContentPath. If you want to evaluate dynamic content, you need to use story.Continue()".to_owned()),
                        );
                    } else {
                        break;
                    }
                }
            }
        }

        Ok(tags)
    }

    /// Gets a list of tags defined with '#' in the ink source that were
    /// seen during the most recent [`cont`](Story::cont) call.
    pub fn get_current_tags(&mut self) -> Result<Vec<String>, StoryError> {
        self.if_async_we_cant("call currentTags since it's a work in progress")?;
        Ok(self.get_state_mut().get_current_tags())
    }
}
