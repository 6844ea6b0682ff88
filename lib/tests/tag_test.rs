use std::fs;

use inkrun::{story::Story, story_error::StoryError};

mod common;

#[test]
fn global_tags_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/tags/tags.ink.json").unwrap();
    let story = Story::new(&json_string).unwrap();

    let tags = story.get_global_tags()?;
    assert_eq!(vec!["author: me".to_string()], tags);

    Ok(())
}

#[test]
fn line_tags_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/tags/tags.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let line = story.cont()?;
    assert_eq!("A line.", line.trim());

    let tags = story.get_current_tags()?;
    assert!(tags.contains(&"top".to_string()));

    Ok(())
}
