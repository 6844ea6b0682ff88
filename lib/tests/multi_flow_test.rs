use std::fs;

use inkrun::{story::Story, story_error::StoryError};

mod common;

#[test]
fn switch_flow_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/choices/basic.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(2, story.get_current_choices().len());

    // A fresh flow starts again at the beginning of the story, independent
    // of the choices pending in the default flow.
    story.switch_flow("SecondFlow")?;
    assert_eq!("SecondFlow", story.get_current_flow_name());
    assert!(!story.current_flow_is_default_flow());

    let line = story.cont()?;
    assert_eq!("Test conditional choices", line.trim());

    story.choose_choice_index(1)?;
    let line = story.cont()?;
    assert_eq!("two", line.trim());

    // The default flow still has its generated choices.
    story.switch_flow("DEFAULT_FLOW")?;
    assert!(story.current_flow_is_default_flow());
    assert_eq!(2, story.get_current_choices().len());

    story.choose_choice_index(0)?;
    let line = story.cont()?;
    assert_eq!("one", line.trim());

    Ok(())
}

#[test]
fn remove_flow_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/choices/basic.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    story.switch_flow("SecondFlow")?;
    assert!(story
        .get_alive_flow_names()
        .contains(&"SecondFlow".to_string()));

    // Removing the active flow falls back to the default one.
    story.remove_flow("SecondFlow")?;
    assert!(story.current_flow_is_default_flow());
    assert!(!story
        .get_alive_flow_names()
        .contains(&"SecondFlow".to_string()));

    assert!(story.remove_flow("DEFAULT_FLOW").is_err());

    Ok(())
}
