use std::fs;

use inkrun::{story::Story, story_error::StoryError};

mod common;

#[test]
fn save_load_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/choices/basic.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(2, story.get_current_choices().len());

    let saved = story.save_state()?;

    // Play on in the first story.
    story.choose_choice_index(0)?;
    let line = story.cont()?;
    assert_eq!("one", line.trim());

    // A fresh story restored from the save is back at the choice point.
    let mut story2 = Story::new(&json_string).unwrap();
    story2.load_state(&saved)?;

    let choices = story2.get_current_choices();
    assert_eq!(2, choices.len());
    assert_eq!("one", choices[0].text);
    assert_eq!("two", choices[1].text);

    story2.choose_choice_index(1)?;
    let line = story2.cont()?;
    assert_eq!("two", line.trim());

    Ok(())
}

#[test]
fn save_state_is_json_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/variables/globals.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let saved = story.save_state()?;
    let jsave: serde_json::Value = serde_json::from_str(&saved).unwrap();

    assert!(jsave.get("inkSaveVersion").is_some());
    assert!(jsave.get("inkFormatVersion").is_some());
    assert_eq!(
        Some("DEFAULT_FLOW"),
        jsave.get("currentFlowName").and_then(|v| v.as_str())
    );

    Ok(())
}

#[test]
fn load_bad_state_test() {
    let json_string = fs::read_to_string("tests/data/basictext/oneline.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    assert!(story.load_state("not json").is_err());
    assert!(story.load_state("{}").is_err());
}

#[test]
fn background_save_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/choices/basic.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;

    // Grab a serialized snapshot and keep playing while it would be
    // written out on another thread.
    let saved = story.copy_state_for_background_thread_save()?;

    // Starting a second background save before completing the first is an
    // error.
    assert!(story.copy_state_for_background_thread_save().is_err());

    story.choose_choice_index(0)?;
    let line = story.cont()?;
    assert_eq!("one", line.trim());

    story.background_save_complete();

    // The snapshot reflects the state at the time of the copy.
    let mut story2 = Story::new(&json_string).unwrap();
    story2.load_state(&saved)?;
    assert_eq!(2, story2.get_current_choices().len());

    // The live story kept the progress made while saving.
    assert!(common::is_ended(&story));

    Ok(())
}
