use std::fs;

use inkrun::{story::Story, story_error::StoryError};

mod common;

#[test]
fn knot_divert_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/divert/knot.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(1, text.len());
    assert_eq!("Hello, world!", text[0]);

    Ok(())
}

#[test]
fn choose_path_string_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/divert/knot.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    story.choose_path_string("hello", true, None)?;

    let line = story.cont()?;
    assert_eq!("Hello, world!", line.trim());

    Ok(())
}

#[test]
fn visit_count_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/divert/knot.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    assert_eq!(0, story.get_visit_count_at_path_string("hello")?);

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;

    assert_eq!(1, story.get_visit_count_at_path_string("hello")?);

    Ok(())
}

#[test]
fn tunnel_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/divert/tunnel.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(2, text.len());
    assert_eq!("In tunnel.", text[0]);
    assert_eq!("Done.", text[1]);
    assert!(common::is_ended(&story));

    Ok(())
}
