use std::fs;

use inkrun::{story::Story, story_error::StoryError};

mod common;

#[test]
fn glue_joins_lines_test() -> Result<(), StoryError> {
    let json_string = fs::read_to_string("tests/data/glue/glue.ink.json").unwrap();
    let mut story = Story::new(&json_string).unwrap();

    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut story, &mut text)?;

    assert_eq!(1, text.len());
    assert_eq!("Part one. and part two.", text[0]);

    Ok(())
}
