//! Error type returned by all fallible operations of the runtime.
use std::error::Error;
use std::fmt;

/// Errors that can occur while loading or running a story.
#[derive(Debug)]
pub enum StoryError {
    /// The story reached an internally inconsistent state, either through a
    /// runtime error in the ink itself or a corrupted save.
    InvalidStoryState(String),
    /// The compiled story JSON or a saved state could not be decoded.
    BadJson(String),
    /// The host called the API with an invalid argument.
    BadArgument(String),
}

impl StoryError {
    pub fn get_message(&self) -> &str {
        match self {
            StoryError::InvalidStoryState(desc)
            | StoryError::BadJson(desc)
            | StoryError::BadArgument(desc) => desc,
        }
    }
}

impl fmt::Display for StoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryError::InvalidStoryState(desc) => write!(f, "Invalid story state: {desc}"),
            StoryError::BadJson(desc) => write!(f, "Error parsing JSON: {desc}"),
            StoryError::BadArgument(desc) => write!(f, "Bad argument: {desc}"),
        }
    }
}

impl Error for StoryError {}

impl From<std::io::Error> for StoryError {
    fn from(err: std::io::Error) -> Self {
        StoryError::BadJson(err.to_string())
    }
}
