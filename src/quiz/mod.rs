pub mod catalog;
pub mod session;

pub use catalog::Catalog;
pub use session::QuizSession;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CatalogError {
    #[error("question \"{0}\" needs at least two options")]
    TooFewOptions(String),
    #[error("question \"{question}\" has correct option \"{correct}\" which is not one of its options")]
    CorrectOptionMissing { question: String, correct: String },
    #[error("course \"{0}\" is defined twice")]
    DuplicateCourse(String),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Course {
    pub name: String,
    pub lesson_prompt: String,
    pub questions: Vec<Question>,
}

impl Course {
    pub fn new(
        name: impl Into<String>,
        lesson_prompt: impl Into<String>,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            name: name.into(),
            lesson_prompt: lesson_prompt.into(),
            questions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
    pub correct_option: String,
}

impl Question {
    /// Fails unless there are two or more options and `correct_option` is one of them.
    pub fn new<S: Into<String>>(
        text: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        correct_option: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let text = text.into();
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        let correct_option = correct_option.into();

        if options.len() < 2 {
            return Err(CatalogError::TooFewOptions(text));
        }
        if !options.contains(&correct_option) {
            return Err(CatalogError::CorrectOptionMissing {
                question: text,
                correct: correct_option,
            });
        }

        Ok(Self {
            text,
            options,
            correct_option,
        })
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_option == answer
    }
}
