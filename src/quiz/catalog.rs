use std::collections::HashSet;

use crate::quiz::{CatalogError, Course, Question};

/// Ordered, immutable set of courses, keyed by name.
#[derive(Debug, Clone)]
pub struct Catalog {
    courses: Vec<Course>,
}

impl Catalog {
    pub fn new(courses: Vec<Course>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for course in &courses {
            if !seen.insert(course.name.as_str()) {
                return Err(CatalogError::DuplicateCourse(course.name.clone()));
            }
        }
        Ok(Self { courses })
    }

    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(vec![
            Course::new(
                "Productivity Software",
                "Create a beginner-friendly lesson on productivity software. Explain what \
                 Microsoft Word, Excel and PowerPoint are used for, with one practical \
                 example for each.",
                vec![
                    Question::new(
                        "Which program would you use to write and format a letter?",
                        ["Word", "Excel", "PowerPoint"],
                        "Word",
                    )?,
                    Question::new(
                        "Which program is built for spreadsheets and formulas?",
                        ["Word", "Excel", "PowerPoint"],
                        "Excel",
                    )?,
                    Question::new(
                        "Which program would you use to build a slide presentation?",
                        ["Word", "Excel", "PowerPoint"],
                        "PowerPoint",
                    )?,
                ],
            ),
            Course::new(
                "Internet Safety",
                "Create a beginner-friendly lesson on staying safe online: strong passwords, \
                 recognising phishing emails and checking that a website uses HTTPS.",
                vec![
                    Question::new(
                        "Which of these is the strongest password?",
                        ["password123", "Summer2020", "t7#Vq!9zLm$e"],
                        "t7#Vq!9zLm$e",
                    )?,
                    Question::new(
                        "An email asks you to confirm your bank login through a link. What should you do?",
                        [
                            "Click the link and log in",
                            "Reply with your password",
                            "Contact the bank through its official website",
                        ],
                        "Contact the bank through its official website",
                    )?,
                    Question::new(
                        "What does the padlock next to a website address indicate?",
                        [
                            "The connection is encrypted",
                            "The site is free of viruses",
                            "The site is run by the government",
                        ],
                        "The connection is encrypted",
                    )?,
                ],
            ),
            Course::new(
                "Basic Troubleshooting",
                "Create a beginner-friendly lesson on basic computer troubleshooting: \
                 restarting, checking cables and connections, and closing unresponsive programs.",
                vec![
                    Question::new(
                        "Your computer feels slow. What is a good first step?",
                        ["Restart it", "Buy a new one", "Delete system files"],
                        "Restart it",
                    )?,
                    Question::new(
                        "Which tool on Windows shows programs that are not responding?",
                        ["Task Manager", "Paint", "Notepad"],
                        "Task Manager",
                    )?,
                ],
            ),
            Course::new(
                "File Management",
                "Create a beginner-friendly lesson on managing files and folders: creating \
                 folders, naming files clearly, and backing up important documents.",
                vec![
                    Question::new(
                        "Where do deleted files usually go first on a desktop computer?",
                        ["Recycle Bin", "Downloads", "Desktop"],
                        "Recycle Bin",
                    )?,
                    Question::new(
                        "Which file extension belongs to a PDF document?",
                        [".docx", ".pdf", ".xlsx"],
                        ".pdf",
                    )?,
                    Question::new(
                        "What is the safest way to protect important documents?",
                        [
                            "Keep one copy on the desktop",
                            "Keep backups in a second location",
                            "Email them to strangers",
                        ],
                        "Keep backups in a second location",
                    )?,
                ],
            ),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.courses.iter().position(|c| c.name == name)
    }

    pub fn by_position(&self, position: usize) -> Option<&Course> {
        self.courses.get(position)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.courses.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        for course in catalog.courses.iter() {
            assert!(!course.questions.is_empty(), "{} has no questions", course.name);
            for question in &course.questions {
                assert!(question.options.contains(&question.correct_option));
            }
        }
    }

    #[test]
    fn productivity_course_answers_are_word_excel_powerpoint() {
        let catalog = Catalog::builtin().unwrap();
        let course = catalog.get("Productivity Software").unwrap();
        let answers: Vec<&str> = course
            .questions
            .iter()
            .map(|q| q.correct_option.as_str())
            .collect();
        assert_eq!(answers, vec!["Word", "Excel", "PowerPoint"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let course = Course::new("Same", "Teach something", vec![]);
        let err = Catalog::new(vec![course.clone(), course]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateCourse("Same".to_string()));
    }

    #[test]
    fn lookup_by_name_and_position_agree() {
        let catalog = Catalog::builtin().unwrap();
        for (i, name) in catalog.names().enumerate() {
            assert_eq!(catalog.position(name), Some(i));
            assert_eq!(catalog.by_position(i).map(|c| c.name.as_str()), Some(name));
        }
        assert!(catalog.get("Underwater Basket Weaving").is_none());
        assert!(catalog.by_position(catalog.len()).is_none());
    }
}
