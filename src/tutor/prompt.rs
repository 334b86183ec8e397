use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown proficiency level \"{0}\"")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// The skill areas a tutorial can be requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Category {
    OfficeSkills,
    InternetSkills,
    Troubleshooting,
    ResearchSkills,
    DesignSkills,
    DataAnalysis,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::OfficeSkills,
        Category::InternetSkills,
        Category::Troubleshooting,
        Category::ResearchSkills,
        Category::DesignSkills,
        Category::DataAnalysis,
    ];

    /// Name embedded into the prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Category::OfficeSkills => "Office Skills",
            Category::InternetSkills => "Internet Skills",
            Category::Troubleshooting => "Troubleshooting",
            Category::ResearchSkills => "Research Skills",
            Category::DesignSkills => "Design Skills",
            Category::DataAnalysis => "Data Analysis",
        }
    }

    pub fn button(&self) -> &'static str {
        match self {
            Category::OfficeSkills => "📝 Basic Office Skills",
            Category::InternetSkills => "🌐 Internet Skills",
            Category::Troubleshooting => "🔧 Troubleshooting",
            Category::ResearchSkills => "🔍 Research Skills",
            Category::DesignSkills => "🎨 Design Skills",
            Category::DataAnalysis => "📈 Data Analysis",
        }
    }

    pub fn from_button(text: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.button() == text)
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Category::OfficeSkills => {
                "Enter the office skill you want to learn (e.g., Excel basics, Word formatting):"
            }
            Category::InternetSkills => {
                "Enter the internet skill you want to learn (e.g., safe browsing, effective searching):"
            }
            Category::Troubleshooting => {
                "Enter the issue you want to troubleshoot (e.g., computer won't start, slow internet):"
            }
            Category::ResearchSkills => {
                "Enter the research skill you want to learn (e.g., literature review, data analysis):"
            }
            Category::DesignSkills => {
                "Enter the design skill you want to learn (e.g., graphic design, UI/UX):"
            }
            Category::DataAnalysis => {
                "Enter the data analysis skill you want to learn (e.g., data visualization, statistical analysis):"
            }
        }
    }

    pub fn default_skill(&self) -> &'static str {
        match self {
            Category::OfficeSkills => "Excel basics",
            Category::InternetSkills => "safe browsing",
            Category::Troubleshooting => "slow internet",
            Category::ResearchSkills => "literature review",
            Category::DesignSkills => "graphic design",
            Category::DataAnalysis => "data visualization",
        }
    }
}

pub fn build_tutorial_prompt(topic: &str, level: Level, category: &str) -> String {
    format!(
        "Create a tutorial for {} for a {} level professional in the category of {}.",
        topic, level, category
    )
}

pub fn build_quiz_prompt(topic: &str) -> String {
    format!(
        "Generate a quiz on {} with 5 multiple-choice questions.",
        topic
    )
}
