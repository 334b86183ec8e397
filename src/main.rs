mod config;
mod handlers;
mod quiz;
#[cfg(test)]
mod testing;
mod tutor;

use std::sync::Arc;

use dotenv::dotenv;
use handlers::Command;
use log::{error, info, warn};
use quiz::{Catalog, QuizSession};
use teloxide::{
    dispatching::{
        dialogue::{self, ErasedStorage, InMemStorage, Storage},
        UpdateHandler,
    },
    prelude::*,
    utils::command::BotCommands,
};
use tutor::{prompt::Category, translate::DEFAULT_LANGUAGE, Tutor};

type TutorDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type HandlerResult = Result<(), HandlerError>;
type SessionStorage = std::sync::Arc<ErasedStorage<State>>;

/// Everything a chat remembers between messages.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    pub api_key: Option<String>,
    pub language: String,
    pub course: Option<String>,
    pub quiz: QuizSession,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            api_key: None,
            language: DEFAULT_LANGUAGE.to_string(),
            course: None,
            quiz: QuizSession::new(),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    Menu(Session),
    ReceiveCategory(Session),
    ReceiveSkill {
        session: Session,
        category: Category,
    },
    ReceiveLevel {
        session: Session,
        category: Category,
        skill: String,
    },
    ReceiveQuizTopic(Session),
    ReceiveCourse(Session),
    Course(Session),
}

impl State {
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        match self {
            State::Start => None,
            State::Menu(session)
            | State::ReceiveCategory(session)
            | State::ReceiveQuizTopic(session)
            | State::ReceiveCourse(session)
            | State::Course(session)
            | State::ReceiveSkill { session, .. }
            | State::ReceiveLevel { session, .. } => Some(session),
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            State::Start => Session::default(),
            State::Menu(session)
            | State::ReceiveCategory(session)
            | State::ReceiveQuizTopic(session)
            | State::ReceiveCourse(session)
            | State::Course(session)
            | State::ReceiveSkill { session, .. }
            | State::ReceiveLevel { session, .. } => session,
        }
    }
}

#[tokio::main]
async fn main() {
    let env_file = dotenv();

    pretty_env_logger::init();
    log::info!("Starting skills tutor bot...");

    if let Err(e) = env_file {
        info!("No .env file loaded ({}), using the process environment", e);
    }

    let settings = match config::Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };
    if settings.api_key.is_none() {
        warn!(
            "{} is not set; every chat will have to send its own key with /apikey",
            settings.provider.key_variable()
        );
    }

    let catalog = match Catalog::builtin() {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            error!("The built-in course catalog is invalid: {}", e);
            return;
        }
    };
    info!("Loaded {} courses", catalog.len());

    let tutor = match Tutor::new(settings) {
        Ok(tutor) => Arc::new(tutor),
        Err(e) => {
            error!("Unable to set up the HTTP client: {}", e);
            return;
        }
    };

    let bot = Bot::from_env();
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Unable to register the command list: {}", e);
    }

    let storage: SessionStorage = InMemStorage::<State>::new().erase();

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![storage, tutor, catalog])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<HandlerError> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>().endpoint(handlers::command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::Start].endpoint(handlers::start))
        .branch(case![State::Menu(session)].endpoint(handlers::menu))
        .branch(case![State::ReceiveCategory(session)].endpoint(handlers::receive_category))
        .branch(case![State::ReceiveSkill { session, category }].endpoint(handlers::receive_skill))
        .branch(
            case![State::ReceiveLevel {
                session,
                category,
                skill
            }]
            .endpoint(handlers::receive_level),
        )
        .branch(case![State::ReceiveQuizTopic(session)].endpoint(handlers::receive_quiz_topic))
        .branch(case![State::ReceiveCourse(session)].endpoint(handlers::receive_course))
        .branch(case![State::Course(session)].endpoint(handlers::course_action));

    let callback_handler = Update::filter_callback_query()
        .branch(case![State::Course(session)].endpoint(handlers::receive_answer))
        .branch(dptree::endpoint(handlers::stale_answer));

    dialogue::enter::<Update, ErasedStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_handler)
}
