use std::sync::Arc;

use log::{debug, warn};
use teloxide::{
    prelude::*,
    types::{
        ChatAction, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    },
    utils::command::BotCommands,
};

use crate::config::Provider;
use crate::quiz::{session::QuizError, Catalog, Question};
use crate::tutor::content::GenerationRequest;
use crate::tutor::prompt::{build_quiz_prompt, build_tutorial_prompt, Category, Level};
use crate::tutor::translate::{is_default_language, is_valid_language_code};
use crate::tutor::Tutor;
use crate::{HandlerResult, Session, State, TutorDialogue};

/// Telegram measures message length in UTF-16 code units.
const MESSAGE_LIMIT: usize = 4096;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start over with a new session.")]
    Start,
    #[command(description = "show this text and the FAQ.")]
    Help,
    #[command(description = "go back to the main menu.")]
    Menu,
    #[command(description = "use your own API key in this chat, e.g. /apikey AIza...")]
    ApiKey(String),
    #[command(description = "translate lessons, e.g. /language es (en turns it off).")]
    Language(String),
}

const GREETING_TEXT: &str = "💻 Hi! I'm the Computer Skills Tutor. I write tutorials on computer skills for professionals at your level, and I can quiz you on the basics.";

const FAQ_TEXT: &str = "❓ How does this bot work?
It uses a hosted language model to generate tutorials and guides for various computer skills. You provide the skill and your proficiency level, and the bot generates content tailored to your needs.

❓ Is the generated content always accurate?
No. It is based on the information provided and is not guaranteed to be accurate or comprehensive. Use it as a supplement to other learning resources.

❓ How can I get a Google Gemini API key?
Sign up at https://makersuite.google.com/app/home and send the key with /apikey.

Disclaimer: this bot is intended for educational purposes only. The developers are not responsible for any errors or omissions in the generated content.";

const TUTORIALS: &str = "🎓 Tutorials";
const COURSES: &str = "📚 Courses";
const QUIZ_GENERATOR: &str = "📝 Generate a quiz";
const BACK: &str = "⬅️ Menu";

const LESSON: &str = "📖 Lesson";
const TAKE_QUIZ: &str = "✏️ Take quiz";
const SUBMIT: &str = "✅ Submit answers";

const DEFAULT_QUIZ_TOPIC: &str = "Excel basics";

fn missing_key_text(provider: Provider) -> String {
    format!(
        "⚠️ No API key is configured. Send /apikey followed by your key to enable tutorials (the bot expects {}).",
        provider.key_variable()
    )
}

pub async fn command(
    bot: Bot,
    dialogue: TutorDialogue,
    msg: Message,
    cmd: Command,
    tutor: Arc<Tutor>,
) -> HandlerResult {
    match cmd {
        Command::Start => start(bot, dialogue, msg, tutor).await,
        Command::Help => {
            bot.send_message(
                msg.chat.id,
                format!("{}\n\n{}", Command::descriptions(), FAQ_TEXT),
            )
            .await?;
            Ok(())
        }
        Command::Menu => {
            let session = dialogue.get().await?.unwrap_or_default().into_session();
            back_to_menu(&bot, &dialogue, msg.chat.id, session).await
        }
        Command::ApiKey(key) => receive_api_key(bot, dialogue, msg, key, tutor).await,
        Command::Language(code) => receive_language(bot, dialogue, msg, code).await,
    }
}

pub async fn start(
    bot: Bot,
    dialogue: TutorDialogue,
    msg: Message,
    tutor: Arc<Tutor>,
) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;

    if !tutor.has_credential(None) {
        bot.send_message(msg.chat.id, missing_key_text(tutor.settings().provider))
            .await?;
    }

    back_to_menu(&bot, &dialogue, msg.chat.id, Session::default()).await
}

async fn receive_api_key(
    bot: Bot,
    dialogue: TutorDialogue,
    msg: Message,
    key: String,
    tutor: Arc<Tutor>,
) -> HandlerResult {
    // The key should not linger in the chat history
    if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
        debug!("Could not delete the message holding an API key: {}", e);
    }

    let key = key.trim().to_string();
    if key.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /apikey <your API key>")
            .await?;
        return Ok(());
    }

    let provider = tutor.settings().provider;
    let reply = if provider.looks_like_key(&key) {
        "✅ API key saved for this chat.".to_string()
    } else {
        "⚠️ That does not look like a valid API key. It was saved anyway; generation will report an error if it is wrong.".to_string()
    };

    let state = dialogue.get().await?.unwrap_or_default();
    let update = update_session(state, |session| session.api_key = Some(key));
    finish_update(&bot, &dialogue, msg.chat.id, update, reply).await
}

async fn receive_language(
    bot: Bot,
    dialogue: TutorDialogue,
    msg: Message,
    code: String,
) -> HandlerResult {
    let code = code.trim();
    let mut state = dialogue.get().await?.unwrap_or_default();

    if code.is_empty() {
        let current = state
            .session_mut()
            .map(|s| s.language.clone())
            .unwrap_or_else(|| Session::default().language);
        bot.send_message(
            msg.chat.id,
            format!(
                "Lessons are shown in \"{}\". Usage: /language <code>, e.g. /language es",
                current
            ),
        )
        .await?;
        return Ok(());
    }

    if !is_valid_language_code(code) {
        bot.send_message(
            msg.chat.id,
            format!("\"{}\" is not a language code. Try something like es, fr or uk.", code),
        )
        .await?;
        return Ok(());
    }

    let update = update_session(state, |session| session.language = code.to_string());

    let reply = if is_default_language(code) {
        "Lessons will be shown in English.".to_string()
    } else {
        format!("Lessons will be translated to \"{}\".", code)
    };
    finish_update(&bot, &dialogue, msg.chat.id, update, reply).await
}

/// Outcome of changing a setting from a command.
#[derive(Debug)]
enum SessionUpdate {
    /// The chat was mid-flow; it stays on the same step.
    Kept(State),
    /// The chat had no session yet and now gets one at the menu.
    Opened(Session),
}

fn update_session(state: State, edit: impl FnOnce(&mut Session)) -> SessionUpdate {
    match state {
        State::Start => {
            let mut session = Session::default();
            edit(&mut session);
            SessionUpdate::Opened(session)
        }
        mut state => {
            if let Some(session) = state.session_mut() {
                edit(session);
            }
            SessionUpdate::Kept(state)
        }
    }
}

async fn finish_update(
    bot: &Bot,
    dialogue: &TutorDialogue,
    chat_id: ChatId,
    update: SessionUpdate,
    reply: String,
) -> HandlerResult {
    match update {
        SessionUpdate::Kept(state) => {
            dialogue.update(state).await?;
            bot.send_message(chat_id, reply).await?;
            Ok(())
        }
        SessionUpdate::Opened(session) => {
            bot.send_message(chat_id, reply).await?;
            back_to_menu(bot, dialogue, chat_id, session).await
        }
    }
}

pub async fn menu(
    bot: Bot,
    dialogue: TutorDialogue,
    session: Session,
    msg: Message,
    catalog: Arc<Catalog>,
) -> HandlerResult {
    match msg.text() {
        Some(TUTORIALS) => {
            bot.send_message(msg.chat.id, "Which kind of skill would you like to learn?")
                .reply_markup(category_keyboard())
                .await?;
            dialogue.update(State::ReceiveCategory(session)).await?;
        }
        Some(COURSES) => {
            bot.send_message(msg.chat.id, "Pick a course:")
                .reply_markup(course_keyboard(&catalog))
                .await?;
            dialogue.update(State::ReceiveCourse(session)).await?;
        }
        Some(QUIZ_GENERATOR) => {
            bot.send_message(
                msg.chat.id,
                "Enter the topic for the quiz (e.g., Excel basics, safe browsing):",
            )
            .reply_markup(suggestion_keyboard(DEFAULT_QUIZ_TOPIC))
            .await?;
            dialogue.update(State::ReceiveQuizTopic(session)).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .reply_markup(menu_keyboard())
                .await?;
        }
    }
    Ok(())
}

pub async fn receive_category(
    bot: Bot,
    dialogue: TutorDialogue,
    session: Session,
    msg: Message,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == BACK {
        return back_to_menu(&bot, &dialogue, msg.chat.id, session).await;
    }

    match Category::from_button(text) {
        Some(category) => {
            bot.send_message(msg.chat.id, category.hint())
                .reply_markup(suggestion_keyboard(category.default_skill()))
                .await?;
            dialogue
                .update(State::ReceiveSkill { session, category })
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please choose one of the categories")
                .reply_markup(category_keyboard())
                .await?;
        }
    }
    Ok(())
}

pub async fn receive_skill(
    bot: Bot,
    dialogue: TutorDialogue,
    (session, category): (Session, Category),
    msg: Message,
) -> HandlerResult {
    let skill = match msg.text() {
        Some(BACK) => return back_to_menu(&bot, &dialogue, msg.chat.id, session).await,
        Some(text) => text.trim().to_string(),
        None => {
            bot.send_message(msg.chat.id, "Please send the skill as text")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, "Select your proficiency level:")
        .reply_markup(level_keyboard())
        .await?;
    dialogue
        .update(State::ReceiveLevel {
            session,
            category,
            skill,
        })
        .await?;
    Ok(())
}

pub async fn receive_level(
    bot: Bot,
    dialogue: TutorDialogue,
    (session, category, skill): (Session, Category, String),
    msg: Message,
    tutor: Arc<Tutor>,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == BACK {
        return back_to_menu(&bot, &dialogue, msg.chat.id, session).await;
    }

    let level: Level = match text.parse() {
        Ok(level) => level,
        Err(_) => {
            bot.send_message(msg.chat.id, "Please choose one of the levels")
                .reply_markup(level_keyboard())
                .await?;
            return Ok(());
        }
    };

    let prompt = build_tutorial_prompt(&skill, level, category.label());
    send_generated(
        &bot,
        msg.chat.id,
        &tutor,
        &session,
        GenerationRequest::tutorial(prompt),
        "Your tutorial:",
    )
    .await?;

    back_to_menu(&bot, &dialogue, msg.chat.id, session).await
}

pub async fn receive_quiz_topic(
    bot: Bot,
    dialogue: TutorDialogue,
    session: Session,
    msg: Message,
    tutor: Arc<Tutor>,
) -> HandlerResult {
    let topic = match msg.text() {
        Some(BACK) => return back_to_menu(&bot, &dialogue, msg.chat.id, session).await,
        Some(text) => text.trim().to_string(),
        None => {
            bot.send_message(msg.chat.id, "Please send the topic as text")
                .await?;
            return Ok(());
        }
    };

    send_generated(
        &bot,
        msg.chat.id,
        &tutor,
        &session,
        GenerationRequest::quiz(build_quiz_prompt(&topic)),
        "Your quiz:",
    )
    .await?;

    back_to_menu(&bot, &dialogue, msg.chat.id, session).await
}

pub async fn receive_course(
    bot: Bot,
    dialogue: TutorDialogue,
    mut session: Session,
    msg: Message,
    catalog: Arc<Catalog>,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == BACK {
        return back_to_menu(&bot, &dialogue, msg.chat.id, session).await;
    }

    let course = match catalog.get(text) {
        Some(course) => course,
        None => {
            bot.send_message(msg.chat.id, "Please choose one of the courses")
                .reply_markup(course_keyboard(&catalog))
                .await?;
            return Ok(());
        }
    };

    // Quiz mode and earlier answers are kept when the course changes
    session.course = Some(course.name.clone());

    bot.send_message(
        msg.chat.id,
        format!(
            "📚 {}\nRead the lesson, then take the quiz ({} questions).",
            course.name,
            course.questions.len()
        ),
    )
    .reply_markup(course_actions_keyboard())
    .await?;
    dialogue.update(State::Course(session)).await?;
    Ok(())
}

pub async fn course_action(
    bot: Bot,
    dialogue: TutorDialogue,
    mut session: Session,
    msg: Message,
    tutor: Arc<Tutor>,
    catalog: Arc<Catalog>,
) -> HandlerResult {
    let text = msg.text().unwrap_or_default();
    if text == BACK {
        return back_to_menu(&bot, &dialogue, msg.chat.id, session).await;
    }

    let (position, course) = match session
        .course
        .as_deref()
        .and_then(|name| Some((catalog.position(name)?, catalog.get(name)?)))
    {
        Some(found) => found,
        None => {
            bot.send_message(msg.chat.id, "Pick a course:")
                .reply_markup(course_keyboard(&catalog))
                .await?;
            dialogue.update(State::ReceiveCourse(session)).await?;
            return Ok(());
        }
    };

    match text {
        LESSON => {
            send_generated(
                &bot,
                msg.chat.id,
                &tutor,
                &session,
                GenerationRequest::tutorial(course.lesson_prompt.clone()),
                &format!("Lesson: {}", course.name),
            )
            .await?;
        }
        TAKE_QUIZ => {
            session.quiz.activate();
            for (index, question) in course.questions.iter().enumerate() {
                bot.send_message(
                    msg.chat.id,
                    format!("Question {}: {}", index + 1, question.text),
                )
                .reply_markup(question_keyboard(
                    position,
                    index,
                    question,
                    session.quiz.selected(index),
                ))
                .await?;
            }
            bot.send_message(
                msg.chat.id,
                format!("Pick your answers, then press \"{}\".", SUBMIT),
            )
            .await?;
            dialogue.update(State::Course(session)).await?;
        }
        SUBMIT => match session.quiz.submit(course) {
            Ok(score) => {
                debug!(
                    "Quiz on {} scored {} with {} answers picked",
                    course.name,
                    score,
                    session.quiz.answered()
                );
                bot.send_message(msg.chat.id, score.to_string()).await?;
            }
            Err(QuizError::NotActive) => {
                bot.send_message(msg.chat.id, format!("Press \"{}\" first.", TAKE_QUIZ))
                    .await?;
            }
        },
        _ => {
            bot.send_message(msg.chat.id, "Please choose one of the options")
                .reply_markup(course_actions_keyboard())
                .await?;
        }
    }
    Ok(())
}

pub async fn receive_answer(
    bot: Bot,
    dialogue: TutorDialogue,
    mut session: Session,
    q: CallbackQuery,
    catalog: Arc<Catalog>,
) -> HandlerResult {
    let data = q.data.as_deref().and_then(AnswerData::parse);
    let current = session.course.as_deref().and_then(|name| catalog.position(name));

    let (data, course) = match (data, current) {
        (Some(data), Some(position)) if data.course == position => {
            match catalog.by_position(position) {
                Some(course) => (data, course),
                None => return stale_answer(bot, q).await,
            }
        }
        _ => return stale_answer(bot, q).await,
    };

    let question = match course.questions.get(data.question) {
        Some(question) => question,
        None => return stale_answer(bot, q).await,
    };
    let option = match question.options.get(data.option) {
        Some(option) => option.clone(),
        None => return stale_answer(bot, q).await,
    };

    if let Err(QuizError::NotActive) = session.quiz.select(data.question, option.clone()) {
        bot.answer_callback_query(q.id)
            .text(format!("Press \"{}\" first.", TAKE_QUIZ))
            .await?;
        return Ok(());
    }

    let keyboard = question_keyboard(data.course, data.question, question, Some(&option));
    dialogue.update(State::Course(session)).await?;

    bot.answer_callback_query(q.id.clone())
        .text(format!("Selected: {}", option))
        .await?;

    if let Some(message) = q.message {
        // Fails harmlessly when the same option is picked twice
        if let Err(e) = bot
            .edit_message_reply_markup(message.chat.id, message.id)
            .reply_markup(keyboard)
            .await
        {
            debug!("Could not mark the selected answer: {}", e);
        }
    }
    Ok(())
}

pub async fn stale_answer(bot: Bot, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id)
        .text("This question is not open anymore. Pick the course again to answer it.")
        .await?;
    Ok(())
}

async fn back_to_menu(
    bot: &Bot,
    dialogue: &TutorDialogue,
    chat_id: ChatId,
    session: Session,
) -> HandlerResult {
    bot.send_message(chat_id, "What would you like to do?")
        .reply_markup(menu_keyboard())
        .await?;
    dialogue.update(State::Menu(session)).await?;
    Ok(())
}

/// Runs one generation and renders the outcome inline; only Telegram errors escape.
async fn send_generated(
    bot: &Bot,
    chat_id: ChatId,
    tutor: &Tutor,
    session: &Session,
    request: GenerationRequest,
    heading: &str,
) -> HandlerResult {
    // We don't care if the typing indicator fails to show
    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    let result = tutor
        .lesson(
            session.api_key.as_deref(),
            &session.language,
            request,
            heading,
        )
        .await;

    match result {
        Ok(Some(lesson)) => {
            let text = format!("{}\n\n{}", lesson.heading, lesson.body);
            for chunk in split_message(&text, MESSAGE_LIMIT) {
                bot.send_message(chat_id, chunk).await?;
            }
            if let Some(notice) = lesson.notice {
                bot.send_message(chat_id, format!("ℹ️ {}", notice)).await?;
            }
        }
        Ok(None) => {}
        Err(e) => {
            warn!("Generation failed in chat {}: {}", chat_id.0, e);
            bot.send_message(chat_id, format!("⚠️ {}", e)).await?;
        }
    }
    Ok(())
}

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(TUTORIALS), KeyboardButton::new(COURSES)],
        vec![KeyboardButton::new(QUIZ_GENERATOR)],
    ])
}

fn category_keyboard() -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = Category::ALL
        .chunks(2)
        .map(|pair| pair.iter().map(|c| KeyboardButton::new(c.button())).collect())
        .collect();
    rows.push(vec![KeyboardButton::new(BACK)]);
    KeyboardMarkup::new(rows)
}

fn level_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        Level::ALL
            .iter()
            .map(|l| KeyboardButton::new(l.as_str()))
            .collect::<Vec<_>>(),
        vec![KeyboardButton::new(BACK)],
    ])
}

fn suggestion_keyboard(suggestion: &str) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(suggestion)],
        vec![KeyboardButton::new(BACK)],
    ])
}

fn course_keyboard(catalog: &Catalog) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = catalog
        .names()
        .map(|name| vec![KeyboardButton::new(name)])
        .collect();
    rows.push(vec![KeyboardButton::new(BACK)]);
    KeyboardMarkup::new(rows)
}

fn course_actions_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(LESSON), KeyboardButton::new(TAKE_QUIZ)],
        vec![KeyboardButton::new(SUBMIT)],
        vec![KeyboardButton::new(BACK)],
    ])
}

fn question_keyboard(
    course: usize,
    index: usize,
    question: &Question,
    selected: Option<&str>,
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(question.options.iter().enumerate().map(|(option, text)| {
        let label = if selected == Some(text.as_str()) {
            format!("✅ {}", text)
        } else {
            text.clone()
        };
        let data = AnswerData {
            course,
            question: index,
            option,
        };
        vec![InlineKeyboardButton::callback(label, data.encode())]
    }))
}

/// Payload of a quiz answer button: `q:{course}:{question}:{option}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AnswerData {
    course: usize,
    question: usize,
    option: usize,
}

impl AnswerData {
    fn encode(&self) -> String {
        format!("q:{}:{}:{}", self.course, self.question, self.option)
    }

    fn parse(data: &str) -> Option<Self> {
        let mut parts = data.strip_prefix("q:")?.split(':');
        let answer = Self {
            course: parts.next()?.parse().ok()?,
            question: parts.next()?.parse().ok()?,
            option: parts.next()?.parse().ok()?,
        };
        match parts.next() {
            Some(_) => None,
            None => Some(answer),
        }
    }
}

/// Splits `text` into chunks of at most `limit` UTF-16 code units, breaking at
/// line ends when possible.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len: usize = line.chars().map(char::len_utf16).sum();
        if current_len + line_len > limit && current_len > 0 {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            for c in line.chars() {
                if current_len + c.len_utf16() > limit {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(c);
                current_len += c.len_utf16();
            }
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }
    chunks.push(current);

    chunks
        .into_iter()
        .map(|chunk| chunk.trim_end().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect()
}
