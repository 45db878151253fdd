// Quiz page. Same socket protocol as the board page: JS drives the socket, the core decides.

use instant::Instant;
use quiz_chess::connection::Connection;
use quiz_chess::quiz::{AnswerFeedback, QuizNotableEvent, QuizResult, QuizView};
use url::Url;
use wasm_bindgen::prelude::*;

use crate::web_document::web_document;
use crate::web_element_ext::WebElementExt;
use crate::web_error_handling::JsResult;
use crate::web_socket::{JsTransport, new_connection, page_url, parse_config};
use crate::{JsEventNavigate, rust_error};


#[wasm_bindgen]
pub struct JsEventQuestionShown {}

#[wasm_bindgen]
pub struct JsEventQuizTimeUp {}

#[wasm_bindgen]
pub struct JsEventQuizFinished {
    pub victory: Option<bool>,
}

#[wasm_bindgen]
pub struct WebQuizClient {
    connection: Connection<JsTransport>,
    view: QuizView,
    page_url: Url,
    board_page: String,
}

#[wasm_bindgen]
impl WebQuizClient {
    pub fn new_quiz_client(
        page_url: &str, board_page: &str, config_json: &str,
    ) -> JsResult<WebQuizClient> {
        let page_url = crate::parse_page_url(page_url)?;
        let config = parse_config(config_json).map_err(|err| rust_error!("{err}"))?;
        let session = crate::session_from_page(&page_url)?;
        Ok(WebQuizClient {
            connection: new_connection(&session, &config),
            view: QuizView::new(session, &config),
            page_url,
            board_page: board_page.to_owned(),
        })
    }

    pub fn connect(&mut self) { self.connection.connect(Instant::now()); }

    pub fn next_socket_open(&mut self) -> Option<String> {
        self.connection.transport_mut().take_open_request().map(String::from)
    }
    pub fn next_socket_send(&mut self) -> Option<String> {
        self.connection.transport_mut().next_outgoing()
    }
    pub fn socket_close_requested(&mut self) -> bool {
        self.connection.transport_mut().take_close_request()
    }

    pub fn on_socket_open(&mut self) { self.connection.on_open(Instant::now()); }
    pub fn on_socket_message(&mut self, text: &str) {
        if let Some(event) = self.connection.on_message(text) {
            self.view.process_server_event(event, Instant::now());
        }
    }
    pub fn on_socket_close(&mut self) { self.connection.on_close(Instant::now()); }
    pub fn on_socket_error(&mut self, message: &str) { self.connection.on_error(message); }

    pub fn answer(&mut self, index: usize) -> JsResult<()> {
        let (event, _) = self
            .view
            .answer(index, Instant::now())
            .map_err(|err| rust_error!("Cannot answer: {err}"))?;
        self.connection.send(&event);
        Ok(())
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        self.connection.tick(now);
        self.view.tick(now);
    }

    pub fn next_notable_event(&mut self) -> JsResult<JsValue> {
        let Some(event) = self.view.next_notable_event() else {
            return Ok(JsValue::NULL);
        };
        match event {
            QuizNotableEvent::QuestionShown => Ok(JsEventQuestionShown {}.into()),
            QuizNotableEvent::TimeUp => Ok(JsEventQuizTimeUp {}.into()),
            QuizNotableEvent::Finished(result) => {
                let victory = match result {
                    QuizResult::Victory => Some(true),
                    QuizResult::Defeat => Some(false),
                    QuizResult::Unknown => None,
                };
                Ok(JsEventQuizFinished { victory }.into())
            }
            QuizNotableEvent::ReturnToBoard(session) => {
                let url = page_url(&self.page_url, &self.board_page, &session)
                    .map_err(|err| rust_error!("{err}"))?;
                Ok(JsEventNavigate { url: url.into() }.into())
            }
        }
    }

    pub fn update_state(&self) -> JsResult<()> {
        let document = web_document()?;
        let now = Instant::now();
        let question = self.view.question();

        let question_node = document.get_existing_element_by_id("quiz-question")?;
        question_node.set_text_content(question.and_then(|q| q.text.as_deref()));

        let choices_node = document.get_existing_element_by_id("quiz-choices")?;
        choices_node.remove_all_children();
        if let Some(q) = question {
            let can_answer = self.view.can_answer(now);
            for (index, choice) in q.choices.iter().enumerate() {
                let button = choices_node
                    .append_new_element("button")?
                    .with_text_content(choice)
                    .with_attribute("data-index", &index.to_string())?;
                if !can_answer {
                    button.set_attribute("disabled", "")?;
                }
                let feedback = q.feedback_for(index);
                button.set_class("correct", feedback == Some(AnswerFeedback::Correct))?;
                button.set_class("wrong", feedback == Some(AnswerFeedback::Wrong))?;
                button.set_class("chosen", q.answer() == Some(index))?;
            }
        }

        let timer_node = document.get_existing_element_by_id("quiz-timer")?;
        let seconds_left = self.view.seconds_left(now);
        timer_node.set_text_content(seconds_left.map(|s| s.to_string()).as_deref());
        timer_node.set_class("quiz-timer-low", seconds_left.is_some_and(|s| s <= 5))?;
        if let Some(bar) = document.get_element_by_id("quiz-timer-bar") {
            let percent = (self.view.timer_fraction(now) * 100.0).clamp(0.0, 100.0);
            bar.set_attribute("style", &format!("width: {percent:.1}%"))?;
        }

        let overlay = document.get_existing_element_by_id("quiz-overlay")?;
        let overlay_text = self.view.overlay_text();
        overlay.set_displayed(overlay_text.is_some())?;
        if let Some((title, subtitle)) = overlay_text {
            let title_node = document.get_existing_element_by_id("quiz-overlay-title")?;
            title_node.set_text_content(Some(&title));
            let subtitle_node = document.get_existing_element_by_id("quiz-overlay-subtitle")?;
            subtitle_node.set_text_content(Some(&subtitle));
        }
        Ok(())
    }

    pub fn teardown(&mut self) {
        self.view.teardown();
        self.connection.teardown();
    }
}
