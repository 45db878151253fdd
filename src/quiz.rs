// Quiz view model. The server runs the quiz between chess turns: one side answers a question,
// the other waits. When the server goes back to chess the view shows who won the battle and
// returns to the board after a short delay.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use instant::Instant;

use crate::clock::secs_to_duration;
use crate::config::ClientConfig;
use crate::event::{ClientEvent, QuizPayload, ServerEvent, ServerPhase};
use crate::force::Force;
use crate::session::Session;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QuizAnswerError {
    NoQuestion,
    NotYourTurn,
    AlreadyAnswered,
    TimeUp,
    NoSuchChoice,
    QuizOver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnswerFeedback {
    Correct,
    Wrong,
    // The server did not tell us the right answer.
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QuizResult {
    Victory,
    Defeat,
    // Spectators, or nothing was asked.
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QuizStatus {
    WaitingForQuestion,
    Question,
    Finished(QuizResult),
}

#[derive(Clone, PartialEq, Debug)]
pub enum QuizNotableEvent {
    QuestionShown,
    TimeUp,
    Finished(QuizResult),
    ReturnToBoard(Session),
}

#[derive(Clone, PartialEq, Debug)]
pub struct QuizQuestion {
    pub text: Option<String>,
    pub choices: Vec<String>,
    pub current_side: Force,
    pub correct_index: Option<usize>,
    pub timer: Duration,
    started_at: Instant,
    answer: Option<usize>,
    time_up: bool,
}

#[derive(Clone, Copy, Debug)]
struct QuizEnding {
    return_at: Instant,
    fired: bool,
}

#[derive(Debug)]
pub struct QuizView {
    session: Session,
    default_timer: Duration,
    return_delay: Duration,
    status: QuizStatus,
    question: Option<QuizQuestion>,
    ending: Option<QuizEnding>,
    notable_events: VecDeque<QuizNotableEvent>,
}

impl fmt::Display for QuizAnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            QuizAnswerError::NoQuestion => "there is no question yet",
            QuizAnswerError::NotYourTurn => "the other side is answering",
            QuizAnswerError::AlreadyAnswered => "already answered",
            QuizAnswerError::TimeUp => "time is up",
            QuizAnswerError::NoSuchChoice => "no such choice",
            QuizAnswerError::QuizOver => "the quiz is over",
        };
        f.write_str(msg)
    }
}

impl QuizQuestion {
    fn from_payload(payload: &QuizPayload, default_timer: Duration, now: Instant) -> Self {
        // Older servers omit the side on the first question: white answers first.
        let current_side = payload
            .current_side
            .as_deref()
            .and_then(Force::from_wire)
            .unwrap_or(Force::White);
        let timer = payload
            .timer
            .map(secs_to_duration)
            .filter(|t| !t.is_zero())
            .unwrap_or(default_timer);
        QuizQuestion {
            text: payload.question.clone(),
            choices: payload.choices.clone(),
            current_side,
            correct_index: payload.correct_index,
            timer,
            started_at: now,
            answer: None,
            time_up: false,
        }
    }

    fn same_question(&self, other: &QuizQuestion) -> bool {
        self.text == other.text
            && self.choices == other.choices
            && self.current_side == other.current_side
    }

    pub fn answer(&self) -> Option<usize> { self.answer }

    pub fn time_left(&self, now: Instant) -> Duration {
        self.timer.saturating_sub(now.saturating_duration_since(self.started_at))
    }

    // Per-choice feedback after answering: which button is right and which one was wrong.
    pub fn feedback_for(&self, index: usize) -> Option<AnswerFeedback> {
        let answer = self.answer?;
        match self.correct_index {
            Some(correct) if correct == index => Some(AnswerFeedback::Correct),
            Some(_) if answer == index => Some(AnswerFeedback::Wrong),
            Some(_) => None,
            None if answer == index => Some(AnswerFeedback::Unknown),
            None => None,
        }
    }
}

impl QuizView {
    pub fn new(session: Session, config: &ClientConfig) -> Self {
        QuizView {
            session,
            default_timer: config.default_quiz_timer,
            return_delay: config.quiz_return_delay,
            status: QuizStatus::WaitingForQuestion,
            question: None,
            ending: None,
            notable_events: VecDeque::new(),
        }
    }

    pub fn session(&self) -> &Session { &self.session }
    pub fn status(&self) -> QuizStatus { self.status }
    pub fn question(&self) -> Option<&QuizQuestion> { self.question.as_ref() }
    pub fn my_color(&self) -> Option<Force> { self.session.color }

    pub fn process_server_event(&mut self, event: ServerEvent, now: Instant) {
        let ServerEvent::State(snapshot) = event else {
            return;
        };
        match snapshot.phase {
            Some(ServerPhase::Quiz) => {}
            // The server is back to chess (or somewhere else we do not know about).
            Some(ServerPhase::Chess | ServerPhase::Lobby | ServerPhase::Unknown) => {
                self.finish(now);
                return;
            }
            // A bare quiz payload still means the quiz is on.
            None if snapshot.quiz.is_some() => {}
            None => return,
        }
        if self.ending.is_some() {
            return;
        }
        let Some(payload) = snapshot.quiz else {
            if self.question.is_none() {
                self.status = QuizStatus::WaitingForQuestion;
            }
            return;
        };
        let question = QuizQuestion::from_payload(&payload, self.default_timer, now);
        if self.question.as_ref().is_some_and(|q| q.same_question(&question)) {
            // Repeated snapshot: keep the running timer and the given answer.
            if let Some(q) = self.question.as_mut() {
                q.correct_index = question.correct_index.or(q.correct_index);
            }
            return;
        }
        log::info!("Quiz question for {}", question.current_side);
        self.question = Some(question);
        self.status = QuizStatus::Question;
        self.notable_events.push_back(QuizNotableEvent::QuestionShown);
    }

    pub fn is_my_turn(&self) -> bool {
        match (&self.question, self.session.color) {
            (Some(q), Some(color)) => q.current_side == color,
            _ => false,
        }
    }

    pub fn can_answer(&self, now: Instant) -> bool {
        self.ending.is_none()
            && self.is_my_turn()
            && self
                .question
                .as_ref()
                .is_some_and(|q| q.answer.is_none() && !q.time_left(now).is_zero())
    }

    // Accepted once per question. Returns the message to send to the server.
    pub fn answer(
        &mut self, index: usize, now: Instant,
    ) -> Result<(ClientEvent, AnswerFeedback), QuizAnswerError> {
        if self.ending.is_some() {
            return Err(QuizAnswerError::QuizOver);
        }
        let my_color = self.session.color;
        let question = self.question.as_mut().ok_or(QuizAnswerError::NoQuestion)?;
        if my_color != Some(question.current_side) {
            return Err(QuizAnswerError::NotYourTurn);
        }
        if question.answer.is_some() {
            return Err(QuizAnswerError::AlreadyAnswered);
        }
        if question.time_left(now).is_zero() {
            return Err(QuizAnswerError::TimeUp);
        }
        if index >= question.choices.len() {
            return Err(QuizAnswerError::NoSuchChoice);
        }
        question.answer = Some(index);
        let feedback = match question.correct_index {
            Some(correct) if correct == index => AnswerFeedback::Correct,
            Some(_) => AnswerFeedback::Wrong,
            None => AnswerFeedback::Unknown,
        };
        Ok((ClientEvent::QuizAnswer { answer: index.to_string() }, feedback))
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(q) = self.question.as_mut() {
            if !q.time_up && self.ending.is_none() && q.time_left(now).is_zero() {
                q.time_up = true;
                self.notable_events.push_back(QuizNotableEvent::TimeUp);
            }
        }
        if let Some(ending) = self.ending.as_mut() {
            if !ending.fired && now >= ending.return_at {
                ending.fired = true;
                let session = self.session.clone();
                self.notable_events.push_back(QuizNotableEvent::ReturnToBoard(session));
            }
        }
    }

    // Whole seconds shown in the question timer, rounded up.
    pub fn seconds_left(&self, now: Instant) -> Option<u64> {
        let q = self.question.as_ref().filter(|_| self.ending.is_none())?;
        Some(q.time_left(now).as_millis().div_ceil(1000) as u64)
    }

    // Share of the question timer still left, for progress bars.
    pub fn timer_fraction(&self, now: Instant) -> f64 {
        match &self.question {
            Some(q) if !q.timer.is_zero() => q.time_left(now).as_secs_f64() / q.timer.as_secs_f64(),
            _ => 0.0,
        }
    }

    // Title and subtitle of the overlay covering the choices, if any.
    pub fn overlay_text(&self) -> Option<(String, String)> {
        match self.status {
            QuizStatus::WaitingForQuestion => {
                Some(("Waiting for the question...".to_owned(), String::new()))
            }
            QuizStatus::Question => {
                let q = self.question.as_ref()?;
                if self.is_my_turn() {
                    None
                } else {
                    let side = match q.current_side {
                        Force::White => "White",
                        Force::Black => "Black",
                    };
                    Some(("Wait for your turn".to_owned(), format!("{side} is answering")))
                }
            }
            QuizStatus::Finished(result) => {
                let title = match result {
                    QuizResult::Victory => "You won the battle!",
                    QuizResult::Defeat => "You lost the battle!",
                    QuizResult::Unknown => "Quiz is over",
                };
                Some((title.to_owned(), "Returning to the board...".to_owned()))
            }
        }
    }

    pub fn next_notable_event(&mut self) -> Option<QuizNotableEvent> {
        self.notable_events.pop_front()
    }

    pub fn teardown(&mut self) {
        if let Some(ending) = self.ending.as_mut() {
            ending.fired = true;
        }
        if let Some(q) = self.question.as_mut() {
            q.time_up = true;
        }
    }

    // The side that was answering last is the one that lost the battle: the quiz ends when the
    // answering side gets it wrong or runs out of time.
    fn finish(&mut self, now: Instant) {
        if self.ending.is_some() {
            return;
        }
        let result = match (&self.question, self.session.color) {
            (Some(q), Some(color)) if q.current_side == color => QuizResult::Defeat,
            (Some(_), Some(_)) => QuizResult::Victory,
            _ => QuizResult::Unknown,
        };
        log::info!("Quiz finished: {result:?}");
        self.status = QuizStatus::Finished(result);
        self.ending = Some(QuizEnding { return_at: now + self.return_delay, fired: false });
        self.notable_events.push_back(QuizNotableEvent::Finished(result));
    }
}
