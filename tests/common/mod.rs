// Rust-upgrade (https://github.com/rust-lang/rust/issues/46379):
//   remove `#[allow(dead_code)]` before public functions.

use quiz_chess::coord::Coord;
use quiz_chess::force::Force;
use quiz_chess::grid::Grid;
use quiz_chess::test_util::{cells_json, default_board};
use serde_json::{Value, json};


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Recipient {
    One(usize),
    All,
}

// Minimal stand-in for the game server. Keeps seats, board and turn; never checks move legality.
#[allow(dead_code)]
pub struct FakeServer {
    pub grid: Grid,
    pub seats: Vec<String>,
    pub phase: &'static str,
    pub turn: Force,
    pub quiz: Option<Value>,
    pub game_over: Option<Value>,
    pub timer: Option<Value>,
    pub answers: Vec<String>,
}

#[allow(dead_code)]
impl FakeServer {
    pub fn new() -> Self {
        FakeServer {
            grid: default_board(),
            seats: vec![],
            phase: "lobby",
            turn: Force::White,
            quiz: None,
            game_over: None,
            timer: None,
            answers: vec![],
        }
    }

    pub fn state_frame(&self) -> String {
        let players = self.seats.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>();
        let mut state = json!({
            "type": "state",
            "phase": self.phase,
            "board": cells_json(&self.grid),
            "players": players,
            "turn": self.turn.to_wire(),
        });
        if let Some(quiz) = &self.quiz {
            state["quiz"] = quiz.clone();
        }
        if let Some(game_over) = &self.game_over {
            state["gameOver"] = game_over.clone();
        }
        if let Some(timer) = &self.timer {
            state["timer"] = timer.clone();
        }
        state.to_string()
    }

    pub fn handle(&mut self, from: usize, raw: &str) -> Vec<(Recipient, String)> {
        let message: Value = serde_json::from_str(raw).unwrap();
        match message["type"].as_str().unwrap() {
            "join" => {
                let name = message["name"].as_str().unwrap().to_owned();
                let seat = match self.seats.iter().position(|seat| *seat == name) {
                    Some(seat) => Some(seat),
                    None if self.seats.len() < 2 => {
                        self.seats.push(name);
                        Some(self.seats.len() - 1)
                    }
                    None => None,
                };
                let role = match seat {
                    Some(0) => "player1",
                    Some(_) => "player2",
                    None => "spectator",
                };
                let assigned = json!({ "type": "Assigned", "role": role }).to_string();
                vec![(Recipient::One(from), assigned), (Recipient::All, self.state_frame())]
            }
            "move" => {
                let coord = |v: &Value| {
                    let n = |i: usize| v[i].as_u64().unwrap() as u8;
                    Coord::new(n(0), n(1))
                };
                let (from_coord, to_coord) = (coord(&message["from"]), coord(&message["to"]));
                let piece = self.grid[from_coord].take();
                self.grid[to_coord] = piece;
                self.turn = self.turn.opponent();
                let frame = json!({
                    "type": "MoveMsg",
                    "board": { "cells": self.grid.to_cells() },
                    "turn": self.turn.to_wire(),
                });
                vec![(Recipient::All, frame.to_string())]
            }
            "resign" => {
                let loser = if from == 0 { Force::White } else { Force::Black };
                self.game_over = Some(json!({
                    "winner": loser.opponent().to_wire(),
                    "reason": "resign",
                }));
                vec![(Recipient::All, self.state_frame())]
            }
            "quiz_answer" => {
                self.answers.push(message["answer"].as_str().unwrap().to_owned());
                vec![]
            }
            other => panic!("unexpected client message {other}"),
        }
    }
}
