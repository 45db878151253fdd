// Test utilities shared by unit tests and the "tests" folder.

use itertools::Itertools;

use url::Url;

use crate::connection::{Transport, TransportError};
use crate::coord::BoardShape;
use crate::grid::Grid;


// Parses a board drawn as whitespace-separated cells, one line per row, top row first.
// "." is an empty cell, anything else is a wire piece code ("wP", "bK", ...).
// Panics on malformed input: this is for tests only.
pub fn grid_from_ascii(board: &str) -> Grid {
    let rows = board
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.split_whitespace().collect_vec())
        .collect_vec();
    let height = rows.len();
    let width = rows.first().map_or(0, |row| row.len());
    assert!(rows.iter().all(|row| row.len() == width), "ragged board: {board}");
    let cells = rows
        .into_iter()
        .flatten()
        .map(|cell| if cell == "." { None } else { Some(cell.to_owned()) })
        .collect_vec();
    Grid::from_cells(BoardShape::new(width as u8, height as u8), &cells).unwrap()
}

// The 5x6 opening position the server uses by default. Note that white starts at the top of
// the server grid.
pub fn default_board() -> Grid {
    grid_from_ascii(
        "
        wR wQ wK wN wB
        wP wP wP wP wP
        .  .  .  .  .
        .  .  .  .  .
        bP bP bP bP bP
        bR bQ bK bN bB
        ",
    )
}

pub fn cells_json(grid: &Grid) -> serde_json::Value {
    let shape = grid.shape();
    serde_json::json!({
        "cells": grid.to_cells(),
        "width": shape.width,
        "height": shape.height,
    })
}


// Transport that never touches the network: records what the connection asks of it.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    pub opened: usize,
    pub closed: bool,
    pub fail_open: bool,
    pub sent: Vec<String>,
}

impl RecordingTransport {
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent.iter().map(|s| serde_json::from_str(s).unwrap()).collect()
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, url: &Url) -> Result<(), TransportError> {
        self.opened += 1;
        if self.fail_open {
            return Err(TransportError::Open(format!("refusing to open {url}")));
        }
        Ok(())
    }

    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sent.push(text);
        Ok(())
    }

    fn close(&mut self) { self.closed = true; }
}
