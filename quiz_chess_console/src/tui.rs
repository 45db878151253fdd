// Improvement potential. Use `crossterm` instead (fix: for some reason rendering
//   background was more buggy with it).

use console::Style;
use instant::Instant;
use itertools::Itertools;
use quiz_chess::client::ClientState;
use quiz_chess::clock::ClockShowing;
use quiz_chess::coord::BoardShape;
use quiz_chess::display::{DisplayCoord, DisplayPlayer, from_display_coord, get_display_force};
use quiz_chess::piece::piece_to_pictogram;
use quiz_chess::quiz::{AnswerFeedback, QuizView};


const CONSOLE_LINES_SHOWN: usize = 5;

fn render_clock(showing: ClockShowing) -> (String, usize) {
    let mut clock_str = showing.ui_string();
    let clock_str_len = clock_str.len();
    if showing.out_of_time {
        clock_str = Style::new().on_red().apply_to(clock_str).to_string();
    } else if showing.is_active {
        clock_str = Style::new().reverse().apply_to(clock_str).to_string();
    }
    (clock_str, clock_str_len)
}

fn render_header(
    client: &ClientState, player: DisplayPlayer, now: Instant, board_width: usize,
) -> String {
    let force = get_display_force(player, client.my_color());
    let (clock_str, clock_str_len) = render_clock(client.clock_showing(force, now));
    let name = client.display_name(player);
    let name_len = name.chars().count();
    let space = " ".repeat(board_width.saturating_sub(clock_str_len + name_len));
    format!("{clock_str}{space}{name}\n")
}

fn render_grid(client: &ClientState) -> String {
    let Some(grid) = client.grid() else {
        return "Loading...\n".to_owned();
    };
    let colors = [
        Style::new().color256(233).on_color256(222),
        Style::new().color256(233).on_color256(230),
    ];
    let selected = Style::new().color256(233).on_color256(117);
    let preview = Style::new().color256(233).on_color256(151);
    let check = Style::new().color256(233).on_color256(210);
    let shape = grid.shape();
    let orientation = client.orientation();
    let selection = client.selection().map(|sel| sel.origin);
    let check_king = client.check_king();
    let mut ret = String::new();
    for y in (-1)..=(shape.height as i32) {
        for x in (-1)..=(shape.width as i32) {
            let row_header = x < 0 || x >= shape.width.into();
            let col_header = y < 0 || y >= shape.height.into();
            let square = match (row_header, col_header) {
                (true, true) => format_square(' '),
                (true, false) => format_square(row_label(y as u8, shape)),
                (false, true) => format_square(col_label(x as u8)),
                (false, false) => {
                    let display_coord = DisplayCoord { x: x as u8, y: y as u8 };
                    let Some(coord) = from_display_coord(display_coord, shape, orientation) else {
                        continue;
                    };
                    let style = if Some(coord) == selection {
                        &selected
                    } else if client.preview().contains(&coord) {
                        &preview
                    } else if Some(coord) == check_king {
                        &check
                    } else {
                        &colors[usize::from((coord.x + coord.y) % 2)]
                    };
                    let ch = grid.piece_at(coord).map_or(' ', piece_to_pictogram);
                    style.apply_to(format_square(ch)).to_string()
                }
            };
            ret.push_str(&square);
        }
        ret.push('\n');
    }
    ret
}

pub fn render_board_view(client: &ClientState, now: Instant) -> String {
    let board_width = client.grid().map_or(0, |grid| (grid.shape().width as usize + 2) * 3);
    let mut ret = format!(
        "{}{}{}\n",
        render_header(client, DisplayPlayer::Top, now, board_width),
        render_grid(client),
        render_header(client, DisplayPlayer::Bottom, now, board_width),
    );
    ret += &format!("You are: {}\n", client.role_string());
    if let Some(overlay) = client.overlay_text(now) {
        ret += &format!("{}\n", Style::new().magenta().apply_to(overlay));
    }
    ret.push('\n');
    let lines = client.console_lines().collect_vec();
    for line in &lines[lines.len().saturating_sub(CONSOLE_LINES_SHOWN)..] {
        ret += &format!("{line}\n");
    }
    ret
}

pub fn render_quiz_view(quiz: &QuizView, now: Instant) -> String {
    let mut ret = String::new();
    if let Some(question) = quiz.question() {
        ret += &format!("{}\n\n", question.text.as_deref().unwrap_or("?"));
        for (idx, choice) in question.choices.iter().enumerate() {
            let line = format!("  {}. {}", idx + 1, choice);
            let line = match question.feedback_for(idx) {
                Some(AnswerFeedback::Correct) => Style::new().green().apply_to(line).to_string(),
                Some(AnswerFeedback::Wrong) => Style::new().red().apply_to(line).to_string(),
                Some(AnswerFeedback::Unknown) => Style::new().reverse().apply_to(line).to_string(),
                None => line,
            };
            ret += &format!("{line}\n");
        }
        if let Some(seconds) = quiz.seconds_left(now) {
            ret += &format!("\nTime left: {seconds}s\n");
        }
    }
    if let Some((title, subtitle)) = quiz.overlay_text() {
        ret += &format!("\n{}\n{subtitle}\n", Style::new().magenta().apply_to(title));
    }
    ret
}

// Squares are typed the way they are labeled on screen: column letter, then row number counted
// from the bottom of the screen.
pub fn parse_square(input: &str, shape: BoardShape) -> Option<DisplayCoord> {
    let mut chars = input.trim().chars();
    let col = chars.next()?.to_ascii_lowercase();
    if !col.is_ascii_lowercase() {
        return None;
    }
    let x = u8::try_from(u32::from(col) - u32::from('a')).ok()?;
    let row: u8 = chars.as_str().parse().ok()?;
    if x >= shape.width || row == 0 || row > shape.height {
        return None;
    }
    Some(DisplayCoord { x, y: shape.height - row })
}

fn col_label(x: u8) -> char { char::from(b'a' + x) }

fn row_label(y: u8, shape: BoardShape) -> char {
    char::from_digit(u32::from(shape.height - y), 36).unwrap_or('?')
}

fn format_square(ch: char) -> String { format!(" {ch} ") }


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn square_names() {
        let shape = BoardShape::new(5, 6);
        assert_eq!(parse_square("a1", shape), Some(DisplayCoord { x: 0, y: 5 }));
        assert_eq!(parse_square(" E6 ", shape), Some(DisplayCoord { x: 4, y: 0 }));
        assert_eq!(parse_square("f1", shape), None);
        assert_eq!(parse_square("a7", shape), None);
        assert_eq!(parse_square("a0", shape), None);
        assert_eq!(parse_square("1a", shape), None);
        assert_eq!(parse_square("", shape), None);
        assert_eq!(row_label(0, shape), '6');
        assert_eq!(col_label(4), 'e');
    }
}
