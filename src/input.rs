use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::Rect;

use crate::stimulus::{Arena, Point};

/// What a key means to the shell, before it knows which game is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Space: hit whatever is up.
    Tap,
    /// `x`: tap empty space.
    Background,
    Digit(u8),
    Enter,
    Backspace,
    Retry,
    Share,
    Quit,
}

pub fn command_for(key: KeyEvent) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Command::Quit);
    }
    match key.code {
        KeyCode::Char(' ') => Some(Command::Tap),
        KeyCode::Enter => Some(Command::Enter),
        KeyCode::Backspace => Some(Command::Backspace),
        KeyCode::Esc => Some(Command::Quit),
        KeyCode::Char(c) if c.is_ascii_digit() => Some(Command::Digit(c as u8 - b'0')),
        KeyCode::Char('x') => Some(Command::Background),
        KeyCode::Char('r') => Some(Command::Retry),
        KeyCode::Char('s') => Some(Command::Share),
        _ => None,
    }
}

/// Map a clicked terminal cell inside `area` to arena coordinates (cell centre)
pub fn cell_to_arena(area: Rect, column: u16, row: u16, arena: Arena) -> Option<Point> {
    if area.width == 0
        || area.height == 0
        || column < area.x
        || row < area.y
        || column >= area.x + area.width
        || row >= area.y + area.height
    {
        return None;
    }
    let fx = (column - area.x) as f64 + 0.5;
    let fy = (row - area.y) as f64 + 0.5;
    Some(Point::new(
        fx / area.width as f64 * arena.width,
        fy / area.height as f64 * arena.height,
    ))
}

/// Terminal cell an arena point is drawn in
pub fn arena_to_cell(area: Rect, point: Point, arena: Arena) -> (u16, u16) {
    let scale = |v: f64, extent: f64, cells: u16| -> u16 {
        if extent <= 0.0 || cells == 0 {
            return 0;
        }
        ((v / extent * cells as f64).floor().max(0.0) as u16).min(cells - 1)
    };
    (
        area.x + scale(point.x, arena.width, area.width),
        area.y + scale(point.y, arena.height, area.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for(key(KeyCode::Char(' '))), Some(Command::Tap));
        assert_eq!(command_for(key(KeyCode::Char('7'))), Some(Command::Digit(7)));
        assert_eq!(command_for(key(KeyCode::Char('x'))), Some(Command::Background));
        assert_eq!(command_for(key(KeyCode::Esc)), Some(Command::Quit));
        assert_eq!(
            command_for(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(command_for(key(KeyCode::Char('q'))), None);
    }

    #[test]
    fn clicks_land_in_arena_space() {
        let area = Rect::new(10, 5, 80, 20);
        let arena = Arena::new(800.0, 600.0);
        assert_eq!(cell_to_arena(area, 9, 5, arena), None);
        assert_eq!(cell_to_arena(area, 90, 5, arena), None);

        let p = cell_to_arena(area, 10, 5, arena).unwrap();
        assert_eq!(p, Point::new(5.0, 15.0));
        assert_eq!(arena_to_cell(area, p, arena), (10, 5));

        let far = cell_to_arena(area, 89, 24, arena).unwrap();
        assert_eq!(arena_to_cell(area, far, arena), (89, 24));
    }
}
