use std::time::Instant;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::domain::{Focus, Message, SiftError};
use crate::model::Model;

#[derive(Default)]
pub struct Controller;

impl Controller {
    pub fn new() -> Self {
        Self
    }

    /// Wait for the next terminal event, at most until the model's next
    /// debounced refresh is due.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, SiftError> {
        if event::poll(model.poll_timeout(Instant::now()))? {
            match event::read()? {
                Event::Key(key) if key.kind == event::KeyEventKind::Press => {
                    return Ok(self.handle_key(key, model.focus(), model.raw_keyevents()));
                }
                Event::Resize(width, height) => {
                    return Ok(Some(Message::Resize(width as usize, height as usize)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent, focus: Focus, text_input: bool) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c') | KeyCode::Char('q'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('n'), KeyModifiers::CONTROL) => Some(Message::AddFilter),
            (KeyCode::Char('d'), KeyModifiers::CONTROL) => Some(Message::RemoveFilter),
            (KeyCode::Char('y'), KeyModifiers::CONTROL) => Some(Message::CopyRow),
            (KeyCode::F(1), _) => Some(Message::Help),
            (KeyCode::F(2), _) => Some(Message::ToggleCaseSensitive),
            (KeyCode::F(3), _) => Some(Message::ToggleRegex),
            (KeyCode::F(4), _) => Some(Message::ToggleMatchMode),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Tab, _) => Some(Message::FocusNext),
            (KeyCode::BackTab, _) => Some(Message::FocusPrev),
            (KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::PageUp, _) => Some(Message::MovePageUp),
            (KeyCode::PageDown, _) => Some(Message::MovePageDown),
            (KeyCode::Home, KeyModifiers::CONTROL) => Some(Message::MoveBeginning),
            (KeyCode::End, KeyModifiers::CONTROL) => Some(Message::MoveEnd),
            (KeyCode::Left, _) if !focus.is_text_input() => Some(Message::PrevColumn),
            (KeyCode::Right, _) if !focus.is_text_input() => Some(Message::NextColumn),
            (KeyCode::Home, _) if !text_input => Some(Message::MoveBeginning),
            (KeyCode::End, _) if !text_input => Some(Message::MoveEnd),
            _ if text_input => Some(Message::Edit(key)),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn typing_goes_to_the_focused_input() {
        let c = Controller::new();
        let k = key(KeyCode::Char('q'));
        assert_eq!(c.handle_key(k, Focus::Search, true), Some(Message::Edit(k)));
        let left = key(KeyCode::Left);
        assert_eq!(
            c.handle_key(left, Focus::FilterQuery(0), true),
            Some(Message::Edit(left))
        );
    }

    #[test]
    fn arrows_cycle_selectors() {
        let c = Controller::new();
        assert_eq!(
            c.handle_key(key(KeyCode::Right), Focus::SearchColumn, false),
            Some(Message::NextColumn)
        );
        assert_eq!(
            c.handle_key(key(KeyCode::Left), Focus::FilterColumn(1), false),
            Some(Message::PrevColumn)
        );
        assert_eq!(c.handle_key(key(KeyCode::Char('x')), Focus::SearchColumn, false), None);
    }

    #[test]
    fn control_chords() {
        let c = Controller::new();
        assert_eq!(c.handle_key(ctrl('c'), Focus::Search, true), Some(Message::Quit));
        assert_eq!(c.handle_key(ctrl('n'), Focus::Search, true), Some(Message::AddFilter));
        assert_eq!(
            c.handle_key(ctrl('d'), Focus::FilterQuery(0), true),
            Some(Message::RemoveFilter)
        );
        assert_eq!(c.handle_key(ctrl('y'), Focus::Search, true), Some(Message::CopyRow));
    }

    #[test]
    fn function_keys_toggle_options() {
        let c = Controller::new();
        assert_eq!(
            c.handle_key(key(KeyCode::F(2)), Focus::Search, true),
            Some(Message::ToggleCaseSensitive)
        );
        assert_eq!(
            c.handle_key(key(KeyCode::F(3)), Focus::Search, true),
            Some(Message::ToggleRegex)
        );
        assert_eq!(
            c.handle_key(key(KeyCode::F(4)), Focus::Search, true),
            Some(Message::ToggleMatchMode)
        );
    }

    #[test]
    fn home_and_end_edit_text_inputs() {
        let c = Controller::new();
        let home = key(KeyCode::Home);
        assert_eq!(c.handle_key(home, Focus::Search, true), Some(Message::Edit(home)));
        assert_eq!(
            c.handle_key(home, Focus::SearchColumn, false),
            Some(Message::MoveBeginning)
        );
        assert_eq!(
            c.handle_key(KeyEvent::new(KeyCode::End, KeyModifiers::CONTROL), Focus::Search, true),
            Some(Message::MoveEnd)
        );
    }
}
