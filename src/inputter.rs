use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

/// Single line text input with a character based cursor.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize,
}

impl Inputter {
    pub fn with_value(s: &str) -> Self {
        let mut input = Inputter::default();
        input.set(s);
        input
    }

    /// Apply an editing key. Returns true if the text changed.
    pub fn read(&mut self, key: KeyEvent) -> bool {
        let changed = match (key.code, key.modifiers) {
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => {
                self.curser_pos = 0;
                false
            }
            (KeyCode::End, _) => {
                self.curser_pos = self.len();
                false
            }
            (KeyCode::Char(chr), KeyModifiers::NONE | KeyModifiers::SHIFT) => self.insert(chr),
            _ => false,
        };
        trace!(
            "Input {:?} => \"{}\" @{}",
            key.code, self.current_input, self.curser_pos
        );
        changed
    }

    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = self.len();
    }

    pub fn value(&self) -> &str {
        &self.current_input
    }

    pub fn cursor(&self) -> usize {
        self.curser_pos
    }

    fn len(&self) -> usize {
        self.current_input.chars().count()
    }

    fn backspace(&mut self) -> bool {
        if self.curser_pos == 0 {
            return false;
        }
        self.curser_pos -= 1;
        let at = self.getbytepos();
        self.current_input.remove(at);
        true
    }

    fn delete(&mut self) -> bool {
        if self.curser_pos >= self.len() {
            return false;
        }
        let at = self.getbytepos();
        self.current_input.remove(at);
        true
    }

    fn left(&mut self) -> bool {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        false
    }

    fn right(&mut self) -> bool {
        if self.curser_pos < self.len() {
            self.curser_pos += 1;
        }
        false
    }

    fn insert(&mut self, chr: char) -> bool {
        let at = self.getbytepos();
        self.current_input.insert(at, chr);
        self.curser_pos += 1;
        true
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}
