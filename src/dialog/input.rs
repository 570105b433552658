//! Text input and key handling shared by the dialogs.

/// Keys the dialogs react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Return / Enter.
    Enter,
    /// A printable character.
    Char(char),
    /// Delete the last character.
    Backspace,
}

/// A key press with its Shift modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    /// The key itself.
    pub key: Key,
    /// Whether Shift was held.
    pub shift: bool,
}

impl KeyPress {
    /// Plain Enter.
    #[must_use]
    pub fn enter() -> Self {
        Self {
            key: Key::Enter,
            shift: false,
        }
    }

    /// Shift+Enter.
    #[must_use]
    pub fn shift_enter() -> Self {
        Self {
            key: Key::Enter,
            shift: true,
        }
    }

    /// A typed character.
    #[must_use]
    pub fn char(c: char) -> Self {
        Self {
            key: Key::Char(c),
            shift: false,
        }
    }

    /// Backspace.
    #[must_use]
    pub fn backspace() -> Self {
        Self {
            key: Key::Backspace,
            shift: false,
        }
    }
}

/// Single input field with a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    value: String,
    placeholder: String,
}

impl InputField {
    /// Empty field showing `placeholder`.
    #[must_use]
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            value: String::new(),
            placeholder: placeholder.into(),
        }
    }

    /// Prefill the field.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Current text.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Shown while the text is empty.
    #[must_use]
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Replace the text.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Empty the text; the placeholder stays.
    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Apply a key press; returns the trimmed text when it submits.
    ///
    /// Enter without Shift submits a non-blank value and clears the field
    /// right away. Shift+Enter inserts a newline.
    ///
    /// ```rust
    /// use inline_chat::dialog::{InputField, KeyPress};
    ///
    /// let mut field = InputField::new("Ask a question...");
    /// field.handle_key(KeyPress::char('h'));
    /// field.handle_key(KeyPress::shift_enter());
    /// field.handle_key(KeyPress::char('i'));
    /// assert_eq!(field.handle_key(KeyPress::enter()).as_deref(), Some("h\ni"));
    /// assert_eq!(field.value(), "");
    /// assert_eq!(field.placeholder(), "Ask a question...");
    /// ```
    pub fn handle_key(&mut self, key: KeyPress) -> Option<String> {
        match key.key {
            Key::Enter if !key.shift => self.take_submission(),
            Key::Enter => {
                self.value.push('\n');
                None
            }
            Key::Char(c) => {
                self.value.push(c);
                None
            }
            Key::Backspace => {
                self.value.pop();
                None
            }
        }
    }

    /// Take the trimmed value for submission, leaving the field empty.
    ///
    /// Blank input is left untouched and yields `None`.
    pub fn take_submission(&mut self) -> Option<String> {
        let text = self.value.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();
        self.value.clear();
        Some(text)
    }
}
