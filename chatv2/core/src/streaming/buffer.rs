//! Cumulative UTF-8 body buffer
//!
//! Network chunks do not respect character boundaries. The accumulator keeps
//! an incomplete trailing sequence aside until the rest of it arrives, so the
//! decoded text never contains half a character.

/// Decoded text of the body received so far
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    text: String,
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    /// Empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded text so far
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Append raw bytes
    ///
    /// Invalid sequences decode to U+FFFD. An incomplete sequence at the end
    /// is held back for the next call.
    pub fn push(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.pending.extend_from_slice(bytes);

        let mut input: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    self.text.push_str(valid);
                    input = &[];
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    self.text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(bad) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[bad..];
                        }
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        let leftover = input.to_vec();
        self.pending = leftover;
    }

    /// Flush a dangling partial sequence once the body has ended
    ///
    /// Returns true if the text changed.
    pub fn finish(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let tail = std::mem::take(&mut self.pending);
        self.text.push_str(&String::from_utf8_lossy(&tail));
        true
    }
}
