//! Size-bounded downlink accumulator.

/// Downlink sent when there is nothing to send.
pub const RESPONSE_SUCCESS: &str = "0";

const FRAME_MARKER: &str = "!";
const SEPARATOR: &str = ";";

/// Collects downlink tokens for one report cycle without exceeding a byte budget.
#[derive(Debug, Clone)]
pub struct Downlink {
    max_bytes: usize,
    tokens: Vec<String>,
    size: usize,
}

impl Downlink {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            tokens: Vec::new(),
            size: 0,
        }
    }

    /// Append the token if the rendered downlink stays within the budget.
    ///
    /// The frame marker takes the place of the first token's separator.
    pub fn add_if_it_fits(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        let prefix = if self.tokens.is_empty() {
            FRAME_MARKER.len()
        } else {
            SEPARATOR.len()
        };
        let new_size = self.size + prefix + token.len();
        if new_size > self.max_bytes {
            return false;
        }
        self.size = new_size;
        self.tokens.push(token);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Rendered downlink, or [`RESPONSE_SUCCESS`] when empty.
    pub fn render(&self) -> String {
        if self.tokens.is_empty() {
            return RESPONSE_SUCCESS.to_string();
        }
        format!("{}{}", FRAME_MARKER, self.tokens.join(SEPARATOR))
    }
}
