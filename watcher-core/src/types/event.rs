//! Output of the classifier.

/// A message authored by an allowlisted bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub author: String,
    pub body: String,
}

impl ClassifiedEvent {
    pub fn new(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            body: body.into(),
        }
    }

    /// Notification text: `"{author}: {body}"`.
    pub fn notification_text(&self) -> String {
        format!("{}: {}", self.author, self.body)
    }
}
