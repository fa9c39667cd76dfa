const EXTRACT_TITLE_CHARS: usize = 100;

/// One logical notification, delivered unchanged to every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    title: String,
    body: String,
}

impl Message {
    /// Builds a message; without a title the body's first line is promoted.
    ///
    /// A single-line body becomes both title and body so nothing is lost.
    pub fn new(title: Option<&str>, body: &str) -> Self {
        if let Some(title) = title.map(str::trim).filter(|title| !title.is_empty()) {
            return Self {
                title: title.to_string(),
                body: body.to_string(),
            };
        }

        match body.split_once('\n') {
            Some((first, rest)) => Self {
                title: first.trim_end().to_string(),
                body: rest.trim().to_string(),
            },
            None => Self {
                title: body.to_string(),
                body: body.to_string(),
            },
        }
    }

    /// Message for text pulled out of a web page.
    pub fn from_extracted(url: &str, text: &str) -> Self {
        let title = if text.chars().count() > EXTRACT_TITLE_CHARS {
            let head: String = text.chars().take(EXTRACT_TITLE_CHARS).collect();
            format!("{head}...")
        } else {
            text.to_string()
        };

        Self {
            title,
            body: format!("Source URL: {url}\n\n{text}"),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
