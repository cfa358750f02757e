use owo_colors::{OwoColorize, Style};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Tone {
    Heading,
    Success,
    Warning,
    Muted,
    Value,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Heading => Style::new().bold().cyan(),
            Self::Success => Style::new().bold().green(),
            Self::Warning => Style::new().bold().yellow(),
            Self::Muted => Style::new().dimmed(),
            Self::Value => Style::new().bold(),
        }
    }
}

/// Colours terminal text when stdout is a terminal; passes text through
/// otherwise.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Tone::Heading)
    }

    pub(crate) fn success(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Tone::Success)
    }

    pub(crate) fn warning(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Tone::Warning)
    }

    pub(crate) fn muted(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Tone::Muted)
    }

    pub(crate) fn value(&self, text: impl AsRef<str>) -> String {
        self.paint(text.as_ref(), Tone::Value)
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if self.use_colour {
            text.style(tone.style()).to_string()
        } else {
            text.to_owned()
        }
    }
}
