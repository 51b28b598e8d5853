use std::io;

/// The human on the other side of the client.
pub trait Operator: Send + Sync {
    fn write(&self, text: &str);

    /// Block until the operator enters one line, without its line ending.
    fn read_line(&self) -> io::Result<String>;
}

/// An operator at the process's terminal.
#[derive(Debug, Clone)]
pub struct Terminal {
    term: console::Term,
}

impl Terminal {
    pub fn stdout() -> Self {
        Self {
            term: console::Term::stdout(),
        }
    }
}

impl Operator for Terminal {
    fn write(&self, text: &str) {
        if let Err(err) = self.term.write_str(text).and_then(|_| self.term.flush()) {
            tracing::warn!("failed to write to the terminal: {}", err);
        }
    }

    fn read_line(&self) -> io::Result<String> {
        self.term.read_line()
    }
}
