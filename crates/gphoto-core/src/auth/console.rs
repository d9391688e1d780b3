use std::io::{self, BufRead, Write};

/// Interactive terminal used by the auth flows.
///
/// Defaults to stdin/stdout; tests swap in in-memory reader and writer.
pub struct Console {
    reader: Box<dyn BufRead + Send + Sync>,
    writer: Box<dyn Write + Send + Sync>,
}

impl Console {
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }

    pub fn new(reader: impl BufRead + Send + Sync + 'static, writer: impl Write + Send + Sync + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Writes one line of user-facing output.
    ///
    /// # Errors
    /// Returns an error if the writer fails.
    pub fn say(&mut self, line: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.writer, "{}", line.as_ref())?;
        self.writer.flush()
    }

    /// Prints `prompt` (no newline) and reads one line.
    ///
    /// Returns `None` at end of input.
    ///
    /// # Errors
    /// Returns an error if reading or writing fails.
    pub fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.writer, "{prompt}")?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}
