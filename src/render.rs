use crate::markdown;
use crossterm::style::Stylize;
use std::io::{self, Write};
use std::time::Duration;

pub const CONNECTION_ERROR: &str =
    "Error connecting to provider API. Try again! Please turn-off the VPN if needed.";

/// Writes responses either raw (for piping) or as Markdown framed in a panel.
pub struct Renderer<W: Write> {
    out: W,
    raw: bool,
    width: usize,
    // Formatted streaming renders whole lines; this holds the unfinished one.
    pending: String,
    in_fence: bool,
}

impl Renderer<io::Stdout> {
    pub fn stdout(raw: bool) -> Self {
        let width = crossterm::terminal::size()
            .map(|(w, _)| w as usize)
            .unwrap_or(80);
        Self::new(io::stdout(), raw, width)
    }
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, raw: bool, width: usize) -> Self {
        Self {
            out,
            raw,
            width: width.max(8),
            pending: String::new(),
            in_fence: false,
        }
    }

    /// Print a completed response.
    pub fn response(&mut self, text: &str) -> io::Result<()> {
        if self.raw {
            writeln!(self.out, "{text}")?;
            return self.out.flush();
        }

        writeln!(self.out, "{}", self.rule('╭', '╮'))?;
        for line in markdown::render(text) {
            writeln!(self.out, "{} {line}", "│".dark_grey())?;
        }
        writeln!(self.out, "{}", self.rule('╰', '╯'))?;
        self.out.flush()
    }

    pub fn begin_stream(&mut self) -> io::Result<()> {
        if !self.raw {
            writeln!(self.out, "{}", self.rule('╭', '╮').cyan().bold())?;
        }
        Ok(())
    }

    /// Print one streamed fragment. Raw output goes out as soon as it
    /// arrives; formatted output goes out line by line once each line is
    /// complete. Empty fragments are skipped.
    pub fn fragment(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if self.raw {
            write!(self.out, "{text}")?;
            return self.out.flush();
        }

        self.pending.push_str(text);
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            self.stream_line(line.trim_end_matches(['\n', '\r']))?;
        }
        self.out.flush()
    }

    /// Finish the streamed response. Also closes the panel when the stream
    /// stopped on an error.
    pub fn end_stream(&mut self) -> io::Result<()> {
        if self.raw {
            writeln!(self.out)?;
            return self.out.flush();
        }

        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.stream_line(&rest)?;
        }
        self.in_fence = false;
        writeln!(self.out, "{}", self.rule('╰', '╯').cyan().bold())?;
        self.out.flush()
    }

    /// Report how long the request took. Silent in raw mode.
    pub fn elapsed(&mut self, took: Duration) -> io::Result<()> {
        if self.raw {
            return Ok(());
        }
        let line = format!("Time taken: {:.3} seconds", took.as_secs_f64());
        writeln!(self.out, "\n{}", line.green().bold())?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn stream_line(&mut self, line: &str) -> io::Result<()> {
        let side = "│".cyan();
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            self.in_fence = !self.in_fence;
            return Ok(());
        }

        let rendered = if self.in_fence {
            vec![markdown::code_line(line)]
        } else {
            markdown::render(line)
        };
        if rendered.is_empty() {
            writeln!(self.out, "{side}")?;
        }
        for l in rendered {
            writeln!(self.out, "{side} {l}")?;
        }
        Ok(())
    }

    fn rule(&self, left: char, right: char) -> String {
        let mut s = String::with_capacity(self.width * 3);
        s.push(left);
        s.extend(std::iter::repeat('─').take(self.width - 2));
        s.push(right);
        s
    }
}

/// Print a user-facing diagnostic on stderr.
pub fn print_diagnostic(msg: &str) {
    eprintln!("{}", msg.red().bold());
}
