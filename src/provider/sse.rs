use super::{FragmentStream, ProviderError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Outcome of decoding one SSE `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decoded {
    Fragment(String),
    Skip,
    Done,
}

/// Read a `text/event-stream` response on a background task and forward the
/// decoded fragments through a bounded channel.
///
/// The task exits when the body ends, when `decode` reports [`Decoded::Done`]
/// or an error, or when the returned stream is dropped.
pub(crate) fn spawn_fragment_stream<F>(resp: reqwest::Response, decode: F) -> FragmentStream
where
    F: Fn(&str) -> Result<Decoded, ProviderError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<String, ProviderError>>(64);

    tokio::spawn(async move {
        let mut body = resp.bytes_stream();
        let mut parser = SseParser::new();

        let mut events = Vec::new();
        loop {
            let ended = match body.next().await {
                Some(Ok(bytes)) => {
                    events.extend(parser.push(&bytes));
                    false
                }
                Some(Err(e)) => {
                    let _ = tx.send(Err(ProviderError::from_transport(e))).await;
                    return;
                }
                None => {
                    events.extend(parser.finish());
                    true
                }
            };

            for ev in events.drain(..) {
                let data = match ev {
                    Ok(SseEvent::Data(data)) => data,
                    Ok(SseEvent::Other) => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };
                if data.trim().is_empty() {
                    continue;
                }

                match decode(&data) {
                    Ok(Decoded::Fragment(text)) => {
                        if tx.send(Ok(text)).await.is_err() {
                            tracing::debug!("fragment receiver dropped; stopping stream");
                            return;
                        }
                    }
                    Ok(Decoded::Skip) => {}
                    Ok(Decoded::Done) => return,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            if ended {
                return;
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Data(String),
    Other,
}

/// Minimal SSE parser.
///
/// - Collects UTF-8 lines
/// - Emits Data events when a blank line ends an event
pub(crate) struct SseParser {
    buf: Vec<u8>,
    cur_data: String,
}

impl SseParser {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            cur_data: String::new(),
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Result<SseEvent, ProviderError>> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line = self.buf.drain(..=pos).collect::<Vec<u8>>();
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
            self.feed_line(&line, &mut out);
        }

        out
    }

    /// Flush whatever is buffered once the body has ended.
    pub(crate) fn finish(&mut self) -> Vec<Result<SseEvent, ProviderError>> {
        let mut out = Vec::new();
        if !self.buf.is_empty() {
            let mut line = std::mem::take(&mut self.buf);
            if line.ends_with(b"\r") {
                line.pop();
            }
            self.feed_line(&line, &mut out);
        }
        self.feed_line(b"", &mut out);
        out
    }

    fn feed_line(&mut self, line: &[u8], out: &mut Vec<Result<SseEvent, ProviderError>>) {
        if line.is_empty() {
            if !self.cur_data.is_empty() {
                // Drop the separator appended after the last data line.
                if self.cur_data.ends_with('\n') {
                    self.cur_data.pop();
                }
                out.push(Ok(SseEvent::Data(std::mem::take(&mut self.cur_data))));
            }
            return;
        }

        let s = match std::str::from_utf8(line) {
            Ok(s) => s,
            Err(e) => {
                out.push(Err(ProviderError::Decode(format!(
                    "SSE line is not valid UTF-8: {e}"
                ))));
                return;
            }
        };

        if let Some(rest) = s.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.cur_data.push_str(rest);
            self.cur_data.push('\n');
        } else {
            // event:, id:, retry: and comments
            out.push(Ok(SseEvent::Other));
        }
    }
}
