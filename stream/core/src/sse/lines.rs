//! Line Splitting
//!
//! [`LineStream`] adapts a stream of byte chunks (an HTTP body) into a stream
//! of text lines. Lines may span chunk boundaries; `\n` and `\r\n` both
//! terminate a line, and invalid UTF-8 is replaced rather than rejected. A
//! final line without a terminator is still yielded when the source ends.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// Stream of lines over a stream of byte chunks
    pub struct LineStream<S> {
        #[pin]
        inner: S,
        buffer: Vec<u8>,
        scanned: usize,
        done: bool,
    }
}

impl<S> LineStream<S> {
    /// Wrap a byte-chunk stream
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            scanned: 0,
            done: false,
        }
    }
}

fn into_line(mut raw: Vec<u8>) -> String {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    match String::from_utf8(raw) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

impl<S, B, E> Stream for LineStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<String, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(offset) = this.buffer[*this.scanned..]
                .iter()
                .position(|b| *b == b'\n')
            {
                let end = *this.scanned + offset;
                let mut raw: Vec<u8> = this.buffer.drain(..=end).collect();
                raw.pop();
                *this.scanned = 0;
                return Poll::Ready(Some(Ok(into_line(raw))));
            }
            *this.scanned = this.buffer.len();

            if *this.done {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                let raw = std::mem::take(this.buffer);
                *this.scanned = 0;
                return Poll::Ready(Some(Ok(into_line(raw))));
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => *this.done = true,
            }
        }
    }
}
