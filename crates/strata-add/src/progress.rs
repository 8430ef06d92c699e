use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

use crate::object::AddedObject;

/// Reader that reports how many bytes of a file have been consumed.
///
/// A [`AddedObject::Progress`] record is sent whenever at least `increment`
/// bytes were read since the last report, and once more at end of stream
/// unless that exact count was already reported. Sends go through the
/// bounded output channel: a slow consumer stalls the read, it never drops
/// records. If the consumer has gone away, reporting stops and reading
/// carries on.
pub struct ProgressReader<R> {
    inner: R,
    name: String,
    increment: u64,
    total: u64,
    since_report: u64,
    reported: Option<u64>,
    pending: Option<AddedObject>,
    sender: Option<PollSender<AddedObject>>,
}

impl<R> ProgressReader<R> {
    pub fn new(
        inner: R,
        name: impl Into<String>,
        increment: u64,
        sender: mpsc::Sender<AddedObject>,
    ) -> Self {
        Self {
            inner,
            name: name.into(),
            increment: increment.max(1),
            total: 0,
            since_report: 0,
            reported: None,
            pending: None,
            sender: Some(PollSender::new(sender)),
        }
    }

    /// Bytes read so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    fn queue_report(&mut self) {
        self.pending = Some(AddedObject::Progress {
            name: self.name.clone(),
            bytes: self.total,
        });
        self.reported = Some(self.total);
        self.since_report = 0;
    }

    fn poll_flush_report(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(report) = self.pending.take() else {
            return Poll::Ready(());
        };
        let Some(sender) = self.sender.as_mut() else {
            return Poll::Ready(());
        };
        match sender.poll_reserve(cx) {
            Poll::Pending => {
                self.pending = Some(report);
                return Poll::Pending;
            }
            Poll::Ready(Ok(())) => {
                if sender.send_item(report).is_err() {
                    self.sender = None;
                }
            }
            Poll::Ready(Err(_)) => self.sender = None,
        }
        Poll::Ready(())
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        // A report queued by the previous read goes out before more data is
        // consumed.
        ready!(this.poll_flush_report(cx));
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let read = (buf.filled().len() - before) as u64;

        if read > 0 {
            this.total += read;
            this.since_report += read;
            if this.since_report >= this.increment {
                this.queue_report();
            }
            return Poll::Ready(Ok(()));
        }

        // End of stream. Returning Pending here is safe: nothing was
        // consumed, and the inner reader reports EOF again on the next poll.
        if this.reported != Some(this.total) {
            this.queue_report();
        }
        ready!(this.poll_flush_report(cx));
        Poll::Ready(Ok(()))
    }
}
