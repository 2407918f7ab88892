use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

const FOLLOW_CHANNEL_CAPACITY: usize = 1024;

/// Captured stdout/stderr lines of the node, in arrival order.
///
/// Unbounded unless built with [`LogBuffer::with_max_lines`], in which case the
/// oldest lines are evicted first.
pub struct LogBuffer {
    max_lines: Option<usize>,
    lines: RwLock<Vec<String>>,
    follow: broadcast::Sender<String>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_max_lines(max_lines: usize) -> Self {
        Self::build(Some(max_lines))
    }

    fn build(max_lines: Option<usize>) -> Self {
        let (follow, _) = broadcast::channel(FOLLOW_CHANNEL_CAPACITY);
        Self {
            max_lines,
            lines: RwLock::new(Vec::new()),
            follow,
        }
    }

    /// Append a line, trimming oldest if over capacity.
    pub fn push(&self, line: String) {
        {
            let mut lines = self.lines.write().unwrap_or_else(PoisonError::into_inner);
            lines.push(line.clone());
            if let Some(max) = self.max_lines {
                if lines.len() > max {
                    let excess = lines.len() - max;
                    lines.drain(..excess);
                }
            }
        }
        // No followers is fine.
        let _ = self.follow.send(line);
    }

    /// Return the last `n` lines (or all if `n` exceeds stored count).
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.read().unwrap_or_else(PoisonError::into_inner);
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lines
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Receive every line pushed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.follow.subscribe()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_returns_last_n_lines() {
        let buf = LogBuffer::new();
        for i in 0..10 {
            buf.push(format!("line {i}"));
        }
        assert_eq!(buf.tail(3), vec!["line 7", "line 8", "line 9"]);
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn unbounded_by_default() {
        let buf = LogBuffer::default();
        for i in 0..20_000 {
            buf.push(format!("line {i}"));
        }
        assert_eq!(buf.len(), 20_000);
        assert_eq!(buf.lines()[0], "line 0");
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let buf = LogBuffer::with_max_lines(5);
        for i in 0..10 {
            buf.push(format!("line {i}"));
        }
        assert_eq!(
            buf.lines(),
            vec!["line 5", "line 6", "line 7", "line 8", "line 9"]
        );
    }

    #[test]
    fn clear_removes_lines() {
        let buf = LogBuffer::default();
        buf.push("hello".into());
        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.tail(10).is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_new_lines() {
        let buf = LogBuffer::default();
        buf.push("before".into());
        let mut rx = buf.subscribe();
        buf.push("after".into());
        assert_eq!(rx.recv().await.unwrap(), "after");
    }
}
