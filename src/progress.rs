//! Progress reporting for bulk operations
//!
//! A sink is purely observational: it is told about each entry once that
//! entry has been handled and cannot influence the operation.

/// Receives `(current, total, name)` once per completed entry
///
/// `current` starts at 1 and increases by one per call.
pub trait ProgressSink {
    fn on_progress(&mut self, current: usize, total: usize, name: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, &str),
{
    fn on_progress(&mut self, current: usize, total: usize, name: &str) {
        self(current, total, name)
    }
}

/// Sink that ignores every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _current: usize, _total: usize, _name: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive<P: ProgressSink>(sink: &mut P) {
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            sink.on_progress(i + 1, 3, name);
        }
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        drive(&mut |current: usize, total: usize, name: &str| {
            seen.push((current, total, name.to_string()))
        });
        assert_eq!(
            seen,
            vec![
                (1, 3, "a".to_string()),
                (2, 3, "b".to_string()),
                (3, 3, "c".to_string())
            ]
        );
    }

    #[test]
    fn test_no_progress() {
        drive(&mut NoProgress);
    }
}
