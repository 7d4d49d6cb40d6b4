//! Ordered fallback chains: try each step in order, first success wins.
//!
//! One combinator serves every degradation ladder in the pipeline: acquisition
//! strategies, time-window offsets and quality-flag tolerance levels. A chain never
//! fails by itself; callers decide what a fully rejected chain resolves to (a
//! terminal strategy, or the best partial result).

use std::future::Future;

/// Result of trying a single step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    /// The step produced an acceptable result; stop here.
    Accept(T),
    /// The step fell short; keep going. `partial` is retained as the best effort so far.
    Reject { partial: Option<T>, reason: String },
    /// The step failed in a way that makes the remaining steps pointless.
    Abandon(String),
}

impl<T> Step<T> {
    pub fn reject(reason: impl Into<String>) -> Self {
        Step::Reject {
            partial: None,
            reason: reason.into(),
        }
    }

    pub fn reject_with(partial: T, reason: impl Into<String>) -> Self {
        Step::Reject {
            partial: Some(partial),
            reason: reason.into(),
        }
    }
}

/// A rejected or abandoned step and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection<S> {
    pub step: S,
    pub reason: String,
}

/// What a chain produced.
#[derive(Debug, Clone)]
pub struct Outcome<S, T> {
    pub accepted: Option<(S, T)>,
    /// Partial result of the last rejected step that offered one.
    pub best_partial: Option<(S, T)>,
    pub rejections: Vec<Rejection<S>>,
    pub abandoned: bool,
}

impl<S, T> Outcome<S, T> {
    fn empty() -> Self {
        Self {
            accepted: None,
            best_partial: None,
            rejections: Vec::new(),
            abandoned: false,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted.is_some()
    }

    /// The accepted result, else the best partial. The flag reports acceptance.
    pub fn accepted_or_partial(self) -> Option<(S, T, bool)> {
        match (self.accepted, self.best_partial) {
            (Some((s, t)), _) => Some((s, t, true)),
            (None, Some((s, t))) => Some((s, t, false)),
            (None, None) => None,
        }
    }
}

impl<S: Clone, T> Outcome<S, T> {
    /// Record one step's result; returns `true` when the chain should stop.
    fn record(&mut self, step: S, result: Step<T>) -> bool {
        match result {
            Step::Accept(value) => {
                self.accepted = Some((step, value));
                true
            }
            Step::Reject { partial, reason } => {
                match partial {
                    Some(value) => {
                        self.rejections.push(Rejection {
                            step: step.clone(),
                            reason,
                        });
                        self.best_partial = Some((step, value));
                    }
                    None => self.rejections.push(Rejection { step, reason }),
                }
                false
            }
            Step::Abandon(reason) => {
                self.rejections.push(Rejection { step, reason });
                self.abandoned = true;
                true
            }
        }
    }
}

/// An ordered list of steps.
#[derive(Debug, Clone)]
pub struct Fallback<S> {
    steps: Vec<S>,
}

impl<S: Clone> Fallback<S> {
    pub fn new(steps: impl IntoIterator<Item = S>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    /// Run the chain synchronously.
    pub fn run<T, F>(&self, mut attempt: F) -> Outcome<S, T>
    where
        F: FnMut(&S) -> Step<T>,
    {
        let mut outcome = Outcome::empty();
        for step in &self.steps {
            let result = attempt(step);
            if outcome.record(step.clone(), result) {
                break;
            }
        }
        outcome
    }

    /// Run the chain, awaiting each step before trying the next.
    pub async fn run_async<T, F, Fut>(&self, mut attempt: F) -> Outcome<S, T>
    where
        F: FnMut(S) -> Fut,
        Fut: Future<Output = Step<T>>,
    {
        let mut outcome = Outcome::empty();
        for step in &self.steps {
            let result = attempt(step.clone()).await;
            if outcome.record(step.clone(), result) {
                break;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_success_wins() {
        let chain = Fallback::new(vec![1, 2, 3, 4]);
        let mut tried = Vec::new();
        let outcome = chain.run(|&n| {
            tried.push(n);
            if n >= 2 {
                Step::Accept(n * 10)
            } else {
                Step::reject("too small")
            }
        });
        assert_eq!(outcome.accepted, Some((2, 20)));
        assert_eq!(tried, vec![1, 2]);
        assert_eq!(outcome.rejections.len(), 1);
    }

    #[test]
    fn test_best_partial_is_latest() {
        let chain = Fallback::new(vec![1u8, 2, 3]);
        let outcome = chain.run(|&n| Step::reject_with(n as usize * 100, "below threshold"));
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.best_partial, Some((3, 300)));
        assert_eq!(outcome.accepted_or_partial(), Some((3, 300, false)));
    }

    #[test]
    fn test_abandon_stops_chain() {
        let chain = Fallback::new(vec!["a", "b", "c"]);
        let mut tried = 0;
        let outcome: Outcome<&str, ()> = chain.run(|&s| {
            tried += 1;
            if s == "b" {
                Step::Abandon("forbidden".to_string())
            } else {
                Step::reject("empty")
            }
        });
        assert_eq!(tried, 2);
        assert!(outcome.abandoned);
        assert_eq!(outcome.rejections[1].reason, "forbidden");
    }

    #[test]
    fn test_empty_chain() {
        let chain: Fallback<u32> = Fallback::new(Vec::new());
        let outcome: Outcome<u32, u32> = chain.run(|_| Step::Accept(1));
        assert!(outcome.accepted_or_partial().is_none());
    }

    #[tokio::test]
    async fn test_async_chain() {
        let chain = Fallback::new(vec![0u32, 7, 14]);
        let outcome = chain
            .run_async(|offset| async move {
                if offset == 14 {
                    Step::Accept(format!("window -{}d", offset))
                } else {
                    Step::reject("no granule")
                }
            })
            .await;
        assert_eq!(outcome.accepted, Some((14, "window -14d".to_string())));
        assert_eq!(outcome.rejections.len(), 2);
    }
}
