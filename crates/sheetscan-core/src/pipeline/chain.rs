//! Trying strategies in order until one produces text.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, info, warn};

use super::strategy::{ExtractionInput, ExtractionStrategy};
use super::worker::RunEvent;
use crate::error::ExtractError;
use crate::models::Grid;

/// The accepted grid and the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub grid: Grid,
    pub strategy: String,
}

/// Ordered strategies; the first non-blank grid wins.
///
/// A strategy that fails or yields only blank cells is logged and the next
/// one runs. Cancellation ends the chain immediately.
#[derive(Default)]
pub struct FallbackChain<'a> {
    strategies: Vec<Box<dyn ExtractionStrategy + 'a>>,
}

impl<'a> FallbackChain<'a> {
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'a) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn run(&self, input: &ExtractionInput<'_>) -> Result<Extraction, ExtractError> {
        let mut tried = Vec::new();

        for strategy in &self.strategies {
            input.cancel.check()?;
            let name = strategy.name().to_string();
            input.emit(RunEvent::StrategyStarted { name: name.clone() });

            let outcome = catch_unwind(AssertUnwindSafe(|| strategy.extract(input)))
                .unwrap_or_else(|_| {
                    Err(ExtractError::Strategy {
                        strategy: name.clone(),
                        reason: "panicked".to_string(),
                    })
                });

            let accepted = match outcome {
                Ok(Some(grid)) if grid.has_content() => {
                    info!(
                        "{} strategy produced {}x{} grid",
                        name,
                        grid.row_count(),
                        grid.column_count()
                    );
                    Some(grid)
                }
                Ok(Some(_)) => {
                    info!("{} strategy found no text", name);
                    tried.push(name.clone());
                    None
                }
                Ok(None) => {
                    debug!("{} strategy does not apply", name);
                    None
                }
                Err(ExtractError::Cancelled) => {
                    input.emit(RunEvent::StrategyFinished { name, success: false });
                    return Err(ExtractError::Cancelled);
                }
                Err(e) => {
                    warn!("{} strategy failed: {}", name, e);
                    tried.push(name.clone());
                    None
                }
            };

            input.emit(RunEvent::StrategyFinished {
                name: name.clone(),
                success: accepted.is_some(),
            });
            if let Some(grid) = accepted {
                return Ok(Extraction { grid, strategy: name });
            }
        }

        Err(ExtractError::ExtractionFailed { tried })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::worker::{CancelToken, EventSink};
    use image::DynamicImage;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::sync::{Arc, Mutex};

    /// Returns a fixed outcome and counts calls.
    struct Fake {
        name: &'static str,
        outcome: fn() -> Result<Option<Grid>, ExtractError>,
        calls: Cell<usize>,
    }

    impl Fake {
        fn new(name: &'static str, outcome: fn() -> Result<Option<Grid>, ExtractError>) -> Self {
            Self {
                name,
                outcome,
                calls: Cell::new(0),
            }
        }
    }

    impl ExtractionStrategy for &Fake {
        fn name(&self) -> &str {
            self.name
        }

        fn extract(&self, _input: &ExtractionInput<'_>) -> Result<Option<Grid>, ExtractError> {
            self.calls.set(self.calls.get() + 1);
            (self.outcome)()
        }
    }

    fn text() -> Result<Option<Grid>, ExtractError> {
        Ok(Some(Grid::from_rows(vec![vec!["x".to_string()]])))
    }

    fn blank() -> Result<Option<Grid>, ExtractError> {
        Ok(Some(Grid::from_rows(vec![vec![String::new(), " ".to_string()]])))
    }

    fn skip() -> Result<Option<Grid>, ExtractError> {
        Ok(None)
    }

    fn broken() -> Result<Option<Grid>, ExtractError> {
        Err(ExtractError::Strategy {
            strategy: "x".to_string(),
            reason: "boom".to_string(),
        })
    }

    fn panicking() -> Result<Option<Grid>, ExtractError> {
        panic!("page decoder crashed")
    }

    fn cancelled() -> Result<Option<Grid>, ExtractError> {
        Err(ExtractError::Cancelled)
    }

    fn run(chain: &FallbackChain<'_>) -> Result<Extraction, ExtractError> {
        let image = DynamicImage::new_rgb8(4, 4);
        let cancel = CancelToken::new();
        chain.run(&ExtractionInput::new(&image, None, &cancel))
    }

    #[test]
    fn test_first_success_stops_chain() {
        let (a, b, c) = (Fake::new("a", text), Fake::new("b", text), Fake::new("c", text));
        let chain = FallbackChain::new().with_strategy(&a).with_strategy(&b).with_strategy(&c);

        assert_eq!(run(&chain).unwrap().strategy, "a");
        assert_eq!((a.calls.get(), b.calls.get(), c.calls.get()), (1, 0, 0));
    }

    #[test]
    fn test_failures_and_blank_grids_fall_through() {
        let (a, b, c) = (Fake::new("a", broken), Fake::new("b", blank), Fake::new("c", text));
        let chain = FallbackChain::new().with_strategy(&a).with_strategy(&b).with_strategy(&c);

        let extraction = run(&chain).unwrap();
        assert_eq!(extraction.strategy, "c");
        assert_eq!(extraction.grid.cell(0, 0), Some("x"));
    }

    #[test]
    fn test_panicking_strategy_falls_through() {
        let (a, b) = (Fake::new("a", panicking), Fake::new("b", text));
        let chain = FallbackChain::new().with_strategy(&a).with_strategy(&b);

        assert_eq!(run(&chain).unwrap().strategy, "b");

        let chain = FallbackChain::new().with_strategy(&a);
        match run(&chain) {
            Err(ExtractError::ExtractionFailed { tried }) => assert_eq!(tried, vec!["a"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_exhaustion_lists_tried_strategies() {
        let (a, b, c) = (Fake::new("a", skip), Fake::new("b", broken), Fake::new("c", blank));
        let chain = FallbackChain::new().with_strategy(&a).with_strategy(&b).with_strategy(&c);

        match run(&chain) {
            Err(ExtractError::ExtractionFailed { tried }) => assert_eq!(tried, vec!["b", "c"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cancellation_is_terminal() {
        let (a, b) = (Fake::new("a", cancelled), Fake::new("b", text));
        let chain = FallbackChain::new().with_strategy(&a).with_strategy(&b);

        assert!(matches!(run(&chain), Err(ExtractError::Cancelled)));
        assert_eq!(b.calls.get(), 0);
    }

    #[test]
    fn test_events_bracket_each_strategy() {
        let (a, b) = (Fake::new("a", blank), Fake::new("b", text));
        let chain = FallbackChain::new().with_strategy(&a).with_strategy(&b);

        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let sink: EventSink = Arc::new(move |e: RunEvent| seen.lock().unwrap().push(e));
        let image = DynamicImage::new_rgb8(4, 4);
        let cancel = CancelToken::new();
        chain
            .run(&ExtractionInput::new(&image, None, &cancel).with_events(Some(&sink)))
            .unwrap();

        let started = |n: &str| RunEvent::StrategyStarted { name: n.to_string() };
        let finished = |n: &str, success| RunEvent::StrategyFinished { name: n.to_string(), success };
        assert_eq!(
            *events.lock().unwrap(),
            vec![started("a"), finished("a", false), started("b"), finished("b", true)]
        );
    }
}
