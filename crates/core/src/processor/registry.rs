//! Ordered processor dispatch.

use std::path::Path;
use std::sync::Arc;

use super::traits::Processor;

/// Processors in registration order. The first match wins.
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: Vec<Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processor after those already registered.
    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        self.processors.push(processor);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, processor: Arc<dyn Processor>) -> Self {
        self.register(processor);
        self
    }

    /// Returns the first registered processor that accepts `path`.
    pub fn find(&self, path: &Path) -> Option<Arc<dyn Processor>> {
        self.processors
            .iter()
            .find(|p| p.can_process(path))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProcessor;

    #[test]
    fn test_first_match_wins() {
        let registry = ProcessorRegistry::new()
            .with(Arc::new(MockProcessor::new("lossless", ["wav"], "flac")))
            .with(Arc::new(MockProcessor::new("any-audio", ["wav", "mp3"], "mp3")));

        let chosen = registry.find(Path::new("a.wav")).unwrap();
        assert_eq!(chosen.name(), "lossless");

        let chosen = registry.find(Path::new("b.mp3")).unwrap();
        assert_eq!(chosen.name(), "any-audio");
    }

    #[test]
    fn test_no_match() {
        let registry =
            ProcessorRegistry::new().with(Arc::new(MockProcessor::new("audio", ["mp3"], "flac")));
        assert!(registry.find(Path::new("film.mkv")).is_none());
        assert_eq!(registry.len(), 1);
    }
}
