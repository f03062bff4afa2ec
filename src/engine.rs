//! Runs the configured analyzers over one snapshot and ranks their output.

use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::hierarchy::HierarchyOptimizer;
use crate::loose_files::LooseFileGrouper;
use crate::patterns::PatternDetector;
use crate::ranker::rank;
use crate::similarity::SimilarityAnalyzer;
use crate::suggestion::{Analyzer, Suggestion};
use crate::tree::DirTree;

pub struct SuggestionEngine {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl SuggestionEngine {
    /// An engine with no analyzers.
    pub fn empty() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    /// Builds the analyzer set enabled in `config`.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut engine = Self::empty();
        if config.similarity {
            engine = engine.with_analyzer(SimilarityAnalyzer::new(config.similarity_threshold));
        }
        if config.patterns {
            engine = engine.with_analyzer(PatternDetector::new(config.min_pattern_siblings));
        }
        if config.hierarchy {
            engine = engine.with_analyzer(HierarchyOptimizer::new(
                config.relatedness_threshold,
                config.min_token_len,
            ));
        }
        if config.loose_files {
            engine = engine.with_analyzer(LooseFileGrouper::new(config.min_loose_files));
        }
        engine
    }

    /// Adds another scorer, such as an external semantic clusterer.
    pub fn with_analyzer(mut self, analyzer: impl Analyzer + 'static) -> Self {
        self.analyzers.push(Box::new(analyzer));
        self
    }

    pub fn analyzer_names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Ranked suggestions for `tree`. Candidates whose sources are not in the
    /// snapshot are logged and dropped.
    pub fn analyze(&self, tree: &DirTree) -> Vec<Suggestion> {
        let mut candidates = Vec::new();
        for analyzer in &self.analyzers {
            let produced = analyzer.analyze(tree);
            debug!(analyzer = analyzer.name(), count = produced.len(), "analysis pass");
            for suggestion in produced {
                match suggestion.validate(tree) {
                    Ok(()) => candidates.push(suggestion),
                    Err(e) => warn!(analyzer = analyzer.name(), "dropping suggestion: {}", e),
                }
            }
        }
        rank(candidates)
    }
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}
