//! Reveal - the analysis pipeline and its public entry points
//!
//! One invocation runs resolve → extract → (element / slice / outline /
//! detect) over a single file. The analyzer registry and rule engine are
//! immutable `Arc` snapshots built once, so a `Reveal` can be cloned into
//! worker threads freely.
//!
//! Only user-input contradictions and genuine I/O failures come back as
//! `Err`. Everything else (unsupported format, malformed source, missing
//! element, non-UTF-8 bytes) degrades to a partial `Analysis` with the
//! cause recorded in `warnings`.

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use tracing::{debug, warn};

use crate::config::{AnalysisRequest, RevealConfig};
use crate::errors::{Result, RevealError};
use crate::extractors::base::{ExtractedElement, Extractor, StructureMap};
use crate::extractors::registry::AnalyzerRegistry;
use crate::extractors::text::TextExtractor;
use crate::outline::{build_outline, OutlineNode};
use crate::rules::{attach_findings, DetectionReport, RuleEngine, RuleFilter};
use crate::slicer::{slice_structure, SliceSummary};
use crate::source::{FileMetadata, Source};

/// Everything one analysis produced
#[derive(Debug)]
pub struct Analysis {
    pub metadata: FileMetadata,
    /// Id of the extractor that produced `structure`
    pub extractor: String,
    /// Full structure, or the selected units when a slice was requested
    pub structure: StructureMap,
    pub outline: Option<Vec<OutlineNode>>,
    /// Per-category slice summaries (empty without a slice request)
    pub slices: Vec<(String, SliceSummary)>,
    pub element: Option<ExtractedElement>,
    pub detections: Option<DetectionReport>,
    /// Recovered, non-fatal conditions
    pub warnings: Vec<RevealError>,
}

/// Counting limit on live analysis threads
///
/// A slot is held until the analysis thread exits, so threads abandoned by
/// a timeout keep counting against the limit.
#[derive(Debug)]
struct Slots {
    free: Mutex<usize>,
    released: Condvar,
}

impl Slots {
    fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(count.max(1)),
            released: Condvar::new(),
        })
    }

    fn acquire(self: &Arc<Self>) -> SlotGuard {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        while *free == 0 {
            free = self
                .released
                .wait(free)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *free -= 1;
        SlotGuard(Arc::clone(self))
    }
}

struct SlotGuard(Arc<Slots>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut free = self.0.free.lock().unwrap_or_else(PoisonError::into_inner);
        *free += 1;
        self.0.released.notify_one();
    }
}

/// Pipeline context: config plus the registry and rule engine snapshots
///
/// Clones share one analysis slot pool sized by `RevealConfig::worker_count`.
#[derive(Debug, Clone)]
pub struct Reveal {
    config: RevealConfig,
    registry: Arc<AnalyzerRegistry>,
    rules: Arc<RuleEngine>,
    config_filter: RuleFilter,
    slots: Arc<Slots>,
}

impl Reveal {
    /// Discover the analyzer registry and rule engine for `config`
    pub fn new(config: RevealConfig) -> Self {
        let registry = AnalyzerRegistry::discover(&config);
        let rules = RuleEngine::from_config(&config);
        Self::with_parts(config, registry, rules)
    }

    /// Load the closest `reveal.toml` above `start`, then discover
    pub fn discover(start: &Path) -> Result<Self> {
        Ok(Self::new(RevealConfig::discover(start)?))
    }

    pub fn with_parts(config: RevealConfig, registry: AnalyzerRegistry, rules: RuleEngine) -> Self {
        let config_filter = config.rules.filter();
        let slots = Slots::new(config.worker_count());
        Self {
            config,
            registry: Arc::new(registry),
            rules: Arc::new(rules),
            config_filter,
            slots,
        }
    }

    pub fn config(&self) -> &RevealConfig {
        &self.config
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Analyze one file
    pub fn analyze(&self, path: &Path, request: &AnalysisRequest) -> Result<Analysis> {
        // Contradictory slice options fail before touching the file
        let mode = request.slice.validate()?;

        let source = Arc::new(Source::read(path, &self.config.read_limits())?);
        let mut warnings = Vec::new();
        if source.replacements() > 0 {
            warnings.push(RevealError::EncodingError {
                path: path.to_path_buf(),
                count: source.replacements(),
            });
        }

        let extractor: Box<dyn Extractor> = match self.registry.resolve_source(&source) {
            Ok(resolved) => {
                debug!(
                    path = %path.display(),
                    "Resolved {} ({:?})", resolved.info.id, resolved.tier
                );
                resolved.instantiate(Arc::clone(&source))
            }
            Err(unsupported @ RevealError::UnsupportedFile { .. }) => {
                warnings.push(unsupported);
                Box::new(TextExtractor::new(Arc::clone(&source)))
            }
            Err(e) => return Err(e),
        };

        let structure = extractor.structure();
        debug!(
            path = %path.display(),
            "Extracted {} elements in {} categories",
            structure.len(),
            structure.categories().count()
        );
        if let Some(reason) = &structure.malformed {
            warnings.push(RevealError::MalformedSource {
                path: path.to_path_buf(),
                reason: reason.clone(),
            });
        }

        let element = request.element.as_ref().and_then(|query| {
            let found = extractor.extract_element(&query.category, &query.name);
            if found.is_none() {
                warnings.push(RevealError::ElementNotFound {
                    path: path.to_path_buf(),
                    category: query.category.clone(),
                    name: query.name.clone(),
                    available: extractor.base().available_names(&query.category),
                });
            }
            found
        });

        // Detectors always see the whole file
        let detections = request.detect.then(|| {
            let filter = self.config_filter.combine(&request.filter);
            let mut report = self.rules.run(path, &structure, source.text(), &filter);
            attach_findings(&mut report.findings, &structure);
            if let Some(notice) = report.notice() {
                debug!(path = %path.display(), "{}", notice);
            }
            report
        });

        let (structure, slices) = match mode {
            Some(mode) => slice_structure(&structure, mode),
            None => (structure, Vec::new()),
        };
        let outline = request.outline.then(|| build_outline(&structure));

        Ok(Analysis {
            metadata: extractor.metadata(),
            extractor: extractor.id().to_string(),
            structure,
            outline,
            slices,
            element,
            detections,
            warnings,
        })
    }

    /// Analyze many files on a bounded pool; results come back in input order
    pub fn analyze_batch(&self, paths: &[PathBuf], request: &AnalysisRequest) -> Vec<Result<Analysis>> {
        let workers = self.config.worker_count();
        let pool = match ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(e) => {
                warn!("⚠️  Failed to build worker pool, analyzing sequentially: {}", e);
                return paths
                    .iter()
                    .map(|path| self.analyze_bounded(path, request))
                    .collect();
            }
        };
        debug!("Analyzing {} files on {} workers", paths.len(), workers);
        pool.install(|| {
            paths
                .par_iter()
                .map(|path| self.analyze_bounded(path, request))
                .collect()
        })
    }

    /// `analyze` under the per-file timeout
    ///
    /// The analysis runs on its own thread; a timed-out thread is abandoned
    /// and its result dropped when it eventually finishes. At most
    /// `worker_count()` analyses run at once across all clones, abandoned
    /// ones included. Waiting for a slot does not count against the timeout.
    pub fn analyze_bounded(&self, path: &Path, request: &AnalysisRequest) -> Result<Analysis> {
        let slot = self.slots.acquire();
        let Some(timeout) = self.config.timeout() else {
            return self.analyze(path, request);
        };

        let (tx, rx) = mpsc::channel();
        let worker = self.clone();
        let owned_path = path.to_path_buf();
        let owned_request = request.clone();
        thread::Builder::new()
            .name("reveal-analyze".to_string())
            .spawn(move || {
                let _slot = slot;
                let _ = tx.send(worker.analyze(&owned_path, &owned_request));
            })
            .map_err(|e| RevealError::io(path, e))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(path = %path.display(), "⚠️  Analysis timed out after {:?}", timeout);
                Err(RevealError::Timeout {
                    path: path.to_path_buf(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(RevealError::MalformedSource {
                path: path.to_path_buf(),
                reason: "analysis worker stopped without a result".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Detector, DetectorDescriptor, Finding, RuleCategory, RuleFilter, Severity};
    use crate::slicer::SliceRequest;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn config() -> RevealConfig {
        let mut config = RevealConfig::default();
        config.rules.enable_user_rules = false;
        config.jobs = 2;
        config
    }

    const SERVICE: &str = "\
import os

class Service:
    def start(self):
        return os.getpid()

    def stop(self):
        pass

def main():
    Service().start()
";

    #[test]
    fn test_analyze_python_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("service.py");
        fs::write(&path, SERVICE).unwrap();

        let reveal = Reveal::new(config());
        let request = AnalysisRequest::new()
            .with_outline()
            .with_element("function", "stop");
        let analysis = reveal.analyze(&path, &request).unwrap();

        assert_eq!(analysis.extractor, "python");
        assert!(analysis.warnings.is_empty());
        assert_eq!(analysis.metadata.line_count, 11);

        let element = analysis.element.unwrap();
        assert_eq!((element.start_line, element.end_line), (7, 8));
        assert_eq!(element.source_text, "    def stop(self):\n        pass");

        let outline = analysis.outline.unwrap();
        let roots: Vec<&str> = outline.iter().map(|n| n.element.name.as_str()).collect();
        assert_eq!(roots, vec!["import os", "Service", "main"]);
        assert_eq!(outline[1].children.len(), 2);
    }

    #[test]
    fn test_missing_element_lists_available_names() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("service.py");
        fs::write(&path, SERVICE).unwrap();

        let analysis = Reveal::new(config())
            .analyze(&path, &AnalysisRequest::new().with_element("functions", "restart"))
            .unwrap();
        assert!(analysis.element.is_none());
        match &analysis.warnings[..] {
            [RevealError::ElementNotFound { available, .. }] => {
                assert_eq!(available, &vec!["start", "stop", "main"]);
            }
            other => panic!("unexpected warnings: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_slice_fails_before_io() {
        let request = AnalysisRequest::new().with_slice(SliceRequest {
            head: Some(1),
            tail: Some(1),
            range: None,
        });
        let err = Reveal::new(config())
            .analyze(Path::new("/does/not/exist.py"), &request)
            .unwrap_err();
        assert!(matches!(err, RevealError::InvalidSlice(_)));

        let err = Reveal::new(config())
            .analyze(Path::new("/does/not/exist.py"), &AnalysisRequest::new())
            .unwrap_err();
        assert!(matches!(err, RevealError::Io { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unsupported_file_falls_back_to_text_view() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.unknownext");
        fs::write(&path, "one\ntwo\n").unwrap();

        let mut strict = config();
        strict.allow_fallback = false;
        let analysis = Reveal::new(strict)
            .analyze(&path, &AnalysisRequest::new())
            .unwrap();
        assert_eq!(analysis.extractor, "text");
        assert!(analysis.structure.is_empty());
        assert!(matches!(
            analysis.warnings[..],
            [RevealError::UnsupportedFile { .. }]
        ));
    }

    #[test]
    fn test_invalid_utf8_is_recovered_with_warning() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.txt");
        fs::write(&path, b"ok\n\xff\xfe bad\n").unwrap();

        let analysis = Reveal::new(config())
            .analyze(&path, &AnalysisRequest::new())
            .unwrap();
        assert!(matches!(
            analysis.warnings[..],
            [RevealError::EncodingError { count: 2, .. }]
        ));
    }

    #[test]
    fn test_detection_attaches_owning_element() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("job.py");
        fs::write(
            &path,
            "def run():\n    try:\n        work()\n    except:\n        pass\n",
        )
        .unwrap();

        let analysis = Reveal::new(config())
            .analyze(
                &path,
                &AnalysisRequest::new().with_detection(RuleFilter::default()),
            )
            .unwrap();
        let report = analysis.detections.unwrap();
        assert!(report.skipped.is_empty());
        let bare = report.findings.iter().find(|f| f.rule_id == "B001").unwrap();
        assert_eq!(bare.line, 4);
        assert_eq!(bare.element.as_deref(), Some("run"));
    }

    struct Slow(DetectorDescriptor);

    impl Detector for Slow {
        fn descriptor(&self) -> &DetectorDescriptor {
            &self.0
        }

        fn detect(&self, _: &Path, _: &StructureMap, content: &str) -> anyhow::Result<Vec<Finding>> {
            if content.contains("slow") {
                thread::sleep(Duration::from_secs(2));
            }
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_batch_keeps_input_order_and_times_out_per_file() {
        let temp = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for (name, text) in [("a.txt", "fast"), ("b.txt", "slow"), ("c.txt", "fast")] {
            let path = temp.path().join(name);
            fs::write(&path, text).unwrap();
            paths.push(path);
        }
        paths.push(temp.path().join("missing.txt"));

        let mut config = config();
        config.timeout_ms = 200;
        let mut rules = RuleEngine::new();
        rules.register(Arc::new(Slow(DetectorDescriptor::builtin(
            "PERF900",
            "slow",
            RuleCategory::Performance,
            Severity::Low,
            &["*"],
        ))));
        let reveal = Reveal::with_parts(config.clone(), AnalyzerRegistry::discover(&config), rules);

        let request = AnalysisRequest::new().with_detection(RuleFilter::default());
        let results = reveal.analyze_batch(&paths, &request);
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().metadata.name, "a.txt");
        assert!(matches!(results[1], Err(RevealError::Timeout { .. })));
        assert_eq!(results[2].as_ref().unwrap().metadata.name, "c.txt");
        assert!(matches!(results[3], Err(RevealError::Io { .. })));
    }

    struct Counting {
        descriptor: DetectorDescriptor,
        live: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    impl Detector for Counting {
        fn descriptor(&self) -> &DetectorDescriptor {
            &self.descriptor
        }

        fn detect(&self, _: &Path, _: &StructureMap, _: &str) -> anyhow::Result<Vec<Finding>> {
            let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(300));
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_timed_out_analyses_still_count_against_jobs() {
        let temp = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| {
                let path = temp.path().join(format!("f{}.txt", i));
                fs::write(&path, "content").unwrap();
                path
            })
            .collect();

        let mut config = config();
        config.jobs = 1;
        config.timeout_ms = 50;
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let mut rules = RuleEngine::new();
        rules.register(Arc::new(Counting {
            descriptor: DetectorDescriptor::builtin(
                "PERF901",
                "counting",
                RuleCategory::Performance,
                Severity::Low,
                &["*"],
            ),
            live: Arc::clone(&live),
            peak: Arc::clone(&peak),
            finished: Arc::clone(&finished),
        }));
        let reveal = Reveal::with_parts(config.clone(), AnalyzerRegistry::discover(&config), rules);

        let request = AnalysisRequest::new().with_detection(RuleFilter::default());
        let results = reveal.analyze_batch(&paths, &request);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(RevealError::Timeout { .. }))));

        // Abandoned threads drain one at a time
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while finished.load(Ordering::SeqCst) < 6 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(finished.load(Ordering::SeqCst), 6);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
