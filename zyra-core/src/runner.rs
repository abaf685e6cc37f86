//! zyra's request file runner.
//!
//! Every file goes through the same pipeline:
//!
//! ```text
//! load + parse --> merge context --> resolve --> build request --> send --> assertions
//!   (Parse)                         (Resolve)     (Transport)   (Transport)  (failures)
//! ```
//!
//! Parse, resolve and transport errors end the run with the offending file path.
//! Assertion failures never do: they are collected into the file's [`FileResult`].
use eyre::WrapErr;
use futures::{stream::FuturesUnordered, StreamExt};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Semaphore;
use tracing::*;

use crate::{
    assertion::{self, Registry},
    config::Config,
    http::{Request, Response, Transport},
    loader,
    model::{Assertion, Document},
    reporter::{Reporter, Summary},
    resolver::{self, Context},
    Error,
};

/// One failed assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Line of the assertion in its source file.
    pub line: usize,
    /// The assertion as written in the request file, e.g. `res.status eq 200`. Config
    /// assertions are rendered from their parsed form.
    pub assertion: String,
    pub reason: String,
    /// The assertion comes from the config file rather than the request file.
    pub global: bool,
}

/// Outcome of running one request file.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub file: PathBuf,
    pub doc_comment: Option<String>,
    pub request: Request,
    pub response: Response,
    /// Empty when every assertion passed or assertions were skipped.
    pub failures: Vec<Failure>,
}

impl FileResult {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Run files concurrently instead of one after another.
    pub concurrent: bool,
    /// Max files in flight in concurrent mode. `None` means unbounded.
    pub concurrency: Option<usize>,
    /// Send requests without evaluating assertions.
    pub no_test: bool,
}

/// Read-only state shared by every unit of work.
#[derive(Clone)]
struct Shared {
    cfg: Arc<Config>,
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    no_test: bool,
}

pub struct Runner {
    shared: Shared,
    options: Options,
    reporters: Vec<Box<dyn Reporter + Send>>,
}

impl Runner {
    pub fn new(cfg: Config, registry: Registry, transport: impl Transport + 'static) -> Runner {
        Runner::with_shared(Arc::new(cfg), Arc::new(registry), Arc::new(transport))
    }

    pub fn with_shared(
        cfg: Arc<Config>,
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
    ) -> Runner {
        Runner {
            shared: Shared {
                cfg,
                registry,
                transport,
                no_test: false,
            },
            options: Options::default(),
            reporters: Vec::new(),
        }
    }

    pub fn set_options(&mut self, options: Options) {
        self.shared.no_test = options.no_test;
        self.options = options;
    }

    pub fn concurrent(&mut self) {
        self.options.concurrent = true;
    }

    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.options.concurrency = Some(concurrency);
    }

    pub fn no_test(&mut self) {
        self.options.no_test = true;
        self.shared.no_test = true;
    }

    pub fn add_reporter(&mut self, reporter: impl Reporter + 'static + Send) {
        self.reporters.push(Box::new(reporter));
    }

    pub fn add_boxed_reporter(&mut self, reporter: Box<dyn Reporter + 'static + Send>) {
        self.reporters.push(reporter);
    }

    /// Discover request files under `path` and run them.
    pub async fn run_path(&mut self, path: &Path) -> eyre::Result<Vec<FileResult>> {
        let files = loader::discover(path)?;
        self.run(&files).await
    }

    /// Run `files`. Results are reported and returned in the order of `files`.
    pub async fn run(&mut self, files: &[PathBuf]) -> eyre::Result<Vec<FileResult>> {
        if files.is_empty() {
            warn!("no request files to run");
        }

        let results = if self.options.concurrent {
            self.run_concurrent(files).await?
        } else {
            self.run_sequential(files).await?
        };

        let summary = Summary::of(&results);
        for reporter in &mut self.reporters {
            reporter.on_summary(&summary).await?;
        }
        debug!("runner stopped");

        Ok(results)
    }

    async fn run_sequential(&mut self, files: &[PathBuf]) -> eyre::Result<Vec<FileResult>> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let result = execute(&self.shared, file).await?;
            self.emit(&result).await?;
            results.push(result);
        }
        Ok(results)
    }

    /// One task per file. Results are slotted by scan index and reported as soon as every
    /// earlier file has been reported. The first error is returned right away; tasks
    /// already in flight keep running detached.
    async fn run_concurrent(&mut self, files: &[PathBuf]) -> eyre::Result<Vec<FileResult>> {
        let semaphore = self
            .options
            .concurrency
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        let mut handles: FuturesUnordered<_> = files
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, file)| {
                let shared = self.shared.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let _permit = match semaphore {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    (idx, execute(&shared, &file).await)
                })
            })
            .collect();

        let mut slots: Vec<Option<FileResult>> = files.iter().map(|_| None).collect();
        let mut next = 0;
        while let Some(joined) = handles.next().await {
            let (idx, result) = joined.wrap_err("request task terminated unexpectedly")?;
            slots[idx] = Some(result?);

            while let Some(Some(ready)) = slots.get(next) {
                self.emit(ready).await?;
                next += 1;
            }
        }
        debug!("all requests finished");

        Ok(slots.into_iter().flatten().collect())
    }

    async fn emit(&mut self, result: &FileResult) -> eyre::Result<()> {
        for reporter in &mut self.reporters {
            reporter.on_result(result).await?;
        }
        Ok(())
    }
}

/// The per-file pipeline.
async fn execute(shared: &Shared, file: &Path) -> crate::Result<FileResult> {
    let doc = loader::load_document(file)?;

    let ctx = Context::for_document(&shared.cfg, &doc);
    let resolve_err = |source| Error::Resolve {
        file: file.to_path_buf(),
        source,
    };
    let resolved = resolver::resolve_document(&doc, &ctx).map_err(resolve_err)?;
    let globals =
        resolver::resolve_assertions(&shared.cfg.assertions, &ctx).map_err(resolve_err)?;

    let transport_err = |e: crate::http::Error| Error::Transport {
        file: file.to_path_buf(),
        message: e.to_string(),
    };
    let request = Request::build(&resolved, shared.cfg.base_url()).map_err(transport_err)?;
    let response = shared
        .transport
        .send(&request)
        .await
        .map_err(transport_err)?;
    debug!(
        "{}: {} {} -> {}",
        file.display(),
        request.method,
        request.url,
        response.status
    );

    let failures = if shared.no_test {
        Vec::new()
    } else {
        let local = check_all(&shared.registry, &response, &resolved.assertions, Some(&doc));
        let global = check_all(&shared.registry, &response, &globals, None);
        local.chain(global).collect()
    };

    Ok(FileResult {
        file: file.to_path_buf(),
        doc_comment: doc.doc_comment,
        request,
        response,
        failures,
    })
}

/// Evaluate `assertions`, quoting failed ones from `source` when they come from a request
/// file. Config assertions have no retained source and are rendered instead.
fn check_all<'a>(
    registry: &'a Registry,
    response: &'a Response,
    assertions: &'a [Assertion],
    source: Option<&'a Document>,
) -> impl Iterator<Item = Failure> + 'a {
    assertions.iter().filter_map(move |a| {
        let reason = assertion::evaluate(registry, response, a).err()?;
        trace!("line {}: `{a}` failed: {reason}", a.line);
        let written = source
            .and_then(|doc| doc.line(a.line))
            .map(|line| line.trim().to_string());
        Some(Failure {
            line: a.line,
            assertion: written.unwrap_or_else(|| a.to_string()),
            reason,
            global: source.is_none(),
        })
    })
}
