//! Batch transpilation
//!
//! Callables never share state, so a module's callables are finalized on a
//! pool of scoped workers pulling from one injector queue. A failing callable
//! is reported under its qualified name and never stops the others.

use crate::callable::Callable;
use crate::config::TargetConfig;
use crate::error::CompileError;
use crate::scope::{ClassScope, ModuleScope, Scope};
use cafe_bytecode::MethodRecord;
use crossbeam_deque::{Injector, Steal};
use tracing::{debug, warn};

/// A callable that could not be transpiled
#[derive(Debug)]
pub struct CallableFailure {
    pub qualified_name: String,
    pub error: CompileError,
}

/// Outcome of one batch, in declaration order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<MethodRecord>,
    pub failures: Vec<CallableFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Find an exported record by target name
    pub fn record(&self, name: &str) -> Option<&MethodRecord> {
        self.records.iter().find(|record| record.name == name)
    }
}

struct Job<'s> {
    order: usize,
    scope: &'s (dyn Scope + Sync),
    callable: Callable,
}

/// Transpile every function, entry point and class member of a module
pub fn transpile_module(mut module: ModuleScope, config: &TargetConfig) -> BatchReport {
    let functions = module.take_callables();
    let members: Vec<Vec<Callable>> = module
        .classes_mut()
        .iter_mut()
        .map(ClassScope::take_callables)
        .collect();

    let mut jobs = Vec::new();
    for callable in functions {
        jobs.push(Job {
            order: jobs.len(),
            scope: &module,
            callable,
        });
    }
    for (class, callables) in module.classes().iter().zip(members) {
        for callable in callables {
            jobs.push(Job {
                order: jobs.len(),
                scope: class,
                callable,
            });
        }
    }

    run(jobs, config)
}

/// Transpile the members of a single class
pub fn transpile_class(mut class: ClassScope, config: &TargetConfig) -> BatchReport {
    let callables = class.take_callables();
    let jobs = callables
        .into_iter()
        .enumerate()
        .map(|(order, callable)| Job {
            order,
            scope: &class,
            callable,
        })
        .collect();
    run(jobs, config)
}

fn next_job<T>(injector: &Injector<T>) -> Option<T> {
    loop {
        match injector.steal() {
            Steal::Success(job) => return Some(job),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

fn run(jobs: Vec<Job<'_>>, config: &TargetConfig) -> BatchReport {
    let total = jobs.len();
    let workers = config.worker_count(total);
    debug!(callables = total, workers, "transpiling batch");

    let names: Vec<String> = jobs
        .iter()
        .map(|job| job.callable.qualified_name(job.scope))
        .collect();

    let injector = Injector::new();
    for job in jobs {
        injector.push(job);
    }

    let (tx, rx) = crossbeam::channel::unbounded();
    let outcome = crossbeam::scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let injector = &injector;
            s.spawn(move |_| {
                while let Some(job) = next_job(injector) {
                    let result = job.callable.finalize(job.scope, config);
                    if tx.send((job.order, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    if outcome.is_err() {
        warn!("a batch worker panicked; unfinished callables are reported as failures");
    }

    let mut results: Vec<Option<Result<MethodRecord, CompileError>>> =
        (0..total).map(|_| None).collect();
    for (order, result) in rx {
        results[order] = Some(result);
    }

    let mut report = BatchReport::default();
    for (name, result) in names.into_iter().zip(results) {
        let result = result.unwrap_or_else(|| {
            Err(CompileError::InternalError {
                message: "worker stopped before finishing this callable".to_string(),
            })
        });
        match result {
            Ok(record) => report.records.push(record),
            Err(error) => {
                warn!(callable = %name, %error, "callable failed to transpile");
                report.failures.push(CallableFailure {
                    qualified_name: name,
                    error,
                });
            }
        }
    }
    report
}
