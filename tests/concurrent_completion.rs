//! Many threads racing over one compilation
//!
//! Whatever the interleaving, each (symbol, part) batch of diagnostics and
//! each declaration event must reach its consumer exactly once.

mod common;

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use symbol_completion::manifest::{codes, BindCounts};
use symbol_completion::{
    CancellationToken, Completable, CompletionPart, ConstantValue, EngineConfig, ErrorCode,
    ManifestBinder, SemanticBinder, SymbolKind,
};

const NAMESPACES: usize = 4;
const METHODS: usize = 12;

/// One module with `namespaces` namespaces of `methods` methods each. Every
/// third method is async with a non-task return type; every method has two
/// constants, the second derived from the first.
fn wide_manifest(namespaces: usize, methods: usize) -> String {
    let mut out = String::from(
        "[[modules]]\nname = \"App\"\nfile = \"app.cs\"\nattributes = [\"Flags\", \"Missing\"]\n",
    );
    for n in 0..namespaces {
        let base = (n * 1000) as u32;
        writeln!(
            out,
            "\n[[modules.namespaces]]\nname = \"Ns{}\"\nspan = [{}, {}]",
            n,
            base,
            base + 999
        )
        .unwrap();
        for m in 0..methods {
            let start = base + (m as u32) * 10 + 1;
            writeln!(
                out,
                "\n[[modules.namespaces.methods]]\nname = \"M{}\"\nspan = [{}, {}]\nreturns = \"int\"\nasync = {}",
                m,
                start,
                start + 5,
                m % 3 == 0
            )
            .unwrap();
            writeln!(
                out,
                "\n[[modules.namespaces.methods.locals]]\nname = \"a\"\nconst = true\nvalue = {{ int = {} }}",
                m
            )
            .unwrap();
            out.push_str(
                "\n[[modules.namespaces.methods.locals]]\nname = \"b\"\nconst = true\nvalue = { mul = [{ local = \"a\" }, { int = 2 }] }\n",
            );
        }
    }
    out
}

fn slow(delay_ms: u64) -> impl FnOnce(Arc<ManifestBinder>) -> Arc<dyn SemanticBinder> {
    move |inner| -> Arc<dyn SemanticBinder> {
        Arc::new(SlowBinder {
            inner,
            delay: Duration::from_millis(delay_ms),
        })
    }
}

fn async_methods_per_namespace() -> usize {
    (0..METHODS).filter(|m| m % 3 == 0).count()
}

#[test]
fn test_racing_completions_publish_everything_once() {
    let t = TestCompilation::with_binder(
        &wide_manifest(NAMESPACES, METHODS),
        EngineConfig::default(),
        slow(1),
    );

    t.race(16, |t, _| {
        t.compilation
            .force_complete(None, &CancellationToken::none())
            .expect("completion should succeed");
    });

    assert!(t.compilation.is_complete());
    assert_each_part_published_once(&t.sink);
    assert_each_symbol_declared_once(&t.events);

    // module + global namespace + namespaces + methods
    assert_eq!(t.events.events().len(), 1 + 1 + NAMESPACES + NAMESPACES * METHODS);
    assert_eq!(t.events.count_of_kind(SymbolKind::Module), 1);
    assert_eq!(t.events.count_of_kind(SymbolKind::Method), NAMESPACES * METHODS);

    assert_code_count(
        &t.sink,
        ErrorCode::BadAsyncReturnType,
        NAMESPACES * async_methods_per_namespace(),
    );
    assert_custom_code_count(&t.sink, codes::TYPE_NOT_FOUND, 1);

    // Only the START_METHOD_CHECKS winner binds a signature.
    assert_eq!(
        BindCounts::get(&t.binder.counts().signatures),
        NAMESPACES * METHODS
    );

    // Attributes may be bound by every racer, but only one result is kept
    // and its diagnostics are published once.
    let attribute_owners = 1 + NAMESPACES * METHODS;
    let attribute_binds = BindCounts::get(&t.binder.counts().attributes);
    assert!(attribute_binds >= attribute_owners);
    assert!(attribute_binds <= attribute_owners * 16);
    let attribute_batches = t
        .sink
        .batches()
        .iter()
        .filter(|batch| batch.part == CompletionPart::ATTRIBUTES)
        .count();
    assert_eq!(attribute_batches, attribute_owners);
}

/// Implications every snapshot of a completion mask must satisfy
fn assert_ordered(name: &str, parts: CompletionPart) {
    let pairs = [
        (
            CompletionPart::START_VALIDATING_REFERENCED_ASSEMBLIES,
            CompletionPart::FINISH_VALIDATING_REFERENCED_ASSEMBLIES,
        ),
        (
            CompletionPart::START_METHOD_CHECKS,
            CompletionPart::FINISH_METHOD_CHECKS,
        ),
        (
            CompletionPart::START_ASYNC_METHOD_CHECKS,
            CompletionPart::FINISH_ASYNC_METHOD_CHECKS,
        ),
    ];
    for (start, finish) in pairs {
        assert!(
            !parts.contains(finish) || parts.contains(start),
            "{}: {:?} without {:?} in {:?}",
            name,
            finish,
            start,
            parts
        );
    }
    assert!(
        !parts.contains(CompletionPart::START_ASYNC_METHOD_CHECKS)
            || parts.contains(CompletionPart::FINISH_METHOD_CHECKS),
        "{}: async checks started before method checks finished: {:?}",
        name,
        parts
    );
    assert!(
        !parts.contains(CompletionPart::FINISH_ASYNC_METHOD_CHECKS)
            || parts.contains(CompletionPart::START_METHOD_CHECKS),
        "{}: async checks finished without method checks: {:?}",
        name,
        parts
    );
}

#[test]
fn test_parts_stay_ordered_while_threads_race() {
    let t = TestCompilation::with_binder(
        &wide_manifest(NAMESPACES, METHODS),
        EngineConfig::default(),
        slow(1),
    );

    let mut watched: Vec<(String, Arc<dyn Completable>)> = vec![(
        "App".to_string(),
        Arc::clone(t.module()) as Arc<dyn Completable>,
    )];
    for namespace in t.module().global_namespace().members() {
        let namespace = namespace.as_namespace().expect("only namespaces at top level");
        for member in namespace.members() {
            let method = member.as_method().expect("only methods inside namespaces");
            watched.push((method.qualified_name(), Arc::clone(method) as Arc<dyn Completable>));
        }
    }

    let done = AtomicBool::new(false);
    thread::scope(|scope| {
        let observer = scope.spawn(|| {
            let mut passes = 0usize;
            loop {
                let finished = done.load(Ordering::Acquire);
                for (name, symbol) in &watched {
                    assert_ordered(name, symbol.completion_state().completed_parts());
                }
                passes += 1;
                if finished {
                    return passes;
                }
            }
        });

        let racers: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    t.compilation
                        .force_complete(None, &CancellationToken::none())
                        .expect("completion should succeed")
                })
            })
            .collect();
        for racer in racers {
            racer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        assert!(observer.join().unwrap() >= 1);
    });

    assert!(t.compilation.is_complete());
    for (name, symbol) in &watched {
        let parts = symbol.completion_state().completed_parts();
        assert_ordered(name, parts);
        assert_eq!(parts, CompletionPart::ALL);
    }
}

#[test]
fn test_mixed_entry_points_agree() {
    let t = TestCompilation::with_binder(
        &wide_manifest(2, METHODS),
        EngineConfig::default(),
        slow(1),
    );
    let token = CancellationToken::none();

    t.race(12, |t, index| match index % 4 {
        0 => t.compilation.force_complete(None, &token).unwrap(),
        1 => {
            let method = t.method("Ns1.M3");
            assert_eq!(method.return_type(&token).unwrap().name, "int");
        }
        2 => {
            let local = t.local("Ns0.M5.b");
            assert_eq!(local.constant_value(&token).unwrap(), Some(&ConstantValue::Int(10)));
        }
        _ => {
            let namespace = t.namespace("Ns1");
            assert_eq!(namespace.members_named("M7", &token).unwrap().len(), 1);
        }
    });

    t.complete();

    assert!(t.compilation.is_complete());
    assert_each_part_published_once(&t.sink);
    assert_each_symbol_declared_once(&t.events);
    assert_code_count(
        &t.sink,
        ErrorCode::BadAsyncReturnType,
        2 * async_methods_per_namespace(),
    );
}

#[test]
fn test_waiting_readers_see_the_finished_signature() {
    let t = TestCompilation::with_binder(
        r#"
        [[modules]]
        name = "App"

        [[modules.methods]]
        name = "Slow"
        returns = "long"

        [[modules.methods.parameters]]
        name = "count"
        type = "int"
        "#,
        EngineConfig::default(),
        slow(25),
    );
    let method = t.method("Slow");

    t.race(8, |_, _| {
        let signature = method.signature(&CancellationToken::none()).unwrap();
        assert_eq!(signature.return_type.name, "long");
        assert_eq!(signature.parameters.len(), 1);
    });

    assert!(method.has_complete(CompletionPart::METHOD_CHECKS));
    assert!(!method.has_complete(CompletionPart::START_ASYNC_METHOD_CHECKS));
    assert_eq!(BindCounts::get(&t.binder.counts().signatures), 1);
    assert_eq!(
        t.sink
            .publish_count(method.id(), CompletionPart::FINISH_METHOD_CHECKS),
        1
    );
    assert_eq!(t.events.count_for("Slow"), 1);
}

#[test]
fn test_sequential_and_parallel_fan_out_report_the_same() {
    let manifest = wide_manifest(3, 10);

    let mut sequential = EngineConfig::default();
    sequential.fan_out.parallel = false;
    let mut parallel = EngineConfig::default();
    parallel.fan_out.parallel = true;
    parallel.fan_out.min_children = 2;

    let a = TestCompilation::with_config(&manifest, sequential);
    let b = TestCompilation::with_config(&manifest, parallel);
    a.complete();
    b.complete();

    assert!(a.compilation.is_complete());
    assert!(b.compilation.is_complete());
    assert_eq!(a.sink.sorted_diagnostics(), b.sink.sorted_diagnostics());

    let mut a_names: Vec<_> = a.events.events().into_iter().map(|e| e.name).collect();
    let mut b_names: Vec<_> = b.events.events().into_iter().map(|e| e.name).collect();
    a_names.sort();
    b_names.sort();
    assert_eq!(a_names, b_names);
}

#[test]
fn test_repeat_completion_publishes_nothing_new() {
    let t = TestCompilation::from_toml(&wide_manifest(1, 4));
    t.complete();
    let batches = t.sink.batches().len();
    let events = t.events.events().len();

    t.complete();
    t.complete();

    assert_eq!(t.sink.batches().len(), batches);
    assert_eq!(t.events.events().len(), events);
}
