use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Once};
use std::thread;
use std::time::Duration;

use ocrt_core::code::{ClosureCompiler, CodeBody, Codegen, Expr, PrimOp};
use ocrt_core::era::{bump_era, current_era};
use ocrt_core::hooks::PrecompileRecord;
use ocrt_core::method::{Artifact, CallConv, Namespace, Template};
use ocrt_core::{CodeBodyRequest, CompilePolicy, Engine, ReturnBounds, RuntimeOptions, Type, Val, call};

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ocrt=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Slow codegen so concurrent constructions pile up on the compile lock.
#[derive(Default)]
struct SlowCodegen {
    inner: ClosureCompiler,
    compiles: AtomicUsize,
}

impl Codegen for SlowCodegen {
    fn compile(&self, artifact: &Artifact) -> bool {
        thread::sleep(Duration::from_millis(20));
        let did = self.inner.compile(artifact);
        if did {
            self.compiles.fetch_add(1, Ordering::SeqCst);
        }
        did
    }
}

fn add_template() -> Arc<Template> {
    Arc::new(Template::new(
        Namespace::new("Test"),
        "add",
        3,
        false,
        CodeBody::new(Expr::prim(PrimOp::Add, [Expr::slot(1), Expr::slot(2)])),
    ))
}

#[test]
fn concurrent_constructions_compile_once() {
    init_tracing();
    let codegen = Arc::new(SlowCodegen::default());
    let engine = Engine::builder().codegen(codegen.clone()).build();
    let template = add_template();
    let argt = Type::tuple([Type::Int, Type::Int]);
    let era = current_era();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let closures: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    engine
                        .from_template(&template, &argt, &ReturnBounds::unbounded(), Val::Nil, era, true)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(codegen.compiles.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().compilations(), 1);
    assert_eq!(engine.stats().inferences(), 1);
    let first = closures[0].native_entry().unwrap();
    for oc in &closures {
        assert!(oc.native_entry().unwrap().ptr_eq(first));
        assert_eq!(call(oc, &[Val::Int(1), Val::Int(2)]).unwrap(), Val::Int(3));
    }
}

/// Lowers on every request, even when the artifact already has an entry.
#[derive(Default)]
struct EagerCodegen {
    inner: ClosureCompiler,
    lowerings: AtomicUsize,
}

impl Codegen for EagerCodegen {
    fn compile(&self, artifact: &Artifact) -> bool {
        thread::sleep(Duration::from_millis(20));
        let Some(entry) = self.inner.lower(artifact) else {
            return false;
        };
        self.lowerings.fetch_add(1, Ordering::SeqCst);
        artifact.install_native(entry, CallConv::Args)
    }
}

#[test]
fn concurrent_constructions_share_one_generic_wrapper() {
    init_tracing();
    let codegen = Arc::new(EagerCodegen::default());
    let engine = Engine::builder()
        .options(RuntimeOptions::default().with_compile(CompilePolicy::Min))
        .codegen(codegen.clone())
        .build();
    let template = add_template();
    let argt = Type::tuple([Type::Int, Type::Int]);
    let era = current_era();
    let threads = 8;
    let barrier = Barrier::new(threads);

    let closures: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    engine
                        .from_template(&template, &argt, &ReturnBounds::unbounded(), Val::Nil, era, true)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(codegen.lowerings.load(Ordering::SeqCst), 1);
    assert_eq!(engine.stats().generic_wrappers(), 1);
    assert_eq!(engine.stats().compilations(), 0);
    let first = closures[0].native_entry().unwrap();
    for oc in &closures {
        assert!(oc.native_entry().unwrap().ptr_eq(first));
        assert_eq!(call(oc, &[Val::Int(4), Val::Int(5)]).unwrap(), Val::Int(9));
    }
}

#[test]
fn concurrent_calls_share_one_closure() {
    init_tracing();
    let engine = Engine::new(RuntimeOptions::default());
    let body = CodeBody::new(Expr::prim(PrimOp::Mul, [Expr::Capture(0), Expr::slot(1)]));
    let oc = engine
        .from_code_body(CodeBodyRequest::new(Type::tuple([Type::Int]), body).env(Val::tuple([Val::Int(3)])))
        .unwrap();

    thread::scope(|s| {
        for t in 0..4i64 {
            let oc = &oc;
            s.spawn(move || {
                for i in 0..100i64 {
                    let n = t * 100 + i;
                    assert_eq!(call(oc, &[Val::Int(n)]).unwrap(), Val::Int(3 * n));
                }
            });
        }
    });
}

#[test]
fn compiled_specializations_survive_era_bumps() {
    init_tracing();
    let engine = Engine::new(RuntimeOptions::default());
    let template = add_template();
    let argt = Type::tuple([Type::Int, Type::Int]);

    engine
        .from_template(&template, &argt, &ReturnBounds::unbounded(), Val::Nil, current_era(), true)
        .unwrap();
    let later = bump_era();
    let oc = engine
        .from_template(&template, &argt, &ReturnBounds::unbounded(), Val::Nil, later, true)
        .unwrap();
    assert_eq!(engine.stats().compilations(), 1);
    assert_eq!(oc.era(), later);
    assert_eq!(call(&oc, &[Val::Int(2), Val::Int(2)]).unwrap(), Val::Int(4));
}

#[test]
fn trace_compile_appends_json_lines() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compiled.jsonl");
    let engine = Engine::new(RuntimeOptions::default().with_trace_compile(&path));
    let argt = Type::tuple([Type::Int, Type::Int]);
    let template = add_template();

    for _ in 0..2 {
        engine
            .from_template(&template, &argt, &ReturnBounds::unbounded(), Val::Nil, current_era(), true)
            .unwrap();
    }
    engine
        .from_template(&template, &argt, &ReturnBounds::unbounded(), Val::Int(0), current_era(), true)
        .unwrap();

    let lines: Vec<serde_json::Value> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2, "only fresh compilations are recorded");
    assert_eq!(lines[0]["template"], "add");
    assert_eq!(lines[0]["namespace"], "Test");
    assert_eq!(lines[0]["signature"], "Tuple{Nil, Int, Int}");
    assert_eq!(lines[1]["signature"], "Tuple{Int, Int, Int}");

    let expected = PrecompileRecord {
        template: "add".to_string(),
        namespace: "Test".to_string(),
        signature: "Tuple{Nil, Int, Int}".to_string(),
    };
    assert_eq!(serde_json::to_value(&expected).unwrap(), lines[0]);
}

#[test]
fn options_from_toml_drive_the_engine() {
    init_tracing();
    let options = RuntimeOptions::from_toml_str("compile = \"min\"\nmax_native_body_nodes = 64\n").unwrap();
    assert_eq!(options.compile, CompilePolicy::Min);
    let engine = Engine::new(options);
    let oc = engine
        .from_code_body(CodeBodyRequest::new(
            Type::tuple([Type::Int, Type::Int]),
            CodeBody::new(Expr::prim(PrimOp::Sub, [Expr::slot(1), Expr::slot(2)])),
        ))
        .unwrap();
    assert_eq!(engine.stats().compilations(), 0);
    assert!(oc.native_entry().is_some());
    assert_eq!(call(&oc, &[Val::Int(5), Val::Int(7)]).unwrap(), Val::Int(-2));
}

#[test]
fn global_engine_entry_points() {
    init_tracing();
    let oc = ocrt_core::closure::new_constant_closure(&Type::Tuple(Vec::new()), &Type::String, Val::from("hi")).unwrap();
    assert_eq!(call(&oc, &[]).unwrap(), Val::from("hi"));
    assert!(Engine::global().allocator().objects() >= 1);
}
