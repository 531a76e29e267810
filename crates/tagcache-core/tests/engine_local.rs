//! Engine behaviour against the local adapter.
//!
//! A `Garage` fixture counts how often its operations really run, so each test
//! can tell cache hits from recomputations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parking_lot::Mutex;
use tagcache_core::{
    CacheAdapter, CacheEngine, CacheError, CachePolicy, CacheScope, CacheableOperation,
    CachedProperty, EvictPolicy, LocalCacheAdapter, OperationId, cache_args,
};

type Result<T> = std::result::Result<T, CacheError>;

fn op(name: &str, params: &[&str], policy: CachePolicy) -> CacheableOperation {
    CacheableOperation::new(OperationId::new(name, params), policy).unwrap()
}

static CALC: LazyLock<CacheableOperation> =
    LazyLock::new(|| op("garage::calc", &["Option<&str>", "Option<&str>"], CachePolicy::new()));
static CALC_NO_PARAM: LazyLock<CacheableOperation> =
    LazyLock::new(|| op("garage::calc", &[], CachePolicy::new()));
static CALC_NO_PARAM_2: LazyLock<CacheableOperation> =
    LazyLock::new(|| op("garage::calc2", &[], CachePolicy::new()));
static CALC_INT: LazyLock<CacheableOperation> =
    LazyLock::new(|| op("garage::calc_overloaded", &["i32"], CachePolicy::new()));
static CALC_STR: LazyLock<CacheableOperation> =
    LazyLock::new(|| op("garage::calc_overloaded", &["&str"], CachePolicy::new()));
static GET_CARS: LazyLock<CacheableOperation> =
    LazyLock::new(|| op("garage::get_cars", &[], CachePolicy::new().with_tags(["cars"])));
static GET_CAR: LazyLock<CacheableOperation> = LazyLock::new(|| {
    op(
        "garage::get_car",
        &["usize"],
        CachePolicy::new().with_tags(["cars", "car_0", "car_1", "car_2"]),
    )
});
static GET_CAR_ADDING_TAG: LazyLock<CacheableOperation> =
    LazyLock::new(|| op("garage::get_car_adding_tag", &["usize"], CachePolicy::new()));
static GET_CAR_CHANGING_TAG: LazyLock<CacheableOperation> = LazyLock::new(|| {
    op(
        "garage::get_car_changing_tag",
        &["usize"],
        CachePolicy::new().with_tags(["car_"]),
    )
});
static GET_CAR_CHANGING_MISSING_TAG: LazyLock<CacheableOperation> = LazyLock::new(|| {
    op(
        "garage::get_car_changing_missing_tag",
        &["usize"],
        CachePolicy::new().with_tags(["car_"]),
    )
});

struct Garage {
    engine: CacheEngine,
    cars: Mutex<Vec<String>>,
    visits: AtomicUsize,
}

impl Garage {
    fn new() -> Self {
        Self::with_engine(CacheEngine::local())
    }

    fn with_engine(engine: CacheEngine) -> Self {
        Self {
            engine,
            cars: Mutex::new(vec!["carA".into(), "carB".into(), "carC".into()]),
            visits: AtomicUsize::new(0),
        }
    }

    fn visits(&self) -> usize {
        self.visits.load(Ordering::SeqCst)
    }

    fn visit(&self) {
        self.visits.fetch_add(1, Ordering::SeqCst);
    }

    async fn calc(&self, a: Option<&str>, b: Option<&str>) -> String {
        let result: Result<String> = self
            .engine
            .cached(&CALC, &cache_args![a, b], || async {
                self.visit();
                Ok(format!("{}_{}", a.unwrap_or(""), b.unwrap_or("")))
            })
            .await;
        result.unwrap()
    }

    async fn calc_no_param(&self, op: &CacheableOperation, value: &str) -> String {
        let result: Result<String> = self
            .engine
            .cached(op, &[], || async {
                self.visit();
                Ok(value.to_string())
            })
            .await;
        result.unwrap()
    }

    async fn get_cars(&self) -> String {
        let result: Result<String> = self
            .engine
            .cached(&GET_CARS, &[], || async {
                self.visit();
                Ok(self.cars.lock().join(","))
            })
            .await;
        result.unwrap()
    }

    async fn get_car(&self, car: usize) -> String {
        let result: Result<String> = self
            .engine
            .cached(&GET_CAR, &cache_args![car], || async {
                self.visit();
                Ok(self.cars.lock()[car].clone())
            })
            .await;
        result.unwrap()
    }

    async fn get_car_adding_tag(&self, car: usize) -> String {
        let result: Result<String> = self
            .engine
            .cached(&GET_CAR_ADDING_TAG, &cache_args![car], || async {
                self.visit();
                CacheScope::with_current(|ctx| ctx.add_dependency_tag(format!("car_{car}")))?;
                Ok(self.cars.lock()[car].clone())
            })
            .await;
        result.unwrap()
    }

    async fn get_car_changing_tag(&self, car: usize) -> String {
        let result: Result<String> = self
            .engine
            .cached(&GET_CAR_CHANGING_TAG, &cache_args![car], || async {
                self.visit();
                let changed = CacheScope::with_current(|ctx| {
                    ctx.change_dependency_tag("car_", format!("car_{car}"))
                })?;
                assert!(changed);
                Ok(self.cars.lock()[car].clone())
            })
            .await;
        result.unwrap()
    }

    async fn get_car_changing_missing_tag(&self, car: usize) -> String {
        let result: Result<String> = self
            .engine
            .cached(&GET_CAR_CHANGING_MISSING_TAG, &cache_args![car], || async {
                self.visit();
                let changed = CacheScope::with_current(|ctx| {
                    ctx.change_dependency_tag("carM_", format!("carM_{car}"))
                })?;
                assert!(!changed);
                Ok(self.cars.lock()[car].clone())
            })
            .await;
        result.unwrap()
    }

    async fn update(&self, car: usize, name: &str) {
        self.cars.lock()[car] = name.to_string();
        self.engine
            .adapter()
            .evict_all(None, &["cars".to_string()])
            .await;
    }

    async fn update_evicting(&self, policy: &EvictPolicy, car: usize, name: &str) {
        self.engine
            .evicting(policy, || async {
                self.cars.lock()[car] = name.to_string();
            })
            .await;
    }
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn test_general_caching() {
    let garage = Garage::new();

    assert_eq!(garage.calc(Some("a"), Some("b")).await, "a_b");
    assert_eq!(garage.calc(Some("a"), Some("b")).await, "a_b");
    assert_eq!(garage.visits(), 1);

    assert_eq!(garage.calc(Some("c"), Some("d")).await, "c_d");
    assert_eq!(garage.calc(Some("c"), Some("d")).await, "c_d");
    assert_eq!(garage.visits(), 2);
}

#[tokio::test]
async fn test_no_parameter() {
    let garage = Garage::new();

    assert_eq!(garage.calc_no_param(&CALC_NO_PARAM, "noparam").await, "noparam");
    assert_eq!(garage.calc_no_param(&CALC_NO_PARAM, "noparam").await, "noparam");
    assert_eq!(garage.calc_no_param(&CALC_NO_PARAM_2, "noparam2").await, "noparam2");
    assert_eq!(garage.calc_no_param(&CALC_NO_PARAM_2, "noparam2").await, "noparam2");
    assert_eq!(garage.visits(), 2);
}

#[tokio::test]
async fn test_overloaded() {
    let engine = CacheEngine::local();

    let int: Result<String> = engine
        .cached(&CALC_INT, &cache_args![1], || async { Ok("int_1".to_string()) })
        .await;
    let text: Result<String> = engine
        .cached(&CALC_STR, &cache_args!["1"], || async { Ok("string_1".to_string()) })
        .await;

    assert_eq!(int.unwrap(), "int_1");
    assert_eq!(text.unwrap(), "string_1");
}

#[tokio::test]
async fn test_null_params() {
    let garage = Garage::new();

    assert_eq!(garage.calc(None, None).await, "_");
    assert_eq!(garage.calc(Some(""), None).await, "_");
    assert_eq!(garage.calc(None, Some("")).await, "_");
    assert_eq!(garage.calc(Some("null"), Some("null")).await, "null_null");
    assert_eq!(garage.calc_no_param(&CALC_NO_PARAM, "noparam").await, "noparam");
    assert_eq!(garage.visits(), 5);
}

#[tokio::test]
async fn test_evict() {
    let garage = Garage::new();

    assert_eq!(garage.get_cars().await, "carA,carB,carC");
    assert_eq!(garage.get_cars().await, "carA,carB,carC");
    assert_eq!(garage.visits(), 1);

    garage.update(0, "carAAA").await;
    assert_eq!(garage.get_cars().await, "carAAA,carB,carC");
    assert_eq!(garage.get_cars().await, "carAAA,carB,carC");
    assert_eq!(garage.visits(), 2);

    garage.update(0, "carAAA2").await;
    garage.get_cars().await;
    garage.get_cars().await;
    assert_eq!(garage.visits(), 3);
}

#[tokio::test]
async fn test_evict_multiple_functions() {
    let garage = Garage::new();

    assert_eq!(garage.get_cars().await, "carA,carB,carC");
    assert_eq!(garage.get_car(1).await, "carB");
    assert_eq!(garage.visits(), 2);

    garage.update(1, "carBBB").await;
    assert_eq!(garage.get_cars().await, "carA,carBBB,carC");
    assert_eq!(garage.get_car(1).await, "carBBB");
    assert_eq!(garage.visits(), 4);
}

#[tokio::test]
async fn test_evict_one_function() {
    let garage = Garage::new();
    garage.get_cars().await;
    garage.get_cars().await;
    garage.get_car(1).await;
    garage.get_car(1).await;
    assert_eq!(garage.visits(), 2);

    garage.engine.adapter().evict_all(None, &tags(&["car_1"])).await;

    garage.get_car(1).await;
    garage.get_car(1).await;
    assert_eq!(garage.visits(), 3);

    garage.get_cars().await;
    assert_eq!(garage.visits(), 3);
}

#[tokio::test]
async fn test_evict_all_intersection_of_functions() {
    let garage = Garage::new();
    garage.get_cars().await;
    garage.get_car(0).await;

    garage
        .engine
        .adapter()
        .evict_all(None, &tags(&["cars", "car_0"]))
        .await;

    garage.get_car(0).await;
    assert_eq!(garage.visits(), 3);
    garage.get_cars().await;
    assert_eq!(garage.visits(), 3);
}

#[tokio::test]
async fn test_evict_all_unknown_tag() {
    let garage = Garage::new();
    garage.get_cars().await;
    garage.get_car(0).await;

    garage.engine.adapter().evict_all(None, &tags(&["junk"])).await;

    garage.get_car(0).await;
    garage.get_cars().await;
    assert_eq!(garage.visits(), 2);
}

#[tokio::test]
async fn test_add_dependency_at_runtime() {
    let garage = Garage::new();
    garage.get_car_adding_tag(0).await;
    garage.get_car_adding_tag(0).await;
    assert_eq!(garage.visits(), 1);

    garage.engine.adapter().evict_all(None, &tags(&["car_0"])).await;

    garage.get_car_adding_tag(0).await;
    garage.get_car_adding_tag(0).await;
    assert_eq!(garage.visits(), 2);
}

#[tokio::test]
async fn test_change_existing_dependency() {
    let garage = Garage::new();
    garage.get_car_changing_tag(0).await;
    garage.get_car_changing_tag(0).await;
    assert_eq!(garage.visits(), 1);

    garage.engine.adapter().evict_all(None, &tags(&["car_0"])).await;

    garage.get_car_changing_tag(0).await;
    garage.get_car_changing_tag(0).await;
    assert_eq!(garage.visits(), 2);
}

#[tokio::test]
async fn test_change_missing_dependency() {
    let garage = Garage::new();
    garage.get_car_changing_missing_tag(0).await;
    garage.get_car_changing_missing_tag(0).await;

    garage
        .engine
        .adapter()
        .evict_any(None, &tags(&["car_0", "carM_0"]))
        .await;

    garage.get_car_changing_missing_tag(0).await;
    assert_eq!(garage.visits(), 1);
}

#[tokio::test]
async fn test_evict_any() {
    let garage = Garage::new();
    garage.get_cars().await;
    garage.get_cars().await;
    garage.get_car(0).await;
    garage.get_car(0).await;
    assert_eq!(garage.visits(), 2);

    garage
        .engine
        .adapter()
        .evict_any(None, &tags(&["cars", "car_0", "car_1", "car_2", "junk"]))
        .await;

    garage.get_cars().await;
    garage.get_cars().await;
    garage.get_car(0).await;
    garage.get_car(0).await;
    assert_eq!(garage.visits(), 4);
}

#[tokio::test]
async fn test_evict_any_none() {
    let garage = Garage::new();
    garage.get_cars().await;
    garage.get_car(0).await;

    garage
        .engine
        .adapter()
        .evict_any(None, &tags(&["car_5", "car_6"]))
        .await;

    garage.get_cars().await;
    garage.get_car(0).await;
    assert_eq!(garage.visits(), 2);
}

#[tokio::test]
async fn test_evict_policy_any() {
    let garage = Garage::new();
    garage.get_cars().await;
    garage.get_car(0).await;

    garage
        .update_evicting(&EvictPolicy::any(["cars", "car_0", "junk"]), 0, "carAAA")
        .await;

    assert_eq!(garage.get_car(0).await, "carAAA");
    assert_eq!(garage.visits(), 3);
    assert_eq!(garage.get_cars().await, "carAAA,carB,carC");
    assert_eq!(garage.visits(), 4);
}

#[tokio::test]
async fn test_evict_policy_all() {
    let garage = Garage::new();
    garage.get_cars().await;
    garage.get_car(0).await;

    garage
        .update_evicting(&EvictPolicy::all(["cars", "car_0"]), 0, "carAAA")
        .await;

    assert_eq!(garage.get_car(0).await, "carAAA");
    assert_eq!(garage.visits(), 3);
    // only get_car carries both tags
    assert_eq!(garage.get_cars().await, "carA,carB,carC");
    assert_eq!(garage.visits(), 3);
}

#[tokio::test]
async fn test_evicting_runs_after_failure() {
    let garage = Garage::new();
    garage.get_cars().await;

    let failed: Result<()> = garage
        .engine
        .evicting(&EvictPolicy::any(["cars"]), || async {
            Err(CacheError::invalid_operation("update failed"))
        })
        .await;
    assert!(failed.is_err());

    garage.get_cars().await;
    assert_eq!(garage.visits(), 2);
}

#[tokio::test]
async fn test_cache_names() {
    let engine = CacheEngine::local();
    let visits = AtomicUsize::new(0);
    let default = op("names::get_car", &["usize"], CachePolicy::new().with_tags(["cars"]));
    let n1 = op(
        "names::get_car_1",
        &["usize"],
        CachePolicy::new().with_tags(["cars"]).with_cache_name("n1"),
    );
    let n2 = op(
        "names::get_car_2",
        &["usize"],
        CachePolicy::new().with_tags(["cars"]).with_cache_name("n2"),
    );

    let run = |op: &CacheableOperation| {
        let engine = &engine;
        let visits = &visits;
        let op = op.clone();
        async move {
            let result: Result<String> = engine
                .cached(&op, &cache_args![1usize], || async {
                    visits.fetch_add(1, Ordering::SeqCst);
                    Ok("car_1".to_string())
                })
                .await;
            result.unwrap()
        }
    };

    for op in [&default, &n1, &n2] {
        run(op).await;
        run(op).await;
    }
    assert_eq!(visits.load(Ordering::SeqCst), 3);

    engine
        .evict(&EvictPolicy::any(["cars"]).with_cache_name("n1"))
        .await;

    run(&default).await;
    run(&n2).await;
    assert_eq!(visits.load(Ordering::SeqCst), 3);
    run(&n1).await;
    assert_eq!(visits.load(Ordering::SeqCst), 4);

    engine.evict(&EvictPolicy::any(["cars"])).await;
    run(&default).await;
    run(&n2).await;
    assert_eq!(visits.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_expiration() {
    let engine = CacheEngine::local();
    let short = op(
        "expiring::calc",
        &[],
        CachePolicy::with_life_span(Duration::from_millis(10)),
    );
    let visits = AtomicUsize::new(0);

    for _ in 0..2 {
        let _: Result<u32> = engine
            .cached(&short, &[], || async {
                visits.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
    }
    assert_eq!(visits.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let _: Result<u32> = engine
        .cached(&short, &[], || async {
            visits.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;
    assert_eq!(visits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_disable_caching_from_operation() {
    let engine = CacheEngine::local();
    let calc = op("context::calc", &[], CachePolicy::new());
    let visits = AtomicUsize::new(0);

    for _ in 0..2 {
        let value: Result<String> = engine
            .cached(&calc, &[], || async {
                visits.fetch_add(1, Ordering::SeqCst);
                CacheScope::with_current(|ctx| ctx.disable_caching())?;
                Ok("uncached".to_string())
            })
            .await;
        assert_eq!(value.unwrap(), "uncached");
    }
    assert_eq!(visits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_context_key_visible_to_operation() {
    let engine = CacheEngine::local();
    let calc = op("context::calc_key", &["i32"], CachePolicy::new());
    let expected = calc.build_key(&cache_args![3]);

    let seen: Result<String> = engine
        .cached(&calc, &cache_args![3], || async {
            let ctx = CacheScope::current()?;
            let key = ctx.lock().cache_key().to_string();
            Ok(key)
        })
        .await;
    assert_eq!(seen.unwrap(), expected.as_str());
}

#[tokio::test]
async fn test_nested_contexts() {
    let engine = CacheEngine::local();
    let parent = op("context::parent", &[], CachePolicy::new());
    let child = op("context::child", &[], CachePolicy::new());
    let seen = Mutex::new(Vec::new());

    let result: Result<String> = engine
        .cached(&parent, &[], || async {
            seen.lock().push(CacheScope::current()?.lock().cache_key().to_string());

            let child_value: Result<String> = engine
                .cached(&child, &[], || async {
                    seen.lock().push(CacheScope::current()?.lock().cache_key().to_string());
                    assert_eq!(CacheScope::depth(), 2);
                    Ok("cached_child".to_string())
                })
                .await;
            child_value?;

            // back to the parent's own context
            seen.lock().push(CacheScope::current()?.lock().cache_key().to_string());
            Ok("cached_parent".to_string())
        })
        .await;

    assert_eq!(result.unwrap(), "cached_parent");
    let seen = seen.into_inner();
    assert_eq!(
        seen,
        vec![
            parent.build_key(&[]).to_string(),
            child.build_key(&[]).to_string(),
            parent.build_key(&[]).to_string(),
        ]
    );
    assert!(!CacheScope::is_active());
}

#[tokio::test]
async fn test_concurrent_sibling_contexts() {
    let engine = CacheEngine::local();
    let parent = op("context::siblings", &[], CachePolicy::new());
    let fast = op("context::fast", &[], CachePolicy::new());
    let slow = op("context::slow", &[], CachePolicy::new().with_tags(["slow"]));

    let result: Result<String> = engine
        .cached(&parent, &[], || async {
            let fast_value = engine.cached(&fast, &[], || async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, CacheError>(CacheScope::current()?.lock().cache_key().to_string())
            });
            let slow_value = engine.cached(&slow, &[], || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let ctx = CacheScope::current()?;
                let mut ctx = ctx.lock();
                ctx.add_dependency_tag("slow_extra");
                assert_eq!(CacheScope::depth(), 2);
                Ok::<_, CacheError>(ctx.cache_key().to_string())
            });

            let (fast_value, slow_value) = tokio::join!(fast_value, slow_value);
            let seen_parent = CacheScope::current()?.lock().cache_key().to_string();
            Ok(format!("{}|{}|{seen_parent}", fast_value?, slow_value?))
        })
        .await;

    assert_eq!(
        result.unwrap(),
        format!(
            "{}|{}|{}",
            fast.build_key(&[]),
            slow.build_key(&[]),
            parent.build_key(&[])
        )
    );

    // the slow sibling committed under its own context, runtime tag included
    let slow_key = slow.build_key(&[]);
    assert!(engine.adapter().get(slow_key.as_str(), None).await.is_some());
    engine.evict(&EvictPolicy::any(["slow_extra"])).await;
    assert!(engine.adapter().get(slow_key.as_str(), None).await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_contexts_separate_across_tasks() {
    let engine = CacheEngine::local();
    let outer = op("context::thread1", &[], CachePolicy::new());
    let inner = op("context::thread2", &[], CachePolicy::new());
    let inner_key = inner.build_key(&[]).to_string();
    let outer_key = outer.build_key(&[]).to_string();

    let result: Result<String> = engine
        .cached(&outer, &[], || {
            let engine = engine.clone();
            let inner = inner.clone();
            async move {
                let handle = tokio::spawn(async move {
                    let value: Result<String> = engine
                        .cached(&inner, &[], || async {
                            let key = CacheScope::current()?.lock().cache_key().to_string();
                            assert_eq!(CacheScope::depth(), 1);
                            Ok(key)
                        })
                        .await;
                    value
                });
                let seen_inner = handle.await.expect("task panicked")?;
                let seen_outer = CacheScope::current()?.lock().cache_key().to_string();
                Ok(format!("{seen_inner}|{seen_outer}"))
            }
        })
        .await;

    assert_eq!(result.unwrap(), format!("{inner_key}|{outer_key}"));
}

#[tokio::test]
async fn test_current_outside_invocation_fails() {
    assert!(matches!(CacheScope::current(), Err(CacheError::NoActiveContext)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stampede_protection() {
    let engine = CacheEngine::local();
    let slow = op("stampede::slow", &["&str"], CachePolicy::new());
    let visits = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let engine = engine.clone();
            let slow = slow.clone();
            let visits = Arc::clone(&visits);
            tokio::spawn(async move {
                let value: Result<String> = engine
                    .cached(&slow, &cache_args!["same"], || async {
                        visits.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("done".to_string())
                    })
                    .await;
                value.unwrap()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), "done");
    }
    assert_eq!(visits.load(Ordering::SeqCst), 1);
    assert_eq!(engine.in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stampede_protection_disabled() {
    let engine = CacheEngine::local();
    let slow = op(
        "stampede::unprotected",
        &["&str"],
        CachePolicy::new().without_stampede_protection(),
    );
    let visits = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(tokio::sync::Barrier::new(3));

    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let engine = engine.clone();
            let slow = slow.clone();
            let visits = Arc::clone(&visits);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                let value: Result<String> = engine
                    .cached(&slow, &cache_args!["same"], || async {
                        visits.fetch_add(1, Ordering::SeqCst);
                        // every caller must be inside the operation at once
                        barrier.wait().await;
                        Ok("done".to_string())
                    })
                    .await;
                value.unwrap()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), "done");
    }
    assert_eq!(visits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_property_setter_busts_getter() {
    let engine = CacheEngine::local();
    let prop = CachedProperty::new(OperationId::new("garage::name", &[]), CachePolicy::new()).unwrap();
    let name = Mutex::new("first".to_string());
    let visits = AtomicUsize::new(0);

    let (prop, engine, name, visits) = (&prop, &engine, &name, &visits);
    let get = move || async move {
        let value: Result<String> = prop
            .get(engine, || async {
                visits.fetch_add(1, Ordering::SeqCst);
                Ok(name.lock().clone())
            })
            .await;
        value.unwrap()
    };

    assert_eq!(get().await, "first");
    assert_eq!(get().await, "first");
    assert_eq!(visits.load(Ordering::SeqCst), 1);

    prop.set(engine, || async {
        *name.lock() = "second".to_string();
    })
    .await;

    assert_eq!(get().await, "second");
    assert_eq!(visits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_not_cacheable() {
    let engine = CacheEngine::local();
    let cached = op("plain::cached", &[], CachePolicy::new());
    let uncached = op("plain::uncached", &[], CachePolicy::not_cacheable());
    let visits = AtomicUsize::new(0);

    for op in [&cached, &cached, &uncached, &uncached] {
        let _: Result<String> = engine
            .cached(op, &[], || async {
                visits.fetch_add(1, Ordering::SeqCst);
                Ok("value".to_string())
            })
            .await;
    }
    assert_eq!(visits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_cached_none_is_served() {
    let adapter = Arc::new(LocalCacheAdapter::new());
    let engine = CacheEngine::new(adapter.clone());
    let find = op("lookup::find", &["u32"], CachePolicy::new());
    let visits = AtomicUsize::new(0);

    for _ in 0..2 {
        let value: Result<Option<String>> = engine
            .cached(&find, &cache_args![42u32], || async {
                visits.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await;
        assert_eq!(value.unwrap(), None);
    }
    assert_eq!(visits.load(Ordering::SeqCst), 1);

    let key = find.build_key(&cache_args![42u32]);
    assert!(adapter.get(key.as_str(), None).await.unwrap().is_null());
}

#[tokio::test]
async fn test_invalidate_single_invocation() {
    let garage = Garage::new();
    garage.get_car(0).await;
    garage.get_car(1).await;

    assert!(garage.engine.invalidate(&GET_CAR, &cache_args![0usize]).await);
    assert!(!garage.engine.invalidate(&GET_CAR, &cache_args![0usize]).await);

    garage.get_car(0).await;
    garage.get_car(1).await;
    assert_eq!(garage.visits(), 3);
}
