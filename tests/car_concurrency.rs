// ==============================================
// CAR CONCURRENCY TESTS (integration)
// ==============================================
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use carcache::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn scaled(key: &u64) -> Result<u64, ComputeError<u64, Infallible>> {
    Ok(key * 3 + 1)
}

type Scaled = fn(&u64) -> Result<u64, ComputeError<u64, Infallible>>;

mod shared_cache {
    use super::*;

    #[test]
    fn test_mixed_workload_keeps_invariants() {
        let cache = Arc::new(CarCache::new(scaled as Scaled, 64, false));
        let num_threads = 8;
        let operations_per_thread = 2_000;

        let handles: Vec<_> = (0..num_threads)
            .map(|thread_id| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(thread_id);
                    for _ in 0..operations_per_thread {
                        // Skewed keys: a hot set of 32 plus a long cold tail.
                        let key = if rng.random_range(0..100) < 70 {
                            rng.random_range(0..32)
                        } else {
                            rng.random_range(32..1_000)
                        };
                        match rng.random_range(0..100) {
                            0..=89 => {
                                assert_eq!(cache.compute(key), Ok(key * 3 + 1));
                            },
                            90..=96 => {
                                cache.remove(&key);
                            },
                            97..=98 => {
                                let _ = cache.peek(&key);
                            },
                            _ => {
                                cache.release_matching(|k| *k == key);
                            },
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }

        assert!(cache.len() <= 64);
        assert!(cache.key_count() <= 128);
        assert!(cache.p() <= 64);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_concurrent_misses_compute_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = Arc::new(CarCache::new(
            move |k: &u64| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                Ok::<_, ComputeError<u64, Infallible>>(*k)
            },
            16,
            false,
        ));
        let num_threads = 8;
        let barrier = Arc::new(Barrier::new(num_threads));

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.compute(42).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_hits_proceed_while_a_miss_is_computing() {
        let entered = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let (entered_flag, release_flag) = (Arc::clone(&entered), Arc::clone(&release));

        let cache = Arc::new(CarCache::new(
            move |k: &u64| {
                if *k == 99 {
                    entered_flag.store(true, Ordering::SeqCst);
                    let deadline = Instant::now() + Duration::from_secs(10);
                    while !release_flag.load(Ordering::SeqCst) && Instant::now() < deadline {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
                Ok::<_, ComputeError<u64, Infallible>>(k + 1)
            },
            8,
            false,
        ));
        assert_eq!(cache.compute(1), Ok(2));

        let slow = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.compute(99))
        };
        while !entered.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        // The slow computation holds the admission lock; the hit must not wait for it.
        assert_eq!(cache.compute(1), Ok(2));
        assert_eq!(cache.peek(&1), Some(2));
        assert!(!release.load(Ordering::SeqCst));

        release.store(true, Ordering::SeqCst);
        assert_eq!(slow.join().unwrap(), Ok(100));
        assert!(cache.contains(&99));
    }

    #[test]
    fn test_clear_under_load() {
        let cache = Arc::new(CarCache::new(scaled as Scaled, 32, false));
        let stop = Arc::new(AtomicBool::new(false));

        let workers: Vec<_> = (0..4u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    let mut i = 0u64;
                    while !stop.load(Ordering::Relaxed) {
                        let key = (i * 13 + t) % 100;
                        assert_eq!(cache.compute(key), Ok(key * 3 + 1));
                        i += 1;
                    }
                })
            })
            .collect();

        for _ in 0..50 {
            cache.clear();
            cache.check_invariants().unwrap();
            thread::sleep(Duration::from_millis(1));
        }
        stop.store(true, Ordering::Relaxed);
        for worker in workers {
            worker.join().unwrap();
        }

        cache.clear();
        assert_eq!(cache.key_count(), 0);
        assert_eq!(cache.p(), 0);
        assert_eq!(cache.hit_rate(), 0.0);
    }
}

mod weak_keys {
    use super::*;

    #[test]
    fn test_dropped_referents_are_purged_while_others_compute() {
        let cache = Arc::new(
            CarCacheBuilder::new(128)
                .weak_keys(true)
                .name("weak-concurrency")
                .build(|k: &WeakKey<String>| {
                    Ok::<_, ComputeError<usize, Infallible>>(k.upgrade().map_or(0, |s| s.len()))
                }),
        );

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut kept = Vec::new();
                    for i in 0..50 {
                        let owner = Arc::new(format!("thread-{t}-{i}"));
                        let expected = owner.len();
                        assert_eq!(cache.compute(WeakKey::new(&owner)), Ok(expected));
                        if i % 2 == 0 {
                            kept.push(owner);
                        }
                    }
                    kept
                })
            })
            .collect();

        let kept: Vec<Arc<String>> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        let before = cache.key_count();
        let purged = cache.clear_stale_references();
        assert!(purged > 0);
        assert_eq!(cache.key_count(), before - purged);
        assert_eq!(cache.clear_stale_references(), 0);

        // Survivors of eviction still map to their referent.
        let mut cached = 0;
        for owner in &kept {
            if let Some(len) = cache.peek(&WeakKey::new(owner)) {
                assert_eq!(len, owner.len());
                cached += 1;
            }
        }
        assert_eq!(cached, cache.len());
        cache.check_invariants().unwrap();
    }
}

#[cfg(feature = "concurrency")]
mod sharded {
    use super::*;

    #[test]
    fn test_sharded_cache_under_contention() {
        let cache = Arc::new(
            CarCacheBuilder::new(256)
                .shards(8)
                .shard_seed(0xC0FFEE)
                .build_sharded(scaled as Scaled),
        );

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(100 + t);
                    for _ in 0..2_000 {
                        let key = rng.random_range(0..600);
                        assert_eq!(cache.compute(key), Ok(key * 3 + 1));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 256);
        for stats in cache.shard_stats() {
            assert!(stats.len <= stats.max_size);
            assert!(stats.key_count <= 2 * stats.max_size);
        }
        cache.check_invariants().unwrap();
        assert!(cache.hit_rate() > 0.0);
    }
}
