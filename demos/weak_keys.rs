//! Weak keys: entries whose referent was dropped are purged on demand.
//!
//! Run with: RUST_LOG=carcache=debug cargo run --example weak_keys

use std::convert::Infallible;
use std::sync::Arc;

use carcache::prelude::*;

struct Descriptor {
    name: String,
    fields: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cache = CarCacheBuilder::new(16)
        .weak_keys(true)
        .name("descriptors")
        .build(|k: &WeakKey<Descriptor>| {
            let summary = k
                .upgrade()
                .map(|d| format!("{} ({} fields)", d.name, d.fields))
                .unwrap_or_default();
            Ok::<_, ComputeError<String, Infallible>>(summary)
        });

    let descriptors: Vec<Arc<Descriptor>> = (0..6)
        .map(|i| {
            Arc::new(Descriptor {
                name: format!("Message{i}"),
                fields: i * 2,
            })
        })
        .collect();

    for d in &descriptors {
        println!("{}", cache.compute(WeakKey::new(d)).unwrap());
    }
    println!("cached: {}", cache.len());

    // Unload half of the descriptors.
    let kept: Vec<_> = descriptors.into_iter().step_by(2).collect();
    let purged = cache.clear_stale_references();
    println!("purged {purged}, cached: {}", cache.len());

    for d in &kept {
        assert!(cache.contains(&WeakKey::new(d)));
    }
}

// Expected output:
// Message0 (0 fields)
// Message1 (2 fields)
// Message2 (4 fields)
// Message3 (6 fields)
// Message4 (8 fields)
// Message5 (10 fields)
// cached: 6
// purged 3, cached: 3
