//! Compute-and-cache with the CAR policy.
//!
//! Run with: cargo run --example basic_car

use std::convert::Infallible;

use carcache::prelude::*;

fn main() {
    let cache = CarCacheBuilder::new(2)
        .name("letters")
        .build(|k: &char| Ok::<_, ComputeError<String, Infallible>>(k.to_uppercase().collect()));

    cache.compute('a').unwrap();
    cache.compute('b').unwrap();
    println!("{}\n", cache.dump());

    // Full: 'a' is swept out of T1 into the B1 ghost list.
    cache.compute('c').unwrap();
    println!("{}\n", cache.dump());

    // Ghost hit: p grows and 'a' comes back straight into T2.
    println!("a -> {}", cache.compute('a').unwrap());
    println!("{}\n", cache.dump());

    println!("hit rate: {:.1}%", cache.hit_rate());
}

// Expected output:
// p=0 max_size=2
// T1: ['a', 'b']
// T2: []
// B1: []
// B2: []
//
// p=0 max_size=2
// T1: ['b', 'c']
// T2: []
// B1: ['a']
// B2: []
//
// a -> A
// p=1 max_size=2
// T1: ['c']
// T2: ['a']
// B1: ['b']
// B2: []
//
// hit rate: 0.0%
