//! Integration tests for relocation safety: keys keep resolving to the same
//! bytes across realloc, moves and page compaction.

use oroboros_memory::{AllocKey, Context, ContextId, MemoryError, PageStatus};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn tag(key: AllocKey) -> u8 {
    (key.alloc.index() as u8).wrapping_mul(37).wrapping_add(1)
}

#[test]
fn test_compaction_preserves_every_allocation() {
    let mut ctx = Context::new(ContextId::new(0), 8192).unwrap();
    let page = ctx.alloc_page(2048).unwrap();

    let keys: Vec<AllocKey> = (0..32).map(|i| ctx.allocate(page, 16 + i).unwrap()).collect();
    for key in &keys {
        let value = tag(*key);
        ctx.map(*key).unwrap().fill(value);
    }

    // Punch holes in every other allocation.
    let (freed, kept): (Vec<_>, Vec<_>) = keys.iter().enumerate().partition(|(i, _)| i % 2 == 0);
    for (_, key) in &freed {
        ctx.free(**key).unwrap();
    }
    let fragments_before = ctx.page_stats(page).unwrap().fragments;
    assert!(fragments_before > 1);

    let moved = ctx.compact_page(page).unwrap();
    assert!(moved > 0);
    assert_eq!(ctx.page_stats(page).unwrap().fragments, 1);

    for (_, key) in kept {
        let value = tag(*key);
        assert!(ctx.view(*key).unwrap().iter().all(|b| *b == value));
    }
    for (_, key) in freed {
        assert!(matches!(ctx.view(*key), Err(MemoryError::StaleKey { .. })));
    }
}

#[test]
fn test_realloc_through_fragmentation() {
    let mut ctx = Context::new(ContextId::new(0), 4096).unwrap();
    let page = ctx.alloc_page(256).unwrap();

    let a = ctx.allocate(page, 64).unwrap();
    let b = ctx.allocate(page, 64).unwrap();
    let c = ctx.allocate(page, 64).unwrap();
    let d = ctx.allocate(page, 64).unwrap();
    ctx.map(b).unwrap().copy_from_slice(&[0xB0; 64]);
    ctx.map(d).unwrap().copy_from_slice(&[0xD0; 64]);
    ctx.free(a).unwrap();
    ctx.free(c).unwrap();

    // 128 bytes free but split in two 64-byte holes, none after `d`:
    // only compaction can grow it.
    let d = ctx.realloc(d, 128).unwrap();
    let view = ctx.view(d).unwrap();
    assert_eq!(view.len(), 128);
    assert!(view[..64].iter().all(|x| *x == 0xD0));
    assert!(view[64..].iter().all(|x| *x == 0));
    assert!(ctx.view(b).unwrap().iter().all(|x| *x == 0xB0));
    assert_eq!(ctx.page_stats(page).unwrap().largest_free, 64);
}

#[test]
fn test_realloc_on_protected_page_fails() {
    let mut ctx = Context::new(ContextId::new(0), 1024).unwrap();
    let page = ctx.alloc_page(128).unwrap();
    let key = ctx.allocate(page, 8).unwrap();
    ctx.protect_page(page).unwrap();

    assert!(matches!(
        ctx.realloc(key, 16),
        Err(MemoryError::PageUnavailable {
            status: PageStatus::Protected,
            ..
        })
    ));
}

/// Randomized model check: a seeded sequence of allocate / free / realloc /
/// compact must keep every live key's content equal to the model's.
#[test]
fn test_seeded_operations_match_model() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x0B0B_0B0B);
    let mut ctx = Context::new(ContextId::new(7), 64 * 1024).unwrap();
    let page = ctx.alloc_page(16 * 1024).unwrap();
    let mut model: Vec<(AllocKey, Vec<u8>)> = Vec::new();

    for step in 0..2_000u32 {
        match rng.gen_range(0..10) {
            0..=3 => {
                let size = rng.gen_range(1..200);
                if let Ok(key) = ctx.allocate(page, size) {
                    let fill = (step % 251) as u8;
                    ctx.map(key).unwrap().fill(fill);
                    model.push((key, vec![fill; size]));
                }
            }
            4..=5 if !model.is_empty() => {
                let (key, _) = model.swap_remove(rng.gen_range(0..model.len()));
                ctx.free(key).unwrap();
            }
            6..=8 if !model.is_empty() => {
                let index = rng.gen_range(0..model.len());
                let new_size = rng.gen_range(1..400);
                let (key, expected) = &mut model[index];
                match ctx.realloc(*key, new_size) {
                    Ok(new_key) => {
                        *key = new_key;
                        expected.resize(new_size, 0);
                    }
                    Err(MemoryError::FailedAllocation { .. }) => {}
                    Err(err) => panic!("unexpected realloc error: {err}"),
                }
            }
            9 => {
                ctx.compact_page(page).unwrap();
            }
            _ => {}
        }

        for (key, expected) in &model {
            assert_eq!(ctx.view(*key).unwrap(), expected.as_slice(), "step {step}");
        }
    }
}
