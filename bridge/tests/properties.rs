//! Property tests over `MemInstance`: outcome depends only on whether the
//! resolver's index lands on a compatible slot, and contexts always balance.

mod common;

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use callshim_bridge::{call_callback_by_name, try_call_callback_by_name, Stage};
use callshim_hostapi::{FuncShape, MemFunc, MemInstance};

use common::STACK_SIZE;

#[derive(Debug, Clone)]
enum Slot {
    Callback,
    Null,
    WrongShape,
    Trapping,
}

fn slot_strategy() -> impl Strategy<Value = Slot> {
    prop_oneof![
        3 => Just(Slot::Callback),
        1 => Just(Slot::Null),
        1 => Just(Slot::WrongShape),
        1 => Just(Slot::Trapping),
    ]
}

fn build(slots: &[Slot], addr: Option<u32>) -> (MemInstance, Arc<Mutex<Vec<(usize, u32)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut instance = MemInstance::new();
    if let Some(index) = addr {
        instance = instance.with_export("addr", MemFunc::constant(index));
    }
    for (i, slot) in slots.iter().enumerate() {
        instance = match slot {
            Slot::Callback => {
                let sink = Arc::clone(&calls);
                instance.with_table_entry(MemFunc::callback(move |x| sink.lock().unwrap().push((i, x))))
            }
            Slot::Null => instance.with_null_entry(),
            Slot::WrongShape => instance.with_table_entry(MemFunc::constant(0)),
            Slot::Trapping => {
                instance.with_table_entry(MemFunc::trapping(FuncShape::CALLBACK, "callback trapped"))
            }
        };
    }
    (instance, calls)
}

proptest! {
    #[test]
    fn prop_success_iff_index_hits_callback(
        slots in prop::collection::vec(slot_strategy(), 0..8),
        addr in prop::option::of(0u32..10),
        arg in any::<u32>(),
    ) {
        let (instance, calls) = build(&slots, addr);
        let ok = call_callback_by_name(&instance, STACK_SIZE, arg);

        let target = addr.and_then(|i| slots.get(i as usize).map(|s| (i as usize, s)));
        let expected = matches!(target, Some((_, Slot::Callback)));
        prop_assert_eq!(ok, expected);

        let recorded = calls.lock().unwrap().clone();
        if expected {
            let (i, _) = target.unwrap();
            prop_assert_eq!(recorded, vec![(i, arg)]);
        } else {
            prop_assert!(recorded.is_empty());
        }

        if addr.is_none() {
            prop_assert_eq!(instance.indirect_calls(), 0);
        }
        let stats = instance.context_stats();
        prop_assert_eq!(stats.created, 1);
        prop_assert!(stats.is_balanced());
    }

    #[test]
    fn prop_same_input_same_outcome(
        slots in prop::collection::vec(slot_strategy(), 0..6),
        addr in prop::option::of(0u32..8),
        arg in any::<u32>(),
    ) {
        let (instance, _) = build(&slots, addr);
        let first = try_call_callback_by_name(&instance, STACK_SIZE, arg);
        let second = try_call_callback_by_name(&instance, STACK_SIZE, arg);
        prop_assert_eq!(&first, &second);
        prop_assert!(instance.context_stats().is_balanced());
    }

    #[test]
    fn prop_stage_matches_first_broken_step(
        refuse in any::<bool>(),
        has_addr in any::<bool>(),
        addr_traps in any::<bool>(),
        index in 0u32..3,
    ) {
        let mut instance = MemInstance::new().with_table_entry(MemFunc::callback(|_| {}));
        if refuse {
            instance = instance.refusing_contexts();
        }
        if has_addr {
            let resolver = if addr_traps {
                MemFunc::trapping(FuncShape::RESOLVER, "addr trapped")
            } else {
                MemFunc::constant(index)
            };
            instance = instance.with_export("addr", resolver);
        }

        let outcome = try_call_callback_by_name(&instance, STACK_SIZE, 0);
        let expected = if refuse {
            Some(Stage::AcquireContext)
        } else if !has_addr {
            Some(Stage::ResolveExport)
        } else if addr_traps {
            Some(Stage::ExtractIndex)
        } else if index != 0 {
            Some(Stage::IndirectCall)
        } else {
            None
        };
        prop_assert_eq!(outcome.err().map(|e| e.stage()), expected);
        prop_assert!(instance.context_stats().is_balanced());
    }
}
