//! Model-based sequential tests: random operation sequences applied to the
//! stack and to a plain `Vec` must agree.

use elim_stack::EliminationStack;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Push(u8),
    Pop,
    Peek,
    Remove(u8),
    Contains(u8),
    Len,
}

/// Removes the first occurrence of `value` scanning from the top (the end of
/// the vec), mirroring the stack's top-down removal.
fn model_remove(model: &mut Vec<u8>, value: u8) -> bool {
    if let Some(pos) = model.iter().rposition(|v| *v == value) {
        model.remove(pos);
        true
    } else {
        false
    }
}

proptest! {
    #[test]
    fn stack_matches_vec_model(ops in proptest::collection::vec(
        prop_oneof![
            any::<u8>().prop_map(Operation::Push),
            Just(Operation::Pop),
            Just(Operation::Peek),
            any::<u8>().prop_map(Operation::Remove),
            any::<u8>().prop_map(Operation::Contains),
            Just(Operation::Len),
        ],
        1..200
    )) {
        let stack = EliminationStack::new();
        let mut model: Vec<u8> = Vec::new();

        for op in ops {
            match op {
                Operation::Push(v) => {
                    stack.push(v).unwrap();
                    model.push(v);
                }
                Operation::Pop => {
                    prop_assert_eq!(stack.pop(), model.pop());
                }
                Operation::Peek => {
                    prop_assert_eq!(stack.peek(), model.last().copied());
                }
                Operation::Remove(v) => {
                    prop_assert_eq!(stack.remove(&v).unwrap(), model_remove(&mut model, v));
                }
                Operation::Contains(v) => {
                    prop_assert_eq!(stack.contains(&v).unwrap(), model.contains(&v));
                }
                Operation::Len => {
                    prop_assert_eq!(stack.len(), model.len());
                }
            }
        }

        // Drain and compare the final contents top-down.
        let mut drained = Vec::new();
        while let Some(v) = stack.pop() {
            drained.push(v);
        }
        model.reverse();
        prop_assert_eq!(drained, model);
    }

    #[test]
    fn iteration_matches_reverse_insertion(values in proptest::collection::vec(any::<u16>(), 0..64)) {
        let stack: EliminationStack<u16> = values.iter().copied().collect();
        let iterated: Vec<u16> = stack.iter().collect();
        let mut expected = values;
        expected.reverse();
        prop_assert_eq!(iterated, expected);
    }
}
