use super::*;

fn add_condition(registry: &mut Registry, kind: ConditionKind, value: bool) -> ConditionId {
    let mut record = ConditionRecord::new(kind);
    record.value = value;
    ConditionId(registry.conditions.insert(record))
}

fn add_action(registry: &mut Registry, conditions: &[ConditionId]) -> ActionId {
    ActionId(registry.actions.insert(ActionRecord {
        label: "test",
        conditions: conditions.to_vec(),
        callback: None,
        invoking: false,
    }))
}

#[test]
fn test_arena_insert_and_get() {
    let mut arena = Arena::new();
    let a = arena.insert("a");
    let b = arena.insert("b");

    assert_eq!(arena.get(a), Some(&"a"));
    assert_eq!(arena.get(b), Some(&"b"));
    assert_eq!(arena.len(), 2);
}

#[test]
fn test_arena_stale_id_after_reuse() {
    let mut arena = Arena::new();
    let old = arena.insert(1);
    assert_eq!(arena.remove(old), Some(1));

    let new = arena.insert(2);
    assert_eq!(new.index, old.index);
    assert_ne!(new.generation, old.generation);

    assert!(!arena.contains(old));
    assert_eq!(arena.get(old), None);
    assert_eq!(arena.get(new), Some(&2));
    assert_eq!(arena.remove(old), None);
}

#[test]
fn test_arena_iter_ascending() {
    let mut arena = Arena::new();
    let first = arena.insert('x');
    let second = arena.insert('y');
    let third = arena.insert('z');
    arena.remove(second);

    let ids: Vec<RawId> = arena.iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![first, third]);
}

#[test]
fn test_arena_drain_retires_ids() {
    let mut arena = Arena::new();
    let a = arena.insert(1);
    let b = arena.insert(2);

    let drained = arena.drain();
    assert_eq!(drained.len(), 2);
    assert_eq!(arena.len(), 0);
    assert!(!arena.contains(a));
    assert!(!arena.contains(b));
}

#[test]
fn test_id_display() {
    let mut arena = Arena::new();
    let id = ConditionId(arena.insert(()));
    assert_eq!(id.to_string(), "c0.0");
}

#[test]
fn test_retired_condition_reads_false() {
    let mut registry = Registry::new();
    let c = add_condition(&mut registry, ConditionKind::Base, true);
    assert!(registry.eval(c));

    registry.conditions.remove(c.0);
    assert!(!registry.eval(c));
    assert!(!registry.set(c, true));
}

#[test]
fn test_can_invoke_requires_all_conditions() {
    let mut registry = Registry::new();
    let a = add_condition(&mut registry, ConditionKind::Base, true);
    let b = add_condition(&mut registry, ConditionKind::Base, false);
    let action = add_action(&mut registry, &[a, b]);

    let record = registry.actions.get(action.0).unwrap();
    assert!(!registry.can_invoke(record));

    registry.set(b, true);
    let record = registry.actions.get(action.0).unwrap();
    assert!(registry.can_invoke(record));
}

#[test]
fn test_empty_condition_set_always_invokable() {
    let mut registry = Registry::new();
    let action = add_action(&mut registry, &[]);
    let record = registry.actions.get(action.0).unwrap();
    assert!(registry.can_invoke(record));
    assert!(!registry.is_dead(record));
}

#[test]
fn test_action_dead_after_condition_retired() {
    let mut registry = Registry::new();
    let c = add_condition(&mut registry, ConditionKind::Base, true);
    let action = add_action(&mut registry, &[c]);

    registry.conditions.remove(c.0);
    let record = registry.actions.get(action.0).unwrap();
    assert!(registry.is_dead(record));
    assert!(!registry.can_invoke(record));
}

#[test]
fn test_conditions_of_kind() {
    let mut registry = Registry::new();
    let io = add_condition(&mut registry, ConditionKind::Io, false);
    add_condition(&mut registry, ConditionKind::Base, false);
    let timer = add_condition(&mut registry, ConditionKind::Timer, false);

    assert_eq!(registry.conditions_of(ConditionKind::Io), vec![io]);
    assert_eq!(registry.conditions_of(ConditionKind::Timer), vec![timer]);
    assert!(registry.conditions_of(ConditionKind::Signal).is_empty());
}

#[test]
fn test_interesting_skips_blocked_actions() {
    let mut registry = Registry::new();
    let gate = add_condition(&mut registry, ConditionKind::Base, false);
    let blocked_io = add_condition(&mut registry, ConditionKind::Io, false);
    let free_io = add_condition(&mut registry, ConditionKind::Io, false);
    add_action(&mut registry, &[gate, blocked_io]);
    add_action(&mut registry, &[free_io]);

    assert_eq!(registry.interesting(ConditionKind::Io), vec![free_io]);

    registry.set(gate, true);
    assert_eq!(
        registry.interesting(ConditionKind::Io),
        vec![blocked_io, free_io]
    );
}

#[test]
fn test_interesting_ignores_other_managed_kinds() {
    let mut registry = Registry::new();
    let io = add_condition(&mut registry, ConditionKind::Io, false);
    let timer = add_condition(&mut registry, ConditionKind::Timer, false);
    add_action(&mut registry, &[io, timer]);

    assert_eq!(registry.interesting(ConditionKind::Io), vec![io]);
    assert_eq!(registry.interesting(ConditionKind::Timer), vec![timer]);
}

#[test]
fn test_interesting_skips_retired_ids() {
    let mut registry = Registry::new();
    let gone = add_condition(&mut registry, ConditionKind::Base, false);
    let io = add_condition(&mut registry, ConditionKind::Io, false);
    add_action(&mut registry, &[gone, io]);
    registry.conditions.remove(gone.0);

    assert_eq!(registry.interesting(ConditionKind::Io), vec![io]);
}

#[test]
fn test_arm_managed_leaves_base_alone() {
    let mut registry = Registry::new();
    let base = add_condition(&mut registry, ConditionKind::Base, true);
    let io = add_condition(&mut registry, ConditionKind::Io, true);
    let signal = add_condition(&mut registry, ConditionKind::Signal, true);

    registry.arm_managed();

    assert!(registry.eval(base));
    assert!(!registry.eval(io));
    assert!(!registry.eval(signal));
}

#[test]
fn test_computed_condition_reads_expression() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut registry = Registry::new();
    let source = Rc::new(Cell::new(false));
    let read = source.clone();
    let computed = ConditionId(
        registry
            .conditions
            .insert(ConditionRecord::computed(Box::new(move || read.get()))),
    );

    assert_eq!(registry.kind_of(computed), Some(ConditionKind::Base));
    assert!(!registry.eval(computed));
    source.set(true);
    assert!(registry.eval(computed));

    // Stored values and arming do not override the expression.
    assert!(!registry.set(computed, false));
    registry.arm_managed();
    assert!(registry.eval(computed));
}

#[test]
fn test_computed_condition_gates_interest() {
    use std::cell::Cell;
    use std::rc::Rc;

    let mut registry = Registry::new();
    let open = Rc::new(Cell::new(false));
    let read = open.clone();
    let computed = ConditionId(
        registry
            .conditions
            .insert(ConditionRecord::computed(Box::new(move || read.get()))),
    );
    let io = add_condition(&mut registry, ConditionKind::Io, false);
    let action = add_action(&mut registry, &[computed, io]);

    assert!(registry.interesting(ConditionKind::Io).is_empty());
    open.set(true);
    assert_eq!(registry.interesting(ConditionKind::Io), vec![io]);

    registry.set(io, true);
    let record = registry.actions.get(action.0).unwrap();
    assert!(registry.can_invoke(record));
}
