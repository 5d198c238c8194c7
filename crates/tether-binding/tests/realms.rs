use std::rc::Rc;

use tether_binding::{Binding, DataBindingContext};
use tether_core::{
    CurrentRealm, ObservableList, QueuedRealm, RealmRef, Severity, WritableList, WritableValue,
};

struct Realms {
    ui: Rc<QueuedRealm>,
    data: RealmRef,
}

impl Realms {
    fn new() -> Self {
        Self {
            ui: QueuedRealm::new(),
            data: CurrentRealm::shared(),
        }
    }

    fn ui_ref(&self) -> RealmRef {
        self.ui.clone()
    }
}

#[test]
fn writes_into_a_queued_realm_wait_for_its_loop() {
    let realms = Realms::new();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realms.data));
    let field = WritableValue::new(realms.ui_ref(), String::new());
    let count = WritableValue::new(Rc::clone(&realms.data), 7i32);

    ctx.bind_value(&field, &count, None, None).unwrap();
    assert_eq!(field.get(), "");
    assert!(realms.ui.pending() > 0);

    realms.ui.drain();
    assert_eq!(field.get(), "7");

    count.set(8).unwrap();
    assert_eq!(field.get(), "7");
    realms.ui.drain();
    assert_eq!(field.get(), "8");
}

#[test]
fn edits_made_inside_the_queued_realm_reach_the_model() {
    let realms = Realms::new();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realms.data));
    let field = WritableValue::new(realms.ui_ref(), String::new());
    let count = WritableValue::new(Rc::clone(&realms.data), 0i32);
    let binding = ctx.bind_value(&field, &count, None, None).unwrap();
    realms.ui.drain();

    realms.ui.enter(|| field.set("12".into())).unwrap();
    assert_eq!(count.get(), 12);
    assert!(binding.validation_status().get().is_ok());

    realms.ui.enter(|| field.set("twelve".into())).unwrap();
    assert_eq!(count.get(), 12);
    assert_eq!(
        binding.validation_status().get().severity(),
        Severity::Error
    );
}

#[test]
fn writes_outside_the_owning_realm_are_rejected() {
    let realms = Realms::new();
    let field = WritableValue::new(realms.ui_ref(), 0);
    assert!(field.set(1).is_err());
    assert!(realms.ui.enter(|| field.set(1)).is_ok());
}

#[test]
fn list_changes_cross_realms_in_order() {
    let realms = Realms::new();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realms.data));
    let rows = WritableList::<String>::new(realms.ui_ref());
    let items = WritableList::with_elements(Rc::clone(&realms.data), vec![1u8, 2]);
    ctx.bind_list(&rows, &items, None, None).unwrap();

    items.push(3).unwrap();
    items.remove(0).unwrap();
    assert!(rows.is_empty());

    realms.ui.drain();
    assert_eq!(rows.elements(), vec!["2".to_string(), "3".to_string()]);
}

#[test]
fn disposed_binding_drops_queued_writes() {
    let realms = Realms::new();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realms.data));
    let field = WritableValue::new(realms.ui_ref(), 0i32);
    let count = WritableValue::new(Rc::clone(&realms.data), 0i32);
    let binding = ctx.bind_value(&field, &count, None, None).unwrap();
    realms.ui.drain();

    count.set(5).unwrap();
    binding.dispose();
    realms.ui.drain();

    assert_eq!(field.get(), 0);
}

#[test]
fn disposed_list_binding_drops_queued_changes() {
    let realms = Realms::new();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realms.data));
    let rows = WritableList::<String>::new(realms.ui_ref());
    let items = WritableList::with_elements(Rc::clone(&realms.data), vec![1u8]);
    let binding = ctx.bind_list(&rows, &items, None, None).unwrap();
    realms.ui.drain();
    assert_eq!(rows.len(), 1);

    items.push(2).unwrap();
    binding.dispose();
    realms.ui.drain();

    assert_eq!(rows.elements(), vec!["1".to_string()]);
}

#[test]
fn endpoint_disposal_runs_in_the_validation_realm() {
    let realms = Realms::new();
    let ctx = DataBindingContext::with_realm(realms.ui_ref());
    let field = WritableValue::new(Rc::clone(&realms.data), 0i32);
    let count = WritableValue::new(Rc::clone(&realms.data), 0i32);
    let binding = ctx.bind_value(&field, &count, None, None).unwrap();
    realms.ui.drain();
    assert_eq!(ctx.bindings(), vec![binding.clone()]);

    tether_core::Observable::dispose(&count);
    assert!(!binding.is_disposed());

    realms.ui.drain();
    assert!(binding.is_disposed());
    assert!(ctx.bindings().is_empty());
}
