use std::io::Write;
use std::rc::Rc;

use tether_binding::{
    AggregateStrategy, AggregateValidationStatus, Binding, BindingConfig, DataBindingContext,
    Direction, ObservablesManager, UpdatePolicy,
};
use tether_core::{CurrentRealm, Observable, ObservableSet, Severity, WritableSet, WritableValue};

fn convert_only_context() -> DataBindingContext {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"target_to_model = "convert""#).unwrap();
    writeln!(file, r#"multiple_problems_message = "Please review the form""#).unwrap();
    let config = BindingConfig::from_path(file.path()).unwrap();

    DataBindingContext::builder()
        .realm(CurrentRealm::shared())
        .config(config)
        .build()
        .unwrap()
}

#[test]
fn configured_policies_shape_default_strategies() {
    let ctx = convert_only_context();
    assert_eq!(
        ctx.default_value_strategy::<String, i32>(Direction::TargetToModel)
            .policy(),
        UpdatePolicy::Convert
    );
    assert_eq!(
        ctx.default_value_strategy::<i32, String>(Direction::ModelToTarget)
            .policy(),
        UpdatePolicy::Update
    );
}

#[test]
fn convert_policy_validates_eagerly_and_writes_on_request() {
    let ctx = convert_only_context();
    let realm = ctx.validation_realm();
    let field = WritableValue::new(Rc::clone(&realm), String::new());
    let quantity = WritableValue::new(realm, 5i32);
    let binding = ctx.bind_value(&field, &quantity, None, None).unwrap();
    assert_eq!(field.get(), "5");

    field.set("7".into()).unwrap();
    assert_eq!(quantity.get(), 5);
    assert!(binding.validation_status().get().is_ok());

    field.set("seven".into()).unwrap();
    assert_eq!(
        binding.validation_status().get().severity(),
        Severity::Error
    );

    field.set("8".into()).unwrap();
    ctx.update_models();
    assert_eq!(quantity.get(), 8);
}

#[test]
fn merged_aggregate_uses_the_configured_message() {
    let ctx = convert_only_context();
    let realm = ctx.validation_realm();
    let aggregate = AggregateValidationStatus::new(&ctx, AggregateStrategy::Merged);
    let a = WritableValue::new(Rc::clone(&realm), String::from("1"));
    let b = WritableValue::new(Rc::clone(&realm), String::from("2"));
    let a_model = WritableValue::new(Rc::clone(&realm), 1u32);
    let b_model = WritableValue::new(realm, 2u32);
    ctx.bind_value(&a, &a_model, None, None).unwrap();
    ctx.bind_value(&b, &b_model, None, None).unwrap();

    a.set("-".into()).unwrap();
    b.set("?".into()).unwrap();

    let status = aggregate.value();
    assert_eq!(status.message(), "Please review the form");
    assert_eq!(status.children().len(), 2);
}

#[test]
fn validate_targets_reports_without_writing() {
    let realm = CurrentRealm::shared();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
    let tags = WritableSet::with_elements(Rc::clone(&realm), [1u16, 2]);
    let labels = WritableSet::<String>::new(realm);
    let binding = ctx
        .bind_set(
            &labels,
            &tags,
            None,
            Some(tether_binding::UpdateSetStrategy::on_request()),
        )
        .unwrap();
    assert!(labels.is_empty());

    ctx.validate_targets();
    assert!(labels.is_empty());
    assert!(binding.validation_status().get().is_ok());

    ctx.update_targets();
    let mut contents = labels.elements();
    contents.sort();
    assert_eq!(contents, vec!["1".to_string(), "2".to_string()]);
}

#[test]
fn manager_disposes_context_and_chosen_endpoints() {
    let realm = CurrentRealm::shared();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
    let manager = ObservablesManager::new();
    let target = WritableValue::new(Rc::clone(&realm), 0);
    let model = WritableValue::new(Rc::clone(&realm), 0);
    let extra = WritableValue::new(realm, 0);
    let binding = ctx.bind_value(&target, &model, None, None).unwrap();

    manager.add_observables_from_context(&ctx, true, false);
    manager.add_observable(Rc::new(extra.clone()));
    manager.dispose();

    assert!(ctx.is_disposed());
    assert!(binding.is_disposed());
    assert!(target.is_disposed());
    assert!(!model.is_disposed());
    assert!(extra.is_disposed());
}

#[test]
fn manager_leaves_excluded_endpoints_alone() {
    let realm = CurrentRealm::shared();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
    let manager = ObservablesManager::new();
    let target = WritableValue::new(Rc::clone(&realm), 0);
    let model = WritableValue::new(realm, 0);
    ctx.bind_value(&target, &model, None, None).unwrap();

    manager.add_observables_from_context(&ctx, true, true);
    manager.exclude_observable(&model);
    manager.dispose();

    assert!(target.is_disposed());
    assert!(!model.is_disposed());
}

#[test]
fn removed_binding_keeps_working_outside_the_context() {
    let realm = CurrentRealm::shared();
    let ctx = DataBindingContext::with_realm(Rc::clone(&realm));
    let target = WritableValue::new(Rc::clone(&realm), 0);
    let model = WritableValue::new(realm, 0);
    let binding = ctx.bind_value(&target, &model, None, None).unwrap();

    assert!(ctx.remove_binding(&binding));
    assert!(!ctx.remove_binding(&binding));
    assert!(ctx.validation_status_map().is_empty());

    target.set(3).unwrap();
    assert_eq!(model.get(), 3);

    ctx.dispose();
    assert!(!binding.is_disposed());
    binding.dispose();
}
