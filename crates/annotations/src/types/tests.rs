use std::sync::Arc;

use super::{
	AnnotationType, AnnotationTypes, CombinationMember, CombinationRule, TypeId, TypeRegistry,
};
use crate::combine::select_applicable_rules;
use crate::descriptor::AnnotationDescriptor;
use crate::error::ConfigError;

const CONFIG: &str = r#"
[[type]]
name = "error"
description = "Compiler error"
priority = 1

[[type]]
name = "warning"
priority = 2

[[type]]
name = "vcs-change"
visible = false

[[type]]
name = "errors-and-warnings"
description = "Errors and warnings"
[type.combination]
order = 1
members = [
	{ type = "error", minimum_count = 1 },
	{ type = "warning", optional = true, absorb_all = true },
]
"#;

#[test]
fn test_parse_full_config() {
	let types = AnnotationTypes::from_toml_str(CONFIG).unwrap();
	assert!(types.combine());
	assert_eq!(types.len(), 4);

	let names: Vec<&str> = types.iter().map(|ty| ty.name.as_str()).collect();
	assert_eq!(names, vec!["error", "warning", "vcs-change", "errors-and-warnings"]);

	let error = types.get("error").unwrap();
	assert_eq!(error.description, "Compiler error");
	assert_eq!(error.priority, 1);
	assert!(error.visible && error.whole_line);
	assert!(!types.get("vcs-change").unwrap().visible);

	let rule = types
		.get("errors-and-warnings")
		.and_then(|ty| ty.combination.as_ref())
		.unwrap();
	assert_eq!(
		rule,
		&CombinationRule::new("errors-and-warnings")
			.member(CombinationMember::new("error").minimum_count(1))
			.member(CombinationMember::new("warning").optional().absorb_all())
			.order(1)
	);
}

#[test]
fn test_empty_config_uses_defaults() {
	let types = AnnotationTypes::from_toml_str("").unwrap();
	assert!(types.is_empty());
	assert!(types.combine());

	let types = AnnotationTypes::from_toml_str("combine = false").unwrap();
	assert!(!types.combine());
}

#[test]
fn test_duplicate_type_is_rejected() {
	let input = "[[type]]\nname = \"error\"\n[[type]]\nname = \"error\"\n";
	let err = AnnotationTypes::from_toml_str(input).unwrap_err();
	assert!(matches!(err, ConfigError::DuplicateType(ref name) if name == "error"));
}

#[test]
fn test_empty_names_are_rejected() {
	let err = AnnotationTypes::from_toml_str("[[type]]\nname = \"\"\n").unwrap_err();
	assert!(matches!(err, ConfigError::EmptyName));

	let input = "[[type]]\nname = \"pair\"\n[type.combination]\nmembers = [{ type = \"\" }]\n";
	let err = AnnotationTypes::from_toml_str(input).unwrap_err();
	assert!(matches!(err, ConfigError::EmptyMemberType(ref name) if name == "pair"));
}

#[test]
fn test_unknown_keys_are_rejected() {
	let input = "[[type]]\nname = \"error\"\ncolour = \"red\"\n";
	let err = AnnotationTypes::from_toml_str(input).unwrap_err();
	assert!(matches!(err, ConfigError::Toml(_)));
	assert!(err.to_string().starts_with("TOML parse error"));
}

#[test]
fn test_malformed_rule_is_loaded_but_not_applied() {
	let input = r#"
[[type]]
name = "todo"

[[type]]
name = "lonely"
[type.combination]
members = [{ type = "todo" }]
"#;
	let types = AnnotationTypes::from_toml_str(input).unwrap();
	assert_eq!(types.rules().count(), 1);
	assert!(select_applicable_rules(&types).is_empty());
}

#[test]
fn test_combination_result_type_follows_owner() {
	let ty = AnnotationType::new("pair").combination(
		CombinationRule::new("something-else")
			.member(CombinationMember::new("a"))
			.member(CombinationMember::new("b")),
	);
	assert_eq!(ty.combination.unwrap().result_type, TypeId::new("pair"));
}

#[test]
fn test_well_formed_rules() {
	let single = CombinationRule::new("x").member(CombinationMember::new("a"));
	assert!(!single.is_well_formed());
	assert!(!CombinationRule::new("x").is_well_formed());
	assert!(
		CombinationRule::new("x")
			.member(CombinationMember::new("a").absorb_all())
			.is_well_formed()
	);
	assert!(single.member(CombinationMember::new("b")).is_well_formed());
}

#[test]
fn test_insert_replaces_in_place() {
	let mut types = AnnotationTypes::new()
		.with_type(AnnotationType::new("a"))
		.with_type(AnnotationType::new("b"));
	let old = types.insert(AnnotationType::new("a").priority(9));
	assert!(old.is_some_and(|ty| ty.priority == 0));

	let names: Vec<&str> = types.iter().map(|ty| ty.name.as_str()).collect();
	assert_eq!(names, vec!["a", "b"]);
	assert_eq!(types.get("a").map(|ty| ty.priority), Some(9));
}

#[test]
fn test_effective_visibility() {
	let types = AnnotationTypes::from_toml_str(CONFIG).unwrap();
	assert!(types.is_visible(&AnnotationDescriptor::new("error", 0)));
	assert!(!types.is_visible(&AnnotationDescriptor::new("vcs-change", 0)));
	assert!(!types.is_visible(&AnnotationDescriptor::new("error", 0).with_visible(false)));
	assert!(types.is_visible(&AnnotationDescriptor::new("undeclared", 0)));
}

#[test]
fn test_descriptor_is_prefilled_from_type() {
	let types = AnnotationTypes::from_toml_str(CONFIG).unwrap();
	let d = types.descriptor("error", 12);
	assert_eq!(d.type_id().as_str(), "error");
	assert_eq!(d.offset(), 12);
	assert_eq!(d.priority(), 1);
	assert_eq!(d.description(), "Compiler error");
	assert!(!d.is_registered());

	let d = types.descriptor("undeclared", 3);
	assert_eq!(d.priority(), 0);
	assert!(d.description().is_empty());
}

#[test]
fn test_registry_publishes_snapshots() {
	let registry = TypeRegistry::new(AnnotationTypes::new().with_type(AnnotationType::new("error")));
	let before = registry.load();

	registry.update(|current| current.clone().with_combine(false));
	let after = registry.load();
	assert!(before.combine());
	assert!(!after.combine());
	assert_eq!(after.len(), 1);

	registry.store(AnnotationTypes::default());
	assert!(registry.load().is_empty());
	assert!(!Arc::ptr_eq(&after, &registry.load()));
}

#[test]
fn test_type_id_display_and_order() {
	let id = TypeId::from("error");
	assert_eq!(id.to_string(), "error");
	assert_eq!(id, TypeId::new("error"));
	assert!(TypeId::new("a") < TypeId::new("b"));
}
