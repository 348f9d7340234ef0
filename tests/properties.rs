use modspec_core::{
    codegen, tree, validate, EditorSession, FieldPatch, FieldType, LayoutNode, ModuleSpec,
};
use proptest::prelude::*;

fn field_type() -> impl Strategy<Value = FieldType> {
    prop_oneof![Just(FieldType::Text), Just(FieldType::Boolean), Just(FieldType::Image)]
}

/// Layout built by a sequence of (parent index, is_slot) insertions.
fn layout(ops: &[(usize, bool)]) -> LayoutNode {
    let mut root = ModuleSpec::new_default().layout;
    let mut containers = vec!["root".to_string(), "content".to_string()];
    for (i, (parent, is_slot)) in ops.iter().enumerate() {
        let parent = &containers[parent % containers.len()];
        let id = format!("n{i}");
        let node = if *is_slot {
            LayoutNode::slot(id.clone(), None, None)
        } else {
            LayoutNode::stack(id.clone(), None, vec![])
        };
        root = tree::insert_child(&root, parent, node);
        if !is_slot {
            containers.push(id);
        }
    }
    root
}

proptest! {
    #[test]
    fn identity_map_preserves_tree(ops in prop::collection::vec((0usize..8, any::<bool>()), 0..24)) {
        let root = layout(&ops);
        let mapped = tree::map_tree(&root, &mut |n| n.clone());
        prop_assert_eq!(&mapped, &root);
        for i in 0..ops.len() {
            let id = format!("n{i}");
            prop_assert_eq!(tree::find_by_id(&mapped, &id), tree::find_by_id(&root, &id));
        }
    }

    #[test]
    fn added_field_names_never_collide(types in prop::collection::vec(field_type(), 1..30)) {
        let mut session = EditorSession::new();
        for t in &types {
            session.add_field(*t);
        }
        let mut names: Vec<_> = session.spec().fields.iter().map(|f| f.name.clone()).collect();
        prop_assert_eq!(names.len(), types.len());
        names.sort();
        names.dedup();
        prop_assert_eq!(names.len(), types.len());
    }

    #[test]
    fn added_names_avoid_renamed_fields(n in 1usize..10) {
        let mut session = EditorSession::new();
        let first = session.add_field(FieldType::Image);
        session.update_field(&first, &FieldPatch { name: Some("image_2".into()), ..Default::default() });
        for _ in 0..n {
            session.add_field(FieldType::Image);
        }
        let names: Vec<_> = session.spec().fields.iter().map(|f| f.name.as_str()).collect();
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn retype_is_idempotent(from in field_type(), to in field_type()) {
        let mut session = EditorSession::new();
        let id = session.add_field(from);
        session.update_field(&id, &FieldPatch {
            required: Some(true),
            text_default: Some(Some("x".into())),
            boolean_default: Some(Some(true)),
            default_alt: Some(Some("alt".into())),
            ..Default::default()
        });

        session.replace_field_type(&id, to);
        let once = session.spec().field(&id).cloned();
        session.replace_field_type(&id, to);
        prop_assert_eq!(session.spec().field(&id).cloned(), once.clone());

        let once = once.unwrap();
        prop_assert!(once.required);
        prop_assert_eq!(once.field_type(), to);
    }

    #[test]
    fn valid_specs_generate_one_record_per_field(types in prop::collection::vec(field_type(), 1..12)) {
        let mut session = EditorSession::new();
        let ids: Vec<_> = types.iter().map(|t| session.add_field(*t)).collect();
        session.select_node(Some("content".into()));
        for id in &ids {
            session.select_node(Some("content".into()));
            let slot = session.add_slot_to_selected().unwrap();
            session.update_slot_binding(&slot, Some(id.clone()));
        }
        prop_assert!(validate(session.spec()).is_empty());

        let records = codegen::field_descriptors(session.spec());
        prop_assert_eq!(records.len(), ids.len());
        for (record, field) in records.iter().zip(&session.spec().fields) {
            prop_assert_eq!(&record.name, &field.name);
        }
        prop_assert_eq!(codegen::generate(session.spec()).unwrap(), codegen::generate(session.spec()).unwrap());
    }
}
