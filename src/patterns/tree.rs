//! Cross-file convention checks over the full in-memory entity set.

use std::collections::{BTreeMap, BTreeSet};

use super::naming::{dominant_style, function_styles};
use super::structure::design_hints;
use super::{sort_patterns, Pattern, PatternKind, PatternThresholds};
use crate::analysis::{CodeEntity, EntityKind, EntityRef};
use crate::lang::Language;

/// Method names that hand out a shared instance.
const ACCESSOR_NAMES: &[&str] = &[
    "instance",
    "get_instance",
    "getinstance",
    "shared",
    "shared_instance",
    "sharedinstance",
    "default",
    "current",
];

/// One file's entities as seen by the cross-file pass.
#[derive(Debug, Clone, Copy)]
pub struct FileView<'a> {
    pub language: Language,
    pub module: &'a CodeEntity,
}

/// Run every cross-file check. Input order does not affect the output.
pub fn recognize_tree(files: &[FileView<'_>], thresholds: &PatternThresholds) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    dominant_naming(files, thresholds, &mut patterns);
    for file in files {
        for class in file.module.all_classes() {
            if let Some(p) = singleton(class) {
                patterns.push(p);
            }
        }
    }
    aggregation(files, thresholds, &mut patterns);
    recurring_hints(files, thresholds, &mut patterns);
    sort_patterns(&mut patterns);
    patterns
}

/// Dominant function naming per language across the tree, plus the
/// entities that deviate from it.
fn dominant_naming(files: &[FileView<'_>], thresholds: &PatternThresholds, out: &mut Vec<Pattern>) {
    let mut by_language: BTreeMap<Language, Vec<_>> = BTreeMap::new();
    for file in files.iter().filter(|f| f.language.is_code()) {
        by_language
            .entry(file.language)
            .or_default()
            .extend(function_styles(file.module));
    }

    for (language, named) in by_language {
        if named.len() < thresholds.min_naming_samples.max(2) {
            continue;
        }
        let styles: Vec<_> = named.iter().map(|(_, s)| *s).collect();
        let Some(dominant) = dominant_style(&styles) else {
            continue;
        };
        let (conforming, deviating): (Vec<_>, Vec<_>) =
            named.iter().partition(|(_, style)| style.conforms_to(dominant));
        let share = conforming.len() as f64 / named.len() as f64;
        let file_count = named
            .iter()
            .map(|(e, _)| e.file.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        out.push(
            Pattern::new(
                PatternKind::NamingConvention,
                format!("dominant {} function naming: {}", language, dominant),
                conforming.iter().map(|(e, _)| e.to_ref()).collect(),
            )
            .with_confidence(share)
            .with_note(format!(
                "{} of {} function names across {} files follow {}",
                conforming.len(),
                named.len(),
                file_count,
                dominant
            ))
            .capped(),
        );

        if !deviating.is_empty() {
            out.push(
                Pattern::new(
                    PatternKind::AntiPattern,
                    format!("{} naming deviations", language),
                    deviating.iter().map(|(e, _)| e.to_ref()).collect(),
                )
                .with_confidence(share)
                .with_note(format!(
                    "{} function names do not follow the dominant {}",
                    deviating.len(),
                    dominant
                ))
                .capped(),
            );
        }
    }
}

fn is_static(method: &CodeEntity) -> bool {
    method
        .decorators
        .iter()
        .any(|d| d == "staticmethod" || d == "classmethod")
        || method
            .signature
            .as_deref()
            .map(|s| s.split_whitespace().any(|w| w == "static"))
            .unwrap_or(false)
}

fn is_private_constructor(class: &CodeEntity, method: &CodeEntity) -> bool {
    if method.name == "__new__" {
        return true;
    }
    let is_constructor = method.name == class.name || method.name == "constructor";
    is_constructor
        && method
            .signature
            .as_deref()
            .map(|s| s.split_whitespace().any(|w| w == "private"))
            .unwrap_or(false)
}

/// A class with a private constructor and exactly one accessor, either a
/// static or class method or a method with an accessor name.
fn singleton(class: &CodeEntity) -> Option<Pattern> {
    let accessors: Vec<_> = class
        .functions()
        .filter(|m| !is_private_constructor(class, m))
        .filter(|m| is_static(m) || ACCESSOR_NAMES.contains(&m.name.to_lowercase().as_str()))
        .collect();
    let [accessor] = accessors.as_slice() else {
        return None;
    };
    let constructor = class.functions().find(|m| is_private_constructor(class, m))?;

    Some(
        Pattern::new(
            PatternKind::StructuralPattern,
            "singleton",
            vec![class.to_ref(), accessor.to_ref(), constructor.to_ref()],
        )
        .with_confidence(0.9)
        .with_note(format!(
            "{} exposes one accessor {} and a restricted constructor {}",
            class.name, accessor.name, constructor.name
        )),
    )
}

/// A class whose body references another known class many times.
fn aggregation(files: &[FileView<'_>], thresholds: &PatternThresholds, out: &mut Vec<Pattern>) {
    let mut known: BTreeMap<&str, EntityRef> = BTreeMap::new();
    for file in files {
        for class in file.module.all_classes() {
            known
                .entry(class.name.as_str())
                .and_modify(|existing| {
                    if class.to_ref() < *existing {
                        *existing = class.to_ref();
                    }
                })
                .or_insert_with(|| class.to_ref());
        }
    }

    let min = thresholds.aggregation_min_references.max(1);
    for file in files {
        for class in file.module.all_classes() {
            for (target, count) in &class.references {
                if *count < min || target == &class.name {
                    continue;
                }
                let Some(target_ref) = known.get(target.as_str()) else {
                    continue;
                };
                out.push(
                    Pattern::new(
                        PatternKind::StructuralPattern,
                        format!("aggregation: {} holds {}", class.name, target),
                        vec![class.to_ref(), target_ref.clone()],
                    )
                    .with_confidence(*count as f64 / (2 * min) as f64)
                    .with_note(format!(
                        "{} references {} {} times (threshold {})",
                        class.name, target, count, min
                    )),
                );
            }
        }
    }
}

/// Design hints that appear in at least `min_occurrences` files.
fn recurring_hints(files: &[FileView<'_>], thresholds: &PatternThresholds, out: &mut Vec<Pattern>) {
    let mut by_label: BTreeMap<&str, Vec<EntityRef>> = BTreeMap::new();
    for file in files {
        for (label, class) in design_hints(file.module) {
            by_label.entry(label).or_default().push(class.to_ref());
        }
    }

    let min = thresholds.min_occurrences.max(2);
    for (label, evidence) in by_label {
        let files: BTreeSet<_> = evidence.iter().map(|r| r.file.as_str()).collect();
        if files.len() < min {
            continue;
        }
        let note = format!("{} classes in {} files", evidence.len(), files.len());
        out.push(
            Pattern::new(PatternKind::StructuralPattern, format!("recurring {}", label), evidence)
                .with_confidence(0.7)
                .with_note(note)
                .capped(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LineSpan;

    fn entity(kind: EntityKind, name: &str, file: &str, line: usize) -> CodeEntity {
        CodeEntity::new(kind, name, file, LineSpan::new(line, line + 1))
    }

    fn module(file: &str, children: Vec<CodeEntity>) -> CodeEntity {
        let mut m = CodeEntity::new(EntityKind::Module, "m", file, LineSpan::new(1, 100));
        m.children = children;
        m
    }

    #[test]
    fn test_dominant_naming_across_files() {
        let a = module("a.py", vec![
            entity(EntityKind::Function, "load_data", "a.py", 1),
            entity(EntityKind::Function, "save_data", "a.py", 3),
        ]);
        let b = module("b.py", vec![
            entity(EntityKind::Function, "parse_line", "b.py", 1),
            entity(EntityKind::Function, "printReport", "b.py", 5),
        ]);
        let files = [
            FileView { language: Language::Python, module: &a },
            FileView { language: Language::Python, module: &b },
        ];
        let patterns = recognize_tree(&files, &PatternThresholds::default());

        let dominant = patterns
            .iter()
            .find(|p| p.kind == PatternKind::NamingConvention)
            .expect("dominant naming");
        assert_eq!(dominant.label, "dominant python function naming: snake_case");
        assert_eq!(dominant.confidence, 0.75);

        let deviations = patterns
            .iter()
            .find(|p| p.label == "python naming deviations")
            .expect("deviations");
        assert_eq!(deviations.evidence[0].name, "printReport");
    }

    #[test]
    fn test_singleton_python() {
        let mut class = entity(EntityKind::Class, "Config", "cfg.py", 1);
        class.children.push(entity(EntityKind::Function, "__new__", "cfg.py", 2));
        let mut accessor = entity(EntityKind::Function, "instance", "cfg.py", 4);
        accessor.decorators = vec!["classmethod".into()];
        class.children.push(accessor);
        let m = module("cfg.py", vec![class]);

        let patterns = recognize_tree(
            &[FileView { language: Language::Python, module: &m }],
            &PatternThresholds::default(),
        );
        let singleton = patterns.iter().find(|p| p.label == "singleton").expect("singleton");
        let names: Vec<_> = singleton.evidence.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Config", "instance", "__new__"]);
    }

    #[test]
    fn test_singleton_requires_private_constructor() {
        let mut class = entity(EntityKind::Class, "Registry", "R.java", 1);
        class.children.push(
            entity(EntityKind::Function, "Registry", "R.java", 2).with_signature("public Registry()"),
        );
        class.children.push(
            entity(EntityKind::Function, "getInstance", "R.java", 4)
                .with_signature("public static Registry getInstance()"),
        );
        let m = module("R.java", vec![class]);
        let patterns = recognize_tree(
            &[FileView { language: Language::Java, module: &m }],
            &PatternThresholds::default(),
        );
        assert!(patterns.iter().all(|p| p.label != "singleton"));
    }

    #[test]
    fn test_singleton_accepts_named_instance_accessor() {
        let mut class = entity(EntityKind::Class, "Session", "session.ts", 1);
        class.children.push(
            entity(EntityKind::Function, "constructor", "session.ts", 2).with_signature("private constructor()"),
        );
        class
            .children
            .push(entity(EntityKind::Function, "shared", "session.ts", 4).with_signature("shared(): Session"));
        class
            .children
            .push(entity(EntityKind::Function, "close", "session.ts", 6).with_signature("close(): void"));
        let m = module("session.ts", vec![class]);
        let patterns = recognize_tree(
            &[FileView { language: Language::TypeScript, module: &m }],
            &PatternThresholds::default(),
        );
        let singleton = patterns.iter().find(|p| p.label == "singleton").expect("singleton");
        let names: Vec<_> = singleton.evidence.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Session", "shared", "constructor"]);
    }

    #[test]
    fn test_singleton_needs_exactly_one_accessor() {
        let mut class = entity(EntityKind::Class, "Pool", "Pool.java", 1);
        class
            .children
            .push(entity(EntityKind::Function, "Pool", "Pool.java", 2).with_signature("private Pool()"));
        class.children.push(
            entity(EntityKind::Function, "getInstance", "Pool.java", 4)
                .with_signature("public static Pool getInstance()"),
        );
        class.children.push(
            entity(EntityKind::Function, "create", "Pool.java", 6).with_signature("public static Pool create()"),
        );
        let m = module("Pool.java", vec![class]);
        let patterns = recognize_tree(
            &[FileView { language: Language::Java, module: &m }],
            &PatternThresholds::default(),
        );
        assert!(patterns.iter().all(|p| p.label != "singleton"));
    }

    #[test]
    fn test_aggregation_needs_known_class() {
        let item = entity(EntityKind::Class, "Item", "item.py", 1);
        let mut cart = entity(EntityKind::Class, "Cart", "cart.py", 1);
        cart.references.insert("Item".into(), 4);
        cart.references.insert("List".into(), 9);
        let a = module("item.py", vec![item]);
        let b = module("cart.py", vec![cart]);

        let patterns = recognize_tree(
            &[
                FileView { language: Language::Python, module: &a },
                FileView { language: Language::Python, module: &b },
            ],
            &PatternThresholds::default(),
        );
        let aggregations: Vec<_> = patterns.iter().filter(|p| p.label.starts_with("aggregation")).collect();
        assert_eq!(aggregations.len(), 1);
        assert_eq!(aggregations[0].label, "aggregation: Cart holds Item");
        assert_eq!(aggregations[0].evidence[1].file, "item.py");
    }

    #[test]
    fn test_recurring_hints_need_multiple_files() {
        let a = module("a.ts", vec![entity(EntityKind::Class, "UserRepository", "a.ts", 1)]);
        let b = module("b.ts", vec![entity(EntityKind::Class, "OrderRepository", "b.ts", 1)]);
        let c = module("c.ts", vec![entity(EntityKind::Class, "ShapeFactory", "c.ts", 1)]);
        let files = [
            FileView { language: Language::TypeScript, module: &a },
            FileView { language: Language::TypeScript, module: &b },
            FileView { language: Language::TypeScript, module: &c },
        ];
        let patterns = recognize_tree(&files, &PatternThresholds::default());
        assert!(patterns.iter().any(|p| p.label == "recurring repository" && p.evidence.len() == 2));
        assert!(patterns.iter().all(|p| p.label != "recurring factory"));
    }

    #[test]
    fn test_order_independent() {
        let a = module("a.py", vec![entity(EntityKind::Function, "one_thing", "a.py", 1)]);
        let b = module("b.py", vec![entity(EntityKind::Function, "otherThing", "b.py", 1)]);
        let va = FileView { language: Language::Python, module: &a };
        let vb = FileView { language: Language::Python, module: &b };
        let thresholds = PatternThresholds::default();
        assert_eq!(recognize_tree(&[va, vb], &thresholds), recognize_tree(&[vb, va], &thresholds));
    }
}
